//! # Dashboard
//!
//! Read-only HTTP surface over the proposal store: an index page, a JSON
//! listing, the stored proposal documents and their diagrams.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::compiler::{escape_html, monogram};
use crate::config::AgencyProfile;
use crate::pitch_errors::StorageError;
use crate::proposal_model::ProposalSummary;
use crate::storage::ProposalStore;

pub const PLACEHOLDER_SVG: &str = include_str!("../assets/diagram-placeholder.svg");

#[derive(Clone)]
pub struct DashboardState {
    pub store: Arc<ProposalStore>,
    pub agency: AgencyProfile,
}

pub fn build_app(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/proposals", get(list_proposals))
        .route("/proposal/{id}", get(show_proposal))
        .route("/proposal/{id}/architecture.png", get(show_diagram))
        .route("/static/diagram-placeholder.svg", get(placeholder))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the dashboard until the process stops
pub async fn serve(state: DashboardState, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard listening");
    axum::serve(listener, build_app(state))
        .await
        .context("Dashboard server stopped")
}

fn storage_failure(err: StorageError) -> Response {
    match err {
        StorageError::InvalidId(_) => StatusCode::NOT_FOUND.into_response(),
        other => {
            error!(error = %other, "Proposal store read failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_proposals(State(state): State<DashboardState>) -> Response {
    match state.store.list().await {
        Ok(summaries) => Json(summaries).into_response(),
        Err(e) => storage_failure(e),
    }
}

async fn index(State(state): State<DashboardState>) -> Response {
    match state.store.list().await {
        Ok(summaries) => Html(render_index(&summaries, &state.agency)).into_response(),
        Err(e) => storage_failure(e),
    }
}

async fn show_proposal(State(state): State<DashboardState>, Path(id): Path<String>) -> Response {
    match state.store.load_html(&id).await {
        Ok(Some(html)) => Html(html).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => storage_failure(e),
    }
}

async fn show_diagram(State(state): State<DashboardState>, Path(id): Path<String>) -> Response {
    match state.store.load_diagram(&id).await {
        Ok(Some(png)) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => storage_failure(e),
    }
}

async fn placeholder() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/svg+xml")], PLACEHOLDER_SVG)
}

/// Index page listing every stored proposal
pub fn render_index(summaries: &[ProposalSummary], agency: &AgencyProfile) -> String {
    let rows = if summaries.is_empty() {
        "    <p class=\"empty\">No proposals yet.</p>\n".to_string()
    } else {
        summaries
            .iter()
            .map(|summary| {
                format!(
                    "    <a class=\"card\" href=\"{href}\"><span class=\"badge\">{initial}</span><span><strong>{client}</strong><br>{project}<br><small>{date} | {currency}</small></span></a>\n",
                    href = escape_html(&summary.url_path()),
                    initial = escape_html(&monogram(&summary.client_name)),
                    client = escape_html(&summary.client_name),
                    project = escape_html(&summary.project_name),
                    date = summary.created_at.format("%Y-%m-%d %H:%M UTC"),
                    currency = summary.currency,
                )
            })
            .collect()
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{name} | Proposals</title>
  <style>
    body {{ font-family: system-ui, sans-serif; background: #f9fafb; margin: 0; padding: 32px; color: #1f2937; }}
    .grid {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(280px, 1fr)); gap: 16px; }}
    .card {{ display: flex; gap: 12px; align-items: center; background: #fff; border-radius: 12px; padding: 16px; text-decoration: none; color: inherit; box-shadow: 0 1px 3px rgba(0,0,0,.08); }}
    .badge {{ width: 44px; height: 44px; border-radius: 50%; background: #3B82F6; color: #fff; display: inline-flex; align-items: center; justify-content: center; font-weight: 700; flex-shrink: 0; }}
  </style>
</head>
<body>
  <h1>{name} proposals</h1>
  <div class="grid">
{rows}  </div>
</body>
</html>
"#,
        name = escape_html(&agency.name),
    )
}
