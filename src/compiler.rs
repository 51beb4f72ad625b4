//! # Proposal Compiler
//!
//! Merges brief, branding, scope and diagram into a single HTML document and
//! persists it. [`render_html`] is pure: the same inputs always produce the
//! same bytes, so the page embeds no clock or random value.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::AgencyProfile;
use crate::pitch_errors::StorageError;
use crate::proposal_model::{Branding, Brief, DiagramRef, Proposal, ProposalSummary, ScopeOfWork};
use crate::storage::{ProposalStore, DIAGRAM_FILE};

/// Compiles proposals into a [`ProposalStore`]
#[derive(Debug, Clone)]
pub struct ProposalCompiler {
    store: Arc<ProposalStore>,
    agency: AgencyProfile,
}

impl ProposalCompiler {
    pub fn new(store: Arc<ProposalStore>, agency: AgencyProfile) -> Self {
        Self { store, agency }
    }

    pub fn store(&self) -> &ProposalStore {
        &self.store
    }

    /// Allocate an identifier, store the diagram and render the document.
    ///
    /// A diagram that cannot be stored degrades to the placeholder; failing
    /// to store the document itself is an error.
    pub async fn compile(
        &self,
        brief: Brief,
        branding: Branding,
        scope: ScopeOfWork,
        diagram_png: Option<Vec<u8>>,
    ) -> Result<Proposal, StorageError> {
        let created_at = Utc::now();
        let id = self.store.allocate(&brief.client_name, created_at).await?;

        let mut diagram_path = None;
        let mut diagram = DiagramRef::Placeholder;
        if let Some(png) = diagram_png {
            match self.store.write_diagram(&id, &png).await {
                Ok(path) => {
                    diagram_path = Some(path);
                    diagram = DiagramRef::Rendered {
                        path: format!("/proposal/{id}/{DIAGRAM_FILE}"),
                    };
                }
                Err(err) => warn!(proposal_id = %id, error = %err, "Could not store diagram, using placeholder"),
            }
        }

        let html = render_html(&brief, &branding, &scope, &diagram, &self.agency);
        let summary = ProposalSummary {
            id: id.clone(),
            client_name: brief.client_name.clone(),
            project_name: brief.project_name(),
            currency: brief.currency,
            created_at,
        };
        let html_path = self.store.write_proposal(&id, &html, &summary).await?;

        info!(
            proposal_id = %id,
            placeholder = diagram.is_placeholder(),
            bytes = html.len(),
            "Proposal compiled"
        );

        Ok(Proposal {
            id,
            brief,
            branding,
            scope,
            diagram,
            html,
            html_path,
            diagram_path,
            created_at,
        })
    }
}

/// Escape text for HTML element and attribute content
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Uppercase first letter of the client name for the monogram badge
pub fn monogram(name: &str) -> String {
    name.chars()
        .find(|c| c.is_alphanumeric())
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| "?".to_string())
}

fn list_html(items: &[String]) -> String {
    let mut out = String::from("<ul>\n");
    for item in items {
        out.push_str(&format!("      <li>{}</li>\n", escape_html(item)));
    }
    out.push_str("    </ul>");
    out
}

fn section(title: &str, key: &str, body: &str) -> String {
    format!(
        "  <section class=\"section\" id=\"{key}\">\n    <h2>{title}</h2>\n    {body}\n  </section>\n"
    )
}

fn effort(days: f64) -> String {
    if days.fract() == 0.0 {
        format!("{days:.0}")
    } else {
        format!("{days:.1}")
    }
}

fn pricing_html(scope: &ScopeOfWork) -> String {
    let pricing = &scope.pricing;
    let currency = pricing.currency;
    let mut rows = String::new();
    for line in &pricing.lines {
        rows.push_str(&format!(
            "        <tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>\n",
            escape_html(&line.item),
            effort(line.effort_days),
            currency.format_amount(line.amount),
        ));
    }
    let mut out = format!(
        "<table class=\"pricing\">\n      <thead><tr><th>Work package</th><th class=\"num\">Effort (days)</th><th class=\"num\">Amount ({code})</th></tr></thead>\n      <tbody>\n{rows}      </tbody>\n      <tfoot><tr><th>Total</th><th class=\"num\">{days}</th><th class=\"num\">{total}</th></tr></tfoot>\n    </table>",
        code = currency.code(),
        days = effort(pricing.total_effort_days()),
        total = currency.format_amount(pricing.total),
    );
    if !pricing.notes.is_empty() {
        out.push_str("\n    <div class=\"notes\">");
        out.push_str(&list_html(&pricing.notes));
        out.push_str("</div>");
    }
    out
}

fn logo_html(brief: &Brief, branding: &Branding) -> String {
    match &branding.logo_url {
        Some(url) => format!(
            "<img class=\"logo\" src=\"{}\" alt=\"{} logo\">",
            escape_html(url),
            escape_html(&brief.client_name)
        ),
        None => format!(
            "<div class=\"logo monogram\">{}</div>",
            escape_html(&monogram(&brief.client_name))
        ),
    }
}

/// Render the proposal document
pub fn render_html(
    brief: &Brief,
    branding: &Branding,
    scope: &ScopeOfWork,
    diagram: &DiagramRef,
    agency: &AgencyProfile,
) -> String {
    let color = escape_html(&branding.primary_color);
    let client = escape_html(&brief.client_name);
    let project = escape_html(&brief.project_name());
    let agency_name = escape_html(&agency.name);

    let overview = scope
        .overview
        .split("\n\n")
        .map(|para| format!("<p>{}</p>", escape_html(para.trim()).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n    ");

    let mut body = String::new();
    body.push_str(&section("Project Overview", "overview", &overview));
    body.push_str(&section("Deliverables", "deliverables", &list_html(&scope.deliverables)));
    if !scope.team.is_empty() {
        body.push_str(&section("Team", "team", &list_html(&scope.team)));
    }
    body.push_str(&section("Pricing", "pricing", &pricing_html(scope)));
    if !scope.roadmap.is_empty() {
        body.push_str(&section("Roadmap", "roadmap", &list_html(&scope.roadmap)));
    }
    let figure = format!(
        "<figure class=\"diagram{}\"><img src=\"{}\" alt=\"Architecture diagram for {}\"></figure>",
        if diagram.is_placeholder() { " placeholder" } else { "" },
        escape_html(diagram.path()),
        project,
    );
    body.push_str(&section("Technical Architecture", "architecture", &figure));

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{project} | Proposal for {client}</title>
  <style>
    :root {{ --brand: {color}; }}
    body {{ margin: 0; font-family: system-ui, -apple-system, "Segoe UI", sans-serif; color: #1f2937; background: #f9fafb; }}
    header {{ background: var(--brand); color: #fff; padding: 48px 24px; text-align: center; }}
    .logo {{ max-height: 72px; max-width: 200px; background: #fff; border-radius: 12px; padding: 8px; }}
    .monogram {{ display: inline-flex; width: 72px; height: 72px; align-items: center; justify-content: center; font-size: 36px; font-weight: 700; color: var(--brand); box-sizing: border-box; }}
    main {{ max-width: 880px; margin: 0 auto; padding: 24px; }}
    .section {{ background: #fff; border-radius: 12px; padding: 24px; margin-bottom: 24px; box-shadow: 0 1px 3px rgba(0,0,0,.08); }}
    .section h2 {{ margin-top: 0; color: var(--brand); }}
    table.pricing {{ width: 100%; border-collapse: collapse; }}
    table.pricing td, table.pricing th {{ padding: 8px; border-bottom: 1px solid #e5e7eb; text-align: left; }}
    .num {{ text-align: right !important; }}
    .diagram img {{ max-width: 100%; }}
    footer {{ text-align: center; padding: 24px; color: #6b7280; font-size: 14px; }}
  </style>
</head>
<body>
<header>
  {logo}
  <h1>{project}</h1>
  <p class="subtitle">Proposal for {client} by {agency_name}</p>
</header>
<main>
{body}</main>
<footer>
  <p><strong>{agency_name}</strong> | {tagline}</p>
  <p><a href="{website}">{website}</a></p>
</footer>
</body>
</html>
"#,
        logo = logo_html(brief, branding),
        tagline = escape_html(&agency.tagline),
        website = escape_html(&agency.website),
    )
}
