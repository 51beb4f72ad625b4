//! # Pitch Pipeline
//!
//! Runs one pitch end to end: intake, branding, brief expansion, diagram
//! rendering and compilation, strictly in that order. Branding and diagram
//! failures degrade (default branding, placeholder diagram); intake,
//! generation and storage failures halt the pitch with a [`PitchError`].

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::branding::{name_from_url, normalize_url, BrandingExtractor};
use crate::brief_expander::BriefExpander;
use crate::compiler::ProposalCompiler;
use crate::config::{AppConfig, DocumentConfig};
use crate::diagram::{DiagramRenderer, DiagramSpec, MermaidCliRenderer};
use crate::document::{extract_document_text, fetch_remote_document, UploadedDocument};
use crate::llm_client::{OpenAiClient, TextGenerator};
use crate::pitch_errors::PitchError;
use crate::proposal_model::{Branding, Brief, Proposal};
use crate::storage::ProposalStore;

/// Lifecycle of a pitch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchStage {
    CollectingInput,
    ExtractingBranding,
    ExpandingBrief,
    RenderingDiagram,
    Compiling,
    Delivered,
    Failed,
}

impl fmt::Display for PitchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PitchStage::CollectingInput => "collecting_input",
            PitchStage::ExtractingBranding => "extracting_branding",
            PitchStage::ExpandingBrief => "expanding_brief",
            PitchStage::RenderingDiagram => "rendering_diagram",
            PitchStage::Compiling => "compiling",
            PitchStage::Delivered => "delivered",
            PitchStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The assembled proposal generator
#[derive(Clone)]
pub struct PitchPipeline {
    branding: BrandingExtractor,
    expander: BriefExpander,
    renderer: Arc<dyn DiagramRenderer>,
    compiler: ProposalCompiler,
    document_config: DocumentConfig,
}

impl PitchPipeline {
    pub fn new(
        branding: BrandingExtractor,
        expander: BriefExpander,
        renderer: Arc<dyn DiagramRenderer>,
        compiler: ProposalCompiler,
        document_config: DocumentConfig,
    ) -> Self {
        Self {
            branding,
            expander,
            renderer,
            compiler,
            document_config,
        }
    }

    /// Wire the production components from configuration
    pub fn from_config(config: &AppConfig, store: Arc<ProposalStore>) -> Result<Self> {
        let branding = BrandingExtractor::new(config.branding.clone());
        let generator: Arc<dyn TextGenerator> = Arc::new(
            OpenAiClient::new(&config.generation).context("Failed to build LLM HTTP client")?,
        );
        let expander = BriefExpander::new(generator, &config.generation);
        let renderer: Arc<dyn DiagramRenderer> =
            Arc::new(MermaidCliRenderer::new(config.render.clone()));
        let compiler = ProposalCompiler::new(store, config.agency.clone());

        Ok(Self::new(
            branding,
            expander,
            renderer,
            compiler,
            config.document.clone(),
        ))
    }

    pub fn store(&self) -> &ProposalStore {
        self.compiler.store()
    }

    /// Generate a proposal from a complete brief
    pub async fn run(&self, brief: Brief) -> Result<Proposal, PitchError> {
        enter(&brief, PitchStage::ExtractingBranding);
        let branding = self.branding.extract(brief.client_url.as_deref()).await;
        self.expand_and_compile(brief, branding).await
    }

    /// Extract an uploaded document into the brief, then generate
    pub async fn run_with_upload(
        &self,
        mut brief: Brief,
        upload: UploadedDocument,
    ) -> Result<Proposal, PitchError> {
        enter(&brief, PitchStage::CollectingInput);
        let file_name = upload.file_name.clone();
        let text = extract_document_text(upload, &self.document_config)
            .await
            .map_err(|e| fail(&brief, PitchError::from(e)))?;
        info!(client = %brief.client_name, file = %file_name, chars = text.len(), "Document attached to brief");
        brief.document_text = Some(text);
        self.run(brief).await
    }

    /// Fetch a shared document link into the brief, then generate
    pub async fn run_with_link(&self, mut brief: Brief, link: &str) -> Result<Proposal, PitchError> {
        enter(&brief, PitchStage::CollectingInput);
        let text = fetch_remote_document(link, &self.document_config)
            .await
            .map_err(|e| fail(&brief, PitchError::from(e)))?;
        brief.document_text = Some(text);
        self.run(brief).await
    }

    /// Quick format: only a website and optionally a project name. The
    /// client is named after the site title, or the host when there is none.
    pub async fn run_quick(&self, url: &str, project_name: Option<String>) -> Result<Proposal, PitchError> {
        let url = normalize_url(url);
        info!(url = %url, stage = %PitchStage::ExtractingBranding, "Pitch stage");
        let branding = self.branding.extract(Some(url.as_str())).await;
        let client_name = branding
            .site_name
            .clone()
            .or_else(|| name_from_url(&url))
            .unwrap_or_else(|| "Client".to_string());

        let mut brief = Brief::new(client_name).with_url(url);
        if let Some(project) = project_name {
            brief = brief.with_project_name(project);
        }
        self.expand_and_compile(brief, branding).await
    }

    async fn expand_and_compile(
        &self,
        brief: Brief,
        branding: Branding,
    ) -> Result<Proposal, PitchError> {
        enter(&brief, PitchStage::ExpandingBrief);
        let scope = self
            .expander
            .expand(&brief)
            .await
            .map_err(|e| fail(&brief, PitchError::from(e)))?;

        enter(&brief, PitchStage::RenderingDiagram);
        let spec = DiagramSpec::for_scope(&brief, &scope);
        let diagram = match self.renderer.render(&spec).await {
            Ok(png) => Some(png),
            Err(e) => {
                warn!(client = %brief.client_name, error = %e, "Using placeholder diagram");
                None
            }
        };

        enter(&brief, PitchStage::Compiling);
        let client_name = brief.client_name.clone();
        let proposal = self
            .compiler
            .compile(brief, branding, scope, diagram)
            .await
            .map_err(|e| {
                let err = PitchError::from(e);
                error!(
                    client = %client_name,
                    stage = %PitchStage::Failed,
                    failed_at = %err.stage(),
                    error = %err,
                    "Pitch failed"
                );
                err
            })?;

        info!(
            client = %client_name,
            proposal_id = %proposal.id,
            stage = %PitchStage::Delivered,
            "Pitch complete"
        );
        Ok(proposal)
    }
}

fn enter(brief: &Brief, stage: PitchStage) {
    info!(client = %brief.client_name, stage = %stage, "Pitch stage");
}

fn fail(brief: &Brief, err: PitchError) -> PitchError {
    error!(
        client = %brief.client_name,
        stage = %PitchStage::Failed,
        failed_at = %err.stage(),
        error = %err,
        "Pitch failed"
    );
    err
}
