//! # Diagram Renderer
//!
//! Builds a textual architecture graph from the scope of work and renders it
//! to a PNG through the Mermaid CLI. The external process runs in a scratch
//! directory under a wall-clock limit and is killed when the limit expires.
//! Callers treat every [`RenderError`] as "use the placeholder".

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use image::ImageFormat;
use serde_json::json;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::RenderConfig;
use crate::pitch_errors::RenderError;
use crate::proposal_model::{Brief, ScopeOfWork};

/// At most this many service nodes sit between the gateway and the database
pub const MAX_SERVICES: usize = 4;

const DEFAULT_SERVICES: [&str; 2] = ["Auth Service", "Core Service"];

/// Layer of the architecture a node belongs to; drives its Mermaid style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTier {
    Client,
    Gateway,
    Service,
    Data,
}

impl NodeTier {
    const ALL: [NodeTier; 4] = [NodeTier::Client, NodeTier::Gateway, NodeTier::Service, NodeTier::Data];

    fn class_name(self) -> &'static str {
        match self {
            NodeTier::Client => "clientTier",
            NodeTier::Gateway => "gatewayTier",
            NodeTier::Service => "serviceTier",
            NodeTier::Data => "dataTier",
        }
    }

    fn style(self) -> &'static str {
        match self {
            NodeTier::Client => "fill:#DBEAFE,stroke:#2563EB,color:#1E3A8A",
            NodeTier::Gateway => "fill:#EDE9FE,stroke:#7C3AED,color:#4C1D95",
            NodeTier::Service => "fill:#DCFCE7,stroke:#16A34A,color:#14532D",
            NodeTier::Data => "fill:#FEF3C7,stroke:#D97706,color:#78350F",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramNode {
    pub id: String,
    pub label: String,
    pub tier: NodeTier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramEdge {
    pub from: String,
    pub to: String,
}

/// Textual graph of the proposed architecture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramSpec {
    pub title: String,
    pub nodes: Vec<DiagramNode>,
    pub edges: Vec<DiagramEdge>,
}

impl DiagramSpec {
    /// Client app, API gateway, up to [`MAX_SERVICES`] services and the primary database
    pub fn for_scope(brief: &Brief, scope: &ScopeOfWork) -> Self {
        let mut services: Vec<String> = Vec::new();
        for name in &scope.architecture {
            let name = name.trim();
            if name.is_empty() || services.iter().any(|s| s.eq_ignore_ascii_case(name)) {
                continue;
            }
            services.push(name.to_string());
            if services.len() == MAX_SERVICES {
                break;
            }
        }
        if services.is_empty() {
            services = DEFAULT_SERVICES.iter().map(|s| s.to_string()).collect();
        }

        let mut nodes = vec![
            DiagramNode {
                id: "client".into(),
                label: format!("{} App", brief.client_name),
                tier: NodeTier::Client,
            },
            DiagramNode {
                id: "gateway".into(),
                label: "API Gateway".into(),
                tier: NodeTier::Gateway,
            },
        ];
        let mut edges = vec![DiagramEdge {
            from: "client".into(),
            to: "gateway".into(),
        }];

        for (i, service) in services.into_iter().enumerate() {
            let id = format!("svc{}", i + 1);
            edges.push(DiagramEdge {
                from: "gateway".into(),
                to: id.clone(),
            });
            edges.push(DiagramEdge {
                from: id.clone(),
                to: "db".into(),
            });
            nodes.push(DiagramNode {
                id,
                label: service,
                tier: NodeTier::Service,
            });
        }

        nodes.push(DiagramNode {
            id: "db".into(),
            label: "Primary Database".into(),
            tier: NodeTier::Data,
        });

        Self {
            title: brief.project_name(),
            nodes,
            edges,
        }
    }

    /// Mermaid source for the graph
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph LR\n");
        for node in &self.nodes {
            let label = escape_label(&node.label);
            let line = match node.tier {
                NodeTier::Data => format!("    {}[(\"{}\")]\n", node.id, label),
                _ => format!("    {}[\"{}\"]\n", node.id, label),
            };
            out.push_str(&line);
        }
        for edge in &self.edges {
            out.push_str(&format!("    {} --> {}\n", edge.from, edge.to));
        }
        for tier in NodeTier::ALL {
            let ids: Vec<&str> = self
                .nodes
                .iter()
                .filter(|node| node.tier == tier)
                .map(|node| node.id.as_str())
                .collect();
            if ids.is_empty() {
                continue;
            }
            out.push_str(&format!("    classDef {} {}\n", tier.class_name(), tier.style()));
            out.push_str(&format!("    class {} {}\n", ids.join(","), tier.class_name()));
        }
        out
    }
}

fn escape_label(label: &str) -> String {
    label
        .replace('"', "#quot;")
        .replace(['\n', '\r'], " ")
}

/// Renders a [`DiagramSpec`] to PNG bytes
#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    async fn render(&self, spec: &DiagramSpec) -> Result<Vec<u8>, RenderError>;
}

/// Renderer backed by the Mermaid CLI (`mmdc`)
#[derive(Debug)]
pub struct MermaidCliRenderer {
    config: RenderConfig,
    breaker: CircuitBreaker,
}

impl MermaidCliRenderer {
    pub fn new(config: RenderConfig) -> Self {
        let breaker = CircuitBreaker::new(config.recovery.clone());
        Self { config, breaker }
    }

    async fn render_once(&self, spec: &DiagramSpec) -> Result<Vec<u8>, RenderError> {
        let workspace = tempfile::tempdir()?;
        let input = workspace.path().join("diagram.mmd");
        let output = workspace.path().join("diagram.png");
        let puppeteer = workspace.path().join("puppeteer.json");

        tokio::fs::write(&input, spec.to_mermaid()).await?;
        let browser_args = json!({ "args": ["--no-sandbox", "--disable-setuid-sandbox"] });
        tokio::fs::write(&puppeteer, browser_args.to_string()).await?;

        self.run_cli(&input, &output, &puppeteer).await?;

        let bytes = tokio::fs::read(&output)
            .await
            .map_err(|_| RenderError::InvalidOutput)?;
        match image::guess_format(&bytes) {
            Ok(ImageFormat::Png) => Ok(bytes),
            _ => Err(RenderError::InvalidOutput),
        }
    }

    async fn run_cli(&self, input: &Path, output: &Path, puppeteer: &Path) -> Result<(), RenderError> {
        let child = Command::new(&self.config.program)
            .arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output)
            .arg("-b")
            .arg(&self.config.background)
            .arg("-w")
            .arg(self.config.width.to_string())
            .arg("-p")
            .arg(puppeteer)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let limit = Duration::from_secs(self.config.timeout_secs);
        let result = tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| RenderError::Timeout(self.config.timeout_secs))?;
        let finished = result?;

        if !finished.status.success() {
            let stderr = String::from_utf8_lossy(&finished.stderr);
            return Err(RenderError::ProcessFailed {
                status: finished.status.to_string(),
                stderr: stderr.chars().take(500).collect(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DiagramRenderer for MermaidCliRenderer {
    async fn render(&self, spec: &DiagramSpec) -> Result<Vec<u8>, RenderError> {
        if self.breaker.is_open() {
            debug!("Renderer circuit breaker open, skipping render");
            return Err(RenderError::Unavailable);
        }

        match self.render_once(spec).await {
            Ok(bytes) => {
                self.breaker.record_success();
                info!(bytes = bytes.len(), nodes = spec.nodes.len(), "Diagram rendered");
                Ok(bytes)
            }
            Err(err) => {
                self.breaker.record_failure();
                warn!(error = %err, failures = self.breaker.failure_count(), "Diagram render failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal_model::{Currency, PricingBreakdown};

    fn scope_with(architecture: &[&str]) -> ScopeOfWork {
        ScopeOfWork {
            overview: "Overview".into(),
            deliverables: vec!["App".into()],
            team: vec![],
            pricing: PricingBreakdown::price(Currency::Usd, vec![("Build".into(), 1.0)], vec![]),
            roadmap: vec![],
            architecture: architecture.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_default_services() {
        let spec = DiagramSpec::for_scope(&Brief::new("Acme"), &scope_with(&[]));
        let labels: Vec<_> = spec.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Acme App", "API Gateway", "Auth Service", "Core Service", "Primary Database"]
        );
        assert_eq!(spec.edges.len(), 5);
        assert_eq!(spec.title, "Acme Integration");
    }

    #[test]
    fn test_services_capped_and_deduplicated() {
        let scope = scope_with(&["A", "a", "B", "C", "D", "E"]);
        let spec = DiagramSpec::for_scope(&Brief::new("Acme"), &scope);
        let services: Vec<_> = spec
            .nodes
            .iter()
            .filter(|n| n.id.starts_with("svc"))
            .map(|n| n.label.as_str())
            .collect();
        assert_eq!(services, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_mermaid_output() {
        let spec = DiagramSpec::for_scope(&Brief::new("Say \"Hi\""), &scope_with(&["Auth"]));
        let mermaid = spec.to_mermaid();
        assert!(mermaid.starts_with("graph LR\n"));
        assert!(mermaid.contains("client[\"Say #quot;Hi#quot; App\"]"));
        assert!(mermaid.contains("db[(\"Primary Database\")]"));
        assert!(mermaid.contains("gateway --> svc1"));
        assert!(mermaid.contains("svc1 --> db"));
        assert!(mermaid.contains("classDef serviceTier "));
        assert!(mermaid.contains("class svc1 serviceTier\n"));
        assert!(mermaid.contains("class db dataTier\n"));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let renderer = MermaidCliRenderer::new(RenderConfig {
            program: "/nonexistent/mmdc".into(),
            ..RenderConfig::default()
        });
        let spec = DiagramSpec::for_scope(&Brief::new("Acme"), &scope_with(&[]));
        let err = renderer.render(&spec).await.unwrap_err();
        assert!(matches!(err, RenderError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_breaker_opens_after_failures() {
        let mut config = RenderConfig {
            program: "/nonexistent/mmdc".into(),
            ..RenderConfig::default()
        };
        config.recovery.circuit_breaker_threshold = 2;
        let renderer = MermaidCliRenderer::new(config);
        let spec = DiagramSpec::for_scope(&Brief::new("Acme"), &scope_with(&[]));

        assert!(renderer.render(&spec).await.is_err());
        assert!(renderer.render(&spec).await.is_err());
        assert!(matches!(
            renderer.render(&spec).await,
            Err(RenderError::Unavailable)
        ));
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, body: &str) -> String {
            let path = dir.join("fake-mmdc.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn renderer(program: String, timeout_secs: u64) -> MermaidCliRenderer {
            MermaidCliRenderer::new(RenderConfig {
                program,
                timeout_secs,
                ..RenderConfig::default()
            })
        }

        #[tokio::test]
        async fn test_successful_render() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(dir.path(), r#"printf '\211PNG\r\n\032\nrest' > "$4""#);
            let spec = DiagramSpec::for_scope(&Brief::new("Acme"), &scope_with(&[]));

            let bytes = renderer(program, 10).render(&spec).await.unwrap();
            assert!(bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
        }

        #[tokio::test]
        async fn test_timeout_kills_render() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(dir.path(), "sleep 30");
            let spec = DiagramSpec::for_scope(&Brief::new("Acme"), &scope_with(&[]));

            let err = renderer(program, 1).render(&spec).await.unwrap_err();
            assert!(matches!(err, RenderError::Timeout(1)));
        }

        #[tokio::test]
        async fn test_non_png_output_rejected() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(dir.path(), r#"echo "not an image" > "$4""#);
            let spec = DiagramSpec::for_scope(&Brief::new("Acme"), &scope_with(&[]));

            let err = renderer(program, 10).render(&spec).await.unwrap_err();
            assert!(matches!(err, RenderError::InvalidOutput));
        }

        #[tokio::test]
        async fn test_failed_exit_reports_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(dir.path(), "echo 'chromium missing' >&2; exit 3");
            let spec = DiagramSpec::for_scope(&Brief::new("Acme"), &scope_with(&[]));

            match renderer(program, 10).render(&spec).await {
                Err(RenderError::ProcessFailed { stderr, .. }) => {
                    assert!(stderr.contains("chromium missing"))
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }
}
