//! # Configuration Module
//!
//! Application settings read from the environment, plus per-component
//! tunables with sensible defaults for branding, document intake, generation
//! and diagram rendering.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

// Constants for pitch processing
pub const DEFAULT_BRAND_COLOR: &str = "#3B82F6";
pub const MAX_DOCUMENT_SIZE: u64 = 5 * 1024 * 1024; // 5MB limit for documents
pub const MAX_PROMPT_WORDS: usize = 5000;
pub const MAX_BRIEF_CHARS: usize = 500;
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Settings for the Branding Extractor
#[derive(Debug, Clone)]
pub struct BrandingConfig {
    /// Timeout for the page fetch in seconds
    pub timeout_secs: u64,
    /// User agent sent with the page fetch
    pub user_agent: String,
    /// Maximum number of HTML bytes inspected
    pub max_body_bytes: usize,
    /// Allow fetching hosts that resolve to private or loopback addresses
    pub allow_private_hosts: bool,
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: BROWSER_USER_AGENT.to_string(),
            max_body_bytes: 2 * 1024 * 1024,
            allow_private_hosts: false,
        }
    }
}

/// Settings for Document Intake
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// Maximum accepted document size in bytes
    pub max_file_size: u64,
    /// Timeout for fetching a linked document in seconds
    pub fetch_timeout_secs: u64,
    /// Allow links that resolve to loopback or private addresses (tests only)
    pub allow_private_hosts: bool,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_file_size: MAX_DOCUMENT_SIZE,
            fetch_timeout_secs: 30,
            allow_private_hosts: false,
        }
    }
}

/// Settings for the generative text API
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Bearer credential for the API
    pub api_key: String,
    /// Base URL of an OpenAI-compatible API, without trailing slash
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Document text beyond this many words is cut from the prompt
    pub max_prompt_words: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 120,
            max_prompt_words: MAX_PROMPT_WORDS,
        }
    }
}

/// Circuit breaker configuration for the rendering subprocess
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

/// Settings for the Diagram Renderer
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Mermaid CLI program
    pub program: String,
    /// Wall-clock limit for one render in seconds
    pub timeout_secs: u64,
    /// Output width in pixels
    pub width: u32,
    /// Background passed to the renderer
    pub background: String,
    /// Recovery and error handling configuration
    pub recovery: RecoveryConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            program: "mmdc".to_string(),
            timeout_secs: 60,
            width: 1200,
            background: "transparent".to_string(),
            recovery: RecoveryConfig::default(),
        }
    }
}

/// The agency issuing proposals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgencyProfile {
    pub name: String,
    pub website: String,
    pub tagline: String,
}

impl Default for AgencyProfile {
    fn default() -> Self {
        Self {
            name: "Sparktoship".to_string(),
            website: "https://sparktoship.com".to_string(),
            tagline: "Solution Architecture & Engineering".to_string(),
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Telegram bot credential; the bot is disabled without it
    pub telegram_token: Option<String>,
    /// Root directory for persisted proposals
    pub data_dir: PathBuf,
    /// Dashboard listen port
    pub port: u16,
    /// Base URL used in links sent to users
    pub public_base_url: String,
    pub agency: AgencyProfile,
    pub branding: BrandingConfig,
    pub document: DocumentConfig,
    pub generation: GenerationConfig,
    pub render: RenderConfig,
}

impl AppConfig {
    /// Build the configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got {raw}"))?,
            Err(_) => DEFAULT_PORT,
        };

        let public_base_url = public_base_url(
            non_empty_var("PUBLIC_BASE_URL").as_deref(),
            non_empty_var("APP_DOMAIN").as_deref(),
            port,
        );

        let api_key = non_empty_var("AI_INTEGRATIONS_OPENAI_API_KEY")
            .or_else(|| non_empty_var("OPENAI_API_KEY"))
            .unwrap_or_default();

        let defaults = AgencyProfile::default();
        let agency = AgencyProfile {
            name: non_empty_var("AGENCY_NAME").unwrap_or(defaults.name),
            website: non_empty_var("AGENCY_WEBSITE").unwrap_or(defaults.website),
            tagline: non_empty_var("AGENCY_TAGLINE").unwrap_or(defaults.tagline),
        };

        Ok(Self {
            telegram_token: non_empty_var("TELEGRAM_BOT_TOKEN"),
            data_dir: PathBuf::from(non_empty_var("DATA_DIR").unwrap_or_else(|| "static".into())),
            port,
            public_base_url,
            agency,
            branding: BrandingConfig::default(),
            document: DocumentConfig::default(),
            generation: GenerationConfig {
                api_key,
                base_url: non_empty_var("AI_INTEGRATIONS_OPENAI_BASE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                model: non_empty_var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                ..GenerationConfig::default()
            },
            render: RenderConfig {
                program: non_empty_var("MERMAID_CLI").unwrap_or_else(|| "mmdc".to_string()),
                ..RenderConfig::default()
            },
        })
    }
}

/// Resolve the base URL for proposal links.
///
/// An explicit base URL wins, then a bare domain (served over https), then
/// the local dashboard address.
pub fn public_base_url(explicit: Option<&str>, domain: Option<&str>, port: u16) -> String {
    if let Some(url) = explicit {
        return url.trim_end_matches('/').to_string();
    }
    match domain {
        Some(domain) => format!("https://{}", domain.trim_end_matches('/')),
        None => format!("http://localhost:{port}"),
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_base_url_resolution() {
        assert_eq!(
            public_base_url(Some("https://pitch.example.com/"), Some("ignored.dev"), 8080),
            "https://pitch.example.com"
        );
        assert_eq!(
            public_base_url(None, Some("pitch.example.com"), 8080),
            "https://pitch.example.com"
        );
        assert_eq!(public_base_url(None, None, 9000), "http://localhost:9000");
    }

    #[test]
    fn test_render_config_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.program, "mmdc");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.recovery.circuit_breaker_threshold, 5);
    }
}
