//! # Pitch Error Types Module
//!
//! Error kinds for each stage of the proposal pipeline. Branding and diagram
//! failures are logged and degraded; document, generation and storage failures
//! halt the pitch and are reported to the requester.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::PitchStage;

/// Outbound fetch failure. Branding never surfaces it and falls back to defaults.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("refusing to fetch non-public address {url}")]
    UnsafeUrl { url: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("too many redirects, last hop was {url}")]
    TooManyRedirects { url: String },
}

/// Uploaded or linked document could not be turned into text.
#[derive(Debug, Error)]
pub enum DocumentParseError {
    #[error("document is empty")]
    Empty,

    #[error("document is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("unsupported document type: {0}")]
    Unsupported(String),

    #[error("document is not valid UTF-8 text")]
    Encoding,

    #[error("PDF could not be parsed: {0}")]
    Pdf(String),

    #[error("PDF contains no extractable text")]
    NoText,

    #[error("could not fetch document: {0}")]
    Fetch(String),
}

/// Generative API failure or malformed model output.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("model returned empty content")]
    EmptyContent,

    #[error("model output is missing required section: {0}")]
    MissingSection(&'static str),

    #[error("pricing section has no line items with an effort estimate")]
    UnpricedScope,
}

/// Diagram rendering failure. The compiler substitutes a placeholder.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer is temporarily disabled after repeated failures")]
    Unavailable,

    #[error("could not prepare render workspace: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("could not start renderer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("renderer exited with {status}: {stderr}")]
    ProcessFailed { status: String, stderr: String },

    #[error("renderer timed out after {0}s")]
    Timeout(u64),

    #[error("renderer output is not a PNG image")]
    InvalidOutput,
}

/// Proposal persistence failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode proposal metadata: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid proposal identifier: {0}")]
    InvalidId(String),

    #[error("no free identifier left for base {0}")]
    IdExhausted(String),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A failure that halted a pitch request.
#[derive(Debug, Error)]
pub enum PitchError {
    #[error("document intake failed: {0}")]
    Document(#[from] DocumentParseError),

    #[error("brief expansion failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("proposal storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl PitchError {
    /// Stage that was running when the pitch failed.
    pub fn stage(&self) -> PitchStage {
        match self {
            PitchError::Document(_) => PitchStage::CollectingInput,
            PitchError::Generation(_) => PitchStage::ExpandingBrief,
            PitchError::Storage(_) => PitchStage::Compiling,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_error_reports_stage() {
        let err = PitchError::from(GenerationError::EmptyContent);
        assert_eq!(err.stage(), PitchStage::ExpandingBrief);

        let err = PitchError::from(DocumentParseError::Empty);
        assert_eq!(err.stage(), PitchStage::CollectingInput);

        let err = PitchError::from(StorageError::InvalidId("..".to_string()));
        assert_eq!(err.stage(), PitchStage::Compiling);
    }

    #[test]
    fn test_error_message_formatting() {
        let err = RenderError::Timeout(60);
        assert_eq!(err.to_string(), "renderer timed out after 60s");

        let err = GenerationError::MissingSection("pricing");
        assert_eq!(
            err.to_string(),
            "model output is missing required section: pricing"
        );
    }
}
