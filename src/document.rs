//! # Document Intake Module
//!
//! Turns an uploaded or linked requirements document into plain text for the
//! brief. PDFs are walked page by page; plain text and markdown pass through
//! unchanged.

use std::path::Path;
use std::time::Duration;

use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use url::Url;

use crate::config::DocumentConfig;
use crate::net_guard::{self, FetchPolicy};
use crate::pitch_errors::{DocumentParseError, FetchError};

lazy_static! {
    static ref DRIVE_FILE: Regex = Regex::new(r"drive\.google\.com/file/d/([^/?#]+)").unwrap();
    static ref DOCS_DOCUMENT: Regex =
        Regex::new(r"docs\.google\.com/document/d/([^/?#]+)").unwrap();
}

/// Declared type of a requirements document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
    Markdown,
}

impl DocumentKind {
    /// Detect the kind from a file name's extension
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)?;
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "txt" => Some(DocumentKind::PlainText),
            "md" | "markdown" => Some(DocumentKind::Markdown),
            _ => None,
        }
    }

    /// Detect the kind from a MIME type such as `application/pdf; charset=binary`
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(DocumentKind::Pdf),
            "text/markdown" | "text/x-markdown" => Some(DocumentKind::Markdown),
            other if other.starts_with("text/") => Some(DocumentKind::PlainText),
            _ => None,
        }
    }
}

/// A document received from the requester
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub file_name: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    /// Build an upload, typing it by extension first and MIME type second
    pub fn new(
        file_name: impl Into<String>,
        mime: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<Self, DocumentParseError> {
        let file_name = file_name.into();
        let kind = DocumentKind::from_file_name(&file_name)
            .or_else(|| mime.and_then(DocumentKind::from_mime))
            .ok_or_else(|| DocumentParseError::Unsupported(file_name.clone()))?;
        Ok(Self {
            file_name,
            kind,
            bytes,
        })
    }
}

/// Extract plain text from document bytes
pub fn extract_text(
    kind: DocumentKind,
    bytes: &[u8],
    config: &DocumentConfig,
) -> Result<String, DocumentParseError> {
    if bytes.is_empty() {
        return Err(DocumentParseError::Empty);
    }
    let size = bytes.len() as u64;
    if size > config.max_file_size {
        return Err(DocumentParseError::TooLarge {
            size,
            limit: config.max_file_size,
        });
    }

    let text = match kind {
        DocumentKind::Pdf => extract_pdf_text(bytes)?,
        DocumentKind::PlainText | DocumentKind::Markdown => std::str::from_utf8(bytes)
            .map_err(|_| DocumentParseError::Encoding)?
            .to_string(),
    };

    if text.trim().is_empty() {
        return Err(match kind {
            DocumentKind::Pdf => DocumentParseError::NoText,
            _ => DocumentParseError::Empty,
        });
    }

    debug!("Extracted {} characters from {:?} document", text.len(), kind);
    Ok(text)
}

/// Extract text off the async runtime; PDF parsing is CPU-bound
pub async fn extract_document_text(
    document: UploadedDocument,
    config: &DocumentConfig,
) -> Result<String, DocumentParseError> {
    let config = config.clone();
    let file_name = document.file_name.clone();
    let text = tokio::task::spawn_blocking(move || {
        extract_text(document.kind, &document.bytes, &config)
    })
    .await
    .map_err(|e| DocumentParseError::Pdf(format!("extraction task failed: {e}")))??;

    info!(
        "Document {} yielded {} words",
        file_name,
        word_count(&text)
    );
    Ok(text)
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String, DocumentParseError> {
    // The PDF parser panics on some malformed inputs
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| DocumentParseError::Pdf("parser aborted on malformed input".to_string()))?
        .map_err(|e| DocumentParseError::Pdf(e.to_string()))?;

    let text = pages
        .iter()
        .map(|page| page.trim())
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    Ok(text)
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Keep at most `max_words` words, marking the cut
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }
    format!(
        "{}\n\n[... truncated to {} words]",
        words[..max_words].join(" "),
        max_words
    )
}

/// Rewrite sharing links of common hosts into direct download links
pub fn direct_download_url(url: &str) -> String {
    if let Some(caps) = DRIVE_FILE.captures(url) {
        return format!("https://drive.google.com/uc?export=download&id={}", &caps[1]);
    }
    if let Some(caps) = DOCS_DOCUMENT.captures(url) {
        return format!("https://docs.google.com/document/d/{}/export?format=txt", &caps[1]);
    }

    let is_dropbox = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.ends_with("dropbox.com")))
        .unwrap_or(false);
    if is_dropbox {
        if url.contains("dl=0") {
            return url.replace("dl=0", "dl=1");
        }
        if !url.contains("dl=") {
            let separator = if url.contains('?') { '&' } else { '?' };
            return format!("{url}{separator}dl=1");
        }
    }

    url.to_string()
}

/// Decide the document kind of a fetched link
fn remote_kind(url: &Url, content_type: &str) -> DocumentKind {
    let from_header = DocumentKind::from_mime(content_type);
    let from_path = DocumentKind::from_file_name(url.path());
    match (from_header, from_path) {
        (Some(DocumentKind::Pdf), _) | (_, Some(DocumentKind::Pdf)) => DocumentKind::Pdf,
        (_, Some(kind)) => kind,
        (Some(kind), None) => kind,
        // Google exports and unknown types are tried as text
        (None, None) => DocumentKind::PlainText,
    }
}

const MAX_REDIRECTS: usize = 5;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; ProposalBot/1.0)";

fn fetch_failure(error: FetchError) -> DocumentParseError {
    match error {
        FetchError::Http(e) if e.is_timeout() => {
            DocumentParseError::Fetch("request timed out".to_string())
        }
        FetchError::Http(e) => DocumentParseError::Fetch(e.without_url().to_string()),
        FetchError::UnsafeUrl { .. } => {
            DocumentParseError::Fetch("link points to a private or local address".to_string())
        }
        other => DocumentParseError::Fetch(other.to_string()),
    }
}

/// Fetch and extract a publicly shared document. Every redirect hop is held
/// to the same public address check, and the body stops at `max_file_size`.
pub async fn fetch_remote_document(
    link: &str,
    config: &DocumentConfig,
) -> Result<String, DocumentParseError> {
    let download_url = direct_download_url(link.trim());
    let url = Url::parse(&download_url)
        .map_err(|e| DocumentParseError::Fetch(format!("invalid link: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DocumentParseError::Fetch("only http(s) links are supported".to_string()));
    }

    let policy = FetchPolicy {
        timeout: Duration::from_secs(config.fetch_timeout_secs),
        user_agent: USER_AGENT.to_string(),
        accept: "*/*",
        allow_private_hosts: config.allow_private_hosts,
        max_redirects: MAX_REDIRECTS,
    };
    let (url, response) = net_guard::guarded_get(url, &policy)
        .await
        .map_err(fetch_failure)?;

    let status = response.status();
    if !status.is_success() {
        warn!("Document fetch from {} returned {}", url, status);
        return Err(DocumentParseError::Fetch(format!(
            "HTTP error {}; make sure the link is publicly accessible",
            status.as_u16()
        )));
    }

    if let Some(length) = response.content_length() {
        if length > config.max_file_size {
            return Err(DocumentParseError::TooLarge {
                size: length,
                limit: config.max_file_size,
            });
        }
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let kind = remote_kind(&url, &content_type);

    let limit = usize::try_from(config.max_file_size).unwrap_or(usize::MAX);
    let body = net_guard::read_capped(response, limit)
        .await
        .map_err(fetch_failure)?;
    if body.truncated {
        return Err(DocumentParseError::TooLarge {
            size: body.received,
            limit: config.max_file_size,
        });
    }

    let document = UploadedDocument {
        file_name: url.to_string(),
        kind,
        bytes: body.bytes,
    };
    extract_document_text(document, config).await
}
