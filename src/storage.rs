//! # Proposal Storage
//!
//! Flat-file persistence for compiled proposals:
//!
//! ```text
//! <data_dir>/proposals/<id>/proposal.html
//! <data_dir>/proposals/<id>/architecture.png   (when rendering succeeded)
//! <data_dir>/proposals/<id>/meta.json
//! ```
//!
//! Identifiers are `<client-slug>-<YYYYMMDD>-<HHMMSS>`. Allocation creates the
//! proposal directory atomically, so concurrent requests in the same second
//! get `-2`, `-3`, ... suffixes instead of overwriting each other.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::pitch_errors::StorageError;
use crate::proposal_model::ProposalSummary;

pub const HTML_FILE: &str = "proposal.html";
pub const DIAGRAM_FILE: &str = "architecture.png";
pub const META_FILE: &str = "meta.json";

const MAX_SLUG_LEN: usize = 40;
const MAX_ID_LEN: usize = 80;
const MAX_SUFFIX: u32 = 100;

/// Store rooted at `<data_dir>/proposals`
#[derive(Debug, Clone)]
pub struct ProposalStore {
    root: PathBuf,
}

impl ProposalStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            root: data_dir.as_ref().join("proposals"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a proposal; the id must already be validated
    fn dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Reserve a fresh identifier and create its directory
    pub async fn allocate(&self, client_name: &str, at: DateTime<Utc>) -> Result<String, StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::io(&self.root, e))?;

        let base = format!("{}-{}", slugify(client_name), at.format("%Y%m%d-%H%M%S"));
        for attempt in 1..=MAX_SUFFIX {
            let id = if attempt == 1 {
                base.clone()
            } else {
                format!("{base}-{attempt}")
            };
            let dir = self.dir(&id);
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => {
                    debug!("Allocated proposal directory {id}");
                    return Ok(id);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StorageError::io(dir, e)),
            }
        }
        Err(StorageError::IdExhausted(base))
    }

    pub async fn write_diagram(&self, id: &str, png: &[u8]) -> Result<PathBuf, StorageError> {
        validate_id(id)?;
        let path = self.dir(id).join(DIAGRAM_FILE);
        write_atomic(&path, png).await?;
        Ok(path)
    }

    /// Write the document and its listing metadata; returns the document path
    pub async fn write_proposal(
        &self,
        id: &str,
        html: &str,
        summary: &ProposalSummary,
    ) -> Result<PathBuf, StorageError> {
        validate_id(id)?;
        let dir = self.dir(id);
        let html_path = dir.join(HTML_FILE);
        write_atomic(&html_path, html.as_bytes()).await?;

        let meta = serde_json::to_vec_pretty(summary)?;
        write_atomic(&dir.join(META_FILE), &meta).await?;
        Ok(html_path)
    }

    /// Stored document, `None` when the proposal does not exist
    pub async fn load_html(&self, id: &str) -> Result<Option<String>, StorageError> {
        validate_id(id)?;
        let path = self.dir(id).join(HTML_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(html) => Ok(Some(html)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    pub async fn load_diagram(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        validate_id(id)?;
        let path = self.dir(id).join(DIAGRAM_FILE);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    /// All completed proposals, newest first
    pub async fn list(&self) -> Result<Vec<ProposalSummary>, StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.root, e)),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.root, e))?
        {
            let meta_path = entry.path().join(META_FILE);
            let raw = match tokio::fs::read(&meta_path).await {
                Ok(raw) => raw,
                Err(e) => {
                    debug!("Skipping incomplete proposal {}: {e}", meta_path.display());
                    continue;
                }
            };
            match serde_json::from_slice::<ProposalSummary>(&raw) {
                Ok(summary) => summaries.push(summary),
                Err(e) => warn!(
                    "Skipping unreadable proposal metadata {}: {e}",
                    meta_path.display()
                ),
            }
        }

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(summaries)
    }

    /// Newest `limit` proposals
    pub async fn recent(&self, limit: usize) -> Result<Vec<ProposalSummary>, StorageError> {
        let mut all = self.list().await?;
        all.truncate(limit);
        Ok(all)
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| StorageError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StorageError::io(path, e))
}

/// Lowercase ASCII slug of a client name, `client` when nothing usable remains
pub fn slugify(name: &str) -> String {
    let mut slug = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "client".to_string()
    } else {
        slug.to_string()
    }
}

/// Reject identifiers that could escape the store
pub fn validate_id(id: &str) -> Result<(), StorageError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && !id.starts_with('-')
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidId(id.to_string()))
    }
}
