//! Pitch dialogue module: per-chat conversation state for the guided `/pitch`
//! flow, plus the validators for each answer.

use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::branding::normalize_url;
use crate::config::MAX_BRIEF_CHARS;
use crate::proposal_model::{Brief, Currency, ProjectScale};

/// Minutes of inactivity after which a pitch session is discarded
pub const SESSION_TIMEOUT_MINUTES: i64 = 30;

const MAX_CLIENT_NAME_CHARS: usize = 100;

lazy_static! {
    static ref URL_IN_TEXT: Regex = Regex::new(r"(https?://\S+|www\.\S+)").unwrap();
}

/// Answers collected so far in a guided pitch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PitchDraft {
    pub client_name: String,
    pub client_url: Option<String>,
    pub brief_text: Option<String>,
    pub currency: Option<Currency>,
    pub scale: Option<ProjectScale>,
    pub language_code: Option<String>,
    pub last_activity: DateTime<Utc>,
}

impl PitchDraft {
    pub fn new(client_name: String, client_url: Option<String>, language_code: Option<String>) -> Self {
        Self {
            client_name,
            client_url,
            brief_text: None,
            currency: None,
            scale: None,
            language_code,
            last_activity: Utc::now(),
        }
    }

    /// Mark the draft as active now
    pub fn touch(mut self) -> Self {
        self.last_activity = Utc::now();
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.last_activity, now)
    }

    /// Brief for the pipeline; unanswered questions take their defaults
    pub fn to_brief(&self) -> Brief {
        let mut brief = Brief::new(self.client_name.clone())
            .with_currency(self.currency.unwrap_or_default())
            .with_scale(self.scale.unwrap_or_default());
        if let Some(url) = &self.client_url {
            brief = brief.with_url(url.clone());
        }
        if let Some(text) = &self.brief_text {
            brief = brief.with_text(text.clone());
        }
        brief
    }
}

/// Represents the conversation state for the guided pitch
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum PitchDialogueState {
    #[default]
    Start,
    AwaitingClientInfo {
        language_code: Option<String>,
        started_at: DateTime<Utc>,
    },
    AwaitingBrief {
        draft: PitchDraft,
    },
    AwaitingCurrency {
        draft: PitchDraft,
    },
    AwaitingScale {
        draft: PitchDraft,
    },
    AwaitingDocument {
        draft: PitchDraft,
    },
}

impl PitchDialogueState {
    /// Time of the last answer, `None` when no pitch is in progress
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        match self {
            PitchDialogueState::Start => None,
            PitchDialogueState::AwaitingClientInfo { started_at, .. } => Some(*started_at),
            PitchDialogueState::AwaitingBrief { draft }
            | PitchDialogueState::AwaitingCurrency { draft }
            | PitchDialogueState::AwaitingScale { draft }
            | PitchDialogueState::AwaitingDocument { draft } => Some(draft.last_activity),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.last_activity()
            .map(|last| is_expired(last, now))
            .unwrap_or(false)
    }
}

/// Type alias for our pitch dialogue
pub type PitchDialogue = Dialogue<PitchDialogueState, InMemStorage<PitchDialogueState>>;

pub fn is_expired(last_activity: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - last_activity > Duration::minutes(SESSION_TIMEOUT_MINUTES)
}

fn is_skip(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "skip" | "none" | "no" | "-")
}

pub fn is_cancel(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    input == "cancel" || input == "/cancel"
}

/// Validates the client info answer: a name, then a URL or `skip`.
///
/// `Acme https://acme.com`, `Acme www.acme.com` and `Acme skip` are all
/// accepted; a bare name means the client has no website.
pub fn parse_client_info(input: &str) -> Result<(String, Option<String>), &'static str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty");
    }

    let (name, url) = match URL_IN_TEXT.find(trimmed) {
        Some(found) => {
            let name = format!("{} {}", &trimmed[..found.start()], &trimmed[found.end()..]);
            (name, Some(normalize_url(found.as_str())))
        }
        None => {
            let name = match trimmed.rsplit_once(char::is_whitespace) {
                Some((name, last)) if is_skip(last) => name.to_string(),
                _ => trimmed.to_string(),
            };
            (name, None)
        }
    };

    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() || is_skip(&name) {
        return Err("missing_name");
    }
    if name.chars().count() > MAX_CLIENT_NAME_CHARS {
        return Err("too_long");
    }
    Ok((name, url))
}

/// Validates the brief answer; `skip` means no brief
pub fn validate_brief(input: &str) -> Result<Option<String>, &'static str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty");
    }
    if is_skip(trimmed) {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_BRIEF_CHARS {
        return Err("too_long");
    }
    Ok(Some(trimmed.to_string()))
}

/// What the user answered at the document step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentReply {
    Skip,
    Link(String),
    Invalid,
}

pub fn parse_document_reply(input: &str) -> DocumentReply {
    let trimmed = input.trim();
    if is_skip(trimmed) {
        return DocumentReply::Skip;
    }
    match URL_IN_TEXT.find(trimmed) {
        Some(found) => DocumentReply::Link(normalize_url(found.as_str())),
        None => DocumentReply::Invalid,
    }
}

/// Arguments of the quick `/pitch <url> [project name]` form
pub fn parse_quick_pitch(args: &str) -> Option<(String, Option<String>)> {
    let mut parts = args.trim().splitn(2, char::is_whitespace);
    let first = parts.next()?;
    let url = URL_IN_TEXT.find(first).filter(|m| m.start() == 0)?;
    let project = parts
        .next()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    Some((normalize_url(url.as_str()), project))
}
