//! # Proposal Data Model
//!
//! Data structures flowing through the pitch pipeline, from the user's brief
//! to the persisted proposal.
//!
//! ## Core Concepts
//!
//! - **Brief**: what the user told us about the client and the project
//! - **Branding**: logo and primary color scraped from the client's website
//! - **ScopeOfWork**: the brief expanded into proposal sections
//! - **Proposal**: the rendered, persisted result
//!
//! ## Usage
//!
//! ```rust
//! use pitchbot::proposal_model::{Brief, Currency, ProjectScale};
//!
//! let brief = Brief::new("Acme")
//!     .with_url("https://acme.example")
//!     .with_text("Build a CRM")
//!     .with_currency(Currency::Usd)
//!     .with_scale(ProjectScale::High);
//! assert_eq!(brief.project_name(), "Acme Integration");
//! ```

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_BRAND_COLOR;

/// Pricing currency offered to the requester
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    #[serde(rename = "INR")]
    Inr,
    #[serde(rename = "USD")]
    Usd,
}

impl Currency {
    pub const ALL: [Currency; 2] = [Currency::Inr, Currency::Usd];

    /// Parse the user's answer to the currency question
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_uppercase().as_str() {
            "INR" | "₹" | "RUPEES" | "RUPEE" => Some(Currency::Inr),
            "USD" | "$" | "DOLLAR" | "DOLLARS" => Some(Currency::Usd),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Currency::Inr => "INR",
            Currency::Usd => "USD",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Currency::Inr => "₹",
            Currency::Usd => "$",
        }
    }

    /// Price of one person-day of effort in whole currency units
    pub fn day_rate(self) -> u64 {
        match self {
            Currency::Inr => 12_000,
            Currency::Usd => 450,
        }
    }

    /// Format an amount with the currency symbol and local digit grouping
    /// (`₹1,20,000` or `$12,000`)
    pub fn format_amount(self, amount: u64) -> String {
        let digits = amount.to_string();
        let grouped = match self {
            Currency::Inr => group_indian(&digits),
            Currency::Usd => group_thousands(&digits),
        };
        format!("{}{}", self.symbol(), grouped)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut out = String::new();
    for (i, ch) in head.chars().enumerate() {
        if i > 0 && (head.len() - i) % 2 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.push(',');
    out.push_str(tail);
    out
}

/// Rough size of the project, used to pitch the scope at the right level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectScale {
    Small,
    #[default]
    Medium,
    High,
}

impl ProjectScale {
    pub const ALL: [ProjectScale; 3] = [ProjectScale::Small, ProjectScale::Medium, ProjectScale::High];

    /// Parse the user's answer to the scale question; anything unrecognised is `Medium`
    pub fn parse(input: &str) -> Self {
        let choice = input.trim().to_lowercase();
        if choice.contains("small") {
            ProjectScale::Small
        } else if ["high", "large", "enterprise"]
            .iter()
            .any(|word| choice.contains(word))
        {
            ProjectScale::High
        } else {
            ProjectScale::Medium
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProjectScale::Small => "Small",
            ProjectScale::Medium => "Medium",
            ProjectScale::High => "High",
        }
    }

    /// Description handed to the model
    pub fn guidance(self) -> &'static str {
        match self {
            ProjectScale::Small => "an MVP or simple site/app with a lean team",
            ProjectScale::Medium => "a standard full-stack solution",
            ProjectScale::High => "an enterprise system with a complex architecture",
        }
    }
}

impl fmt::Display for ProjectScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// User-supplied input describing a client project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brief {
    pub client_name: String,
    /// Client website, absent when the client has none
    pub client_url: Option<String>,
    pub project_name: Option<String>,
    /// Short free-text requirement
    pub text: Option<String>,
    /// Text extracted from an uploaded or linked document
    pub document_text: Option<String>,
    pub currency: Currency,
    pub scale: ProjectScale,
}

impl Brief {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            client_url: None,
            project_name: None,
            text: None,
            document_text: None,
            currency: Currency::default(),
            scale: ProjectScale::default(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.client_url = Some(url.into());
        self
    }

    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_document_text(mut self, text: impl Into<String>) -> Self {
        self.document_text = Some(text.into());
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_scale(mut self, scale: ProjectScale) -> Self {
        self.scale = scale;
        self
    }

    /// Project name, defaulting to "<client> Integration"
    pub fn project_name(&self) -> String {
        match &self.project_name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!("{} Integration", self.client_name),
        }
    }
}

/// Visual identity scraped from the client's website
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branding {
    /// Absolute logo URL; `None` renders a monogram badge
    pub logo_url: Option<String>,
    /// Primary color as a CSS hex string
    pub primary_color: String,
    /// Site title, when one was found
    pub site_name: Option<String>,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            logo_url: None,
            primary_color: DEFAULT_BRAND_COLOR.to_string(),
            site_name: None,
        }
    }
}

/// Section keys recognised in the model output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeSection {
    Overview,
    Deliverables,
    Team,
    Pricing,
    Roadmap,
    Architecture,
}

impl ScopeSection {
    pub fn key(self) -> &'static str {
        match self {
            ScopeSection::Overview => "overview",
            ScopeSection::Deliverables => "deliverables",
            ScopeSection::Team => "team",
            ScopeSection::Pricing => "pricing",
            ScopeSection::Roadmap => "roadmap",
            ScopeSection::Architecture => "architecture",
        }
    }

    /// Map a markdown heading to a section
    pub fn from_heading(heading: &str) -> Option<Self> {
        let normalized = heading
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        let section = match normalized.as_str() {
            "overview" | "project overview" | "summary" | "executive summary" | "scope" => {
                ScopeSection::Overview
            }
            "deliverables" | "key deliverables" => ScopeSection::Deliverables,
            "team" | "team composition" | "team roles" | "team structure" => ScopeSection::Team,
            "pricing" | "pricing breakdown" | "budget" | "estimate" | "cost estimate" => {
                ScopeSection::Pricing
            }
            "roadmap" | "timeline" | "delivery roadmap" | "milestones" => ScopeSection::Roadmap,
            "architecture" | "technical architecture" | "system architecture" => {
                ScopeSection::Architecture
            }
            _ => return None,
        };
        Some(section)
    }
}

/// One priced line of the breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingLine {
    pub item: String,
    pub effort_days: f64,
    pub amount: u64,
}

/// Pricing in the requested currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub currency: Currency,
    pub lines: Vec<PricingLine>,
    /// Pricing remarks the model gave without an effort figure
    pub notes: Vec<String>,
    pub total: u64,
}

impl PricingBreakdown {
    /// Price `(item, effort_days)` pairs at the currency's day rate
    pub fn price(currency: Currency, items: Vec<(String, f64)>, notes: Vec<String>) -> Self {
        let rate = currency.day_rate() as f64;
        let lines: Vec<PricingLine> = items
            .into_iter()
            .map(|(item, effort_days)| PricingLine {
                item,
                effort_days,
                amount: (effort_days * rate).round() as u64,
            })
            .collect();
        let total = lines
            .iter()
            .fold(0u64, |total, line| total.saturating_add(line.amount));
        Self {
            currency,
            lines,
            notes,
            total,
        }
    }

    pub fn total_effort_days(&self) -> f64 {
        self.lines.iter().map(|line| line.effort_days).sum()
    }
}

/// Brief expanded into proposal sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeOfWork {
    pub overview: String,
    pub deliverables: Vec<String>,
    pub team: Vec<String>,
    pub pricing: PricingBreakdown,
    pub roadmap: Vec<String>,
    /// Service components suggested for the architecture diagram
    pub architecture: Vec<String>,
}

impl ScopeOfWork {
    /// Keys of the sections this scope carries, in rendering order
    pub fn section_keys(&self) -> Vec<&'static str> {
        let mut keys = vec![
            ScopeSection::Overview.key(),
            ScopeSection::Deliverables.key(),
        ];
        if !self.team.is_empty() {
            keys.push(ScopeSection::Team.key());
        }
        keys.push(ScopeSection::Pricing.key());
        if !self.roadmap.is_empty() {
            keys.push(ScopeSection::Roadmap.key());
        }
        if !self.architecture.is_empty() {
            keys.push(ScopeSection::Architecture.key());
        }
        keys
    }
}

/// Where the proposal's architecture image lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagramRef {
    /// Rendered image stored next to the proposal, by public path
    Rendered { path: String },
    /// Rendering failed; the shared placeholder is shown
    Placeholder,
}

impl DiagramRef {
    pub const PLACEHOLDER_PATH: &'static str = "/static/diagram-placeholder.svg";

    pub fn path(&self) -> &str {
        match self {
            DiagramRef::Rendered { path } => path,
            DiagramRef::Placeholder => Self::PLACEHOLDER_PATH,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, DiagramRef::Placeholder)
    }
}

/// Persisted listing entry for a proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalSummary {
    pub id: String,
    pub client_name: String,
    pub project_name: String,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

impl ProposalSummary {
    /// Dashboard path of the proposal
    pub fn url_path(&self) -> String {
        format!("/proposal/{}", self.id)
    }
}

/// The final persisted, renderable output of the pipeline
#[derive(Debug, Clone)]
pub struct Proposal {
    pub id: String,
    pub brief: Brief,
    pub branding: Branding,
    pub scope: ScopeOfWork,
    pub diagram: DiagramRef,
    pub html: String,
    pub html_path: PathBuf,
    /// Rendered diagram on disk, when rendering succeeded
    pub diagram_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl Proposal {
    pub fn summary(&self) -> ProposalSummary {
        ProposalSummary {
            id: self.id.clone(),
            client_name: self.brief.client_name.clone(),
            project_name: self.brief.project_name(),
            currency: self.brief.currency,
            created_at: self.created_at,
        }
    }

    pub fn url_path(&self) -> String {
        format!("/proposal/{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_saturates_instead_of_overflowing() {
        let pricing = PricingBreakdown::price(
            Currency::Usd,
            vec![("A".to_string(), 1e20), ("B".to_string(), 1e20)],
            Vec::new(),
        );
        assert_eq!(pricing.lines[0].amount, u64::MAX);
        assert_eq!(pricing.total, u64::MAX);
    }

    #[test]
    fn test_currency_parsing() {
        assert_eq!(Currency::parse("inr"), Some(Currency::Inr));
        assert_eq!(Currency::parse(" ₹ "), Some(Currency::Inr));
        assert_eq!(Currency::parse("Dollars"), Some(Currency::Usd));
        assert_eq!(Currency::parse("$"), Some(Currency::Usd));
        assert_eq!(Currency::parse("EUR"), None);
    }

    #[test]
    fn test_amount_grouping() {
        assert_eq!(Currency::Usd.format_amount(0), "$0");
        assert_eq!(Currency::Usd.format_amount(999), "$999");
        assert_eq!(Currency::Usd.format_amount(12_000), "$12,000");
        assert_eq!(Currency::Usd.format_amount(1_234_567), "$1,234,567");
        assert_eq!(Currency::Inr.format_amount(999), "₹999");
        assert_eq!(Currency::Inr.format_amount(120_000), "₹1,20,000");
        assert_eq!(Currency::Inr.format_amount(12_345_678), "₹1,23,45,678");
    }

    #[test]
    fn test_scale_parsing() {
        assert_eq!(ProjectScale::parse("small please"), ProjectScale::Small);
        assert_eq!(ProjectScale::parse("Enterprise"), ProjectScale::High);
        assert_eq!(ProjectScale::parse("large"), ProjectScale::High);
        assert_eq!(ProjectScale::parse("whatever"), ProjectScale::Medium);
    }

    #[test]
    fn test_section_headings() {
        assert_eq!(ScopeSection::from_heading("Overview"), Some(ScopeSection::Overview));
        assert_eq!(ScopeSection::from_heading(" Timeline: "), Some(ScopeSection::Roadmap));
        assert_eq!(ScopeSection::from_heading("**Budget**"), Some(ScopeSection::Pricing));
        assert_eq!(ScopeSection::from_heading("Appendix"), None);
    }

    #[test]
    fn test_pricing_totals() {
        let pricing = PricingBreakdown::price(
            Currency::Usd,
            vec![("Design".to_string(), 5.0), ("Build".to_string(), 10.5)],
            vec![],
        );
        assert_eq!(pricing.lines[0].amount, 2_250);
        assert_eq!(pricing.lines[1].amount, 4_725);
        assert_eq!(pricing.total, 6_975);
        assert_eq!(pricing.total_effort_days(), 15.5);
    }

    #[test]
    fn test_project_name_default() {
        assert_eq!(Brief::new("Acme").project_name(), "Acme Integration");
        assert_eq!(
            Brief::new("Acme").with_project_name("  CRM  ").project_name(),
            "CRM"
        );
    }
}
