//! # Brief Expander
//!
//! Expands a short brief (plus any document text) into a [`ScopeOfWork`] with
//! one call to the generative model. The model estimates effort in
//! person-days and never sees the currency; amounts are priced locally, so
//! switching currency changes only the pricing unit, never the sections.

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
use crate::document::truncate_words;
use crate::llm_client::TextGenerator;
use crate::pitch_errors::GenerationError;
use crate::proposal_model::{Brief, Currency, PricingBreakdown, ScopeOfWork, ScopeSection};

lazy_static! {
    static ref HEADING: Regex = Regex::new(r"^\s*#{1,6}\s*(.+?)\s*#*\s*$").unwrap();
    static ref BOLD_HEADING: Regex = Regex::new(r"^\s*\*\*([^*]+?)\*\*:?\s*$").unwrap();
    static ref LIST_MARKER: Regex = Regex::new(r"^\s*(?:[-*+•]|\d+[.)])\s+").unwrap();
    static ref EFFORT_AFTER_SEPARATOR: Regex = Regex::new(
        r"(?i)^(?P<item>.+?)\s*[:\-–—|]\s*(?:~|approx\.?\s*|about\s+)?(?P<days>\d+(?:\.\d+)?)\s*(?:person[- ]?|man[- ]?)?days?\b"
    )
    .unwrap();
    static ref EFFORT_IN_PARENS: Regex = Regex::new(
        r"(?i)^(?P<item>.+?)\s*\(\s*(?P<days>\d+(?:\.\d+)?)\s*(?:person[- ]?|man[- ]?)?days?\s*\)"
    )
    .unwrap();
}

/// Effort above this on a single line is treated as a remark, not a price
pub const MAX_LINE_EFFORT_DAYS: f64 = 1_000.0;

pub const SYSTEM_PROMPT: &str = "You are a senior solution architect at a software consultancy. \
You turn short client briefs into clear, realistic proposal scopes. \
Write in a confident, professional tone and never invent facts about the client.";

const OUTPUT_INSTRUCTIONS: &str = "Respond in markdown with exactly these level-2 headings, in this order:
## Overview
One or two paragraphs describing the project and the proposed approach.
## Deliverables
A bullet list of concrete deliverables.
## Team
A bullet list of roles with their allocation, e.g. `- Backend engineer (full-time)`.
## Pricing
A bullet list of work packages with effort in person-days, strictly in the form `- <work package>: <N> days`. Do not mention money or currencies.
## Roadmap
A bullet list of phases with durations, e.g. `- Week 1-2: Discovery and UX`.
## Architecture
A bullet list of at most four backend services or components, names only.";

/// Expands briefs through a [`TextGenerator`]
#[derive(Clone)]
pub struct BriefExpander {
    generator: Arc<dyn TextGenerator>,
    max_prompt_words: usize,
}

impl BriefExpander {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &GenerationConfig) -> Self {
        Self {
            generator,
            max_prompt_words: config.max_prompt_words,
        }
    }

    /// Expand the brief into a scope of work with a single model call
    pub async fn expand(&self, brief: &Brief) -> Result<ScopeOfWork, GenerationError> {
        let prompt = build_prompt(brief, self.max_prompt_words);
        debug!(prompt_chars = prompt.len(), "Sending brief to generative model");

        let output = self.generator.generate(SYSTEM_PROMPT, &prompt).await?;
        let scope = parse_scope(&output, brief.currency)?;

        info!(
            client = %brief.client_name,
            deliverables = scope.deliverables.len(),
            priced_lines = scope.pricing.lines.len(),
            "Brief expanded"
        );
        Ok(scope)
    }
}

/// Build the single user prompt for a brief
pub fn build_prompt(brief: &Brief, max_document_words: usize) -> String {
    let text = brief
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("(none provided)");
    let document = brief
        .document_text
        .as_deref()
        .map(|doc| truncate_words(doc, max_document_words))
        .unwrap_or_else(|| "(none provided)".to_string());

    format!(
        "Write the scope of work for a project proposal.\n\n\
         Client: {client}\n\
         Project: {project}\n\
         Client website: {website}\n\
         Project scale: {scale} ({guidance})\n\n\
         Brief requirement:\n{text}\n\n\
         Detailed requirement document:\n{document}\n\n\
         {instructions}",
        client = brief.client_name,
        project = brief.project_name(),
        website = brief.client_url.as_deref().unwrap_or("none"),
        scale = brief.scale,
        guidance = brief.scale.guidance(),
        instructions = OUTPUT_INSTRUCTIONS,
    )
}

/// Parse model output into a scope priced in `currency`
pub fn parse_scope(output: &str, currency: Currency) -> Result<ScopeOfWork, GenerationError> {
    let sections = split_sections(output);

    let overview = sections
        .get(&ScopeSection::Overview)
        .map(|lines| {
            lines
                .iter()
                .map(|line| strip_emphasis(line.trim()))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|overview| !overview.is_empty())
        .ok_or(GenerationError::MissingSection("overview"))?;

    let list = |section: ScopeSection| {
        sections
            .get(&section)
            .map(|lines| list_items(lines))
            .unwrap_or_default()
    };

    let deliverables = list(ScopeSection::Deliverables);
    if deliverables.is_empty() {
        return Err(GenerationError::MissingSection("deliverables"));
    }

    let pricing_lines = sections
        .get(&ScopeSection::Pricing)
        .ok_or(GenerationError::MissingSection("pricing"))?;
    let pricing = parse_pricing(&list_items(pricing_lines), currency)?;

    let architecture = list(ScopeSection::Architecture)
        .iter()
        .map(|item| component_name(item))
        .filter(|name| !name.is_empty())
        .collect();

    Ok(ScopeOfWork {
        overview,
        deliverables,
        team: list(ScopeSection::Team),
        pricing,
        roadmap: list(ScopeSection::Roadmap),
        architecture,
    })
}

/// Group lines under recognised headings; text under unknown headings is dropped
fn split_sections(output: &str) -> HashMap<ScopeSection, Vec<String>> {
    let mut sections: HashMap<ScopeSection, Vec<String>> = HashMap::new();
    let mut current: Option<ScopeSection> = None;

    for line in output.lines() {
        let heading = HEADING
            .captures(line)
            .or_else(|| BOLD_HEADING.captures(line))
            .map(|caps| caps[1].to_string());

        if let Some(heading) = heading {
            current = ScopeSection::from_heading(&heading);
            if let Some(section) = current {
                sections.entry(section).or_default();
            }
            continue;
        }

        if let Some(section) = current {
            sections.entry(section).or_default().push(line.to_string());
        }
    }
    sections
}

/// Bullet or numbered items in order; wrapped lines join the previous item
fn list_items(lines: &[String]) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if LIST_MARKER.is_match(line) {
            let item = strip_emphasis(LIST_MARKER.replace(line, "").trim());
            if !item.is_empty() {
                items.push(item);
            }
        } else if let Some(last) = items.last_mut() {
            last.push(' ');
            last.push_str(&strip_emphasis(trimmed));
        } else {
            items.push(strip_emphasis(trimmed));
        }
    }
    items
}

fn strip_emphasis(text: &str) -> String {
    text.replace("**", "").replace("__", "").replace('`', "")
}

fn parse_pricing(items: &[String], currency: Currency) -> Result<PricingBreakdown, GenerationError> {
    let mut priced = Vec::new();
    let mut notes = Vec::new();

    for item in items {
        if item.to_lowercase().starts_with("total") {
            continue;
        }
        let caps = EFFORT_AFTER_SEPARATOR
            .captures(item)
            .or_else(|| EFFORT_IN_PARENS.captures(item));
        let parsed = caps.and_then(|caps| {
            let days = caps["days"].parse::<f64>().ok()?;
            let name = caps["item"].trim().trim_end_matches([':', '-', '–', '—', '|']).trim();
            if days > MAX_LINE_EFFORT_DAYS {
                warn!(item = %name, days, "Implausible effort estimate kept as a note");
                return None;
            }
            (days > 0.0 && !name.is_empty()).then(|| (name.to_string(), days))
        });
        match parsed {
            Some(line) => priced.push(line),
            None => notes.push(item.clone()),
        }
    }

    if priced.is_empty() {
        return Err(GenerationError::UnpricedScope);
    }
    Ok(PricingBreakdown::price(currency, priced, notes))
}

/// Service name without any trailing description
fn component_name(item: &str) -> String {
    let name = item
        .split([':', '(', '—', '–'])
        .next()
        .unwrap_or_default();
    let name = name.split(" - ").next().unwrap_or_default().trim();
    name.chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Here is the scope.

## Overview
Acme needs a **CRM** to track leads.
It will replace spreadsheets.

## Deliverables
- Lead management web app
- Reporting dashboard
  with weekly exports

## Team
- Project manager (part-time)
- Backend engineer (full-time)

## Pricing
- Discovery and UX: 5 days
- Backend development: 20 person-days
- QA (4.5 days)
- Hosting costs billed at actuals
- Total: 29.5 days

## Roadmap
1. Week 1: Discovery
2. Weeks 2-5: Build

## Architecture
- Auth Service: handles login
- Lead Service
";

    #[test]
    fn test_parse_full_scope() {
        let scope = parse_scope(SAMPLE, Currency::Usd).unwrap();
        assert_eq!(
            scope.overview,
            "Acme needs a CRM to track leads.\nIt will replace spreadsheets."
        );
        assert_eq!(
            scope.deliverables,
            vec![
                "Lead management web app".to_string(),
                "Reporting dashboard with weekly exports".to_string()
            ]
        );
        assert_eq!(scope.team.len(), 2);
        assert_eq!(scope.roadmap, vec!["Week 1: Discovery", "Weeks 2-5: Build"]);
        assert_eq!(scope.architecture, vec!["Auth Service", "Lead Service"]);

        let pricing = &scope.pricing;
        assert_eq!(pricing.lines.len(), 3);
        assert_eq!(pricing.lines[0].item, "Discovery and UX");
        assert_eq!(pricing.lines[1].effort_days, 20.0);
        assert_eq!(pricing.lines[2].item, "QA");
        assert_eq!(pricing.notes, vec!["Hosting costs billed at actuals"]);
        assert_eq!(pricing.total, (29.5 * 450.0) as u64);
    }

    #[test]
    fn test_currency_changes_only_pricing() {
        let usd = parse_scope(SAMPLE, Currency::Usd).unwrap();
        let inr = parse_scope(SAMPLE, Currency::Inr).unwrap();

        assert_eq!(usd.section_keys(), inr.section_keys());
        assert_eq!(usd.deliverables, inr.deliverables);
        assert_eq!(usd.pricing.total_effort_days(), inr.pricing.total_effort_days());
        assert_eq!(usd.pricing.currency, Currency::Usd);
        assert_eq!(inr.pricing.currency, Currency::Inr);
        assert_eq!(inr.pricing.total, 354_000);
    }

    #[test]
    fn test_missing_required_sections() {
        let no_pricing = "## Overview\nText\n## Deliverables\n- One\n";
        assert!(matches!(
            parse_scope(no_pricing, Currency::Usd),
            Err(GenerationError::MissingSection("pricing"))
        ));

        let no_overview = "## Deliverables\n- One\n## Pricing\n- Build: 3 days\n";
        assert!(matches!(
            parse_scope(no_overview, Currency::Usd),
            Err(GenerationError::MissingSection("overview"))
        ));

        let unpriced = "## Overview\nText\n## Deliverables\n- One\n## Pricing\n- Fixed fee\n";
        assert!(matches!(
            parse_scope(unpriced, Currency::Usd),
            Err(GenerationError::UnpricedScope)
        ));
    }

    #[test]
    fn test_implausible_effort_is_not_priced() {
        let huge = "## Overview\nText\n## Deliverables\n- One\n## Pricing\n\
            - A: 99999999999999999999 days\n- B: 99999999999999999999 days\n";
        assert!(matches!(
            parse_scope(huge, Currency::Usd),
            Err(GenerationError::UnpricedScope)
        ));

        let mixed = "## Overview\nText\n## Deliverables\n- One\n## Pricing\n\
            - Build: 10 days\n- Support: 5000 days\n";
        let scope = parse_scope(mixed, Currency::Usd).unwrap();
        assert_eq!(scope.pricing.lines.len(), 1);
        assert_eq!(scope.pricing.total, 10 * 450);
        assert_eq!(scope.pricing.notes, vec!["Support: 5000 days".to_string()]);
    }

    #[test]
    fn test_bold_and_synonym_headings() {
        let output = "**Summary**\nA portal.\n**Key Deliverables**\n- Portal\n**Budget:**\n- Build: 10 days\n";
        let scope = parse_scope(output, Currency::Inr).unwrap();
        assert_eq!(scope.overview, "A portal.");
        assert_eq!(scope.pricing.total, 120_000);
        assert!(scope.team.is_empty());
    }

    #[test]
    fn test_prompt_excludes_currency() {
        let brief = Brief::new("Acme")
            .with_text("Build a CRM")
            .with_currency(Currency::Inr);
        let inr_prompt = build_prompt(&brief, 100);
        let usd_prompt = build_prompt(&brief.clone().with_currency(Currency::Usd), 100);

        assert_eq!(inr_prompt, usd_prompt);
        assert!(inr_prompt.contains("Build a CRM"));
        assert!(inr_prompt.contains("Client: Acme"));
        assert!(!inr_prompt.contains("INR"));
    }

    #[test]
    fn test_prompt_truncates_document() {
        let brief = Brief::new("Acme").with_document_text("a b c d e f");
        let prompt = build_prompt(&brief, 3);
        assert!(prompt.contains("a b c\n\n[... truncated to 3 words]"));
    }
}
