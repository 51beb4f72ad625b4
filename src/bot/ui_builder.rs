//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::localization::{t_args_lang, t_lang};
use crate::pipeline::PitchStage;
use crate::pitch_errors::PitchError;
use crate::proposal_model::{Currency, ProjectScale, Proposal, ProposalSummary};

const CURRENCY_PREFIX: &str = "currency_";
const SCALE_PREFIX: &str = "scale_";

/// An inline keyboard answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackChoice {
    Currency(Currency),
    Scale(ProjectScale),
}

/// Decode callback data produced by the keyboards below
pub fn parse_callback(data: &str) -> Option<CallbackChoice> {
    if let Some(code) = data.strip_prefix(CURRENCY_PREFIX) {
        return Currency::parse(code).map(CallbackChoice::Currency);
    }
    data.strip_prefix(SCALE_PREFIX)
        .filter(|label| ProjectScale::ALL.iter().any(|s| s.label() == *label))
        .map(|label| CallbackChoice::Scale(ProjectScale::parse(label)))
}

/// Create inline keyboard for the currency question
pub fn create_currency_keyboard() -> InlineKeyboardMarkup {
    let buttons = Currency::ALL
        .iter()
        .map(|currency| {
            InlineKeyboardButton::callback(
                format!("{} {}", currency.symbol(), currency.code()),
                format!("{CURRENCY_PREFIX}{}", currency.code()),
            )
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(vec![buttons])
}

/// Create inline keyboard for the scale question, one option per row
pub fn create_scale_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    let rows = ProjectScale::ALL
        .iter()
        .map(|scale| {
            let key = match scale {
                ProjectScale::Small => "pitch-scale-small",
                ProjectScale::Medium => "pitch-scale-medium",
                ProjectScale::High => "pitch-scale-high",
            };
            vec![InlineKeyboardButton::callback(
                t_lang(key, language_code),
                format!("{SCALE_PREFIX}{}", scale.label()),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

pub fn welcome_message(language_code: Option<&str>) -> String {
    format!(
        "👋 {}\n\n{}\n\n{}",
        t_lang("welcome-title", language_code),
        t_lang("welcome-description", language_code),
        t_lang("welcome-commands", language_code)
    )
}

pub fn help_message(language_code: Option<&str>) -> String {
    [
        t_lang("help-title", language_code),
        t_lang("help-steps", language_code),
        t_lang("help-formats", language_code),
        t_lang("welcome-commands", language_code),
        t_lang("help-tips", language_code),
    ]
    .join("\n\n")
}

/// Public link of a stored proposal
pub fn proposal_link(base_url: &str, url_path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), url_path)
}

/// Format the recent proposals list
pub fn format_proposal_list(
    summaries: &[ProposalSummary],
    base_url: &str,
    language_code: Option<&str>,
) -> String {
    if summaries.is_empty() {
        return t_lang("proposals-empty", language_code);
    }

    let mut result = format!("📋 {}\n", t_lang("proposals-title", language_code));
    for (i, summary) in summaries.iter().enumerate() {
        result.push_str(&format!(
            "\n{}. {} | {} ({}, {})\n{}\n",
            i + 1,
            summary.client_name,
            summary.project_name,
            summary.currency,
            summary.created_at.format("%Y-%m-%d"),
            proposal_link(base_url, &summary.url_path())
        ));
    }
    result
}

/// Completion message, also used as the photo caption
pub fn ready_message(proposal: &Proposal, base_url: &str, language_code: Option<&str>) -> String {
    let key = if proposal.diagram.is_placeholder() {
        "pitch-ready-placeholder"
    } else {
        "pitch-ready"
    };
    let url = proposal_link(base_url, &proposal.url_path());
    format!(
        "✅ {}",
        t_args_lang(
            key,
            &[("client", proposal.brief.client_name.as_str()), ("url", url.as_str())],
            language_code,
        )
    )
}

pub fn stage_label(stage: PitchStage, language_code: Option<&str>) -> String {
    let key = match stage {
        PitchStage::CollectingInput => "stage-collecting-input",
        PitchStage::ExtractingBranding => "stage-extracting-branding",
        PitchStage::ExpandingBrief => "stage-expanding-brief",
        PitchStage::RenderingDiagram => "stage-rendering-diagram",
        PitchStage::Compiling => "stage-compiling",
        PitchStage::Delivered => "stage-delivered",
        PitchStage::Failed => "stage-failed",
    };
    t_lang(key, language_code)
}

/// Failure message naming the stage that halted the pitch
pub fn failure_message(err: &PitchError, language_code: Option<&str>) -> String {
    let stage = stage_label(err.stage(), language_code);
    let reason = err.to_string();
    format!(
        "❌ {}",
        t_args_lang(
            "pitch-failed",
            &[("stage", stage.as_str()), ("reason", reason.as_str())],
            language_code,
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_callback_round_trip_through_keyboards() {
        let currency_keyboard = create_currency_keyboard();
        let scale_keyboard = create_scale_keyboard(None);

        let mut choices = Vec::new();
        for button in currency_keyboard
            .inline_keyboard
            .iter()
            .chain(scale_keyboard.inline_keyboard.iter())
            .flatten()
        {
            if let InlineKeyboardButtonKind::CallbackData(data) = &button.kind {
                choices.push(parse_callback(data).unwrap());
            }
        }

        assert_eq!(
            choices,
            vec![
                CallbackChoice::Currency(Currency::Inr),
                CallbackChoice::Currency(Currency::Usd),
                CallbackChoice::Scale(ProjectScale::Small),
                CallbackChoice::Scale(ProjectScale::Medium),
                CallbackChoice::Scale(ProjectScale::High),
            ]
        );
    }

    #[test]
    fn test_unknown_callback_data() {
        assert_eq!(parse_callback("currency_EUR"), None);
        assert_eq!(parse_callback("scale_Huge"), None);
        assert_eq!(parse_callback("edit_1"), None);
    }

    #[test]
    fn test_proposal_list_format() {
        let summaries = vec![ProposalSummary {
            id: "acme-20240301-093000".into(),
            client_name: "Acme".into(),
            project_name: "CRM".into(),
            currency: Currency::Usd,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        }];
        let text = format_proposal_list(&summaries, "https://pitch.example/", None);
        assert!(text.contains("1. Acme | CRM (USD, 2024-03-01)"));
        assert!(text.contains("https://pitch.example/proposal/acme-20240301-093000"));
    }

    #[test]
    fn test_failure_message_names_stage() {
        let err = PitchError::from(crate::pitch_errors::GenerationError::EmptyContent);
        let text = failure_message(&err, Some("en-US"));
        assert!(text.contains("writing the scope of work"));
    }
}
