//! Message Handler module for processing incoming Telegram messages

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use teloxide::prelude::*;
use tracing::{debug, error, info, warn};

use crate::dialogue::{is_cancel, parse_quick_pitch, PitchDialogue, PitchDialogueState};
use crate::document::{DocumentKind, UploadedDocument};
use crate::localization::{t_args_lang, t_lang};
use crate::proposal_model::ProjectScale;

use super::dialogue_manager::{
    apply_scale, handle_brief_input, handle_client_info_input, handle_currency_input,
    handle_document_text_input, spawn_generation, start_pitch, PitchRequest,
};
use super::ui_builder::{format_proposal_list, help_message, welcome_message};
use super::{BotContext, RECENT_PROPOSALS};

/// Download a Telegram file into memory
pub async fn download_file(bot: &Bot, file_id: teloxide::types::FileId) -> Result<Vec<u8>> {
    let file = bot.get_file(file_id).await?;
    let url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    );

    download_bytes(&url).await
}

/// GET a URL into memory. Errors carry no URL, since file links embed the bot token.
pub async fn download_bytes(url: &str) -> Result<Vec<u8>> {
    let fetch = async {
        let response = reqwest::get(url).await?.error_for_status()?;
        response.bytes().await
    };
    let bytes = fetch.await.map_err(reqwest::Error::without_url)?;
    Ok(bytes.to_vec())
}

/// Split `/command@botname args` into the command and its arguments
pub fn parse_command(text: &str) -> Option<(String, &str)> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }
    let (head, args) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    let command = head.split('@').next().unwrap_or(head).to_lowercase();
    Some((command, args.trim()))
}

fn message_language(msg: &Message) -> Option<&str> {
    msg.from
        .as_ref()
        .and_then(|user| user.language_code.as_deref())
}

/// Current dialogue state, discarding sessions idle for too long
async fn active_state(
    bot: &Bot,
    msg: &Message,
    dialogue: &PitchDialogue,
    language_code: Option<&str>,
) -> Result<PitchDialogueState> {
    let state = dialogue.get().await?.unwrap_or_default();
    if state.is_expired(Utc::now()) {
        info!(user_id = %msg.chat.id, "Pitch session expired");
        dialogue.exit().await?;
        bot.send_message(msg.chat.id, t_lang("session-expired", language_code))
            .await?;
        return Ok(PitchDialogueState::Start);
    }
    Ok(state)
}

#[allow(clippy::too_many_arguments)]
async fn handle_command(
    bot: &Bot,
    msg: &Message,
    dialogue: PitchDialogue,
    ctx: Arc<BotContext>,
    command: &str,
    args: &str,
    state: &PitchDialogueState,
    language_code: Option<&str>,
) -> Result<()> {
    match command {
        "/start" => {
            bot.send_message(msg.chat.id, welcome_message(language_code))
                .await?;
        }
        "/help" => {
            bot.send_message(msg.chat.id, help_message(language_code))
                .await?;
        }
        "/cancel" => cancel_pitch(bot, msg, dialogue, state, language_code).await?,
        "/proposals" => {
            let text = match ctx.pipeline.store().recent(RECENT_PROPOSALS).await {
                Ok(summaries) => format_proposal_list(&summaries, &ctx.public_base_url, language_code),
                Err(e) => {
                    error!(user_id = %msg.chat.id, error = %e, "Failed to list proposals");
                    t_lang("proposals-empty", language_code)
                }
            };
            bot.send_message(msg.chat.id, text).await?;
        }
        "/pitch" if args.is_empty() => {
            start_pitch(bot, msg.chat.id, dialogue, language_code).await?;
        }
        "/pitch" => match parse_quick_pitch(args) {
            Some((url, project_name)) => {
                dialogue.exit().await?;
                info!(user_id = %msg.chat.id, url = %url, "Quick pitch requested");
                spawn_generation(
                    bot.clone(),
                    msg.chat.id,
                    ctx,
                    PitchRequest::Quick { url, project_name },
                    language_code.map(str::to_string),
                );
            }
            None => {
                bot.send_message(msg.chat.id, t_lang("pitch-quick-invalid", language_code))
                    .await?;
            }
        },
        _ => {
            bot.send_message(msg.chat.id, t_lang("text-response", language_code))
                .await?;
        }
    }
    Ok(())
}

async fn cancel_pitch(
    bot: &Bot,
    msg: &Message,
    dialogue: PitchDialogue,
    state: &PitchDialogueState,
    language_code: Option<&str>,
) -> Result<()> {
    let key = if matches!(state, PitchDialogueState::Start) {
        "cancel-nothing"
    } else {
        "cancel-done"
    };
    dialogue.exit().await?;
    bot.send_message(msg.chat.id, t_lang(key, language_code)).await?;
    Ok(())
}

async fn handle_text_message(
    bot: &Bot,
    msg: &Message,
    dialogue: PitchDialogue,
    ctx: Arc<BotContext>,
    text: &str,
) -> Result<()> {
    debug!(user_id = %msg.chat.id, message_length = text.len(), "Received text message from user");
    let language_code = message_language(msg);
    let state = active_state(bot, msg, &dialogue, language_code).await?;

    if let Some((command, args)) = parse_command(text) {
        return handle_command(bot, msg, dialogue, ctx, &command, args, &state, language_code).await;
    }
    if is_cancel(text) {
        return cancel_pitch(bot, msg, dialogue, &state, language_code).await;
    }

    match state {
        PitchDialogueState::AwaitingClientInfo {
            language_code: dialogue_lang_code,
            ..
        } => {
            // Use dialogue language code if available, otherwise fall back to message language
            let effective_language_code = dialogue_lang_code.as_deref().or(language_code);
            handle_client_info_input(bot, msg, dialogue, text, effective_language_code).await
        }
        PitchDialogueState::AwaitingBrief { draft } => {
            let lang = draft.language_code.clone();
            handle_brief_input(bot, msg, dialogue, text, draft, lang.as_deref().or(language_code)).await
        }
        PitchDialogueState::AwaitingCurrency { draft } => {
            let lang = draft.language_code.clone();
            handle_currency_input(bot, msg, dialogue, text, draft, lang.as_deref().or(language_code)).await
        }
        PitchDialogueState::AwaitingScale { draft } => {
            let lang = draft.language_code.clone();
            let scale = ProjectScale::parse(text);
            apply_scale(bot, msg.chat.id, dialogue, draft, scale, lang.as_deref().or(language_code)).await
        }
        PitchDialogueState::AwaitingDocument { draft } => {
            handle_document_text_input(bot, msg, dialogue, text, draft, ctx).await
        }
        PitchDialogueState::Start => {
            bot.send_message(msg.chat.id, t_lang("text-response", language_code))
                .await?;
            Ok(())
        }
    }
}

async fn handle_document_message(
    bot: &Bot,
    msg: &Message,
    dialogue: PitchDialogue,
    ctx: Arc<BotContext>,
) -> Result<()> {
    let Some(doc) = msg.document() else {
        return Ok(());
    };
    let language_code = message_language(msg);
    let state = active_state(bot, msg, &dialogue, language_code).await?;

    let PitchDialogueState::AwaitingDocument { draft } = state else {
        debug!(user_id = %msg.chat.id, "Document received outside the document step");
        bot.send_message(msg.chat.id, t_lang("document-outside-flow", language_code))
            .await?;
        return Ok(());
    };
    let language_code = draft.language_code.clone();
    let lang = language_code.as_deref();

    let file_name = doc.file_name.clone().unwrap_or_else(|| "document".to_string());
    let mime = doc.mime_type.as_ref().map(|m| m.to_string());
    let supported = DocumentKind::from_file_name(&file_name)
        .or_else(|| mime.as_deref().and_then(DocumentKind::from_mime))
        .is_some();
    if !supported {
        warn!(user_id = %msg.chat.id, file_name = %file_name, "Unsupported document rejected");
        bot.send_message(msg.chat.id, t_lang("document-unsupported", lang))
            .await?;
        return Ok(());
    }
    if u64::from(doc.file.size) > ctx.max_document_size {
        let max_mb = (ctx.max_document_size / (1024 * 1024)).to_string();
        bot.send_message(
            msg.chat.id,
            t_args_lang("document-too-large", &[("max", max_mb.as_str())], lang),
        )
        .await?;
        return Ok(());
    }

    let bytes = match download_file(bot, doc.file.id.clone()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(user_id = %msg.chat.id, error = %e, "Failed to download document for user");
            bot.send_message(msg.chat.id, t_lang("document-download-failed", lang))
                .await?;
            return Ok(());
        }
    };

    let upload = match UploadedDocument::new(file_name.clone(), mime.as_deref(), bytes) {
        Ok(upload) => upload,
        Err(_) => {
            bot.send_message(msg.chat.id, t_lang("document-unsupported", lang))
                .await?;
            return Ok(());
        }
    };

    bot.send_message(
        msg.chat.id,
        t_args_lang("pitch-document-received", &[("name", file_name.as_str())], lang),
    )
    .await?;
    dialogue.exit().await?;
    spawn_generation(
        bot.clone(),
        msg.chat.id,
        ctx,
        PitchRequest::Upload(draft.to_brief(), upload),
        language_code,
    );
    Ok(())
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    dialogue: PitchDialogue,
    ctx: Arc<BotContext>,
) -> Result<()> {
    if let Some(text) = msg.text() {
        handle_text_message(&bot, &msg, dialogue, ctx, text).await?;
    } else if msg.document().is_some() {
        handle_document_message(&bot, &msg, dialogue, ctx).await?;
    } else {
        debug!(user_id = %msg.chat.id, "Received unsupported message type from user");
        bot.send_message(msg.chat.id, t_lang("unsupported-message", message_language(&msg)))
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/pitch"), Some(("/pitch".to_string(), "")));
        assert_eq!(
            parse_command("/pitch@PitchBot https://acme.com Portal"),
            Some(("/pitch".to_string(), "https://acme.com Portal"))
        );
        assert_eq!(parse_command("  /HELP "), Some(("/help".to_string(), "")));
        assert_eq!(parse_command("hello"), None);
    }
}
