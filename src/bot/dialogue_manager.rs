//! Dialogue Manager module for handling pitch state transitions and delivering
//! the finished proposal.

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::{debug, error, info, warn};

use crate::config::MAX_BRIEF_CHARS;
use crate::document::UploadedDocument;
use crate::localization::{t_args_lang, t_lang};
use crate::proposal_model::{Brief, Currency, ProjectScale, Proposal};

use crate::dialogue::{
    parse_client_info, parse_document_reply, validate_brief, DocumentReply, PitchDialogue,
    PitchDialogueState, PitchDraft,
};

use super::ui_builder::{create_currency_keyboard, create_scale_keyboard, failure_message, ready_message};
use super::BotContext;

/// What the spawned generation task should run
#[derive(Debug)]
pub enum PitchRequest {
    Brief(Brief),
    Upload(Brief, UploadedDocument),
    Link(Brief, String),
    Quick {
        url: String,
        project_name: Option<String>,
    },
}

impl PitchRequest {
    fn client_label(&self) -> String {
        match self {
            PitchRequest::Brief(brief)
            | PitchRequest::Upload(brief, _)
            | PitchRequest::Link(brief, _) => brief.client_name.clone(),
            PitchRequest::Quick { url, .. } => url.clone(),
        }
    }
}

/// Start a guided pitch
pub async fn start_pitch(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: PitchDialogue,
    language_code: Option<&str>,
) -> Result<()> {
    dialogue
        .update(PitchDialogueState::AwaitingClientInfo {
            language_code: language_code.map(str::to_string),
            started_at: chrono::Utc::now(),
        })
        .await?;
    bot.send_message(chat_id, t_lang("pitch-ask-client", language_code))
        .await?;
    info!(user_id = %chat_id, "Guided pitch started");
    Ok(())
}

/// Handle client name and website input
pub async fn handle_client_info_input(
    bot: &Bot,
    msg: &Message,
    dialogue: PitchDialogue,
    text: &str,
    language_code: Option<&str>,
) -> Result<()> {
    match parse_client_info(text) {
        Ok((client_name, client_url)) => {
            debug!(user_id = %msg.chat.id, client = %client_name, has_url = client_url.is_some(), "Client info accepted");
            let prompt = t_args_lang(
                "pitch-ask-brief",
                &[
                    ("client", client_name.as_str()),
                    ("max", MAX_BRIEF_CHARS.to_string().as_str()),
                ],
                language_code,
            );
            let draft = PitchDraft::new(client_name, client_url, language_code.map(str::to_string));
            dialogue.update(PitchDialogueState::AwaitingBrief { draft }).await?;
            bot.send_message(msg.chat.id, prompt).await?;
        }
        Err(reason) => {
            let key = match reason {
                "missing_name" => "pitch-client-missing-name",
                "too_long" => "pitch-client-too-long",
                _ => "pitch-client-empty",
            };
            bot.send_message(msg.chat.id, t_lang(key, language_code)).await?;
            // Keep dialogue active, user can try again
        }
    }
    Ok(())
}

/// Handle the short project brief
pub async fn handle_brief_input(
    bot: &Bot,
    msg: &Message,
    dialogue: PitchDialogue,
    text: &str,
    draft: PitchDraft,
    language_code: Option<&str>,
) -> Result<()> {
    match validate_brief(text) {
        Ok(brief_text) => {
            let draft = PitchDraft {
                brief_text,
                ..draft
            }
            .touch();
            dialogue.update(PitchDialogueState::AwaitingCurrency { draft }).await?;
            bot.send_message(msg.chat.id, t_lang("pitch-ask-currency", language_code))
                .reply_markup(create_currency_keyboard())
                .await?;
        }
        Err("too_long") => {
            let length = text.trim().chars().count().to_string();
            let max = MAX_BRIEF_CHARS.to_string();
            bot.send_message(
                msg.chat.id,
                t_args_lang(
                    "pitch-brief-too-long",
                    &[("length", length.as_str()), ("max", max.as_str())],
                    language_code,
                ),
            )
            .await?;
        }
        Err(_) => {
            bot.send_message(msg.chat.id, t_lang("pitch-brief-empty", language_code))
                .await?;
        }
    }
    Ok(())
}

/// Record the currency and ask for the scale
pub async fn apply_currency(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: PitchDialogue,
    draft: PitchDraft,
    currency: Currency,
    language_code: Option<&str>,
) -> Result<()> {
    let draft = PitchDraft {
        currency: Some(currency),
        ..draft
    }
    .touch();
    dialogue.update(PitchDialogueState::AwaitingScale { draft }).await?;
    bot.send_message(chat_id, t_lang("pitch-ask-scale", language_code))
        .reply_markup(create_scale_keyboard(language_code))
        .await?;
    Ok(())
}

/// Handle a typed currency answer
pub async fn handle_currency_input(
    bot: &Bot,
    msg: &Message,
    dialogue: PitchDialogue,
    text: &str,
    draft: PitchDraft,
    language_code: Option<&str>,
) -> Result<()> {
    match Currency::parse(text) {
        Some(currency) => apply_currency(bot, msg.chat.id, dialogue, draft, currency, language_code).await,
        None => {
            bot.send_message(msg.chat.id, t_lang("pitch-currency-invalid", language_code))
                .reply_markup(create_currency_keyboard())
                .await?;
            Ok(())
        }
    }
}

/// Record the scale and ask for a document
pub async fn apply_scale(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: PitchDialogue,
    draft: PitchDraft,
    scale: ProjectScale,
    language_code: Option<&str>,
) -> Result<()> {
    let draft = PitchDraft {
        scale: Some(scale),
        ..draft
    }
    .touch();
    dialogue.update(PitchDialogueState::AwaitingDocument { draft }).await?;
    bot.send_message(chat_id, t_lang("pitch-ask-document", language_code))
        .await?;
    Ok(())
}

/// Handle the document step answered with text: `skip` or a shared link
pub async fn handle_document_text_input(
    bot: &Bot,
    msg: &Message,
    dialogue: PitchDialogue,
    text: &str,
    draft: PitchDraft,
    ctx: Arc<BotContext>,
) -> Result<()> {
    let language_code = draft.language_code.clone();
    let request = match parse_document_reply(text) {
        DocumentReply::Skip => PitchRequest::Brief(draft.to_brief()),
        DocumentReply::Link(link) => PitchRequest::Link(draft.to_brief(), link),
        DocumentReply::Invalid => {
            bot.send_message(msg.chat.id, t_lang("pitch-document-invalid", language_code.as_deref()))
                .await?;
            return Ok(());
        }
    };

    dialogue.exit().await?;
    spawn_generation(bot.clone(), msg.chat.id, ctx, request, language_code);
    Ok(())
}

/// Run the pitch on its own task and deliver the result to the chat
pub fn spawn_generation(
    bot: Bot,
    chat_id: ChatId,
    ctx: Arc<BotContext>,
    request: PitchRequest,
    language_code: Option<String>,
) {
    tokio::spawn(async move {
        if let Err(e) = generate_and_deliver(&bot, chat_id, &ctx, request, language_code.as_deref()).await {
            error!(user_id = %chat_id, error = %e, "Failed to deliver pitch result");
        }
    });
}

async fn generate_and_deliver(
    bot: &Bot,
    chat_id: ChatId,
    ctx: &BotContext,
    request: PitchRequest,
    language_code: Option<&str>,
) -> Result<()> {
    let client = request.client_label();
    bot.send_message(
        chat_id,
        t_args_lang("pitch-generating", &[("client", client.as_str())], language_code),
    )
    .await?;

    let pipeline = &ctx.pipeline;
    let result = match request {
        PitchRequest::Brief(brief) => pipeline.run(brief).await,
        PitchRequest::Upload(brief, upload) => pipeline.run_with_upload(brief, upload).await,
        PitchRequest::Link(brief, link) => pipeline.run_with_link(brief, &link).await,
        PitchRequest::Quick { url, project_name } => pipeline.run_quick(&url, project_name).await,
    };

    match result {
        Ok(proposal) => {
            info!(user_id = %chat_id, proposal_id = %proposal.id, "Delivering proposal");
            deliver_proposal(bot, chat_id, &proposal, &ctx.public_base_url, language_code).await
        }
        Err(err) => {
            warn!(user_id = %chat_id, stage = %err.stage(), error = %err, "Pitch failed for user");
            bot.send_message(chat_id, failure_message(&err, language_code))
                .await?;
            Ok(())
        }
    }
}

/// Send the diagram with the link as caption, or just the link
pub async fn deliver_proposal(
    bot: &Bot,
    chat_id: ChatId,
    proposal: &Proposal,
    base_url: &str,
    language_code: Option<&str>,
) -> Result<()> {
    let message = ready_message(proposal, base_url, language_code);
    if let Some(path) = &proposal.diagram_path {
        match bot
            .send_photo(chat_id, InputFile::file(path.clone()))
            .caption(message.clone())
            .await
        {
            Ok(_) => return Ok(()),
            Err(e) => {
                warn!(user_id = %chat_id, error = %e, "Failed to send diagram photo, falling back to text");
            }
        }
    }
    bot.send_message(chat_id, message).await?;
    Ok(())
}
