//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use chrono::Utc;
use teloxide::prelude::*;
use tracing::{debug, error};

use crate::dialogue::{PitchDialogue, PitchDialogueState};
use crate::localization::t_lang;

use super::dialogue_manager::{apply_currency, apply_scale};
use super::ui_builder::{parse_callback, CallbackChoice};

/// Handle callback queries from the currency and scale keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    dialogue: PitchDialogue,
) -> Result<()> {
    debug!(user_id = %q.from.id, "Received callback query from user");
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(msg) = &q.message else {
        return Ok(());
    };
    let chat_id = msg.chat().id;
    let data = q.data.as_deref().unwrap_or("");
    let Some(choice) = parse_callback(data) else {
        debug!(user_id = %q.from.id, data = %data, "Ignoring unknown callback data");
        return Ok(());
    };

    let state = dialogue.get().await?.unwrap_or_default();
    let language_code = q.from.language_code.as_deref();
    if state.is_expired(Utc::now()) {
        dialogue.exit().await?;
        bot.send_message(chat_id, t_lang("session-expired", language_code))
            .await?;
        return Ok(());
    }

    // The keyboard is answered once; drop it so stale taps do nothing
    if let Err(e) = bot.edit_message_reply_markup(chat_id, msg.id()).await {
        error!(user_id = %q.from.id, error = %e, "Failed to remove inline keyboard");
    }

    match (state, choice) {
        (PitchDialogueState::AwaitingCurrency { draft }, CallbackChoice::Currency(currency)) => {
            let lang = draft.language_code.clone();
            apply_currency(&bot, chat_id, dialogue, draft, currency, lang.as_deref().or(language_code)).await
        }
        (PitchDialogueState::AwaitingScale { draft }, CallbackChoice::Scale(scale)) => {
            let lang = draft.language_code.clone();
            apply_scale(&bot, chat_id, dialogue, draft, scale, lang.as_deref().or(language_code)).await
        }
        (state, choice) => {
            debug!(user_id = %q.from.id, state = ?state, choice = ?choice, "Callback does not match the current step");
            Ok(())
        }
    }
}
