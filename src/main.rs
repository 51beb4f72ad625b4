use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pitchbot::bot::{callback_handler, message_handler, BotContext};
use pitchbot::config::AppConfig;
use pitchbot::dashboard::{self, DashboardState};
use pitchbot::dialogue::PitchDialogueState;
use pitchbot::localization::init_localization;
use pitchbot::pipeline::PitchPipeline;
use pitchbot::storage::ProposalStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    init_tracing();

    info!("Starting Pitch Telegram Bot");

    let config = AppConfig::from_env().context("Invalid configuration")?;
    init_localization()?;

    if config.generation.api_key.is_empty() {
        warn!("No OpenAI API key configured; proposal generation will fail");
    }

    let store = Arc::new(ProposalStore::new(&config.data_dir));
    tokio::fs::create_dir_all(store.root())
        .await
        .with_context(|| format!("Failed to create {}", store.root().display()))?;

    let dashboard_state = DashboardState {
        store: store.clone(),
        agency: config.agency.clone(),
    };

    let Some(token) = config.telegram_token.clone() else {
        warn!("TELEGRAM_BOT_TOKEN not set; serving the dashboard only");
        return dashboard::serve(dashboard_state, config.port).await;
    };

    let port = config.port;
    tokio::spawn(async move {
        if let Err(e) = dashboard::serve(dashboard_state, port).await {
            error!(error = %e, "Dashboard stopped");
        }
    });

    let ctx = Arc::new(BotContext {
        pipeline: PitchPipeline::from_config(&config, store)?,
        public_base_url: config.public_base_url.clone(),
        max_document_size: config.document.max_file_size,
    });

    let bot = Bot::new(token);
    info!(base_url = %config.public_base_url, "Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<PitchDialogueState>, PitchDialogueState>()
                .endpoint(message_handler),
        )
        .branch(
            Update::filter_callback_query()
                .enter_dialogue::<CallbackQuery, InMemStorage<PitchDialogueState>, PitchDialogueState>()
                .endpoint(callback_handler),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![InMemStorage::<PitchDialogueState>::new(), ctx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
