//! Telegram bot.
//!
//! The bot is a thin adapter: it maps Telegram updates to core events,
//! forwards them to the conversation, and delivers the replies. All business
//! rules live in the engine crate.

use std::{path::PathBuf, sync::Arc};

use engine::{Conversation, SessionStore};
use reports::ArtifactRenderer;
use teloxide::prelude::*;

mod handlers;
mod ui;

const DEFAULT_EXPORT_DIR: &str = "exports";

#[derive(Clone)]
pub(crate) struct ConfigParameters {
    allowed_users: Option<Vec<UserId>>,
    conversation: Arc<Conversation<ArtifactRenderer>>,
}

pub struct Bot {
    token: String,
    allowed_users: Option<Vec<UserId>>,
    conversation: Arc<Conversation<ArtifactRenderer>>,
}

impl Bot {
    pub fn builder() -> BotBuilder {
        BotBuilder::default()
    }

    pub async fn run(&self) {
        tracing::info!("Starting telegram bot...");

        let bot = teloxide::Bot::new(&self.token);
        let parameters = ConfigParameters {
            allowed_users: self.allowed_users.clone(),
            conversation: Arc::clone(&self.conversation),
        };

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(handlers::handle_message))
            .branch(Update::filter_callback_query().endpoint(handlers::handle_callback));

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![parameters])
            .default_handler(|upd| async move {
                tracing::warn!("Unhandled update: {:?}", upd);
            })
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }
}

#[derive(Default)]
pub struct BotBuilder {
    token: String,
    allowed_users: Option<Vec<UserId>>,
    engine: Option<Arc<engine::Engine>>,
    export_dir: Option<PathBuf>,
}

impl BotBuilder {
    pub fn token(mut self, token: &str) -> BotBuilder {
        self.token = token.to_string();
        self
    }

    pub fn allowed_users(mut self, allowed_users: Vec<u64>) -> BotBuilder {
        if !allowed_users.is_empty() {
            self.allowed_users = Some(allowed_users.into_iter().map(UserId).collect());
        }
        self
    }

    pub fn engine(mut self, engine: Arc<engine::Engine>) -> BotBuilder {
        self.engine = Some(engine);
        self
    }

    pub fn export_dir(mut self, path: impl Into<PathBuf>) -> BotBuilder {
        self.export_dir = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Bot, String> {
        tracing::info!("Initializing telegram bot...");
        let engine = self.engine.ok_or("engine is required")?;
        let export_dir = self
            .export_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_DIR));
        let renderer = ArtifactRenderer::new(export_dir)
            .map_err(|err| format!("failed to prepare export dir: {err}"))?;

        Ok(Bot {
            token: self.token,
            allowed_users: self.allowed_users,
            conversation: Arc::new(Conversation::new(engine, SessionStore::default(), renderer)),
        })
    }
}
