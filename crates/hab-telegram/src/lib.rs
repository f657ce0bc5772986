//! Telegram adapter (teloxide).
//!
//! This crate implements the `hab-core` MessagingPort and UpdateSource over the Telegram Bot API.

use std::time::Duration;

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InputFile, UpdateKind},
    RequestError,
};

use tokio::time::sleep;

pub mod router;

use hab_core::{
    domain::ChatId,
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InboundEvent, IncomingUpdate, PolledUpdate},
    },
    poller::UpdateSource,
    Result,
};

const VIDEO_FILE_NAME: &str = "alarm.mp4";

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }
}

/// Run `op`, waiting out one flood-control answer for as long as Telegram asks.
async fn with_retry<T, Fut>(mut op: impl FnMut() -> Fut) -> Result<T>
where
    Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
    Fut::IntoFuture: Send,
{
    const MAX_RETRIES: usize = 1;
    let mut attempts = 0usize;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => match e {
                RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    tracing::warn!(retry_after = ?d, "telegram flood control, retrying");
                    sleep(d).await;
                    continue;
                }
                other => return Err(map_err(other)),
            },
        }
    }
}

fn map_err(e: RequestError) -> Error {
    match e {
        RequestError::Network(e) => Error::Transport(format!("telegram network error: {e}")),
        RequestError::Api(e) => Error::Rejected {
            target: "telegram",
            status: e.to_string(),
        },
        other => Error::External(format!("telegram error: {other}")),
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        with_retry(|| {
            self.bot
                .send_message(Self::tg_chat(chat_id), text.to_string())
        })
        .await?;
        Ok(())
    }

    async fn send_video(&self, chat_id: ChatId, video: &[u8], caption: &str) -> Result<()> {
        with_retry(|| {
            self.bot
                .send_video(
                    Self::tg_chat(chat_id),
                    InputFile::memory(video.to_vec()).file_name(VIDEO_FILE_NAME),
                )
                .caption(caption.to_string())
        })
        .await?;
        Ok(())
    }
}

/// Long-polling `getUpdates` source.
#[derive(Clone)]
pub struct TelegramUpdates {
    bot: Bot,
}

impl TelegramUpdates {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl UpdateSource for TelegramUpdates {
    async fn fetch(&self, offset: i64, timeout: Duration) -> Result<Vec<PolledUpdate>> {
        let offset = i32::try_from(offset)
            .map_err(|_| Error::External(format!("update offset out of range: {offset}")))?;
        let timeout = u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX);

        let updates = self
            .bot
            .get_updates()
            .offset(offset)
            .timeout(timeout)
            .await
            .map_err(map_err)?;

        Ok(updates.into_iter().map(to_polled).collect())
    }
}

/// Reduce a Telegram update to what the orchestrator needs.
///
/// Only plain messages are chat-addressable; a message without text still counts (it registers
/// the chat and gets the unknown-command reply).
pub fn to_polled(update: Update) -> PolledUpdate {
    let incoming = match update.kind {
        UpdateKind::Message(msg) => IncomingUpdate::Message(InboundEvent::new(
            ChatId(msg.chat.id.0),
            msg.text().unwrap_or(""),
        )),
        _ => IncomingUpdate::Other,
    };
    PolledUpdate {
        id: i64::from(update.id),
        update: incoming,
    }
}
