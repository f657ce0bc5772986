//! Chat command dispatch and fan-out to every known chat.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{
    device::DevicePort,
    domain::AlarmState,
    messaging::{
        port::MessagingPort,
        types::{InboundEvent, IncomingUpdate},
    },
    registry::ChatRegistry,
    state::Store,
    Result,
};

pub const REPLY_ARMED: &str = "🔒 System Armed";
pub const REPLY_DISARMED: &str = "🔓 System Disarmed";
pub const REPLY_STATE_ARMED: &str = "📟 State: 🚨 Armed";
pub const REPLY_STATE_DISARMED: &str = "📟 State: 💤 Disarmed";
pub const REPLY_PIN_CHANGED: &str = "🔑 PIN changed";
pub const REPLY_PIN_USAGE: &str = "Usage: /change_pin <new_pin>";
pub const REPLY_UNKNOWN: &str = "🤖 unknown command";
pub const FAILURE_MARKER: &str = "⚠️";

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Arm,
    Disarm,
    Status,
    /// `None` when the argument count is wrong.
    ChangePin(Option<&'a str>),
    Unknown,
}

fn parse_command(text: &str) -> Command<'_> {
    let mut parts = text.split_whitespace();
    let Some(first) = parts.next() else {
        return Command::Unknown;
    };
    // Group chats may send `/cmd@botname`.
    let name = first.split('@').next().unwrap_or("");
    let args: Vec<&str> = parts.collect();

    match (name, args.as_slice()) {
        ("/change_pin", [pin]) => Command::ChangePin(Some(*pin)),
        ("/change_pin", _) => Command::ChangePin(None),
        ("/arm", []) => Command::Arm,
        ("/disarm", []) => Command::Disarm,
        ("/status", []) => Command::Status,
        _ => Command::Unknown,
    }
}

fn failure(e: &crate::Error) -> String {
    format!("{FAILURE_MARKER} {e}")
}

/// Owns the chat registry and ties the store, the device and the messenger together.
///
/// One instance per process; tests build their own with fake ports.
pub struct AlarmBot {
    store: Arc<Store>,
    device: Arc<dyn DevicePort>,
    messenger: Arc<dyn MessagingPort>,
    chats: ChatRegistry,
}

impl AlarmBot {
    pub fn new(
        store: Arc<Store>,
        device: Arc<dyn DevicePort>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            store,
            device,
            messenger,
            chats: ChatRegistry::new(),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn chats(&self) -> &ChatRegistry {
        &self.chats
    }

    /// Handle one inbound update. Replies only ever go to the originating chat.
    pub async fn handle(&self, update: IncomingUpdate) {
        let IncomingUpdate::Message(event) = update else {
            return;
        };

        if self.chats.register(event.chat_id) {
            tracing::info!(chat_id = %event.chat_id, "registered chat");
        }

        let reply = self.dispatch(&event).await;
        if let Err(e) = self.messenger.send_message(event.chat_id, &reply).await {
            tracing::warn!(chat_id = %event.chat_id, "reply failed: {e}");
        }
    }

    async fn dispatch(&self, event: &InboundEvent) -> String {
        match parse_command(&event.text) {
            Command::Arm => match self.device.arm().await {
                Ok(()) => {
                    self.store.set(AlarmState::Armed);
                    REPLY_ARMED.to_string()
                }
                Err(e) => failure(&e),
            },
            Command::Disarm => match self.device.disarm().await {
                Ok(()) => {
                    self.store.set(AlarmState::Disarmed);
                    REPLY_DISARMED.to_string()
                }
                Err(e) => failure(&e),
            },
            Command::Status => match self.device.status().await {
                Ok(st) if st.is_armed() => REPLY_STATE_ARMED.to_string(),
                Ok(_) => REPLY_STATE_DISARMED.to_string(),
                Err(e) => failure(&e),
            },
            Command::ChangePin(None) => REPLY_PIN_USAGE.to_string(),
            Command::ChangePin(Some(pin)) => match self.device.change_pin(pin).await {
                Ok(()) => REPLY_PIN_CHANGED.to_string(),
                Err(e) => failure(&e),
            },
            Command::Unknown => {
                tracing::debug!(chat_id = %event.chat_id, text = %event.text, "unknown command");
                REPLY_UNKNOWN.to_string()
            }
        }
    }

    /// Best-effort fan-out of `text` to every registered chat.
    ///
    /// Returns how many chats the message reached; failed sends are logged and skipped.
    pub async fn broadcast(&self, text: &str) -> usize {
        let targets = self.chats.snapshot();
        let mut delivered = 0;
        for chat_id in targets {
            match self.messenger.send_message(chat_id, text).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(%chat_id, "broadcast send failed: {e}"),
            }
        }
        delivered
    }

    /// Send one video to every registered chat.
    ///
    /// The payload is read into memory once. Unlike [`AlarmBot::broadcast`], the first failed
    /// send aborts the remaining ones and is returned.
    pub async fn broadcast_video<R>(&self, mut reader: R, caption: &str) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut video = Vec::new();
        reader.read_to_end(&mut video).await?;

        let targets = self.chats.snapshot();
        tracing::info!(
            chats = targets.len(),
            bytes = video.len(),
            "broadcasting video"
        );
        for chat_id in targets {
            self.messenger.send_video(chat_id, &video, caption).await?;
        }
        Ok(())
    }
}
