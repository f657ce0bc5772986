use async_trait::async_trait;

use crate::{domain::ChatId, Result};

/// Outbound half of the chat platform.
///
/// Each call is independently fallible: a transport failure or a non-2xx answer is an error.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()>;

    async fn send_video(&self, chat_id: ChatId, video: &[u8], caption: &str) -> Result<()>;
}
