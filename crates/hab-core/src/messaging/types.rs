use crate::domain::ChatId;

/// A decoded chat message: originating chat plus trimmed text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: ChatId,
    pub text: String,
}

impl InboundEvent {
    pub fn new(chat_id: ChatId, text: &str) -> Self {
        Self {
            chat_id,
            text: text.trim().to_string(),
        }
    }
}

/// Cross-messenger incoming update model.
///
/// Anything that is not a chat-addressable message (edits, callbacks, channel posts...) is
/// `Other` and gets dropped by the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncomingUpdate {
    Message(InboundEvent),
    Other,
}

/// One entry from a fetched batch, tagged with its platform-assigned id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolledUpdate {
    pub id: i64,
    pub update: IncomingUpdate,
}
