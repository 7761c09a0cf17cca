use crate::message::{Conversation, Message};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

const TITLE_MAX_CHARS: usize = 100;
const UNTITLED: &str = "Untitled chat";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conversation state lock poisoned")]
    Poisoned,

    #[error("turn already finalized for conversation {0}")]
    AlreadyFinalized(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Holds the single conversation a session mutates. `update` is an
/// atomic replace; `done` is the once-per-turn terminal transition that
/// hands the conversation to the persistence callback.
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    fn get(&self) -> StoreResult<Conversation>;

    fn update(&self, conversation: Conversation) -> StoreResult<()>;

    async fn done(&self, conversation: Conversation) -> StoreResult<()>;
}

/// Record handed to the external persistence layer at the end of a turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedChat {
    pub id: String,
    pub title: String,
    pub owner_id: String,
    pub created_at: String,
    pub messages: Vec<Message>,
    pub path: String,
}

#[async_trait::async_trait]
pub trait ChatSaver: Send + Sync {
    async fn save(&self, chat: SavedChat) -> StoreResult<()>;
}

/// Title is the first 100 characters of the first user message's text.
pub fn derive_title(conversation: &Conversation) -> String {
    match conversation.first_user_text() {
        Some(text) => text.chars().take(TITLE_MAX_CHARS).collect(),
        None => UNTITLED.to_string(),
    }
}

pub fn saved_chat_from(conversation: &Conversation, owner_id: &str) -> SavedChat {
    SavedChat {
        id: conversation.id.clone(),
        title: derive_title(conversation),
        owner_id: owner_id.to_string(),
        created_at: current_timestamp(),
        messages: conversation.messages.clone(),
        path: format!("/chat/{}", conversation.id),
    }
}

pub(crate) fn current_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs().to_string()
}
