use crate::message::Conversation;
use crate::store::{ChatSaver, ConversationStore, StoreError, StoreResult, saved_chat_from};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MemoryState {
    conversation: Conversation,
    turn_finalized: bool,
}

/// In-memory conversation store. One conversation per store; the turn
/// driver reads, appends, and replaces it under a single mutex. `done`
/// checkpoints the whole turn through the configured saver.
#[derive(Clone)]
pub struct MemoryConversationStore {
    inner: Arc<Mutex<MemoryState>>,
    saver: Option<Arc<dyn ChatSaver>>,
    owner_id: String,
}

impl MemoryConversationStore {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryState {
                conversation: Conversation::new(conversation_id),
                turn_finalized: false,
            })),
            saver: None,
            owner_id: String::new(),
        }
    }

    pub fn with_saver(mut self, saver: Arc<dyn ChatSaver>, owner_id: impl Into<String>) -> Self {
        self.saver = Some(saver);
        self.owner_id = owner_id.into();
        self
    }

    pub fn from_conversation(conversation: Conversation) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryState {
                conversation,
                turn_finalized: false,
            })),
            saver: None,
            owner_id: String::new(),
        }
    }
}

#[async_trait::async_trait]
impl ConversationStore for MemoryConversationStore {
    fn get(&self) -> StoreResult<Conversation> {
        let state = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(state.conversation.clone())
    }

    fn update(&self, conversation: Conversation) -> StoreResult<()> {
        let mut state = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        state.conversation = conversation;
        // Any mutation after `done` starts the next turn.
        state.turn_finalized = false;
        Ok(())
    }

    async fn done(&self, conversation: Conversation) -> StoreResult<()> {
        {
            let mut state = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
            if state.turn_finalized {
                return Err(StoreError::AlreadyFinalized(state.conversation.id.clone()));
            }
            state.conversation = conversation.clone();
            state.turn_finalized = true;
        }

        if let Some(saver) = &self.saver {
            saver.save(saved_chat_from(&conversation, &self.owner_id)).await?;
        }
        Ok(())
    }
}
