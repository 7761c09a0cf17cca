//! Turn driver: the submit entrypoint that owns the full lifecycle of
//! one user turn, from appending the user message through streaming,
//! folding, and finalization.

use crate::config::ToolConfig;
use crate::errors::TranscriptError;
use crate::fold::{TranscriptFolder, new_message_id};
use crate::history::serialize_history;
use crate::render::{RenderNode, RenderSink};
use futures::StreamExt;
use relay_events::{EventSource, TurnRequest};
use relay_store::{ConversationStore, Message, UserContent, UserMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Lifecycle of one submitted turn. A turn that starts streaming always
/// reaches `Done`, stream failure or not.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TurnPhase {
    Init,
    Streaming,
    Finalizing,
    Done,
}

/// What a completed turn looked like. `error` is set when the stream
/// failed partway; everything folded before the failure is still
/// persisted and `phase` still reaches `Done`.
#[derive(Debug)]
pub struct TurnOutcome {
    pub phase: TurnPhase,
    pub error: Option<String>,
    pub appended_messages: usize,
}

/// Cooperative cancellation for an in-flight turn. Folding stops at the
/// next event boundary; finalization still runs.
#[derive(Clone, Debug)]
pub struct TurnAbortHandle {
    flag: Arc<AtomicBool>,
}

impl TurnAbortHandle {
    pub fn request_abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

pub struct TurnDriver {
    store: Arc<dyn ConversationStore>,
    source: Arc<dyn EventSource>,
    tool_config: ToolConfig,
    abort_requested: Arc<AtomicBool>,
}

impl TurnDriver {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        source: Arc<dyn EventSource>,
        tool_config: ToolConfig,
    ) -> Self {
        Self {
            store,
            source,
            tool_config,
            abort_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn abort_handle(&self) -> TurnAbortHandle {
        TurnAbortHandle {
            flag: self.abort_requested.clone(),
        }
    }

    /// Runs one user turn to completion. Returns `Err` only for store
    /// or history failures around the turn (it cannot start, or the
    /// final checkpoint fails); stream failures are reported through
    /// `TurnOutcome::error`. The render sink is closed on every path
    /// once streaming has begun.
    pub async fn submit(
        &self,
        content: &str,
        attachments: Vec<String>,
        sink: &mut dyn RenderSink,
    ) -> Result<TurnOutcome, TranscriptError> {
        self.abort_requested.store(false, Ordering::SeqCst);

        let mut conversation = self.store.get()?;
        let baseline = conversation.messages.len();

        let user_message = build_user_message(content, attachments);
        conversation.push(Message::User(user_message.clone()));
        sink.append(RenderNode::Separator);
        sink.append(RenderNode::User(user_message));
        self.store.update(conversation.clone())?;

        let request = TurnRequest {
            serialized_history: serialize_history(&conversation)?,
            tool_config: self.tool_config.to_map(),
        };

        let mut turn_error: Option<String> = None;
        let mut folder = TranscriptFolder::new(sink);

        match self.source.open(request).await {
            Ok(mut stream) => {
                while let Some(item) = stream.next().await {
                    if self.abort_requested.load(Ordering::SeqCst) {
                        break;
                    }
                    match item {
                        Ok(event) => {
                            if let Err(error) = folder.handle(&mut conversation, event) {
                                turn_error = Some(error.to_string());
                                break;
                            }
                        }
                        Err(error) => {
                            turn_error = Some(error.to_string());
                            break;
                        }
                    }
                }
            }
            Err(error) => turn_error = Some(error.to_string()),
        }

        folder.finish(&mut conversation);
        drop(folder);

        if let Some(description) = &turn_error {
            sink.append(RenderNode::Separator);
            sink.append(RenderNode::Error {
                message: format!("An error occurred. Please try again.\n\n{description}"),
            });
        }

        // Persistence failures must not strand the render channel: the
        // sink closes before any error propagates.
        let persisted = match self.store.update(conversation.clone()) {
            Ok(()) => self.store.done(conversation.clone()).await,
            Err(error) => Err(error),
        };
        sink.done();
        persisted?;

        Ok(TurnOutcome {
            phase: TurnPhase::Done,
            error: turn_error,
            appended_messages: conversation.messages.len() - baseline,
        })
    }
}

fn build_user_message(content: &str, attachments: Vec<String>) -> UserMessage {
    let mut parts = vec![UserContent::Text {
        text: content.to_string(),
    }];
    parts.extend(
        attachments
            .into_iter()
            .map(|url| UserContent::Image { url }),
    );
    UserMessage {
        id: new_message_id(),
        content: parts,
    }
}
