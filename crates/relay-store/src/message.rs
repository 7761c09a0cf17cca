use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type MessageId = String;

/// One block of a user message: typed so image attachments keep their
/// position relative to the text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserContent {
    Text { text: String },
    Image { url: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    pub id: MessageId,
    pub content: Vec<UserContent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssistantTextMessage {
    pub id: MessageId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPart {
    pub tool_name: String,
    pub call_id: String,
    pub args: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssistantToolCallMessage {
    pub id: MessageId,
    pub calls: Vec<ToolCallPart>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPart {
    pub tool_name: String,
    pub call_id: String,
    pub result: SanitizedResult,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResultMessage {
    pub id: MessageId,
    pub results: Vec<ToolResultPart>,
}

/// Persisted log element. Closed over the four roles so history walks
/// are exhaustively checked; there is no "unknown role" at this layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User(UserMessage),
    AssistantText(AssistantTextMessage),
    AssistantToolCall(AssistantToolCallMessage),
    ToolResult(ToolResultMessage),
}

impl Message {
    pub fn id(&self) -> &str {
        match self {
            Self::User(message) => &message.id,
            Self::AssistantText(message) => &message.id,
            Self::AssistantToolCall(message) => &message.id,
            Self::ToolResult(message) => &message.id,
        }
    }
}

/// A downloadable artifact referenced by a tool result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub download_link: String,
    #[serde(default)]
    pub mime_type: String,
}

/// Canonical shape every tool output is normalized into before it is
/// persisted or rendered. Sanitization is idempotent over this shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SanitizedResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SanitizedResult {
    pub fn from_response(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            ..Self::default()
        }
    }
}

/// Ordered, append-only message log for one chat.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Text of the first user message, used for title derivation.
    pub fn first_user_text(&self) -> Option<&str> {
        self.messages.iter().find_map(|message| {
            if let Message::User(user) = message {
                user.content.iter().find_map(|part| {
                    if let UserContent::Text { text } = part {
                        Some(text.as_str())
                    } else {
                        None
                    }
                })
            } else {
                None
            }
        })
    }
}
