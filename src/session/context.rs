use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{Message, MessageContent};

/// A tool call extracted from the model's first response, awaiting execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingToolCall {
    /// Identifier the tool result must echo back
    pub id: String,
    /// Requested tool name
    pub name: String,
    /// Raw argument payload as sent by the model
    pub arguments: Value,
}

impl PendingToolCall {
    /// Picks the first tool call out of a response, if there is one.
    pub fn first_in(content: &[MessageContent]) -> Option<Self> {
        content.iter().find_map(|c| match c {
            MessageContent::ToolCall {
                id,
                name,
                arguments,
            } => Some(Self {
                id: id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
            }),
            _ => None,
        })
    }

    pub fn to_content(&self) -> MessageContent {
        MessageContent::ToolCall {
            id: self.id.clone(),
            name: self.name.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

/// The state of one orchestration cycle.
///
/// Created per request and dropped when the response is sent; it is never
/// shared between requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Unique identifier for the cycle, used in logs
    pub id: String,
    /// Fixed instructions for the model
    pub system_prompt: String,
    /// The triggering input
    pub user_message: String,
    /// Append-only transcript of the cycle
    messages: Vec<Message>,
    /// The tool call being resolved, if any
    pub pending_tool_call: Option<PendingToolCall>,
}

impl ConversationContext {
    /// Creates a context seeded with the system and user entries.
    pub fn new(system_prompt: impl Into<String>, user_message: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        let user_message = user_message.into();
        let messages = vec![
            Message::new_system(system_prompt.clone()),
            Message::new_user(user_message.clone()),
        ];
        Self {
            id: Uuid::new_v4().to_string(),
            system_prompt,
            user_message,
            messages,
            pending_tool_call: None,
        }
    }

    /// Appends a message to the transcript.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages in the transcript.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}
