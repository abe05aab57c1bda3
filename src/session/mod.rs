pub mod context;
pub mod message;

pub use context::{ConversationContext, PendingToolCall};
pub use message::{Message, MessageContent, MessageRole, content_text};
