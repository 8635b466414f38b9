pub mod telegram;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;

use crate::dispatch::DispatchPipeline;
use crate::fault::Fault;

/// An inbound event from the messaging platform
#[derive(Debug, Clone)]
pub enum InboundUpdate {
    NewMessage(IncomingMessage),
    EditedMessage(IncomingMessage),
    /// Any other update kind; `kind` is only used for logging
    Other { kind: String },
}

/// A chat message received from the platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Chat the reply goes back to
    pub chat_id: i64,
    /// Display name of the sender
    pub user_name: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    NonText { kind: String },
}

impl IncomingMessage {
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::NonText { .. } => None,
        }
    }

    /// Name of the content kind, for logging
    pub fn kind(&self) -> &str {
        match &self.content {
            MessageContent::Text(_) => "Text",
            MessageContent::NonText { kind } => kind,
        }
    }
}

/// How the recipient's client should present the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayDirective {
    /// Hide any custom reply keyboard currently shown
    RemoveKeyboard,
}

/// Outcome of a successful send
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyResult {
    pub chat_id: i64,
    /// Sender-assigned acknowledgment, only used for logging
    pub acknowledgment: String,
}

/// Outbound side of the platform
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        directive: DisplayDirective,
    ) -> Result<ReplyResult, Fault>;
}

/// Inbound side of the platform
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Display name of the bot account
    async fn identity(&self) -> Result<String>;

    /// Feed every inbound update to `pipeline` until `shutdown` flips to true.
    async fn start_receiving(
        &self,
        pipeline: Arc<DispatchPipeline>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()>;
}
