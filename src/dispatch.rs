use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info};

use crate::commands::CommandRouter;
use crate::fault::Fault;
use crate::platform::{InboundUpdate, IncomingMessage, MessageSender, ReplyResult};

/// How processing of a single update ended
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A reply was sent
    Replied(ReplyResult),
    /// Message without text; nothing sent
    Skipped,
    /// Not a message update; nothing sent
    Ignored,
    /// A fault was caught and logged; carries the rendered report
    Failed(String),
}

/// Classify → route → send, for one update at a time.
/// Stateless between updates, so one instance is shared by all concurrent dispatches.
pub struct DispatchPipeline {
    router: CommandRouter,
    sender: Arc<dyn MessageSender>,
}

impl DispatchPipeline {
    pub fn new(router: CommandRouter, sender: Arc<dyn MessageSender>) -> Self {
        Self { router, sender }
    }

    /// Entry point for every inbound update. Never fails and never panics:
    /// faults and handler panics are rendered and logged here.
    pub async fn handle_update(&self, update: InboundUpdate) -> DispatchOutcome {
        let fault = match AssertUnwindSafe(self.classify(update)).catch_unwind().await {
            Ok(Ok(outcome)) => return outcome,
            Ok(Err(fault)) => fault,
            Err(panic) => Fault::from_panic(panic),
        };

        let report = fault.render();
        error!("{}", report);
        DispatchOutcome::Failed(report)
    }

    async fn classify(&self, update: InboundUpdate) -> Result<DispatchOutcome, Fault> {
        match update {
            InboundUpdate::NewMessage(message) | InboundUpdate::EditedMessage(message) => {
                self.on_message(&message).await
            }
            InboundUpdate::Other { kind } => {
                info!("Unknown update type: {}", kind);
                Ok(DispatchOutcome::Ignored)
            }
        }
    }

    async fn on_message(&self, message: &IncomingMessage) -> Result<DispatchOutcome, Fault> {
        info!(
            "Receive message type: {} from {} ({})",
            message.kind(),
            message.user_name,
            message.chat_id
        );

        match self.router.route(message, self.sender.as_ref()).await? {
            Some(sent) => {
                info!(
                    "The message was sent to: {} (chat {})",
                    sent.acknowledgment, sent.chat_id
                );
                Ok(DispatchOutcome::Replied(sent))
            }
            None => Ok(DispatchOutcome::Skipped),
        }
    }
}
