use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, KeyboardRemove, UpdateKind};
use teloxide::update_listeners;
use teloxide::{ApiError, RequestError};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::dispatch::DispatchPipeline;
use crate::fault::{status_from_description, Fault};
use crate::platform::{
    DisplayDirective, InboundUpdate, IncomingMessage, MessageContent, MessageSender, ReplyResult,
    UpdateSource,
};

/// Telegram Bot API client, used both for polling updates and for sending replies
#[derive(Clone)]
pub struct TelegramPlatform {
    bot: Bot,
}

impl TelegramPlatform {
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }
}

#[async_trait]
impl MessageSender for TelegramPlatform {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        directive: DisplayDirective,
    ) -> Result<ReplyResult, Fault> {
        let request = self.bot.send_message(ChatId(chat_id), text);
        let request = match directive {
            DisplayDirective::RemoveKeyboard => request.reply_markup(KeyboardRemove::new()),
        };

        let sent = request.await.map_err(Fault::from)?;
        let acknowledgment = sent
            .chat
            .username()
            .map(str::to_string)
            .unwrap_or_else(|| format!("message {} in chat {}", sent.id.0, sent.chat.id));

        Ok(ReplyResult {
            chat_id: sent.chat.id.0,
            acknowledgment,
        })
    }
}

#[async_trait]
impl UpdateSource for TelegramPlatform {
    async fn identity(&self) -> Result<String> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(Fault::from)
            .context("Failed to fetch bot identity")?;
        Ok(me.username().to_string())
    }

    async fn start_receiving(
        &self,
        pipeline: Arc<DispatchPipeline>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let handler = dptree::endpoint(handle_update);

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![pipeline])
            // no key: every update is dispatched concurrently
            .distribution_function(|_| None::<std::convert::Infallible>)
            .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
            .build();

        let token = dispatcher.shutdown_token();
        tokio::spawn(async move {
            if shutdown.wait_for(|stop| *stop).await.is_err() {
                // sender dropped without signalling; keep running
                return;
            }
            info!("Shutdown requested, stopping update polling");
            match token.shutdown() {
                Ok(done) => done.await,
                Err(e) => warn!("Dispatcher was not running: {}", e),
            }
        });

        let listener = update_listeners::polling_default(self.bot.clone()).await;
        dispatcher
            .dispatch_with_listener(listener, Arc::new(report_listener_error))
            .await;

        info!("Telegram platform stopped");
        Ok(())
    }
}

async fn handle_update(upd: Update, pipeline: Arc<DispatchPipeline>) -> ResponseResult<()> {
    let update_id = upd.id;
    let outcome = pipeline.handle_update(convert_update(upd)).await;
    debug!("Update {:?} finished: {:?}", update_id, outcome);
    Ok(())
}

/// Transport failures from the polling loop, distinct from per-update faults.
async fn report_listener_error(err: RequestError) {
    error!("{}", Fault::from(err).render());
}

/// Convert a teloxide update into the platform-agnostic form
pub fn convert_update(upd: Update) -> InboundUpdate {
    match upd.kind {
        UpdateKind::Message(msg) => InboundUpdate::NewMessage(convert_message(&msg)),
        UpdateKind::EditedMessage(msg) => InboundUpdate::EditedMessage(convert_message(&msg)),
        other => InboundUpdate::Other {
            kind: update_kind_name(&other).to_string(),
        },
    }
}

fn update_kind_name(kind: &UpdateKind) -> &'static str {
    match kind {
        UpdateKind::Message(_) => "Message",
        UpdateKind::EditedMessage(_) => "EditedMessage",
        UpdateKind::ChannelPost(_) => "ChannelPost",
        UpdateKind::EditedChannelPost(_) => "EditedChannelPost",
        UpdateKind::InlineQuery(_) => "InlineQuery",
        UpdateKind::ChosenInlineResult(_) => "ChosenInlineResult",
        UpdateKind::CallbackQuery(_) => "CallbackQuery",
        UpdateKind::ShippingQuery(_) => "ShippingQuery",
        UpdateKind::PreCheckoutQuery(_) => "PreCheckoutQuery",
        UpdateKind::Poll(_) => "Poll",
        UpdateKind::PollAnswer(_) => "PollAnswer",
        UpdateKind::MyChatMember(_) => "MyChatMember",
        UpdateKind::ChatMember(_) => "ChatMember",
        UpdateKind::ChatJoinRequest(_) => "ChatJoinRequest",
        UpdateKind::Error(_) => "Unrecognized",
        _ => "Other",
    }
}

fn convert_message(msg: &Message) -> IncomingMessage {
    let user_name = msg
        .from
        .as_ref()
        .map(|user| user.full_name())
        .or_else(|| msg.chat.username().map(str::to_string))
        .unwrap_or_default();

    let content = match msg.text() {
        Some(text) => MessageContent::Text(text.to_string()),
        None => MessageContent::NonText {
            kind: content_kind_name(msg).to_string(),
        },
    };

    IncomingMessage {
        chat_id: msg.chat.id.0,
        user_name,
        content,
    }
}

fn content_kind_name(msg: &Message) -> &'static str {
    if msg.photo().is_some() {
        "Photo"
    } else if msg.sticker().is_some() {
        "Sticker"
    } else if msg.animation().is_some() {
        "Animation"
    } else if msg.video().is_some() {
        "Video"
    } else if msg.voice().is_some() {
        "Voice"
    } else if msg.audio().is_some() {
        "Audio"
    } else if msg.document().is_some() {
        "Document"
    } else if msg.location().is_some() {
        "Location"
    } else if msg.contact().is_some() {
        "Contact"
    } else if msg.poll().is_some() {
        "Poll"
    } else {
        "Other"
    }
}

impl From<RequestError> for Fault {
    fn from(err: RequestError) -> Self {
        if let RequestError::Network(source) = &err {
            if let Some(status) = source.status() {
                return Fault::transport(status.as_u16(), source.to_string());
            }
        }

        match err {
            // unknown errors carry the raw Bot API description
            RequestError::Api(ApiError::Unknown(description)) => {
                Fault::transport(status_from_description(&description), description)
            }
            RequestError::Api(ApiError::InvalidToken) => {
                Fault::transport(401, ApiError::InvalidToken.to_string())
            }
            RequestError::Api(ApiError::RequestEntityTooLarge) => {
                Fault::transport(413, ApiError::RequestEntityTooLarge.to_string())
            }
            RequestError::Api(ApiError::CantGetUpdates) => {
                Fault::transport(409, ApiError::CantGetUpdates.to_string())
            }
            RequestError::Api(api) => {
                let description = api.to_string();
                Fault::transport(status_from_description(&description), description)
            }
            RequestError::RetryAfter(after) => Fault::transport(
                429,
                format!("Too Many Requests: retry after {}s", after.seconds()),
            ),
            RequestError::MigrateToChatId(chat) => Fault::transport(
                400,
                format!(
                    "Bad Request: group chat was upgraded to a supergroup chat (new id {})",
                    chat
                ),
            ),
            other => Fault::generic(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_update(json: &str) -> Update {
        serde_json::from_str(json).unwrap()
    }

    const CHAT: &str = r#"{"id": 42, "type": "private", "first_name": "Ada", "username": "ada"}"#;
    const FROM: &str =
        r#"{"id": 42, "is_bot": false, "first_name": "Ada", "last_name": "Lovelace", "username": "ada"}"#;

    fn message_json(body: &str) -> String {
        format!(
            r#"{{"message_id": 10, "date": 1700000000, "chat": {}, "from": {}, {}}}"#,
            CHAT, FROM, body
        )
    }

    #[test]
    fn test_text_message_converts() {
        let json = format!(
            r#"{{"update_id": 1, "message": {}}}"#,
            message_json(r#""text": "/hello there""#)
        );
        match convert_update(parse_update(&json)) {
            InboundUpdate::NewMessage(msg) => {
                assert_eq!(msg.chat_id, 42);
                assert_eq!(msg.user_name, "Ada Lovelace");
                assert_eq!(msg.content, MessageContent::Text("/hello there".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_edited_message_converts() {
        let json = format!(
            r#"{{"update_id": 2, "edited_message": {}}}"#,
            message_json(r#""edit_date": 1700000100, "text": "/cross""#)
        );
        assert!(matches!(
            convert_update(parse_update(&json)),
            InboundUpdate::EditedMessage(ref msg) if msg.text() == Some("/cross")
        ));
    }

    #[test]
    fn test_location_message_is_non_text() {
        let json = format!(
            r#"{{"update_id": 3, "message": {}}}"#,
            message_json(r#""location": {"latitude": 52.5, "longitude": 13.4}"#)
        );
        match convert_update(parse_update(&json)) {
            InboundUpdate::NewMessage(msg) => {
                assert_eq!(msg.text(), None);
                assert_eq!(msg.kind(), "Location");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized_update_is_other() {
        let update = parse_update(r#"{"update_id": 4, "brand_new_kind": {"x": 1}}"#);
        assert!(matches!(
            convert_update(update),
            InboundUpdate::Other { ref kind } if kind == "Unrecognized"
        ));
    }

    #[test]
    fn test_api_error_is_transport() {
        let fault = Fault::from(RequestError::Api(ApiError::BotBlocked));
        match fault {
            Fault::Transport { code, message } => {
                assert_eq!(code, 403);
                assert!(message.starts_with("Forbidden"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_api_error_keeps_description() {
        let fault = Fault::from(RequestError::Api(ApiError::Unknown(
            "Too Many Requests: retry later".to_string(),
        )));
        let report = fault.render();
        assert!(report.contains("[429]"));
        assert!(report.contains("retry later"));
    }

    #[test]
    fn test_invalid_token_is_401() {
        let report = Fault::from(RequestError::Api(ApiError::InvalidToken)).render();
        assert!(report.contains("[401]"), "{}", report);
    }

    #[test]
    fn test_entity_too_large_is_413() {
        let report = Fault::from(RequestError::Api(ApiError::RequestEntityTooLarge)).render();
        assert!(report.contains("[413]"), "{}", report);
    }

    #[test]
    fn test_cant_get_updates_is_409() {
        let report = Fault::from(RequestError::Api(ApiError::CantGetUpdates)).render();
        assert!(report.contains("[409]"), "{}", report);
    }

    #[test]
    fn test_io_error_is_generic() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "pipe burst");
        let fault = Fault::from(RequestError::Io(Arc::new(io)));
        assert!(matches!(fault, Fault::Generic { .. }));
        let report = fault.render();
        assert!(report.contains("RequestError"));
        assert!(report.contains("pipe burst"));
    }
}
