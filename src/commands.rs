use std::collections::HashMap;

use tracing::debug;

use crate::fault::Fault;
use crate::platform::{DisplayDirective, IncomingMessage, MessageSender, ReplyResult};

pub const HELLO_REPLY: &str = "Hello!";
pub const CROSS_REPLY: &str = "Dont' cross me, animal crossing \u{1F624}";
pub const USAGE_REPLY: &str = "Usage:\n/hello: Don't Cross Me Says Hello!";

/// A handler turns a message into reply text. Handlers are pure.
pub type ReplyHandler = fn(&IncomingMessage) -> String;

/// Commands the bot knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Hello,
    Cross,
    /// Fallback for anything that is not a known keyword
    Usage,
}

impl Command {
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Command::Hello => Some("/hello"),
            Command::Cross => Some("/cross"),
            Command::Usage => None,
        }
    }

    pub fn handler(&self) -> ReplyHandler {
        match self {
            Command::Hello => hello,
            Command::Cross => cross,
            Command::Usage => usage,
        }
    }
}

fn hello(_message: &IncomingMessage) -> String {
    HELLO_REPLY.to_string()
}

fn cross(_message: &IncomingMessage) -> String {
    CROSS_REPLY.to_string()
}

fn usage(_message: &IncomingMessage) -> String {
    USAGE_REPLY.to_string()
}

/// First whitespace-delimited token of the text, or "" for blank text.
pub fn command_token(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or("")
}

/// Read-only keyword table, built once at startup and shared by every dispatch
#[derive(Debug, Clone)]
pub struct CommandRouter {
    commands: HashMap<&'static str, Command>,
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRouter {
    pub fn new() -> Self {
        let commands = [Command::Hello, Command::Cross]
            .into_iter()
            .filter_map(|cmd| cmd.keyword().map(|kw| (kw, cmd)))
            .collect();
        Self { commands }
    }

    /// Registered keywords, sorted
    pub fn keywords(&self) -> Vec<&'static str> {
        let mut keywords: Vec<_> = self.commands.keys().copied().collect();
        keywords.sort_unstable();
        keywords
    }

    /// Resolve a text body to its command. Total: unknown tokens map to Usage.
    pub fn resolve(&self, text: &str) -> Command {
        self.commands
            .get(command_token(text))
            .copied()
            .unwrap_or(Command::Usage)
    }

    /// Reply text for a message, or None for non-text content.
    pub fn reply_for(&self, message: &IncomingMessage) -> Option<String> {
        let text = message.text()?;
        let command = self.resolve(text);
        debug!("Resolved {:?} for chat {}", command, message.chat_id);
        Some((command.handler())(message))
    }

    /// Pick the handler for `message` and send its reply with the keyboard removed.
    ///
    /// Returns `Ok(None)` without sending anything when the message is not text.
    pub async fn route(
        &self,
        message: &IncomingMessage,
        sender: &dyn MessageSender,
    ) -> Result<Option<ReplyResult>, Fault> {
        let Some(reply) = self.reply_for(message) else {
            return Ok(None);
        };

        let sent = sender
            .send_text(message.chat_id, &reply, DisplayDirective::RemoveKeyboard)
            .await?;
        Ok(Some(sent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MessageContent;

    fn text_message(text: &str) -> IncomingMessage {
        IncomingMessage {
            chat_id: 42,
            user_name: "Ada".to_string(),
            content: MessageContent::Text(text.to_string()),
        }
    }

    #[test]
    fn test_command_token() {
        assert_eq!(command_token("/hello there"), "/hello");
        assert_eq!(command_token("  /cross\tnow"), "/cross");
        assert_eq!(command_token("/hello\nworld"), "/hello");
        assert_eq!(command_token(""), "");
        assert_eq!(command_token("   "), "");
    }

    #[test]
    fn test_known_commands() {
        let router = CommandRouter::new();
        assert_eq!(
            router.reply_for(&text_message("/hello")).as_deref(),
            Some("Hello!")
        );
        assert_eq!(
            router.reply_for(&text_message("/hello there")).as_deref(),
            Some("Hello!")
        );
        assert_eq!(
            router.reply_for(&text_message("/cross me")).as_deref(),
            Some("Dont' cross me, animal crossing 😤")
        );
    }

    #[test]
    fn test_everything_else_gets_usage() {
        let router = CommandRouter::new();
        for text in ["", "   ", "/unknown", "hello", "/Hello", "/HELLO", "/hellothere", "x /hello"] {
            assert_eq!(
                router.reply_for(&text_message(text)).as_deref(),
                Some(USAGE_REPLY),
                "text {:?}",
                text
            );
        }
    }

    #[test]
    fn test_usage_text_is_verbatim() {
        assert_eq!(USAGE_REPLY, "Usage:\n/hello: Don't Cross Me Says Hello!");
        assert!(CROSS_REPLY.ends_with('\u{1F624}'));
    }

    #[test]
    fn test_non_text_has_no_reply() {
        let router = CommandRouter::new();
        let message = IncomingMessage {
            chat_id: 1,
            user_name: "Ada".to_string(),
            content: MessageContent::NonText {
                kind: "Photo".to_string(),
            },
        };
        assert_eq!(router.reply_for(&message), None);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let router = CommandRouter::new();
        let message = text_message("/cross");
        let first = router.reply_for(&message);
        let second = router.reply_for(&message);
        assert_eq!(first, second);
        assert_eq!(router.resolve("/cross"), Command::Cross);
        assert_eq!(router.resolve("/cross"), Command::Cross);
    }

    #[test]
    fn test_keywords() {
        let router = CommandRouter::new();
        assert_eq!(router.keywords(), vec!["/cross", "/hello"]);
    }

    #[test]
    fn test_handlers_callable_without_router() {
        let message = text_message("anything");
        assert_eq!((Command::Hello.handler())(&message), HELLO_REPLY);
        assert_eq!((Command::Usage.handler())(&message), USAGE_REPLY);
    }
}
