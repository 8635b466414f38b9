use std::any::Any;

use thiserror::Error;

/// Label prefixed to every rendered transport fault
const TRANSPORT_LABEL: &str = "Telegram API Error:";

/// A failure raised while processing a single update.
#[derive(Debug, Error)]
pub enum Fault {
    /// Coded failure reported by the messaging platform (or its HTTP layer)
    #[error("transport fault [{code}]: {message}")]
    Transport { code: u16, message: String },

    /// Anything else: handler bugs, unexpected conversions, panics.
    /// `kind` names the originating error type.
    #[error("{kind}: {error}")]
    Generic {
        kind: &'static str,
        error: anyhow::Error,
    },
}

impl From<anyhow::Error> for Fault {
    fn from(error: anyhow::Error) -> Self {
        Fault::Generic {
            kind: "anyhow::Error",
            error,
        }
    }
}

impl Fault {
    pub fn transport(code: u16, message: impl Into<String>) -> Self {
        Fault::Transport {
            code,
            message: message.into(),
        }
    }

    /// Wrap a concrete error, keeping its type name for the report.
    pub fn generic<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Fault::Generic {
            kind: std::any::type_name::<E>(),
            error: anyhow::Error::new(error),
        }
    }

    /// Convert a caught panic payload into a generic fault.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Fault::Generic {
            kind: "panic",
            error: anyhow::anyhow!("handler panicked: {}", detail),
        }
    }

    /// Render the fault as log-ready text.
    ///
    /// Transport faults become a labelled block with the code in brackets;
    /// generic faults fall back to the full description including the cause chain.
    pub fn render(&self) -> String {
        match self {
            Fault::Transport { code, message } => {
                format!("{}\n[{}]\n{}", TRANSPORT_LABEL, code, message)
            }
            Fault::Generic { kind, error } => format!("{}: {:?}", kind, error),
        }
    }
}

/// Map a Telegram error description onto its HTTP status.
///
/// The Bot API prefixes descriptions with the status phrase
/// ("Forbidden: bot was blocked by the user"); anything unrecognised is a 400.
pub fn status_from_description(description: &str) -> u16 {
    const PREFIXES: [(&str, u16); 6] = [
        ("Bad Request", 400),
        ("Unauthorized", 401),
        ("Forbidden", 403),
        ("Not Found", 404),
        ("Conflict", 409),
        ("Too Many Requests", 429),
    ];

    PREFIXES
        .iter()
        .find(|(prefix, _)| description.starts_with(prefix))
        .map(|(_, code)| *code)
        .unwrap_or(400)
}
