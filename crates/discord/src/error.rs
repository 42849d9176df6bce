use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Serenity(#[from] serenity::Error),

    #[error(transparent)]
    Channel(#[from] tandem_channels::Error),

    /// A configured id is not a Discord snowflake.
    #[error("invalid {kind} id {value:?}")]
    InvalidId { kind: &'static str, value: String },

    /// Webhook execution failed; the webhook token is scrubbed from `message`.
    #[error("webhook {id}: {message}")]
    Webhook { id: String, message: String },

    /// The gateway session could not be established.
    #[error("gateway: {message}")]
    Gateway { message: String },
}

impl Error {
    #[must_use]
    pub fn gateway(message: impl Into<String>) -> Self {
        Self::Gateway {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for tandem_channels::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Channel(inner) => inner,
            other => Self::transport("discord", other),
        }
    }
}
