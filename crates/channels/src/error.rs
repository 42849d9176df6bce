use std::error::Error as StdError;

/// Crate-wide result type for relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed relay errors shared by both sides of the bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Setup-time misconfiguration (bad webhook URL, missing host,
    /// incompatible relay endpoints). Never retried.
    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    /// The transport could not be opened.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// The account's server layout does not match what the bridge needs.
    #[error("unsupported topology: {message}")]
    Topology { message: String },

    /// A configured channel name does not exist on the server.
    #[error("server has no channel #{channel}")]
    ChannelNotFound { channel: String },

    /// A webhook execution failed for one destination channel.
    #[error("webhook execute failed for #{channel}: {source}")]
    Webhook {
        channel: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// Wrapped failure from a transport collaborator.
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// No send hook is installed; the bridge is not connected.
    #[error("not connected")]
    NotConnected,
}

impl Error {
    #[must_use]
    pub fn configuration(message: impl std::fmt::Display) -> Self {
        Self::Configuration {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn connection(message: impl std::fmt::Display) -> Self {
        Self::Connection {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn topology(message: impl std::fmt::Display) -> Self {
        Self::Topology {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn channel_not_found(channel: impl Into<String>) -> Self {
        Self::ChannelNotFound {
            channel: channel.into(),
        }
    }

    #[must_use]
    pub fn webhook(
        channel: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Webhook {
            channel: channel.into(),
            source: source.into(),
        }
    }

    #[must_use]
    pub fn transport(
        context: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Transport {
            context: context.into(),
            source: source.into(),
        }
    }

    /// `NotConnected` is expected during shutdown races and should not be
    /// reported as a failure.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected)
    }
}
