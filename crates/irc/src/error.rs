use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tls(#[from] tandem_common::Error),

    #[error("invalid TLS server name '{0}'")]
    ServerName(String),

    /// No live connection to write to.
    #[error("not connected to IRC")]
    NotConnected,

    #[error(transparent)]
    Channel(#[from] tandem_channels::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for tandem_channels::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Channel(inner) => inner,
            Error::NotConnected => Self::NotConnected,
            other => Self::transport("irc", other),
        }
    }
}
