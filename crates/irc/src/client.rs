//! The IRC transport surface the relay consumes.

use {async_trait::async_trait, tokio::sync::mpsc};

use crate::Result;

pub type LineEventSender = mpsc::UnboundedSender<LineEvent>;
pub type LineEventReceiver = mpsc::UnboundedReceiver<LineEvent>;

/// Events reported by a [`LineClient`] while connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Registration completed; `nick` is the nick the server accepted.
    Connected { nick: String },
    /// The server renamed us after registration.
    NickChanged { nick: String },
    /// The connection is gone. Emitted once per successful `connect`.
    Disconnected,
    Error(String),
    /// A channel or private message. `action` marks a CTCP ACTION (`/me`).
    Message {
        channel: String,
        nick: String,
        text: String,
        action: bool,
    },
}

/// Line-oriented chat connection.
///
/// Writes are queued and never block; they fail with
/// [`crate::Error::NotConnected`] when no connection is live.
#[async_trait]
pub trait LineClient: Send + Sync {
    /// Open the connection and send registration. Returns once the socket is
    /// up; [`LineEvent::Connected`] follows when the server accepts us.
    async fn connect(&self) -> Result<()>;

    fn quit(&self, message: &str) -> Result<()>;

    fn privmsg(&self, target: &str, text: &str) -> Result<()>;

    fn join(&self, channel: &str) -> Result<()>;

    fn mode(&self, target: &str, modes: &str) -> Result<()>;
}
