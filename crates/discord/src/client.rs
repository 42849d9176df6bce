//! The transport surface the bridge core consumes.
//!
//! [`crate::DiscordClient`] is the production implementation; tests use the
//! in-memory one from [`crate::testing`].

use {async_trait::async_trait, tandem_channels::WebhookCredentials, tokio::sync::mpsc};

use crate::Result;

/// Sender half of the incoming event queue handed to [`GatewayClient::open`].
pub type EventSender = mpsc::UnboundedSender<GatewayEvent>;

/// Receiver half consumed by the bridge's dispatch task.
pub type EventReceiver = mpsc::UnboundedReceiver<GatewayEvent>;

/// Session data returned once the gateway has accepted our identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ready {
    /// The bot's own user id.
    pub user_id: String,
    pub username: String,
    /// Servers the bot account belongs to.
    pub guild_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildChannel {
    pub id: String,
    pub name: String,
}

/// A server member as returned by member lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: String,
    pub username: String,
    /// Per-server nickname override.
    pub nick: Option<String>,
    pub avatar_url: String,
}

impl Member {
    /// The name shown on this server: the nickname when set, else the username.
    pub fn display_name(&self) -> &str {
        match self.nick.as_deref() {
            Some(nick) if !nick.is_empty() => nick,
            _ => &self.username,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub username: String,
    pub bot: bool,
}

/// A user mentioned in a message, with their server nickname when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionedUser {
    pub id: String,
    pub username: String,
    pub nick: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub id: String,
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub author: Author,
    /// Set when the message was posted through a webhook.
    pub webhook_id: Option<String>,
    pub content: String,
    pub mentions: Vec<MentionedUser>,
}

/// Events pushed by the transport while a session is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    Connected,
    Disconnected,
    Error(String),
    Message(IncomingMessage),
}

/// A message posted through a webhook under an arbitrary identity.
#[derive(Debug, Clone, Copy)]
pub struct WebhookMessage<'a> {
    pub username: &'a str,
    pub content: &'a str,
    /// Empty means the webhook's default avatar.
    pub avatar_url: &'a str,
}

/// Discord operations needed by the bridge.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Open the gateway session. Incoming events are pushed to `events`
    /// until [`GatewayClient::close`] is called.
    async fn open(&self, events: EventSender) -> Result<Ready>;

    async fn close(&self) -> Result<()>;

    async fn guild_channels(&self, guild_id: &str) -> Result<Vec<GuildChannel>>;

    async fn list_guild_members(&self, guild_id: &str) -> Result<Vec<Member>>;

    async fn get_member(&self, guild_id: &str, user_id: &str) -> Result<Member>;

    async fn send_webhook(
        &self,
        webhook: &WebhookCredentials,
        message: &WebhookMessage<'_>,
    ) -> Result<()>;
}
