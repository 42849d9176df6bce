//! Discord side of the relay.
//!
//! [`DiscordBridge`] attaches [`tandem_channels::ChannelEndpoint`]s to one
//! Discord server through any [`GatewayClient`]; [`DiscordClient`] is the
//! serenity-backed implementation used in production.

pub mod bot;
pub mod client;
pub mod config;
pub mod error;
mod events;
mod handler;
pub mod identity;
pub mod mentions;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use {
    bot::DiscordBridge,
    client::{
        Author, EventReceiver, EventSender, GatewayClient, GatewayEvent, GuildChannel,
        IncomingMessage, Member, MentionedUser, Ready, WebhookMessage,
    },
    config::DiscordConfig,
    error::{Error, Result},
    identity::IdentityCache,
    session::DiscordClient,
};
