//! Relay building blocks shared by both sides of the bridge.
//!
//! A [`ChannelEndpoint`] is one Discord channel with an installable send hook,
//! a [`RelayTopology`] says which channels feed which, and [`transform`]
//! shapes text for the destination platform.

pub mod endpoint;
pub mod error;
pub mod topology;
pub mod transform;
pub mod webhook;

pub use {
    endpoint::{ChannelEndpoint, ReceiveFn, SendHook},
    error::{Error, Result},
    topology::{ChannelRef, Edge, RelayTopology},
    webhook::WebhookCredentials,
};
