//! IRC side of the relay.
//!
//! [`IrcConnection`] speaks the line protocol, [`ConnectionSupervisor`] keeps
//! it connected, and [`IrcBridge`] wires both sides of the relay together.

pub mod bridge;
pub mod client;
pub mod config;
pub mod conn;
pub mod error;
pub mod line;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use {
    bridge::{BridgeConfig, IrcBridge, IrcBridgeBuilder},
    client::{LineClient, LineEvent, LineEventReceiver, LineEventSender},
    config::IrcConfig,
    conn::IrcConnection,
    error::{Error, Result},
    supervisor::{ConnectionState, ConnectionSupervisor, RECONNECT_BACKOFF},
};
