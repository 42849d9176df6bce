//! Directed relay edges between IRC channels and Discord channels.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use {
    tandem_common::Platform,
    tracing::{debug, warn},
};

use crate::{Error, Result, webhook::WebhookCredentials};

/// One side of a relay edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    /// IRC channel, stored lowercase (IRC channel names are case-insensitive).
    Irc { channel: String },
    /// Discord channel name (no leading `#`) with the webhook used to post in it.
    Discord {
        channel: String,
        webhook: WebhookCredentials,
    },
}

impl ChannelRef {
    pub fn irc(channel: &str) -> Self {
        Self::Irc {
            channel: channel.to_lowercase(),
        }
    }

    pub fn discord(channel: &str, webhook_url: &str) -> Result<Self> {
        let channel = channel.trim_start_matches('#').to_string();
        let webhook = WebhookCredentials::parse(webhook_url)
            .map_err(|e| Error::configuration(format!("discord:{channel}: {e}")))?;
        Ok(Self::Discord { channel, webhook })
    }

    /// Parse a `platform:channel` reference such as `irc:#general` or
    /// `discord:general`.
    ///
    /// Discord channels need a webhook URL, looked up by channel name in
    /// `webhooks`.
    pub fn parse(spec: &str, webhooks: &HashMap<String, String>) -> Result<Self> {
        let Some((prefix, channel)) = spec.split_once(':') else {
            return Err(Error::configuration(format!(
                "channel reference '{spec}' must look like irc:#name or discord:name"
            )));
        };
        if channel.trim().is_empty() {
            return Err(Error::configuration(format!(
                "channel reference '{spec}' has an empty channel name"
            )));
        }
        match Platform::from_prefix(prefix) {
            Some(Platform::Irc) => Ok(Self::irc(channel)),
            Some(Platform::Discord) => {
                let name = channel.trim_start_matches('#');
                let url = webhooks.get(name).ok_or_else(|| {
                    Error::configuration(format!("no webhook configured for discord:{name}"))
                })?;
                Self::discord(name, url)
            },
            None => Err(Error::configuration(format!(
                "'{spec}' is neither a Discord nor an IRC channel"
            ))),
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            Self::Irc { .. } => Platform::Irc,
            Self::Discord { .. } => Platform::Discord,
        }
    }

    pub fn channel(&self) -> &str {
        match self {
            Self::Irc { channel } | Self::Discord { channel, .. } => channel,
        }
    }
}

impl std::fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.platform(), self.channel())
    }
}

/// A single directed relay edge, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub source: Platform,
    pub from: String,
    pub to: String,
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.source,
            self.from,
            self.source.opposite(),
            self.to
        )
    }
}

/// Many-to-many relay configuration.
///
/// Edges have set semantics: relaying the same pair twice is a no-op.
#[derive(Debug, Default, Clone)]
pub struct RelayTopology {
    discord_to_irc: BTreeMap<String, BTreeSet<String>>,
    irc_to_discord: BTreeMap<String, BTreeSet<String>>,
    webhooks: BTreeMap<String, WebhookCredentials>,
}

impl RelayTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directed edge `from -> to`.
    ///
    /// Returns `false` when the edge already existed.
    pub fn relay(&mut self, from: &ChannelRef, to: &ChannelRef) -> Result<bool> {
        let added = match (from, to) {
            (ChannelRef::Irc { channel: irc }, ChannelRef::Discord {
                channel: discord,
                webhook,
            }) => {
                self.register_webhook(discord, webhook);
                self.irc_to_discord
                    .entry(irc.clone())
                    .or_default()
                    .insert(discord.clone())
            },
            (ChannelRef::Discord {
                channel: discord,
                webhook,
            }, ChannelRef::Irc { channel: irc }) => {
                self.register_webhook(discord, webhook);
                self.discord_to_irc
                    .entry(discord.clone())
                    .or_default()
                    .insert(irc.clone())
            },
            _ => {
                return Err(Error::configuration(format!(
                    "cannot relay {from} to {to}: both are {} channels",
                    from.platform()
                )));
            },
        };
        if added {
            debug!(%from, %to, "relay edge added");
        }
        Ok(added)
    }

    /// Relay both ways between `a` and `b`.
    pub fn sync(&mut self, a: &ChannelRef, b: &ChannelRef) -> Result<()> {
        self.relay(a, b)?;
        self.relay(b, a)?;
        Ok(())
    }

    /// The latest webhook named for a Discord channel is the one used.
    fn register_webhook(&mut self, channel: &str, webhook: &WebhookCredentials) {
        let previous = self.webhooks.insert(channel.to_string(), webhook.clone());
        if let Some(previous) = previous.filter(|previous| previous != webhook) {
            warn!(
                channel = %channel,
                previous = previous.id(),
                current = webhook.id(),
                "discord channel re-registered with a different webhook"
            );
        }
    }

    /// IRC channels that messages from Discord `channel` are relayed to.
    pub fn irc_targets(&self, discord_channel: &str) -> impl Iterator<Item = &str> {
        self.discord_to_irc
            .get(discord_channel)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Discord channels that messages from IRC `channel` are relayed to.
    pub fn discord_targets(&self, irc_channel: &str) -> impl Iterator<Item = &str> {
        self.irc_to_discord
            .get(&irc_channel.to_lowercase())
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Every IRC channel on either side of an edge; the bot joins all of them.
    pub fn irc_channels(&self) -> BTreeSet<&str> {
        self.irc_to_discord
            .keys()
            .map(String::as_str)
            .chain(self.discord_to_irc.values().flatten().map(String::as_str))
            .collect()
    }

    /// Every Discord channel on either side of an edge, with its webhook.
    pub fn discord_channels(&self) -> impl Iterator<Item = (&str, &WebhookCredentials)> {
        self.webhooks.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn edges(&self) -> Vec<Edge> {
        let irc = self.irc_to_discord.iter().flat_map(|(from, tos)| {
            tos.iter().map(move |to| Edge {
                source: Platform::Irc,
                from: from.clone(),
                to: to.clone(),
            })
        });
        let discord = self.discord_to_irc.iter().flat_map(|(from, tos)| {
            tos.iter().map(move |to| Edge {
                source: Platform::Discord,
                from: from.clone(),
                to: to.clone(),
            })
        });
        irc.chain(discord).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.irc_to_discord.is_empty() && self.discord_to_irc.is_empty()
    }
}
