//! Config file schema.
use std::collections::HashMap;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tandem_channels::ChannelRef,
};

use crate::Result;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TandemConfig {
    pub irc: IrcSection,
    pub discord: DiscordSection,
    /// One-way relays, `from` -> `to`.
    pub relay: Vec<RelayEntry>,
    /// Two-way relays between one IRC channel and one Discord channel.
    pub sync: Vec<SyncEntry>,
}

/// IRC server connection.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IrcSection {
    /// `host:port`. Plain-text connections may omit the port.
    pub host: String,
    pub nick: String,
    pub tls: bool,
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<Secret<String>>,
    /// Longest PRIVMSG text sent in one line.
    pub split_len: usize,
    pub quit_message: String,
    /// Seconds between IRC reconnect attempts.
    pub reconnect_secs: u64,
}

impl Default for IrcSection {
    fn default() -> Self {
        Self {
            host: String::new(),
            nick: String::new(),
            tls: true,
            password: None,
            split_len: 450,
            quit_message: "I have to go.".into(),
            reconnect_secs: 60,
        }
    }
}

impl std::fmt::Debug for IrcSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IrcSection")
            .field("host", &self.host)
            .field("nick", &self.nick)
            .field("tls", &self.tls)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("split_len", &self.split_len)
            .field("quit_message", &self.quit_message)
            .field("reconnect_secs", &self.reconnect_secs)
            .finish()
    }
}

/// Discord bot account and the webhooks it posts through.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordSection {
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,
    /// Discord channel name -> webhook URL.
    pub webhooks: HashMap<String, String>,
    /// Proxy for REST requests, e.g. a shared rate-limit proxy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl Default for DiscordSection {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            webhooks: HashMap::new(),
            proxy: None,
        }
    }
}

impl std::fmt::Debug for DiscordSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Webhook URLs embed their token.
        let mut channels: Vec<&str> = self.webhooks.keys().map(String::as_str).collect();
        channels.sort_unstable();
        f.debug_struct("DiscordSection")
            .field("token", &"[REDACTED]")
            .field("webhooks", &channels)
            .field("proxy", &self.proxy)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEntry {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEntry {
    pub irc: String,
    pub discord: String,
}

/// A relay rule with both ends resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayRule {
    Relay { from: ChannelRef, to: ChannelRef },
    Sync { irc: ChannelRef, discord: ChannelRef },
}

impl RelayEntry {
    pub fn resolve(&self, webhooks: &HashMap<String, String>) -> Result<RelayRule> {
        Ok(RelayRule::Relay {
            from: ChannelRef::parse(&self.from, webhooks)?,
            to: ChannelRef::parse(&self.to, webhooks)?,
        })
    }
}

impl SyncEntry {
    pub fn resolve(&self, webhooks: &HashMap<String, String>) -> Result<RelayRule> {
        Ok(RelayRule::Sync {
            irc: ChannelRef::parse(&qualify("irc", &self.irc), webhooks)?,
            discord: ChannelRef::parse(&qualify("discord", &self.discord), webhooks)?,
        })
    }
}

impl TandemConfig {
    /// Resolve `[[relay]]` then `[[sync]]` entries, in file order.
    pub fn relay_rules(&self) -> Result<Vec<RelayRule>> {
        let webhooks = &self.discord.webhooks;
        self.relay
            .iter()
            .map(|entry| entry.resolve(webhooks))
            .chain(self.sync.iter().map(|entry| entry.resolve(webhooks)))
            .collect()
    }

    /// Whether any relay or sync entry names Discord channel `name`.
    pub fn uses_discord_channel(&self, name: &str) -> bool {
        let matches = |spec: &str| {
            spec.strip_prefix("discord:")
                .is_some_and(|channel| channel.trim_start_matches('#') == name)
        };
        self.relay
            .iter()
            .any(|entry| matches(&entry.from) || matches(&entry.to))
            || self
                .sync
                .iter()
                .any(|entry| matches(&qualify("discord", &entry.discord)))
    }

    pub fn token(&self) -> &str {
        self.discord.token.expose_secret()
    }
}

/// `[[sync]]` entries name bare channels; add the platform prefix unless the
/// user already wrote one.
fn qualify(platform: &str, channel: &str) -> String {
    if channel.contains(':') {
        channel.to_string()
    } else {
        format!("{platform}:{channel}")
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const HOOK: &str = "https://discord.com/api/webhooks/123/abc";

    fn config(toml_str: &str) -> TandemConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn defaults() {
        let cfg = TandemConfig::default();
        assert!(cfg.irc.tls);
        assert_eq!(cfg.irc.split_len, 450);
        assert_eq!(cfg.irc.quit_message, "I have to go.");
        assert_eq!(cfg.irc.reconnect_secs, 60);
        assert!(cfg.relay.is_empty());
    }

    #[test]
    fn parses_full_file() {
        let cfg = config(&format!(
            r##"
            [irc]
            host = "irc.libera.chat:6697"
            nick = "discord"
            password = "pw"

            [discord]
            token = "bot"

            [discord.webhooks]
            general = "{HOOK}"
            dev = "{HOOK}"

            [[relay]]
            from = "irc:#general"
            to = "discord:general"

            [[sync]]
            irc = "#dev"
            discord = "dev"
            "##
        ));
        assert_eq!(cfg.irc.host, "irc.libera.chat:6697");
        assert_eq!(cfg.irc.password.as_ref().map(|p| p.expose_secret().as_str()), Some("pw"));
        assert_eq!(cfg.token(), "bot");

        let rules = cfg.relay_rules().unwrap();
        assert_eq!(rules.len(), 2);
        assert!(matches!(
            &rules[0],
            RelayRule::Relay { from, to } if from.channel() == "#general" && to.channel() == "general"
        ));
        assert!(matches!(
            &rules[1],
            RelayRule::Sync { irc, discord } if irc.channel() == "#dev" && discord.channel() == "dev"
        ));
    }

    #[test]
    fn relay_to_unknown_webhook_fails() {
        let cfg = config(
            r##"
            [[relay]]
            from = "irc:#general"
            to = "discord:general"
            "##,
        );
        let err = cfg.relay_rules().unwrap_err();
        assert!(err.to_string().contains("no webhook configured"), "{err}");
    }

    #[test]
    fn webhook_usage() {
        let cfg = config(
            r##"
            [[relay]]
            from = "discord:#general"
            to = "irc:#general"

            [[sync]]
            irc = "#dev"
            discord = "dev"
            "##,
        );
        assert!(cfg.uses_discord_channel("general"));
        assert!(cfg.uses_discord_channel("dev"));
        assert!(!cfg.uses_discord_channel("random"));
    }

    #[test]
    fn debug_hides_secrets() {
        let cfg = config(&format!(
            r#"
            [irc]
            password = "hunter2"
            [discord]
            token = "bot-secret"
            [discord.webhooks]
            general = "{HOOK}"
            "#
        ));
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("bot-secret"));
        assert!(!debug.contains("/abc"));
        assert!(debug.contains("general"));
    }
}
