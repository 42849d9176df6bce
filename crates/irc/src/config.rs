use std::time::Duration;

use secrecy::{ExposeSecret, Secret};

/// Maximum PRIVMSG text length before splitting.
pub const DEFAULT_SPLIT_LEN: usize = 450;

pub const DEFAULT_QUIT_MESSAGE: &str = "I have to go.";

/// Interval between client-initiated keepalive pings.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(3 * 60);

const DEFAULT_PLAIN_PORT: u16 = 6667;

/// Connection settings for the IRC side.
#[derive(Clone)]
pub struct IrcConfig {
    /// `host:port`; plain-text connections may omit the port.
    pub host: String,
    pub nick: String,
    pub tls: bool,
    /// Server password sent with `PASS`.
    pub password: Option<Secret<String>>,
    pub split_len: usize,
    pub quit_message: String,
    pub ping_interval: Duration,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            nick: String::new(),
            tls: true,
            password: None,
            split_len: DEFAULT_SPLIT_LEN,
            quit_message: DEFAULT_QUIT_MESSAGE.into(),
            ping_interval: DEFAULT_PING_INTERVAL,
        }
    }
}

impl std::fmt::Debug for IrcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IrcConfig")
            .field("host", &self.host)
            .field("nick", &self.nick)
            .field("tls", &self.tls)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("split_len", &self.split_len)
            .field("quit_message", &self.quit_message)
            .field("ping_interval", &self.ping_interval)
            .finish()
    }
}

impl IrcConfig {
    /// Address to dial, with the plain-text default port filled in.
    pub fn address(&self) -> String {
        if self.host.rsplit_once(':').is_some() {
            self.host.clone()
        } else {
            format!("{}:{DEFAULT_PLAIN_PORT}", self.host)
        }
    }

    /// Host part of [`Self::host`], used as the TLS server name.
    pub fn server_name(&self) -> &str {
        self.host
            .rsplit_once(':')
            .map_or(self.host.as_str(), |(host, _)| host)
    }

    pub(crate) fn password(&self) -> Option<&str> {
        self.password
            .as_ref()
            .map(|p| p.expose_secret().as_str())
            .filter(|p| !p.is_empty())
    }
}
