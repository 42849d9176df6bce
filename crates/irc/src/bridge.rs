//! The IRC side of the relay and the builder that configures both sides.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    secrecy::{ExposeSecret, Secret},
    tandem_channels::{ChannelEndpoint, ChannelRef, RelayTopology, transform},
    tandem_common::Platform,
    tandem_discord::{DiscordBridge, DiscordClient, DiscordConfig, GatewayClient},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    Error,
    client::{LineClient, LineEvent, LineEventReceiver},
    config::IrcConfig,
    conn::IrcConnection,
    supervisor::{ConnectionSupervisor, RECONNECT_BACKOFF},
};

/// Validated settings for both sides plus the relay topology.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub irc: IrcConfig,
    pub discord: DiscordConfig,
    pub topology: RelayTopology,
    /// Delay between failed IRC connection attempts.
    pub reconnect_backoff: Duration,
}

/// Collects bridge settings in sequence and reports the first invalid one.
#[derive(Debug)]
pub struct IrcBridgeBuilder {
    irc: IrcConfig,
    discord: DiscordConfig,
    topology: RelayTopology,
    reconnect_backoff: Duration,
    error: Option<tandem_channels::Error>,
}

impl Default for IrcBridgeBuilder {
    fn default() -> Self {
        Self {
            irc: IrcConfig::default(),
            discord: DiscordConfig::default(),
            topology: RelayTopology::new(),
            reconnect_backoff: RECONNECT_BACKOFF,
            error: None,
        }
    }
}

impl IrcBridgeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// IRC server as `host:port`.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.irc.host = host.into();
        self
    }

    pub fn nick(mut self, nick: impl Into<String>) -> Self {
        self.irc.nick = nick.into();
        self
    }

    /// Whether to connect to IRC over TLS. Defaults to `true`.
    pub fn tls(mut self, tls: bool) -> Self {
        self.irc.tls = tls;
        self
    }

    /// Discord bot token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.discord.token = Secret::new(token.into());
        self
    }

    /// IRC server password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.irc.password = Some(Secret::new(password.into()));
        self
    }

    pub fn split_len(mut self, split_len: usize) -> Self {
        self.irc.split_len = split_len;
        self
    }

    pub fn quit_message(mut self, message: impl Into<String>) -> Self {
        self.irc.quit_message = message.into();
        self
    }

    pub fn reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    /// Replace the Discord connection settings, keeping any token already set
    /// when `discord` has none.
    pub fn discord(mut self, discord: DiscordConfig) -> Self {
        let token = std::mem::replace(&mut self.discord, discord).token;
        if self.discord.token.expose_secret().is_empty() {
            self.discord.token = token;
        }
        self
    }

    /// Relay messages from `from` to `to`.
    pub fn relay(mut self, from: ChannelRef, to: ChannelRef) -> Self {
        if self.error.is_none()
            && let Err(e) = self.topology.relay(&from, &to)
        {
            self.error = Some(e);
        }
        self
    }

    /// Relay both ways between an IRC channel and a Discord channel.
    pub fn sync(mut self, a: ChannelRef, b: ChannelRef) -> Self {
        if self.error.is_none()
            && let Err(e) = self.topology.sync(&a, &b)
        {
            self.error = Some(e);
        }
        self
    }

    pub fn build(self) -> tandem_channels::Result<BridgeConfig> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if self.irc.host.trim().is_empty() {
            return Err(tandem_channels::Error::configuration("missing host"));
        }
        if self.irc.tls && self.irc.host.rsplit_once(':').is_none() {
            return Err(tandem_channels::Error::configuration(
                "host must be host:port",
            ));
        }
        if self.irc.nick.trim().is_empty() {
            return Err(tandem_channels::Error::configuration("missing nick"));
        }
        if self.topology.is_empty() {
            return Err(tandem_channels::Error::configuration(
                "no relay configured",
            ));
        }
        Ok(BridgeConfig {
            irc: self.irc,
            discord: self.discord,
            topology: self.topology,
            reconnect_backoff: self.reconnect_backoff,
        })
    }
}

/// Routes IRC events to Discord endpoints.
struct Dispatcher {
    client: Arc<dyn LineClient>,
    topology: Arc<RelayTopology>,
    endpoints: HashMap<String, Arc<ChannelEndpoint>>,
    supervisor: Arc<ConnectionSupervisor>,
    /// Our current nick, for loop prevention. Empty until registered.
    nick: Mutex<String>,
}

impl Dispatcher {
    async fn run(self: Arc<Self>, mut events: LineEventReceiver) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        debug!("irc event stream ended");
    }

    async fn handle(&self, event: LineEvent) {
        match event {
            LineEvent::Connected { nick } => {
                info!(nick = %nick, "registered on IRC");
                if let Err(e) = self.client.mode(&nick, "+B") {
                    warn!(error = %e, "failed to set bot mode");
                }
                for channel in self.topology.irc_channels() {
                    if let Err(e) = self.client.join(channel) {
                        warn!(channel, error = %e, "failed to join channel");
                    }
                }
                *self.nick.lock().unwrap_or_else(|e| e.into_inner()) = nick;
            },
            LineEvent::NickChanged { nick } => {
                info!(nick = %nick, "irc nick changed");
                *self.nick.lock().unwrap_or_else(|e| e.into_inner()) = nick;
            },
            LineEvent::Disconnected => {
                self.supervisor.disconnected();
            },
            LineEvent::Error(text) => {
                warn!(error = %text, "irc error");
            },
            LineEvent::Message {
                channel,
                nick,
                text,
                action,
            } => {
                if self.is_own(&nick) {
                    return;
                }
                let text = if action {
                    transform::action_text(&text)
                } else {
                    text
                };
                self.relay_to_discord(&channel, &nick, &text).await;
            },
        }
    }

    fn is_own(&self, nick: &str) -> bool {
        let own = self.nick.lock().unwrap_or_else(|e| e.into_inner());
        !own.is_empty() && own.eq_ignore_ascii_case(nick)
    }

    async fn relay_to_discord(&self, channel: &str, nick: &str, text: &str) {
        for target in self.topology.discord_targets(channel) {
            let Some(endpoint) = self.endpoints.get(target) else {
                continue;
            };
            match endpoint.send(nick, text).await {
                Ok(()) => {},
                Err(e) if e.is_not_connected() => {
                    debug!(channel = target, "discord not connected, message dropped");
                },
                Err(e) => {
                    warn!(from = channel, to = target, error = %e, "relay to discord failed");
                },
            }
        }
    }
}

/// A running IRC <-> Discord relay.
pub struct IrcBridge {
    discord: DiscordBridge,
    supervisor: Arc<ConnectionSupervisor>,
    cancel: CancellationToken,
}

impl IrcBridge {
    /// Connect both sides using the production IRC and Discord clients.
    pub async fn connect(config: BridgeConfig) -> tandem_channels::Result<Self> {
        let discord = Arc::new(DiscordClient::new(config.discord.clone())?);
        let (irc, events) = IrcConnection::new(config.irc.clone());
        Self::start(config, irc, events, discord).await
    }

    /// Start the relay over the given transports.
    ///
    /// The Discord side is started before this returns and its errors are
    /// returned; the IRC side connects in the background and reconnects on
    /// its own.
    pub async fn start(
        config: BridgeConfig,
        line_client: Arc<dyn LineClient>,
        line_events: LineEventReceiver,
        gateway: Arc<dyn GatewayClient>,
    ) -> tandem_channels::Result<Self> {
        let topology = Arc::new(config.topology);

        let endpoints: HashMap<String, Arc<ChannelEndpoint>> = topology
            .discord_channels()
            .map(|(name, webhook)| {
                let targets: Vec<String> =
                    topology.irc_targets(name).map(String::from).collect();
                let client = Arc::clone(&line_client);
                let endpoint = ChannelEndpoint::with_webhook(
                    name,
                    webhook.clone(),
                    Arc::new(move |nick: &str, text: &str| {
                        relay_to_irc(client.as_ref(), &targets, nick, text);
                    }),
                );
                (name.to_string(), Arc::new(endpoint))
            })
            .collect();

        let discord = DiscordBridge::new(gateway, endpoints.values().cloned().collect());
        discord.start().await?;

        let supervisor = Arc::new(
            ConnectionSupervisor::new(Arc::clone(&line_client), config.irc.quit_message.clone())
                .with_backoff(config.reconnect_backoff),
        );
        let dispatcher = Arc::new(Dispatcher {
            client: line_client,
            topology,
            endpoints,
            supervisor: Arc::clone(&supervisor),
            nick: Mutex::new(String::new()),
        });

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {},
                () = dispatcher.run(line_events) => {},
            }
        });
        tokio::spawn(Arc::clone(&supervisor).run());

        info!(host = %config.irc.host, nick = %config.irc.nick, "irc bridge started");
        Ok(Self {
            discord,
            supervisor,
            cancel,
        })
    }

    pub fn discord(&self) -> &DiscordBridge {
        &self.discord
    }

    /// Quit IRC and close the Discord session.
    pub async fn close(&self) -> tandem_channels::Result<()> {
        let quit = self.supervisor.close();
        let closed = self.discord.close().await;
        self.cancel.cancel();
        quit.map_err(tandem_channels::Error::from)?;
        closed
    }
}

fn relay_to_irc(client: &dyn LineClient, targets: &[String], nick: &str, text: &str) {
    let lines = transform::to_line_protocol(Platform::Discord, nick, text);
    for target in targets {
        for line in &lines {
            if let Err(e) = client.privmsg(target, line) {
                match e {
                    Error::NotConnected => {
                        debug!(channel = %target, "irc not connected, message dropped");
                    },
                    e => warn!(channel = %target, error = %e, "relay to irc failed"),
                }
                break;
            }
        }
    }
}
