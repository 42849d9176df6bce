//! Gateway-side bridge: brings the Discord session online, wires endpoint
//! hooks, and dispatches incoming messages.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use {
    async_trait::async_trait,
    tandem_channels::{ChannelEndpoint, Error, Result, SendHook, WebhookCredentials, transform},
    tokio::{sync::mpsc, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    client::{EventReceiver, GatewayClient, Ready, WebhookMessage},
    handler::{Routes, dispatch_events},
    identity::IdentityCache,
};

/// Live session state; present between a successful `start` and `close`.
struct Session {
    guild_id: String,
    cancel: CancellationToken,
    dispatcher: JoinHandle<()>,
}

/// Connects a set of [`ChannelEndpoint`]s to one Discord server.
///
/// The bridge can be started and closed any number of times; every start
/// resolves channel ids and rebuilds its routing tables from scratch.
pub struct DiscordBridge {
    client: Arc<dyn GatewayClient>,
    endpoints: Vec<Arc<ChannelEndpoint>>,
    identity: Arc<IdentityCache>,
    session: tokio::sync::Mutex<Option<Session>>,
}

impl DiscordBridge {
    pub fn new(client: Arc<dyn GatewayClient>, endpoints: Vec<Arc<ChannelEndpoint>>) -> Self {
        Self {
            client,
            endpoints,
            identity: Arc::new(IdentityCache::new()),
            session: tokio::sync::Mutex::new(None),
        }
    }

    /// Share an identity cache with another component.
    pub fn with_identity_cache(mut self, identity: Arc<IdentityCache>) -> Self {
        self.identity = identity;
        self
    }

    pub fn endpoints(&self) -> &[Arc<ChannelEndpoint>] {
        &self.endpoints
    }

    pub fn identity(&self) -> &Arc<IdentityCache> {
        &self.identity
    }

    pub async fn is_started(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Open the gateway session and attach every endpoint.
    ///
    /// On any failure after the session opened, the session is closed again
    /// and no endpoint is left with a hook.
    pub async fn start(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            info!("discord bridge already started");
            return Ok(());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let ready = self
            .client
            .open(tx)
            .await
            .map_err(|e| Error::connection(format!("opening discord session: {e}")))?;
        info!(user_id = %ready.user_id, username = %ready.username, "discord session opened");

        let routes = match self.resolve_routes(&ready).await {
            Ok(routes) => routes,
            Err(e) => {
                warn!(error = %e, "discord bridge start failed, closing session");
                if let Err(close_err) = self.client.close().await {
                    warn!(error = %close_err, "error closing discord session");
                }
                return Err(e);
            },
        };

        for (channel_id, endpoint) in &routes.endpoints {
            endpoint.install_hook(Arc::new(WebhookHook {
                client: Arc::clone(&self.client),
                identity: Arc::clone(&self.identity),
                guild_id: routes.guild_id.clone(),
                channel: endpoint.name().to_string(),
                webhook: endpoint.webhook().clone(),
            }));
            debug!(channel = endpoint.name(), channel_id, "send hook installed");
        }

        let guild_id = routes.guild_id.clone();
        let cancel = CancellationToken::new();
        let dispatcher = self.spawn_dispatcher(rx, routes, cancel.clone());
        *session = Some(Session {
            guild_id: guild_id.clone(),
            cancel,
            dispatcher,
        });

        info!(
            guild_id = %guild_id,
            channels = self.endpoints.len(),
            "discord bridge started"
        );
        Ok(())
    }

    /// Detach every endpoint and close the gateway session.
    ///
    /// Sends already in flight complete; sends issued afterwards fail with
    /// [`Error::NotConnected`]. Closing a stopped bridge is a no-op.
    pub async fn close(&self) -> Result<()> {
        let Some(session) = self.session.lock().await.take() else {
            debug!("discord bridge not started, nothing to close");
            return Ok(());
        };

        session.cancel.cancel();
        for endpoint in &self.endpoints {
            endpoint.clear_hook();
        }
        if let Err(e) = session.dispatcher.await {
            warn!(error = %e, "discord dispatch task ended abnormally");
        }

        self.client.close().await?;
        info!(guild_id = %session.guild_id, "discord bridge stopped");
        Ok(())
    }

    async fn resolve_routes(&self, ready: &Ready) -> Result<Routes> {
        let guild_id = match ready.guild_ids.as_slice() {
            [only] => only.clone(),
            other => {
                return Err(Error::topology(format!(
                    "bot must belong to exactly one server, found {}",
                    other.len()
                )));
            },
        };

        let channels = self
            .client
            .guild_channels(&guild_id)
            .await
            .map_err(|e| Error::connection(format!("listing channels of server {guild_id}: {e}")))?;

        let mut endpoints = HashMap::with_capacity(self.endpoints.len());
        let mut webhook_ids = HashSet::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            // Exact, case-sensitive match.
            let Some(channel) = channels.iter().find(|c| c.name == endpoint.name()) else {
                return Err(Error::channel_not_found(endpoint.name()));
            };
            endpoints.insert(channel.id.clone(), Arc::clone(endpoint));
            webhook_ids.insert(endpoint.webhook().id().to_string());
        }

        Ok(Routes {
            guild_id,
            self_id: ready.user_id.clone(),
            endpoints,
            channel_names: channels.into_iter().map(|c| (c.id, c.name)).collect(),
            webhook_ids,
        })
    }

    fn spawn_dispatcher(
        &self,
        events: EventReceiver,
        routes: Routes,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let routes = Arc::new(routes);
        let identity = Arc::clone(&self.identity);
        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {},
                () = dispatch_events(events, routes, identity, client) => {},
            }
        })
    }
}

/// Posts to one channel's webhook under the relayed user's identity.
struct WebhookHook {
    client: Arc<dyn GatewayClient>,
    identity: Arc<IdentityCache>,
    guild_id: String,
    channel: String,
    webhook: WebhookCredentials,
}

#[async_trait]
impl SendHook for WebhookHook {
    async fn send(&self, nick: &str, text: &str) -> Result<()> {
        let Some(content) = transform::to_gateway(nick, text) else {
            debug!(channel = %self.channel, "dropping message with empty nick or text");
            return Ok(());
        };
        let avatar_url = self
            .identity
            .resolve_avatar(self.client.as_ref(), &self.guild_id, nick)
            .await;
        let message = WebhookMessage {
            username: nick,
            content: &content,
            avatar_url: &avatar_url,
        };
        self.client
            .send_webhook(&self.webhook, &message)
            .await
            .map_err(|e| Error::webhook(self.channel.clone(), e))
    }
}
