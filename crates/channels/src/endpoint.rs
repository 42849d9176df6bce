use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{Error, Result, webhook::WebhookCredentials};

/// Callback invoked with `(nick, text)` for every message received on the
/// gateway side of an endpoint.
pub type ReceiveFn = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Delivery function installed on an endpoint while the bridge is connected.
#[async_trait]
pub trait SendHook: Send + Sync {
    async fn send(&self, nick: &str, text: &str) -> Result<()>;
}

/// A named channel on the gateway platform.
///
/// Endpoints are created once at configuration time and survive any number of
/// start/close cycles of the bridge; only the send hook comes and goes.
pub struct ChannelEndpoint {
    name: String,
    webhook: WebhookCredentials,
    receive: ReceiveFn,
    /// Present only while connected. Never held across `.await`.
    hook: Mutex<Option<Arc<dyn SendHook>>>,
}

impl ChannelEndpoint {
    /// Create an endpoint from a channel name and webhook URL.
    ///
    /// A leading `#` on the name is ignored.
    pub fn new(
        name: &str,
        webhook_url: &str,
        receive: impl Fn(&str, &str) + Send + Sync + 'static,
    ) -> Result<Self> {
        let webhook = WebhookCredentials::parse(webhook_url).map_err(|e| {
            Error::configuration(format!("channel #{}: {e}", name.trim_start_matches('#')))
        })?;
        Ok(Self::with_webhook(name, webhook, Arc::new(receive)))
    }

    pub fn with_webhook(name: &str, webhook: WebhookCredentials, receive: ReceiveFn) -> Self {
        Self {
            name: name.trim_start_matches('#').to_string(),
            webhook,
            receive,
            hook: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn webhook(&self) -> &WebhookCredentials {
        &self.webhook
    }

    /// Send a message to the gateway platform under `nick`.
    ///
    /// Returns [`Error::NotConnected`] when no hook is installed.
    pub async fn send(&self, nick: &str, text: &str) -> Result<()> {
        let hook = self.hook.lock().unwrap_or_else(|e| e.into_inner()).clone();
        match hook {
            Some(hook) => hook.send(nick, text).await,
            None => Err(Error::NotConnected),
        }
    }

    /// Hand a message received on the gateway platform to the user callback.
    pub fn receive(&self, nick: &str, text: &str) {
        (self.receive)(nick, text);
    }

    pub fn install_hook(&self, hook: Arc<dyn SendHook>) {
        *self.hook.lock().unwrap_or_else(|e| e.into_inner()) = Some(hook);
    }

    /// Remove the send hook. Returns whether one was installed.
    pub fn clear_hook(&self) -> bool {
        self.hook
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.hook.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }
}

impl std::fmt::Debug for ChannelEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelEndpoint")
            .field("name", &self.name)
            .field("webhook", &self.webhook)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
