//! In-memory [`GatewayClient`] that records every call.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use {async_trait::async_trait, tandem_channels::WebhookCredentials, tokio::sync::Notify};

use crate::{
    Error, Result,
    client::{
        Author, EventSender, GatewayClient, GatewayEvent, GuildChannel, IncomingMessage, Member,
        Ready, WebhookMessage,
    },
};

/// A webhook execution captured by [`FakeGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentWebhook {
    pub webhook_id: String,
    pub username: String,
    pub content: String,
    pub avatar_url: String,
}

pub struct FakeGateway {
    ready: Mutex<Ready>,
    channels: Mutex<Vec<GuildChannel>>,
    members: Mutex<BTreeMap<String, Member>>,
    events: Mutex<Option<EventSender>>,
    sent: Mutex<Vec<SentWebhook>>,
    fail_open: AtomicBool,
    fail_listing: AtomicBool,
    fail_webhooks: AtomicBool,
    webhook_gate: Mutex<Option<Arc<Notify>>>,
    pub open_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
    pub get_member_calls: AtomicUsize,
    pub list_members_calls: AtomicUsize,
    pub webhook_calls: AtomicUsize,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGateway {
    /// A bot `bot-id` that belongs to exactly one server `g1`.
    pub fn new() -> Self {
        Self {
            ready: Mutex::new(Ready {
                user_id: "bot-id".into(),
                username: "bridge".into(),
                guild_ids: vec!["g1".into()],
            }),
            channels: Mutex::new(Vec::new()),
            members: Mutex::new(BTreeMap::new()),
            events: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            fail_open: AtomicBool::new(false),
            fail_listing: AtomicBool::new(false),
            fail_webhooks: AtomicBool::new(false),
            webhook_gate: Mutex::new(None),
            open_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            get_member_calls: AtomicUsize::new(0),
            list_members_calls: AtomicUsize::new(0),
            webhook_calls: AtomicUsize::new(0),
        }
    }

    pub fn add_channel(&self, id: &str, name: &str) {
        lock(&self.channels).push(GuildChannel {
            id: id.into(),
            name: name.into(),
        });
    }

    pub fn add_member(&self, member: Member) {
        lock(&self.members).insert(member.user_id.clone(), member);
    }

    pub fn set_guilds(&self, guild_ids: &[&str]) {
        lock(&self.ready).guild_ids = guild_ids.iter().map(|g| g.to_string()).collect();
    }

    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn fail_member_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_webhooks(&self, fail: bool) {
        self.fail_webhooks.store(fail, Ordering::SeqCst);
    }

    /// Park webhook sends after they are counted, until the returned gate
    /// is notified.
    pub fn hold_webhooks(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.webhook_gate) = Some(Arc::clone(&gate));
        gate
    }

    /// Push an event as the gateway would. Returns `false` when no session
    /// is open or the consumer has gone away.
    pub fn emit(&self, event: GatewayEvent) -> bool {
        lock(&self.events)
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    pub fn is_open(&self) -> bool {
        lock(&self.events).is_some()
    }

    pub fn sent_webhooks(&self) -> Vec<SentWebhook> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl GatewayClient for FakeGateway {
    async fn open(&self, events: EventSender) -> Result<Ready> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(Error::gateway("authentication failed"));
        }
        *lock(&self.events) = Some(events);
        Ok(lock(&self.ready).clone())
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.events).take();
        Ok(())
    }

    async fn guild_channels(&self, _guild_id: &str) -> Result<Vec<GuildChannel>> {
        Ok(lock(&self.channels).clone())
    }

    async fn list_guild_members(&self, _guild_id: &str) -> Result<Vec<Member>> {
        self.list_members_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Error::gateway("member listing unavailable"));
        }
        Ok(lock(&self.members).values().cloned().collect())
    }

    async fn get_member(&self, _guild_id: &str, user_id: &str) -> Result<Member> {
        self.get_member_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.members)
            .get(user_id)
            .cloned()
            .ok_or_else(|| Error::gateway(format!("unknown member {user_id}")))
    }

    async fn send_webhook(
        &self,
        webhook: &WebhookCredentials,
        message: &WebhookMessage<'_>,
    ) -> Result<()> {
        self.webhook_calls.fetch_add(1, Ordering::SeqCst);
        let gate = lock(&self.webhook_gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_webhooks.load(Ordering::SeqCst) {
            return Err(Error::gateway("webhook rejected"));
        }
        lock(&self.sent).push(SentWebhook {
            webhook_id: webhook.id().to_string(),
            username: message.username.to_string(),
            content: message.content.to_string(),
            avatar_url: message.avatar_url.to_string(),
        });
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

pub fn member(user_id: &str, username: &str, nick: Option<&str>, avatar_url: &str) -> Member {
    Member {
        user_id: user_id.into(),
        username: username.into(),
        nick: nick.map(String::from),
        avatar_url: avatar_url.into(),
    }
}

/// A plain user message in `channel_id` on server `g1`.
pub fn incoming(
    channel_id: &str,
    author_id: &str,
    username: &str,
    content: &str,
) -> IncomingMessage {
    IncomingMessage {
        id: format!("m-{author_id}-{}", content.len()),
        guild_id: Some("g1".into()),
        channel_id: channel_id.into(),
        author: Author {
            id: author_id.into(),
            username: username.into(),
            bot: false,
        },
        webhook_id: None,
        content: content.into(),
        mentions: Vec::new(),
    }
}
