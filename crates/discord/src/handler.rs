//! Incoming message dispatch: Discord -> channel endpoints.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use {
    tandem_channels::{ChannelEndpoint, transform},
    tracing::{debug, info, warn},
};

use crate::{
    client::{EventReceiver, GatewayClient, GatewayEvent, IncomingMessage},
    identity::IdentityCache,
    mentions::expand_mentions,
};

/// Lookup tables built at start, rebuilt from scratch on every start.
pub(crate) struct Routes {
    pub guild_id: String,
    /// The bot's own user id.
    pub self_id: String,
    /// channel id -> endpoint
    pub endpoints: HashMap<String, Arc<ChannelEndpoint>>,
    /// Every channel on the server, id -> name, for mention expansion.
    pub channel_names: HashMap<String, String>,
    /// Ids of our own webhooks; messages they post are our relayed output.
    pub webhook_ids: HashSet<String>,
}

impl Routes {
    fn is_own(&self, msg: &IncomingMessage) -> bool {
        msg.author.id == self.self_id
            || self.webhook_ids.contains(&msg.author.id)
            || msg
                .webhook_id
                .as_ref()
                .is_some_and(|id| self.webhook_ids.contains(id))
    }
}

/// Route one message to its endpoint's receive callback.
///
/// Returns whether the message was delivered.
pub(crate) async fn handle_message(
    routes: &Routes,
    identity: &IdentityCache,
    client: &dyn GatewayClient,
    msg: IncomingMessage,
) -> bool {
    // Skip our own messages to prevent loops
    if routes.is_own(&msg) {
        return false;
    }

    let Some(endpoint) = routes.endpoints.get(&msg.channel_id) else {
        return false; // not bridged
    };

    let guild_id = msg.guild_id.as_deref().unwrap_or(&routes.guild_id);
    let nick = identity
        .resolve_nickname(client, guild_id, &msg.author)
        .await;
    let content = expand_mentions(&msg.content, &msg.mentions, &routes.channel_names);

    if transform::is_blank(&nick) || transform::is_blank(&content) {
        debug!(
            channel = endpoint.name(),
            message_id = %msg.id,
            "dropping message with empty nick or text"
        );
        return false;
    }

    endpoint.receive(&nick, &content);
    true
}

/// Consume gateway events until the stream ends.
///
/// The caller races this against its cancellation token; dropping the future
/// is how the receive handler is removed.
pub(crate) async fn dispatch_events(
    mut events: EventReceiver,
    routes: Arc<Routes>,
    identity: Arc<IdentityCache>,
    client: Arc<dyn GatewayClient>,
) {
    while let Some(event) = events.recv().await {
        match event {
            GatewayEvent::Message(msg) => {
                handle_message(&routes, &identity, client.as_ref(), msg).await;
            },
            GatewayEvent::Connected => {
                info!(guild_id = %routes.guild_id, "discord gateway connected");
            },
            GatewayEvent::Disconnected => {
                warn!(guild_id = %routes.guild_id, "discord gateway disconnected");
            },
            GatewayEvent::Error(e) => {
                warn!(guild_id = %routes.guild_id, error = %e, "discord gateway error");
            },
        }
    }
    debug!("discord event stream ended");
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            client::MentionedUser,
            testing::{FakeGateway, incoming, member},
        },
        std::sync::Mutex,
    };

    const URL: &str = "https://discord.com/api/webhooks/wh-1/tok";

    fn routes(seen: Arc<Mutex<Vec<String>>>) -> Routes {
        let ep = ChannelEndpoint::new("general", URL, move |nick, text| {
            seen.lock().unwrap().push(format!("{nick}|{text}"));
        })
        .unwrap();
        Routes {
            guild_id: "g1".into(),
            self_id: "bot-id".into(),
            endpoints: HashMap::from([("c1".to_string(), Arc::new(ep))]),
            channel_names: HashMap::from([("c1".to_string(), "general".to_string())]),
            webhook_ids: HashSet::from(["wh-1".to_string()]),
        }
    }

    #[tokio::test]
    async fn delivers_with_resolved_nick() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let routes = routes(Arc::clone(&seen));
        let gw = FakeGateway::new();
        gw.add_member(member("u1", "alice", Some("Ali"), ""));

        let delivered = handle_message(
            &routes,
            &IdentityCache::new(),
            &gw,
            incoming("c1", "u1", "alice", "hello"),
        )
        .await;

        assert!(delivered);
        assert_eq!(*seen.lock().unwrap(), vec!["Ali|hello".to_string()]);
    }

    #[tokio::test]
    async fn own_messages_are_never_delivered() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let routes = routes(Arc::clone(&seen));
        let gw = FakeGateway::new();
        let cache = IdentityCache::new();

        let from_bot = incoming("c1", "bot-id", "bridge", "echo");
        let from_webhook = incoming("c1", "wh-1", "alice", "echo");
        let mut via_webhook = incoming("c1", "u5", "alice", "echo");
        via_webhook.webhook_id = Some("wh-1".into());

        for msg in [from_bot, from_webhook, via_webhook] {
            assert!(!handle_message(&routes, &cache, &gw, msg).await);
        }
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(gw.get_member_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unmapped_channel_is_ignored() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let routes = routes(Arc::clone(&seen));
        let gw = FakeGateway::new();
        let msg = incoming("other", "u1", "alice", "hello");
        assert!(!handle_message(&routes, &IdentityCache::new(), &gw, msg).await);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_text_is_dropped() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let routes = routes(Arc::clone(&seen));
        let gw = FakeGateway::new();
        let msg = incoming("c1", "u1", "alice", "   ");
        assert!(!handle_message(&routes, &IdentityCache::new(), &gw, msg).await);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mentions_are_expanded() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let routes = routes(Arc::clone(&seen));
        let gw = FakeGateway::new();
        let mut msg = incoming("c1", "u1", "alice", "<@222> see <#c1>");
        msg.mentions.push(MentionedUser {
            id: "222".into(),
            username: "bob".into(),
            nick: None,
        });
        // channel ids are not numeric in this fixture, so <#c1> stays raw
        assert!(handle_message(&routes, &IdentityCache::new(), &gw, msg).await);
        assert_eq!(*seen.lock().unwrap(), vec![
            "alice|@bob see <#c1>".to_string()
        ]);
    }
}
