//! Production [`GatewayClient`] built on serenity.
//!
//! Gateway events arrive through [`GatewayHandler`]; lookups and webhook
//! posts go through a shared [`Http`], which owns rate-limit handling.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    secrecy::ExposeSecret,
    serenity::all::{
        Client, CreateAllowedMentions, ExecuteWebhook, GuildId, Http, HttpBuilder, ShardManager,
        UserId, WebhookId,
    },
    tandem_channels::WebhookCredentials,
    tokio::{sync::Mutex, task::JoinHandle},
    tracing::{debug, info, warn},
};

use crate::{
    Error, Result,
    client::{
        EventSender, GatewayClient, GatewayEvent, GuildChannel, Member, Ready, WebhookMessage,
    },
    config::DiscordConfig,
    events::{self, GatewayHandler},
};

/// How long `open` waits for READY before giving up.
const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `close` waits for the shard runner before aborting it.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Page size of the member listing endpoint (the API maximum).
const MEMBER_PAGE_LIMIT: u64 = 1000;

pub struct DiscordClient {
    config: DiscordConfig,
    http: Arc<Http>,
    session: Mutex<Option<GatewaySession>>,
}

/// A running serenity client.
struct GatewaySession {
    shards: Arc<ShardManager>,
    task: JoinHandle<()>,
}

impl GatewaySession {
    async fn stop(self) {
        self.shards.shutdown_all().await;
        let mut task = self.task;
        if tokio::time::timeout(STOP_TIMEOUT, &mut task).await.is_err() {
            warn!("discord shards did not stop in time, aborting");
            task.abort();
        }
    }
}

impl DiscordClient {
    pub fn new(config: DiscordConfig) -> Result<Self> {
        let token = config.token.expose_secret().trim();
        if token.is_empty() {
            return Err(
                tandem_channels::Error::configuration("discord bot token is required").into(),
            );
        }
        let mut http = HttpBuilder::new(token);
        if let Some(proxy) = &config.proxy {
            http = http.proxy(proxy.as_str());
        }
        let http = Arc::new(http.build());
        Ok(Self {
            config,
            http,
            session: Mutex::new(None),
        })
    }

    fn token(&self) -> &str {
        self.config.token.expose_secret().trim()
    }
}

fn snowflake(kind: &'static str, raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| Error::InvalidId {
            kind,
            value: raw.to_string(),
        })
}

/// Request errors may echo the URL, which carries the webhook token.
fn scrub(message: &str, token: &str) -> String {
    if token.is_empty() {
        message.to_string()
    } else {
        message.replace(token, "<token>")
    }
}

#[async_trait]
impl GatewayClient for DiscordClient {
    async fn open(&self, events: EventSender) -> Result<Ready> {
        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            debug!("replacing existing gateway session");
            previous.stop().await;
        }

        let (slot, ready) = events::ready_slot();
        let mut client = Client::builder(self.token(), GatewayHandler::intents())
            .event_handler(GatewayHandler::new(events.clone(), Arc::clone(&slot)))
            .await?;
        let shards = Arc::clone(&client.shard_manager);
        let task = tokio::spawn(async move {
            if let Err(e) = client.start().await {
                warn!(error = %e, "discord gateway stopped");
                let message = e.to_string();
                if !events::deliver(&slot, Err(e.into())) {
                    let _ = events.send(GatewayEvent::Error(message));
                }
            }
        });
        let opened = GatewaySession { shards, task };

        match tokio::time::timeout(READY_TIMEOUT, ready).await {
            Ok(Ok(Ok(ready))) => {
                *session = Some(opened);
                Ok(ready)
            },
            Ok(Ok(Err(e))) => {
                opened.stop().await;
                Err(e)
            },
            Ok(Err(_)) => {
                opened.stop().await;
                Err(Error::gateway("session ended before READY"))
            },
            Err(_) => {
                opened.stop().await;
                Err(Error::gateway("timed out waiting for READY"))
            },
        }
    }

    async fn close(&self) -> Result<()> {
        if let Some(session) = self.session.lock().await.take() {
            session.stop().await;
            info!("discord gateway session closed");
        }
        Ok(())
    }

    async fn guild_channels(&self, guild_id: &str) -> Result<Vec<GuildChannel>> {
        let guild = GuildId::new(snowflake("guild", guild_id)?);
        let channels = self.http.get_channels(guild).await?;
        Ok(channels.iter().map(events::guild_channel).collect())
    }

    async fn list_guild_members(&self, guild_id: &str) -> Result<Vec<Member>> {
        let guild = GuildId::new(snowflake("guild", guild_id)?);
        let members = self
            .http
            .get_guild_members(guild, Some(MEMBER_PAGE_LIMIT), None)
            .await?;
        Ok(members.iter().map(events::member).collect())
    }

    async fn get_member(&self, guild_id: &str, user_id: &str) -> Result<Member> {
        let guild = GuildId::new(snowflake("guild", guild_id)?);
        let user = UserId::new(snowflake("user", user_id)?);
        let member = self.http.get_member(guild, user).await?;
        Ok(events::member(&member))
    }

    async fn send_webhook(
        &self,
        webhook: &WebhookCredentials,
        message: &WebhookMessage<'_>,
    ) -> Result<()> {
        let id = WebhookId::new(snowflake("webhook", webhook.id())?);
        let body = webhook_body(message);
        self.http
            .execute_webhook(id, None, webhook.token(), true, Vec::new(), &body)
            .await
            .map_err(|e| Error::Webhook {
                id: webhook.id().to_string(),
                message: scrub(&e.to_string(), webhook.token()),
            })?;
        Ok(())
    }
}

/// Relayed text must never ping anyone, so every mention kind is disabled.
fn webhook_body(message: &WebhookMessage<'_>) -> ExecuteWebhook {
    let body = ExecuteWebhook::new()
        .username(message.username)
        .content(message.content)
        .allowed_mentions(CreateAllowedMentions::new());
    if message.avatar_url.is_empty() {
        body
    } else {
        body.avatar_url(message.avatar_url)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, serde_json::json};

    #[test]
    fn empty_token_is_rejected() {
        let err = DiscordClient::new(DiscordConfig::with_token("  ")).err().unwrap();
        assert!(
            matches!(
                err,
                Error::Channel(tandem_channels::Error::Configuration { .. })
            ),
            "{err}"
        );
    }

    #[rstest]
    #[case("123", Some(123))]
    #[case("0", None)]
    #[case("general", None)]
    #[case("", None)]
    fn snowflakes(#[case] raw: &str, #[case] expected: Option<u64>) {
        assert_eq!(snowflake("guild", raw).ok(), expected);
    }

    #[test]
    fn invalid_ids_fail_before_any_request() {
        let err = snowflake("webhook", "abc").unwrap_err();
        assert_eq!(err.to_string(), r#"invalid webhook id "abc""#);
    }

    #[test]
    fn webhook_token_is_scrubbed() {
        let msg = concat!(
            "error sending request for url ",
            "(https://discord.com/api/v10/webhooks/1/s3cret?wait=true)"
        );
        let scrubbed = scrub(msg, "s3cret");
        assert!(!scrubbed.contains("s3cret"));
        assert!(scrubbed.contains("/webhooks/1/<token>"));
    }

    #[test]
    fn webhook_body_disables_mentions_and_omits_empty_avatar() {
        let msg = WebhookMessage {
            username: "alice",
            content: "hello",
            avatar_url: "",
        };
        let body = serde_json::to_value(webhook_body(&msg)).unwrap();
        assert_eq!(body["username"], json!("alice"));
        assert_eq!(body["content"], json!("hello"));
        assert_eq!(body["allowed_mentions"]["parse"], json!([]));
        assert!(body.get("avatar_url").is_none(), "{body}");

        let with_avatar = WebhookMessage {
            avatar_url: "https://cdn.example/a.png",
            ..msg
        };
        let body = serde_json::to_value(webhook_body(&with_avatar)).unwrap();
        assert_eq!(body["avatar_url"], json!("https://cdn.example/a.png"));
    }
}
