//! serenity event handler feeding the bridge's event queue.

use std::sync::{Arc, Mutex};

use {
    serenity::{
        all::{
            ConnectionStage, Context, EventHandler, GatewayIntents, Message, Ready as SessionReady,
            ResumedEvent, ShardStageUpdateEvent, User,
        },
        async_trait,
    },
    tokio::sync::oneshot,
    tracing::{debug, info},
};

use crate::{
    Result,
    client::{
        Author, EventSender, GatewayEvent, GuildChannel, IncomingMessage, Member, MentionedUser,
        Ready,
    },
};

/// Where the first READY (or the failure to reach it) is delivered.
///
/// Shared between the handler and the task driving the serenity client, so
/// whichever finishes first answers the caller of `open`.
pub(crate) type ReadySlot = Arc<Mutex<Option<oneshot::Sender<Result<Ready>>>>>;

pub(crate) fn ready_slot() -> (ReadySlot, oneshot::Receiver<Result<Ready>>) {
    let (tx, rx) = oneshot::channel();
    (Arc::new(Mutex::new(Some(tx))), rx)
}

/// Answer the opener if nobody has yet. Returns `false` when already answered.
pub(crate) fn deliver(slot: &ReadySlot, outcome: Result<Ready>) -> bool {
    let sender = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
    match sender {
        Some(tx) => {
            let _ = tx.send(outcome);
            true
        },
        None => false,
    }
}

pub(crate) struct GatewayHandler {
    events: EventSender,
    ready: ReadySlot,
}

impl GatewayHandler {
    pub fn new(events: EventSender, ready: ReadySlot) -> Self {
        Self { events, ready }
    }

    /// GUILD_MEMBERS and MESSAGE_CONTENT are privileged and must be enabled
    /// for the application in the developer portal.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MEMBERS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
    }

    fn push(&self, event: GatewayEvent) {
        if self.events.send(event).is_err() {
            debug!("discord event queue closed, dropping event");
        }
    }
}

#[async_trait]
impl EventHandler for GatewayHandler {
    async fn ready(&self, _ctx: Context, ready: SessionReady) {
        let ready = session_ready(&ready);
        info!(
            user = %ready.username,
            guilds = ready.guild_ids.len(),
            "discord gateway ready"
        );
        // Later READYs follow a full re-identify.
        if !deliver(&self.ready, Ok(ready)) {
            self.push(GatewayEvent::Connected);
        }
    }

    async fn resume(&self, _ctx: Context, _event: ResumedEvent) {
        debug!("discord session resumed");
        self.push(GatewayEvent::Connected);
    }

    async fn shard_stage_update(&self, _ctx: Context, event: ShardStageUpdateEvent) {
        if matches!(event.new, ConnectionStage::Disconnected) {
            self.push(GatewayEvent::Disconnected);
        }
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        self.push(GatewayEvent::Message(incoming_message(&msg)));
    }
}

fn session_ready(ready: &SessionReady) -> Ready {
    Ready {
        user_id: ready.user.id.to_string(),
        username: ready.user.name.clone(),
        guild_ids: ready.guilds.iter().map(|g| g.id.to_string()).collect(),
    }
}

fn mentioned_user(user: &User) -> MentionedUser {
    MentionedUser {
        id: user.id.to_string(),
        username: user.name.clone(),
        nick: user.member.as_ref().and_then(|member| member.nick.clone()),
    }
}

pub(crate) fn incoming_message(msg: &Message) -> IncomingMessage {
    IncomingMessage {
        id: msg.id.to_string(),
        guild_id: msg.guild_id.map(|id| id.to_string()),
        channel_id: msg.channel_id.to_string(),
        author: Author {
            id: msg.author.id.to_string(),
            username: msg.author.name.clone(),
            bot: msg.author.bot,
        },
        webhook_id: msg.webhook_id.map(|id| id.to_string()),
        content: msg.content.clone(),
        mentions: msg.mentions.iter().map(mentioned_user).collect(),
    }
}

pub(crate) fn member(member: &serenity::all::Member) -> Member {
    Member {
        user_id: member.user.id.to_string(),
        username: member.user.name.clone(),
        nick: member.nick.clone(),
        // Account avatar, or the default one when unset.
        avatar_url: member.user.face(),
    }
}

pub(crate) fn guild_channel(channel: &serenity::all::GuildChannel) -> GuildChannel {
    GuildChannel {
        id: channel.id.to_string(),
        name: channel.name.clone(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn user(avatar: Option<&str>) -> User {
        serde_json::from_value(json!({
            "id": "80351110224678912",
            "username": "alice",
            "discriminator": "0",
            "avatar": avatar,
        }))
        .unwrap()
    }

    #[test]
    fn mention_without_member_has_no_nick() {
        let mention = mentioned_user(&user(None));
        assert_eq!(mention.id, "80351110224678912");
        assert_eq!(mention.username, "alice");
        assert_eq!(mention.nick, None);
    }

    #[test]
    fn avatar_falls_back_to_default() {
        let with_hash = user(Some("a1b2c3d4e5f60718293a4b5c6d7e8f90")).face();
        assert!(
            with_hash.starts_with("https://cdn.discordapp.com/avatars/80351110224678912/"),
            "{with_hash}"
        );
        let default = user(None).face();
        assert!(
            default.starts_with("https://cdn.discordapp.com/embed/avatars/"),
            "{default}"
        );
    }

    #[tokio::test]
    async fn first_outcome_wins() {
        let (slot, rx) = ready_slot();
        let ready = Ready {
            user_id: "1".into(),
            username: "bridge".into(),
            guild_ids: vec!["g1".into()],
        };
        assert!(deliver(&slot, Ok(ready.clone())));
        assert!(!deliver(&slot, Err(crate::Error::gateway("late"))));
        assert_eq!(rx.await.unwrap().unwrap(), ready);
    }
}
