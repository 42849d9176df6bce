//! Display identity lookups with bounded staleness.
//!
//! Nicknames are cached per user for [`NICKNAME_TTL`]; avatars come from a
//! per-server member snapshot refreshed after [`AVATAR_TTL`]. Expiry is lazy:
//! each entry keeps its insertion time and is checked on read.

use std::{collections::HashMap, sync::Mutex, time::Duration};

use {
    tokio::time::Instant,
    tracing::{debug, warn},
};

use crate::client::{Author, GatewayClient};

/// How long a resolved nickname is reused.
pub const NICKNAME_TTL: Duration = Duration::from_secs(60);

/// How long a server member snapshot is reused for avatar lookups.
pub const AVATAR_TTL: Duration = Duration::from_secs(5 * 60);

struct Entry<T> {
    value: T,
    inserted: Instant,
}

impl<T> Entry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            inserted: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.inserted.elapsed() < ttl
    }
}

#[derive(Default)]
struct CacheState {
    /// user id -> nickname
    nicknames: HashMap<String, Entry<String>>,
    /// server id -> (lowercase nickname -> avatar URL)
    avatars: HashMap<String, Entry<HashMap<String, String>>>,
}

/// Per-bridge identity cache. The lock is never held across a lookup.
pub struct IdentityCache {
    nickname_ttl: Duration,
    avatar_ttl: Duration,
    state: Mutex<CacheState>,
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::with_ttls(NICKNAME_TTL, AVATAR_TTL)
    }

    pub fn with_ttls(nickname_ttl: Duration, avatar_ttl: Duration) -> Self {
        Self {
            nickname_ttl,
            avatar_ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Resolve the name `author` goes by on `guild_id`.
    ///
    /// Lookup failures fall back to the username (or id) and are not cached.
    pub async fn resolve_nickname(
        &self,
        client: &dyn GatewayClient,
        guild_id: &str,
        author: &Author,
    ) -> String {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match state.nicknames.get(&author.id) {
                Some(entry) if entry.is_fresh(self.nickname_ttl) => return entry.value.clone(),
                Some(_) => {
                    state.nicknames.remove(&author.id);
                },
                None => {},
            }
        }

        debug!(user_id = %author.id, "nickname cache miss");
        let nick = match client.get_member(guild_id, &author.id).await {
            Ok(member) => member.display_name().to_string(),
            Err(e) => {
                warn!(
                    user_id = %author.id,
                    username = %author.username,
                    error = %e,
                    "error resolving server member, using username"
                );
                return fallback_name(author);
            },
        };

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .nicknames
            .insert(author.id.clone(), Entry::new(nick.clone()));
        nick
    }

    /// Find the avatar URL of the member going by `nick` on `guild_id`.
    ///
    /// Returns an empty string when the nick is unknown or the member list
    /// cannot be fetched.
    pub async fn resolve_avatar(
        &self,
        client: &dyn GatewayClient,
        guild_id: &str,
        nick: &str,
    ) -> String {
        let key = nick.to_lowercase();
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match state.avatars.get(guild_id) {
                Some(entry) if entry.is_fresh(self.avatar_ttl) => {
                    return entry.value.get(&key).cloned().unwrap_or_default();
                },
                Some(_) => {
                    state.avatars.remove(guild_id);
                },
                None => {},
            }
        }

        debug!(guild_id, "avatar snapshot miss, listing server members");
        let members = match client.list_guild_members(guild_id).await {
            Ok(members) => members,
            Err(e) => {
                warn!(guild_id, error = %e, "error listing server members");
                return String::new();
            },
        };
        let snapshot: HashMap<String, String> = members
            .into_iter()
            .map(|m| (m.display_name().to_lowercase(), m.avatar_url))
            .collect();
        let avatar = snapshot.get(&key).cloned().unwrap_or_default();

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .avatars
            .insert(guild_id.to_string(), Entry::new(snapshot));
        avatar
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.nicknames.clear();
        state.avatars.clear();
    }
}

fn fallback_name(author: &Author) -> String {
    if author.username.trim().is_empty() {
        author.id.clone()
    } else {
        author.username.clone()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{FakeGateway, member},
        std::sync::atomic::Ordering,
    };

    const GUILD: &str = "g1";

    fn author(id: &str, username: &str) -> Author {
        Author {
            id: id.into(),
            username: username.into(),
            bot: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn nickname_is_cached_for_ttl_then_refreshed_once() {
        let gw = FakeGateway::new();
        gw.add_member(member("u1", "alice", Some("Ali"), "https://cdn/a.png"));
        let cache = IdentityCache::new();
        let alice = author("u1", "alice");

        assert_eq!(cache.resolve_nickname(&gw, GUILD, &alice).await, "Ali");
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.resolve_nickname(&gw, GUILD, &alice).await, "Ali");
        assert_eq!(gw.get_member_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.resolve_nickname(&gw, GUILD, &alice).await, "Ali");
        assert_eq!(cache.resolve_nickname(&gw, GUILD, &alice).await, "Ali");
        assert_eq!(gw.get_member_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn nickname_falls_back_to_username_without_caching() {
        let gw = FakeGateway::new();
        let cache = IdentityCache::new();
        let ghost = author("u9", "ghost");

        assert_eq!(cache.resolve_nickname(&gw, GUILD, &ghost).await, "ghost");
        assert_eq!(cache.resolve_nickname(&gw, GUILD, &ghost).await, "ghost");
        assert_eq!(gw.get_member_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn nickname_falls_back_to_id_when_username_blank() {
        let gw = FakeGateway::new();
        let cache = IdentityCache::new();
        assert_eq!(
            cache.resolve_nickname(&gw, GUILD, &author("u9", " ")).await,
            "u9"
        );
    }

    #[tokio::test]
    async fn nickname_without_override_is_username() {
        let gw = FakeGateway::new();
        gw.add_member(member("u2", "bob", None, ""));
        let cache = IdentityCache::new();
        assert_eq!(
            cache.resolve_nickname(&gw, GUILD, &author("u2", "bob")).await,
            "bob"
        );
    }

    #[tokio::test]
    async fn avatar_lookup_is_case_insensitive_and_absent_is_empty() {
        let gw = FakeGateway::new();
        gw.add_member(member("u1", "alice", Some("Ali"), "https://cdn/a.png"));
        gw.add_member(member("u2", "carol", None, "https://cdn/c.png"));
        let cache = IdentityCache::new();

        assert_eq!(cache.resolve_avatar(&gw, GUILD, "ALI").await, "https://cdn/a.png");
        assert_eq!(cache.resolve_avatar(&gw, GUILD, "Carol").await, "https://cdn/c.png");
        assert_eq!(cache.resolve_avatar(&gw, GUILD, "Bob").await, "");
        assert_eq!(gw.list_members_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn avatar_snapshot_expires_after_five_minutes() {
        let gw = FakeGateway::new();
        let cache = IdentityCache::new();

        assert_eq!(cache.resolve_avatar(&gw, GUILD, "Bob").await, "");
        gw.add_member(member("u3", "bob", None, "https://cdn/b.png"));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.resolve_avatar(&gw, GUILD, "Bob").await, "");

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.resolve_avatar(&gw, GUILD, "Bob").await, "https://cdn/b.png");
        assert_eq!(gw.list_members_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn avatar_listing_failure_is_empty_and_not_cached() {
        let gw = FakeGateway::new();
        gw.fail_member_listing(true);
        let cache = IdentityCache::new();

        assert_eq!(cache.resolve_avatar(&gw, GUILD, "alice").await, "");
        gw.fail_member_listing(false);
        gw.add_member(member("u1", "alice", None, "https://cdn/a.png"));
        assert_eq!(cache.resolve_avatar(&gw, GUILD, "alice").await, "https://cdn/a.png");
    }

    #[tokio::test]
    async fn clear_forces_fresh_lookups() {
        let gw = FakeGateway::new();
        gw.add_member(member("u1", "alice", None, ""));
        let cache = IdentityCache::new();
        let alice = author("u1", "alice");

        cache.resolve_nickname(&gw, GUILD, &alice).await;
        cache.clear();
        cache.resolve_nickname(&gw, GUILD, &alice).await;
        assert_eq!(gw.get_member_calls.load(Ordering::SeqCst), 2);
    }
}
