use secrecy::{ExposeSecret, Secret};

use crate::{Error, Result};

/// Number of `/`-separated segments in a webhook URL:
/// `https:` `""` `host` `api` `webhooks` `<id>` `<token>`.
const WEBHOOK_URL_SEGMENTS: usize = 7;

/// Credentials of a channel webhook, used to post under any display name.
#[derive(Clone)]
pub struct WebhookCredentials {
    id: String,
    token: Secret<String>,
}

impl WebhookCredentials {
    /// Parse a webhook URL of the form
    /// `https://discord.com/api/webhooks/<id>/<token>`.
    pub fn parse(url: &str) -> Result<Self> {
        let parts: Vec<&str> = url.split('/').collect();
        if parts.len() != WEBHOOK_URL_SEGMENTS {
            return Err(Error::configuration(format!(
                "invalid webhook URL: expected {WEBHOOK_URL_SEGMENTS} '/'-separated segments, got {}",
                parts.len()
            )));
        }
        Ok(Self {
            id: parts[5].to_string(),
            token: Secret::new(parts[6].to_string()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }
}

impl std::fmt::Debug for WebhookCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookCredentials")
            .field("id", &self.id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for WebhookCredentials {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.token.expose_secret() == other.token.expose_secret()
    }
}

impl Eq for WebhookCredentials {}
