use serde::{Deserialize, Serialize};

/// Chat platform on one side of a relay edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Line-oriented legacy network.
    Irc,
    /// Gateway platform with webhook impersonation.
    Discord,
}

impl Platform {
    /// Lowercase identifier, also used as the config prefix (`irc:`, `discord:`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Irc => "irc",
            Self::Discord => "discord",
        }
    }

    /// Parse a platform identifier, case-insensitively.
    pub fn from_prefix(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "irc" => Some(Self::Irc),
            "discord" => Some(Self::Discord),
            _ => None,
        }
    }

    /// The platform on the other side of a relay edge.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Irc => Self::Discord,
            Self::Discord => Self::Irc,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
