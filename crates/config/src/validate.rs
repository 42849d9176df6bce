//! Static checks run by `tandem check` before anything connects.

use crate::schema::TandemConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "irc.host"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    fn warning(path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

pub fn validate(config: &TandemConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();
    let irc = &config.irc;

    if irc.host.trim().is_empty() {
        diagnostics.push(Diagnostic::error("irc.host", "missing host"));
    } else if irc.tls && irc.host.rsplit_once(':').is_none() {
        diagnostics.push(Diagnostic::error(
            "irc.host",
            "host must be host:port when tls is enabled",
        ));
    }
    if irc.nick.trim().is_empty() {
        diagnostics.push(Diagnostic::error("irc.nick", "missing nick"));
    }
    if irc.split_len == 0 {
        diagnostics.push(Diagnostic::error("irc.split_len", "must be greater than 0"));
    }
    if config.token().trim().is_empty() {
        diagnostics.push(Diagnostic::error("discord.token", "missing bot token"));
    } else if config.token().contains("${") {
        diagnostics.push(Diagnostic::warning(
            "discord.token",
            "contains an unresolved ${...} placeholder",
        ));
    }

    if config.relay.is_empty() && config.sync.is_empty() {
        diagnostics.push(Diagnostic::error("relay", "no relay or sync entries"));
    }
    for (i, entry) in config.relay.iter().enumerate() {
        if let Err(e) = entry.resolve(&config.discord.webhooks) {
            diagnostics.push(Diagnostic::error(&format!("relay[{i}]"), e.to_string()));
        }
    }
    for (i, entry) in config.sync.iter().enumerate() {
        if let Err(e) = entry.resolve(&config.discord.webhooks) {
            diagnostics.push(Diagnostic::error(&format!("sync[{i}]"), e.to_string()));
        }
    }

    let mut unused: Vec<&str> = config
        .discord
        .webhooks
        .keys()
        .map(String::as_str)
        .filter(|name| !config.uses_discord_channel(name))
        .collect();
    unused.sort_unstable();
    for name in unused {
        diagnostics.push(Diagnostic::warning(
            &format!("discord.webhooks.{name}"),
            "webhook is not used by any relay",
        ));
    }

    ValidationResult { diagnostics }
}
