//! Rewrite raw mention tokens (`<@123>`, `<#456>`) into readable names.

use std::collections::HashMap;

use tracing::debug;

use crate::client::MentionedUser;

/// Replace user and channel mention tokens in `content`.
///
/// `channels` maps channel id to name. Tokens that cannot be resolved (role
/// mentions, custom emoji, unknown ids) are kept verbatim.
pub fn expand_mentions(
    content: &str,
    mentions: &[MentionedUser],
    channels: &HashMap<String, String>,
) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find('>') else {
            out.push_str(tail);
            rest = "";
            break;
        };
        let token = &tail[1..end];
        if token.contains('<') {
            // `<` inside the candidate: this `<` is plain text.
            out.push('<');
            rest = &tail[1..];
            continue;
        }
        match render(token, mentions, channels) {
            Some(rendered) => out.push_str(&rendered),
            None => out.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }

    out.push_str(rest);
    out
}

fn render(
    token: &str,
    mentions: &[MentionedUser],
    channels: &HashMap<String, String>,
) -> Option<String> {
    if let Some(id) = token
        .strip_prefix("@!")
        .or_else(|| token.strip_prefix('@'))
        .filter(|id| is_snowflake(id))
    {
        let Some(user) = mentions.iter().find(|u| u.id == id) else {
            debug!(user_id = id, "unresolved user mention");
            return None;
        };
        let name: &str = match user.nick.as_deref() {
            Some(nick) if !nick.is_empty() => nick,
            _ => &user.username,
        };
        return Some(format!("@{name}"));
    }

    if let Some(id) = token.strip_prefix('#').filter(|id| is_snowflake(id)) {
        let Some(name) = channels.get(id) else {
            debug!(channel_id = id, "unresolved channel mention");
            return None;
        };
        return Some(format!("#{name}"));
    }

    None
}

fn is_snowflake(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
