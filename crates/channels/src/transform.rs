//! Outbound message transforms for each destination platform.

use tandem_common::Platform;

/// Messages starting with this are bot commands on the IRC side.
pub const COMMAND_PREFIX: &str = "!";

/// Replace every line break with `"; "`.
pub fn flatten_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "; ")
}

/// Lines to write to an IRC channel for a message relayed from `source`.
///
/// Commands are preceded by an attribution line and sent verbatim so IRC
/// bots still see the command at the start of the line.
pub fn to_line_protocol(source: Platform, nick: &str, text: &str) -> Vec<String> {
    let text = flatten_newlines(text);
    if text.starts_with(COMMAND_PREFIX) {
        vec![format!("Command sent from {source} by {nick}"), text]
    } else {
        vec![format!("<{nick}> {text}")]
    }
}

/// Normalize a message bound for a webhook. Returns `None` when there is
/// nothing worth posting.
pub fn to_gateway(nick: &str, text: &str) -> Option<String> {
    if is_blank(nick) || is_blank(text) {
        return None;
    }
    Some(flatten_newlines(text))
}

/// Render a CTCP ACTION the way chat users type it.
pub fn action_text(text: &str) -> String {
    format!("/me {text}")
}

pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}
