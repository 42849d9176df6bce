//! Parsing of single IRC protocol lines.

/// Delimiter of CTCP requests embedded in PRIVMSG text.
const CTCP_DELIM: char = '\u{1}';

/// One parsed protocol line: `[@tags] [:prefix] COMMAND params... [:trailing]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub prefix: Option<String>,
    /// Upper-cased command or three-digit numeric.
    pub command: String,
    /// Middle parameters followed by the trailing one, if any.
    pub params: Vec<String>,
}

impl Line {
    /// Parse a raw line. Message tags are skipped. Returns `None` for blank
    /// or command-less input.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut rest = raw.trim_end_matches(['\r', '\n']);

        if rest.starts_with('@') {
            rest = rest.split_once(' ').map_or("", |(_, r)| r);
        }
        rest = rest.trim_start_matches(' ');

        let prefix = match rest.strip_prefix(':') {
            Some(stripped) => {
                let (prefix, r) = stripped.split_once(' ').unwrap_or((stripped, ""));
                rest = r.trim_start_matches(' ');
                Some(prefix.to_string())
            },
            None => None,
        };

        let (command, r) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return None;
        }
        rest = r;

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            let (param, r) = rest.split_once(' ').unwrap_or((rest, ""));
            params.push(param.to_string());
            rest = r;
        }

        Some(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Nick part of a `nick!user@host` prefix.
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split_once('!').map_or(prefix, |(nick, _)| nick))
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The last parameter, which carries free text for most commands.
    pub fn text(&self) -> &str {
        self.params.last().map_or("", String::as_str)
    }
}

/// A CTCP request found in PRIVMSG text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ctcp<'a> {
    pub command: &'a str,
    pub args: &'a str,
}

/// Split a `\x01COMMAND args\x01` payload. Returns `None` for plain text.
pub fn parse_ctcp(text: &str) -> Option<Ctcp<'_>> {
    let inner = text.strip_prefix(CTCP_DELIM)?;
    let inner = inner.strip_suffix(CTCP_DELIM).unwrap_or(inner);
    let (command, args) = inner.split_once(' ').unwrap_or((inner, ""));
    Some(Ctcp { command, args })
}

/// Wrap a CTCP reply for sending in a NOTICE.
pub fn ctcp_reply(command: &str, args: &str) -> String {
    if args.is_empty() {
        format!("{CTCP_DELIM}{command}{CTCP_DELIM}")
    } else {
        format!("{CTCP_DELIM}{command} {args}{CTCP_DELIM}")
    }
}

/// Split `text` into chunks of at most `max` bytes, preferring to break on
/// whitespace and never inside a UTF-8 character.
pub fn split_text(text: &str, max: usize) -> Vec<&str> {
    if max == 0 || text.len() <= max {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.len() > max {
        let mut end = max;
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            // A single character wider than `max`: emit it whole.
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }

        let (chunk, next) = match rest[..end].rfind(char::is_whitespace) {
            Some(space) if space > 0 => {
                let after = space + rest[space..].chars().next().map_or(1, char::len_utf8);
                (&rest[..space], &rest[after..])
            },
            _ => (&rest[..end], &rest[end..]),
        };
        chunks.push(chunk);
        rest = next;
    }
    if !rest.is_empty() {
        chunks.push(rest);
    }
    chunks
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn parses_privmsg() {
        let line = Line::parse(":alice!~a@host PRIVMSG #general :hello there\r\n").unwrap();
        assert_eq!(line.prefix.as_deref(), Some("alice!~a@host"));
        assert_eq!(line.nick(), Some("alice"));
        assert_eq!(line.command, "PRIVMSG");
        assert_eq!(line.params, vec!["#general", "hello there"]);
        assert_eq!(line.text(), "hello there");
    }

    #[test]
    fn parses_without_prefix_or_trailing() {
        let line = Line::parse("PING irc.example.net").unwrap();
        assert_eq!(line.prefix, None);
        assert_eq!(line.command, "PING");
        assert_eq!(line.param(0), Some("irc.example.net"));
    }

    #[test]
    fn parses_numeric_with_middle_params() {
        let line = Line::parse(":srv 433 * discord :Nickname is already in use").unwrap();
        assert_eq!(line.command, "433");
        assert_eq!(line.param(1), Some("discord"));
        assert_eq!(line.nick(), Some("srv"));
    }

    #[test]
    fn skips_message_tags() {
        let line = Line::parse("@time=2024-01-01T00:00:00Z :bob!b@h PRIVMSG #x :yo").unwrap();
        assert_eq!(line.nick(), Some("bob"));
        assert_eq!(line.text(), "yo");
    }

    #[test]
    fn empty_trailing_is_kept() {
        let line = Line::parse(":a!b@c PRIVMSG #x :").unwrap();
        assert_eq!(line.params, vec!["#x", ""]);
    }

    #[rstest]
    #[case("")]
    #[case("\r\n")]
    #[case(":prefix-only")]
    fn rejects_commandless_lines(#[case] raw: &str) {
        assert_eq!(Line::parse(raw), None);
    }

    #[rstest]
    #[case("\u{1}ACTION waves\u{1}", Some(("ACTION", "waves")))]
    #[case("\u{1}ACTION waves", Some(("ACTION", "waves")))]
    #[case("\u{1}VERSION\u{1}", Some(("VERSION", "")))]
    #[case("plain text", None)]
    fn detects_ctcp(#[case] text: &str, #[case] expected: Option<(&str, &str)>) {
        let got = parse_ctcp(text).map(|c| (c.command, c.args));
        assert_eq!(got, expected);
    }

    #[test]
    fn ctcp_reply_is_delimited() {
        assert_eq!(ctcp_reply("VERSION", "tandem"), "\u{1}VERSION tandem\u{1}");
    }

    #[rstest]
    #[case("short", 10, vec!["short"])]
    #[case("hello world again", 11, vec!["hello", "world again"])]
    #[case("abcdefghij", 4, vec!["abcd", "efgh", "ij"])]
    #[case("ab cdefghij", 4, vec!["ab", "cdef", "ghij"])]
    #[case("héllo", 2, vec!["h", "é", "ll", "o"])]
    fn splits(#[case] text: &str, #[case] max: usize, #[case] expected: Vec<&str>) {
        assert_eq!(split_text(text, max), expected);
    }

    #[test]
    fn split_never_breaks_utf8() {
        let text = "日本語のテキスト".repeat(20);
        for chunk in split_text(&text, 10) {
            assert!(chunk.len() <= 10);
            assert!(!chunk.is_empty());
        }
        assert_eq!(split_text(&text, 10).concat(), text);
    }
}
