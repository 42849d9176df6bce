//! TCP/TLS IRC connection implementing [`LineClient`].

use std::{
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use {
    async_trait::async_trait,
    tokio::{
        io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
        net::TcpStream,
        sync::mpsc,
        time::{Instant, MissedTickBehavior},
    },
    tokio_rustls::{TlsConnector, rustls::pki_types::ServerName},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    Error, Result,
    client::{LineClient, LineEvent, LineEventReceiver, LineEventSender},
    config::IrcConfig,
    line::{Line, ctcp_reply, parse_ctcp, split_text},
};

const VERSION_REPLY: &str = concat!("tandem ", env!("CARGO_PKG_VERSION"));

trait IrcStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> IrcStream for T {}

/// Handle to the socket task of the current connection.
struct Live {
    outgoing: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

/// A reconnectable IRC client. Each `connect` replaces the previous socket.
pub struct IrcConnection {
    config: IrcConfig,
    events: LineEventSender,
    live: Mutex<Option<Live>>,
}

impl IrcConnection {
    /// Create the client and the stream of events it will report.
    pub fn new(config: IrcConfig) -> (Arc<Self>, LineEventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Self {
            config,
            events,
            live: Mutex::new(None),
        });
        (conn, rx)
    }

    fn send_raw(&self, line: String) -> Result<()> {
        let live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        let live = live.as_ref().ok_or(Error::NotConnected)?;
        live.outgoing.send(line).map_err(|_| Error::NotConnected)
    }

    async fn open_stream(&self) -> Result<Box<dyn IrcStream>> {
        let address = self.config.address();
        let tcp = TcpStream::connect(address.as_str()).await?;
        if !self.config.tls {
            return Ok(Box::new(tcp));
        }
        let server_name = ServerName::try_from(self.config.server_name())
            .map_err(|_| Error::ServerName(self.config.server_name().to_string()))?
            .to_owned();
        let connector = TlsConnector::from(tandem_common::tls::client_config()?);
        let tls = connector.connect(server_name, tcp).await?;
        Ok(Box::new(tls))
    }
}

#[async_trait]
impl LineClient for IrcConnection {
    async fn connect(&self) -> Result<()> {
        let stream = self.open_stream().await?;
        info!(host = %self.config.host, tls = self.config.tls, "connected to IRC server");

        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        if let Some(password) = self.config.password() {
            let _ = outgoing.send(format!("PASS {password}"));
        }
        let nick = &self.config.nick;
        let _ = outgoing.send(format!("NICK {nick}"));
        let _ = outgoing.send(format!("USER {nick} 0 * :{nick}"));

        let cancel = CancellationToken::new();
        let previous = self
            .live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(Live {
                outgoing: outgoing.clone(),
                cancel: cancel.clone(),
            });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }

        let session = Session {
            nick: nick.clone(),
            events: self.events.clone(),
            outgoing,
        };
        tokio::spawn(session.run(stream, outgoing_rx, self.config.ping_interval, cancel));
        Ok(())
    }

    fn quit(&self, message: &str) -> Result<()> {
        match self.send_raw(format!("QUIT :{message}")) {
            Err(Error::NotConnected) => Ok(()),
            other => other,
        }
    }

    fn privmsg(&self, target: &str, text: &str) -> Result<()> {
        for chunk in split_text(text, self.config.split_len) {
            self.send_raw(format!("PRIVMSG {target} :{chunk}"))?;
        }
        Ok(())
    }

    fn join(&self, channel: &str) -> Result<()> {
        self.send_raw(format!("JOIN {channel}"))
    }

    fn mode(&self, target: &str, modes: &str) -> Result<()> {
        self.send_raw(format!("MODE {target} {modes}"))
    }
}

/// State owned by the socket task.
struct Session {
    nick: String,
    events: LineEventSender,
    /// Replies generated while reading go through the same queue as user
    /// writes so lines are never interleaved.
    outgoing: mpsc::UnboundedSender<String>,
}

impl Session {
    async fn run(
        mut self,
        stream: Box<dyn IrcStream>,
        mut outgoing_rx: mpsc::UnboundedReceiver<String>,
        ping_interval: Duration,
        cancel: CancellationToken,
    ) {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(512);
        let mut keepalive =
            tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result: Result<()> = async {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => return Ok(()),
                    line = outgoing_rx.recv() => {
                        let Some(line) = line else { return Ok(()) };
                        debug!(line = %redact(&line), "irc >>");
                        writer.write_all(line.as_bytes()).await?;
                        writer.write_all(b"\r\n").await?;
                        writer.flush().await?;
                    },
                    _ = keepalive.tick() => {
                        let stamp = SystemTime::now()
                            .duration_since(UNIX_EPOCH)
                            .map_or(0, |d| d.as_secs());
                        let _ = self.outgoing.send(format!("PING :{stamp}"));
                    },
                    read = reader.read_until(b'\n', &mut buf) => {
                        if read? == 0 {
                            return Ok(());
                        }
                        let raw = String::from_utf8_lossy(&buf).into_owned();
                        buf.clear();
                        if let Some(line) = Line::parse(&raw) {
                            self.handle(&line);
                        }
                    },
                }
            }
        }
        .await;

        if cancel.is_cancelled() {
            debug!("irc session replaced");
            return;
        }
        if let Err(e) = result {
            warn!(error = %e, "irc connection error");
            let _ = self.events.send(LineEvent::Error(e.to_string()));
        }
        info!("disconnected from IRC server");
        let _ = self.events.send(LineEvent::Disconnected);
    }

    fn handle(&mut self, line: &Line) {
        match line.command.as_str() {
            "PING" => {
                let _ = self.outgoing.send(format!("PONG :{}", line.text()));
            },
            // RPL_WELCOME: the first param is the nick we registered with.
            "001" => {
                if let Some(nick) = line.param(0) {
                    self.nick = nick.to_string();
                }
                let _ = self.events.send(LineEvent::Connected {
                    nick: self.nick.clone(),
                });
            },
            // ERR_NICKNAMEINUSE
            "433" => {
                self.nick.push('_');
                info!(nick = %self.nick, "nick in use, retrying");
                let _ = self.outgoing.send(format!("NICK {}", self.nick));
            },
            "NICK" => {
                if line.nick().is_some_and(|n| n.eq_ignore_ascii_case(&self.nick))
                    && let Some(new) = line.param(0)
                {
                    info!(from = %self.nick, to = new, "own nick changed");
                    self.nick = new.to_string();
                    let _ = self.events.send(LineEvent::NickChanged {
                        nick: self.nick.clone(),
                    });
                }
            },
            "ERROR" => {
                let _ = self.events.send(LineEvent::Error(line.text().to_string()));
            },
            "PRIVMSG" => self.handle_privmsg(line),
            _ => {},
        }
    }

    fn handle_privmsg(&self, line: &Line) {
        let (Some(nick), Some(target)) = (line.nick(), line.param(0)) else {
            return;
        };
        let text = line.text();

        let (text, action) = match parse_ctcp(text) {
            None => (text, false),
            Some(ctcp) if ctcp.command.eq_ignore_ascii_case("ACTION") => (ctcp.args, true),
            Some(ctcp) => {
                let reply = match ctcp.command.to_ascii_uppercase().as_str() {
                    "VERSION" => ctcp_reply("VERSION", VERSION_REPLY),
                    "PING" => ctcp_reply("PING", ctcp.args),
                    other => {
                        debug!(ctcp = other, from = nick, "ignoring CTCP request");
                        return;
                    },
                };
                let _ = self.outgoing.send(format!("NOTICE {nick} :{reply}"));
                return;
            },
        };

        let _ = self.events.send(LineEvent::Message {
            channel: target.to_string(),
            nick: nick.to_string(),
            text: text.to_string(),
            action,
        });
    }
}

fn redact(line: &str) -> &str {
    if line.starts_with("PASS ") {
        "PASS [REDACTED]"
    } else {
        line
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::config::DEFAULT_PING_INTERVAL,
        tokio::{io::duplex, sync::mpsc::error::TryRecvError},
    };

    fn session() -> (Session, LineEventReceiver, mpsc::UnboundedReceiver<String>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let s = Session {
            nick: "discord".into(),
            events,
            outgoing,
        };
        (s, events_rx, outgoing_rx)
    }

    fn feed(s: &mut Session, raw: &str) {
        s.handle(&Line::parse(raw).unwrap());
    }

    #[test]
    fn ping_gets_pong() {
        let (mut s, _ev, mut out) = session();
        feed(&mut s, "PING :irc.example.net");
        assert_eq!(out.try_recv().unwrap(), "PONG :irc.example.net");
    }

    #[test]
    fn nick_collision_appends_underscore_then_welcome_reports_nick() {
        let (mut s, mut ev, mut out) = session();
        feed(&mut s, ":srv 433 * discord :Nickname is already in use");
        assert_eq!(out.try_recv().unwrap(), "NICK discord_");
        feed(&mut s, ":srv 001 discord_ :Welcome");
        assert_eq!(ev.try_recv().unwrap(), LineEvent::Connected {
            nick: "discord_".into()
        });
    }

    #[test]
    fn privmsg_and_action_become_messages() {
        let (mut s, mut ev, _out) = session();
        feed(&mut s, ":alice!a@h PRIVMSG #general :hi all");
        feed(&mut s, ":alice!a@h PRIVMSG #general :\u{1}ACTION waves\u{1}");
        assert_eq!(ev.try_recv().unwrap(), LineEvent::Message {
            channel: "#general".into(),
            nick: "alice".into(),
            text: "hi all".into(),
            action: false,
        });
        assert_eq!(ev.try_recv().unwrap(), LineEvent::Message {
            channel: "#general".into(),
            nick: "alice".into(),
            text: "waves".into(),
            action: true,
        });
    }

    #[test]
    fn ctcp_version_is_answered_not_relayed() {
        let (mut s, mut ev, mut out) = session();
        feed(&mut s, ":bob!b@h PRIVMSG discord :\u{1}VERSION\u{1}");
        let reply = out.try_recv().unwrap();
        assert!(reply.starts_with("NOTICE bob :\u{1}VERSION tandem "), "{reply}");
        assert_eq!(ev.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn own_nick_change_is_tracked_and_reported() {
        let (mut s, mut ev, _out) = session();
        feed(&mut s, ":discord!d@h NICK :relay");
        assert_eq!(s.nick, "relay");
        assert_eq!(ev.try_recv().unwrap(), LineEvent::NickChanged {
            nick: "relay".into()
        });

        feed(&mut s, ":other!o@h NICK :x");
        assert_eq!(s.nick, "relay");
        assert_eq!(ev.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn pass_is_redacted_in_logs() {
        assert_eq!(redact("PASS secret"), "PASS [REDACTED]");
        assert_eq!(redact("NICK a"), "NICK a");
    }

    #[tokio::test]
    async fn writes_without_connection_are_not_connected() {
        let (conn, _rx) = IrcConnection::new(IrcConfig::default());
        assert!(matches!(conn.privmsg("#x", "hi"), Err(Error::NotConnected)));
        assert!(matches!(conn.join("#x"), Err(Error::NotConnected)));
        conn.quit("bye").unwrap();
    }

    #[tokio::test]
    async fn session_reports_disconnect_on_eof() {
        let (client_side, server_side) = duplex(1024);
        let (s, mut ev, _out) = session();
        let (_tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(s.run(
            Box::new(client_side),
            rx,
            DEFAULT_PING_INTERVAL,
            CancellationToken::new(),
        ));

        let mut server = server_side;
        server.write_all(b":srv 001 discord :hi\r\n").await.unwrap();
        drop(server);
        task.await.unwrap();

        assert_eq!(ev.recv().await.unwrap(), LineEvent::Connected {
            nick: "discord".into()
        });
        assert_eq!(ev.recv().await.unwrap(), LineEvent::Disconnected);
    }

    #[tokio::test]
    async fn privmsg_is_split_at_split_len() {
        let (client_side, server_side) = duplex(4096);
        let (conn, _rx) = IrcConnection::new(IrcConfig {
            nick: "discord".into(),
            split_len: 10,
            ..Default::default()
        });
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        *conn.live.lock().unwrap() = Some(Live {
            outgoing: outgoing.clone(),
            cancel: cancel.clone(),
        });
        let (events, _events_rx) = mpsc::unbounded_channel();
        let session = Session {
            nick: "discord".into(),
            events,
            outgoing,
        };
        tokio::spawn(session.run(
            Box::new(client_side),
            outgoing_rx,
            DEFAULT_PING_INTERVAL,
            cancel.clone(),
        ));

        conn.privmsg("#x", "hello world again").unwrap();

        let mut reader = BufReader::new(server_side);
        let mut lines = Vec::new();
        for _ in 0..2 {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            lines.push(line);
        }
        assert_eq!(lines, vec!["PRIVMSG #x :hello\r\n", "PRIVMSG #x :world\r\n"]);
        cancel.cancel();
    }
}
