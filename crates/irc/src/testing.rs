//! In-memory [`LineClient`] recording everything written to it.

use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use {async_trait::async_trait, tokio::sync::mpsc};

use crate::{
    Error, Result,
    client::{LineClient, LineEvent, LineEventReceiver, LineEventSender},
};

pub struct FakeLineClient {
    nick: String,
    events: LineEventSender,
    receiver: Mutex<Option<LineEventReceiver>>,
    connected: AtomicBool,
    fail_connects: AtomicBool,
    lines: Mutex<Vec<String>>,
    quits: Mutex<Vec<String>>,
    pub connect_calls: AtomicUsize,
}

impl FakeLineClient {
    /// A client whose successful connects are acknowledged as `nick`.
    pub fn new(nick: &str) -> Self {
        let (events, receiver) = mpsc::unbounded_channel();
        Self {
            nick: nick.into(),
            events,
            receiver: Mutex::new(Some(receiver)),
            connected: AtomicBool::new(false),
            fail_connects: AtomicBool::new(false),
            lines: Mutex::new(Vec::new()),
            quits: Mutex::new(Vec::new()),
            connect_calls: AtomicUsize::new(0),
        }
    }

    /// The event stream; can be taken once.
    pub fn take_events(&self) -> LineEventReceiver {
        lock(&self.receiver)
            .take()
            .unwrap_or_else(|| panic!("event receiver already taken"))
    }

    pub fn fail_connects(&self, fail: bool) {
        self.fail_connects.store(fail, Ordering::SeqCst);
    }

    /// Inject an event as the server connection would.
    pub fn emit(&self, event: LineEvent) {
        let _ = self.events.send(event);
    }

    /// Every protocol line written so far.
    pub fn lines(&self) -> Vec<String> {
        lock(&self.lines).clone()
    }

    pub fn quits(&self) -> Vec<String> {
        lock(&self.quits).clone()
    }

    fn write(&self, line: String) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        lock(&self.lines).push(line);
        Ok(())
    }
}

#[async_trait]
impl LineClient for FakeLineClient {
    async fn connect(&self) -> Result<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_connects.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        self.connected.store(true, Ordering::SeqCst);
        self.emit(LineEvent::Connected {
            nick: self.nick.clone(),
        });
        Ok(())
    }

    fn quit(&self, message: &str) -> Result<()> {
        lock(&self.quits).push(message.to_string());
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn privmsg(&self, target: &str, text: &str) -> Result<()> {
        self.write(format!("PRIVMSG {target} :{text}"))
    }

    fn join(&self, channel: &str) -> Result<()> {
        self.write(format!("JOIN {channel}"))
    }

    fn mode(&self, target: &str, modes: &str) -> Result<()> {
        self.write(format!("MODE {target} {modes}"))
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
