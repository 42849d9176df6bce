//! Connect / wait / reconnect loop for the IRC side.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    tokio::sync::Notify,
    tracing::{debug, info, warn},
};

use crate::{Result, client::LineClient};

/// Fixed delay between failed connection attempts.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Closing,
    Closed,
}

/// Keeps a [`LineClient`] connected until closed.
///
/// The closed flag is checked once per loop iteration, so a close issued
/// during a connect attempt or a backoff wait takes effect after it.
pub struct ConnectionSupervisor {
    client: Arc<dyn LineClient>,
    quit_message: String,
    backoff: Duration,
    closed: Mutex<bool>,
    disconnected: Notify,
}

impl ConnectionSupervisor {
    pub fn new(client: Arc<dyn LineClient>, quit_message: impl Into<String>) -> Self {
        Self {
            client,
            quit_message: quit_message.into(),
            backoff: RECONNECT_BACKOFF,
            closed: Mutex::new(false),
            disconnected: Notify::new(),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Signal that the current connection is gone. A signal raised while the
    /// loop is not waiting is kept for its next wait.
    pub fn disconnected(&self) {
        self.disconnected.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drive the connection until [`Self::close`] is called.
    pub async fn run(self: Arc<Self>) {
        let mut state = ConnectionState::Idle;
        while !self.is_closed() {
            transition(&mut state, ConnectionState::Connecting);
            match self.client.connect().await {
                Ok(()) => {
                    transition(&mut state, ConnectionState::Connected);
                    self.disconnected.notified().await;
                    transition(&mut state, ConnectionState::Disconnected);
                },
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in_secs = self.backoff.as_secs(),
                        "irc connection error, reconnecting after backoff"
                    );
                    transition(&mut state, ConnectionState::Disconnected);
                    tokio::time::sleep(self.backoff).await;
                },
            }
        }
        transition(&mut state, ConnectionState::Closing);
        transition(&mut state, ConnectionState::Closed);
    }

    /// Stop reconnecting and send QUIT. Repeated calls are no-ops.
    pub fn close(&self) -> Result<()> {
        {
            let mut closed = self.closed.lock().unwrap_or_else(|e| e.into_inner());
            if *closed {
                return Ok(());
            }
            *closed = true;
        }
        info!("closing irc connection");
        let result = self.client.quit(&self.quit_message);
        // Release a loop parked on a live connection.
        self.disconnected.notify_one();
        result
    }
}

fn transition(state: &mut ConnectionState, next: ConnectionState) {
    debug!(from = ?*state, state = ?next, "irc connection state");
    *state = next;
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::FakeLineClient,
        std::sync::atomic::Ordering,
    };

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failing_connect_retries_once_per_backoff() {
        let client = Arc::new(FakeLineClient::new("discord"));
        client.fail_connects(true);
        let sup = Arc::new(ConnectionSupervisor::new(client.clone(), "bye"));
        let task = tokio::spawn(Arc::clone(&sup).run());

        settle().await;
        assert_eq!(client.connect_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(59)).await;
        settle().await;
        assert_eq!(client.connect_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(client.connect_calls.load(Ordering::SeqCst), 2);

        sup.close().unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        task.await.unwrap();
        assert_eq!(client.connect_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_disconnect_signal() {
        let client = Arc::new(FakeLineClient::new("discord"));
        let sup = Arc::new(ConnectionSupervisor::new(client.clone(), "bye"));
        let task = tokio::spawn(Arc::clone(&sup).run());

        settle().await;
        assert_eq!(client.connect_calls.load(Ordering::SeqCst), 1);

        sup.disconnected();
        settle().await;
        assert_eq!(client.connect_calls.load(Ordering::SeqCst), 2);

        sup.close().unwrap();
        task.await.unwrap();
        assert_eq!(client.quits(), vec!["bye".to_string()]);
    }

    #[tokio::test]
    async fn signal_before_wait_is_not_lost() {
        let client = Arc::new(FakeLineClient::new("discord"));
        let sup = Arc::new(ConnectionSupervisor::new(client.clone(), "bye"));
        sup.disconnected();
        sup.disconnected();

        let task = tokio::spawn(Arc::clone(&sup).run());
        settle().await;
        // The stored permit ends the first wait immediately.
        assert_eq!(client.connect_calls.load(Ordering::SeqCst), 2);

        sup.close().unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let client = Arc::new(FakeLineClient::new("discord"));
        let sup = ConnectionSupervisor::new(client.clone(), "see you");
        sup.close().unwrap();
        sup.close().unwrap();
        assert!(sup.is_closed());
        assert_eq!(client.quits(), vec!["see you".to_string()]);
    }

    #[tokio::test]
    async fn closed_before_run_never_connects() {
        let client = Arc::new(FakeLineClient::new("discord"));
        let sup = Arc::new(ConnectionSupervisor::new(client.clone(), "bye"));
        sup.close().unwrap();
        Arc::clone(&sup).run().await;
        assert_eq!(client.connect_calls.load(Ordering::SeqCst), 0);
    }
}
