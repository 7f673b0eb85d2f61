//! Start/stop bookkeeping shared by both listeners.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::StartError;

/// Observable state of a server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Unstarted,
    Listening,
    Stopped,
}

/// Slack added on top of the drain limit while waiting for a serve loop to exit
const STOP_GRACE: Duration = Duration::from_secs(1);

pub(crate) struct Lifecycle {
    name: &'static str,
    claimed: AtomicBool,
    state: watch::Sender<ServerState>,
    stop_requested: watch::Sender<bool>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Lifecycle {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            claimed: AtomicBool::new(false),
            state: watch::Sender::new(ServerState::Unstarted),
            stop_requested: watch::Sender::new(false),
            local_addr: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Claim the one allowed start.
    pub(crate) fn claim(&self) -> Result<(), StartError> {
        if self.claimed.swap(true, Ordering::SeqCst) {
            return Err(StartError::AlreadyStarted);
        }
        Ok(())
    }

    /// Move to `Listening`. Returns `false` when a stop already won the race,
    /// in which case the caller must not serve.
    pub(crate) fn mark_listening(&self, addr: SocketAddr) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ServerState::Unstarted {
                *self.local_addr.lock() = Some(addr);
                *state = ServerState::Listening;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn mark_stopped(&self) {
        self.state.send_replace(ServerState::Stopped);
    }

    /// Resolves once a stop has been requested.
    pub(crate) fn stop_signal(&self) -> impl Future<Output = ()> + Send + use<> {
        let mut rx = self.stop_requested.subscribe();
        async move {
            let _ = rx.wait_for(|requested| *requested).await;
        }
    }

    /// Resolves `limit` after a stop has been requested.
    pub(crate) fn drain_deadline(
        &self,
        limit: Duration,
    ) -> impl Future<Output = ()> + Send + use<> {
        let signal = self.stop_signal();
        async move {
            signal.await;
            tokio::time::sleep(limit).await;
        }
    }

    /// Wait until the server is listening and return its bound address.
    pub(crate) async fn wait_listening(&self, timeout: Duration) -> Option<SocketAddr> {
        let mut rx = self.state.subscribe();
        let listening = match tokio::time::timeout(
            timeout,
            rx.wait_for(|state| *state != ServerState::Unstarted),
        )
        .await
        {
            Ok(Ok(state)) => *state == ServerState::Listening,
            _ => false,
        };
        if listening { self.local_addr() } else { None }
    }

    /// Request a stop and wait for the serve loop to drain.
    ///
    /// Safe to call before, during or after start, and any number of times.
    pub(crate) async fn stop(&self, drain_limit: Duration) {
        self.stop_requested.send_replace(true);

        let never_listened = self.state.send_if_modified(|state| {
            if *state == ServerState::Unstarted {
                *state = ServerState::Stopped;
                true
            } else {
                false
            }
        });
        if never_listened {
            debug!(server = self.name, "Stopped before listening");
            return;
        }

        let limit = drain_limit.saturating_add(STOP_GRACE);
        let mut rx = self.state.subscribe();
        let drained =
            tokio::time::timeout(limit, rx.wait_for(|state| *state == ServerState::Stopped)).await;
        if drained.is_err() {
            warn!(server = self.name, "Server did not stop within {:?}", limit);
        }
    }
}
