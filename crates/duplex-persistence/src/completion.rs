//! Single-assignment result slot
//!
//! A [`Completer`] can deliver exactly one value because completing consumes
//! it. The paired [`Completion`] is read once, with a timeout, so a reader
//! never blocks forever: a dropped or panicked producer is observed as
//! [`CompletionError::Abandoned`].

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionError {
    #[error("no value delivered within {0:?}")]
    TimedOut(Duration),

    #[error("producer finished without delivering a value")]
    Abandoned,
}

/// Write side of the slot
#[derive(Debug)]
pub struct Completer<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Completer<T> {
    /// Deliver the value. A reader that already gave up is not an error.
    pub fn complete(self, value: T) {
        let _ = self.tx.send(value);
    }
}

/// Read side of the slot
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Completion<T> {
    /// Wait for the value for at most `timeout`.
    pub async fn wait(self, timeout: Duration) -> Result<T, CompletionError> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(CompletionError::Abandoned),
            Err(_) => Err(CompletionError::TimedOut(timeout)),
        }
    }
}

/// Create a connected completer/completion pair.
pub fn completion<T>() -> (Completer<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, Completion { rx })
}

/// Run `future` on its own task and hand its output back through a slot.
pub fn spawn_completion<F>(future: F) -> Completion<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let (completer, completion) = completion();
    tokio::spawn(async move {
        completer.complete(future.await);
    });
    completion
}
