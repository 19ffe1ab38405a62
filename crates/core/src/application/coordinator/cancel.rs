// Run Cancellation Token

use std::future::pending;
use tokio::sync::watch;
use tokio::time::Instant;

/// External cancellation signal for a run
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token nobody can fire
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for cancellation
    ///
    /// Never resolves if the sender is dropped without firing.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                pending::<()>().await;
            }
        }
    }
}

/// Cancellation sender
pub struct CancelSender {
    tx: watch::Sender<bool>,
}

impl CancelSender {
    /// Signal cancellation to every holder of the token
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a cancellation channel
pub fn cancel_channel() -> (CancelSender, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelSender { tx }, CancelToken { rx })
}

/// What stops scheduling: an external cancel or a global deadline
#[derive(Clone)]
pub struct Interrupt {
    cancel: CancelToken,
    deadline: Option<Instant>,
}

impl Interrupt {
    pub fn new(cancel: CancelToken, deadline: Option<Instant>) -> Self {
        Self { cancel, deadline }
    }

    /// Never fires
    pub fn none() -> Self {
        Self::new(CancelToken::never(), None)
    }

    pub fn is_triggered(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once cancelled or past the deadline
    pub async fn triggered(&self) {
        let mut cancel = self.cancel.clone();
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = cancel.cancelled() => {},
                    _ = tokio::time::sleep_until(deadline) => {},
                }
            }
            None => cancel.cancelled().await,
        }
    }
}
