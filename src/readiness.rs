//! One-shot readiness signals.
//!
//! A [`Signal`] is a completion gate with explicit resolve/reject-once
//! semantics: the first transition wins and later ones are no-ops. The store
//! carries two, "features ready" and "stats ready", which query entry points
//! await before touching the index.

use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
enum State {
    Pending,
    Resolved,
    Rejected(Arc<Error>),
}

pub struct Signal {
    tx: watch::Sender<State>,
    rx: watch::Receiver<State>,
}

impl Signal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(State::Pending);
        Self { tx, rx }
    }

    /// Mark the signal satisfied. No-op if already resolved or rejected.
    pub fn resolve(&self) {
        self.tx.send_if_modified(|state| {
            if matches!(state, State::Pending) {
                *state = State::Resolved;
                true
            } else {
                false
            }
        });
    }

    /// Mark the signal failed. No-op if already resolved or rejected.
    pub fn reject(&self, error: Arc<Error>) {
        self.tx.send_if_modified(|state| {
            if matches!(state, State::Pending) {
                *state = State::Rejected(error.clone());
                true
            } else {
                false
            }
        });
    }

    /// Wait for the one-time transition. A rejected signal yields the same
    /// initialization error to every waiter, so dependent queries fail fast
    /// instead of hanging.
    pub async fn wait(&self) -> Result<()> {
        let mut rx = self.rx.clone();
        loop {
            let state = rx.borrow_and_update().clone();
            match state {
                State::Resolved => return Ok(()),
                State::Rejected(e) => return Err(Error::Initialization(e.to_string())),
                State::Pending => {
                    if rx.changed().await.is_err() {
                        return Err(Error::Initialization("readiness signal dropped".into()));
                    }
                }
            }
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}
