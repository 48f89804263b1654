use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::MetaError;
use crate::Result;

/// Outcome shared with collapsed waiters; errors cross task boundaries as
/// their rendered message.
type Outcome = std::result::Result<(), String>;

enum Role {
    Leader(watch::Sender<Option<Outcome>>),
    Waiter(watch::Receiver<Option<Outcome>>),
}

/// Collapses concurrent identical operations by key.
///
/// At most one execution per key is in flight at any instant; callers
/// arriving while it runs await that execution's outcome instead of starting
/// their own. The key is freed once the call completes, success or failure,
/// so the next caller starts fresh — outcomes are never cached.
pub struct SingleFlight {
    inflight: Mutex<HashMap<String, watch::Receiver<Option<Outcome>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `call` under `key`, or wait for the identical call already in
    /// flight. The leader gets the call's own error; waiters get
    /// [`MetaError::Collapsed`] carrying the leader's error message.
    pub async fn execute<F, Fut>(
        &self,
        key: &str,
        call: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let role = {
            let mut inflight = self.inflight.lock();
            match inflight.get(key) {
                // a closed channel means the previous leader was dropped mid-call
                Some(rx) if rx.has_changed().is_ok() => Role::Waiter(rx.clone()),
                _ => {
                    let (tx, rx) = watch::channel(None);
                    inflight.insert(key.to_string(), rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Leader(tx) => {
                let result = call().await;
                let outcome = match &result {
                    Ok(()) => Ok(()),
                    Err(e) => Err(e.to_string()),
                };
                // free the key before publishing so the next call starts fresh
                self.inflight.lock().remove(key);
                let _ = tx.send(Some(outcome));
                result
            }
            Role::Waiter(mut rx) => loop {
                if let Some(outcome) = rx.borrow_and_update().clone() {
                    return outcome.map_err(|msg| MetaError::Collapsed(msg).into());
                }
                if rx.changed().await.is_err() {
                    return Err(MetaError::Collapsed("in-flight call dropped".to_string()).into());
                }
            },
        }
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new()
    }
}
