//! Cooperative cancellation signal shared between a caller and in-flight invocations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct State {
    cancelled: bool,
    next_id: u64,
    callbacks: HashMap<u64, Callback>,
}

/// Cloneable cancellation signal. Cancelling any clone cancels them all.
#[derive(Clone, Default)]
pub struct CancelToken {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Unregisters an `on_cancel` callback when dropped.
pub struct CancelGuard {
    state: Arc<Mutex<State>>,
    id: u64,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        lock(&self.state).callbacks.remove(&self.id);
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    // Callbacks never run under the lock.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Registered callbacks run once, on the calling thread.
    pub fn cancel(&self) {
        let callbacks: Vec<Callback> = {
            let mut state = lock(&self.state);
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            state.callbacks.drain().map(|(_, cb)| cb).collect()
        };

        for callback in callbacks {
            callback();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        lock(&self.state).cancelled
    }

    /// Runs `callback` when the token is cancelled, or immediately if it already is.
    pub fn on_cancel<F>(&self, callback: F) -> CancelGuard
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = lock(&self.state);
        let id = state.next_id;
        state.next_id += 1;

        if state.cancelled {
            drop(state);
            callback();
        } else {
            state.callbacks.insert(id, Box::new(callback));
        }

        CancelGuard {
            state: Arc::clone(&self.state),
            id,
        }
    }
}
