//! Cancellation scopes for supervised processes.
//!
//! A scope is cancelled at most once and stays cancelled. Waiters are woken by
//! dropping the scope's trigger sender, which disconnects every receiver at once.

use crossbeam_channel::{Receiver, Select, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct ScopeState {
    cancelled: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
    parent: Option<Arc<ScopeState>>,
}

impl ScopeState {
    fn new(parent: Option<Arc<ScopeState>>) -> Self {
        let (trigger, signal) = crossbeam_channel::bounded(0);
        Self {
            cancelled: AtomicBool::new(false),
            trigger: Mutex::new(Some(trigger)),
            signal,
            parent,
        }
    }
}

/// Handle to a unit of work that may be asked to stop.
///
/// Clones share state: cancelling any clone cancels them all. Scopes made
/// with [`CancelScope::child`] are also cancelled when an ancestor is.
#[derive(Clone)]
pub struct CancelScope {
    state: Arc<ScopeState>,
}

impl CancelScope {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ScopeState::new(None)),
        }
    }

    /// A scope that can be cancelled on its own, or through `self`.
    pub fn child(&self) -> Self {
        Self {
            state: Arc::new(ScopeState::new(Some(Arc::clone(&self.state)))),
        }
    }

    /// Cancel this scope. Calling it again has no further effect.
    pub fn cancel(&self) {
        if self.state.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut trigger = match self.state.trigger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        trigger.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.chain().any(|state| state.cancelled.load(Ordering::SeqCst))
    }

    /// Block for up to `timeout`. Returns true as soon as the scope (or an
    /// ancestor) is cancelled, false if the timeout elapsed first.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }

        let chain: Vec<&ScopeState> = self.chain().collect();
        let mut select = Select::new();
        for state in &chain {
            select.recv(&state.signal);
        }

        match select.select_timeout(timeout) {
            Ok(operation) => {
                let index = operation.index();
                // Nothing is ever sent; readiness means the trigger was dropped.
                let _ = operation.recv(&chain[index].signal);
                true
            }
            Err(_) => self.is_cancelled(),
        }
    }

    fn chain(&self) -> impl Iterator<Item = &ScopeState> {
        std::iter::successors(Some(self.state.as_ref()), |state| {
            let state: &ScopeState = *state;
            state.parent.as_deref()
        })
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelScope")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
