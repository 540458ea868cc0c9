//! Hardware-context availability and recovery.
//!
//! The accelerated backend can lose its device context at any time (driver
//! reset, power event, backgrounding). The monitor tracks that state, tells
//! in-flight work to abort, and runs registered recovery handlers when the
//! embedding application reports the context is back.
//!
//! # State Transitions
//!
//! ```text
//! available --notify_lost--> lost --notify_restored--> recovering
//! recovering --all handlers ok--> available
//! recovering --any handler fails--> lost
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

use crate::error::RecoveryError;

/// Availability of the hardware context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextState {
    /// The context can be used.
    pub available: bool,
    /// Recovery handlers are running.
    pub is_recovering: bool,
}

impl ContextState {
    /// Usable context.
    pub const AVAILABLE: Self = Self {
        available: true,
        is_recovering: false,
    };

    /// Lost context, no recovery running.
    pub const LOST: Self = Self {
        available: false,
        is_recovering: false,
    };

    /// Lost context, recovery running.
    pub const RECOVERING: Self = Self {
        available: false,
        is_recovering: true,
    };
}

/// Restores resources after the hardware context returns.
#[async_trait]
pub trait RecoveryHandler: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Re-validates or recreates context-bound resources.
    async fn recover(&self) -> Result<(), RecoveryError>;
}

/// Tracks hardware-context state and coordinates recovery.
pub struct ContextMonitor {
    state: watch::Sender<ContextState>,
    handlers: RwLock<Vec<Arc<dyn RecoveryHandler>>>,
    restoring: Mutex<()>,
}

impl std::fmt::Debug for ContextMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextMonitor")
            .field("state", &*self.state.borrow())
            .field("handlers", &self.handlers.read().len())
            .finish()
    }
}

impl ContextMonitor {
    /// Creates a monitor.
    ///
    /// `available` is whether an accelerated context exists at startup.
    #[must_use]
    pub fn new(available: bool) -> Self {
        let initial = if available {
            ContextState::AVAILABLE
        } else {
            ContextState::LOST
        };
        Self {
            state: watch::Sender::new(initial),
            handlers: RwLock::new(Vec::new()),
            restoring: Mutex::new(()),
        }
    }

    /// Returns `true` when the context can be used.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.state.borrow().available
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> ContextState {
        *self.state.borrow()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ContextState> {
        self.state.subscribe()
    }

    /// Appends a recovery handler. Handlers run in registration order.
    pub fn register(&self, handler: Arc<dyn RecoveryHandler>) {
        self.handlers.write().push(handler);
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Marks the context lost. Pending accelerated work observes this
    /// immediately.
    pub fn notify_lost(&self) {
        let changed = self.state.send_if_modified(|state| {
            let was = *state;
            *state = ContextState::LOST;
            was != ContextState::LOST
        });
        if changed {
            warn!("Hardware context lost");
        }
    }

    /// Runs every recovery handler and marks the context available if all
    /// succeed.
    ///
    /// On the first failing handler the state returns to lost and the
    /// error is returned; a later call retries from the first handler. A
    /// loss reported while handlers run wins over their success.
    ///
    /// # Errors
    ///
    /// Returns the first handler's [`RecoveryError`].
    pub async fn notify_restored(&self) -> Result<(), RecoveryError> {
        let _restoring = self.restoring.lock().await;
        if self.is_available() {
            return Ok(());
        }

        self.state.send_replace(ContextState::RECOVERING);
        let handlers: Vec<Arc<dyn RecoveryHandler>> = self.handlers.read().clone();

        for handler in &handlers {
            if let Err(e) = handler.recover().await {
                warn!(handler = handler.name(), error = %e, "Context recovery failed");
                self.state.send_replace(ContextState::LOST);
                return Err(e);
            }
        }

        let restored = self.state.send_if_modified(|state| {
            if *state == ContextState::RECOVERING {
                *state = ContextState::AVAILABLE;
                true
            } else {
                false
            }
        });
        if restored {
            info!(handlers = handlers.len(), "Hardware context restored");
            Ok(())
        } else {
            Err(RecoveryError::new(
                "monitor",
                "context lost again during recovery",
            ))
        }
    }
}

/// Resolves once `rx` reports a lost context. Never resolves if the
/// monitor is dropped.
pub(crate) async fn wait_lost(rx: &mut watch::Receiver<ContextState>) {
    if rx.wait_for(|state| *state == ContextState::LOST).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        name: &'static str,
        calls: AtomicUsize,
        fail_first: usize,
        order: Arc<parking_lot::Mutex<Vec<&'static str>>>,
    }

    impl Counting {
        fn new(
            name: &'static str,
            fail_first: usize,
            order: &Arc<parking_lot::Mutex<Vec<&'static str>>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
                fail_first,
                order: Arc::clone(order),
            })
        }
    }

    #[async_trait]
    impl RecoveryHandler for Counting {
        fn name(&self) -> &str {
            self.name
        }

        async fn recover(&self) -> Result<(), RecoveryError> {
            self.order.lock().push(self.name);
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(RecoveryError::new(self.name, "not yet"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn initial_state_follows_availability() {
        assert!(ContextMonitor::new(true).is_available());
        assert_eq!(ContextMonitor::new(false).state(), ContextState::LOST);
    }

    #[tokio::test]
    async fn loss_then_restore() {
        let monitor = ContextMonitor::new(true);
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        monitor.register(Counting::new("a", 0, &order));
        monitor.register(Counting::new("b", 0, &order));

        monitor.notify_lost();
        assert!(!monitor.is_available());

        monitor.notify_restored().await.unwrap();
        assert_eq!(monitor.state(), ContextState::AVAILABLE);
        assert_eq!(*order.lock(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn failed_handler_keeps_context_lost_until_retry() {
        let monitor = ContextMonitor::new(true);
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        monitor.register(Counting::new("session", 1, &order));
        monitor.register(Counting::new("later", 0, &order));

        monitor.notify_lost();
        let err = monitor.notify_restored().await.unwrap_err();
        assert_eq!(err.handler, "session");
        assert_eq!(monitor.state(), ContextState::LOST);
        assert_eq!(*order.lock(), vec!["session"]);

        monitor.notify_restored().await.unwrap();
        assert!(monitor.is_available());
        assert_eq!(*order.lock(), vec!["session", "session", "later"]);
    }

    #[tokio::test]
    async fn restore_when_available_is_noop() {
        let monitor = ContextMonitor::new(true);
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        monitor.register(Counting::new("a", 0, &order));
        monitor.notify_restored().await.unwrap();
        assert!(order.lock().is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let monitor = ContextMonitor::new(true);
        let mut rx = monitor.subscribe();
        monitor.notify_lost();
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().available);

        // Repeated loss is not a change.
        monitor.notify_lost();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn wait_lost_resolves_on_loss() {
        let monitor = ContextMonitor::new(true);
        let mut rx = monitor.subscribe();
        monitor.notify_lost();
        wait_lost(&mut rx).await;
    }
}
