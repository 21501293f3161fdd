//! Synchronous-over-asynchronous execution bridge
//!
//! Lets code running outside any async context drive futures on a background
//! host and get a plain value or error back, with a bounded wait.
//!
//! ```no_run
//! use std::time::Duration;
//! use xtdbase::bridge::{BridgeError, ExecutionBridge};
//! use xtdbase::config::BridgeConfig;
//!
//! let bridge = ExecutionBridge::new(BridgeConfig::default())?;
//! let answer: Result<u32, BridgeError> = bridge.run_blocking(
//!     async {
//!         tokio::time::sleep(Duration::from_millis(10)).await;
//!         Ok(42)
//!     },
//!     Duration::from_secs(1),
//! );
//! assert_eq!(answer?, 42);
//! bridge.close();
//! # Ok::<(), BridgeError>(())
//! ```

pub mod error;
pub mod host;
pub mod pending;

pub use error::BridgeError;
pub use host::{HostInfo, HostLease, LifecycleCoordinator};
pub use pending::{pending_operation, Completer, OperationState, Outcome, PendingOperation};

use crate::config::{BridgeConfig, CancelPolicy};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Blocking front door to the background execution host.
pub struct ExecutionBridge {
    coordinator: LifecycleCoordinator,
    next_id: AtomicU64,
}

impl ExecutionBridge {
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        Ok(Self {
            coordinator: LifecycleCoordinator::new(config)?,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        self.coordinator.config()
    }

    pub fn coordinator(&self) -> &LifecycleCoordinator {
        &self.coordinator
    }

    pub fn default_timeout(&self) -> Duration {
        self.config().default_timeout
    }

    /// Runs `operation` on the host and blocks until it resolves or `timeout`
    /// elapses.
    ///
    /// The operation's own error comes back unchanged; bridge failures are
    /// converted into `E`. On timeout the operation is aborted or left running
    /// depending on [`CancelPolicy`].
    ///
    /// A timeout does not mean the operation had no effect. Abort only lands at
    /// the next suspension point, so an operation can still finish during
    /// `cancel_grace`; its value is discarded and the caller gets
    /// `Timeout { cancelled: false }`. Treat that as "outcome unknown" for writes.
    pub fn run_blocking<F, T, E>(&self, operation: F, timeout: Duration) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<BridgeError> + Send + 'static,
    {
        if timeout.is_zero() {
            return Err(BridgeError::Configuration("timeout must be positive".to_string()).into());
        }

        let lease = self.coordinator.ensure_running()?;
        if std::thread::current().id() == lease.thread_id {
            return Err(BridgeError::Configuration(
                "run_blocking called from the execution host thread".to_string(),
            )
            .into());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (completer, pending) = pending_operation::<T, E>(id);
        let started = Instant::now();

        let task = lease.handle.spawn(async move {
            match AssertUnwindSafe(operation).catch_unwind().await {
                Ok(result) => {
                    completer.complete(result);
                }
                Err(panic) => {
                    let reason = host::panic_message(&panic);
                    warn!("operation #{} panicked: {}", completer.id(), reason);
                    completer.complete(Err(BridgeError::OperationPanicked(reason).into()));
                }
            }
        });
        debug!("operation #{} scheduled on host generation {}", id, lease.generation);

        if !pending.wait_for(timeout) {
            let cancelled = match self.config().cancel_policy {
                CancelPolicy::Abort => {
                    task.abort();
                    pending.wait_for(self.config().cancel_grace);
                    match pending.state() {
                        OperationState::Abandoned => true,
                        OperationState::Pending => false,
                        OperationState::Succeeded | OperationState::Failed => {
                            warn!("operation #{} completed after its deadline", id);
                            false
                        }
                    }
                }
                CancelPolicy::Detach => false,
            };

            let elapsed = started.elapsed();
            warn!(
                "operation #{} timed out after {:?} (cancelled: {})",
                id, elapsed, cancelled
            );
            return Err(BridgeError::Timeout { elapsed, cancelled }.into());
        }

        match pending.take() {
            Some(Outcome::Value(value)) => Ok(value),
            Some(Outcome::Error(err)) => Err(err),
            Some(Outcome::Abandoned) | None => Err(BridgeError::HostUnavailable(format!(
                "operation #{id} was dropped before completing"
            ))
            .into()),
        }
    }

    /// [`run_blocking`](Self::run_blocking) with the configured default timeout.
    pub fn run_blocking_default<F, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<BridgeError> + Send + 'static,
    {
        self.run_blocking(operation, self.default_timeout())
    }

    pub fn ensure_running(&self) -> Result<HostLease, BridgeError> {
        self.coordinator.ensure_running()
    }

    pub fn shutdown(&self) {
        self.coordinator.shutdown();
    }

    pub fn close(&self) {
        self.coordinator.close();
    }

    pub fn is_running(&self) -> bool {
        self.coordinator.is_running()
    }

    pub fn generation(&self) -> u64 {
        self.coordinator.generation()
    }

    pub fn host_info(&self) -> Option<HostInfo> {
        self.coordinator.host_info()
    }
}
