//! Background execution host and its lifecycle coordinator
//!
//! The host is a current-thread tokio runtime driven by a dedicated OS thread.
//! It runs until told to stop, so tasks spawned through its handle keep making
//! progress between synchronous calls.

use crate::bridge::BridgeError;
use crate::config::BridgeConfig;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Bound on how long a stopping host waits for its blocking-pool threads.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

/// Diagnostic snapshot of a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub generation: u64,
    pub thread_name: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub running: bool,
}

/// What a caller needs to schedule work onto the running host.
#[derive(Debug, Clone)]
pub struct HostLease {
    pub handle: Handle,
    pub generation: u64,
    pub thread_id: ThreadId,
}

struct ExecutionHost {
    generation: u64,
    thread_name: String,
    handle: Handle,
    thread: Option<JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    started_at: DateTime<Utc>,
}

impl ExecutionHost {
    /// Spawns the host thread and waits for it to report readiness.
    fn start(config: &BridgeConfig, generation: u64) -> Result<Self, BridgeError> {
        let thread_name = format!("{}-{}", config.thread_name, generation);
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<Handle, String>>(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || host_main(ready_tx, shutdown_rx))
            .map_err(|e| BridgeError::Startup(format!("failed to spawn host thread: {e}")))?;

        match ready_rx.recv_timeout(config.startup_timeout) {
            Ok(Ok(handle)) => {
                info!("🚀 execution host started: {}", thread_name);
                Ok(Self {
                    generation,
                    thread_name,
                    handle,
                    thread: Some(thread),
                    shutdown_tx: Some(shutdown_tx),
                    started_at: Utc::now(),
                })
            }
            Ok(Err(reason)) => {
                let _ = thread.join();
                error!("execution host {} failed to build runtime: {}", thread_name, reason);
                Err(BridgeError::Startup(reason))
            }
            Err(RecvTimeoutError::Timeout) => {
                // Dropping the sender makes a late host exit as soon as it starts.
                drop(shutdown_tx);
                warn!(
                    "execution host {} not ready within {:?}, abandoning it",
                    thread_name, config.startup_timeout
                );
                Err(BridgeError::Startup(format!(
                    "host not ready within {:?}",
                    config.startup_timeout
                )))
            }
            Err(RecvTimeoutError::Disconnected) => {
                let reason = join_reason(thread);
                error!("execution host {} died during startup: {}", thread_name, reason);
                Err(BridgeError::Startup(reason))
            }
        }
    }

    fn lease(&self) -> Option<HostLease> {
        let thread = self.thread.as_ref()?;
        Some(HostLease {
            handle: self.handle.clone(),
            generation: self.generation,
            thread_id: thread.thread().id(),
        })
    }

    /// True when the thread exited without a shutdown request.
    fn has_crashed(&self) -> bool {
        self.shutdown_tx.is_some() && self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    fn stop(&mut self) -> Option<String> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let thread = self.thread.take()?;
        if thread.thread().id() == thread::current().id() {
            // 호스트 스레드 안에서는 자기 자신을 join 할 수 없으므로 분리만 함
            debug!("execution host {} stopping from its own thread, detaching", self.thread_name);
            return None;
        }
        match thread.join() {
            Ok(()) => None,
            Err(panic) => Some(panic_message(&panic)),
        }
    }

    fn info(&self, running: bool, stopped_at: Option<DateTime<Utc>>) -> HostInfo {
        HostInfo {
            generation: self.generation,
            thread_name: self.thread_name.clone(),
            started_at: self.started_at,
            stopped_at,
            running,
        }
    }
}

fn host_main(ready_tx: mpsc::SyncSender<Result<Handle, String>>, shutdown_rx: oneshot::Receiver<()>) {
    let runtime = match Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("failed to build runtime: {e}")));
            return;
        }
    };

    if ready_tx.send(Ok(runtime.handle().clone())).is_err() {
        return;
    }

    // Resolves on an explicit stop or when the coordinator drops the sender.
    runtime.block_on(async {
        let _ = shutdown_rx.await;
    });

    // Tasks still scheduled are dropped here, which wakes their waiters.
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    debug!("execution host runtime dropped");
}

fn join_reason(thread: JoinHandle<()>) -> String {
    match thread.join() {
        Ok(()) => "host thread exited".to_string(),
        Err(panic) => panic_message(&panic),
    }
}

pub(crate) fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[derive(Default)]
struct HostSlot {
    host: Option<ExecutionHost>,
    last: Option<HostInfo>,
    closed: bool,
}

/// Owns the single execution host of one client.
///
/// The slot mutex is held across startup and shutdown, so racing callers can
/// never bring up two hosts at once.
pub struct LifecycleCoordinator {
    config: BridgeConfig,
    slot: Mutex<HostSlot>,
    generation: AtomicU64,
}

impl LifecycleCoordinator {
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        Ok(Self {
            config,
            slot: Mutex::new(HostSlot::default()),
            generation: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Starts the host if needed and returns a lease on it.
    ///
    /// A host that died on its own is reported once as `HostCrashed`; the next
    /// call starts a fresh one.
    pub fn ensure_running(&self) -> Result<HostLease, BridgeError> {
        let mut slot = self.slot.lock();

        if slot.closed {
            return Err(BridgeError::Closed);
        }

        if let Some(host) = slot.host.as_mut() {
            if !host.has_crashed() {
                if let Some(lease) = host.lease() {
                    return Ok(lease);
                }
            }

            let reason = host
                .stop()
                .unwrap_or_else(|| "host thread exited unexpectedly".to_string());
            error!("execution host {} crashed: {}", host.thread_name, reason);
            let info = host.info(false, Some(Utc::now()));
            slot.host = None;
            slot.last = Some(info);
            return Err(BridgeError::HostCrashed(reason));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let host = ExecutionHost::start(&self.config, generation)?;
        let lease = host
            .lease()
            .ok_or_else(|| BridgeError::Startup("host thread handle missing".to_string()))?;
        slot.host = Some(host);
        Ok(lease)
    }

    /// Stops the host if running and joins its thread. Idempotent.
    pub fn shutdown(&self) {
        let mut slot = self.slot.lock();
        Self::stop_locked(&mut slot);
    }

    /// Shuts down and refuses any later restart.
    pub fn close(&self) {
        let mut slot = self.slot.lock();
        Self::stop_locked(&mut slot);
        if !slot.closed {
            slot.closed = true;
            debug!("lifecycle coordinator closed");
        }
    }

    fn stop_locked(slot: &mut HostSlot) {
        let Some(mut host) = slot.host.take() else {
            return;
        };

        if let Some(reason) = host.stop() {
            warn!("execution host {} panicked while stopping: {}", host.thread_name, reason);
        }
        info!("✅ execution host stopped: {}", host.thread_name);
        slot.last = Some(host.info(false, Some(Utc::now())));
    }

    pub fn is_running(&self) -> bool {
        self.slot
            .lock()
            .host
            .as_ref()
            .map_or(false, |host| !host.has_crashed())
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    /// Number of hosts started so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Current host if one is running, otherwise the last one that stopped.
    pub fn host_info(&self) -> Option<HostInfo> {
        let slot = self.slot.lock();
        match slot.host.as_ref() {
            Some(host) => Some(host.info(!host.has_crashed(), None)),
            None => slot.last.clone(),
        }
    }
}

impl Drop for LifecycleCoordinator {
    fn drop(&mut self) {
        Self::stop_locked(self.slot.get_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn coordinator() -> LifecycleCoordinator {
        LifecycleCoordinator::new(BridgeConfig::default().with_thread_name("host-test")).unwrap()
    }

    #[test]
    fn test_lazy_start() {
        let coordinator = coordinator();
        assert!(!coordinator.is_running());
        assert_eq!(coordinator.generation(), 0);
        assert!(coordinator.host_info().is_none());

        let lease = coordinator.ensure_running().unwrap();
        assert_eq!(lease.generation, 1);
        assert!(coordinator.is_running());
    }

    #[test]
    fn test_ensure_running_is_idempotent() {
        let coordinator = coordinator();
        let first = coordinator.ensure_running().unwrap();
        let second = coordinator.ensure_running().unwrap();

        assert_eq!(first.thread_id, second.thread_id);
        assert_eq!(coordinator.generation(), 1);
    }

    #[test]
    fn test_concurrent_start_creates_one_host() {
        let coordinator = Arc::new(coordinator());
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    coordinator.ensure_running().unwrap().thread_id
                })
            })
            .collect();

        let ids: Vec<ThreadId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(coordinator.generation(), 1);
    }

    #[test]
    fn test_shutdown_before_start_is_noop() {
        let coordinator = coordinator();
        coordinator.shutdown();
        coordinator.shutdown();
        assert!(!coordinator.is_running());
        assert_eq!(coordinator.generation(), 0);
    }

    #[test]
    fn test_restart_after_shutdown() {
        let coordinator = coordinator();
        let first = coordinator.ensure_running().unwrap();
        coordinator.shutdown();
        assert!(!coordinator.is_running());

        let info = coordinator.host_info().unwrap();
        assert!(!info.running);
        assert!(info.stopped_at.is_some());

        let second = coordinator.ensure_running().unwrap();
        assert_ne!(first.thread_id, second.thread_id);
        assert_eq!(second.generation, 2);
    }

    #[test]
    fn test_close_is_permanent() {
        let coordinator = coordinator();
        coordinator.ensure_running().unwrap();
        coordinator.close();
        coordinator.close();

        assert!(coordinator.is_closed());
        assert_eq!(coordinator.ensure_running().unwrap_err(), BridgeError::Closed);
    }

    #[test]
    fn test_host_thread_name() {
        let coordinator = coordinator();
        coordinator.ensure_running().unwrap();
        let info = coordinator.host_info().unwrap();
        assert_eq!(info.thread_name, "host-test-1");
        assert!(info.running);
    }
}
