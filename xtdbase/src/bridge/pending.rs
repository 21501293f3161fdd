//! One-shot completion slot shared by a waiting caller and its scheduled operation.
//!
//! The host side holds a [`Completer`], the caller side holds a
//! [`PendingOperation`] and blocks on it. The slot is signaled exactly once:
//! the first terminal outcome wins, later ones are ignored. Dropping the
//! completer without resolving marks the operation abandoned, which wakes the
//! caller immediately instead of leaving it blocked until its deadline.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Observable state of a pending operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Succeeded,
    Failed,
    /// Dropped by the host without an outcome (cancelled, or host torn down).
    Abandoned,
}

impl OperationState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OperationState::Pending)
    }
}

/// What a waiter gets back once it consumes the slot.
#[derive(Debug)]
pub enum Outcome<T, E> {
    Value(T),
    Error(E),
    Abandoned,
}

enum Slot<T, E> {
    Pending,
    Succeeded(T),
    Failed(E),
    Abandoned,
    Consumed(OperationState),
}

impl<T, E> Slot<T, E> {
    fn state(&self) -> OperationState {
        match self {
            Slot::Pending => OperationState::Pending,
            Slot::Succeeded(_) => OperationState::Succeeded,
            Slot::Failed(_) => OperationState::Failed,
            Slot::Abandoned => OperationState::Abandoned,
            Slot::Consumed(state) => *state,
        }
    }
}

struct Shared<T, E> {
    slot: Mutex<Slot<T, E>>,
    signal: Condvar,
}

/// Creates a connected completer / pending-operation pair.
pub fn pending_operation<T, E>(id: u64) -> (Completer<T, E>, PendingOperation<T, E>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Pending),
        signal: Condvar::new(),
    });

    (
        Completer {
            id,
            shared: shared.clone(),
        },
        PendingOperation { id, shared },
    )
}

/// Host-side half. Resolves the operation exactly once.
pub struct Completer<T, E> {
    id: u64,
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Completer<T, E> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Records the outcome and wakes the waiter. Returns `false` when the slot
    /// was already terminal, in which case `result` is discarded.
    pub fn complete(&self, result: Result<T, E>) -> bool {
        match result {
            Ok(value) => self.resolve(Slot::Succeeded(value)),
            Err(err) => self.resolve(Slot::Failed(err)),
        }
    }

    fn resolve(&self, next: Slot<T, E>) -> bool {
        let mut slot = self.shared.slot.lock();
        if slot.state().is_terminal() {
            return false;
        }
        *slot = next;
        drop(slot);
        self.shared.signal.notify_all();
        true
    }
}

impl<T, E> Drop for Completer<T, E> {
    fn drop(&mut self) {
        self.resolve(Slot::Abandoned);
    }
}

/// Caller-side half: the wait handle of one in-flight operation.
pub struct PendingOperation<T, E> {
    id: u64,
    shared: Arc<Shared<T, E>>,
}

impl<T, E> PendingOperation<T, E> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> OperationState {
        self.shared.slot.lock().state()
    }

    /// Blocks until the slot is signaled or `timeout` elapses.
    /// Returns `true` if the slot is terminal on return.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    /// Blocks until the slot is signaled or `deadline` passes. Waiting again
    /// after the signal returns immediately.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut slot = self.shared.slot.lock();
        while !slot.state().is_terminal() {
            if self.shared.signal.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        slot.state().is_terminal()
    }

    /// Takes the outcome out of the slot. `None` while still pending or once
    /// the outcome has already been taken.
    pub fn take(&self) -> Option<Outcome<T, E>> {
        let mut slot = self.shared.slot.lock();
        let state = slot.state();
        match std::mem::replace(&mut *slot, Slot::Consumed(state)) {
            Slot::Succeeded(value) => Some(Outcome::Value(value)),
            Slot::Failed(err) => Some(Outcome::Error(err)),
            Slot::Abandoned => Some(Outcome::Abandoned),
            previous @ (Slot::Pending | Slot::Consumed(_)) => {
                *slot = previous;
                None
            }
        }
    }
}
