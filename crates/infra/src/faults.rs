//! Fault injection for the in-memory backends.
//!
//! Lets tests reproduce the partial-failure states of the provisioning saga by
//! making a chosen backend operation fail or stall.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Fault {
    error: Option<String>,
    delay: Option<Duration>,
    once: bool,
}

/// Per-operation failure and latency table.
#[derive(Debug)]
pub struct FaultInjector<Op> {
    faults: Mutex<HashMap<Op, Fault>>,
}

impl<Op> Default for FaultInjector<Op> {
    fn default() -> Self {
        Self {
            faults: Mutex::new(HashMap::new()),
        }
    }
}

impl<Op: Copy + Eq + Hash> FaultInjector<Op> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call of `op` with `message` until cleared.
    pub fn fail_on(&self, op: Op, message: impl Into<String>) {
        self.set(
            op,
            Fault {
                error: Some(message.into()),
                delay: None,
                once: false,
            },
        );
    }

    /// Fail only the next call of `op`.
    pub fn fail_once(&self, op: Op, message: impl Into<String>) {
        self.set(
            op,
            Fault {
                error: Some(message.into()),
                delay: None,
                once: true,
            },
        );
    }

    /// Stall every call of `op` for `delay` before it runs.
    pub fn delay_on(&self, op: Op, delay: Duration) {
        self.set(
            op,
            Fault {
                error: None,
                delay: Some(delay),
                once: false,
            },
        );
    }

    pub fn clear(&self, op: Op) {
        self.lock().remove(&op);
    }

    pub fn clear_all(&self) {
        self.lock().clear();
    }

    /// Apply whatever fault is registered for `op`.
    ///
    /// Returns the injected error message, if any. The lock is released before
    /// sleeping.
    pub async fn check(&self, op: Op) -> Result<(), String> {
        let fault = {
            let mut faults = self.lock();
            let fault = faults.get(&op).cloned();
            if fault.as_ref().is_some_and(|f| f.once) {
                faults.remove(&op);
            }
            fault
        };

        let Some(fault) = fault else {
            return Ok(());
        };
        if let Some(delay) = fault.delay {
            tokio::time::sleep(delay).await;
        }
        match fault.error {
            Some(message) => Err(message),
            None => Ok(()),
        }
    }

    fn set(&self, op: Op, fault: Fault) {
        self.lock().insert(op, fault);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Op, Fault>> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
