//! SIGINT/SIGTERM handling for foreground runs.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

use crate::core::errors::{GuardError, Result};

/// Set once a termination signal arrives.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    requested: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// Register SIGINT and SIGTERM handlers that raise the flag.
    pub fn register() -> Result<Self> {
        let flag = Self::default();
        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register(signal, Arc::clone(&flag.requested)).map_err(|err| {
                GuardError::Runtime {
                    details: format!("failed to register handler for signal {signal}: {err}"),
                }
            })?;
        }
        Ok(flag)
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Raise the flag without a signal, e.g. when the input stream ends.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }
}
