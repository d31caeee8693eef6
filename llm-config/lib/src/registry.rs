//! Tracks which storage keys have an open prompt.
//!
//! At most one prompt per key is open at a time. Claiming a key that already
//! has an open prompt disposes the older one; its handle stays valid but
//! ignores further events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use lazy_static::lazy_static;
use tracing::warn;

lazy_static! {
    static ref GLOBAL_REGISTRY: PromptRegistry = PromptRegistry::new();
}

/// Registry of open prompts keyed by storage key.
///
/// Cloning shares the same registry.
#[derive(Debug, Clone, Default)]
pub struct PromptRegistry {
    active: Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>,
}

impl PromptRegistry {
    /// Creates an empty, independent registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry used by flows that don't set one.
    pub fn global() -> Self {
        GLOBAL_REGISTRY.clone()
    }

    /// Registers a new prompt for `key`, disposing any prompt already open for it.
    pub fn claim(&self, key: &str) -> PromptLease {
        let disposed = Arc::new(AtomicBool::new(false));
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), Arc::clone(&disposed));

        if let Some(previous) = previous {
            warn!("Replacing open prompt for {:?}", key);
            previous.store(true, Ordering::SeqCst);
        }

        PromptLease {
            key: key.to_string(),
            disposed,
            registry: self.clone(),
        }
    }

    /// Returns `true` if a prompt is currently open for `key`.
    pub fn is_open(&self, key: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    fn release(&self, key: &str, disposed: &Arc<AtomicBool>) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.get(key).is_some_and(|current| Arc::ptr_eq(current, disposed)) {
            active.remove(key);
        }
    }
}

/// Proof that a prompt owns its storage key. Released on drop.
#[derive(Debug)]
pub struct PromptLease {
    key: String,
    disposed: Arc<AtomicBool>,
    registry: PromptRegistry,
}

impl PromptLease {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` once a newer prompt has claimed the key.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Gives up the key. Idempotent.
    pub fn release(&self) {
        self.registry.release(&self.key, &self.disposed);
    }
}

impl Drop for PromptLease {
    fn drop(&mut self) {
        self.release();
    }
}
