//! Per-slug serialization of mutating operations
//!
//! Install, uninstall, load and unload for the same kind + slug never
//! interleave. The set is cheap to clone and shared between the installer
//! and the plugin loader. A [`SlugGuard`] can be handed from the installer
//! to the loader so that a compound operation (install then load, unload
//! then uninstall) runs under one acquisition.

use emporium_core::ExtensionKind;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as SlotMutex, OwnedMutexGuard};

type Slots = Arc<Mutex<HashMap<String, Arc<SlotMutex<()>>>>>;

#[derive(Debug, Clone, Default)]
pub struct SlugLocks {
    slots: Slots,
}

impl SlugLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `kind`/`slug`; released when the guard drops
    pub async fn lock(&self, kind: ExtensionKind, slug: &str) -> SlugGuard {
        let key = slot_key(kind, slug);
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(key.clone()).or_default().clone()
        };
        let guard = slot.lock_owned().await;
        SlugGuard {
            kind,
            slug: slug.to_string(),
            key,
            slots: self.slots.clone(),
            guard: Some(guard),
        }
    }

    /// Number of slugs currently locked or waited on
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn slot_key(kind: ExtensionKind, slug: &str) -> String {
    format!("{}/{}", kind, slug)
}

/// Exclusive hold on one kind + slug
///
/// Dropping it releases the slot and forgets it once nobody else is waiting.
pub struct SlugGuard {
    kind: ExtensionKind,
    slug: String,
    key: String,
    slots: Slots,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SlugGuard {
    pub fn kind(&self) -> ExtensionKind {
        self.kind
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }
}

impl Drop for SlugGuard {
    fn drop(&mut self) {
        // Release first so our own reference to the slot is gone
        self.guard.take();
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Waiters clone the slot under this same map lock, so a count of one
        // means only the map still refers to it
        if slots
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.key);
        }
    }
}

impl std::fmt::Debug for SlugGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlugGuard")
            .field("kind", &self.kind)
            .field("slug", &self.slug)
            .finish()
    }
}
