// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-preview mutual exclusion.

use crate::preview::PreviewIdentity;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Async lock per `PreviewIdentity`, shared by the workers and the stale
/// cleaner so no two stages touch the same preview at once.
#[derive(Clone, Default)]
pub struct IdentityLocks {
    inner: Arc<Mutex<HashMap<PreviewIdentity, Arc<AsyncMutex<()>>>>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `identity`
    pub async fn acquire(&self, identity: &PreviewIdentity) -> OwnedMutexGuard<()> {
        self.lock_for(identity).lock_owned().await
    }

    /// Exclusive access to `identity`, or `None` while someone else holds it
    pub fn try_acquire(&self, identity: &PreviewIdentity) -> Option<OwnedMutexGuard<()>> {
        self.lock_for(identity).try_lock_owned().ok()
    }

    fn lock_for(&self, identity: &PreviewIdentity) -> Arc<AsyncMutex<()>> {
        let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        // Entries nobody holds or waits on any more
        table.retain(|key, lock| key == identity || Arc::strong_count(lock) > 1);
        table.entry(identity.clone()).or_default().clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}
