//! Process-wide cache of the tracked-groups listing.
//!
//! The listing changes only when a group is created, deleted, or has an
//! attribute written, so handlers invalidate explicitly on those paths and
//! every other read is served from memory.

use std::sync::{Arc, RwLock};

use waymark_forum::TrackedGroup;

/// Shared cache holding the last loaded tracked-groups listing.
#[derive(Clone, Debug, Default)]
pub struct TrackedGroupsCache {
    inner: Arc<RwLock<Option<Vec<TrackedGroup>>>>,
}

impl TrackedGroupsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached listing, or `None` when it needs a reload.
    pub fn get(&self) -> Option<Vec<TrackedGroup>> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(_) => {
                // A poisoned cache is treated as a miss; the next fill
                // heals it.
                tracing::error!("tracked-groups cache lock poisoned, treating as empty");
                None
            }
        }
    }

    /// Stores a freshly loaded listing.
    pub fn fill(&self, groups: Vec<TrackedGroup>) {
        match self.inner.write() {
            Ok(mut guard) => *guard = Some(groups),
            Err(poisoned) => *poisoned.into_inner() = Some(groups),
        }
    }

    /// Drops the cached listing so the next read reloads it.
    pub fn invalidate(&self) {
        match self.inner.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}
