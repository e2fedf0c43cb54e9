//! Identity cache - per-model load state shared by a provider
//!
//! Entries are keyed by [`ModelHandle`]. Transitions happen under the
//! entry's shard lock; the lock is never held while the repository runs.

use dashmap::DashMap;

use crate::context::ModelHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPhase {
    #[default]
    Uninitialized,
    /// A load for this model is running
    Loading,
    Loaded,
    /// The caller supplied the value; no load until the key changes
    Overridden,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheEntry {
    pub phase: LoadPhase,
    /// Key the held value was loaded or supplied for
    pub last_key: Option<String>,
}

/// Outcome of [`IdentityCache::claim`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The caller must load; `previous` restores the entry if the load fails
    Load { previous: CacheEntry },
    /// The held value is current
    Cached,
    /// A load for this model is already in progress
    Busy,
}

#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: DashMap<ModelHandle, CacheEntry>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `handle` needs a load for `key`, and if so mark it loading
    ///
    /// A load is needed when the entry was never initialized or the key
    /// differs from the last one. With `always_reload` a loaded entry is
    /// reloaded even for the same key; an overridden one is not.
    pub fn claim(&self, handle: ModelHandle, key: &str, always_reload: bool) -> Claim {
        let mut entry = self.entries.entry(handle).or_default();
        let same_key = entry.last_key.as_deref() == Some(key);
        let needs_load = match entry.phase {
            LoadPhase::Loading => return Claim::Busy,
            LoadPhase::Uninitialized => true,
            LoadPhase::Loaded => !same_key || always_reload,
            LoadPhase::Overridden => !same_key,
        };
        if !needs_load {
            return Claim::Cached;
        }
        let previous = entry.clone();
        entry.phase = LoadPhase::Loading;
        entry.last_key = Some(key.to_string());
        Claim::Load { previous }
    }

    /// Mark a claimed load as done
    pub fn finish(&self, handle: ModelHandle) {
        if let Some(mut entry) = self.entries.get_mut(&handle) {
            entry.phase = LoadPhase::Loaded;
        }
    }

    /// Put back the state from before a failed load
    pub fn restore(&self, handle: ModelHandle, previous: CacheEntry) {
        self.entries.insert(handle, previous);
    }

    /// Record a manual override for the given key
    pub fn mark_overridden(&self, handle: ModelHandle, key: Option<String>) {
        self.entries.insert(
            handle,
            CacheEntry {
                phase: LoadPhase::Overridden,
                last_key: key,
            },
        );
    }

    /// Record that the held value matches what storage has for `key`
    pub fn settle(&self, handle: ModelHandle, key: Option<String>) {
        self.entries.insert(
            handle,
            CacheEntry {
                phase: LoadPhase::Loaded,
                last_key: key,
            },
        );
    }

    pub fn entry(&self, handle: ModelHandle) -> Option<CacheEntry> {
        self.entries.get(&handle).map(|entry| entry.value().clone())
    }

    pub fn phase(&self, handle: ModelHandle) -> LoadPhase {
        self.entry(handle).map(|entry| entry.phase).unwrap_or_default()
    }

    pub fn release(&self, handle: ModelHandle) {
        self.entries.remove(&handle);
    }

    /// Copy `from`'s state to `to`; a running load is copied as uninitialized
    pub fn fork(&self, from: ModelHandle, to: ModelHandle) {
        let Some(mut entry) = self.entry(from) else {
            return;
        };
        if entry.phase == LoadPhase::Loading {
            entry = CacheEntry::default();
        }
        self.entries.insert(to, entry);
    }

    /// Number of models with cached state
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntityConfig;
    use crate::context::EntityContext;

    fn handles(count: usize) -> Vec<ModelHandle> {
        let context = EntityContext::new();
        context.register_class(EntityConfig::new("blank")).unwrap();
        (0..count)
            .map(|_| context.create_model("blank").unwrap().handle())
            .collect()
    }

    #[test]
    fn test_loads_once_per_key() {
        let cache = IdentityCache::new();
        let h = handles(1)[0];

        assert!(matches!(cache.claim(h, "1", false), Claim::Load { .. }));
        assert_eq!(cache.claim(h, "1", false), Claim::Busy);
        cache.finish(h);
        assert_eq!(cache.claim(h, "1", false), Claim::Cached);
        assert!(matches!(cache.claim(h, "2", false), Claim::Load { .. }));
    }

    #[test]
    fn test_entries_are_isolated_per_handle() {
        let cache = IdentityCache::new();
        let hs = handles(2);
        assert!(matches!(cache.claim(hs[0], "1", false), Claim::Load { .. }));
        cache.finish(hs[0]);
        assert!(matches!(cache.claim(hs[1], "1", false), Claim::Load { .. }));
    }

    #[test]
    fn test_restore_after_failed_load() {
        let cache = IdentityCache::new();
        let h = handles(1)[0];
        let Claim::Load { previous } = cache.claim(h, "1", false) else {
            panic!("expected a load");
        };
        cache.restore(h, previous);
        assert_eq!(cache.phase(h), LoadPhase::Uninitialized);
        assert!(matches!(cache.claim(h, "1", false), Claim::Load { .. }));
    }

    #[test]
    fn test_override_sticks_until_key_changes() {
        let cache = IdentityCache::new();
        let h = handles(1)[0];
        cache.mark_overridden(h, Some("1".to_string()));
        assert_eq!(cache.claim(h, "1", true), Claim::Cached);
        assert!(matches!(cache.claim(h, "2", false), Claim::Load { .. }));
    }

    #[test]
    fn test_fresh_mode_always_reloads_loaded_entries() {
        let cache = IdentityCache::new();
        let h = handles(1)[0];
        cache.settle(h, Some("1".to_string()));
        assert!(matches!(cache.claim(h, "1", true), Claim::Load { .. }));
    }

    #[test]
    fn test_fork_and_release() {
        let cache = IdentityCache::new();
        let hs = handles(2);
        cache.settle(hs[0], Some("9".to_string()));
        cache.fork(hs[0], hs[1]);
        assert_eq!(cache.claim(hs[1], "9", false), Claim::Cached);

        cache.release(hs[0]);
        cache.release(hs[1]);
        assert!(cache.is_empty());
    }
}
