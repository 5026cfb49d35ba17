//! The authoritative, insertion-ordered collection of desktop entries.
//!
//! `EntryStore` keeps one entry per filesystem location. Every mutation is
//! reported back to the caller as a single positioned change so the rendering
//! surface can apply it incrementally instead of reloading the grid.

use crate::desktop::entry::{Entry, EntryId, EntryIdentity};
use crate::desktop::metadata::MetadataResolver;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::Path;

/// A successful insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inserted {
    pub id: EntryId,
    /// Position of the new entry in display order.
    pub index: usize,
}

/// A successful removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removed {
    pub id: EntryId,
    /// Position the entry occupied before it was removed.
    pub index: usize,
}

/// Counters for debugging/monitoring.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EntryStoreStats {
    pub total_inserts: u64,
    pub total_removes: u64,
    /// Inserts dropped because the file could not be resolved.
    pub total_skipped: u64,
    /// Inserts dropped because the identity was already present.
    pub total_duplicates: u64,
}

pub struct EntryStore {
    resolver: MetadataResolver,
    /// Entries in arrival order.
    entries: IndexMap<EntryId, Entry>,
    by_identity: HashMap<EntryIdentity, EntryId>,
    next_id: u64,
    stats: EntryStoreStats,
}

impl EntryStore {
    pub fn new(resolver: MetadataResolver) -> Self {
        Self {
            resolver,
            entries: IndexMap::new(),
            by_identity: HashMap::new(),
            next_id: 1,
            stats: EntryStoreStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> &EntryStoreStats {
        &self.stats
    }

    /// Resolve `path` and append it as a new entry.
    ///
    /// Returns `None` without touching the store when an entry with the same
    /// identity already exists or when the file can no longer be read; both
    /// are expected races with the filesystem.
    pub fn insert(&mut self, path: &Path) -> Option<Inserted> {
        let identity = EntryIdentity::from(path);
        if self.by_identity.contains_key(&identity) {
            tracing::debug!("ignoring duplicate insert for {}", path.display());
            self.stats.total_duplicates += 1;
            return None;
        }

        let resolved = match self.resolver.resolve(path) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::debug!("skipping entry: {}", e);
                self.stats.total_skipped += 1;
                return None;
            }
        };

        let id = EntryId(self.next_id);
        self.next_id += 1;

        let entry = Entry {
            id,
            identity: identity.clone(),
            display_name: resolved.display_name,
            icon: resolved.icon,
            rendered_icon: resolved.rendered_icon,
            raw_metadata: resolved.raw_metadata,
            launch_descriptor: resolved.launch_descriptor,
        };

        let (index, _) = self.entries.insert_full(id, entry);
        self.by_identity.insert(identity, id);
        self.stats.total_inserts += 1;

        Some(Inserted { id, index })
    }

    /// Remove the entry for `path`, if there is one.
    pub fn remove_by_identity(&mut self, path: &Path) -> Option<Removed> {
        let id = self.by_identity.remove(&EntryIdentity::from(path))?;
        // shift_remove keeps the display order of the remaining entries.
        let (index, _, _) = self.entries.shift_remove_full(&id)?;
        self.stats.total_removes += 1;
        Some(Removed { id, index })
    }

    pub fn lookup(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.by_identity.contains_key(&EntryIdentity::from(path))
    }

    pub fn id_of(&self, path: &Path) -> Option<EntryId> {
        self.by_identity.get(&EntryIdentity::from(path)).copied()
    }

    /// Entries in display (arrival) order.
    pub fn snapshot(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.entries.values()
    }

    /// Get a summary of the store for debugging.
    pub fn debug_summary(&self) -> String {
        format!("EntryStore: {} entries, stats: {:?}", self.entries.len(), self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::icons::MemoryIconTheme;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn store() -> EntryStore {
        let theme = MemoryIconTheme::new(["text-x-generic"]);
        EntryStore::new(MetadataResolver::new(Arc::new(theme)).with_locale(None))
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, name).unwrap();
        path
    }

    fn names(store: &EntryStore) -> Vec<String> {
        store.snapshot().map(|e| e.display_name().to_string()).collect()
    }

    #[test]
    fn test_insert_and_lookup() {
        let temp = tempdir().unwrap();
        let path = touch(temp.path(), "a.txt");
        let mut store = store();

        let inserted = store.insert(&path).unwrap();
        assert_eq!(inserted.index, 0);
        let entry = store.lookup(inserted.id).unwrap();
        assert_eq!(entry.identity().path(), path.as_path());
        assert_eq!(entry.display_name(), "a.txt");
        assert!(store.contains(&path));
    }

    #[test]
    fn test_snapshot_preserves_arrival_order() {
        let temp = tempdir().unwrap();
        let mut store = store();
        for name in ["zeta.txt", "alpha.txt", "mid.txt"] {
            store.insert(&touch(temp.path(), name));
        }
        assert_eq!(names(&store), vec!["zeta.txt", "alpha.txt", "mid.txt"]);
    }

    #[test]
    fn test_duplicate_insert_is_rejected() {
        let temp = tempdir().unwrap();
        let path = touch(temp.path(), "a.txt");
        let mut store = store();

        assert!(store.insert(&path).is_some());
        assert!(store.insert(&path).is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().total_duplicates, 1);
    }

    #[test]
    fn test_insert_of_vanished_file_is_noop() {
        let temp = tempdir().unwrap();
        let mut store = store();

        assert!(store.insert(&temp.path().join("gone.txt")).is_none());
        assert!(store.is_empty());
        assert_eq!(store.stats().total_skipped, 1);
    }

    #[test]
    fn test_remove_reports_former_position() {
        let temp = tempdir().unwrap();
        let mut store = store();
        let a = touch(temp.path(), "a.txt");
        let b = touch(temp.path(), "b.txt");
        let c = touch(temp.path(), "c.txt");
        store.insert(&a);
        let b_id = store.insert(&b).unwrap().id;
        store.insert(&c);

        let removed = store.remove_by_identity(&b).unwrap();
        assert_eq!(removed, Removed { id: b_id, index: 1 });
        assert_eq!(names(&store), vec!["a.txt", "c.txt"]);
        assert!(store.lookup(b_id).is_none());
    }

    #[test]
    fn test_remove_absent_identity_is_noop() {
        let temp = tempdir().unwrap();
        let mut store = store();
        store.insert(&touch(temp.path(), "a.txt"));

        assert!(store.remove_by_identity(&temp.path().join("nope.txt")).is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().total_removes, 0);
    }

    #[test]
    fn test_remove_works_after_file_is_gone() {
        let temp = tempdir().unwrap();
        let path = touch(temp.path(), "a.txt");
        let mut store = store();
        store.insert(&path);
        fs::remove_file(&path).unwrap();

        assert!(store.remove_by_identity(&path).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_identity_unique_under_mixed_operations() {
        let temp = tempdir().unwrap();
        let paths: Vec<_> = (0..4)
            .map(|i| touch(temp.path(), &format!("f{i}.txt")))
            .collect();
        let mut store = store();

        // Deterministic interleaving of inserts and removes, duplicates included.
        let ops: [(bool, usize); 12] = [
            (true, 0),
            (true, 1),
            (true, 0),
            (false, 2),
            (true, 2),
            (true, 2),
            (false, 0),
            (true, 0),
            (true, 3),
            (false, 3),
            (false, 3),
            (true, 1),
        ];
        for (insert, i) in ops {
            if insert {
                store.insert(&paths[i]);
            } else {
                store.remove_by_identity(&paths[i]);
            }
            let mut seen = std::collections::HashSet::new();
            for entry in store.snapshot() {
                assert!(seen.insert(entry.identity().clone()));
            }
        }
        assert_eq!(names(&store), vec!["f1.txt", "f2.txt", "f0.txt"]);
    }

    #[test]
    fn test_reinserted_identity_gets_fresh_id() {
        let temp = tempdir().unwrap();
        let path = touch(temp.path(), "a.txt");
        let mut store = store();

        let first = store.insert(&path).unwrap().id;
        store.remove_by_identity(&path);
        let second = store.insert(&path).unwrap().id;
        assert_ne!(first, second);
    }
}
