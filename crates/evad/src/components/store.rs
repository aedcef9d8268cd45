//! Id-keyed state shared by a component's handlers.
//!
//! The store wraps the `RwLock<HashMap<..>>` pattern and its poisoning so
//! handlers only see [`ComponentError::Internal`] when a writer panicked.
//! Every mutation happens inside one closure under the write lock, which keeps
//! a rejected or aborted request from leaving half-applied state behind.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use super::ComponentError;

/// Registry of component-owned entries keyed by generated ids.
#[derive(Debug)]
pub(crate) struct ComponentStore<T> {
    prefix: &'static str,
    entries: RwLock<HashMap<String, T>>,
}

impl<T> ComponentStore<T> {
    /// Creates an empty store whose ids start with `prefix`.
    pub(crate) fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Stores `value` under a fresh id and returns the id.
    pub(crate) fn insert(&self, value: T) -> Result<String, ComponentError> {
        let id = format!("{}_{}", self.prefix, Uuid::new_v4().simple());
        self.write()?.insert(id.clone(), value);
        Ok(id)
    }

    /// Returns whether `id` is present.
    pub(crate) fn contains(&self, id: &str) -> Result<bool, ComponentError> {
        Ok(self.read()?.contains_key(id))
    }

    /// Runs `f` against the entry for `id` under the read lock.
    pub(crate) fn inspect<R>(
        &self,
        id: &str,
        f: impl FnOnce(&T) -> R,
    ) -> Result<Option<R>, ComponentError> {
        Ok(self.read()?.get(id).map(f))
    }

    /// Runs `f` against the entry for `id` under the write lock.
    ///
    /// Returns `Ok(None)` when the id is unknown; `f` is not called.
    pub(crate) fn update<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<Option<R>, ComponentError> {
        Ok(self.write()?.get_mut(id).map(f))
    }

    /// Number of stored entries.
    #[cfg(test)]
    pub(crate) fn len(&self) -> Result<usize, ComponentError> {
        Ok(self.read()?.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, T>>, ComponentError> {
        self.entries
            .read()
            .map_err(|_| ComponentError::internal(format!("{} store lock poisoned", self.prefix)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, T>>, ComponentError> {
        self.entries
            .write()
            .map_err(|_| ComponentError::internal(format!("{} store lock poisoned", self.prefix)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn store() -> ComponentStore<u32> {
        ComponentStore::new("model")
    }

    #[rstest]
    fn insert_generates_prefixed_unique_ids(store: ComponentStore<u32>) {
        let first = store.insert(1).expect("insert first");
        let second = store.insert(2).expect("insert second");
        assert!(first.starts_with("model_"));
        assert_ne!(first, second);
        assert_eq!(store.len().expect("len"), 2);
    }

    #[rstest]
    fn update_mutates_existing_entries(store: ComponentStore<u32>) {
        let id = store.insert(10).expect("insert");
        let updated = store
            .update(&id, |value| {
                *value += 5;
                *value
            })
            .expect("update");
        assert_eq!(updated, Some(15));
        assert_eq!(store.inspect(&id, |value| *value).expect("inspect"), Some(15));
    }

    #[rstest]
    fn unknown_ids_are_reported_as_absent(store: ComponentStore<u32>) {
        assert!(!store.contains("model_missing").expect("contains"));
        let result = store.update("model_missing", |value| *value).expect("update");
        assert_eq!(result, None);
    }

    #[test]
    fn poisoned_lock_surfaces_internal_error() {
        let store = Arc::new(ComponentStore::<u32>::new("network"));
        let id = store.insert(1).expect("insert");
        let poisoner = Arc::clone(&store);
        let poison_id = id.clone();
        let joined = thread::spawn(move || {
            let _ = poisoner.update::<()>(&poison_id, |_| panic!("poison the lock"));
        })
        .join();
        assert!(joined.is_err(), "writer thread should panic");

        let error = store.contains(&id).expect_err("lock should be poisoned");
        assert!(matches!(error, ComponentError::Internal { .. }));
    }
}
