use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use derive_more::{AsRef, From, Into};
use the_newtype::Newtype;

use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::with_tokio::tokio::sync::{Mutex, RwLock};

use crate::types::PairwiseError;

/// Handle is an opaque reference to a live pairwise object
///
/// Values are unique within a [`Registry`] and never reused while the registry lives.
/// A handle value of `0` is never issued.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Newtype, From, Into, AsRef,
)]
#[serde(crate = "self::serde")]
pub struct Handle(u32);

static NEXT_HANDLE: AtomicU32 = AtomicU32::new(1);

fn allocate(counter: &AtomicU32) -> Result<Handle, PairwiseError> {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| next.checked_add(1))
        .map(Handle)
        .map_err(|_| PairwiseError::HandlesExhausted)
}

/// Registry owns every live object of one kind
///
/// Handles come from one process wide counter, a connection and a credential never share
/// a handle value. Lookups clone the object's `Arc<Mutex<_>>` out of the map and release the map lock
/// before the object is locked, so two object locks are never held by one lookup.
/// Cloning a registry shares the same underlying map.
#[derive(Debug)]
pub struct Registry<T> {
    objects: Arc<RwLock<HashMap<Handle, Arc<Mutex<T>>>>>,
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            objects: self.objects.clone(),
        }
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a new object, fails once the handle space is used up
    pub async fn insert(&self, object: T) -> Result<Handle, PairwiseError> {
        let handle = allocate(&NEXT_HANDLE)?;
        let mut objects = self.objects.write().await;
        objects.insert(handle, Arc::new(Mutex::new(object)));
        Ok(handle)
    }

    pub async fn get(&self, handle: Handle) -> Result<Arc<Mutex<T>>, PairwiseError> {
        let objects = self.objects.read().await;
        objects
            .get(&handle)
            .cloned()
            .ok_or(PairwiseError::InvalidHandle(handle.0))
    }

    pub async fn contains(&self, handle: Handle) -> bool {
        self.objects.read().await.contains_key(&handle)
    }

    pub async fn remove(&self, handle: Handle) -> Result<Arc<Mutex<T>>, PairwiseError> {
        let mut objects = self.objects.write().await;
        objects
            .remove(&handle)
            .ok_or(PairwiseError::InvalidHandle(handle.0))
    }

    /// Snapshot of the live handles, in ascending order
    pub async fn handles(&self) -> Vec<Handle> {
        let objects = self.objects.read().await;
        let mut handles: Vec<Handle> = objects.keys().copied().collect();
        handles.sort_by_key(|handle| handle.0);
        handles
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

impl<T: Clone> Registry<T> {
    /// Runs a read only closure against the object under its lock
    pub async fn read<R, F>(&self, handle: Handle, reader: F) -> Result<R, PairwiseError>
    where
        F: FnOnce(&T) -> Result<R, PairwiseError>,
    {
        let object = self.get(handle).await?;
        let guard = object.lock().await;
        reader(&guard)
    }

    pub async fn snapshot(&self, handle: Handle) -> Result<T, PairwiseError> {
        self.read(handle, |object| Ok(object.clone())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    use rst_common::with_tokio::tokio;

    #[tokio::test]
    async fn test_insert_and_get() {
        let registry: Registry<String> = Registry::new();
        let handle = registry.insert("alice".to_string()).await.unwrap();
        assert!(u32::from(handle) >= 1);

        let object = registry.get(handle).await;
        assert!(object.is_ok());
        assert_eq!(*object.unwrap().lock().await, "alice".to_string());

        let snapshot = registry.snapshot(handle).await;
        assert_eq!(snapshot.unwrap(), "alice".to_string())
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let registry: Registry<String> = Registry::new();
        let result = registry.get(Handle::from(99)).await;
        assert!(result.is_err());
        assert_eq!(result.unwrap_err(), PairwiseError::InvalidHandle(99))
    }

    #[tokio::test]
    async fn test_remove_invalidates_handle() {
        let registry: Registry<String> = Registry::new();
        let handle = registry.insert("alice".to_string()).await.unwrap();

        let removed = registry.remove(handle).await;
        assert!(removed.is_ok());

        let again = registry.remove(handle).await;
        assert!(matches!(again, Err(PairwiseError::InvalidHandle(_))));
        assert!(!registry.contains(handle).await);

        let next = registry.insert("bob".to_string()).await.unwrap();
        assert_ne!(handle, next)
    }

    #[tokio::test]
    async fn test_handles_unique_across_registries() {
        let connections: Registry<String> = Registry::new();
        let credentials: Registry<u32> = Registry::new();

        let first = connections.insert("alice".to_string()).await.unwrap();
        let second = credentials.insert(1).await.unwrap();
        assert_ne!(first, second);
        assert!(!connections.contains(second).await);
        assert!(!credentials.contains(first).await)
    }

    #[tokio::test]
    async fn test_parallel_inserts_are_unique() {
        let registry: Registry<u32> = Registry::new();
        let mut tasks = Vec::new();

        for i in 0..50 {
            let cloned = registry.clone();
            tasks.push(tokio::spawn(async move { cloned.insert(i).await }));
        }

        let mut handles = HashSet::new();
        for task in tasks {
            handles.insert(task.await.unwrap().unwrap());
        }

        assert_eq!(handles.len(), 50);
        assert_eq!(registry.len().await, 50);
        assert_eq!(registry.handles().await.len(), 50)
    }

    #[test]
    fn test_allocate_stops_at_upper_bound() {
        let counter = AtomicU32::new(u32::MAX - 1);
        assert_eq!(allocate(&counter), Ok(Handle::from(u32::MAX - 1)));

        let exhausted = allocate(&counter);
        assert_eq!(exhausted, Err(PairwiseError::HandlesExhausted));
        assert_eq!(counter.load(Ordering::SeqCst), u32::MAX)
    }
}
