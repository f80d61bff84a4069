//! Key Allocator
//!
//! Maps a desired filename onto a key that does not yet exist in the
//! user's namespace, appending ` (n)` before the extension on collision.
//!
//! The returned key was absent when checked. Two concurrent allocations of
//! the same name can both observe absence; writers that need a hard
//! guarantee go through [`super::Namespace::upload`], which finishes with a
//! conditional put.

use std::sync::Arc;

use tracing::{debug, warn};

use super::key::{sanitize_name, split_name, ObjectKey, UserId};
use crate::error::{Error, Result};
use crate::store::ObjectStore;

/// Collision-resolving key allocator
pub struct KeyAllocator {
    store: Arc<dyn ObjectStore>,
    max_attempts: u32,
}

impl KeyAllocator {
    /// Create an allocator probing `store`, giving up after `max_attempts`
    pub fn new(store: Arc<dyn ObjectStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Allocate a key for `desired` under the user's prefix
    pub async fn allocate(&self, user: &UserId, desired: &str) -> Result<ObjectKey> {
        let (key, _) = self.allocate_from(user, desired, 0).await?;
        Ok(key)
    }

    /// Allocate starting at a given attempt index
    ///
    /// Returns the key together with the attempt that produced it, so a
    /// caller that loses a write race can resume at the next index.
    pub async fn allocate_from(
        &self,
        user: &UserId,
        desired: &str,
        first_attempt: u32,
    ) -> Result<(ObjectKey, u32)> {
        let name = sanitize_name(desired)?;
        let (base, ext) = split_name(name);

        for attempt in first_attempt..self.max_attempts {
            let key = ObjectKey::candidate(user, base, ext, attempt);

            let existing = self.store.head(key.as_str()).await.map_err(|e| {
                Error::Allocation(format!("existence check for {} failed: {}", key, e))
            })?;

            if existing.is_none() {
                debug!("Allocated {} after {} check(s)", key, attempt - first_attempt + 1);
                return Ok((key, attempt));
            }
        }

        warn!(
            "Key space exhausted for {:?} in namespace {} ({} attempts)",
            name, user, self.max_attempts
        );
        Err(Error::AllocationExhausted {
            name: name.to_string(),
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ListPage, MemoryStore, ObjectMeta};
    use async_trait::async_trait;
    use bytes::Bytes;

    fn user() -> UserId {
        UserId::parse("u").unwrap()
    }

    async fn store_with(keys: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new("test"));
        for key in keys {
            store.put(key, Bytes::new(), "").await.unwrap();
        }
        store
    }

    /// Store whose every call fails
    struct BrokenStore;

    #[async_trait]
    impl ObjectStore for BrokenStore {
        async fn put(&self, _key: &str, _body: Bytes, _content_type: &str) -> Result<()> {
            Err(Error::StoreUnavailable("connection refused".into()))
        }

        async fn head(&self, _key: &str) -> Result<Option<ObjectMeta>> {
            Err(Error::StoreUnavailable("connection refused".into()))
        }

        async fn list_page(&self, _prefix: &str, _continuation: Option<String>) -> Result<ListPage> {
            Err(Error::StoreUnavailable("connection refused".into()))
        }

        fn bucket(&self) -> &str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_first_attempt_is_plain_name() {
        let allocator = KeyAllocator::new(store_with(&["u/"]).await, 100);
        let key = allocator.allocate(&user(), "report.pdf").await.unwrap();
        assert_eq!(key.as_str(), "u/report.pdf");
    }

    #[tokio::test]
    async fn test_collisions_resolve_deterministically() {
        let store = store_with(&["u/report.pdf", "u/report (1).pdf"]).await;
        let allocator = KeyAllocator::new(store, 100);

        let key = allocator.allocate(&user(), "report.pdf").await.unwrap();
        assert_eq!(key.as_str(), "u/report (2).pdf");
    }

    #[tokio::test]
    async fn test_sequential_allocations_are_unique_once_written() {
        let store = store_with(&[]).await;
        let allocator = KeyAllocator::new(store.clone(), 100);

        let first = allocator.allocate(&user(), "notes.txt").await.unwrap();
        store.put(first.as_str(), Bytes::new(), "").await.unwrap();
        let second = allocator.allocate(&user(), "notes.txt").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(second.as_str(), "u/notes (1).txt");
    }

    #[tokio::test]
    async fn test_empty_base_falls_back() {
        let allocator = KeyAllocator::new(store_with(&[]).await, 100);
        let key = allocator.allocate(&user(), ".gitignore").await.unwrap();
        assert_eq!(key.as_str(), "u/file.gitignore");
    }

    #[tokio::test]
    async fn test_other_namespaces_do_not_collide() {
        let allocator = KeyAllocator::new(store_with(&["v/report.pdf"]).await, 100);
        let key = allocator.allocate(&user(), "report.pdf").await.unwrap();
        assert_eq!(key.as_str(), "u/report.pdf");
    }

    #[tokio::test]
    async fn test_attempt_cap() {
        let store = store_with(&["u/a.txt", "u/a (1).txt"]).await;
        let allocator = KeyAllocator::new(store, 2);

        match allocator.allocate(&user(), "a.txt").await {
            Err(Error::AllocationExhausted { name, attempts }) => {
                assert_eq!(name, "a.txt");
                assert_eq!(attempts, 2);
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resume_from_attempt() {
        let allocator = KeyAllocator::new(store_with(&[]).await, 100);
        let (key, attempt) = allocator.allocate_from(&user(), "a.txt", 3).await.unwrap();
        assert_eq!(key.as_str(), "u/a (3).txt");
        assert_eq!(attempt, 3);
    }

    #[tokio::test]
    async fn test_existence_check_failure_propagates() {
        let allocator = KeyAllocator::new(Arc::new(BrokenStore), 100);
        let result = allocator.allocate(&user(), "a.txt").await;
        assert!(matches!(result, Err(Error::Allocation(_))));
    }

    #[tokio::test]
    async fn test_rejects_blank_name() {
        let allocator = KeyAllocator::new(store_with(&[]).await, 100);
        let result = allocator.allocate(&user(), "   ").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
