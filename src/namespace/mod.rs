//! Namespace Module
//!
//! Per-user key space inside a flat object store. Every key a user owns
//! starts with `{userId}/`; folders are an illusion rebuilt on listing.

pub mod allocator;
pub mod key;
pub mod lister;

pub use allocator::KeyAllocator;
pub use key::{ObjectKey, UserId};
pub use lister::{EntryKind, FileEntry, NamespaceLister};

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use crate::config::NamespaceConfig;
use crate::error::Result;
use crate::store::ObjectStore;

/// Content type recorded on the zero-byte namespace marker
const MARKER_CONTENT_TYPE: &str = "application/x-directory";

/// Namespace service bound to one object store
pub struct Namespace {
    store: Arc<dyn ObjectStore>,
    allocator: KeyAllocator,
    lister: NamespaceLister,
}

impl Namespace {
    /// Create the service over an injected store
    pub fn new(store: Arc<dyn ObjectStore>, config: &NamespaceConfig) -> Self {
        Self {
            allocator: KeyAllocator::new(Arc::clone(&store), config.max_attempts),
            lister: NamespaceLister::new(Arc::clone(&store)),
            store,
        }
    }

    /// Write the zero-byte `{userId}/` marker for a new account
    pub async fn create_root(&self, user: &UserId) -> Result<()> {
        let prefix = user.prefix();
        self.store
            .put(&prefix, Bytes::new(), MARKER_CONTENT_TYPE)
            .await?;
        info!("Created namespace {} in bucket {}", prefix, self.store.bucket());
        Ok(())
    }

    /// Allocate a key and write `body` to it
    ///
    /// The write is a conditional put. If another writer claimed the key
    /// between the existence check and the write, allocation resumes at the next
    /// suffix instead of overwriting.
    pub async fn upload(
        &self,
        user: &UserId,
        desired: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<ObjectKey> {
        let mut attempt = 0;

        loop {
            let (key, used) = self.allocator.allocate_from(user, desired, attempt).await?;

            if self
                .store
                .put_if_absent(key.as_str(), body.clone(), content_type)
                .await?
            {
                info!("Stored {} ({} bytes)", key, body.len());
                return Ok(key);
            }

            warn!("Key {} was claimed concurrently, trying next suffix", key);
            attempt = used + 1;
        }
    }

    /// List the user's folders and files
    pub async fn list(&self, user: &UserId) -> Result<Vec<FileEntry>> {
        self.lister.list(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::{ListPage, MemoryStore, ObjectMeta};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn user() -> UserId {
        UserId::parse("u").unwrap()
    }

    fn namespace(store: Arc<dyn ObjectStore>) -> Namespace {
        Namespace::new(store, &NamespaceConfig::default())
    }

    /// Lets a competing writer claim the first key between check and write
    struct RacyStore {
        inner: MemoryStore,
        raced: AtomicBool,
    }

    #[async_trait]
    impl ObjectStore for RacyStore {
        async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
            self.inner.put(key, body, content_type).await
        }

        async fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
            self.inner.head(key).await
        }

        async fn list_page(&self, prefix: &str, continuation: Option<String>) -> Result<ListPage> {
            self.inner.list_page(prefix, continuation).await
        }

        async fn put_if_absent(&self, key: &str, body: Bytes, content_type: &str) -> Result<bool> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                self.inner
                    .put(key, Bytes::from_static(b"competitor"), "text/plain")
                    .await?;
            }
            self.inner.put_if_absent(key, body, content_type).await
        }

        fn bucket(&self) -> &str {
            self.inner.bucket()
        }
    }

    #[tokio::test]
    async fn test_create_root_then_list_is_empty() {
        let store = Arc::new(MemoryStore::new("test"));
        let ns = namespace(store.clone());

        ns.create_root(&user()).await.unwrap();
        assert!(store.head("u/").await.unwrap().is_some());
        assert!(ns.list(&user()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_writes_body_and_content_type() {
        let store = Arc::new(MemoryStore::new("test"));
        let ns = namespace(store.clone());

        let key = ns
            .upload(&user(), "photo.jpg", Bytes::from_static(b"jpeg"), "image/jpeg")
            .await
            .unwrap();

        assert_eq!(key.as_str(), "u/photo.jpg");
        assert_eq!(store.get("u/photo.jpg").await.unwrap(), Bytes::from_static(b"jpeg"));
        assert_eq!(store.content_type("u/photo.jpg").await.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_repeated_uploads_get_suffixes() {
        let ns = namespace(Arc::new(MemoryStore::new("test")));

        let mut keys = Vec::new();
        for _ in 0..3 {
            let key = ns
                .upload(&user(), "report.pdf", Bytes::from_static(b"%PDF"), "application/pdf")
                .await
                .unwrap();
            keys.push(key.into_string());
        }

        assert_eq!(keys, vec!["u/report.pdf", "u/report (1).pdf", "u/report (2).pdf"]);
    }

    #[tokio::test]
    async fn test_upload_recovers_from_lost_race() {
        let store = Arc::new(RacyStore {
            inner: MemoryStore::new("test"),
            raced: AtomicBool::new(false),
        });
        let ns = namespace(store.clone());

        let key = ns
            .upload(&user(), "a.txt", Bytes::from_static(b"mine"), "text/plain")
            .await
            .unwrap();

        assert_eq!(key.as_str(), "u/a (1).txt");
        assert_eq!(
            store.inner.get("u/a.txt").await.unwrap(),
            Bytes::from_static(b"competitor")
        );
        assert_eq!(
            store.inner.get("u/a (1).txt").await.unwrap(),
            Bytes::from_static(b"mine")
        );
    }

    #[tokio::test]
    async fn test_upload_then_list() {
        let ns = namespace(Arc::new(MemoryStore::new("test")));
        ns.create_root(&user()).await.unwrap();
        ns.upload(&user(), "b.txt", Bytes::from_static(b"bb"), "text/plain")
            .await
            .unwrap();
        ns.upload(&user(), "a.txt", Bytes::from_static(b"a"), "text/plain")
            .await
            .unwrap();

        let entries = ns.list(&user()).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(entries[1].size, Some(2));
    }

    #[tokio::test]
    async fn test_upload_rejects_blank_name() {
        let ns = namespace(Arc::new(MemoryStore::new("test")));
        let result = ns.upload(&user(), " ", Bytes::new(), "").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
