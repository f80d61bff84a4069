//! In-process object store
//!
//! Keeps objects in an ordered map so listings come back in key order,
//! like S3. Used by the `memory` backend and by tests.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{ListPage, ObjectMeta, ObjectStore};
use crate::error::Result;

/// Default number of keys returned per page
const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    content_type: String,
    last_modified: DateTime<Utc>,
}

/// In-memory object store bound to one bucket
pub struct MemoryStore {
    bucket: String,
    page_size: usize,
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            page_size: DEFAULT_PAGE_SIZE,
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Set the number of keys per listing page (minimum 1)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Read back an object body
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).map(|o| o.body.clone())
    }

    /// Content type recorded for an object
    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.content_type.clone())
    }

    /// Whether the store holds no objects
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

fn meta(key: &str, object: &StoredObject) -> ObjectMeta {
    ObjectMeta {
        key: key.to_string(),
        size: object.body.len() as u64,
        last_modified: Some(object.last_modified),
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
        Ok(self.objects.read().await.get(key).map(|o| meta(key, o)))
    }

    async fn list_page(&self, prefix: &str, continuation: Option<String>) -> Result<ListPage> {
        let objects = self.objects.read().await;

        let start = match continuation {
            Some(token) => Bound::Excluded(token),
            None => Bound::Included(prefix.to_string()),
        };

        let mut page: Vec<ObjectMeta> = objects
            .range::<String, _>((start, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(self.page_size + 1)
            .map(|(key, object)| meta(key, object))
            .collect();

        // One extra key tells us whether another page exists
        let next = if page.len() > self.page_size {
            page.truncate(self.page_size);
            page.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ListPage { objects: page, next })
    }

    async fn put_if_absent(&self, key: &str, body: Bytes, content_type: &str) -> Result<bool> {
        let mut objects = self.objects.write().await;
        if objects.contains_key(key) {
            return Ok(false);
        }
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
                last_modified: Utc::now(),
            },
        );
        Ok(true)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_head() {
        let store = MemoryStore::new("test");
        assert!(store.head("u/a.txt").await.unwrap().is_none());

        store
            .put("u/a.txt", Bytes::from_static(b"hello"), "text/plain")
            .await
            .unwrap();

        let meta = store.head("u/a.txt").await.unwrap().unwrap();
        assert_eq!(meta.size, 5);
        assert_eq!(store.content_type("u/a.txt").await.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_listing_respects_prefix() {
        let store = MemoryStore::new("test");
        for key in ["u/", "u/a.txt", "u/b/c.txt", "v/a.txt", "uu/x.txt"] {
            store.put(key, Bytes::new(), "").await.unwrap();
        }

        let keys: Vec<String> = store
            .list_prefix("u/")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["u/", "u/a.txt", "u/b/c.txt"]);
    }

    #[tokio::test]
    async fn test_pagination() {
        let store = MemoryStore::new("test").with_page_size(2);
        for i in 0..5 {
            store
                .put(&format!("u/{}.txt", i), Bytes::new(), "")
                .await
                .unwrap();
        }

        let first = store.list_page("u/", None).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        assert_eq!(first.next.as_deref(), Some("u/1.txt"));

        let second = store.list_page("u/", first.next).await.unwrap();
        assert_eq!(second.objects[0].key, "u/2.txt");

        let all = store.list_prefix("u/").await.unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn test_put_if_absent() {
        let store = MemoryStore::new("test");
        assert!(store
            .put_if_absent("u/a.txt", Bytes::from_static(b"one"), "")
            .await
            .unwrap());
        assert!(!store
            .put_if_absent("u/a.txt", Bytes::from_static(b"two"), "")
            .await
            .unwrap());
        assert_eq!(store.get("u/a.txt").await.unwrap(), Bytes::from_static(b"one"));
    }
}
