//! Object Store Module
//!
//! A flat key/value blob service with existence checks and paginated
//! prefix listing. Directories do not exist at this layer; they are
//! reconstructed from `/`-delimited keys by the namespace lister.

mod memory;
mod s3;

pub use memory::MemoryStore;
pub use s3::S3Store;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Metadata for one stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Full object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time, when the store reports one
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a prefix listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Objects on this page, in store order
    pub objects: Vec<ObjectMeta>,
    /// Token for the next page, `None` on the last page
    pub next: Option<String>,
}

/// Object store collaborator
///
/// Implementations are bound to a single bucket at construction time.
/// Every method is a network round trip for remote backends; dropping the
/// returned future abandons the request.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object, replacing any existing one
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()>;

    /// Look up an object's metadata. `Ok(None)` means not found.
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>>;

    /// Fetch one page of keys starting with `prefix`
    async fn list_page(&self, prefix: &str, continuation: Option<String>) -> Result<ListPage>;

    /// Write an object only if the key is absent. Returns `false` when the
    /// key already existed and nothing was written.
    ///
    /// The provided implementation checks then writes and is therefore not
    /// atomic; stores with a native conditional put should override it.
    async fn put_if_absent(&self, key: &str, body: Bytes, content_type: &str) -> Result<bool> {
        if self.head(key).await?.is_some() {
            return Ok(false);
        }
        self.put(key, body, content_type).await?;
        Ok(true)
    }

    /// List every object under `prefix`, draining all pages
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let mut objects = Vec::new();
        let mut continuation = None;

        loop {
            let page = self.list_page(prefix, continuation).await?;
            objects.extend(page.objects);
            match page.next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        Ok(objects)
    }

    /// Bucket this store is bound to
    fn bucket(&self) -> &str;
}
