//! S3-compatible object store
//!
//! Works against AWS S3 and compatible services such as MinIO or R2. The
//! client is built with `fail-on-err` off, so non-2xx responses come back
//! as status codes rather than errors.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use tracing::debug;

use super::{ListPage, ObjectMeta, ObjectStore};
use crate::config::StorageConfig;
use crate::error::{Error, Result};

/// S3-backed object store bound to one bucket
pub struct S3Store {
    bucket: Box<Bucket>,
    name: String,
    page_size: usize,
}

impl S3Store {
    /// Build a client from the storage configuration
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let credentials = match (&config.access_key, &config.secret_key) {
            (Some(access), Some(secret)) => {
                Credentials::new(Some(access.as_str()), Some(secret.as_str()), None, None, None)
            }
            _ => Credentials::default(),
        }
        .map_err(|e| Error::Config(format!("Invalid S3 credentials: {}", e)))?;

        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse::<Region>()
                .map_err(|e| Error::Config(format!("Invalid region {}: {}", config.region, e)))?,
        };

        let mut bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| Error::Config(format!("Invalid bucket {}: {}", config.bucket, e)))?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self {
            bucket,
            name: config.bucket.clone(),
            page_size: config.page_size,
        })
    }
}

fn unavailable(operation: &str, key: &str, e: S3Error) -> Error {
    Error::StoreUnavailable(format!("{} {} failed: {}", operation, key, e))
}

fn check_status(operation: &str, key: &str, status: u16) -> Result<()> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(Error::StoreUnavailable(format!(
            "{} {} returned HTTP {}",
            operation, key, status
        )))
    }
}

/// ListObjectsV2 reports ISO-8601 timestamps
fn parse_list_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// HEAD reports HTTP-date timestamps
fn parse_head_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        let content_type = if content_type.is_empty() {
            "application/octet-stream"
        } else {
            content_type
        };

        let response = self
            .bucket
            .put_object_with_content_type(key, &body, content_type)
            .await
            .map_err(|e| unavailable("PUT", key, e))?;
        check_status("PUT", key, response.status_code())
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
        match self.bucket.head_object(key).await {
            Ok((_, 404)) | Err(S3Error::HttpFailWithBody(404, _)) => {
                debug!("HEAD {}: not found", key);
                Ok(None)
            }
            Ok((head, status)) => {
                check_status("HEAD", key, status)?;
                Ok(Some(ObjectMeta {
                    key: key.to_string(),
                    size: head.content_length.unwrap_or(0).max(0) as u64,
                    last_modified: head.last_modified.as_deref().and_then(parse_head_time),
                }))
            }
            Err(e) => Err(unavailable("HEAD", key, e)),
        }
    }

    async fn list_page(&self, prefix: &str, continuation: Option<String>) -> Result<ListPage> {
        let (result, status) = self
            .bucket
            .list_page(
                prefix.to_string(),
                None,
                continuation,
                None,
                Some(self.page_size),
            )
            .await
            .map_err(|e| unavailable("LIST", prefix, e))?;
        check_status("LIST", prefix, status)?;

        let objects = result
            .contents
            .into_iter()
            .map(|object| ObjectMeta {
                last_modified: parse_list_time(&object.last_modified),
                key: object.key,
                size: object.size,
            })
            .collect();

        let next = if result.is_truncated {
            result.next_continuation_token
        } else {
            None
        };

        Ok(ListPage { objects, next })
    }

    fn bucket(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_timestamps() {
        let listed = parse_list_time("2024-03-05T10:20:30.000Z").unwrap();
        assert_eq!((listed.year(), listed.month(), listed.day()), (2024, 3, 5));
        assert_eq!(listed.hour(), 10);

        let headed = parse_head_time("Tue, 05 Mar 2024 10:20:30 GMT").unwrap();
        assert_eq!(headed, listed);

        assert!(parse_list_time("yesterday").is_none());
    }

    #[test]
    fn test_status_check() {
        assert!(check_status("PUT", "u/a", 200).is_ok());
        assert!(matches!(
            check_status("PUT", "u/a", 403),
            Err(Error::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_build_with_custom_endpoint() {
        let config = StorageConfig {
            backend: crate::config::StorageBackend::S3,
            bucket: "cubby".to_string(),
            region: "us-east-1".to_string(),
            endpoint: Some("http://127.0.0.1:9000".to_string()),
            path_style: true,
            access_key: Some("AKID".to_string()),
            secret_key: Some("secret".to_string()),
            page_size: 100,
        };
        let store = S3Store::new(&config).unwrap();
        assert_eq!(store.bucket(), "cubby");
    }
}
