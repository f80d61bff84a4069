//! Folder Advisor
//!
//! Optional external service that suggests a folder for a freshly uploaded
//! file. Advice is best effort: every failure collapses to
//! [`UNCATEGORIZED`] and never affects the upload itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AdvisorConfig;
use crate::error::{Error, Result};
use crate::namespace::FileEntry;

/// Folder reported when no advice is available
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    filename: &'a str,
    content: &'a str,
    files: &'a [FileEntry],
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    folder: Option<String>,
}

/// HTTP client for the advisor's `/analyze` endpoint
#[derive(Clone)]
pub struct FolderAdvisor {
    client: reqwest::Client,
    endpoint: String,
}

impl FolderAdvisor {
    /// Build an advisor from config. Returns `Ok(None)` when no URL is set.
    pub fn from_config(config: &AdvisorConfig) -> Result<Option<Self>> {
        match config.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Self::new(url, config.timeout()).map(Some),
            _ => Ok(None),
        }
    }

    /// Create an advisor for the service at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create advisor client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/analyze", base_url.trim_end_matches('/')),
        })
    }

    /// Endpoint receiving analysis requests
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Ask for a folder suggestion, falling back to [`UNCATEGORIZED`]
    pub async fn suggest(&self, filename: &str, description: &str, files: &[FileEntry]) -> String {
        match self.request(filename, description, files).await {
            Ok(Some(folder)) if !folder.trim().is_empty() => {
                debug!("Advisor suggested {} for {}", folder, filename);
                folder
            }
            Ok(_) => UNCATEGORIZED.to_string(),
            Err(e) => {
                warn!("Folder advisor unavailable: {}", e);
                UNCATEGORIZED.to_string()
            }
        }
    }

    async fn request(
        &self,
        filename: &str,
        description: &str,
        files: &[FileEntry],
    ) -> std::result::Result<Option<String>, reqwest::Error> {
        let body = AnalyzeRequest {
            filename,
            content: description,
            files,
        };

        let response: AnalyzeResponse = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_url() {
        let config = AdvisorConfig::default();
        assert!(FolderAdvisor::from_config(&config).unwrap().is_none());

        let blank = AdvisorConfig {
            url: Some("  ".to_string()),
            ..AdvisorConfig::default()
        };
        assert!(FolderAdvisor::from_config(&blank).unwrap().is_none());
    }

    #[test]
    fn test_endpoint_joins_cleanly() {
        let advisor = FolderAdvisor::new("http://advisor.local:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(advisor.endpoint(), "http://advisor.local:5000/analyze");
    }

    #[test]
    fn test_request_body_shape() {
        let body = AnalyzeRequest {
            filename: "taxes.pdf",
            content: "2024 return",
            files: &[],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"filename": "taxes.pdf", "content": "2024 return", "files": []})
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_is_uncategorized() {
        // Port 9 (discard) on loopback refuses connections
        let advisor = FolderAdvisor::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let folder = advisor.suggest("notes.txt", "", &[]).await;
        assert_eq!(folder, UNCATEGORIZED);
    }
}
