use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;

use super::models::{FileType, MediaRecord};
use super::{MetadataStore, MetadataStoreError};

/// Metadata store that goes through the relay's `/api/metadata` endpoints,
/// so the caller never holds database credentials.
pub struct RelayClient {
    base_url: Url,
    client: Client,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Result<Self, anyhow::Error> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("relay URL '{base_url}' is not a base URL");
        }
        Ok(Self {
            base_url,
            client: Client::builder().build()?,
        })
    }

    fn metadata_url(&self, extra: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["api", "metadata"]).extend(extra);
        }
        url
    }
}

/// Turn a non-success relay response into a store error, keeping the relay's message.
async fn relay_error(resp: Response, name: &str) -> MetadataStoreError {
    let status = resp.status();
    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => format!("relay returned {status}"),
    };

    match status {
        StatusCode::CONFLICT => MetadataStoreError::Conflict(name.to_string()),
        StatusCode::NOT_FOUND => MetadataStoreError::NotFound(name.to_string()),
        _ => MetadataStoreError::Backend(message),
    }
}

#[async_trait]
impl MetadataStore for RelayClient {
    async fn create(&self, record: &MediaRecord) -> Result<MediaRecord, MetadataStoreError> {
        let resp = self
            .client
            .post(self.metadata_url(&[]))
            .json(record)
            .send()
            .await
            .map_err(|e| MetadataStoreError::Backend(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(relay_error(resp, &record.id).await);
        }

        resp.json()
            .await
            .map_err(|e| MetadataStoreError::Backend(e.to_string()))
    }

    async fn query(&self) -> Result<Vec<MediaRecord>, MetadataStoreError> {
        let resp = self
            .client
            .get(self.metadata_url(&[]))
            .send()
            .await
            .map_err(|e| MetadataStoreError::Backend(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(relay_error(resp, "").await);
        }

        // The relay already returns newest first.
        resp.json()
            .await
            .map_err(|e| MetadataStoreError::Backend(e.to_string()))
    }

    async fn delete(&self, name: &str, file_type: FileType) -> Result<(), MetadataStoreError> {
        let resp = self
            .client
            .delete(self.metadata_url(&[file_type.as_str(), name]))
            .send()
            .await
            .map_err(|e| MetadataStoreError::Backend(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(relay_error(resp, name).await);
        }

        Ok(())
    }
}
