use async_trait::async_trait;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;

use super::models::{sort_by_recency, FileType, MediaRecord};
use super::{MetadataStore, MetadataStoreError};

/// Database holding the media metadata collection.
pub const DATABASE_ID: &str = "mediaMetaDB";
/// Collection of media records, partitioned by `/fileType`.
pub const COLLECTION_ID: &str = "files";

const API_VERSION: &str = "2018-12-31";

/// Azure Cosmos DB (SQL API) metadata store, spoken to over its REST interface.
pub struct CosmosStore {
    client: Client,
    endpoint: Url,
    key: ring::hmac::Key,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(rename = "Documents")]
    documents: Vec<MediaRecord>,
}

impl CosmosStore {
    /// `key` is the base64 master key from the account's connection settings.
    pub fn new(endpoint: &str, key: &str) -> Result<Self, anyhow::Error> {
        let endpoint = Url::parse(endpoint)?;
        if endpoint.cannot_be_a_base() {
            anyhow::bail!("Cosmos endpoint '{endpoint}' is not a base URL");
        }
        let key_bytes = base64::engine::general_purpose::STANDARD.decode(key.trim())?;
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            endpoint,
            key: ring::hmac::Key::new(ring::hmac::HMAC_SHA256, &key_bytes),
        })
    }

    fn collection_link() -> String {
        format!("dbs/{DATABASE_ID}/colls/{COLLECTION_ID}")
    }

    fn docs_url(&self, id: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["dbs", DATABASE_ID, "colls", COLLECTION_ID, "docs"]);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        url
    }

    /// Build the master-key authorization token for one request.
    fn authorization(&self, verb: &Method, resource_link: &str, date: &str) -> String {
        let payload = format!(
            "{}\n{}\n{}\n{}\n\n",
            verb.as_str().to_lowercase(),
            "docs",
            resource_link,
            date.to_lowercase()
        );
        let tag = ring::hmac::sign(&self.key, payload.as_bytes());
        let signature = base64::engine::general_purpose::STANDARD.encode(tag.as_ref());
        let token = format!("type=master&ver=1.0&sig={signature}");
        url::form_urlencoded::byte_serialize(token.as_bytes()).collect()
    }

    fn request(&self, method: Method, url: Url, resource_link: &str) -> RequestBuilder {
        let date = rfc1123_now();
        let auth = self.authorization(&method, resource_link, &date);
        self.client
            .request(method, url)
            .header("authorization", auth)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
    }
}

#[async_trait]
impl MetadataStore for CosmosStore {
    async fn create(&self, record: &MediaRecord) -> Result<MediaRecord, MetadataStoreError> {
        let body = serde_json::to_vec(record).map_err(|e| MetadataStoreError::Backend(e.to_string()))?;

        let resp = self
            .request(Method::POST, self.docs_url(None), &Self::collection_link())
            .header(CONTENT_TYPE, "application/json")
            .header("x-ms-documentdb-partitionkey", partition_key(record.file_type))
            .body(body)
            .send()
            .await
            .map_err(|e| MetadataStoreError::Backend(e.to_string()))?;

        if resp.status() == StatusCode::CONFLICT {
            return Err(MetadataStoreError::Conflict(record.id.clone()));
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MetadataStoreError::Backend(format!(
                "Cosmos create failed ({status}): {body}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| MetadataStoreError::Backend(e.to_string()))
    }

    async fn query(&self) -> Result<Vec<MediaRecord>, MetadataStoreError> {
        let body = serde_json::to_vec(&serde_json::json!({
            "query": "SELECT * FROM c",
            "parameters": [],
        }))
        .map_err(|e| MetadataStoreError::Backend(e.to_string()))?;

        let mut records = Vec::new();
        let mut continuation: Option<String> = None;

        // Cross-partition ORDER BY needs a query plan the REST gateway does not
        // serve, so pages are collected whole and ordered here.
        loop {
            let mut req = self
                .request(Method::POST, self.docs_url(None), &Self::collection_link())
                .header(CONTENT_TYPE, "application/query+json")
                .header("x-ms-documentdb-isquery", "True")
                .header("x-ms-documentdb-query-enablecrosspartition", "True")
                .body(body.clone());
            if let Some(ref token) = continuation {
                req = req.header("x-ms-continuation", token);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| MetadataStoreError::Backend(e.to_string()))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(MetadataStoreError::Backend(format!(
                    "Cosmos query failed ({status}): {body}"
                )));
            }

            continuation = resp
                .headers()
                .get("x-ms-continuation")
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string());

            let page: QueryResponse = resp
                .json()
                .await
                .map_err(|e| MetadataStoreError::Backend(e.to_string()))?;
            records.extend(page.documents);

            if continuation.is_none() {
                break;
            }
        }

        sort_by_recency(&mut records);
        Ok(records)
    }

    async fn delete(&self, name: &str, file_type: FileType) -> Result<(), MetadataStoreError> {
        let link = format!("{}/docs/{name}", Self::collection_link());

        let resp = self
            .request(Method::DELETE, self.docs_url(Some(name)), &link)
            .header("x-ms-documentdb-partitionkey", partition_key(file_type))
            .send()
            .await
            .map_err(|e| MetadataStoreError::Backend(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(MetadataStoreError::NotFound(name.to_string()));
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MetadataStoreError::Backend(format!(
                "Cosmos delete failed ({status}): {body}"
            )));
        }

        Ok(())
    }
}

/// Partition key header value: a JSON array holding the key.
fn partition_key(file_type: FileType) -> String {
    format!("[\"{}\"]", file_type.as_str())
}

fn rfc1123_now() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
