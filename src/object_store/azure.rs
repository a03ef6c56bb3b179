use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, IF_NONE_MATCH};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};

use super::{ObjectStore, ObjectStoreError};

const API_VERSION: &str = "2021-08-06";

/// Azure Blob Storage backend authorised by a shared access signature.
pub struct AzureBlobStore {
    client: Client,
    container: String,
    /// Service root, e.g. `https://{account}.blob.core.windows.net/`
    endpoint: Url,
    /// SAS query string without the leading `?`
    sas_token: String,
}

impl AzureBlobStore {
    /// `endpoint` overrides the account's default blob endpoint (Azurite, sovereign clouds).
    pub fn new(
        account: &str,
        sas_token: &str,
        container: &str,
        endpoint: Option<&str>,
    ) -> Result<Self, anyhow::Error> {
        let endpoint = match endpoint {
            Some(e) => Url::parse(e)?,
            None => Url::parse(&format!("https://{account}.blob.core.windows.net/"))?,
        };
        if endpoint.cannot_be_a_base() {
            anyhow::bail!("blob endpoint '{endpoint}' is not a base URL");
        }
        if container.is_empty() {
            anyhow::bail!("container name must not be empty");
        }

        Ok(Self {
            client: Client::builder().build()?,
            container: container.to_string(),
            endpoint,
            sas_token: sas_token.trim_start_matches('?').to_string(),
        })
    }

    fn container_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&self.container);
        }
        url
    }

    /// Unsigned blob URL. `/` in names maps to virtual directories.
    fn blob_url(&self, name: &str) -> Url {
        let mut url = self.container_url();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(name.split('/'));
        }
        url
    }

    fn signed(&self, mut url: Url) -> Url {
        if !self.sas_token.is_empty() {
            let query = match url.query() {
                Some(q) if !q.is_empty() => format!("{q}&{}", self.sas_token),
                _ => self.sas_token.clone(),
            };
            url.set_query(Some(&query));
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(%method, request_id = %request_id, "Blob storage request");
        self.client
            .request(method, self.signed(url))
            .header("x-ms-version", API_VERSION)
            .header("x-ms-client-request-id", request_id)
    }
}

async fn backend_error(op: &str, name: &str, resp: Response) -> ObjectStoreError {
    let status = resp.status();
    if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
        return ObjectStoreError::PermissionDenied(format!("{op} {name} ({status})"));
    }
    let body = resp.text().await.unwrap_or_default();
    ObjectStoreError::Backend(format!("Blob {op} failed ({status}): {body}"))
}

#[async_trait]
impl ObjectStore for AzureBlobStore {
    async fn put(
        &self,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        if name.is_empty() {
            return Err(ObjectStoreError::InvalidName(name.to_string()));
        }

        let resp = self
            .request(Method::PUT, self.blob_url(name))
            .header("x-ms-blob-type", "BlockBlob")
            .header(CONTENT_TYPE, content_type)
            .header(IF_NONE_MATCH, "*")
            .body(data)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == StatusCode::CONFLICT || resp.status() == StatusCode::PRECONDITION_FAILED
        {
            return Err(ObjectStoreError::AlreadyExists(name.to_string()));
        }

        if !resp.status().is_success() {
            return Err(backend_error("upload", name, resp).await);
        }

        Ok(self.url_for(name))
    }

    async fn get(&self, name: &str) -> Result<Bytes, ObjectStoreError> {
        let resp = self
            .request(Method::GET, self.blob_url(name))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(name.to_string()));
        }

        if !resp.status().is_success() {
            return Err(backend_error("download", name, resp).await);
        }

        resp.bytes()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))
    }

    async fn delete(&self, name: &str) -> Result<(), ObjectStoreError> {
        let resp = self
            .request(Method::DELETE, self.blob_url(name))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(name.to_string()));
        }

        if !resp.status().is_success() {
            return Err(backend_error("delete", name, resp).await);
        }

        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, ObjectStoreError> {
        let resp = self
            .request(Method::HEAD, self.blob_url(name))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(backend_error("head", name, resp).await),
        }
    }

    async fn list(&self) -> Result<Vec<String>, ObjectStoreError> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut url = self.container_url();
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("restype", "container");
                query.append_pair("comp", "list");
                if let Some(ref m) = marker {
                    query.append_pair("marker", m);
                }
            }

            let resp = self
                .request(Method::GET, url)
                .send()
                .await
                .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

            if !resp.status().is_success() {
                return Err(backend_error("list", &self.container, resp).await);
            }

            let body = resp
                .text()
                .await
                .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

            names.extend(xml_elements(&body, "Name"));
            marker = xml_elements(&body, "NextMarker")
                .into_iter()
                .next()
                .filter(|m| !m.is_empty());

            if marker.is_none() {
                break;
            }
        }

        Ok(names)
    }

    fn url_for(&self, name: &str) -> String {
        self.blob_url(name).to_string()
    }
}

/// Text content of every `<tag>…</tag>` element in a List Blobs response.
///
/// The listing format is flat and attribute-free for the elements read here,
/// so a scan is enough.
fn xml_elements(body: &str, tag: &str) -> Vec<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut values = Vec::new();
    let mut rest = body;

    while let Some(start) = rest.find(&open) {
        rest = &rest[start + open.len()..];
        let Some(end) = rest.find(&close) else {
            break;
        };
        values.push(xml_unescape(&rest[..end]));
        rest = &rest[end + close.len()..];
    }

    values
}

fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> AzureBlobStore {
        AzureBlobStore::new("acct", "?sv=2022-11-02&sig=abc%3D", "media", None).unwrap()
    }

    #[test]
    fn test_blob_url_is_unsigned() {
        assert_eq!(
            store().url_for("1700000000000-photo.jpg"),
            "https://acct.blob.core.windows.net/media/1700000000000-photo.jpg"
        );
    }

    #[test]
    fn test_signed_url_appends_sas() {
        let s = store();
        let signed = s.signed(s.blob_url("a.png"));
        assert_eq!(
            signed.as_str(),
            "https://acct.blob.core.windows.net/media/a.png?sv=2022-11-02&sig=abc%3D"
        );
    }

    #[test]
    fn test_endpoint_override_keeps_account_path() {
        let s = AzureBlobStore::new(
            "devstoreaccount1",
            "sig=x",
            "media",
            Some("http://127.0.0.1:10000/devstoreaccount1"),
        )
        .unwrap();
        assert_eq!(
            s.url_for("a b.png"),
            "http://127.0.0.1:10000/devstoreaccount1/media/a%20b.png"
        );
    }

    #[test]
    fn test_xml_elements() {
        let body = "<EnumerationResults><Blobs>\
            <Blob><Name>1-a.png</Name><Properties/></Blob>\
            <Blob><Name>2-b&amp;c.mp3</Name></Blob>\
            </Blobs><NextMarker>token</NextMarker></EnumerationResults>";
        assert_eq!(xml_elements(body, "Name"), vec!["1-a.png", "2-b&c.mp3"]);
        assert_eq!(xml_elements(body, "NextMarker"), vec!["token"]);
        assert!(xml_elements("<NextMarker/>", "NextMarker").is_empty());
    }
}
