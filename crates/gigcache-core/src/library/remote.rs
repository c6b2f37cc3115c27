use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures::future::BoxFuture;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::StoredSavedEntry;

/// HTTP timeout for document reads and writes.
const DOCUMENT_TIMEOUT_SECS: u64 = 15;

/// Per-user mirror of saved and hidden state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub saved_events: Vec<StoredSavedEntry>,
    pub hidden_event_ids: Vec<String>,
    pub updated_at: i64,
}

/// Remote document store holding one document per user.
///
/// `read` returns the raw document so that a partially valid document can
/// still contribute whichever fields are well formed.
pub trait RemoteDocumentStore: Send + Sync {
    fn read(&self) -> BoxFuture<'_, Result<Option<Value>>>;
    fn merge_write(&self, document: RemoteDocument) -> BoxFuture<'_, Result<()>>;
}

/// Document stored behind a plain JSON HTTP resource: `GET` to read, `PATCH`
/// to merge.
#[derive(Clone)]
pub struct HttpDocumentStore {
    client: Client,
    url: String,
    token: Option<String>,
}

impl HttpDocumentStore {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DOCUMENT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        let request = self
            .client
            .request(method, &self.url)
            .header(header::ACCEPT, "application/json");
        match self.token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch(&self) -> Result<Option<Value>> {
        let response = self
            .request(reqwest::Method::GET)
            .send()
            .await
            .with_context(|| format!("Failed to read remote document {}", self.url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(anyhow!("Remote document read failed with status {}", response.status()));
        }
        let value = response
            .json()
            .await
            .context("Failed to parse remote document")?;
        Ok(Some(value))
    }

    async fn patch(&self, document: RemoteDocument) -> Result<()> {
        let response = self
            .request(reqwest::Method::PATCH)
            .json(&document)
            .send()
            .await
            .with_context(|| format!("Failed to write remote document {}", self.url))?;
        if !response.status().is_success() {
            return Err(anyhow!("Remote document write failed with status {}", response.status()));
        }
        Ok(())
    }
}

impl RemoteDocumentStore for HttpDocumentStore {
    fn read(&self) -> BoxFuture<'_, Result<Option<Value>>> {
        Box::pin(self.fetch())
    }

    fn merge_write(&self, document: RemoteDocument) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.patch(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_read_missing_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/u1/shows"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = HttpDocumentStore::new(format!("{}/users/u1/shows", server.uri()), None).unwrap();
        assert!(store.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_and_merge_write() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_eq("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "hiddenEventIds": ["a"] })))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(body_json(json!({ "savedEvents": [], "hiddenEventIds": ["a", "b"], "updatedAt": 5 })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpDocumentStore::new(server.uri(), Some("tok".into())).unwrap();
        let doc = store.read().await.unwrap().unwrap();
        assert_eq!(doc["hiddenEventIds"], json!(["a"]));

        store
            .merge_write(RemoteDocument {
                saved_events: Vec::new(),
                hidden_event_ids: vec!["a".into(), "b".into()],
                updated_at: 5,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_write_failure_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = HttpDocumentStore::new(server.uri(), None).unwrap();
        let result = store
            .merge_write(RemoteDocument {
                saved_events: Vec::new(),
                hidden_event_ids: Vec::new(),
                updated_at: 0,
            })
            .await;
        assert!(result.is_err());
    }
}
