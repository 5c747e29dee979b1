use crate::document::LogDocument;
use crate::index::{BoxError, IndexBackend};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;

/// OpenSearch backend that sends documents via the HTTP bulk API.
///
/// Indices are bucketed per UTC day: `<prefix>-YYYY.MM.DD`.
#[derive(Clone)]
pub struct OpenSearchBackend {
    client: Client,
    /// Base URL of the cluster, e.g. "http://localhost:9200".
    base_url: String,
    credentials: Option<(String, String)>,
}

#[derive(Serialize)]
struct TypedDocument<'a> {
    #[serde(flatten)]
    document: &'a LogDocument,
    doc_type: &'a str,
}

impl OpenSearchBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        OpenSearchBackend {
            client: Client::new(),
            base_url: base_url.into(),
            credentials: None,
        }
    }

    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), password.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }
}

/// Concrete index name for a document time. Index names must be lower-case.
pub fn daily_index(index_prefix: &str, time_ms: i64) -> String {
    let day = DateTime::<Utc>::from_timestamp_millis(time_ms).unwrap_or_default();
    format!("{}-{}", index_prefix.to_lowercase(), day.format("%Y.%m.%d"))
}

fn bulk_body(document: &LogDocument, index: &str, document_type: &str) -> Result<String, BoxError> {
    let action = serde_json::json!({ "index": { "_index": index } });
    let doc = TypedDocument { document, doc_type: document_type };
    Ok(format!("{}\n{}\n", action, serde_json::to_string(&doc)?))
}

#[async_trait]
impl IndexBackend for OpenSearchBackend {
    async fn save(
        &self,
        document: &LogDocument,
        index_prefix: &str,
        document_type: &str,
        time_ms: i64,
    ) -> Result<(), BoxError> {
        let index = daily_index(index_prefix, time_ms);
        let body = bulk_body(document, &index, document_type)?;

        let url = format!("{}/_bulk", self.base_url.trim_end_matches('/'));
        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-ndjson")
            .body(body);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }
        let resp = request.send().await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(format!("OpenSearch bulk insert into {} failed with status {}: {}", index, status, text).into())
        }
    }
}
