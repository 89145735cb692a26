//! Minimal Appwrite Databases REST client.
//!
//! Covers the document calls the state store needs: list with queries,
//! create, update and delete, all scoped to one collection.

use crate::error::{AppwriteError, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Connection settings for one collection.
#[derive(Debug)]
pub struct AppwriteConfig {
    /// API endpoint, e.g. `https://cloud.appwrite.io/v1`.
    pub endpoint: String,
    pub project_id: String,
    pub api_key: SecretString,
    pub database_id: String,
    pub collection_id: String,
    pub timeout_secs: u64,
}

impl AppwriteConfig {
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        project_id: impl Into<String>,
        api_key: impl Into<String>,
        database_id: impl Into<String>,
        collection_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            project_id: project_id.into(),
            api_key: SecretString::from(api_key.into()),
            database_id: database_id.into(),
            collection_id: collection_id.into(),
            timeout_secs: 20,
        }
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Document query, sent as one `queries[]` parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Equal { attribute: String, value: String },
    OrderDesc(String),
    Limit(u32),
}

impl Query {
    pub fn equal(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equal {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn to_param(&self) -> String {
        let value = match self {
            Self::Equal { attribute, value } => {
                json!({"method": "equal", "attribute": attribute, "values": [value]})
            }
            Self::OrderDesc(attribute) => json!({"method": "orderDesc", "attribute": attribute}),
            Self::Limit(limit) => json!({"method": "limit", "values": [limit]}),
        };
        value.to_string()
    }
}

/// A stored document. System fields are `$`-prefixed; the rest are attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$updatedAt", default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, Value>,
}

impl Document {
    /// Returns a string attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentList {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub documents: Vec<Document>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateDocument<'a, T> {
    document_id: &'a str,
    data: &'a T,
}

#[derive(Serialize)]
struct UpdateDocument<'a, T> {
    data: &'a T,
}

pub struct AppwriteClient {
    http: Client,
    config: AppwriteConfig,
    documents_url: String,
}

impl AppwriteClient {
    /// # Errors
    /// Returns error if a required setting is empty or the HTTP client cannot be built.
    pub fn new(config: AppwriteConfig) -> Result<Self> {
        for (name, value) in [
            ("endpoint", config.endpoint.as_str()),
            ("project_id", config.project_id.as_str()),
            ("database_id", config.database_id.as_str()),
            ("collection_id", config.collection_id.as_str()),
        ] {
            if value.trim().is_empty() {
                return Err(AppwriteError::Configuration(format!("{name} is empty")));
            }
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppwriteError::Network(format!("failed to build HTTP client: {e}")))?;

        let documents_url = format!(
            "{}/databases/{}/collections/{}/documents",
            config.endpoint.trim_end_matches('/'),
            config.database_id,
            config.collection_id
        );

        Ok(Self {
            http,
            config,
            documents_url,
        })
    }

    /// # Errors
    /// Returns error if the API call fails.
    pub async fn list_documents(&self, queries: &[Query]) -> Result<DocumentList> {
        let params: Vec<(&str, String)> = queries.iter().map(|q| ("queries[]", q.to_param())).collect();

        tracing::debug!("GET {} ({} queries)", self.documents_url, params.len());

        let response = self
            .request(self.http.get(&self.documents_url))
            .query(&params)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Creates a document with a server-assigned id.
    ///
    /// # Errors
    /// Returns error if the API call fails.
    pub async fn create_document<T: Serialize + Sync>(&self, data: &T) -> Result<Document> {
        tracing::debug!("POST {}", self.documents_url);

        let body = CreateDocument {
            document_id: "unique()",
            data,
        };
        let response = self
            .request(self.http.post(&self.documents_url))
            .json(&body)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// # Errors
    /// Returns error if the API call fails.
    pub async fn update_document<T: Serialize + Sync>(&self, id: &str, data: &T) -> Result<Document> {
        let url = format!("{}/{id}", self.documents_url);
        tracing::debug!("PATCH {}", url);

        let response = self
            .request(self.http.patch(&url))
            .json(&UpdateDocument { data })
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// # Errors
    /// Returns error if the API call fails.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let url = format!("{}/{id}", self.documents_url);
        tracing::debug!("DELETE {}", url);

        let response = self.request(self.http.delete(&url)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppwriteError::api(status.as_u16(), error_message(&text)));
        }

        Ok(())
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Accept", "application/json")
            .header("X-Appwrite-Project", &self.config.project_id)
            .header("X-Appwrite-Key", self.config.api_key.expose_secret())
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppwriteError::api(status.as_u16(), error_message(&text)));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Extracts `message` from an Appwrite error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
