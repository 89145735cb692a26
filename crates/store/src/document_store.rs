//! [`StateStore`] on an Appwrite collection.
//!
//! Each account is one document with two string attributes:
//! `user_address` and `positions_json` (the serialized snapshot). Saving
//! updates the most recently modified document and deletes any others for
//! the same account, so duplicates left behind by earlier writers converge
//! to a single record.

use crate::appwrite::{AppwriteClient, Document, Query};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use position_alert_core::{Snapshot, StateStore, StoredSnapshot};
use serde::Serialize;
use tracing::{debug, info, warn};

pub const ADDRESS_ATTRIBUTE: &str = "user_address";
pub const POSITIONS_ATTRIBUTE: &str = "positions_json";

/// Upper bound on documents fetched per account.
const LIST_LIMIT: u32 = 100;

#[derive(Serialize)]
struct PositionsDocument<'a> {
    user_address: &'a str,
    positions_json: String,
}

pub struct DocumentStateStore {
    client: AppwriteClient,
}

impl DocumentStateStore {
    #[must_use]
    pub const fn new(client: AppwriteClient) -> Self {
        Self { client }
    }

    /// All documents for `account`, most recently updated first.
    async fn documents(&self, account: &str) -> anyhow::Result<Vec<Document>> {
        let list = self
            .client
            .list_documents(&[
                Query::equal(ADDRESS_ATTRIBUTE, account),
                Query::OrderDesc("$updatedAt".to_string()),
                Query::Limit(LIST_LIMIT),
            ])
            .await
            .with_context(|| format!("listing state documents for {account}"))?;

        Ok(list.documents)
    }
}

fn parse_snapshot(document: &Document) -> anyhow::Result<Snapshot> {
    let raw = document
        .attribute(POSITIONS_ATTRIBUTE)
        .with_context(|| format!("document {} has no {POSITIONS_ATTRIBUTE}", document.id))?;

    if raw.trim().is_empty() {
        return Ok(Snapshot::new());
    }

    serde_json::from_str(raw)
        .with_context(|| format!("document {} holds malformed {POSITIONS_ATTRIBUTE}", document.id))
}

#[async_trait]
impl StateStore for DocumentStateStore {
    async fn load(&self, account: &str) -> anyhow::Result<Option<StoredSnapshot>> {
        let documents = self.documents(account).await?;
        let Some(latest) = documents.first() else {
            return Ok(None);
        };

        if documents.len() > 1 {
            warn!(
                account,
                count = documents.len(),
                "Multiple state documents found, using the most recent"
            );
        }

        Ok(Some(StoredSnapshot {
            account: account.to_string(),
            snapshot: parse_snapshot(latest)?,
            updated_at: latest.updated_at,
        }))
    }

    async fn save(
        &self,
        account: &str,
        snapshot: &Snapshot,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let data = PositionsDocument {
            user_address: account,
            positions_json: serde_json::to_string(snapshot)?,
        };

        let documents = self.documents(account).await?;
        let mut documents = documents.into_iter();

        match documents.next() {
            Some(existing) => {
                self.client
                    .update_document(&existing.id, &data)
                    .await
                    .with_context(|| format!("updating state document {}", existing.id))?;
                debug!(account, document = %existing.id, "Updated state document");
            }
            None => {
                let created = self
                    .client
                    .create_document(&data)
                    .await
                    .context("creating state document")?;
                info!(account, document = %created.id, "Created state document");
            }
        }

        for duplicate in documents {
            match self.client.delete_document(&duplicate.id).await {
                Ok(()) => info!(account, document = %duplicate.id, "Deleted duplicate state document"),
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(
                    account,
                    document = %duplicate.id,
                    error = %e,
                    "Failed to delete duplicate state document"
                ),
            }
        }

        debug!(account, checked_at = %updated_at, positions = snapshot.len(), "Saved position state");
        Ok(())
    }

    async fn clear(&self, account: &str) -> anyhow::Result<usize> {
        let documents = self.documents(account).await?;
        let mut removed = 0;

        for document in &documents {
            match self.client.delete_document(&document.id).await {
                Ok(()) => removed += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("deleting state document {}", document.id))
                }
            }
        }

        info!(account, removed, "Cleared persisted state");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appwrite::AppwriteConfig;
    use position_alert_core::Position;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ACCOUNT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    const DOCS: &str = "/v1/databases/db/collections/positions/documents";

    fn store(server: &MockServer) -> DocumentStateStore {
        let config = AppwriteConfig::new(format!("{}/v1", server.uri()), "proj", "key", "db", "positions");
        DocumentStateStore::new(AppwriteClient::new(config).unwrap())
    }

    fn document(id: &str, positions_json: &str) -> serde_json::Value {
        json!({
            "$id": id,
            "$createdAt": "2025-10-01T08:00:00.000+00:00",
            "$updatedAt": "2025-10-09T08:00:00.000+00:00",
            "user_address": ACCOUNT,
            "positions_json": positions_json
        })
    }

    async fn mount_list(server: &MockServer, documents: Vec<serde_json::Value>) {
        Mock::given(method("GET"))
            .and(path(DOCS))
            .and(query_param("queries[]", Query::equal(ADDRESS_ATTRIBUTE, ACCOUNT).to_param()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": documents.len(),
                "documents": documents
            })))
            .mount(server)
            .await;
    }

    fn book() -> Snapshot {
        Snapshot::new().with("BTC", Position::new(dec!(2.5), dec!(60000), dec!(1000)))
    }

    #[tokio::test]
    async fn test_load_without_documents_is_none() {
        let server = MockServer::start().await;
        mount_list(&server, vec![]).await;

        assert!(store(&server).load(ACCOUNT).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_parses_legacy_float_record() {
        let server = MockServer::start().await;
        mount_list(
            &server,
            vec![document(
                "doc1",
                r#"{"BTC":{"szi":2.5,"entryPx":60000,"liquidationPx":null,"marginUsed":1000}}"#,
            )],
        )
        .await;

        let record = store(&server).load(ACCOUNT).await.unwrap().unwrap();

        assert_eq!(record.snapshot, book());
        assert!(record.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_load_malformed_json_is_error() {
        let server = MockServer::start().await;
        mount_list(&server, vec![document("doc1", "{broken")]).await;

        let err = store(&server).load(ACCOUNT).await.unwrap_err();

        assert!(format!("{err:#}").contains("malformed positions_json"));
    }

    #[tokio::test]
    async fn test_save_creates_when_absent() {
        let server = MockServer::start().await;
        mount_list(&server, vec![]).await;
        Mock::given(method("POST"))
            .and(path(DOCS))
            .and(body_partial_json(json!({
                "documentId": "unique()",
                "data": {"user_address": ACCOUNT}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(document("new", "{}")))
            .expect(1)
            .mount(&server)
            .await;

        store(&server).save(ACCOUNT, &book(), Utc::now()).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_updates_latest_and_purges_duplicates() {
        let server = MockServer::start().await;
        mount_list(&server, vec![document("latest", "{}"), document("stale", "{}")]).await;
        Mock::given(method("PATCH"))
            .and(path(format!("{DOCS}/latest")))
            .respond_with(ResponseTemplate::new(200).set_body_json(document("latest", "{}")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{DOCS}/stale")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        store(&server).save(ACCOUNT, &book(), Utc::now()).await.unwrap();
    }

    #[tokio::test]
    async fn test_saved_json_round_trips_through_load() {
        let server = MockServer::start().await;
        let stored = serde_json::to_string(&book()).unwrap();
        mount_list(&server, vec![document("doc1", &stored)]).await;

        let record = store(&server).load(ACCOUNT).await.unwrap().unwrap();

        assert_eq!(record.snapshot, book());
    }

    #[tokio::test]
    async fn test_save_failure_is_error() {
        let server = MockServer::start().await;
        mount_list(&server, vec![document("doc1", "{}")]).await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "message": "The current user is not authorized to perform the requested action."
            })))
            .mount(&server)
            .await;

        let err = store(&server).save(ACCOUNT, &book(), Utc::now()).await.unwrap_err();

        assert!(format!("{err:#}").contains("401"));
    }

    #[tokio::test]
    async fn test_clear_deletes_every_document() {
        let server = MockServer::start().await;
        mount_list(&server, vec![document("a", "{}"), document("b", "{}")]).await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        assert_eq!(store(&server).clear(ACCOUNT).await.unwrap(), 2);
    }
}
