//! MongoDB document store for processed recordings and comparisons.

use async_trait::async_trait;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::{Client, Collection};
use recording_sync_core::config::StoreConfig;
use recording_sync_core::contract::{AudioResult, ComparisonRecord, DocumentStore, StoredDocument};
use recording_sync_core::error::CollaboratorError;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

pub struct MongoStore {
    results: Collection<Document>,
    comparisons: Collection<Document>,
}

impl MongoStore {
    /// Build the client. The driver connects lazily on the first operation.
    pub async fn connect(uri: &str, config: &StoreConfig) -> Result<Self, CollaboratorError> {
        let client = Client::with_uri_str(uri).await.map_err(|e| {
            error!(error = %e, "Failed to create MongoDB client");
            persistence(e)
        })?;
        let db = client.database(&config.database);
        info!(
            database = %config.database,
            collection = %config.collection,
            comparisons = %config.comparisons_collection,
            "MongoDB store ready"
        );
        Ok(Self {
            results: db.collection(&config.collection),
            comparisons: db.collection(&config.comparisons_collection),
        })
    }
}

fn persistence(e: impl std::fmt::Display) -> CollaboratorError {
    CollaboratorError::Persistence(e.to_string())
}

pub fn json_to_bson(value: &Value) -> Result<Bson, CollaboratorError> {
    bson::to_bson(value).map_err(persistence)
}

pub fn audio_result_document(result: &AudioResult) -> Result<Document, CollaboratorError> {
    Ok(doc! {
        "s_id": &result.s_id,
        "transcription": &result.transcription,
        "summary": &result.summary,
        "insights": json_to_bson(&result.insights)?,
    })
}

pub fn comparison_document(record: &ComparisonRecord) -> Result<Document, CollaboratorError> {
    Ok(doc! {
        "s_id": &record.s_id,
        "comparison": json_to_bson(&record.comparison)?,
        "created_at": bson::DateTime::now(),
    })
}

/// Object ids as hex, strings as-is, anything else in relaxed extended JSON.
pub fn id_text(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.clone().into_relaxed_extjson().to_string(),
    }
}

/// Render a stored document as JSON with `_id` flattened to text.
pub fn stored_document(document: Document) -> StoredDocument {
    let id = document.get("_id").map(id_text).unwrap_or_default();
    let mut body = match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if body.contains_key("_id") {
        body.insert("_id".into(), Value::String(id.clone()));
    }
    StoredDocument { id, body }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert_audio_result(&self, result: &AudioResult) -> Result<String, CollaboratorError> {
        let document = audio_result_document(result)?;
        let inserted = self.results.insert_one(document).await.map_err(persistence)?;
        let id = id_text(&inserted.inserted_id);
        debug!(s_id = %result.s_id, id = %id, "Inserted audio result");
        Ok(id)
    }

    async fn find_by_s_id(&self, s_id: &str) -> Result<Option<StoredDocument>, CollaboratorError> {
        let found = self
            .results
            .find_one(doc! { "s_id": s_id })
            .await
            .map_err(persistence)?;
        Ok(found.map(stored_document))
    }

    async fn latest(&self) -> Result<Option<StoredDocument>, CollaboratorError> {
        let found = self
            .results
            .find_one(doc! {})
            .sort(doc! { "_id": -1 })
            .await
            .map_err(persistence)?;
        Ok(found.map(stored_document))
    }

    async fn insert_comparison(
        &self,
        record: &ComparisonRecord,
    ) -> Result<String, CollaboratorError> {
        let document = comparison_document(record)?;
        let inserted = self
            .comparisons
            .insert_one(document)
            .await
            .map_err(persistence)?;
        Ok(id_text(&inserted.inserted_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use serde_json::json;

    #[test]
    fn audio_result_keeps_nested_insights() {
        let document = audio_result_document(&AudioResult {
            s_id: "C1".into(),
            transcription: "[00:00] Agent: Hi".into(),
            summary: "Room Type: single".into(),
            insights: json!({"Cost": null, "RoomDetails": {"requested_type": "single"}}),
        })
        .unwrap();

        assert_eq!(document.get_str("s_id").unwrap(), "C1");
        let insights = document.get_document("insights").unwrap();
        assert_eq!(insights.get("Cost"), Some(&Bson::Null));
        assert_eq!(
            insights.get_document("RoomDetails").unwrap().get_str("requested_type").unwrap(),
            "single"
        );
    }

    #[test]
    fn stored_document_flattens_object_id() {
        let oid = ObjectId::parse_str("65f0c0ffee0000000000beef").unwrap();
        let stored = stored_document(doc! {
            "_id": oid,
            "s_id": "C1",
            "insights": {"Cost": "9500"},
        });

        assert_eq!(stored.id, "65f0c0ffee0000000000beef");
        assert_eq!(stored.body["_id"], "65f0c0ffee0000000000beef");
        assert_eq!(stored.s_id(), Some("C1"));
        assert_eq!(stored.insights(), Some(&json!({"Cost": "9500"})));
    }

    #[test]
    fn id_text_renders_other_types() {
        assert_eq!(id_text(&Bson::String("abc".into())), "abc");
        assert_eq!(id_text(&Bson::Int32(7)), "7");
    }
}
