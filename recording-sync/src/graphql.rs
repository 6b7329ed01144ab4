//! GraphQL call data source: posts `getCallDataTranscribe` and returns the raw records.

use async_trait::async_trait;
use recording_sync_core::contract::CallDataSource;
use recording_sync_core::error::CollaboratorError;
use recording_sync_core::extract::RawRecord;
use recording_sync_core::recordings::DateRange;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

pub const QUERY_FIELD: &str = "getCallDataTranscribe";

const ENTITY_FIELDS: &[&str] = &[
    "s3Uploaded",
    "entityId",
    "callId",
    "entityName",
    "state",
    "phone",
    "city",
    "country",
    "status",
    "description",
    "securityDeposit",
    "minRent",
    "maxRent",
    "ownerName",
    "email",
    "startedYear",
    "fullTimeWarden",
    "visitorsAllowed",
    "website",
    "entityType",
    "totalBeds",
];

/// Query text, with `fromDate`/`toDate` arguments for each bound of `range`.
pub fn build_query(range: Option<&DateRange>) -> String {
    let mut args = Vec::new();
    if let Some(range) = range {
        let (from, to) = range.query_bounds();
        if let Some(from) = from {
            args.push(format!("fromDate: \"{from}\""));
        }
        if let Some(to) = to {
            args.push(format!("toDate: \"{to}\""));
        }
    }
    let args = if args.is_empty() {
        String::new()
    } else {
        format!("({})", args.join(", "))
    };
    format!(
        "query GetCallData {{ {QUERY_FIELD}{args} {{ {} Recordings {{ s3Url dateCreatedInUpdates }} }} }}",
        ENTITY_FIELDS.join(" ")
    )
}

#[derive(Debug, Clone)]
pub struct GraphqlClient {
    endpoint: String,
    client: reqwest::Client,
}

impl GraphqlClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(endpoint, reqwest::Client::new())
    }

    pub fn with_client(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CallDataSource for GraphqlClient {
    async fn fetch_call_data(
        &self,
        range: Option<DateRange>,
    ) -> Result<Vec<RawRecord>, CollaboratorError> {
        let query = build_query(range.as_ref());
        debug!(endpoint = %self.endpoint, query = %query, "Posting GraphQL query");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, endpoint = %self.endpoint, "GraphQL request failed");
                CollaboratorError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                status = status.as_u16(),
                body = %body,
                "GraphQL endpoint returned error status"
            );
            return Err(CollaboratorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await.map_err(|e| {
            error!(error = ?e, "GraphQL response is not JSON");
            CollaboratorError::MalformedResponse(e.to_string())
        })?;

        if let Some(errors) = payload.get("errors") {
            warn!(errors = %errors, "GraphQL response carries errors");
        }

        match payload
            .get("data")
            .and_then(|d| d.get(QUERY_FIELD))
            .and_then(Value::as_array)
        {
            Some(records) => {
                info!(records = records.len(), "Fetched call records");
                Ok(records.clone())
            }
            None => {
                warn!("GraphQL response has no {QUERY_FIELD} data, treating as empty");
                Ok(Vec::new())
            }
        }
    }
}
