//! # contract: interfaces to the external systems the pipeline drives
//!
//! The pipeline never talks to GraphQL, Gemini, MongoDB or a spreadsheet
//! library directly. It is generic over the traits below, which the
//! `recording-sync` binary implements with real clients and the tests
//! implement with `mockall` mocks.
//!
//! ## Error handling
//! - Every call returns [`CollaboratorError`]; nothing is retried.
//! - Structured extraction distinguishes transport failure (`Err`) from
//!   unparseable model output (`Ok(ParseOutcome::Unparsed)`).
//!
//! ## Mocking & Testing
//! - Traits carry `automock` under `cfg(test)` or the default
//!   `test-export-mocks` feature, so dependents can use `MockCallDataSource`
//!   and friends in their own tests.

use std::path::Path;

use async_trait::async_trait;
use mockall::automock;
use serde_json::{Map, Value};

use crate::error::CollaboratorError;
use crate::extract::RawRecord;
use crate::parse::ParseOutcome;
use crate::recordings::DateRange;
use crate::sheet::Sheet;

/// Free text produced for one audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInsights {
    /// Timestamped transcription, one `[MM:SS] Speaker: ...` line per segment.
    pub transcription: String,
    /// Labelled summary of the conversation.
    pub summary: String,
}

/// One processed recording, as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioResult {
    pub s_id: String,
    pub transcription: String,
    pub summary: String,
    /// Parsed insight fields, or the `{error, raw_text}` fallback.
    pub insights: Value,
}

/// A document read back from the store, rendered as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Store-assigned id as text.
    pub id: String,
    pub body: Map<String, Value>,
}

impl StoredDocument {
    pub fn s_id(&self) -> Option<&str> {
        self.body.get("s_id").and_then(Value::as_str)
    }

    pub fn insights(&self) -> Option<&Value> {
        self.body.get("insights")
    }
}

/// Result of diffing the website dataset against the call dataset for one s_id.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRecord {
    pub s_id: String,
    pub comparison: Value,
}

/// Source of call records (the GraphQL endpoint).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CallDataSource: Send + Sync {
    /// Fetch call records, restricted server-side to `range` when given.
    /// A response without the expected data is an empty list, not an error.
    async fn fetch_call_data(
        &self,
        range: Option<DateRange>,
    ) -> Result<Vec<RawRecord>, CollaboratorError>;
}

/// Turns a local audio file into transcription and summary text.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AudioProcessor: Send + Sync {
    async fn process_audio(&self, path: &Path) -> Result<AudioInsights, CollaboratorError>;
}

/// Re-emits free text as a record holding only `fields`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract_fields(
        &self,
        text: &str,
        fields: &[String],
    ) -> Result<ParseOutcome, CollaboratorError>;
}

/// Diffs dataset A (website entity info) against dataset B (call insights).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DatasetComparer: Send + Sync {
    async fn compare_datasets(
        &self,
        website: &Value,
        call: &Value,
    ) -> Result<ParseOutcome, CollaboratorError>;
}

/// Insert-only document store. Re-processing an s_id creates a duplicate.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a processed recording, returning the new document id.
    async fn insert_audio_result(&self, result: &AudioResult) -> Result<String, CollaboratorError>;

    /// First stored audio result for `s_id`.
    async fn find_by_s_id(&self, s_id: &str) -> Result<Option<StoredDocument>, CollaboratorError>;

    /// Most recently inserted audio result.
    async fn latest(&self) -> Result<Option<StoredDocument>, CollaboratorError>;

    async fn insert_comparison(
        &self,
        record: &ComparisonRecord,
    ) -> Result<String, CollaboratorError>;
}

/// Writes datasets as named sheets of one workbook.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait SpreadsheetExporter: Send + Sync {
    fn export(&self, path: &Path, sheets: &[Sheet]) -> Result<(), CollaboratorError>;
}
