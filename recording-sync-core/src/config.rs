use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::DateParseError;
use crate::recordings::DateRange;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_AI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017/";

/// Fields extracted from each call summary.
pub const DEFAULT_INSIGHT_FIELDS: &[&str] = &[
    "Room Type",
    "Cost",
    "Desired Location",
    "Available Location",
    "Status of Inhabitant",
    "Required Amenities",
    "Alternative Suggestions",
    "RoomDetails.requested_type",
    "RoomDetails.requested_bathroom_type",
];

/// Whole-process configuration. Static sections come from the YAML file,
/// secrets are injected from the environment by the loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub graphql: GraphqlConfig,
    pub download: DownloadConfig,
    pub ai: AiConfig,
    pub store: StoreConfig,
    pub process: ProcessConfig,
    pub reconcile: ReconcileConfig,
}

impl AppConfig {
    pub fn trace_loaded(&self) {
        info!(
            endpoint = %self.graphql.endpoint,
            output_dir = %self.download.output_dir.display(),
            model = %self.ai.model,
            ai_key_present = self.ai.api_key.is_some(),
            database = %self.store.database,
            "Loaded AppConfig"
        );
        debug!(?self, "AppConfig loaded (full debug)");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphqlConfig {
    pub endpoint: String,
    /// Maximum number of call records kept after filtering.
    pub limit: Option<usize>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    /// Alternative to explicit bounds: look back this many days from `reference_date`.
    pub lookback_days: Option<i64>,
    pub reference_date: Option<String>,
    /// Also filter recordings client-side by their creation date.
    pub filter_recordings: bool,
}

impl Default for GraphqlConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4000/graphql".to_string(),
            limit: None,
            from_date: None,
            to_date: None,
            lookback_days: None,
            reference_date: None,
            filter_recordings: true,
        }
    }
}

impl GraphqlConfig {
    /// Explicit bounds win over a lookback window; neither means no range.
    pub fn date_range(&self, now: DateTime<Utc>) -> Result<Option<DateRange>, DateParseError> {
        if self.from_date.is_some() || self.to_date.is_some() {
            return DateRange::parse(self.from_date.as_deref(), self.to_date.as_deref()).map(Some);
        }
        match self.lookback_days {
            Some(days) => DateRange::lookback(self.reference_date.as_deref(), days, now).map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub output_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloads"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub model: String,
    pub base_url: String,
    pub insight_fields: Vec<String>,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_AI_BASE_URL.to_string(),
            insight_fields: DEFAULT_INSIGHT_FIELDS.iter().map(|f| f.to_string()).collect(),
            api_key: None,
        }
    }
}

impl fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("insight_fields", &self.insight_fields)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database: String,
    pub collection: String,
    pub comparisons_collection: String,
    #[serde(skip)]
    pub uri: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: "audio_processing".to_string(),
            collection: "audio_results".to_string(),
            comparisons_collection: "comparisons".to_string(),
            uri: DEFAULT_MONGO_URI.to_string(),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("comparisons_collection", &self.comparisons_collection)
            .field("uri", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// When set, parsed insights are also written as one workbook per recording.
    pub insights_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub output_path: PathBuf,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("matched_calls_from_graphql.xlsx"),
        }
    }
}
