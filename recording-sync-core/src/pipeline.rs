//! High-level pipeline: orchestrates fetch → download → process → reconcile.
//!
//! Each step is a free async function generic over the collaborator traits in
//! [`crate::contract`], so the CLI wires in real clients and tests wire in
//! mocks.
//!
//! # Steps
//! - [`download_recordings`]: query call records, optionally narrow them by
//!   recording date, extract (identifier, locator) pairs and sync them into
//!   the download directory.
//! - [`process_directory`]: send every downloaded file through the AI
//!   processor and structured extractor, then persist the result.
//! - [`reconcile`]: match stored s_ids against the call records and export
//!   both sides as a workbook.
//! - [`compare_matches`]: ask the comparer to diff each matched pair and
//!   store the comparison.
//!
//! # Error Handling
//! Steps run strictly in sequence and nothing is retried. Per-item failures
//! (one file, one s_id) are logged and reported; only failures that leave the
//! whole step without meaning (query failure, directory reset failure, no
//! records) return `Err`. Partial completion is normal: a file downloaded or
//! a document stored stays in place when a later step fails.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::contract::{
    AudioProcessor, AudioResult, CallDataSource, ComparisonRecord, DatasetComparer, DocumentStore,
    SpreadsheetExporter, StoredDocument, StructuredExtractor,
};
use crate::directory_sync::DirectorySync;
use crate::error::PipelineError;
use crate::extract::{
    identifier_text, RecordExtractor, ResourcePair, DEFAULT_IDENTIFIER_KEY, DEFAULT_LOCATOR_KEY,
};
use crate::parse::{flatten_object, ParseOutcome};
use crate::recordings::{retain_recordings_in_range, DateRange, RECORDINGS_KEY, RECORDING_DATE_KEY};
use crate::sheet::Sheet;

pub const MATCHED_SHEET: &str = "Matched_Entities";
pub const DOCUMENTS_SHEET: &str = "MongoDB_Full_Docs";
pub const INSIGHTS_SHEET: &str = "Insights";

/// Inputs of [`download_recordings`].
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub output_dir: PathBuf,
    pub range: Option<DateRange>,
    /// Narrow records to recordings created inside `range`.
    pub filter_recordings: bool,
    /// Keep at most this many records, applied after filtering.
    pub limit: Option<usize>,
}

#[derive(Debug)]
pub struct DownloadReport {
    pub records: usize,
    pub pairs: Vec<ResourcePair>,
    pub files: Vec<PathBuf>,
}

pub async fn download_recordings<S>(
    source: &S,
    sync: &DirectorySync,
    options: &DownloadOptions,
) -> Result<DownloadReport, PipelineError>
where
    S: CallDataSource + ?Sized,
{
    info!(
        output_dir = %options.output_dir.display(),
        range = ?options.range,
        "[DOWNLOAD] Fetching call records"
    );

    let mut records = match source.fetch_call_data(options.range).await {
        Ok(records) => {
            info!(records = records.len(), "[DOWNLOAD] Call records fetched");
            records
        }
        Err(e) => {
            error!(error = %e, "[DOWNLOAD][ERROR] Call data query failed");
            return Err(e.into());
        }
    };

    if let (Some(range), true) = (options.range, options.filter_recordings) {
        records = retain_recordings_in_range(records, &range);
        info!(records = records.len(), "[DOWNLOAD] Records with recordings in range");
    }
    if let Some(limit) = options.limit {
        records.truncate(limit);
    }

    let extractor = RecordExtractor::default();
    let pairs: Vec<ResourcePair> = records.iter().flat_map(|r| extractor.extract(r)).collect();
    info!(pairs = pairs.len(), "[DOWNLOAD] Found recordings to download");

    let files = sync.sync(&options.output_dir, &pairs).await?;

    Ok(DownloadReport {
        records: records.len(),
        pairs,
        files,
    })
}

/// Inputs of [`process_directory`].
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub dir: PathBuf,
    pub fields: Vec<String>,
    pub insights_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Stored { document_id: String, parsed: bool },
    /// Processing succeeded but the insert failed; nothing was rolled back.
    StoreFailed { parsed: bool, error: String },
    ProcessingFailed(String),
}

#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub s_id: String,
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

#[derive(Debug, Default)]
pub struct ProcessReport {
    pub files: Vec<ProcessedFile>,
}

impl ProcessReport {
    pub fn stored(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Stored { .. }))
            .count()
    }
}

/// `s_id` of a downloaded file: its file name up to the first `.`.
pub fn s_id_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.split('.').next().filter(|s| !s.is_empty()).map(str::to_owned)
}

pub async fn process_directory<P, X, D, E>(
    processor: &P,
    extractor: &X,
    store: &D,
    exporter: &E,
    options: &ProcessOptions,
) -> Result<ProcessReport, PipelineError>
where
    P: AudioProcessor + ?Sized,
    X: StructuredExtractor + ?Sized,
    D: DocumentStore + ?Sized,
    E: SpreadsheetExporter + ?Sized,
{
    let files = list_files(&options.dir)?;
    info!(
        dir = %options.dir.display(),
        files = files.len(),
        "[PROCESS] Processing downloaded recordings"
    );

    let mut report = ProcessReport::default();
    for path in files {
        let Some(s_id) = s_id_from_path(&path) else {
            warn!(path = %path.display(), "[PROCESS] Skipping file without usable name");
            continue;
        };
        let outcome =
            process_file(processor, extractor, store, exporter, options, &s_id, &path).await;
        report.files.push(ProcessedFile { s_id, path, outcome });
    }

    info!(
        processed = report.files.len(),
        stored = report.stored(),
        "[PROCESS] Directory processing finished"
    );
    Ok(report)
}

async fn process_file<P, X, D, E>(
    processor: &P,
    extractor: &X,
    store: &D,
    exporter: &E,
    options: &ProcessOptions,
    s_id: &str,
    path: &Path,
) -> FileOutcome
where
    P: AudioProcessor + ?Sized,
    X: StructuredExtractor + ?Sized,
    D: DocumentStore + ?Sized,
    E: SpreadsheetExporter + ?Sized,
{
    info!(s_id, path = %path.display(), "[PROCESS] Processing recording");

    let insights = match processor.process_audio(path).await {
        Ok(insights) => insights,
        Err(e) => {
            error!(s_id, error = %e, "[PROCESS][ERROR] Audio processing failed");
            return FileOutcome::ProcessingFailed(e.to_string());
        }
    };

    let parsed = match extractor.extract_fields(&insights.summary, &options.fields).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(s_id, error = %e, "[PROCESS][ERROR] Structured extraction failed");
            return FileOutcome::ProcessingFailed(e.to_string());
        }
    };
    if let ParseOutcome::Unparsed { error, .. } = &parsed {
        warn!(s_id, error = %error, "[PROCESS] Summary could not be parsed, storing raw text");
    }

    if let (Some(dir), ParseOutcome::Parsed(value)) = (&options.insights_dir, &parsed) {
        export_insights(exporter, dir, s_id, value);
    }

    let result = AudioResult {
        s_id: s_id.to_string(),
        transcription: insights.transcription,
        summary: insights.summary,
        insights: parsed.to_value(),
    };
    match store.insert_audio_result(&result).await {
        Ok(document_id) => {
            info!(s_id, document_id = %document_id, "[PROCESS] Stored audio result");
            FileOutcome::Stored {
                document_id,
                parsed: parsed.is_parsed(),
            }
        }
        Err(e) => {
            error!(s_id, error = %e, "[PROCESS][ERROR] Failed to store audio result");
            FileOutcome::StoreFailed {
                parsed: parsed.is_parsed(),
                error: e.to_string(),
            }
        }
    }
}

fn export_insights<E>(exporter: &E, dir: &Path, s_id: &str, insights: &Value)
where
    E: SpreadsheetExporter + ?Sized,
{
    if let Err(e) = std::fs::create_dir_all(dir) {
        error!(
            error = ?e,
            path = %dir.display(),
            "[PROCESS][ERROR] Failed to create insights directory"
        );
        return;
    }
    let path = dir.join(format!("audio_insights_{s_id}.xlsx"));
    let sheet = Sheet::from_records(INSIGHTS_SHEET, &[flatten_object(insights)]);
    match exporter.export(&path, &[sheet]) {
        Ok(()) => debug!(path = %path.display(), "[PROCESS] Exported insights workbook"),
        Err(e) => error!(
            error = %e,
            path = %path.display(),
            "[PROCESS][ERROR] Failed to export insights"
        ),
    }
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let read_err = |source: std::io::Error| PipelineError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Inputs of [`reconcile`]. An empty `s_ids` means "the latest stored document".
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub s_ids: Vec<String>,
    pub range: Option<DateRange>,
    pub output_path: PathBuf,
}

/// A call record matched to an s_id.
#[derive(Debug, Clone)]
pub struct MatchedEntity {
    pub s_id: String,
    /// The call record without its recordings, plus recording summary columns.
    pub entity: Map<String, Value>,
    pub document: Option<StoredDocument>,
}

#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Workbook written, `None` when nothing matched.
    pub output: Option<PathBuf>,
    pub matched: Vec<MatchedEntity>,
    pub unmatched: Vec<String>,
}

pub async fn reconcile<S, D, E>(
    source: &S,
    store: &D,
    exporter: &E,
    options: &ReconcileOptions,
) -> Result<ReconcileReport, PipelineError>
where
    S: CallDataSource + ?Sized,
    D: DocumentStore + ?Sized,
    E: SpreadsheetExporter + ?Sized,
{
    let s_ids = if options.s_ids.is_empty() {
        let latest = store.latest().await?.ok_or(PipelineError::NoStoredDocument)?;
        let s_id = latest.s_id().ok_or(PipelineError::NoStoredDocument)?.to_string();
        info!(s_id = %s_id, "[RECONCILE] Using latest stored s_id");
        vec![s_id]
    } else {
        options.s_ids.clone()
    };

    let records = source.fetch_call_data(options.range).await?;
    if records.is_empty() {
        error!("[RECONCILE][ERROR] No call records returned");
        return Err(PipelineError::NoRecords);
    }

    let mut report = ReconcileReport::default();
    for s_id in s_ids {
        let Some(record) = records.iter().find(|r| {
            let call_id = r.get(DEFAULT_IDENTIFIER_KEY).and_then(identifier_text);
            call_id.as_deref() == Some(s_id.as_str())
        }) else {
            warn!(s_id = %s_id, "[RECONCILE] No call record matches s_id");
            report.unmatched.push(s_id);
            continue;
        };
        info!(s_id = %s_id, "[RECONCILE] Matched call record");

        let document = match store.find_by_s_id(&s_id).await {
            Ok(doc) => doc,
            Err(e) => {
                error!(s_id = %s_id, error = %e, "[RECONCILE][ERROR] Document lookup failed");
                None
            }
        };
        report.matched.push(MatchedEntity {
            entity: entity_row(record),
            s_id,
            document,
        });
    }

    if report.matched.is_empty() {
        warn!("[RECONCILE] No matches for any s_id, no workbook written");
        return Ok(report);
    }

    let matched_rows: Vec<Map<String, Value>> = report.matched.iter().map(matched_row).collect();
    let document_rows: Vec<Map<String, Value>> = report
        .matched
        .iter()
        .filter_map(|m| m.document.as_ref().map(|d| d.body.clone()))
        .collect();
    let sheets = [
        Sheet::from_records(MATCHED_SHEET, &matched_rows),
        Sheet::from_records(DOCUMENTS_SHEET, &document_rows),
    ];
    exporter.export(&options.output_path, &sheets)?;
    info!(
        path = %options.output_path.display(),
        matched = report.matched.len(),
        "[RECONCILE] Workbook written"
    );

    report.output = Some(options.output_path.clone());
    Ok(report)
}

/// Call record fields without the nested recordings, plus
/// `recordings_count`, `first_recording_url` and `first_recording_date`
/// when the record has recordings.
pub fn entity_row(record: &Value) -> Map<String, Value> {
    let mut row = record.as_object().cloned().unwrap_or_default();
    let recordings = row.shift_remove(RECORDINGS_KEY);
    if let Some(Value::Array(recordings)) = recordings {
        if let Some(first) = recordings.first() {
            let field = |key: &str| first.get(key).cloned().unwrap_or(Value::Null);
            row.insert("recordings_count".into(), Value::from(recordings.len()));
            row.insert("first_recording_url".into(), field(DEFAULT_LOCATOR_KEY));
            row.insert("first_recording_date".into(), field(RECORDING_DATE_KEY));
        }
    }
    row
}

fn matched_row(matched: &MatchedEntity) -> Map<String, Value> {
    let mut row = Map::new();
    row.insert(
        "_id".into(),
        matched
            .document
            .as_ref()
            .map(|d| Value::String(d.id.clone()))
            .unwrap_or(Value::Null),
    );
    row.insert("source".into(), Value::String("A".into()));
    row.insert("s_id".into(), Value::String(matched.s_id.clone()));
    for (key, value) in &matched.entity {
        row.insert(key.clone(), value.clone());
    }
    row
}

#[derive(Debug, Default)]
pub struct CompareReport {
    pub stored: Vec<String>,
    /// Matched s_ids without a stored document to compare against.
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Compare every matched entity with its stored call insights and persist the result.
pub async fn compare_matches<C, D>(
    comparer: &C,
    store: &D,
    report: &ReconcileReport,
) -> CompareReport
where
    C: DatasetComparer + ?Sized,
    D: DocumentStore + ?Sized,
{
    let mut out = CompareReport::default();
    for matched in &report.matched {
        let s_id = matched.s_id.clone();
        let Some(document) = &matched.document else {
            warn!(s_id = %s_id, "[COMPARE] No stored document, skipping comparison");
            out.skipped.push(s_id);
            continue;
        };

        let website = Value::Object(matched.entity.clone());
        let call = document
            .insights()
            .cloned()
            .unwrap_or_else(|| Value::Object(document.body.clone()));

        let outcome = match comparer.compare_datasets(&website, &call).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(s_id = %s_id, error = %e, "[COMPARE][ERROR] Comparison failed");
                out.failed.push(s_id);
                continue;
            }
        };

        let record = ComparisonRecord {
            s_id: s_id.clone(),
            comparison: outcome.to_value(),
        };
        match store.insert_comparison(&record).await {
            Ok(id) => {
                info!(s_id = %s_id, document_id = %id, "[COMPARE] Stored comparison");
                out.stored.push(s_id);
            }
            Err(e) => {
                error!(s_id = %s_id, error = %e, "[COMPARE][ERROR] Failed to store comparison");
                out.failed.push(s_id);
            }
        }
    }
    out
}
