/// CLI interface for recording-sync: command parsing and wiring of the real collaborators.
///
/// All pipeline logic lives in `recording-sync-core`. This module loads the
/// config, builds the GraphQL, Gemini, MongoDB and XLSX clients a command
/// needs, and hands them to the core pipeline functions.
///
/// ## Commands
/// - `fetch`: print the call records for a date range as JSON.
/// - `download`: fetch, extract recording URLs and sync them into a directory.
/// - `process`: transcribe and summarise every downloaded file, then store it.
/// - `reconcile`: match stored s_ids with call records and write a workbook.
/// - `run`: download, process, then reconcile what was stored.
///
/// Every command takes `--config <FILE>`; see [`crate::load_config`] for the
/// environment variables that supply endpoints and secrets.
use crate::gemini::GeminiClient;
use crate::graphql::GraphqlClient;
use crate::load_config::{load_config, AI_KEY_ENVS};
use crate::mongo::MongoStore;
use crate::xlsx::XlsxExporter;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use recording_sync_core::config::AppConfig;
use recording_sync_core::contract::CallDataSource;
use recording_sync_core::directory_sync::DirectorySync;
use recording_sync_core::pipeline::{
    compare_matches, download_recordings, process_directory, reconcile, DownloadOptions,
    FileOutcome, ProcessOptions, ReconcileOptions,
};
use recording_sync_core::recordings::{retain_recordings_in_range, DateRange};
use std::path::PathBuf;

/// CLI for recording-sync: download call recordings and turn them into structured insights.
#[derive(Parser)]
#[clap(
    name = "recording-sync",
    version,
    about = "Download call recordings, extract insights with Gemini and reconcile them against call data"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

/// Explicit date bounds. Either one replaces the range from the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct RangeArgs {
    /// Start of the range, `YYYY-MM-DD` or an ISO 8601 timestamp
    #[clap(long)]
    pub from: Option<String>,
    /// End of the range, a date-only value covers the whole day
    #[clap(long)]
    pub to: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print call records as JSON
    Fetch {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        #[clap(flatten)]
        range: RangeArgs,
    },
    /// Download recordings into the output directory, replacing its contents
    Download {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        #[clap(flatten)]
        range: RangeArgs,
        /// Overrides `download.output_dir`
        #[clap(long)]
        dir: Option<PathBuf>,
    },
    /// Transcribe, summarise and store every downloaded recording
    Process {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Overrides `download.output_dir`
        #[clap(long)]
        dir: Option<PathBuf>,
    },
    /// Match stored s_ids against call records and export a workbook
    Reconcile {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// s_id to reconcile, repeatable; defaults to the latest stored document
        #[clap(long = "s-id")]
        s_ids: Vec<String>,
        /// Overrides `reconcile.output_path`
        #[clap(long)]
        output: Option<PathBuf>,
        /// Also compare each match with Gemini and store the comparison
        #[clap(long)]
        compare: bool,
    },
    /// Download, process, then reconcile everything that was stored
    Run {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Range from CLI flags when given, else from the `graphql` config section.
pub fn resolve_range(config: &AppConfig, args: &RangeArgs) -> Result<Option<DateRange>> {
    if args.from.is_some() || args.to.is_some() {
        let range = DateRange::parse(args.from.as_deref(), args.to.as_deref())
            .context("Invalid --from/--to")?;
        return Ok(Some(range));
    }
    config
        .graphql
        .date_range(Utc::now())
        .context("Invalid date range in graphql config")
}

fn gemini_client(config: &AppConfig) -> Result<GeminiClient> {
    let key = config.ai.api_key.clone().ok_or_else(|| {
        tracing::error!(vars = ?AI_KEY_ENVS, "Gemini API key missing");
        anyhow!("Gemini API key not found, set one of {}", AI_KEY_ENVS.join(", "))
    })?;
    Ok(GeminiClient::new(key, config.ai.model.clone()).with_base_url(config.ai.base_url.clone()))
}

async fn mongo_store(config: &AppConfig) -> Result<MongoStore> {
    MongoStore::connect(&config.store.uri, &config.store)
        .await
        .context("Failed to set up MongoDB store")
}

fn download_options(
    config: &AppConfig,
    range: Option<DateRange>,
    dir: Option<PathBuf>,
) -> DownloadOptions {
    DownloadOptions {
        output_dir: dir.unwrap_or_else(|| config.download.output_dir.clone()),
        range,
        filter_recordings: config.graphql.filter_recordings,
        limit: config.graphql.limit,
    }
}

fn process_options(config: &AppConfig, dir: Option<PathBuf>) -> ProcessOptions {
    ProcessOptions {
        dir: dir.unwrap_or_else(|| config.download.output_dir.clone()),
        fields: config.ai.insight_fields.clone(),
        insights_dir: config.process.insights_dir.clone(),
    }
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Fetch { config, range } => {
            let config = load_config(config)?;
            let range = resolve_range(&config, &range)?;
            tracing::info!(
                command = "fetch",
                endpoint = %config.graphql.endpoint,
                "Fetching call records"
            );
            let source = GraphqlClient::new(config.graphql.endpoint.clone());
            let mut records = source
                .fetch_call_data(range)
                .await
                .context("Call data query failed")?;
            if let (Some(range), true) = (range, config.graphql.filter_recordings) {
                records = retain_recordings_in_range(records, &range);
            }
            if let Some(limit) = config.graphql.limit {
                records.truncate(limit);
            }
            println!("{}", serde_json::to_string_pretty(&records)?);
            tracing::info!(command = "fetch", records = records.len(), "Fetch complete");
            Ok(())
        }
        Commands::Download { config, range, dir } => {
            let config = load_config(config)?;
            let range = resolve_range(&config, &range)?;
            let source = GraphqlClient::new(config.graphql.endpoint.clone());
            let options = download_options(&config, range, dir);
            tracing::info!(command = "download", "Starting download");
            let report = download_recordings(&source, &DirectorySync::new(), &options).await?;
            for file in &report.files {
                println!("{}", file.display());
            }
            tracing::info!(
                command = "download",
                records = report.records,
                pairs = report.pairs.len(),
                files = report.files.len(),
                "Download complete"
            );
            Ok(())
        }
        Commands::Process { config, dir } => {
            let config = load_config(config)?;
            let gemini = gemini_client(&config)?;
            let store = mongo_store(&config).await?;
            let options = process_options(&config, dir);
            tracing::info!(
                command = "process",
                dir = %options.dir.display(),
                "Starting processing"
            );
            let report =
                process_directory(&gemini, &gemini, &store, &XlsxExporter::new(), &options)
                    .await?;
            for file in &report.files {
                println!("{}\t{:?}", file.s_id, file.outcome);
            }
            tracing::info!(
                command = "process",
                files = report.files.len(),
                stored = report.stored(),
                "Processing complete"
            );
            Ok(())
        }
        Commands::Reconcile {
            config,
            s_ids,
            output,
            compare,
        } => {
            let config = load_config(config)?;
            let range = resolve_range(&config, &RangeArgs::default())?;
            let source = GraphqlClient::new(config.graphql.endpoint.clone());
            let store = mongo_store(&config).await?;
            let options = ReconcileOptions {
                s_ids,
                range,
                output_path: output.unwrap_or_else(|| config.reconcile.output_path.clone()),
            };
            tracing::info!(command = "reconcile", "Starting reconciliation");
            let report = reconcile(&source, &store, &XlsxExporter::new(), &options).await?;
            match &report.output {
                Some(path) => println!("{}", path.display()),
                None => println!("No matching call records"),
            }
            if compare {
                let gemini = gemini_client(&config)?;
                let compared = compare_matches(&gemini, &store, &report).await;
                tracing::info!(command = "reconcile", ?compared, "Comparison complete");
            }
            tracing::info!(
                command = "reconcile",
                matched = report.matched.len(),
                unmatched = report.unmatched.len(),
                "Reconciliation complete"
            );
            Ok(())
        }
        Commands::Run { config } => {
            let config = load_config(config)?;
            let range = resolve_range(&config, &RangeArgs::default())?;
            let gemini = gemini_client(&config)?;
            let store = mongo_store(&config).await?;
            let source = GraphqlClient::new(config.graphql.endpoint.clone());
            let exporter = XlsxExporter::new();

            tracing::info!(command = "run", "Starting download");
            let download = download_options(&config, range, None);
            let downloaded =
                download_recordings(&source, &DirectorySync::new(), &download).await?;
            tracing::info!(command = "run", files = downloaded.files.len(), "Download complete");

            let process = process_options(&config, None);
            let processed =
                process_directory(&gemini, &gemini, &store, &exporter, &process).await?;
            let s_ids: Vec<String> = processed
                .files
                .iter()
                .filter(|f| matches!(f.outcome, FileOutcome::Stored { .. }))
                .map(|f| f.s_id.clone())
                .collect();
            tracing::info!(command = "run", stored = s_ids.len(), "Processing complete");

            if s_ids.is_empty() {
                tracing::warn!(command = "run", "Nothing stored, skipping reconciliation");
                return Ok(());
            }
            let options = ReconcileOptions {
                s_ids,
                range,
                output_path: config.reconcile.output_path.clone(),
            };
            let report = reconcile(&source, &store, &exporter, &options).await?;
            if let Some(path) = &report.output {
                println!("{}", path.display());
            }
            tracing::info!(command = "run", matched = report.matched.len(), "Run complete");
            Ok(())
        }
    }
}
