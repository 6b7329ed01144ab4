#![doc = "recording-sync-core: core logic library for recording-sync."]

//! This crate holds the logic that does not depend on any particular external
//! client: nested record extraction, the reset-then-populate directory sync,
//! recording date filtering, model output parsing, and the pipeline that
//! drives the collaborators declared in [`contract`].
//!
//! # Usage
//! The `recording-sync` binary implements the [`contract`] traits with real
//! GraphQL, Gemini, MongoDB and XLSX clients and calls into [`pipeline`].

pub mod config;
pub mod contract;
pub mod directory_sync;
pub mod error;
pub mod extract;
pub mod parse;
pub mod pipeline;
pub mod recordings;
pub mod sheet;

pub use directory_sync::DirectorySync;
pub use error::{CollaboratorError, PipelineError, SyncError};
pub use extract::{extract_resource_pairs, RawRecord, RecordExtractor, ResourcePair};
pub use parse::ParseOutcome;
pub use recordings::DateRange;
