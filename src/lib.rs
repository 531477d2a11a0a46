//! # vedlegg-ingest
//!
//! Validation, classification and renaming of attachment batches uploaded to
//! a case.
//!
//! ## What this crate does
//!
//! A batch is one `metadata.json` manifest plus the files it describes. For
//! every batch the pipeline:
//!
//! 1. **Reconciles** the uploaded parts against the manifest (every part must
//!    belong to exactly one expected file, and vice versa).
//! 2. **Scans** each file with the configured virus scanner. A single hit
//!    aborts the whole batch.
//! 3. **Classifies** each file from its bytes, never from its name, into PDF,
//!    JPEG, PNG or UNKNOWN.
//! 4. **Validates** PDFs structurally (encrypted and corrupt documents are
//!    refused) and applies the filename policy.
//! 5. **Renames** every file of an accepted batch to
//!    `<base>-<short id>.<extension of the detected type>`.
//!
//! Nothing is forwarded unless every file in every group is accepted.
//!
//! ## Quick example
//!
//! ```no_run
//! use vedlegg_ingest::{AttachmentPipeline, NoopScanner, RawFilePart, Rejection};
//!
//! # async fn run(parts: Vec<RawFilePart>) -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = AttachmentPipeline::new(NoopScanner);
//!
//! match pipeline.process(parts).await {
//!     Ok(prepared) => {
//!         for file in prepared.files() {
//!             println!("{} ({}, {} bytes)", file.final_filename, file.mimetype, file.size);
//!         }
//!     }
//!     Err(Rejection::Fatal(e)) => eprintln!("batch refused: {e}"),
//!     Err(Rejection::Invalid(report)) => {
//!         for (group, file) in report.rejected_files() {
//!             eprintln!("{}: {} -> {:?}", group.kind, file.filename, file.outcome);
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

mod category;
mod filename;
mod manifest;
mod part;
mod pipeline;
mod preparer;
mod reconciler;
mod report;
mod scan;
mod sniff;
mod validation;
mod validator;

#[cfg(test)]
mod fixtures;

pub use category::FileCategory;
pub use filename::{contains_illegal_characters, finalize, sanitize, split_file_name, FileNameSplit};
pub use manifest::{parse_manifest, ExpectedFile, FileIdentifier, GroupInfo, OriginEventType, UploadGroup};
pub use part::{read_batch_dir, RawFilePart};
pub use pipeline::{AttachmentPipeline, Rejection};
pub use preparer::{
    prepare, AttachmentSpec, AttachmentSpecification, FileSpec, FinalizedFile, PreparedBatch, PreparedGroup, UPLOADED_STATUS,
};
pub use reconciler::{
    reconcile, validate_batch, AcceptedBatch, AcceptedFile, AcceptedGroup, BoundFile, BoundGroup, ReconciledBatch,
    ValidatedBatch,
};
pub use report::{BatchReport, FileVerdict, GroupVerdict};
pub use scan::{HttpScannerConfig, HttpVirusScanner, NoopScanner, ScanFailure, VirusScanner};
pub use sniff::{sniff, SniffedType};
pub use validation::{validate_file, ValidationOutcome, ValidationResult};
pub use validator::check_pdf;

// ── Limits ───────────────────────────────────────────────────────────────────

/// Reserved filename of the manifest part. Compared case-sensitively.
pub const MANIFEST_FILENAME: &str = "metadata.json";

/// Maximum number of non-manifest parts in one batch.
pub const MAX_FILE_COUNT: usize = 30;

/// Maximum size of a single uploaded file (10 MiB).
pub const MAX_TOTAL_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum length, in characters, of the base name kept when renaming.
pub const MAX_BASE_NAME_LEN: usize = 50;

/// Default bound on concurrently running per-file validations.
pub const DEFAULT_MAX_CONCURRENT_VALIDATIONS: usize = 8;

// ── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration for [`AttachmentPipeline`].
///
/// `Default` yields the production limits.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Filename identifying the manifest part.
    pub manifest_name: String,

    /// A batch with more non-manifest parts than this is refused with
    /// [`IngestError::BatchTooLarge`].
    pub max_file_count: usize,

    /// Files larger than this many bytes get
    /// [`ValidationOutcome::FileTooLarge`].
    pub max_file_size: u64,

    /// Base names are cut to this many characters before the identifier
    /// suffix and extension are appended.
    pub max_base_name_len: usize,

    /// Upper bound on per-file validations in flight at once.
    pub max_concurrent_validations: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            manifest_name: MANIFEST_FILENAME.to_string(),
            max_file_count: MAX_FILE_COUNT,
            max_file_size: MAX_TOTAL_FILE_SIZE,
            max_base_name_len: MAX_BASE_NAME_LEN,
            max_concurrent_validations: DEFAULT_MAX_CONCURRENT_VALIDATIONS,
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Batch-level errors. Each one aborts the whole batch.
///
/// Problems with individual files are not errors; they are reported as a
/// [`ValidationOutcome`] inside a [`BatchReport`].
#[derive(Error, Debug)]
pub enum IngestError {
    /// No part named like the manifest was uploaded.
    #[error("Missing {0} in upload")]
    MissingManifest(String),

    /// The manifest could not be deserialized or breaks an identifier rule.
    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    /// The batch contains a manifest but no files.
    #[error("No files in upload")]
    EmptyBatch,

    /// More files than [`IngestConfig::max_file_count`].
    #[error("Too many files in upload: {count} (max {max})")]
    BatchTooLarge { count: usize, max: usize },

    /// An uploaded part does not belong to any file in the manifest.
    #[error("Uploaded file '{0}' does not match any file in the manifest")]
    UnmatchedFile(String),

    /// A manifest entry has no uploaded part.
    #[error("File '{filename}' ({identifier}) is listed in the manifest but was not uploaded")]
    MissingFile { filename: String, identifier: String },

    /// Two uploaded parts carry the same identifier.
    #[error("More than one uploaded file carries identifier '{0}'")]
    DuplicateFile(String),

    /// The virus scanner refused a file, or could not be consulted.
    #[error("Virus scan failed: {0}")]
    ScanFailure(#[from] ScanFailure),

    /// A validation task panicked or was cancelled.
    #[error("Validation task failed: {0}")]
    TaskFailed(String),

    /// A filesystem I/O error occurred (e.g. when reading a batch directory).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self {
        IngestError::MalformedManifest(e.to_string())
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, IngestError>;
