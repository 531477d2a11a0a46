use std::sync::Arc;

use crate::manifest::parse_manifest;
use crate::part::RawFilePart;
use crate::preparer::{prepare, PreparedBatch};
use crate::reconciler::{manifest_part, reconcile, validate_batch};
use crate::report::BatchReport;
use crate::scan::VirusScanner;
use crate::{IngestConfig, IngestError};

/// Why a batch was not forwarded.
#[derive(Debug)]
pub enum Rejection {
    /// A batch-level error. Nothing was validated to completion.
    Fatal(IngestError),
    /// Every file was validated and at least one did not pass.
    Invalid(BatchReport),
}

impl From<IngestError> for Rejection {
    fn from(e: IngestError) -> Self {
        Rejection::Fatal(e)
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Fatal(e) => write!(f, "{e}"),
            Rejection::Invalid(report) => write!(
                f,
                "{} of {} files failed validation",
                report.rejected_files().count(),
                report.file_count()
            ),
        }
    }
}

impl std::error::Error for Rejection {}

/// Runs a batch from raw parts to upload-ready files.
///
/// Holds no state between batches; the same pipeline can process any number
/// of batches concurrently.
#[derive(Clone)]
pub struct AttachmentPipeline {
    config: IngestConfig,
    scanner: Arc<dyn VirusScanner>,
}

impl AttachmentPipeline {
    /// Pipeline with the production limits.
    pub fn new<S: VirusScanner + 'static>(scanner: S) -> Self {
        Self::with_config(IngestConfig::default(), Arc::new(scanner))
    }

    pub fn with_config(config: IngestConfig, scanner: Arc<dyn VirusScanner>) -> Self {
        Self { config, scanner }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Validate a batch and, if every file passes, rename it for upload.
    ///
    /// The manifest is located and parsed before anything else. Batch-level
    /// errors come back as [`Rejection::Fatal`], per-file failures as
    /// [`Rejection::Invalid`]. Either way every part is dropped before this
    /// returns.
    #[tracing::instrument(skip_all, fields(parts = parts.len()))]
    pub async fn process(&self, parts: Vec<RawFilePart>) -> Result<PreparedBatch, Rejection> {
        let groups = parse_manifest(manifest_part(&parts, &self.config)?.data())?;
        let batch = reconcile(parts, groups, &self.config)?;

        let validated = validate_batch(batch, Arc::clone(&self.scanner), &self.config).await?;
        let accepted = validated.into_accepted().map_err(|report| {
            tracing::warn!(
                rejected = report.rejected_files().count(),
                files = report.file_count(),
                "Batch rejected"
            );
            Rejection::Invalid(report)
        })?;

        Ok(prepare(accepted, &self.config))
    }
}
