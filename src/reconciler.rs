//! Binds uploaded parts to the manifest and validates the batch.
//!
//! Batch-level problems abort with an [`IngestError`]. Per-file problems are
//! collected into a [`BatchReport`].

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::category::FileCategory;
use crate::filename::sanitize;
use crate::manifest::{ExpectedFile, GroupInfo, UploadGroup};
use crate::part::RawFilePart;
use crate::report::{BatchReport, FileVerdict, GroupVerdict};
use crate::scan::VirusScanner;
use crate::validation::{precheck, validate_file, ValidationResult};
use crate::{IngestConfig, IngestError, Result};

// ── Bound batch ───────────────────────────────────────────────────────────────

/// An expected file together with the part uploaded for it.
#[derive(Debug, Clone)]
pub struct BoundFile {
    pub expected: ExpectedFile,
    pub part: RawFilePart,
}

#[derive(Debug, Clone)]
pub struct BoundGroup {
    pub info: GroupInfo,
    pub files: Vec<BoundFile>,
}

/// Every expected file bound to exactly one part, groups in manifest order.
#[derive(Debug, Clone)]
pub struct ReconciledBatch {
    pub groups: Vec<BoundGroup>,
}

impl ReconciledBatch {
    pub fn file_count(&self) -> usize {
        self.groups.iter().map(|g| g.files.len()).sum()
    }
}

// ── Manifest lookup ───────────────────────────────────────────────────────────

/// The part carrying the manifest: the first one named exactly
/// `config.manifest_name`.
pub(crate) fn manifest_part<'a>(parts: &'a [RawFilePart], config: &IngestConfig) -> Result<&'a RawFilePart> {
    parts
        .iter()
        .find(|p| p.filename == config.manifest_name)
        .ok_or_else(|| IngestError::MissingManifest(config.manifest_name.clone()))
}

// ── reconcile ─────────────────────────────────────────────────────────────────

/// Bind every non-manifest part to the expected file whose identifier equals
/// the part's filename up to its first `.`.
///
/// All-or-nothing: the first part without a matching identifier, a second
/// part for the same identifier, or an expected file without a part aborts
/// the batch.
pub fn reconcile(parts: Vec<RawFilePart>, groups: Vec<UploadGroup>, config: &IngestConfig) -> Result<ReconciledBatch> {
    let files: Vec<RawFilePart> = parts
        .into_iter()
        .filter(|p| p.filename != config.manifest_name)
        .collect();

    if files.is_empty() {
        return Err(IngestError::EmptyBatch);
    }
    if files.len() > config.max_file_count {
        return Err(IngestError::BatchTooLarge {
            count: files.len(),
            max: config.max_file_count,
        });
    }

    let known: HashSet<&str> = groups
        .iter()
        .flat_map(|g| &g.files)
        .map(|f| f.identifier.as_str())
        .collect();

    let mut by_token: HashMap<String, RawFilePart> = HashMap::with_capacity(files.len());
    for part in files {
        let token = part.identifier_token();
        if !known.contains(token) {
            tracing::warn!(filename = %part.filename, "Uploaded file does not match any manifest entry");
            return Err(IngestError::UnmatchedFile(part.filename));
        }
        match by_token.entry(token.to_string()) {
            Entry::Occupied(entry) => return Err(IngestError::DuplicateFile(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(part);
            }
        }
    }

    let groups = groups
        .into_iter()
        .map(|group| {
            let files = group
                .files
                .into_iter()
                .map(|expected| match by_token.remove(expected.identifier.as_str()) {
                    Some(part) => Ok(BoundFile { expected, part }),
                    None => Err(IngestError::MissingFile {
                        filename: expected.original_filename,
                        identifier: expected.identifier.to_string(),
                    }),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(BoundGroup { info: group.info, files })
        })
        .collect::<Result<Vec<_>>>()?;

    let batch = ReconciledBatch { groups };
    tracing::debug!(groups = batch.groups.len(), files = batch.file_count(), "Reconciled batch");
    Ok(batch)
}

// ── validate_batch ────────────────────────────────────────────────────────────

/// Validate every bound file concurrently.
///
/// Per file: size, filename, virus scan, then content. Returns as soon as
/// any scan fails; the remaining validations are aborted and their results
/// discarded.
#[tracing::instrument(skip_all, fields(files = batch.file_count()))]
pub async fn validate_batch(
    batch: ReconciledBatch,
    scanner: Arc<dyn VirusScanner>,
    config: &IngestConfig,
) -> Result<ValidatedBatch> {
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_validations.max(1)));
    let mut tasks = JoinSet::new();

    for (g, group) in batch.groups.iter().enumerate() {
        for (f, file) in group.files.iter().enumerate() {
            let original = sanitize(&file.expected.original_filename);
            let part = file.part.clone();
            let scanner = Arc::clone(&scanner);
            let semaphore = Arc::clone(&semaphore);
            let max_file_size = config.max_file_size;

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| IngestError::TaskFailed(e.to_string()))?;
                let result = validate_one(original, part, scanner.as_ref(), max_file_size).await?;
                Ok::<_, IngestError>((g, f, result))
            });
        }
    }

    let mut results: Vec<Vec<Option<ValidationResult>>> =
        batch.groups.iter().map(|g| vec![None; g.files.len()]).collect();

    // An early return drops `tasks`, which aborts everything still running.
    while let Some(joined) = tasks.join_next().await {
        let (g, f, result) = joined.map_err(|e| IngestError::TaskFailed(e.to_string()))??;
        results[g][f] = Some(result);
    }

    let results = results
        .into_iter()
        .map(|group| group.into_iter().collect::<Option<Vec<_>>>())
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| IngestError::TaskFailed("validation result missing".into()))?;

    Ok(ValidatedBatch { batch, results })
}

async fn validate_one(
    original_filename: String,
    part: RawFilePart,
    scanner: &dyn VirusScanner,
    max_file_size: u64,
) -> Result<ValidationResult> {
    if let Some(rejected) = precheck(&original_filename, &part, max_file_size) {
        return Ok(rejected);
    }

    scanner.scan(&original_filename, part.size(), part.data()).await?;

    tokio::task::spawn_blocking(move || validate_file(&original_filename, &part))
        .await
        .map_err(|e| IngestError::TaskFailed(e.to_string()))
}

// ── Validated / accepted batch ────────────────────────────────────────────────

/// A reconciled batch with one validation result per file.
#[derive(Debug)]
pub struct ValidatedBatch {
    batch: ReconciledBatch,
    results: Vec<Vec<ValidationResult>>,
}

impl ValidatedBatch {
    /// Per-file verdicts, grouped as in the manifest.
    pub fn report(&self) -> BatchReport {
        let groups = self
            .batch
            .groups
            .iter()
            .zip(&self.results)
            .map(|(group, results)| GroupVerdict {
                info: group.info.clone(),
                files: group
                    .files
                    .iter()
                    .zip(results)
                    .map(|(file, result)| FileVerdict {
                        filename: sanitize(&file.expected.original_filename),
                        identifier: file.expected.identifier.clone(),
                        outcome: result.outcome,
                        category: result.category,
                    })
                    .collect(),
            })
            .collect();

        BatchReport { groups }
    }

    pub fn is_accepted(&self) -> bool {
        self.results.iter().flatten().all(ValidationResult::is_ok)
    }

    /// The accepted batch, or the report explaining the rejection. On
    /// rejection every part is dropped.
    pub fn into_accepted(self) -> std::result::Result<AcceptedBatch, BatchReport> {
        if !self.is_accepted() {
            return Err(self.report());
        }

        let groups = self
            .batch
            .groups
            .into_iter()
            .zip(self.results)
            .map(|(group, results)| AcceptedGroup {
                info: group.info,
                files: group
                    .files
                    .into_iter()
                    .zip(results)
                    .map(|(file, result)| AcceptedFile {
                        expected: file.expected,
                        part: file.part,
                        category: result.category,
                    })
                    .collect(),
            })
            .collect();

        Ok(AcceptedBatch { groups })
    }
}

/// A file that passed every check, with its resolved category.
#[derive(Debug, Clone)]
pub struct AcceptedFile {
    pub expected: ExpectedFile,
    pub part: RawFilePart,
    pub category: FileCategory,
}

#[derive(Debug, Clone)]
pub struct AcceptedGroup {
    pub info: GroupInfo,
    pub files: Vec<AcceptedFile>,
}

/// A batch in which every file is `OK`. Only obtainable through
/// [`ValidatedBatch::into_accepted`].
#[derive(Debug, Clone)]
pub struct AcceptedBatch {
    pub(crate) groups: Vec<AcceptedGroup>,
}

impl AcceptedBatch {
    pub fn groups(&self) -> &[AcceptedGroup] {
        &self.groups
    }
}
