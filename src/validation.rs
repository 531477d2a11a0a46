use std::fmt;

use serde::Serialize;

use crate::category::FileCategory;
use crate::filename::{claimed_extension, contains_illegal_characters, illegal_extension};
use crate::part::RawFilePart;
use crate::sniff::{apply_overrides, sniff};
use crate::validator::check_pdf;

// ── Outcome ───────────────────────────────────────────────────────────────────

/// Verdict for one file. Anything but `Ok` rejects the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationOutcome {
    Ok,
    FileTooLarge,
    IllegalFilename,
    IllegalFileType,
    PdfIsEncrypted,
    CouldNotLoadDocument,
}

impl ValidationOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::FileTooLarge => "FILE_TOO_LARGE",
            Self::IllegalFilename => "ILLEGAL_FILENAME",
            Self::IllegalFileType => "ILLEGAL_FILE_TYPE",
            Self::PdfIsEncrypted => "PDF_IS_ENCRYPTED",
            Self::CouldNotLoadDocument => "COULD_NOT_LOAD_DOCUMENT",
        }
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outcome plus the category it resolved to. The category is
/// [`FileCategory::Unknown`] unless the outcome is `Ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub outcome: ValidationOutcome,
    pub category: FileCategory,
}

impl ValidationResult {
    pub(crate) fn accepted(category: FileCategory) -> Self {
        Self {
            outcome: ValidationOutcome::Ok,
            category,
        }
    }

    pub(crate) fn rejected(outcome: ValidationOutcome) -> Self {
        Self {
            outcome,
            category: FileCategory::Unknown,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

// ── Checks before the scan ────────────────────────────────────────────────────

/// Size and filename checks. `Some` stops validation of the file before it
/// reaches the scanner.
pub(crate) fn precheck(original_filename: &str, part: &RawFilePart, max_file_size: u64) -> Option<ValidationResult> {
    if part.size() > max_file_size {
        tracing::info!(size = part.size(), max = max_file_size, "FILE_TOO_LARGE");
        return Some(ValidationResult::rejected(ValidationOutcome::FileTooLarge));
    }

    if contains_illegal_characters(original_filename) {
        tracing::info!(filename = original_filename, "ILLEGAL_FILENAME");
        return Some(ValidationResult::rejected(ValidationOutcome::IllegalFilename));
    }

    None
}

// ── Checks after the scan ─────────────────────────────────────────────────────

/// Classify a file from its bytes and run the checks for its category.
///
/// `original_filename` is the name from the manifest. Both it and the part's
/// own filename are checked against the image extension blacklist. Size and
/// filename checks are not repeated here.
pub fn validate_file(original_filename: &str, part: &RawFilePart) -> ValidationResult {
    let sniffed = sniff(part.data());
    let (resolved, applied) = apply_overrides(sniffed);
    if let Some(rule) = applied {
        tracing::info!(
            detected = %rule.detected,
            actual = %rule.actual,
            "{}",
            rule.notice
        );
    }

    let category = FileCategory::from_sniffed(resolved);

    match category {
        FileCategory::Unknown => {
            tracing::warn!(
                claimed_extension = claimed_extension(original_filename).unwrap_or_default(),
                category = %category,
                sniffed = %sniffed,
                declared_content_type = part.content_type.as_deref().unwrap_or_default(),
                leading_bytes = ?part.leading_bytes(8),
                "ILLEGAL_FILE_TYPE: content does not map to a supported category"
            );
            ValidationResult::rejected(ValidationOutcome::IllegalFileType)
        }
        FileCategory::Jpeg | FileCategory::Png => {
            let refused = illegal_extension(category, original_filename)
                .or_else(|| illegal_extension(category, &part.filename));
            match refused {
                Some(ext) => {
                    tracing::warn!(extension = %ext, category = %category, "ILLEGAL_FILE_TYPE: refused image extension");
                    ValidationResult::rejected(ValidationOutcome::IllegalFileType)
                }
                None => ValidationResult::accepted(category),
            }
        }
        FileCategory::Pdf => match check_pdf(part.data()) {
            ValidationOutcome::Ok => ValidationResult::accepted(FileCategory::Pdf),
            outcome => ValidationResult::rejected(outcome),
        },
    }
}
