use serde::Serialize;

use crate::category::FileCategory;
use crate::manifest::{FileIdentifier, GroupInfo};
use crate::validation::ValidationOutcome;

/// Verdict for one expected file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileVerdict {
    /// Original filename from the manifest, whitespace-trimmed.
    pub filename: String,
    pub identifier: FileIdentifier,
    pub outcome: ValidationOutcome,
    pub category: FileCategory,
}

/// A manifest group with one verdict per expected file, in manifest order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupVerdict {
    #[serde(flatten)]
    pub info: GroupInfo,
    pub files: Vec<FileVerdict>,
}

impl GroupVerdict {
    pub fn is_accepted(&self) -> bool {
        self.files.iter().all(|f| f.outcome.is_ok())
    }
}

/// Per-file outcomes of a whole batch.
///
/// When the batch is rejected this is what the caller gets back, serialized
/// as one entry per group and one sub-entry per file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub groups: Vec<GroupVerdict>,
}

impl BatchReport {
    /// `true` when every file in every group is `OK`.
    pub fn is_accepted(&self) -> bool {
        self.groups.iter().all(GroupVerdict::is_accepted)
    }

    /// Every file that did not pass, with the group it belongs to.
    pub fn rejected_files(&self) -> impl Iterator<Item = (&GroupInfo, &FileVerdict)> + '_ {
        self.groups.iter().flat_map(|group| {
            group
                .files
                .iter()
                .filter(|f| !f.outcome.is_ok())
                .map(move |f| (&group.info, f))
        })
    }

    pub fn file_count(&self) -> usize {
        self.groups.iter().map(|g| g.files.len()).sum()
    }
}
