use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use sha2::Digest as _;

use crate::filename::finalize_with_limit;
use crate::manifest::{FileIdentifier, GroupInfo, OriginEventType};
use crate::reconciler::AcceptedBatch;
use crate::IngestConfig;

/// A renamed file ready for upstream transmission.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizedFile {
    pub final_filename: String,
    pub mimetype: &'static str,
    pub size: u64,
    pub identifier: FileIdentifier,
    /// Lowercase hex SHA-512 of the content.
    pub sha512: String,
    #[serde(skip)]
    pub data: Arc<[u8]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreparedGroup {
    #[serde(flatten)]
    pub info: GroupInfo,
    pub files: Vec<FinalizedFile>,
}

/// Everything handed to the upstream client for one accepted batch.
///
/// Serializing it yields the group metadata and file descriptors without
/// the content.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedBatch {
    pub groups: Vec<PreparedGroup>,
}

impl PreparedBatch {
    /// All files across groups, in manifest order.
    pub fn files(&self) -> impl Iterator<Item = &FinalizedFile> + '_ {
        self.groups.iter().flat_map(|g| &g.files)
    }

    pub fn total_size(&self) -> u64 {
        self.files().map(|f| f.size).sum()
    }

    /// The attachment specification sent upstream alongside the files: one
    /// entry per group, marked as uploaded, naming each file by its final
    /// name and digest.
    pub fn specification(&self) -> AttachmentSpecification {
        AttachmentSpecification {
            attachments: self
                .groups
                .iter()
                .map(|group| AttachmentSpec {
                    kind: group.info.kind.clone(),
                    extra_info: group.info.extra_info.clone(),
                    status: UPLOADED_STATUS,
                    files: group
                        .files
                        .iter()
                        .map(|f| FileSpec {
                            filename: f.final_filename.clone(),
                            sha512: f.sha512.clone(),
                        })
                        .collect(),
                    origin_event_type: group.info.origin_event_type,
                    origin_event_reference: group.info.origin_event_reference.clone(),
                })
                .collect(),
        }
    }
}

// ── Upload specification ──────────────────────────────────────────────────────

/// Status of every attachment in a prepared batch.
pub const UPLOADED_STATUS: &str = "LASTET_OPP";

/// Upstream wire form of a prepared batch, without content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentSpecification {
    #[serde(rename = "vedlegg")]
    pub attachments: Vec<AttachmentSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "tilleggsinfo")]
    pub extra_info: Option<String>,
    pub status: &'static str,
    #[serde(rename = "filer")]
    pub files: Vec<FileSpec>,
    #[serde(rename = "hendelsetype")]
    pub origin_event_type: Option<OriginEventType>,
    #[serde(rename = "hendelsereferanse")]
    pub origin_event_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSpec {
    #[serde(rename = "filnavn")]
    pub filename: String,
    pub sha512: String,
}

fn sha512_hex(data: &[u8]) -> String {
    let digest = sha2::Sha512::digest(data);
    let mut out = String::with_capacity(128);
    for b in digest {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Rename every file of an accepted batch and attach its mimetype.
pub fn prepare(batch: AcceptedBatch, config: &IngestConfig) -> PreparedBatch {
    let groups: Vec<PreparedGroup> = batch
        .groups
        .into_iter()
        .map(|group| PreparedGroup {
            info: group.info,
            files: group
                .files
                .into_iter()
                .map(|file| FinalizedFile {
                    final_filename: finalize_with_limit(
                        &file.expected.original_filename,
                        file.category,
                        &file.expected.identifier,
                        config.max_base_name_len,
                    ),
                    mimetype: file.category.mime_type(),
                    size: file.part.size(),
                    identifier: file.expected.identifier,
                    sha512: sha512_hex(file.part.data()),
                    data: file.part.shared_data(),
                })
                .collect(),
        })
        .collect();

    let prepared = PreparedBatch { groups };
    tracing::info!(
        groups = prepared.groups.len(),
        files = prepared.files().count(),
        bytes = prepared.total_size(),
        "Prepared batch for upload"
    );
    prepared
}
