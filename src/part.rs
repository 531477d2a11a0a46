use std::path::Path;
use std::sync::Arc;

use crate::Result;

// ── RawFilePart ──────────────────────────────────────────────────────────────

/// One uploaded part, exactly as received from the transport layer.
///
/// The content is shared, not copied, between the validation tasks and the
/// final upload descriptor. It is released when the last handle is dropped.
#[derive(Debug, Clone)]
pub struct RawFilePart {
    /// Filename from the multipart `Content-Disposition`, normally
    /// `<identifier>.<ext>`.
    pub filename: String,

    /// `Content-Type` declared by the client, if any. Only used for logging.
    pub content_type: Option<String>,

    data: Arc<[u8]>,
}

impl RawFilePart {
    pub fn new(filename: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            data: data.into(),
        }
    }

    /// Attach the declared transport content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// A new handle to the same content.
    pub fn shared_data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Up to the first `n` bytes of the content.
    pub fn leading_bytes(&self, n: usize) -> &[u8] {
        &self.data[..self.data.len().min(n)]
    }

    /// The filename up to its first `.`, which must equal a manifest
    /// identifier.
    ///
    /// ```
    /// # use vedlegg_ingest::RawFilePart;
    /// let part = RawFilePart::new("3f2a.jpg", Vec::new());
    /// assert_eq!(part.identifier_token(), "3f2a");
    /// ```
    pub fn identifier_token(&self) -> &str {
        let name = self.filename.trim();
        name.split_once('.').map(|(head, _)| head).unwrap_or(name)
    }

    /// Returns the file extension, or `None` if the filename has no
    /// extension.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
    }
}

// ── read_batch_dir ───────────────────────────────────────────────────────────

/// Load every regular file directly inside `dir` as a raw part, named after
/// the file. Sorted by filename so batches are reproducible.
pub fn read_batch_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<RawFilePart>> {
    let mut parts = Vec::new();

    for entry in std::fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().into_owned();
        let data = std::fs::read(entry.path())?;
        parts.push(RawFilePart::new(filename, data));
    }

    parts.sort_by(|a, b| a.filename.cmp(&b.filename));
    tracing::debug!(dir = %dir.as_ref().display(), parts = parts.len(), "Read batch directory");

    Ok(parts)
}
