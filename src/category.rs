use serde::{Deserialize, Serialize};

use crate::sniff::SniffedType;

/// The closed set of file types a batch may contain.
///
/// Everything that is not a PDF, JPEG or PNG is [`FileCategory::Unknown`] and
/// is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileCategory {
    Pdf,
    Jpeg,
    Png,
    Unknown,
}

/// Sniffed signature → category. Matched case-insensitively, first hit wins.
const CATEGORY_TABLE: &[(&str, FileCategory)] = &[
    ("application/pdf", FileCategory::Pdf),
    ("image/png", FileCategory::Png),
    ("image/jpeg", FileCategory::Jpeg),
];

impl FileCategory {
    /// Map a sniffed signature to its category.
    pub fn from_sniffed(sniffed: SniffedType) -> Self {
        CATEGORY_TABLE
            .iter()
            .find(|(signature, _)| signature.eq_ignore_ascii_case(sniffed.as_str()))
            .map(|(_, category)| *category)
            .unwrap_or(FileCategory::Unknown)
    }

    /// Extension (with leading dot) used when renaming a file of this
    /// category. `None` for [`FileCategory::Unknown`].
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Pdf => Some(".pdf"),
            Self::Jpeg => Some(".jpg"),
            Self::Png => Some(".png"),
            Self::Unknown => None,
        }
    }

    /// MIME type sent upstream for a file of this category.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Unknown => "application/octet-stream",
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for FileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
