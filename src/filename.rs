//! Filename policy: allowed characters, refused extensions and the final name
//! given to a file before it leaves the system.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::category::FileCategory;
use crate::manifest::FileIdentifier;
use crate::MAX_BASE_NAME_LEN;

/// Anything outside letters (Latin script, including precomposed diacritics),
/// digits, space and `( ) , . _ – -`. Applied after NFC normalization.
static ILLEGAL_CHARACTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{Latin}0-9 (),._–-]").expect("filename pattern is valid"));

/// Extensions stripped before renaming. Anything else is kept as part of the
/// base name.
const RECOGNIZED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".pdf"];

/// Extensions refused for a category even when the content itself is fine.
struct ExtensionRule {
    categories: &'static [FileCategory],
    extensions: &'static [&'static str],
}

/// Evaluated in order, first match wins.
const ILLEGAL_EXTENSION_RULES: &[ExtensionRule] = &[ExtensionRule {
    categories: &[FileCategory::Jpeg, FileCategory::Png],
    extensions: &["jfif", "pjpeg", "pjp"],
}];

/// NFC-normalize and trim surrounding whitespace.
pub fn sanitize(filename: &str) -> String {
    filename.nfc().collect::<String>().trim().to_string()
}

/// `true` when the sanitized filename contains a character outside the
/// allow-list.
pub fn contains_illegal_characters(filename: &str) -> bool {
    ILLEGAL_CHARACTERS.is_match(&sanitize(filename))
}

/// A filename split into base name and recognized extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameSplit {
    pub name: String,
    /// Leading dot included; empty when the extension is missing or not one
    /// of `.jpg`, `.jpeg`, `.png`, `.pdf`.
    pub extension: String,
}

/// Split off a recognized extension (case-insensitive).
///
/// ```
/// # use vedlegg_ingest::split_file_name;
/// assert_eq!(split_file_name("scan.PDF").name, "scan");
/// assert_eq!(split_file_name("notes.txt").name, "notes.txt");
/// ```
pub fn split_file_name(filename: &str) -> FileNameSplit {
    if let Some(idx) = filename.rfind('.') {
        let ext = &filename[idx..];
        if RECOGNIZED_EXTENSIONS.iter().any(|r| r.eq_ignore_ascii_case(ext)) {
            return FileNameSplit {
                name: filename[..idx].to_string(),
                extension: ext.to_string(),
            };
        }
    }
    FileNameSplit {
        name: filename.to_string(),
        extension: String::new(),
    }
}

/// Text after the last `.`, if any.
pub(crate) fn claimed_extension(filename: &str) -> Option<&str> {
    filename
        .trim()
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

/// The claimed extension of `filename` when it is refused for `category`.
pub(crate) fn illegal_extension(category: FileCategory, filename: &str) -> Option<String> {
    let ext = claimed_extension(filename)?;
    ILLEGAL_EXTENSION_RULES
        .iter()
        .filter(|rule| rule.categories.contains(&category))
        .find(|rule| rule.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .map(|_| ext.to_string())
}

/// Final name of an accepted file: `<base>-<short id><extension>`.
///
/// The extension always comes from `category`, so a PDF uploaded as
/// `scan.jpg` becomes `scan-1a2b3c4d.pdf`, and `notes` becomes
/// `notes-1a2b3c4d.pdf`. The base name is cut to [`MAX_BASE_NAME_LEN`]
/// characters.
pub fn finalize(original_filename: &str, category: FileCategory, identifier: &FileIdentifier) -> String {
    finalize_with_limit(original_filename, category, identifier, MAX_BASE_NAME_LEN)
}

pub(crate) fn finalize_with_limit(
    original_filename: &str,
    category: FileCategory,
    identifier: &FileIdentifier,
    max_base_len: usize,
) -> String {
    let split = split_file_name(&sanitize(original_filename));
    let base: String = split.name.chars().take(max_base_len).collect();

    format!(
        "{}-{}{}",
        base.trim_end(),
        identifier.short(),
        category.extension().unwrap_or_default()
    )
}
