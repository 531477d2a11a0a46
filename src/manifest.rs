use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{IngestError, Result};

// ── FileIdentifier ────────────────────────────────────────────────────────────

/// Token binding a manifest entry to an uploaded part.
///
/// Uploaded parts are named `<identifier>.<ext>`, so an identifier is never
/// empty and never contains `.`, `/`, `\` or whitespace. It must not start
/// with `-` either, since its [`short`](Self::short) form would be empty. In
/// practice it is a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileIdentifier(String);

impl FileIdentifier {
    /// A fresh random (v4 UUID) identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Suffix used in final filenames: everything before the first `-`, at
    /// most 8 characters (the first group of a UUID).
    pub fn short(&self) -> &str {
        let head = self.0.split('-').next().unwrap_or_default();
        match head.char_indices().nth(8) {
            Some((idx, _)) => &head[..idx],
            None => head,
        }
    }
}

impl TryFrom<String> for FileIdentifier {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        if value.is_empty() {
            return Err("identifier is empty".into());
        }
        if value
            .chars()
            .any(|c| matches!(c, '.' | '/' | '\\') || c.is_whitespace())
        {
            return Err(format!("identifier '{value}' contains a reserved character"));
        }
        if value.starts_with('-') {
            return Err(format!("identifier '{value}' starts with '-'"));
        }
        Ok(Self(value))
    }
}

impl From<FileIdentifier> for String {
    fn from(id: FileIdentifier) -> Self {
        id.0
    }
}

impl std::fmt::Display for FileIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Manifest model ────────────────────────────────────────────────────────────

/// What caused the documentation request a group answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OriginEventType {
    #[serde(rename = "soknad")]
    Application,
    #[serde(rename = "bruker")]
    User,
    #[serde(rename = "dokumentasjonEtterspurt")]
    DocumentationRequested,
    #[serde(rename = "dokumentasjonkrav")]
    DocumentationRequirement,
}

/// Group metadata carried through validation and upload unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub extra_info: Option<String>,
    pub submission_deadline: Option<NaiveDate>,
    pub origin_event_type: Option<OriginEventType>,
    pub origin_event_reference: Option<String>,
}

/// One file the manifest says is part of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedFile {
    /// Name the user gave the file. Not validated at parse time.
    #[serde(alias = "filnavn")]
    pub original_filename: String,
    #[serde(alias = "uuid")]
    pub identifier: FileIdentifier,
}

/// A manifest group: metadata plus the files it expects, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadGroup {
    pub info: GroupInfo,
    pub files: Vec<ExpectedFile>,
}

/// Wire shape of one manifest entry.
#[derive(Deserialize)]
struct ManifestGroup {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, alias = "tilleggsinfo")]
    extra_info: Option<String>,
    #[serde(default, alias = "innsendelsesfrist")]
    submission_deadline: Option<NaiveDate>,
    #[serde(default, alias = "hendelsetype")]
    origin_event_type: Option<OriginEventType>,
    #[serde(default, alias = "hendelsereferanse")]
    origin_event_reference: Option<String>,
    #[serde(default, alias = "filer")]
    files: Vec<ExpectedFile>,
}

impl From<ManifestGroup> for UploadGroup {
    fn from(g: ManifestGroup) -> Self {
        UploadGroup {
            info: GroupInfo {
                kind: g.kind,
                extra_info: g.extra_info,
                submission_deadline: g.submission_deadline,
                origin_event_type: g.origin_event_type,
                origin_event_reference: g.origin_event_reference,
            },
            files: g.files,
        }
    }
}

// ── parse_manifest ────────────────────────────────────────────────────────────

/// Parse manifest bytes into upload groups.
///
/// Groups without files are dropped. Invalid JSON, an invalid identifier, an
/// identifier used twice, or two identifiers sharing a short form yields
/// [`IngestError::MalformedManifest`]. The short form ends up in the final
/// filename, so it has to be unique within the batch.
pub fn parse_manifest(data: &[u8]) -> Result<Vec<UploadGroup>> {
    let raw: Vec<ManifestGroup> = serde_json::from_slice(data)?;

    let groups: Vec<UploadGroup> = raw
        .into_iter()
        .filter(|g| !g.files.is_empty())
        .map(UploadGroup::from)
        .collect();

    let mut seen = HashSet::new();
    let mut short_forms = HashMap::new();
    for file in groups.iter().flat_map(|g| &g.files) {
        if !seen.insert(file.identifier.as_str()) {
            return Err(IngestError::MalformedManifest(format!(
                "identifier '{}' is used more than once",
                file.identifier
            )));
        }
        if let Some(other) = short_forms.insert(file.identifier.short(), &file.identifier) {
            return Err(IngestError::MalformedManifest(format!(
                "identifiers '{other}' and '{}' share the short form '{}'",
                file.identifier,
                file.identifier.short()
            )));
        }
    }

    tracing::debug!(
        groups = groups.len(),
        files = seen.len(),
        "Parsed upload manifest"
    );

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"[
        {
            "type": "brukskonto",
            "tilleggsinfo": "kontoutskrift",
            "innsendelsesfrist": "2024-03-01",
            "hendelsetype": "dokumentasjonkrav",
            "hendelsereferanse": "ref-1",
            "filer": [
                { "filnavn": "januar.pdf", "uuid": "11111111-0000-4000-8000-000000000001" },
                { "filnavn": "februar.pdf", "uuid": "22222222-0000-4000-8000-000000000002" }
            ]
        },
        { "type": "annet", "tilleggsinfo": null, "filer": [] },
        {
            "type": "husleie",
            "filer": [{ "filnavn": "kontrakt.jpg", "uuid": "33333333-0000-4000-8000-000000000003" }]
        }
    ]"#;

    #[test]
    fn parses_wire_format_and_drops_empty_groups() {
        let groups = parse_manifest(MANIFEST.as_bytes()).unwrap();
        assert_eq!(groups.len(), 2);

        let first = &groups[0];
        assert_eq!(first.info.kind, "brukskonto");
        assert_eq!(first.info.extra_info.as_deref(), Some("kontoutskrift"));
        assert_eq!(first.info.submission_deadline, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(first.info.origin_event_type, Some(OriginEventType::DocumentationRequirement));
        assert_eq!(first.info.origin_event_reference.as_deref(), Some("ref-1"));
        assert_eq!(first.files.len(), 2);
        assert_eq!(first.files[1].original_filename, "februar.pdf");

        assert_eq!(groups[1].info.kind, "husleie");
        assert_eq!(groups[1].info.submission_deadline, None);
    }

    #[test]
    fn accepts_english_field_names() {
        let json = r#"[{
            "type": "klage",
            "extra_info": "vedlegg",
            "origin_event_type": "soknad",
            "files": [{ "original_filename": "a.pdf", "identifier": "abc" }]
        }]"#;
        let groups = parse_manifest(json.as_bytes()).unwrap();
        assert_eq!(groups[0].info.origin_event_type, Some(OriginEventType::Application));
        assert_eq!(groups[0].files[0].identifier.as_str(), "abc");
    }

    #[test]
    fn malformed_json_is_fatal() {
        let err = parse_manifest(b"[{\"type\": ").unwrap_err();
        assert!(matches!(err, IngestError::MalformedManifest(_)));

        let err = parse_manifest(b"{\"type\": \"x\"}").unwrap_err();
        assert!(matches!(err, IngestError::MalformedManifest(_)));
    }

    #[test]
    fn identifier_with_delimiter_is_rejected() {
        let json = r#"[{ "type": "x", "filer": [{ "filnavn": "a.pdf", "uuid": "abc.def" }] }]"#;
        assert!(matches!(
            parse_manifest(json.as_bytes()),
            Err(IngestError::MalformedManifest(_))
        ));
    }

    #[test]
    fn duplicate_identifiers_are_rejected() {
        let json = r#"[
            { "type": "x", "filer": [{ "filnavn": "a.pdf", "uuid": "same" }] },
            { "type": "y", "filer": [{ "filnavn": "b.pdf", "uuid": "same" }] }
        ]"#;
        let err = parse_manifest(json.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("same"));
    }

    #[test]
    fn identifiers_sharing_a_short_form_are_rejected() {
        let json = r#"[{ "type": "x", "filer": [
            { "filnavn": "scan.png", "uuid": "U1-a" },
            { "filnavn": "scan.png", "uuid": "U1-b" }
        ] }]"#;
        let err = parse_manifest(json.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::MalformedManifest(_)));
        assert!(err.to_string().contains("'U1'"));

        let json = r#"[
            { "type": "x", "filer": [{ "filnavn": "a.pdf", "uuid": "abcdefgh1" }] },
            { "type": "y", "filer": [{ "filnavn": "b.pdf", "uuid": "abcdefgh2" }] }
        ]"#;
        assert!(matches!(
            parse_manifest(json.as_bytes()),
            Err(IngestError::MalformedManifest(_))
        ));
    }

    #[test]
    fn identifier_with_leading_dash_is_rejected() {
        assert!(FileIdentifier::try_from("-abc".to_string()).is_err());
        assert!(FileIdentifier::try_from("-".to_string()).is_err());

        let json = r#"[{ "type": "x", "filer": [{ "filnavn": "a.pdf", "uuid": "-0000-4000" }] }]"#;
        assert!(matches!(
            parse_manifest(json.as_bytes()),
            Err(IngestError::MalformedManifest(_))
        ));
    }

    #[test]
    fn short_identifier_is_first_uuid_group() {
        let id = FileIdentifier::try_from("1a2b3c4d-0000-4000-8000-000000000001".to_string()).unwrap();
        assert_eq!(id.short(), "1a2b3c4d");

        let id = FileIdentifier::try_from("abcdefghijkl".to_string()).unwrap();
        assert_eq!(id.short(), "abcdefgh");

        let id = FileIdentifier::try_from("U1".to_string()).unwrap();
        assert_eq!(id.short(), "U1");
    }

    #[test]
    fn generated_identifiers_are_uuids() {
        let id = FileIdentifier::generate();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
        assert_eq!(id.short().len(), 8);
    }
}
