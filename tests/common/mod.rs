// Batch builders shared by the integration tests. PDFs are generated with
// lopdf so no binary fixtures are checked in.

#![allow(dead_code)]

use lopdf::{dictionary, Document, EncryptionState, EncryptionVersion, Object, Permissions, Stream};
use vedlegg_ingest::RawFilePart;

pub const JPEG: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01,
    0x00, 0x01, 0x00, 0x00, 0xFF, 0xD9,
];

pub const PNG: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53,
    0xDE,
];

fn document() -> Document {
    let mut doc = Document::with_version("1.5");
    let content_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

pub fn pdf() -> Vec<u8> {
    save(document())
}

/// Encrypted with the standard security handler; opening needs a password.
pub fn encrypted_pdf() -> Vec<u8> {
    encrypted_with_user_password("secret")
}

/// Encrypted with an owner password only. Opens without a password but
/// restricts what the reader may do.
pub fn owner_password_only_pdf() -> Vec<u8> {
    encrypted_with_user_password("")
}

fn encrypted_with_user_password(user_password: &str) -> Vec<u8> {
    let mut doc = document();
    doc.trailer.set(
        "ID",
        Object::Array(vec![Object::string_literal("vedlegg-0001"), Object::string_literal("vedlegg-0001")]),
    );
    let state = EncryptionState::try_from(EncryptionVersion::V2 {
        document: &doc,
        owner_password: "owner",
        user_password,
        key_length: 40,
        permissions: Permissions::PRINTABLE,
    })
    .unwrap();
    doc.encrypt(&state).unwrap();
    save(doc)
}

pub fn part(name: &str, data: &[u8]) -> RawFilePart {
    RawFilePart::new(name, data.to_vec())
}

/// A `metadata.json` part for `groups` of `(type, [(filnavn, uuid)])`.
pub fn manifest(groups: &[(&str, &[(&str, &str)])]) -> RawFilePart {
    let groups: Vec<_> = groups
        .iter()
        .map(|(kind, files)| {
            let files: Vec<_> = files
                .iter()
                .map(|(name, id)| serde_json::json!({ "filnavn": name, "uuid": id }))
                .collect();
            serde_json::json!({ "type": kind, "filer": files })
        })
        .collect();
    RawFilePart::new("metadata.json", serde_json::to_vec(&groups).unwrap())
}
