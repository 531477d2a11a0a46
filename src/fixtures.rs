//! In-memory documents shared by the unit tests.

use lopdf::{dictionary, Document, EncryptionState, EncryptionVersion, Object, Permissions, StringFormat, Stream};

pub(crate) const JPEG: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01,
    0x00, 0x01, 0x00, 0x00, 0xFF, 0xD9,
];

pub(crate) const PNG: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53,
    0xDE,
];

/// A PDF whose body stops in the middle of the catalog.
pub(crate) const TRUNCATED_PDF: &[u8] = b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R";

/// One page, one line of text.
fn one_page_document() -> (Document, lopdf::ObjectId) {
    let mut doc = Document::with_version("1.4");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content = Stream::new(dictionary! {}, b"BT /F1 12 Tf 72 720 Td (Vedlegg) Tj ET".to_vec());
    let content_id = doc.add_object(content);
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
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

    (doc, catalog_id)
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

pub(crate) fn pdf() -> Vec<u8> {
    save(one_page_document().0)
}

/// Unencrypted PDF carrying a (dummy) detached PKCS#7 signature field.
pub(crate) fn signed_pdf() -> Vec<u8> {
    let (mut doc, catalog_id) = one_page_document();

    let sig_id = doc.add_object(dictionary! {
        "Type" => "Sig",
        "Filter" => "Adobe.PPKLite",
        "SubFilter" => "adbe.pkcs7.detached",
        "ByteRange" => vec![0.into(), 0.into(), 0.into(), 0.into()],
        "Contents" => Object::String(vec![0u8; 64], StringFormat::Hexadecimal),
    });
    let field_id = doc.add_object(dictionary! {
        "FT" => "Sig",
        "T" => Object::string_literal("Signature1"),
        "V" => sig_id,
    });
    if let Ok(Object::Dictionary(catalog)) = doc.get_object_mut(catalog_id) {
        catalog.set(
            "AcroForm",
            dictionary! {
                "Fields" => vec![field_id.into()],
                "SigFlags" => 3,
            },
        );
    }

    save(doc)
}

/// Encrypted with the standard security handler; opening needs a password.
pub(crate) fn encrypted_pdf() -> Vec<u8> {
    encrypted_with_user_password("secret")
}

/// Encrypted with an owner password only. Opens without a password but
/// restricts what the reader may do.
pub(crate) fn owner_password_only_pdf() -> Vec<u8> {
    encrypted_with_user_password("")
}

fn encrypted_with_user_password(user_password: &str) -> Vec<u8> {
    let mut doc = one_page_document().0;
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
