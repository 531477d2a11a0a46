use crate::validation::ValidationOutcome;
use lopdf::Document;

// ── check_pdf ─────────────────────────────────────────────────────────────────

/// Decide whether `data` is a PDF we can forward.
///
/// | situation                                   | outcome                     |
/// |---------------------------------------------|-----------------------------|
/// | load fails, trailer references `/Encrypt`   | `PdfIsEncrypted`            |
/// | load fails otherwise                        | `CouldNotLoadDocument`      |
/// | loads, but is or was encrypted              | `PdfIsEncrypted`            |
/// | loads, structure incomplete                 | `CouldNotLoadDocument`      |
/// | loads, unencrypted (signed or not)          | `Ok`                        |
///
/// The parsed document is owned by this function and dropped on every
/// return path.
pub fn check_pdf(data: &[u8]) -> ValidationOutcome {
    let document = match Document::load_mem(data) {
        Ok(doc) => doc,
        Err(e) if declares_encryption(data) => {
            tracing::warn!(error = %e, "PDF_IS_ENCRYPTED: could not open protected document");
            return ValidationOutcome::PdfIsEncrypted;
        }
        Err(e) => {
            tracing::warn!(error = %e, "COULD_NOT_LOAD_DOCUMENT");
            return ValidationOutcome::CouldNotLoadDocument;
        }
    };

    let validator = PdfValidator::new(&document);

    if validator.is_encrypted() {
        tracing::warn!("PDF_IS_ENCRYPTED: document opened but reports encryption");
        return ValidationOutcome::PdfIsEncrypted;
    }

    if let Err(reason) = validator.validate_pdf_structure() {
        tracing::warn!(%reason, "COULD_NOT_LOAD_DOCUMENT");
        return ValidationOutcome::CouldNotLoadDocument;
    }

    ValidationOutcome::Ok
}

/// `true` when the trailer dictionary references an encryption dictionary.
///
/// Used only after the parser has already given up, to tell a password
/// barrier apart from plain corruption.
fn declares_encryption(data: &[u8]) -> bool {
    trailer_region(data).is_some_and(|trailer| find(trailer, b"/Encrypt").is_some())
}

/// Bytes after the last `trailer` keyword or, for files that only have a
/// cross-reference stream, the dictionary of the last such stream.
fn trailer_region(data: &[u8]) -> Option<&[u8]> {
    if let Some(pos) = rfind(data, b"trailer") {
        return Some(&data[pos..]);
    }

    let xref = rfind(data, b"/XRef")?;
    let start = rfind(&data[..xref], b"obj")?;
    let end = find(&data[xref..], b"stream").map_or(data.len(), |p| xref + p);
    Some(&data[start..end])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

// ── PdfValidator ──────────────────────────────────────────────────────────────

/// Structural checks on an already parsed document.
pub(crate) struct PdfValidator<'a> {
    document: &'a Document,
}

impl<'a> PdfValidator<'a> {
    pub(crate) fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Also `true` for documents lopdf decrypted while loading, such as
    /// owner-password-only PDFs that open with an empty user password.
    pub(crate) fn is_encrypted(&self) -> bool {
        self.document.was_encrypted()
            || self.document.is_encrypted()
            || self.document.trailer.get(b"Encrypt").is_ok()
    }

    /// `Ok(())` when the parsed document has the elements every readable PDF
    /// needs: a catalog, at least one page and a trailer.
    pub(crate) fn validate_pdf_structure(&self) -> Result<(), String> {
        if self.document.trailer.is_empty() {
            return Err("missing trailer dictionary".into());
        }

        self.document
            .catalog()
            .map_err(|e| format!("missing or invalid catalog: {e}"))?;

        if self.document.get_pages().is_empty() {
            return Err("document has no pages".into());
        }

        Ok(())
    }
}
