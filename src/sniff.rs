//! Content sniffing from magic bytes.
//!
//! The detected signature depends only on the bytes. Filenames and declared
//! `Content-Type` headers are never consulted.

/// Raw content-type signature as detected from a file's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SniffedType(&'static str);

impl SniffedType {
    pub const PDF: SniffedType = SniffedType("application/pdf");
    pub const JPEG: SniffedType = SniffedType("image/jpeg");
    pub const PNG: SniffedType = SniffedType("image/png");
    pub const GIF: SniffedType = SniffedType("image/gif");
    pub const TIFF: SniffedType = SniffedType("image/tiff");
    pub const BMP: SniffedType = SniffedType("image/bmp");
    pub const WEBP: SniffedType = SniffedType("image/webp");
    pub const HEIC: SniffedType = SniffedType("image/heic");
    pub const ZIP: SniffedType = SniffedType("application/zip");
    pub const EXECUTABLE: SniffedType = SniffedType("application/x-msdownload");
    pub const ELF: SniffedType = SniffedType("application/x-executable");
    pub const XML: SniffedType = SniffedType("application/xml");
    /// Text starting with a `%` comment. Reported for PDFs whose `%PDF-`
    /// header is not at offset 0.
    pub const MATLAB: SniffedType = SniffedType("text/x-matlab");
    pub const PLAIN_TEXT: SniffedType = SniffedType("text/plain");
    pub const OCTET_STREAM: SniffedType = SniffedType("application/octet-stream");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for SniffedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// A known misdetection and the signature it really stands for.
#[derive(Debug)]
pub(crate) struct SignatureOverride {
    pub(crate) detected: SniffedType,
    pub(crate) actual: SniffedType,
    pub(crate) notice: &'static str,
}

/// Evaluated in order; the first rule whose `detected` matches is applied.
pub(crate) const SIGNATURE_OVERRIDES: &[SignatureOverride] = &[SignatureOverride {
    detected: SniffedType::MATLAB,
    actual: SniffedType::PDF,
    notice: "detected text/x-matlab; assuming a PDF without correct leading magic bytes (%PDF)",
}];

/// Rewrite a sniffed signature through [`SIGNATURE_OVERRIDES`].
///
/// Returns the signature to classify with and the rule that fired, if any.
pub(crate) fn apply_overrides(sniffed: SniffedType) -> (SniffedType, Option<&'static SignatureOverride>) {
    match SIGNATURE_OVERRIDES.iter().find(|rule| rule.detected == sniffed) {
        Some(rule) => (rule.actual, Some(rule)),
        None => (sniffed, None),
    }
}

/// Bytes inspected when deciding whether content is text.
const TEXT_PROBE_LEN: usize = 4096;

/// Detect the content type of `data` from its leading bytes.
pub fn sniff(data: &[u8]) -> SniffedType {
    match data {
        [b'%', b'P', b'D', b'F', b'-', ..] => SniffedType::PDF,
        [0xFF, 0xD8, 0xFF, ..] => SniffedType::JPEG,
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => SniffedType::PNG,
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => SniffedType::GIF,
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => SniffedType::TIFF,
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => SniffedType::WEBP,
        [_, _, _, _, b'f', b't', b'y', b'p', brand @ ..] if is_heif_brand(brand) => SniffedType::HEIC,
        [b'P', b'K', 0x03, 0x04, ..] => SniffedType::ZIP,
        [b'M', b'Z', ..] => SniffedType::EXECUTABLE,
        [0x7F, b'E', b'L', b'F', ..] => SniffedType::ELF,
        [b'B', b'M', _, _, _, _, 0x00, 0x00, 0x00, 0x00, ..] => SniffedType::BMP,
        [] => SniffedType::OCTET_STREAM,
        _ => sniff_text(data),
    }
}

fn is_heif_brand(brand: &[u8]) -> bool {
    const BRANDS: [&[u8; 4]; 6] = [b"heic", b"heix", b"hevc", b"heim", b"mif1", b"msf1"];
    brand.len() >= 4 && BRANDS.iter().any(|b| &brand[..4] == *b)
}

fn sniff_text(data: &[u8]) -> SniffedType {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let body = &data[start..];

    // A `%` comment is how a PDF with junk before its header looks. Decided
    // before the text check because such PDFs are binary further in.
    if body.first() == Some(&b'%') {
        return SniffedType::MATLAB;
    }

    if !is_likely_text(data) {
        return SniffedType::OCTET_STREAM;
    }

    if body.starts_with(b"<?xml") {
        SniffedType::XML
    } else {
        SniffedType::PLAIN_TEXT
    }
}

/// Valid UTF-8 (allowing a cut multi-byte sequence at the probe boundary)
/// with more than 80% printable characters.
fn is_likely_text(data: &[u8]) -> bool {
    let probe = &data[..data.len().min(TEXT_PROBE_LEN)];
    let text = match std::str::from_utf8(probe) {
        Ok(t) => t,
        Err(e) if e.error_len().is_none() => {
            // Truncated sequence at the end of the probe window.
            match std::str::from_utf8(&probe[..e.valid_up_to()]) {
                Ok(t) => t,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };

    if text.is_empty() {
        return false;
    }

    let total = text.chars().count();
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    printable as f64 / total as f64 > 0.80
}
