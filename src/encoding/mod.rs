//! Input decoding.
//!
//! The parser works on UTF-8 text. Byte input is decoded here: a Byte Order
//! Mark picks the initial encoding (UTF-8 when there is none), and the
//! `encoding` pseudo-attribute of the XML declaration overrides it when the
//! two disagree. Non-UTF-8 encodings go through `encoding_rs`.

use std::fmt;

/// An error that occurs while decoding input bytes.
#[derive(Debug, Clone)]
pub struct EncodingError {
    /// A human-readable description of the failure.
    pub message: String,
}

impl EncodingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encoding error: {}", self.message)
    }
}

impl std::error::Error for EncodingError {}

/// Inspects the Byte Order Mark.
///
/// Returns the encoding label and the number of BOM bytes to skip.
///
/// ```
/// use oxfxml::encoding::detect_encoding;
///
/// assert_eq!(detect_encoding(b"\xFF\xFE<\x00"), ("UTF-16LE", 2));
/// assert_eq!(detect_encoding(b"<html/>"), ("UTF-8", 0));
/// ```
#[must_use]
pub fn detect_encoding(bytes: &[u8]) -> (&'static str, usize) {
    match bytes {
        [0xEF, 0xBB, 0xBF, ..] => ("UTF-8", 3),
        [0xFE, 0xFF, ..] => ("UTF-16BE", 2),
        [0xFF, 0xFE, ..] => ("UTF-16LE", 2),
        _ => ("UTF-8", 0),
    }
}

/// Decodes `bytes` from the encoding named by `label` into a `String`.
///
/// # Errors
///
/// Fails when the label is unknown to `encoding_rs` or the bytes are
/// malformed for that encoding.
pub fn transcode(bytes: &[u8], label: &str) -> Result<String, EncodingError> {
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| EncodingError::new(format!("unsupported encoding: {label}")))?;
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(EncodingError::new(format!(
            "malformed byte sequence for encoding {label}"
        )));
    }
    Ok(text.into_owned())
}

/// Decodes a complete XML document into UTF-8.
///
/// # Errors
///
/// Fails on malformed input or an unsupported declared encoding.
///
/// ```
/// use oxfxml::encoding::decode_to_utf8;
///
/// let text = decode_to_utf8(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><p>caf\xE9</p>").unwrap();
/// assert!(text.ends_with("<p>caf\u{e9}</p>"));
/// ```
pub fn decode_to_utf8(bytes: &[u8]) -> Result<String, EncodingError> {
    let (bom_label, skip) = detect_encoding(bytes);
    let content = &bytes[skip..];

    if bom_label == "UTF-8" {
        return match std::str::from_utf8(content) {
            Ok(text) => match declared_encoding(text.as_bytes()) {
                Some(declared) if !is_utf8_label(&declared) => transcode(content, &declared),
                _ => Ok(text.to_string()),
            },
            // The declaration itself is ASCII, so it can be read from raw
            // bytes even when the rest is not UTF-8.
            Err(_) => match declared_encoding(content) {
                Some(declared) => transcode(content, &declared),
                None => Err(EncodingError::new("input is not valid UTF-8")),
            },
        };
    }

    let text = transcode(content, bom_label)?;
    if let Some(declared) = declared_encoding(text.as_bytes()) {
        let declared = declared.to_ascii_uppercase();
        // "UTF-16" leaves the byte order to the BOM.
        let compatible = declared == bom_label || declared == "UTF-16";
        if !compatible {
            return transcode(content, &declared);
        }
    }
    Ok(text)
}

/// Reads the `encoding` pseudo-attribute of a leading XML declaration.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let scan = &bytes[..bytes.len().min(200)];
    if !scan.starts_with(b"<?xml") {
        return None;
    }
    let decl_end = scan.windows(2).position(|w| w == b"?>")?;
    let decl = &scan[..decl_end];
    let needle = b"encoding";
    let at = decl.windows(needle.len()).position(|w| w == needle)?;
    let rest = trim_ascii_start(&decl[at + needle.len()..]);
    let rest = trim_ascii_start(rest.strip_prefix(b"=")?);
    let quote = *rest.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value = &rest[1..];
    let end = value.iter().position(|&b| b == quote)?;
    let label = &value[..end];
    label
        .is_ascii()
        .then(|| String::from_utf8_lossy(label).into_owned())
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .count();
    &bytes[skip..]
}

fn is_utf8_label(label: &str) -> bool {
    label.eq_ignore_ascii_case("UTF-8") || label.eq_ignore_ascii_case("UTF8")
}
