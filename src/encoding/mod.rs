//! Encoding detection and transcoding.
//!
//! Input side: BOM sniffing and XML declaration inspection per XML 1.0
//! Section 4.3.3 and Appendix F, bridging to `encoding_rs` to turn raw bytes
//! into UTF-8 before parsing.
//!
//! Output side: [`OutputEncoding`] answers which characters the requested
//! output encoding can represent (the serializer writes the rest as character
//! references) and transcodes the finished text.
//!
//! # Encoding Detection Strategy
//!
//! 1. An encoding forced by the caller wins.
//! 2. Otherwise a Byte Order Mark (BOM) selects the encoding.
//! 3. Otherwise the XML declaration's `encoding=` attribute, if any.
//! 4. Otherwise UTF-8 (per the XML specification).

use std::fmt;

use encoding_rs::{Encoding, EncoderResult, REPLACEMENT, UTF_16BE, UTF_16LE, UTF_8};

/// An error that occurs during encoding detection or transcoding.
#[derive(Debug, Clone)]
pub struct EncodingError {
    /// A human-readable description of the encoding error.
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

/// Detects the encoding of an XML byte stream by inspecting the Byte Order Mark.
///
/// Returns the encoding indicated by the BOM (if any) and the number of BOM
/// bytes to skip.
///
/// # Examples
///
/// ```
/// use xmlnest::encoding::detect_encoding;
///
/// let (enc, skip) = detect_encoding(b"\xEF\xBB\xBFhello");
/// assert_eq!(enc.map(|e| e.name()), Some("UTF-8"));
/// assert_eq!(skip, 3);
///
/// let (enc, skip) = detect_encoding(b"<root/>");
/// assert!(enc.is_none());
/// assert_eq!(skip, 0);
/// ```
#[must_use]
pub fn detect_encoding(bytes: &[u8]) -> (Option<&'static Encoding>, usize) {
    match Encoding::for_bom(bytes) {
        Some((encoding, skip)) => (Some(encoding), skip),
        None => (None, 0),
    }
}

/// Transcodes a byte slice from the named encoding into a UTF-8 `String`.
///
/// # Errors
///
/// Returns `EncodingError` if the encoding name is not recognized or if
/// the input contains malformed byte sequences.
///
/// # Examples
///
/// ```
/// use xmlnest::encoding::transcode;
///
/// assert_eq!(transcode(b"caf\xE9", "ISO-8859-1").unwrap(), "caf\u{E9}");
/// ```
pub fn transcode(bytes: &[u8], encoding_name: &str) -> Result<String, EncodingError> {
    let encoding = lookup(encoding_name)?;
    decode_with(bytes, encoding)
}

fn lookup(label: &str) -> Result<&'static Encoding, EncodingError> {
    match Encoding::for_label(label.trim().as_bytes()) {
        Some(enc) if enc != REPLACEMENT => Ok(enc),
        _ => Err(EncodingError::new(format!("unsupported encoding: {label}"))),
    }
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> Result<String, EncodingError> {
    let (result, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(EncodingError::new(format!(
            "malformed byte sequence for encoding {}",
            encoding.name()
        )));
    }
    Ok(result.into_owned())
}

/// Extracts the `encoding` attribute from an XML declaration by treating the
/// bytes as ASCII.
///
/// The declaration must be written in ASCII-compatible characters, so this
/// works for UTF-8 and every single-byte encoding without decoding first.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let scan = &bytes[..bytes.len().min(200)];
    if !scan.starts_with(b"<?xml") {
        return None;
    }
    let decl_end = scan.windows(2).position(|w| w == b"?>")?;
    let decl = &scan[..decl_end];

    let needle = b"encoding";
    let enc_pos = decl.windows(needle.len()).position(|w| w == needle)?;
    let rest = skip_ascii_whitespace(&decl[enc_pos + needle.len()..]);
    let rest = skip_ascii_whitespace(rest.strip_prefix(b"=")?);

    let quote = *rest.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value = &rest[1..];
    let end = value.iter().position(|&b| b == quote)?;
    std::str::from_utf8(&value[..end]).ok().map(str::to_string)
}

fn skip_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// Decodes raw XML bytes into a UTF-8 string.
///
/// `forced` overrides detection entirely; otherwise the strategy described
/// in the module documentation applies. A leading BOM is always stripped.
///
/// # Errors
///
/// Returns `EncodingError` if the bytes contain invalid sequences for the
/// selected encoding or if the encoding is unsupported.
///
/// # Examples
///
/// ```
/// use xmlnest::encoding::decode_to_utf8;
///
/// let xml = b"<?xml version=\"1.0\"?><root/>";
/// let result = decode_to_utf8(xml, None).unwrap();
/// assert!(result.contains("<root/>"));
/// ```
pub fn decode_to_utf8(bytes: &[u8], forced: Option<&str>) -> Result<String, EncodingError> {
    let (bom_encoding, bom_skip) = detect_encoding(bytes);
    let content = &bytes[bom_skip..];

    if let Some(label) = forced.filter(|l| !l.trim().is_empty()) {
        return decode_with(content, lookup(label)?);
    }
    if let Some(encoding) = bom_encoding {
        return decode_with(content, encoding);
    }
    match declared_encoding(content) {
        Some(label) => decode_with(content, lookup(&label)?),
        None => decode_with(content, UTF_8),
    }
}

/// The target encoding of a serialization.
///
/// Keeps the label exactly as the caller spelled it (for the XML declaration)
/// together with the `encoding_rs` encoding it resolves to.
#[derive(Debug, Clone)]
pub struct OutputEncoding {
    label: String,
    encoding: &'static Encoding,
}

impl OutputEncoding {
    /// UTF-8, the default output encoding.
    #[must_use]
    pub fn utf8() -> Self {
        Self {
            label: "UTF-8".to_string(),
            encoding: UTF_8,
        }
    }

    /// Resolves an encoding label such as `"UTF-8"`, `"ISO-8859-1"` or
    /// `"Shift_JIS"`. Returns `None` for unknown labels.
    #[must_use]
    pub fn for_label(label: &str) -> Option<Self> {
        let encoding = lookup(label).ok()?;
        Some(Self {
            label: label.trim().to_string(),
            encoding,
        })
    }

    /// The label as written into the XML declaration.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    fn is_unicode(&self) -> bool {
        self.encoding == UTF_8 || self.encoding == UTF_16LE || self.encoding == UTF_16BE
    }

    /// Returns `true` if `ch` can be written in this encoding as-is.
    #[must_use]
    pub fn can_encode(&self, ch: char) -> bool {
        if self.is_unicode() || (ch.is_ascii() && self.encoding.is_ascii_compatible()) {
            return true;
        }
        let mut src = [0u8; 4];
        let mut dst = [0u8; 16];
        let mut encoder = self.encoding.new_encoder();
        let (result, _, _) =
            encoder.encode_from_utf8_without_replacement(ch.encode_utf8(&mut src), &mut dst, true);
        matches!(result, EncoderResult::InputEmpty)
    }

    /// Transcodes finished output text into bytes.
    ///
    /// UTF-16 output starts with a BOM. The serializer only hands over text
    /// that [`can_encode`](Self::can_encode) accepts, so no substitution
    /// happens here.
    #[must_use]
    pub fn encode(&self, text: &str) -> Vec<u8> {
        if self.encoding == UTF_16LE {
            let mut out = vec![0xFF, 0xFE];
            out.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
            out
        } else if self.encoding == UTF_16BE {
            let mut out = vec![0xFE, 0xFF];
            out.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
            out
        } else {
            let (bytes, _, _) = self.encoding.encode(text);
            bytes.into_owned()
        }
    }
}

impl Default for OutputEncoding {
    fn default() -> Self {
        Self::utf8()
    }
}
