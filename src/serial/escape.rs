//! Character checks and escaping for text and attribute values.
//!
//! Text is stored unescaped in the tree. It is checked once when written
//! into a node (so that it is known to be representable) and escaped once
//! when serialized. Comments, CDATA sections and processing instructions
//! have no escaped form, so their bodies are also checked for the sequence
//! that would close them.

use std::fmt::Write;

use crate::encoding::OutputEncoding;
use crate::error::EscapeError;

/// Returns `true` if `ch` matches the XML 1.0 `Char` production.
fn is_xml_char(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// Checks that `text` can be stored in a node and later escaped.
///
/// # Errors
///
/// Returns [`EscapeError::ForbiddenChar`] for the first character that is
/// not allowed anywhere in an XML document.
pub fn check_text(text: &str) -> Result<(), EscapeError> {
    match text.char_indices().find(|&(_, ch)| !is_xml_char(ch)) {
        Some((offset, ch)) => Err(EscapeError::ForbiddenChar { ch, offset }),
        None => Ok(()),
    }
}

/// Validates raw bytes as UTF-8 text that can be stored in a node.
///
/// # Errors
///
/// Returns [`EscapeError::MalformedUtf8`] for invalid UTF-8 and
/// [`EscapeError::ForbiddenChar`] as [`check_text`] does.
pub fn check_bytes(bytes: &[u8]) -> Result<&str, EscapeError> {
    let text = std::str::from_utf8(bytes).map_err(|e| EscapeError::MalformedUtf8 {
        valid_up_to: e.valid_up_to(),
    })?;
    check_text(text)?;
    Ok(text)
}

fn reject(text: &str, sequence: &'static str) -> Result<(), EscapeError> {
    match text.find(sequence) {
        Some(offset) => Err(EscapeError::Terminator { sequence, offset }),
        None => Ok(()),
    }
}

/// Checks the body of a comment.
///
/// # Errors
///
/// As [`check_text`], plus [`EscapeError::Terminator`] for `--` anywhere
/// or a trailing `-`, either of which would end the comment early.
pub fn check_comment(text: &str) -> Result<(), EscapeError> {
    check_text(text)?;
    reject(text, "--")?;
    if text.ends_with('-') {
        return Err(EscapeError::Terminator {
            sequence: "-",
            offset: text.len() - 1,
        });
    }
    Ok(())
}

/// Checks the body of a CDATA section.
///
/// # Errors
///
/// As [`check_text`], plus [`EscapeError::Terminator`] for `]]>`.
pub fn check_cdata(text: &str) -> Result<(), EscapeError> {
    check_text(text)?;
    reject(text, "]]>")
}

/// Checks the data of a processing instruction.
///
/// # Errors
///
/// As [`check_text`], plus [`EscapeError::Terminator`] for `?>`.
pub fn check_pi_data(text: &str) -> Result<(), EscapeError> {
    check_text(text)?;
    reject(text, "?>")
}

/// Writes a hexadecimal character reference (`&#xHH;`) for a code point.
fn write_hex_char_ref(out: &mut String, ch: char) {
    let _ = write!(out, "&#x{:X};", ch as u32);
}

/// Escapes text content for XML output.
///
/// - `&`, `<`, `>`, `"`, `'` are written as predefined entity references
/// - `\r` is encoded as `&#13;` so it survives end-of-line normalization
/// - `\t` and `\n` are passed through
/// - characters the output encoding cannot represent become `&#xHH;`
pub fn write_escaped_text(out: &mut String, text: &str, encoding: &OutputEncoding) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\r' => out.push_str("&#13;"),
            '\t' | '\n' => out.push(ch),
            c if (c as u32) < 0x20 => write_hex_char_ref(out, c),
            c if !encoding.can_encode(c) => write_hex_char_ref(out, c),
            _ => out.push(ch),
        }
    }
}

/// Escapes an attribute value for output inside double quotes.
///
/// Same as [`write_escaped_text`], except that `\t`, `\n`, and `\r` become
/// character references so attribute-value normalization does not turn them
/// into spaces on re-parse.
pub fn write_escaped_attr(out: &mut String, value: &str, encoding: &OutputEncoding) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            c if (c as u32) < 0x20 => write_hex_char_ref(out, c),
            c if !encoding.can_encode(c) => write_hex_char_ref(out, c),
            _ => out.push(ch),
        }
    }
}
