//! `QName` (qualified name) handling.
//!
//! A `QName` is a name of the form `prefix:localname` or just `localname`.
//! Prefixes are carried as plain tags; they are never resolved to namespace
//! URIs.
//!
//! See <https://www.w3.org/TR/xml-names/#NT-QName>

use crate::error::TreeError;

/// Splits a `QName` into its prefix and local name parts.
///
/// Returns `(Some(prefix), localname)` if the name contains a colon,
/// or `(None, localname)` if it does not.
///
/// # Examples
///
/// ```
/// use xmlnest::util::qname::split_qname;
///
/// assert_eq!(split_qname("svg:rect"), (Some("svg"), "rect"));
/// assert_eq!(split_qname("div"), (None, "div"));
/// ```
#[must_use]
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.find(':') {
        Some(pos) => (Some(&qname[..pos]), &qname[pos + 1..]),
        None => (None, qname),
    }
}

fn is_name_start_char(c: char) -> bool {
    matches!(c,
        'A'..='Z' | 'a'..='z' | '_' | ':'
        | '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

/// Checks that `name` matches the XML 1.0 `Name` production.
///
/// Attribute keys go through this check, so `xml:lang` is accepted as a
/// single key.
///
/// # Errors
///
/// Returns [`TreeError::EmptyName`] for an empty string and
/// [`TreeError::InvalidName`] otherwise.
pub fn check_name(name: &str) -> Result<(), TreeError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(TreeError::EmptyName);
    };
    if !is_name_start_char(first) || !chars.all(is_name_char) {
        return Err(TreeError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Checks that `name` is a `Name` without colons (an `NCName`).
///
/// Element local names and prefixes are stored separately, so neither may
/// contain a colon.
///
/// # Errors
///
/// Same as [`check_name`], plus [`TreeError::InvalidName`] when a colon is present.
pub fn check_ncname(name: &str) -> Result<(), TreeError> {
    check_name(name)?;
    if name.contains(':') {
        return Err(TreeError::InvalidName(name.to_string()));
    }
    Ok(())
}
