//! Filesystem-safe names for folder segments and documents
//!
//! Catalog names and star designations routinely carry characters that are
//! not portable in directory names ("USNO-A2.0", "GSC 1.2/ACT", "NGC 2264:V*").
//! Every segment is escaped on the way to disk and unescaped on the way back,
//! and the two functions round-trip exactly for any non-empty string.
//!
//! # Rules
//! - ASCII letters, digits, space and `_ + ( ) . -` are kept verbatim
//! - every other byte (including `%` itself) becomes `%XX`, upper-case hex
//! - a leading `.` is escaped, so no segment is hidden or equal to `.`/`..`
//! - a trailing `.` or space is escaped (Windows strips them silently)

use crate::error::{Result, StoreError};
use xxhash_rust::xxh3::xxh3_64;

/// Marker between a truncated document name and its hash suffix
const HASH_MARKER: char = '~';

/// Hex digits of the hash suffix
const HASH_LEN: usize = 16;

fn is_plain(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b' ' | b'_' | b'+' | b'(' | b')' | b'.' | b'-')
}

/// Escape a folder segment or identity key for use as a file name
///
/// # Errors
///
/// Returns `InvalidSegment` for an empty string.
///
/// # Examples
///
/// ```
/// use stardb_rs::core::validation::{escape_segment, unescape_segment};
///
/// let escaped = escape_segment("GSC 1.2/ACT").unwrap();
/// assert_eq!(escaped, "GSC 1.2%2FACT");
/// assert_eq!(unescape_segment(&escaped).unwrap(), "GSC 1.2/ACT");
/// ```
pub fn escape_segment(segment: &str) -> Result<String> {
    if segment.is_empty() {
        return Err(StoreError::InvalidSegment(
            "segment cannot be empty".to_string(),
        ));
    }

    let bytes = segment.as_bytes();
    let last = bytes.len() - 1;
    let mut escaped = String::with_capacity(bytes.len());

    for (idx, &byte) in bytes.iter().enumerate() {
        let keep = is_plain(byte)
            && !(idx == 0 && byte == b'.')
            && !(idx == last && (byte == b'.' || byte == b' '));

        if keep {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{:02X}", byte));
        }
    }

    Ok(escaped)
}

/// Reverse [`escape_segment`]
///
/// # Errors
///
/// Returns `InvalidSegment` for an empty name, a truncated or non-hex escape,
/// or escapes that do not decode to UTF-8.
pub fn unescape_segment(escaped: &str) -> Result<String> {
    if escaped.is_empty() {
        return Err(StoreError::InvalidSegment(
            "segment cannot be empty".to_string(),
        ));
    }

    let bytes = escaped.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut idx = 0;

    while idx < bytes.len() {
        if bytes[idx] == b'%' {
            let hex = escaped
                .get(idx + 1..idx + 3)
                .ok_or_else(|| StoreError::InvalidSegment(format!("truncated escape in '{}'", escaped)))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| StoreError::InvalidSegment(format!("bad escape '%{}' in '{}'", hex, escaped)))?;
            decoded.push(byte);
            idx += 3;
        } else {
            decoded.push(bytes[idx]);
            idx += 1;
        }
    }

    String::from_utf8(decoded)
        .map_err(|_| StoreError::InvalidSegment(format!("'{}' is not UTF-8 once unescaped", escaped)))
}

/// File name for a stored document
///
/// The escaped identity key plus `.{extension}`. When that exceeds
/// `max_len` bytes, the escaped key is cut at a character boundary and a
/// `~` + xxh3 hash of the full key is appended, so distinct keys keep
/// distinct names. The document itself carries its key, so the name never
/// has to be reversed.
pub fn document_file_name(key: &str, extension: &str, max_len: usize) -> Result<String> {
    let escaped = escape_segment(key)?;
    let suffix_len = extension.len() + 1;

    if escaped.len() + suffix_len <= max_len {
        return Ok(format!("{}.{}", escaped, extension));
    }

    let budget = max_len.saturating_sub(suffix_len + HASH_LEN + 1);
    let mut cut = budget.min(escaped.len());
    // Never split a %XX escape
    while cut > 0 && (escaped.as_bytes()[cut - 1] == b'%' || (cut >= 2 && escaped.as_bytes()[cut - 2] == b'%')) {
        cut -= 1;
    }

    Ok(format!(
        "{}{}{:016x}.{}",
        &escaped[..cut],
        HASH_MARKER,
        xxh3_64(key.as_bytes()),
        extension
    ))
}
