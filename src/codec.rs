//! Packed field blob encoding and the derived note columns.

use std::sync::LazyLock;

use regex::Regex;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::types::{FIELD_SEPARATOR, ModelId};

const BASE91_TABLE: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#$%&()*+,-./:;<=>?@[]^_`{|}~";

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style.*?</style>|<script.*?</script>|<[^>]*>").expect("static regex")
});

/// Splits a packed blob into positional field values.
pub fn split(blob: &str) -> Vec<&str> {
    blob.split(FIELD_SEPARATOR).collect()
}

/// Joins field values into a packed blob.
pub fn join<S: AsRef<str>>(values: &[S]) -> String {
    let mut out = String::new();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(FIELD_SEPARATOR);
        }
        out.push_str(v.as_ref());
    }
    out
}

/// Plain text of a field value as stored in the sort-field column.
pub fn strip_html(value: &str) -> String {
    let text = HTML_TAG.replace_all(value, "");
    text.replace("&nbsp;", " ").trim().to_string()
}

/// Duplicate-check checksum: first 8 hex digits of SHA-1 over the stripped
/// first field.
pub fn field_checksum(first_field: &str) -> i64 {
    let digest = Sha1::digest(strip_html(first_field).as_bytes());
    i64::from(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
}

/// Deterministic progress key for a note that never had one.
///
/// Hashes the note-type id with the immutable source-content fields and
/// encodes the first 64 bits in base91, so the same logical card yields the
/// same key on every export.
pub fn guid_for(model_id: ModelId, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_id.to_string().as_bytes());
    for part in parts {
        hasher.update([FIELD_SEPARATOR as u8]);
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    base91(u64::from_be_bytes(head))
}

fn base91(mut n: u64) -> String {
    if n == 0 {
        return (BASE91_TABLE[0] as char).to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(BASE91_TABLE[(n % 91) as usize]);
        n /= 91;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
