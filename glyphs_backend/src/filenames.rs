//! Glyph file names in `.glyphspackage` directories.
//!
//! These follow the UFO rules for user-name-to-file-name conversion, which
//! keep names unique on case-insensitive file systems by marking upper-case
//! letters with a trailing underscore.

use std::collections::BTreeSet;

const MAX_FILE_NAME_LENGTH: usize = 255;
const RESERVED_NAMES: &[&str] = &[
    "con", "prn", "aux", "clock$", "nul", "com1", "com2", "com3", "com4", "lpt1", "lpt2",
    "lpt3",
];

fn is_illegal(c: char) -> bool {
    matches!(
        c,
        '"' | '*' | '+' | '/' | ':' | '<' | '>' | '?' | '[' | '\\' | ']' | '|'
    ) || c.is_control()
}

fn is_reserved(part: &str) -> bool {
    let lower = part.to_lowercase();
    RESERVED_NAMES.contains(&lower.as_str())
        // "a:" to "z:"
        || (lower.len() == 2 && lower.ends_with(':') && lower.starts_with(|c: char| c.is_ascii_lowercase()))
}

/// The file name for `user_name`. `existing` holds the lower-cased names
/// already in use; a clash adds a numeric suffix.
pub fn user_name_to_file_name(user_name: &str, suffix: &str, existing: &BTreeSet<String>) -> String {
    let mut filtered = String::with_capacity(user_name.len() + 4);
    for (i, c) in user_name.chars().enumerate() {
        if i == 0 && c == '.' {
            filtered.push('_');
        } else if is_illegal(c) {
            filtered.push('_');
        } else {
            filtered.push(c);
            if c.to_lowercase().ne(std::iter::once(c)) {
                filtered.push('_');
            }
        }
    }
    let filtered = truncate(&filtered, MAX_FILE_NAME_LENGTH - suffix.len());
    let name: Vec<String> = filtered
        .split('.')
        .map(|part| {
            if is_reserved(part) {
                format!("_{part}")
            } else {
                part.to_string()
            }
        })
        .collect();
    let name = name.join(".");

    let full_name = format!("{name}{suffix}");
    if !existing.contains(&full_name.to_lowercase()) {
        return full_name;
    }
    let stem = truncate(&name, MAX_FILE_NAME_LENGTH - suffix.len() - 15);
    (1u64..)
        .map(|counter| format!("{stem}{counter:015}{suffix}"))
        .find(|candidate| !existing.contains(&candidate.to_lowercase()))
        .unwrap_or(full_name)
}

fn truncate(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
