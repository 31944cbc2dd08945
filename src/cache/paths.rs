// Cache path utilities.
// Maps cache keys to entry files inside a cache root.

use std::path::{Path, PathBuf};

/// Extension of entry files.
pub const ENTRY_EXTENSION: &str = "json";

/// Path to the entry file for `key` under `dir`.
pub fn entry_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.{}", sanitize_name(key), ENTRY_EXTENSION))
}

/// Path of the temp file used while writing an entry.
/// `nonce` keeps concurrent writers of the same key apart.
pub fn temp_path(dir: &Path, key: &str, nonce: u64) -> PathBuf {
    dir.join(format!(".{}.{}.tmp", sanitize_name(key), nonce))
}

/// Escape a key for use as a file name.
///
/// Path separators, characters rejected by common filesystems, control
/// characters and `%` itself become `%XX` per UTF-8 byte, so distinct keys
/// always map to distinct names.
pub fn sanitize_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if needs_escape(c) {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                escaped.push_str(&format!("%{:02X}", byte));
            }
        } else {
            escaped.push(c);
        }
    }
    escaped
}

fn needs_escape(c: char) -> bool {
    matches!(c, '%' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}
