use crate::error::{Result, StorageError};
use std::path::Path;

const MAX_SEGMENT_LEN: usize = 255;

fn is_reserved(c: char) -> bool {
    c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';')
}

fn truncate_utf8(value: String, max: usize) -> String {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

/// Reduces a client-supplied filename to a single safe path segment.
///
/// Only the final component is kept, reserved characters are replaced with `_`
/// and the result is capped at 255 bytes.
pub fn sanitize_filename(filename: &str) -> Result<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    if name.is_empty() || name == "." || name == ".." {
        return Err(StorageError::invalid_input(format!(
            "Filename '{}' has no usable name component",
            filename
        )));
    }

    let sanitized: String = name
        .chars()
        .map(|c| if is_reserved(c) { '_' } else { c })
        .collect();

    Ok(truncate_utf8(sanitized, MAX_SEGMENT_LEN))
}

/// Sanitizes one caller-supplied segment of a storage key (entity type, id, ...).
pub fn sanitize_segment(segment: &str) -> Result<String> {
    let trimmed = segment.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(StorageError::invalid_input(format!(
            "Invalid path segment '{}'",
            segment
        )));
    }
    let sanitized: String = trimmed
        .chars()
        .map(|c| if is_reserved(c) { '_' } else { c })
        .collect();
    Ok(truncate_utf8(sanitized, MAX_SEGMENT_LEN))
}

/// Lowercased extension of a filename, without the dot.
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_lowercase())
}

/// Rejects storage keys that could escape a backend root.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StorageError::invalid_input("Storage key cannot be empty"));
    }
    if key.starts_with('/') || key.starts_with('\\') || key.contains('\0') {
        return Err(StorageError::invalid_input(format!(
            "Storage key '{}' must be relative",
            key
        )));
    }
    if key.split(['/', '\\']).any(|part| part == "..") {
        tracing::warn!("Path traversal attempt detected in key: {}", key);
        return Err(StorageError::invalid_input(format!(
            "Storage key '{}' contains a parent reference",
            key
        )));
    }
    Ok(())
}
