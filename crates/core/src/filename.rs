//! Filename sanitation for assembled artifacts.

/// Maximum length of a sanitized filename.
const MAX_NAME_LEN: usize = 255;

/// Sanitize a client-supplied filename for use as a single path component.
///
/// Takes the basename of `name` and replaces every character outside
/// `[A-Za-z0-9._-]` with `_`. Applied when assembling the final artifact
/// and when resolving download requests; the raw name is kept only in
/// upload metadata.
pub fn safe_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);

    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.truncate(MAX_NAME_LEN);

    // An empty or dots-only result would be useless (or special) as a
    // path component; fall back to a fixed stand-in.
    if cleaned.is_empty() || cleaned.bytes().all(|b| b == b'.') {
        "upload".to_string()
    } else {
        cleaned
    }
}
