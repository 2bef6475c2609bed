use crate::error::{FsError, FsResult};

/// Longest accepted path segment, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Validate a path segment for use as a node name.
///
/// Rejects empty names, the `.`/`..` traversal segments, separator and
/// control characters, and names longer than [`MAX_NAME_LEN`] bytes.
/// Stored names keep whatever case the client supplied; case policy only
/// affects sibling-uniqueness checks.
pub fn validate_node_name(name: &str) -> FsResult<()> {
    let invalid = |reason: &str| {
        Err(FsError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };
    if name.is_empty() {
        return invalid("empty");
    }
    if name == "." || name == ".." {
        return invalid("path traversal segment");
    }
    if name.len() > MAX_NAME_LEN {
        return invalid("longer than 255 bytes");
    }
    for c in name.chars() {
        match c {
            '/' | '\\' => return invalid("contains a path separator"),
            '\0' => return invalid("contains NUL"),
            c if c.is_control() => return invalid("contains a control character"),
            _ => {}
        }
    }
    Ok(())
}

/// Sibling-name equality under the deployment's case policy.
pub fn names_collide(a: &str, b: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        a.to_lowercase() == b.to_lowercase()
    } else {
        a == b
    }
}

/// Derive a non-colliding name by appending ` (n)` before the extension,
/// the way desktop clients resolve copy conflicts: `a.txt` becomes
/// `a (2).txt`, then `a (3).txt`, and so on.
pub fn deconflicted_name(name: &str, taken: &dyn Fn(&str) -> bool) -> String {
    if !taken(name) {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        // A leading dot is a hidden-file prefix, not an extension.
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };
    let mut counter: u32 = 2;
    loop {
        let candidate = format!("{stem} ({counter}){ext}");
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
