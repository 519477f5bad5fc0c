use cellar_core::{Result, StorageError};

/// Longest accepted blob path.
pub const NAME_MAX_LEN: usize = 1024;

/// Most path separators accepted in a blob path.
pub const NAME_MAX_SLASHES: usize = 256;

/// Normalizes separators and resolves `.` / `..` segments, POSIX-style.
/// Operates on strings only; never touches the filesystem.
fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Normalizes a caller-supplied name, preserving a trailing slash.
pub fn clean_name(name: &str) -> String {
    let cleaned = normalize(name);
    if name.ends_with('/') && !cleaned.is_empty() && !cleaned.ends_with('/') {
        format!("{cleaned}/")
    } else {
        cleaned
    }
}

/// Joins `name` under `base` and rejects any result that would resolve
/// outside `base`. This is the adapter's security boundary: traversal
/// attempts fail, they are not normalized away.
pub fn safe_join(base: &str, name: &str) -> Result<String> {
    let base = base.trim_matches('/');
    let cleaned = normalize(name);

    let escapes = cleaned.starts_with('/') || cleaned == ".." || cleaned.starts_with("../");
    if escapes {
        return Err(StorageError::InvalidName(format!(
            "access to {name} denied: resolves outside the storage root"
        )));
    }
    if base.is_empty() {
        Ok(cleaned)
    } else if cleaned.is_empty() {
        Ok(base.to_string())
    } else {
        Ok(format!("{base}/{cleaned}"))
    }
}

/// Final validation of a joined blob path: strips leading/trailing dots and
/// slashes, then enforces the length, emptiness and segment caps.
pub fn validate_path(path: &str) -> Result<String> {
    let path = path.trim_matches(|c| c == '.' || c == '/');
    if path.len() > NAME_MAX_LEN {
        return Err(StorageError::InvalidName(format!(
            "name longer than {NAME_MAX_LEN} characters"
        )));
    }
    if path.is_empty() {
        return Err(StorageError::InvalidName(
            "name must contain one or more printable characters".into(),
        ));
    }
    if path.matches('/').count() > NAME_MAX_SLASHES {
        return Err(StorageError::InvalidName(format!(
            "name must not contain more than {NAME_MAX_SLASHES} slashes"
        )));
    }
    Ok(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name_normalizes_separators_and_dot_segments() {
        assert_eq!(clean_name("a\\b\\c.txt"), "a/b/c.txt");
        assert_eq!(clean_name("a/./b//c.txt"), "a/b/c.txt");
        assert_eq!(clean_name("a/x/../b.txt"), "a/b.txt");
    }

    #[test]
    fn test_clean_name_preserves_trailing_slash() {
        assert_eq!(clean_name("a/b/"), "a/b/");
        assert_eq!(clean_name("a/b"), "a/b");
    }

    #[test]
    fn test_safe_join_keeps_paths_under_the_root() {
        assert_eq!(safe_join("media", "a/b.txt").unwrap(), "media/a/b.txt");
        assert_eq!(safe_join("", "a/b.txt").unwrap(), "a/b.txt");
        assert_eq!(safe_join("media", "a/../b.txt").unwrap(), "media/b.txt");
    }

    #[test]
    fn test_safe_join_rejects_traversal_out_of_the_root() {
        assert!(safe_join("", "../../etc/passwd").is_err());
        assert!(safe_join("media", "../../../etc/passwd").is_err());
        assert!(safe_join("media", "/etc/passwd").is_err());
    }

    #[test]
    fn test_validate_path_strips_and_caps() {
        assert_eq!(validate_path("./a/b.txt").unwrap(), "a/b.txt");
        assert!(validate_path("").is_err());
        assert!(validate_path("././/.").is_err());
        assert!(validate_path(&"x".repeat(NAME_MAX_LEN + 1)).is_err());

        let deep = vec!["d"; NAME_MAX_SLASHES + 2].join("/");
        assert!(validate_path(&deep).is_err());
    }
}
