//! File-name handling for exported units.

/// Turn an authoring-tool name into a file stem.
///
/// Keeps ASCII letters, digits, `_` and `-`; every other character becomes
/// `_`. Runs of underscores collapse and leading/trailing underscores are
/// trimmed. Returns `None` when nothing usable is left.
pub fn sanitize_name(name: &str) -> Option<String> {
    let mut result = String::with_capacity(name.len());
    let mut prev_was_underscore = false;

    for c in name.trim().chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' {
            c
        } else {
            '_'
        };
        if c == '_' {
            if !prev_was_underscore {
                result.push(c);
            }
            prev_was_underscore = true;
        } else {
            result.push(c);
            prev_was_underscore = false;
        }
    }

    let trimmed = result.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_unchanged() {
        assert_eq!(sanitize_name("Crate_01").as_deref(), Some("Crate_01"));
        assert_eq!(sanitize_name("hero-run").as_deref(), Some("hero-run"));
    }

    #[test]
    fn test_special_characters_replaced() {
        assert_eq!(sanitize_name("Body.001").as_deref(), Some("Body_001"));
        assert_eq!(sanitize_name("  my  mesh / lod ").as_deref(), Some("my_mesh_lod"));
        assert_eq!(sanitize_name("../evil").as_deref(), Some("evil"));
    }

    #[test]
    fn test_empty_after_sanitizing() {
        assert_eq!(sanitize_name(""), None);
        assert_eq!(sanitize_name("...///"), None);
    }
}
