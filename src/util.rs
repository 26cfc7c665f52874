use regex::Regex;
use std::sync::OnceLock;

/// Truncate a string slice for display (Unicode-safe, no ellipsis)
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Filesystem-safe prefix derived from a URL or title.
pub fn slugify(s: &str, max: usize) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut last_was_sep = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    let trimmed = slug.trim_matches('_');
    truncate_str(trimmed, max).to_string()
}

/// Compile a fixed pattern once. A pattern that fails to compile yields `None`
/// so callers degrade to "no match" instead of panicking.
pub fn cached_regex(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}
