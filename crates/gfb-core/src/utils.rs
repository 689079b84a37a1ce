// ============== Name Normalization ==============

/// Canonical form for conversation names.
///
/// Group display names vary in case (and stray whitespace) across platform
/// versions, so every name comparison in the bot goes through this.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

// ============== Text Helpers ==============

const EMPHASIS_MARKERS: [char; 4] = ['*', '_', '~', '`'];

/// Strip decorative emphasis markers (`*bold*`, `_italic_`, `~strike~`,
/// `` `mono` ``) from message text.
///
/// Rules that declare `strip_formatting` match against the stripped text, so
/// a pattern anchored at `^` still fires on a message the sender bolded.
pub fn strip_emphasis(text: &str) -> String {
    text.chars()
        .filter(|c| !EMPHASIS_MARKERS.contains(c))
        .collect()
}

/// Truncate long message text for log lines.
pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_name_lowercases_and_trims() {
        assert_eq!(normalize_name("  Sales Team "), "sales team");
        assert_eq!(normalize_name("ARCHIVE"), "archive");
    }

    #[test]
    fn strip_emphasis_removes_markers_only() {
        assert_eq!(strip_emphasis("*URGENT* _now_"), "URGENT now");
        assert_eq!(strip_emphasis("plain text"), "plain text");
        assert_eq!(strip_emphasis("~done~ `code`"), "done code");
    }

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(30);
        let t = truncate_text(&s, 10);
        assert!(t.ends_with("..."));
        assert_eq!(t.len(), 13);
        assert_eq!(truncate_text("short", 10), "short");
    }
}
