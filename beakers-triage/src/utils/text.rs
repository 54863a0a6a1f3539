//! Text helpers

/// Truncate to at most `max_bytes` without splitting a UTF-8 character.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Shorten text for log lines
pub fn preview(s: &str, max_chars: usize) -> String {
    let mut chars = s.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_to_char_boundary("methods", 4), "meth");
        assert_eq!(truncate_to_char_boundary("abc", 10), "abc");
    }

    #[test]
    fn test_truncate_multibyte() {
        // 'µ' is two bytes
        let s = "aµb";
        assert_eq!(truncate_to_char_boundary(s, 2), "a");
        assert_eq!(truncate_to_char_boundary(s, 3), "aµ");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("a long headline", 6), "a long...");
    }
}
