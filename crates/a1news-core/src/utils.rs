/// Truncate to `max_len` characters, appending `...` when something was cut.
pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn split_csv(v: &str) -> impl Iterator<Item = &str> {
    v.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "α".repeat(20);
        let t = truncate_text(&s, 10);
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), 13);
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn csv_skips_blank_entries() {
        let parts: Vec<&str> = split_csv(" a, ,b ,").collect();
        assert_eq!(parts, vec!["a", "b"]);
    }
}
