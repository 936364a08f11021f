//! The machine-readable `[PROFILE_IDS: ...]` trailer on composed replies.

use regex::Regex;
use std::sync::LazyLock;

static TRAILER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[PROFILE_IDS:\s*([^\]]*)\]").expect("trailer pattern is a valid regex")
});

/// Render ids as a trailer line
pub fn render_trailer(ids: &[String]) -> String {
    format!("[PROFILE_IDS: {}]", ids.join(", "))
}

/// Ids listed in the last trailer of `text`, trimmed and de-duplicated in order
///
/// Returns `None` when the text carries no trailer at all.
pub fn parse_trailer(text: &str) -> Option<Vec<String>> {
    let caps = TRAILER.captures_iter(text).last()?;
    let body = caps.get(1).map_or("", |m| m.as_str());

    let mut ids: Vec<String> = Vec::new();
    for token in body.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !ids.iter().any(|id| id == token) {
            ids.push(token.to_string());
        }
    }
    Some(ids)
}

/// Text with every trailer removed and surrounding whitespace trimmed
pub fn strip_trailer(text: &str) -> String {
    TRAILER.replace_all(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_dedupes() {
        let ids = parse_trailer("Great picks.\n[PROFILE_IDS:  a1 , b2,, a1 ,c3 ]").unwrap();
        assert_eq!(ids, vec!["a1", "b2", "c3"]);
    }

    #[test]
    fn test_last_trailer_wins() {
        let text = "[PROFILE_IDS: x] some prose [PROFILE_IDS: y, z]";
        assert_eq!(parse_trailer(text).unwrap(), vec!["y", "z"]);
    }

    #[test]
    fn test_missing_trailer() {
        assert!(parse_trailer("No ids here").is_none());
        assert_eq!(parse_trailer("[PROFILE_IDS: ]").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_strip_and_render() {
        let text = format!("Try these two.\n\n{}", render_trailer(&["p1".to_string(), "p2".to_string()]));
        assert!(text.ends_with("[PROFILE_IDS: p1, p2]"));
        assert_eq!(strip_trailer(&text), "Try these two.");
        assert_eq!(parse_trailer(&text).unwrap(), vec!["p1", "p2"]);
    }
}
