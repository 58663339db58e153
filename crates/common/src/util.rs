//! Small string helpers shared across crates.

/// Truncate a string for log output, appending `...` when cut.
pub fn elide(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}...")
}

/// Normalize a phone-like string to E.164 (`+` followed by digits).
///
/// Returns `None` when the input carries no digits at all.
pub fn normalize_e164(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        None
    } else {
        Some(format!("+{digits}"))
    }
}

/// Convert a channel-native JID (`<digits>@<host>`) to E.164.
pub fn jid_to_e164(jid: &str) -> Option<String> {
    let local = jid.split('@').next().unwrap_or(jid);
    normalize_e164(local)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elide_keeps_short_strings_intact() {
        assert_eq!(elide("hello", 10), "hello");
        assert_eq!(elide("hello world", 5), "hello...");
    }

    #[test]
    fn elide_counts_chars_not_bytes() {
        assert_eq!(elide("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn normalize_strips_formatting() {
        assert_eq!(normalize_e164("+49 170 000-0001").as_deref(), Some("+491700000001"));
        assert_eq!(normalize_e164("491700000001").as_deref(), Some("+491700000001"));
        assert_eq!(normalize_e164("no digits"), None);
    }

    #[test]
    fn jid_conversion() {
        assert_eq!(
            jid_to_e164("491700000001@s.whatsapp.net").as_deref(),
            Some("+491700000001")
        );
        assert_eq!(jid_to_e164("broadcast@g.us"), None);
    }
}
