//! Outbound text chunking for channels with per-message size limits.

/// Split `text` into chunks of at most `limit` characters.
///
/// Break points prefer the last newline in the window, then the last space,
/// and fall back to a hard cut. Cuts land on char boundaries, so multi-byte
/// text never splits mid-character. A `limit` of zero disables chunking.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 || text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.chars().count() > limit {
        let window_end = rest
            .char_indices()
            .nth(limit)
            .map_or(rest.len(), |(idx, _)| idx);
        let window = &rest[..window_end];

        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&at| at > 0)
            .unwrap_or(window_end);

        let chunk = rest[..cut].trim_end();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        rest = rest[cut..].trim_start();
    }
    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    if chunks.is_empty() {
        chunks.push(String::new());
    }
    chunks
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(chunk_text("hello", 100), vec!["hello"]);
        assert_eq!(chunk_text("hello", 0), vec!["hello"]);
    }

    #[test]
    fn prefers_newline_breaks() {
        let text = "first line\nsecond line\nthird line";
        let chunks = chunk_text(text, 24);
        assert_eq!(chunks[0], "first line\nsecond line");
        assert_eq!(chunks[1], "third line");
    }

    #[test]
    fn falls_back_to_space_then_hard_cut() {
        let chunks = chunk_text("one two three four", 9);
        assert!(chunks.iter().all(|c| c.chars().count() <= 9));
        assert_eq!(chunks.join(" "), "one two three four");

        let chunks = chunk_text("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "日本語のテキストです".repeat(3);
        let chunks = chunk_text(&text, 7);
        assert!(chunks.iter().all(|c| c.chars().count() <= 7));
        assert_eq!(chunks.concat(), text);
    }
}
