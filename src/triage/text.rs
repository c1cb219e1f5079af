//! Text helpers shared by the classifier, the aggregator and the notifiers.

/// Splits text into lower-case tokens made of alphanumeric characters.
/// Punctuation and whitespace act as separators and are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}

/// Returns at most `max_chars` characters of `text`, appending "..." when
/// something was cut. Never splits a UTF-8 character.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

/// Same as [`truncate_with_ellipsis`] without the marker.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
