//! Shared helpers for tool handlers.

/// Marker appended when a tool result is cut short.
pub const TRUNCATION_MARKER: &str = "\n<response clipped: output exceeded the size limit>";

/// Truncate `text` to at most `max_len` bytes, breaking at the nearest
/// preceding char boundary and appending [`TRUNCATION_MARKER`].
///
/// When `max_len` is too small to hold the marker, a boundary-safe prefix is
/// returned without it so the result never exceeds `max_len`.
#[must_use]
pub fn truncate_output(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_owned();
    }

    if max_len < TRUNCATION_MARKER.len() {
        return text[..floor_char_boundary(text, max_len)].to_owned();
    }

    let boundary = floor_char_boundary(text, max_len - TRUNCATION_MARKER.len());
    format!("{}{TRUNCATION_MARKER}", &text[..boundary])
}

fn floor_char_boundary(text: &str, limit: usize) -> usize {
    text.char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= limit)
        .last()
        .unwrap_or(0)
}
