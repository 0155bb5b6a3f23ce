//! Outbound text preparation

/// Marker appended to text that was cut short
pub const TRUNCATION_MARKER: &str = "...";

/// Limit `text` to `max_chars` characters, plus the truncation marker
///
/// The cut lands on the last whitespace inside the limit so no word is split.
/// Text without any whitespace in range is cut hard at the limit. Text that
/// already fits is returned unchanged.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };

    let head = &text[..cut];
    let head = if text[cut..].starts_with(char::is_whitespace) {
        head.trim_end()
    } else {
        match head.rfind(char::is_whitespace) {
            Some(pos) if pos > 0 => head[..pos].trim_end(),
            _ => head,
        }
    };

    format!("{}{}", head, TRUNCATION_MARKER)
}
