//! Typing animation for assistant replies.
//!
//! The full text is already known; reveal only decides how much of it is
//! visible on each tick.

/// Successive prefixes of `text`, each `chunk_chars` characters longer than
/// the last, ending with `text` itself. Prefixes always end on a char boundary.
pub fn prefixes(text: &str, chunk_chars: usize) -> impl Iterator<Item = &str> {
    let step = chunk_chars.max(1);
    let mut ends: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .skip(step)
        .step_by(step)
        .collect();
    ends.push(text.len());
    ends.dedup();
    ends.into_iter().map(move |end| &text[..end])
}
