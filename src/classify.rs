/// Decides whether a text unit is prose worth sending to a translation engine.
///
/// Numerals, punctuation and isolated single letters (variables in formulas)
/// are passed through untouched. Not language-aware.
pub fn is_translatable(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    if !trimmed.chars().any(char::is_alphabetic) {
        return false;
    }
    longest_alphabetic_run(trimmed) >= 2
}

fn longest_alphabetic_run(text: &str) -> usize {
    let mut longest = 0usize;
    let mut current = 0usize;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}
