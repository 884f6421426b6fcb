//! Token estimation
//!
//! A fixed heuristic: the floored average of a character estimate
//! (`chars / 4`) and a word estimate (`words / 0.75`), each floored first.
//! Budget tests depend on these exact constants.

/// Tokens held back from the context window for the model's reply
pub const RESPONSE_RESERVE_TOKENS: usize = 2000;

/// Estimate the token cost of a piece of text
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    let char_estimate = text.chars().count() / 4;
    // words / 0.75 == words * 4 / 3
    let word_estimate = text.split_whitespace().count() * 4 / 3;
    (char_estimate + word_estimate) / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_pins_constants() {
        assert_eq!(estimate_tokens(""), 0);
        // 11 chars -> 2, 2 words -> 2
        assert_eq!(estimate_tokens("hello world"), 2);
        // 18 chars -> 4, 4 words -> 5, avg 4
        assert_eq!(estimate_tokens("What is your name?"), 4);
        // 400 chars -> 100, 80 words -> 106, avg 103
        let text = "abcd ".repeat(80);
        assert_eq!(estimate_tokens(&text), 103);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        // 8 chars (16+ bytes) -> 2, 1 word -> 1, avg 1
        assert_eq!(estimate_tokens("éééééééé"), 1);
    }
}
