//! Oversized item truncation.

use crate::types::Item;

/// Appended to content that was cut down to fit a request.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

#[derive(Debug, Clone)]
pub struct ItemTruncator {
    tokens_per_char: f64,
}

impl ItemTruncator {
    pub fn new(tokens_per_char: f64) -> Self {
        let tokens_per_char = if tokens_per_char.is_finite() && tokens_per_char > 0.0 {
            tokens_per_char
        } else {
            0.25
        };
        Self { tokens_per_char }
    }

    /// Character budget for `max_tokens` tokens.
    pub fn max_chars(&self, max_tokens: usize) -> usize {
        (max_tokens as f64 / self.tokens_per_char).floor() as usize
    }

    /// Cut `item.content` to the character budget of `max_tokens` and mark it.
    /// Content already within budget is returned untouched.
    pub fn truncate(&self, mut item: Item, max_tokens: usize) -> Item {
        let max_chars = self.max_chars(max_tokens);
        if item.content.chars().count() <= max_chars {
            return item;
        }
        let cut = item
            .content
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(item.content.len());
        item.content.truncate(cut);
        item.content.push_str(TRUNCATION_MARKER);
        item.truncated = true;
        item
    }
}

impl Default for ItemTruncator {
    fn default() -> Self {
        Self::new(0.25)
    }
}
