//! Token counter implementations.

use crate::types::Item;

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    /// Estimated cost of sending an item: title plus body.
    fn count_item(&self, item: &Item) -> usize {
        self.count(&item.title) + self.count(&item.content)
    }
}

#[derive(Debug, Clone)]
pub struct CharacterEstimator {
    chars_per_token: f64,
}

impl CharacterEstimator {
    pub fn new() -> Self {
        Self::with_ratio(4.0)
    }

    pub fn with_ratio(chars_per_token: f64) -> Self {
        let chars_per_token = if chars_per_token.is_finite() && chars_per_token > 0.0 {
            chars_per_token
        } else {
            4.0
        };
        Self { chars_per_token }
    }

    /// Build from the `tokens_per_char` setting used across the pipeline config.
    pub fn from_tokens_per_char(tokens_per_char: f64) -> Self {
        if tokens_per_char.is_finite() && tokens_per_char > 0.0 {
            Self::with_ratio(1.0 / tokens_per_char)
        } else {
            Self::new()
        }
    }

    pub fn chars_per_token(&self) -> f64 {
        self.chars_per_token
    }
}

impl Default for CharacterEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter for CharacterEstimator {
    fn count(&self, text: &str) -> usize {
        (text.chars().count() as f64 / self.chars_per_token).ceil() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_character_estimator_rounds_up() {
        let counter = CharacterEstimator::new();
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("abc"), 1);
        assert_eq!(counter.count("abcd"), 1);
        assert_eq!(counter.count("abcde"), 2);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let counter = CharacterEstimator::with_ratio(1.0);
        assert_eq!(counter.count("héllo"), 5);
    }

    #[test]
    fn test_from_tokens_per_char() {
        let counter = CharacterEstimator::from_tokens_per_char(0.5);
        assert_eq!(counter.chars_per_token(), 2.0);
        // invalid ratios fall back to the default
        assert_eq!(CharacterEstimator::from_tokens_per_char(0.0).chars_per_token(), 4.0);
        assert_eq!(CharacterEstimator::with_ratio(f64::NAN).chars_per_token(), 4.0);
    }

    #[test]
    fn test_count_item_includes_title() {
        let counter = CharacterEstimator::with_ratio(1.0);
        let item = Item::new(1, "abc", "defgh", Utc::now());
        assert_eq!(counter.count_item(&item), 8);
    }
}
