//! Rough token estimates and cost lookup.
//!
//! Real token counts come from the provider; these helpers are for display
//! before a response arrives.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Estimate the number of tokens in `text`.
///
/// CJK unified ideographs (U+4E00 to U+9FA5) count one token each. Every
/// other character counts a quarter token per UTF-16 code unit, so
/// characters outside the Basic Multilingual Plane (most emoji) weigh twice
/// as much as ASCII. The total is rounded up.
///
/// # Example
/// ```
/// use streamchat::tokens::estimate_tokens;
///
/// assert_eq!(estimate_tokens("hello"), 2);
/// assert_eq!(estimate_tokens("你好"), 2);
/// assert_eq!(estimate_tokens(""), 0);
/// ```
pub fn estimate_tokens(text: &str) -> usize {
    let (cjk, other) = text.chars().fold((0usize, 0usize), |(cjk, other), c| {
        if is_cjk(c) {
            (cjk + 1, other)
        } else {
            (cjk, other + c.len_utf16())
        }
    });
    cjk + other.div_ceil(4)
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// Price of a model in USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input: f64,
    pub output: f64,
}

/// Per-model prices.
///
/// The built-in entries are a static snapshot that nobody keeps current.
/// Treat results as ballpark figures and override entries from
/// configuration where accuracy matters.
#[derive(Debug, Clone, PartialEq)]
pub struct CostTable {
    prices: HashMap<String, ModelPrice>,
}

impl Default for CostTable {
    fn default() -> Self {
        let snapshot = [
            ("gpt-4o", 5.0, 15.0),
            ("gpt-4o-mini", 0.15, 0.60),
            ("gemini-2.5-pro", 1.25, 2.5),
            ("gemini-2.5-flash", 0.075, 0.30),
            ("llama3.1", 0.0, 0.0),
        ];
        Self {
            prices: snapshot
                .into_iter()
                .map(|(model, input, output)| (model.to_string(), ModelPrice { input, output }))
                .collect(),
        }
    }
}

impl CostTable {
    /// A table without any entries.
    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    /// Add or replace the price of `model`.
    pub fn insert(&mut self, model: impl Into<String>, price: ModelPrice) {
        self.prices.insert(model.into(), price);
    }

    /// Add or replace several entries.
    pub fn extend(&mut self, prices: impl IntoIterator<Item = (String, ModelPrice)>) {
        self.prices.extend(prices);
    }

    pub fn price(&self, model: &str) -> Option<ModelPrice> {
        self.prices.get(model).copied()
    }

    /// Cost in USD. Unknown models cost nothing.
    pub fn calculate(&self, input_tokens: usize, output_tokens: usize, model: &str) -> f64 {
        let price = self.price(model).unwrap_or_default();
        (input_tokens as f64 * price.input + output_tokens as f64 * price.output) / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_rounds_up_to_quarter_length() {
        for n in 0..40 {
            let text = "a".repeat(n);
            assert_eq!(estimate_tokens(&text), n.div_ceil(4), "length {}", n);
        }
    }

    #[test]
    fn test_cjk_counts_one_per_character() {
        assert_eq!(estimate_tokens("你好世界"), 4);
        assert_eq!(estimate_tokens(&"中".repeat(25)), 25);
    }

    #[test]
    fn test_mixed_text() {
        // 2 CJK + 6 other ("hello ")
        assert_eq!(estimate_tokens("hello 你好"), 4);
    }

    #[test]
    fn test_characters_outside_range_count_as_other() {
        // Hiragana and full-width punctuation are not in U+4E00..=U+9FA5.
        assert_eq!(estimate_tokens("こんにちは"), 2);
        assert_eq!(estimate_tokens(&"\u{9fa5}".repeat(5)), 5);
        assert_eq!(estimate_tokens(&"\u{9fa6}".repeat(5)), 2);
        assert_eq!(estimate_tokens(&"\u{4dff}".repeat(5)), 2);
    }

    #[test]
    fn test_astral_characters_count_two_units() {
        // U+1F600 is a surrogate pair in UTF-16.
        assert_eq!(estimate_tokens(&"\u{1f600}".repeat(4)), 2);
        assert_eq!(estimate_tokens("ab\u{1f600}"), 1);
        assert_eq!(estimate_tokens("abc\u{1f600}"), 2);
    }

    #[test]
    fn test_estimate_is_monotonic_and_idempotent() {
        let text = "The quick brown fox jumps over the lazy dog";
        let mut last = 0;
        for end in 0..=text.len() {
            let estimate = estimate_tokens(&text[..end]);
            assert!(estimate >= last);
            assert_eq!(estimate, estimate_tokens(&text[..end]));
            last = estimate;
        }
    }

    #[test]
    fn test_calculate_known_model() {
        let table = CostTable::default();
        let cost = table.calculate(1_000_000, 1_000_000, "gpt-4o");
        assert!((cost - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_calculate_unknown_model_is_free() {
        assert_eq!(CostTable::default().calculate(500, 500, "mystery"), 0.0);
        assert_eq!(CostTable::empty().calculate(500, 500, "gpt-4o"), 0.0);
    }

    #[test]
    fn test_insert_overrides_snapshot() {
        let mut table = CostTable::default();
        table.insert(
            "gpt-4o",
            ModelPrice {
                input: 2.5,
                output: 10.0,
            },
        );
        assert_eq!(table.price("gpt-4o").unwrap().input, 2.5);
    }
}
