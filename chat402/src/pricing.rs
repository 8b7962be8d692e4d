//! Usage-based pricing of chat requests.
//!
//! The price of a request is an upper bound on the tokens it can consume:
//! an estimate of the input tokens plus a fixed allowance for the reply,
//! multiplied by a per-token price in atomic units of the payment asset.
//!
//! Input tokens are estimated per message as `ceil(words * 1.3)`, where words
//! are whitespace-separated runs of the message text. The ratio is held as an
//! exact fraction of tenths, so every quote is integer arithmetic.
//!
//! ```
//! use chat402::chat::ChatMessage;
//! use chat402::pricing::PricingEngine;
//!
//! let engine = PricingEngine::default();
//! let quote = engine.quote(&[ChatMessage::user("what is the capital of France")]);
//! // 6 words -> ceil(7.8) = 8 input tokens, plus the 500 token reply allowance.
//! assert_eq!(quote.total_tokens, 508);
//! ```

use alloy_primitives::U256;

use crate::chat::ChatMessage;

/// Immutable pricing constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingConfig {
    /// Estimated tokens per word, in tenths (`13` means 1.3 tokens per word).
    pub tokens_per_word_tenths: u64,
    /// Tokens reserved for the reply.
    pub output_token_buffer: u64,
    /// Atomic units of the asset charged per token.
    pub price_per_token: U256,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tokens_per_word_tenths: 13,
            output_token_buffer: 500,
            price_per_token: U256::from(1u64),
        }
    }
}

/// The price of one request, with the token counts it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceQuote {
    /// Estimated input tokens across all messages.
    pub input_tokens: u64,
    /// Tokens reserved for the reply.
    pub output_buffer: u64,
    /// `input_tokens + output_buffer`.
    pub total_tokens: u64,
    /// Required payment in atomic units.
    pub amount: U256,
}

/// Converts conversations into [`PriceQuote`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    /// Creates an engine with the given constants.
    #[must_use]
    pub const fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Returns the constants this engine prices with.
    #[must_use]
    pub const fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Estimated token count of a single text.
    ///
    /// Every message counts as at least one word, so empty or
    /// whitespace-only text is priced like a single word.
    #[must_use]
    pub fn estimate_tokens(&self, text: &str) -> u64 {
        let words = text.split_whitespace().count().max(1) as u64;
        words
            .saturating_mul(self.config.tokens_per_word_tenths)
            .div_ceil(10)
    }

    /// Prices a conversation.
    #[must_use]
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(level = "debug", skip_all, fields(messages = messages.len()), ret)
    )]
    pub fn quote(&self, messages: &[ChatMessage]) -> PriceQuote {
        let input_tokens = messages
            .iter()
            .map(|m| self.estimate_tokens(&m.content))
            .fold(0u64, u64::saturating_add);
        let output_buffer = self.config.output_token_buffer;
        let total_tokens = input_tokens.saturating_add(output_buffer);
        let amount = U256::from(total_tokens).saturating_mul(self.config.price_per_token);
        PriceQuote {
            input_tokens,
            output_buffer,
            total_tokens,
            amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(text: &str) -> ChatMessage {
        ChatMessage::user(text)
    }

    #[test]
    fn five_words_cost_507() {
        let quote = PricingEngine::default().quote(&[user("hello there how are you")]);
        assert_eq!(quote.input_tokens, 7);
        assert_eq!(quote.total_tokens, 507);
        assert_eq!(quote.amount, U256::from(507u64));
    }

    #[test]
    fn whitespace_only_is_priced_as_one_word() {
        let engine = PricingEngine::default();
        assert_eq!(engine.estimate_tokens(""), 2);
        assert_eq!(engine.estimate_tokens("   \n\t "), 2);
        assert_eq!(engine.estimate_tokens("hello"), 2);
        assert_eq!(engine.quote(&[user("  ")]).amount, U256::from(502u64));
    }

    #[test]
    fn ceiling_is_per_message() {
        let engine = PricingEngine::default();
        // one word -> ceil(1.3) = 2, twice.
        let quote = engine.quote(&[user("hi"), user("there")]);
        assert_eq!(quote.input_tokens, 4);
    }

    #[test]
    fn ten_words_are_exactly_thirteen_tokens() {
        let engine = PricingEngine::default();
        assert_eq!(engine.estimate_tokens("a b c d e f g h i j"), 13);
    }

    #[test]
    fn monotonic_in_word_count() {
        let engine = PricingEngine::default();
        let mut text = String::new();
        let mut previous = engine.quote(&[user(&text)]).amount;
        for _ in 0..200 {
            text.push_str(" word");
            let current = engine.quote(&[user(&text)]).amount;
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn price_per_token_scales_amount() {
        let engine = PricingEngine::new(PricingConfig {
            price_per_token: U256::from(3u64),
            ..PricingConfig::default()
        });
        assert_eq!(engine.quote(&[user("one two three four five")]).amount, U256::from(1521u64));
    }

    #[test]
    fn amount_saturates() {
        let engine = PricingEngine::new(PricingConfig {
            price_per_token: U256::MAX,
            ..PricingConfig::default()
        });
        assert_eq!(engine.quote(&[user("hi")]).amount, U256::MAX);
    }
}
