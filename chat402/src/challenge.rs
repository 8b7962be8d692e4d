//! Builds the `402 Payment Required` envelope.
//!
//! Every path that asks a client to pay, whether the proof was missing or
//! refused, goes through [`ChallengeBuilder`], so each envelope carries a
//! requirement priced for the request at hand.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::pricing::PriceQuote;
use crate::proto::v1::{self, FacilitatorInfo, PaymentRequired, PaymentRequirements};

/// EIP-712 domain of the payment asset, advertised as `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDomain {
    /// Token name as used in the EIP-712 domain (e.g., `"USD Coin"`).
    pub name: String,
    /// Token version as used in the EIP-712 domain (e.g., `"2"`).
    pub version: String,
}

/// Fixed parts of every requirement this server issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeConfig {
    /// The payment scheme. Only `"exact"` is spoken.
    pub scheme: String,
    /// The network name (e.g., `"arbitrum-sepolia"`).
    pub network: String,
    /// Payee address.
    pub pay_to: String,
    /// Token contract address.
    pub asset: String,
    /// How long an authorization may stay valid, and the settlement bound.
    pub max_timeout_seconds: u64,
    /// Path of the metered resource.
    pub resource: String,
    /// MIME type of the metered resource.
    pub mime_type: String,
    /// EIP-712 domain of the asset.
    pub extra: AssetDomain,
    /// Facilitator URL to advertise, if any.
    pub facilitator_url: Option<Url>,
}

impl ChallengeConfig {
    /// Defaults for the chat endpoint: `exact` scheme, `/chat`, JSON, 300 seconds.
    #[must_use]
    pub fn new(network: impl Into<String>, pay_to: impl Into<String>, asset: impl Into<String>, extra: AssetDomain) -> Self {
        Self {
            scheme: "exact".to_owned(),
            network: network.into(),
            pay_to: pay_to.into(),
            asset: asset.into(),
            max_timeout_seconds: 300,
            resource: "/chat".to_owned(),
            mime_type: "application/json".to_owned(),
            extra,
            facilitator_url: None,
        }
    }
}

/// Turns price quotes into payment requirements and `402` bodies.
#[derive(Debug, Clone)]
pub struct ChallengeBuilder {
    config: ChallengeConfig,
}

impl ChallengeBuilder {
    /// The envelope `error` when no proof was presented.
    pub const PAYMENT_REQUIRED: &'static str = "Payment Required";

    /// Creates a builder from fixed settings.
    #[must_use]
    pub const fn new(config: ChallengeConfig) -> Self {
        Self { config }
    }

    /// Returns the fixed settings.
    #[must_use]
    pub const fn config(&self) -> &ChallengeConfig {
        &self.config
    }

    /// The requirement a proof for `quote` must satisfy.
    #[must_use]
    pub fn requirements(&self, quote: &PriceQuote) -> PaymentRequirements {
        PaymentRequirements {
            scheme: self.config.scheme.clone(),
            network: self.config.network.clone(),
            max_amount_required: quote.amount.to_string(),
            resource: self.config.resource.clone(),
            description: format!(
                "Payment for AI chat ({} input + {} max output tokens)",
                quote.input_tokens, quote.output_buffer
            ),
            mime_type: self.config.mime_type.clone(),
            output_schema: None,
            pay_to: self.config.pay_to.clone(),
            max_timeout_seconds: self.config.max_timeout_seconds,
            asset: self.config.asset.clone(),
            extra: serde_json::to_value(&self.config.extra).ok(),
        }
    }

    /// The initial challenge for a request that carried no proof.
    #[must_use]
    pub fn build(&self, quote: &PriceQuote) -> PaymentRequired {
        self.build_with_error(quote, Self::PAYMENT_REQUIRED)
    }

    /// A fresh challenge stating why the previous proof was refused.
    #[must_use]
    pub fn build_with_error(&self, quote: &PriceQuote, reason: impl Into<String>) -> PaymentRequired {
        PaymentRequired {
            x402_version: v1::V1,
            error: reason.into(),
            accepts: vec![self.requirements(quote)],
            facilitator: self
                .config
                .facilitator_url
                .clone()
                .map(|url| FacilitatorInfo { url }),
        }
    }
}
