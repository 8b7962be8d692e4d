//! Wire format types for chat402 payment messages.
//!
//! All types serialize to JSON using camelCase field names. Only x402
//! version 1 is spoken; see [`v1`].
//!
//! # Key Types
//!
//! - [`v1::PaymentRequired`] - `402` body listing acceptable payments
//! - [`v1::PaymentPayload`] - The proof carried in `X-Payment`
//! - [`PaymentResponse`] - The receipt carried in `X-Payment-Response`
//! - [`SettlementResult`] - Outcome of an on-chain settlement attempt
//! - [`PaymentVerificationError`] - Why a proof was refused

use serde::{Deserialize, Serialize};

mod error;
pub mod v1;
mod version;

pub use error::*;
pub use version::*;

/// Outcome of submitting a verified authorization on-chain.
///
/// Settlement never fails past its boundary: any problem becomes
/// `success: false` with a human-readable `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    /// Whether the transfer was included with receipt status 1.
    pub success: bool,
    /// Hash of the settlement transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    /// Block the transaction was included in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Gas used by the transaction, as a decimal string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<String>,
    /// Failure reason when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SettlementResult {
    /// A confirmed, successful settlement.
    #[must_use]
    pub const fn confirmed(transaction_hash: String, block_number: Option<u64>, gas_used: String) -> Self {
        Self {
            success: true,
            transaction_hash: Some(transaction_hash),
            block_number,
            gas_used: Some(gas_used),
            error: None,
        }
    }

    /// A failed settlement with the given reason.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_hash: None,
            block_number: None,
            gas_used: None,
            error: Some(reason.into()),
        }
    }
}

/// How far a paid request got on the payment side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    /// The proof verified; nothing was submitted on-chain.
    Verified,
    /// The transfer settled on-chain.
    Completed,
}

/// Receipt returned to the client in the `X-Payment-Response` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    /// Verification-only or settled.
    pub status: SettlementStatus,
    /// Settlement transaction hash, `null` when not settled.
    pub transaction_hash: Option<String>,
    /// Settlement block number, `null` when not settled.
    pub block_number: Option<u64>,
    /// Gas used by settlement, `null` when not settled.
    pub gas_used: Option<String>,
    /// Authorized amount in atomic units.
    pub amount: String,
    /// Token contract address.
    pub token: String,
    /// Whether funds moved on-chain.
    pub settled: bool,
}

impl PaymentResponse {
    /// Receipt for a proof that was verified but not settled.
    #[must_use]
    pub const fn verified(amount: String, token: String) -> Self {
        Self {
            status: SettlementStatus::Verified,
            transaction_hash: None,
            block_number: None,
            gas_used: None,
            amount,
            token,
            settled: false,
        }
    }

    /// Receipt for a successful settlement.
    #[must_use]
    pub fn completed(settlement: SettlementResult, amount: String, token: String) -> Self {
        Self {
            status: SettlementStatus::Completed,
            transaction_hash: settlement.transaction_hash,
            block_number: settlement.block_number,
            gas_used: settlement.gas_used,
            amount,
            token,
            settled: true,
        }
    }
}
