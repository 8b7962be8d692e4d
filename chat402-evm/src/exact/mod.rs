//! EVM "exact" payment scheme implementation.
//!
//! This module implements the `exact` scheme using EIP-3009
//! `transferWithAuthorization` for precise payment amounts.
//!
//! - [`types`] - Wire types of the proof and the typed requirement
//! - [`facilitator`] - Verification, and with the `facilitator` feature,
//!   on-chain settlement
//! - `client` - Wallet abstraction and proof signing (`client` feature)

pub mod facilitator;
pub mod types;

#[cfg(feature = "client")]
pub mod client;

pub use facilitator::{VerifiedAuthorization, typed_requirements, verify_exact_payment};
pub use types::*;

#[cfg(feature = "client")]
pub use client::{Eip155ExactClient, LocalWallet, PaymentWallet, WalletError};
#[cfg(feature = "facilitator")]
pub use facilitator::{
    Eip155ExactError, Eip3009Settler, ExactEvmFacilitator, SettlementExecutor, SettlementReceipt,
};
