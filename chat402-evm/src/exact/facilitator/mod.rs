//! Facilitator-side verification and settlement for the EVM `exact` scheme.
//!
//! [`verify`] and [`signature`] are pure and always compiled, since the
//! client signs with the same EIP-712 hashing the verifier checks. Settlement
//! and the in-process [`ExactEvmFacilitator`] need the `facilitator` feature.

pub mod signature;
pub mod verify;

#[cfg(feature = "facilitator")]
mod contract;
#[cfg(feature = "facilitator")]
mod error;
#[cfg(feature = "facilitator")]
mod local;
#[cfg(feature = "facilitator")]
mod settle;

pub use verify::{VerifiedAuthorization, typed_requirements, verify_exact_payment};

#[cfg(feature = "facilitator")]
pub use error::Eip155ExactError;
#[cfg(feature = "facilitator")]
pub use local::ExactEvmFacilitator;
#[cfg(feature = "facilitator")]
pub use settle::{Eip3009Settler, SettlementExecutor, SettlementReceipt};
