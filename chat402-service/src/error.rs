//! Error types for the chat service.

use alloy_primitives::Address;

/// Failures that stop the service from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// `NETWORK` names a network this build does not know.
    #[error("unknown network {0:?}")]
    UnknownNetwork(String),

    /// Settlement was enabled without a key to pay gas with.
    #[error("ENABLE_SETTLEMENT requires PAYEE_PRIVATE_KEY")]
    SettlementWithoutKey,

    /// Neither a payee key nor a payee address was given.
    #[error("either PAYEE_PRIVATE_KEY or PAY_TO must be set")]
    MissingPayee,

    /// `PAY_TO` disagrees with the address of the payee key.
    #[error("PAY_TO {pay_to} does not match the payee key address {key}")]
    PayeeMismatch {
        /// The configured `PAY_TO`.
        pay_to: Address,
        /// Address derived from `PAYEE_PRIVATE_KEY`.
        key: Address,
    },

    /// The RPC or provider URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
