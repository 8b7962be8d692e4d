//! Error types for the payment gate.

use chat402::proto::{ErrorReason, PaymentVerificationError};
use http::StatusCode;

use crate::error::HttpError;

/// Why a request did not reach the metered resource, or failed after it.
#[derive(Debug, thiserror::Error)]
pub enum PaygateError {
    /// No `X-Payment` header was sent.
    #[error("Payment Required")]
    PaymentRequired,
    /// The `X-Payment` header could not be decoded.
    #[error("Invalid payment header format")]
    ProofMalformed(#[source] HttpError),
    /// The proof decoded but failed verification.
    #[error(transparent)]
    ProofInvalid(PaymentVerificationError),
    /// Settlement was attempted and did not confirm.
    #[error("Settlement failed: {0}")]
    SettlementFailed(String),
    /// A fault on our side. The detail is logged, never sent.
    #[error("internal failure: {0}")]
    Internal(String),
}

impl PaygateError {
    /// The HTTP status this error is answered with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::PAYMENT_REQUIRED,
        }
    }

    /// Machine-readable code of a refused proof, if the refusal has one.
    #[must_use]
    pub const fn reason(&self) -> Option<ErrorReason> {
        match self {
            Self::ProofMalformed(_) => Some(ErrorReason::InvalidFormat),
            Self::ProofInvalid(err) => Some(err.reason()),
            Self::PaymentRequired | Self::SettlementFailed(_) | Self::Internal(_) => None,
        }
    }
}

impl From<PaymentVerificationError> for PaygateError {
    fn from(err: PaymentVerificationError) -> Self {
        if err.is_server_fault() {
            Self::Internal(err.to_string())
        } else {
            Self::ProofInvalid(err)
        }
    }
}
