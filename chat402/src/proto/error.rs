//! Verification failures and their machine-readable reason codes.

use serde::{Deserialize, Serialize};

/// Why a submitted payment proof was not accepted.
///
/// The `Display` text is what the server puts in the `error` field of the
/// re-issued challenge, so it is written for the paying client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum PaymentVerificationError {
    /// The proof decoded but its scheme payload is missing or has bad fields.
    #[error("Invalid payment payload: {0}")]
    InvalidFormat(String),
    /// The proof uses a scheme the server does not accept.
    #[error("Unsupported payment scheme or network: scheme {0}")]
    UnsupportedScheme(String),
    /// The proof targets a different network than the server settles on.
    #[error("Unsupported payment scheme or network: network {0}")]
    ChainIdMismatch(String),
    /// The authorized value is below the quoted price.
    #[error("Insufficient payment amount. Required: {required}, provided: {provided}")]
    InsufficientAmount {
        /// Quoted amount in atomic units.
        required: String,
        /// Authorized amount in atomic units.
        provided: String,
    },
    /// The authorization pays someone other than the configured payee.
    #[error("Payment recipient mismatch")]
    RecipientMismatch,
    /// The signature is malformed or was not produced by `from`.
    #[error("Invalid payment signature: {0}")]
    InvalidSignature(String),
    /// `validAfter` is still in the future.
    #[error("Payment authorization is not yet valid")]
    Early,
    /// `validBefore` has passed.
    #[error("Payment authorization expired")]
    Expired,
    /// `validAfter` is not strictly before `validBefore`.
    #[error("Payment authorization window is empty")]
    InvalidTimeWindow,
    /// The chain reports the authorization nonce as consumed.
    #[error("Authorization nonce already used")]
    NonceAlreadyUsed,
    /// The server's own requirements could not be interpreted.
    ///
    /// This is a configuration fault, not something the client can fix.
    #[error("Payment requirements are misconfigured: {0}")]
    InvalidRequirements(String),
}

impl PaymentVerificationError {
    /// Returns the reason code for this failure.
    #[must_use]
    pub const fn reason(&self) -> ErrorReason {
        match self {
            Self::InvalidFormat(_) => ErrorReason::InvalidFormat,
            Self::UnsupportedScheme(_) => ErrorReason::UnsupportedScheme,
            Self::ChainIdMismatch(_) => ErrorReason::ChainIdMismatch,
            Self::InsufficientAmount { .. } => ErrorReason::InvalidPaymentAmount,
            Self::RecipientMismatch => ErrorReason::RecipientMismatch,
            Self::InvalidSignature(_) => ErrorReason::InvalidSignature,
            Self::Early => ErrorReason::InvalidPaymentEarly,
            Self::Expired => ErrorReason::InvalidPaymentExpired,
            Self::InvalidTimeWindow => ErrorReason::InvalidTimeWindow,
            Self::NonceAlreadyUsed => ErrorReason::NonceAlreadyUsed,
            Self::InvalidRequirements(_) => ErrorReason::UnexpectedError,
        }
    }

    /// Whether the failure lies with the server rather than the submitted proof.
    #[must_use]
    pub const fn is_server_fault(&self) -> bool {
        matches!(self, Self::InvalidRequirements(_))
    }
}

impl From<serde_json::Error> for PaymentVerificationError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidFormat(value.to_string())
    }
}

/// Machine-readable reason codes for payment failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorReason {
    /// The payment payload format is invalid.
    InvalidFormat,
    /// The scheme is not supported.
    UnsupportedScheme,
    /// The network does not match.
    ChainIdMismatch,
    /// The payment amount is too low.
    InvalidPaymentAmount,
    /// The recipient address does not match.
    RecipientMismatch,
    /// The signature is invalid.
    InvalidSignature,
    /// The authorization is not yet valid.
    InvalidPaymentEarly,
    /// The authorization has expired.
    InvalidPaymentExpired,
    /// The authorization window is inverted or empty.
    InvalidTimeWindow,
    /// The authorization nonce has already been used.
    NonceAlreadyUsed,
    /// An unexpected error occurred.
    UnexpectedError,
}

impl ErrorReason {
    /// Returns the `snake_case` string representation matching the wire format.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "invalid_format",
            Self::UnsupportedScheme => "unsupported_scheme",
            Self::ChainIdMismatch => "chain_id_mismatch",
            Self::InvalidPaymentAmount => "invalid_payment_amount",
            Self::RecipientMismatch => "recipient_mismatch",
            Self::InvalidSignature => "invalid_signature",
            Self::InvalidPaymentEarly => "invalid_payment_early",
            Self::InvalidPaymentExpired => "invalid_payment_expired",
            Self::InvalidTimeWindow => "invalid_time_window",
            Self::NonceAlreadyUsed => "nonce_already_used",
            Self::UnexpectedError => "unexpected_error",
        }
    }
}

impl core::fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_match_serde_names() {
        let reasons = [
            ErrorReason::InvalidFormat,
            ErrorReason::UnsupportedScheme,
            ErrorReason::ChainIdMismatch,
            ErrorReason::InvalidPaymentAmount,
            ErrorReason::RecipientMismatch,
            ErrorReason::InvalidSignature,
            ErrorReason::InvalidPaymentEarly,
            ErrorReason::InvalidPaymentExpired,
            ErrorReason::InvalidTimeWindow,
            ErrorReason::NonceAlreadyUsed,
            ErrorReason::UnexpectedError,
        ];
        for reason in reasons {
            let json = serde_json::to_value(reason).unwrap();
            assert_eq!(json, serde_json::Value::String(reason.as_str().to_owned()));
        }
    }

    #[test]
    fn insufficient_amount_message_names_both_values() {
        let err = PaymentVerificationError::InsufficientAmount {
            required: "507".into(),
            provided: "506".into(),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient payment amount. Required: 507, provided: 506"
        );
        assert_eq!(err.reason(), ErrorReason::InvalidPaymentAmount);
        assert!(!err.is_server_fault());
    }
}
