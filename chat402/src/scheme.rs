//! Client-side payment schemes.
//!
//! A [`SchemeClient`] turns one entry of a `402` challenge into a signed
//! [`PaymentPayload`]. The EVM implementation lives in `chat402-evm`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::facilitator::BoxFuture;
use crate::proto::v1::{PaymentPayload, PaymentRequirements};

/// The `"exact"` scheme identifier: pay exactly the quoted amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ExactScheme;

impl ExactScheme {
    /// Wire name of the scheme.
    pub const NAME: &'static str = "exact";
}

impl fmt::Display for ExactScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::NAME)
    }
}

/// Returned when parsing a scheme name other than `"exact"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported scheme {0:?}")]
pub struct UnsupportedSchemeError(pub String);

impl FromStr for ExactScheme {
    type Err = UnsupportedSchemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::NAME {
            Ok(Self)
        } else {
            Err(UnsupportedSchemeError(s.to_owned()))
        }
    }
}

impl Serialize for ExactScheme {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(Self::NAME)
    }
}

impl<'de> Deserialize<'de> for ExactScheme {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Produces signed proofs for challenges it understands.
pub trait SchemeClient: Send + Sync {
    /// Whether this client can pay the given requirement.
    fn accepts(&self, requirements: &PaymentRequirements) -> bool;

    /// Signs an authorization satisfying `requirements`.
    fn create_payment<'a>(
        &'a self,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<PaymentPayload, ClientError>>;
}

/// Terminal failures while producing a proof.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The challenge offered nothing this client can pay.
    #[error("No matching payment option found")]
    NoMatchingPaymentOption,
    /// No signing account is available.
    #[error("No wallet account connected")]
    NoSigner,
    /// The challenge names a network this client does not know.
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),
    /// The wallet could not be moved to the required network.
    #[error("Failed to switch network: {0}")]
    NetworkSwitch(String),
    /// The wallet refused or failed to sign.
    #[error("Failed to sign payment: {0}")]
    SigningRejected(String),
    /// The challenge carried values that could not be interpreted.
    #[error("Invalid payment requirements: {0}")]
    InvalidRequirements(String),
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_scheme_round_trips_by_name() {
        assert_eq!(serde_json::to_string(&ExactScheme).unwrap(), "\"exact\"");
        assert!(serde_json::from_str::<ExactScheme>("\"exact\"").is_ok());
        assert!(serde_json::from_str::<ExactScheme>("\"upto\"").is_err());
        assert!("EXACT".parse::<ExactScheme>().is_err());
    }
}
