//! Wire types for the EIP-155 `exact` scheme.
//!
//! The proof payload is the EIP-3009 authorization with the signature split
//! into `v`, `r` and `s` alongside it:
//!
//! ```json
//! {
//!   "from": "0x…", "to": "0x…", "value": "507",
//!   "validAfter": 1700000000, "validBefore": 1700000300,
//!   "nonce": "0x…32 bytes…",
//!   "v": 27, "r": "0x…", "s": "0x…"
//! }
//! ```
//!
//! Typed aliases of the x402 v1 envelopes live in [`v1`].

use alloy_primitives::{Address, B256, Signature, U256};
use alloy_sol_types::sol;
pub use chat402::challenge::AssetDomain as PaymentRequirementsExtra;
pub use chat402::scheme::ExactScheme;
use chat402::timestamp::UnixTimestamp;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

/// The EIP-3009 `TransferWithAuthorization` message.
#[serde_as]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    /// The token owner authorizing the transfer.
    pub from: Address,
    /// The recipient of the transfer.
    pub to: Address,
    /// Amount in atomic units, as a decimal string on the wire.
    #[serde_as(as = "DisplayFromStr")]
    pub value: U256,
    /// Not valid before this time.
    pub valid_after: UnixTimestamp,
    /// Not valid after this time.
    pub valid_before: UnixTimestamp,
    /// Unique 32-byte nonce; single use per signer and token contract.
    pub nonce: B256,
}

/// An ECDSA signature as the `(v, r, s)` triple `transferWithAuthorization` takes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrsSignature {
    /// Recovery id, `27`/`28` (`0`/`1` accepted on input).
    pub v: u8,
    /// `r` component.
    pub r: B256,
    /// `s` component.
    pub s: B256,
}

impl From<Signature> for VrsSignature {
    fn from(signature: Signature) -> Self {
        Self {
            v: 27 + u8::from(signature.v()),
            r: B256::from(signature.r()),
            s: B256::from(signature.s()),
        }
    }
}

/// The `payload` of an `exact` EVM proof.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactEvmPayload {
    /// The signed authorization.
    #[serde(flatten)]
    pub authorization: Eip3009Authorization,
    /// Signature over the authorization's EIP-712 digest.
    #[serde(flatten)]
    pub signature: VrsSignature,
}

sol!(
    /// EIP-712 struct signed by the payer.
    ///
    /// Field order and types must match the token contract's
    /// `TRANSFER_WITH_AUTHORIZATION_TYPEHASH`.
    #[derive(Serialize, Deserialize)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

impl From<&Eip3009Authorization> for TransferWithAuthorization {
    fn from(authorization: &Eip3009Authorization) -> Self {
        Self {
            from: authorization.from,
            to: authorization.to,
            value: authorization.value,
            validAfter: U256::from(authorization.valid_after.as_secs()),
            validBefore: U256::from(authorization.valid_before.as_secs()),
            nonce: authorization.nonce,
        }
    }
}

/// Typed x402 v1 envelopes for the EVM `exact` scheme.
pub mod v1 {
    use super::{Address, ExactEvmPayload, ExactScheme, PaymentRequirementsExtra, U256};

    /// A proof whose payload has been parsed.
    pub type PaymentPayload = chat402::proto::v1::PaymentPayload<ExactScheme, ExactEvmPayload>;

    /// Requirements with amounts and addresses parsed.
    pub type PaymentRequirements = chat402::proto::v1::PaymentRequirements<
        ExactScheme,
        U256,
        Address,
        PaymentRequirementsExtra,
    >;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256};

    fn payload() -> ExactEvmPayload {
        ExactEvmPayload {
            authorization: Eip3009Authorization {
                from: address!("0x857b06519E91e3A54538791bDbb0E22373e36b66"),
                to: address!("0x209693Bc6afc0C5328bA36FaF03C514EF312287C"),
                value: U256::from(507u64),
                valid_after: UnixTimestamp::from_secs(1_700_000_000),
                valid_before: UnixTimestamp::from_secs(1_700_000_300),
                nonce: b256!("0xf3746613c2d920b5fdabc0856f2aeb2d4f88ee6037b8cc5d04a71a4462f13480"),
            },
            signature: VrsSignature {
                v: 28,
                r: B256::repeat_byte(0x11),
                s: B256::repeat_byte(0x22),
            },
        }
    }

    #[test]
    fn payload_is_flat_on_the_wire() {
        let json = serde_json::to_value(payload()).unwrap();
        assert_eq!(json["value"], "507");
        assert_eq!(json["validAfter"], 1_700_000_000u64);
        assert_eq!(json["validBefore"], 1_700_000_300u64);
        assert_eq!(json["v"], 28);
        assert!(json.get("authorization").is_none());
        let back: ExactEvmPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload());
    }

    #[test]
    fn lowercase_addresses_and_string_timestamps_decode() {
        let json = serde_json::json!({
            "from": "0x857b06519e91e3a54538791bdbb0e22373e36b66",
            "to": "0x209693bc6afc0c5328ba36faf03c514ef312287c",
            "value": "507",
            "validAfter": "1700000000",
            "validBefore": "1700000300",
            "nonce": "0xf3746613c2d920b5fdabc0856f2aeb2d4f88ee6037b8cc5d04a71a4462f13480",
            "v": 28,
            "r": format!("{}", B256::repeat_byte(0x11)),
            "s": format!("{}", B256::repeat_byte(0x22)),
        });
        let decoded: ExactEvmPayload = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, payload());
    }

    #[test]
    fn missing_signature_field_fails() {
        let mut json = serde_json::to_value(payload()).unwrap();
        json.as_object_mut().unwrap().remove("s");
        assert!(serde_json::from_value::<ExactEvmPayload>(json).is_err());
    }

    #[test]
    fn float_value_fails() {
        let mut json = serde_json::to_value(payload()).unwrap();
        json["value"] = serde_json::json!(507.5);
        assert!(serde_json::from_value::<ExactEvmPayload>(json).is_err());
    }
}
