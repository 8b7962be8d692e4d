//! Verification of `exact` EVM proofs.
//!
//! [`verify_exact_payment`] is a pure function of the proof, the requirement
//! issued for the current request and the clock. It never touches the chain;
//! replay protection is the token contract's job at settlement time.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. scheme is `exact` and the network is the configured one
//! 2. authorized value covers the quoted amount
//! 3. recipient is the configured payee
//! 4. the signature recovers to `from` under the asset's EIP-712 domain
//! 5. `validAfter <= now <= validBefore`, with a non-empty window

use alloy_primitives::{Address, U256};
use chat402::facilitator::VerifiedPayment;
use chat402::proto::PaymentVerificationError;
use chat402::proto::v1::PaymentPayload;
use chat402::scheme::ExactScheme;
use chat402::timestamp::UnixTimestamp;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use super::signature;
use crate::exact::types::{self, Eip3009Authorization, ExactEvmPayload, VrsSignature};

/// A proof that passed every check, ready to be settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedAuthorization {
    /// The signed authorization.
    pub authorization: Eip3009Authorization,
    /// The payer's signature.
    pub signature: VrsSignature,
    /// Token contract the authorization is bound to.
    pub asset: Address,
}

impl VerifiedAuthorization {
    /// Chain-agnostic summary for the HTTP layer.
    #[must_use]
    pub fn summary(&self) -> VerifiedPayment {
        VerifiedPayment {
            payer: self.authorization.from.to_string(),
            amount: self.authorization.value.to_string(),
            asset: self.asset.to_string(),
            nonce: self.authorization.nonce.to_string(),
        }
    }
}

/// Parses server-issued requirements into their typed form.
///
/// # Errors
///
/// Returns [`PaymentVerificationError::InvalidRequirements`] if the scheme,
/// amount, addresses or EIP-712 domain cannot be parsed.
pub fn typed_requirements(
    requirements: &chat402::proto::v1::PaymentRequirements,
) -> Result<types::v1::PaymentRequirements, PaymentVerificationError> {
    requirements
        .as_concrete()
        .ok_or_else(|| {
            PaymentVerificationError::InvalidRequirements(format!(
                "cannot interpret requirement for {} on {}",
                requirements.asset, requirements.network
            ))
        })
}

/// Verifies a proof against the current requirement.
///
/// # Errors
///
/// Returns the [`PaymentVerificationError`] of the first check that fails.
#[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(network = %payload.network)))]
pub fn verify_exact_payment(
    payload: &PaymentPayload,
    requirements: &types::v1::PaymentRequirements,
    chain_id: u64,
    now: UnixTimestamp,
) -> Result<VerifiedAuthorization, PaymentVerificationError> {
    if payload.scheme.parse::<ExactScheme>().is_err() {
        return Err(PaymentVerificationError::UnsupportedScheme(payload.scheme.clone()));
    }
    if payload.network != requirements.network {
        return Err(PaymentVerificationError::ChainIdMismatch(payload.network.clone()));
    }
    let ExactEvmPayload {
        authorization,
        signature,
    } = serde_json::from_value(payload.payload.clone())?;

    assert_enough_value(&authorization.value, &requirements.max_amount_required)?;
    assert_recipient(&authorization.to, &requirements.pay_to)?;

    let extra = requirements.extra.as_ref().ok_or_else(|| {
        PaymentVerificationError::InvalidRequirements("missing EIP-712 domain".to_owned())
    })?;
    let domain = signature::domain(extra, chain_id, requirements.asset);
    let digest = signature::signing_hash(&authorization, &domain);
    let signer = signature::recover_signer(&digest, &signature)?;
    if signer != authorization.from {
        return Err(PaymentVerificationError::InvalidSignature(format!(
            "recovered {signer}, expected {}",
            authorization.from
        )));
    }

    assert_time(authorization.valid_after, authorization.valid_before, now)?;

    Ok(VerifiedAuthorization {
        authorization,
        signature,
        asset: requirements.asset,
    })
}

/// Checks that the authorized value covers the quoted amount.
///
/// # Errors
///
/// Returns [`PaymentVerificationError::InsufficientAmount`] if `sent < required`.
pub fn assert_enough_value(sent: &U256, required: &U256) -> Result<(), PaymentVerificationError> {
    if sent < required {
        Err(PaymentVerificationError::InsufficientAmount {
            required: required.to_string(),
            provided: sent.to_string(),
        })
    } else {
        Ok(())
    }
}

/// Checks that the authorization pays the configured payee.
///
/// # Errors
///
/// Returns [`PaymentVerificationError::RecipientMismatch`] on any other address.
pub fn assert_recipient(to: &Address, pay_to: &Address) -> Result<(), PaymentVerificationError> {
    if to == pay_to {
        Ok(())
    } else {
        Err(PaymentVerificationError::RecipientMismatch)
    }
}

/// Checks the authorization window against `now`, both bounds inclusive.
///
/// # Errors
///
/// Returns [`PaymentVerificationError::InvalidTimeWindow`] for an empty window,
/// [`PaymentVerificationError::Early`] or [`PaymentVerificationError::Expired`]
/// when `now` falls outside it.
pub fn assert_time(
    valid_after: UnixTimestamp,
    valid_before: UnixTimestamp,
    now: UnixTimestamp,
) -> Result<(), PaymentVerificationError> {
    if valid_after >= valid_before {
        return Err(PaymentVerificationError::InvalidTimeWindow);
    }
    if now < valid_after {
        return Err(PaymentVerificationError::Early);
    }
    if now > valid_before {
        return Err(PaymentVerificationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, address};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use chat402::proto::ErrorReason;
    use chat402::proto::v1::V1;

    use crate::exact::PaymentRequirementsExtra;

    const CHAIN_ID: u64 = 421_614;
    const NOW: u64 = 1_700_000_100;
    const PAY_TO: Address = address!("0x209693Bc6afc0C5328bA36FaF03C514EF312287C");
    const ASSET: Address = address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e");

    fn requirements(amount: u64) -> types::v1::PaymentRequirements {
        types::v1::PaymentRequirements {
            scheme: ExactScheme,
            network: "arbitrum-sepolia".into(),
            max_amount_required: U256::from(amount),
            resource: "/chat".into(),
            description: String::new(),
            mime_type: "application/json".into(),
            output_schema: None,
            pay_to: PAY_TO,
            max_timeout_seconds: 300,
            asset: ASSET,
            extra: Some(PaymentRequirementsExtra {
                name: "TestUSDC".into(),
                version: "1".into(),
            }),
        }
    }

    fn authorization(signer: &PrivateKeySigner) -> Eip3009Authorization {
        Eip3009Authorization {
            from: signer.address(),
            to: PAY_TO,
            value: U256::from(507u64),
            valid_after: UnixTimestamp::from_secs(NOW - 60),
            valid_before: UnixTimestamp::from_secs(NOW + 300),
            nonce: B256::repeat_byte(0xab),
        }
    }

    fn sign(signer: &PrivateKeySigner, authorization: Eip3009Authorization) -> PaymentPayload {
        let extra = requirements(0).extra.unwrap();
        let digest = signature::signing_hash(
            &authorization,
            &signature::domain(&extra, CHAIN_ID, ASSET),
        );
        let signature = VrsSignature::from(signer.sign_hash_sync(&digest).unwrap());
        proof(ExactEvmPayload {
            authorization,
            signature,
        })
    }

    fn proof(payload: ExactEvmPayload) -> PaymentPayload {
        PaymentPayload {
            x402_version: V1,
            scheme: "exact".into(),
            network: "arbitrum-sepolia".into(),
            payload: serde_json::to_value(payload).unwrap(),
        }
    }

    fn verify(payload: &PaymentPayload, amount: u64) -> Result<VerifiedAuthorization, PaymentVerificationError> {
        verify_exact_payment(payload, &requirements(amount), CHAIN_ID, UnixTimestamp::from_secs(NOW))
    }

    fn reason(result: Result<VerifiedAuthorization, PaymentVerificationError>) -> ErrorReason {
        result.unwrap_err().reason()
    }

    #[test]
    fn accepts_a_valid_proof() {
        let signer = PrivateKeySigner::random();
        let verified = verify(&sign(&signer, authorization(&signer)), 507).unwrap();
        assert_eq!(verified.authorization.from, signer.address());
        assert_eq!(verified.asset, ASSET);
        assert_eq!(verified.summary().amount, "507");
    }

    #[test]
    fn exact_amount_boundary() {
        let signer = PrivateKeySigner::random();
        let mut auth = authorization(&signer);
        assert!(verify(&sign(&signer, auth), 507).is_ok());
        auth.value = U256::from(506u64);
        assert_eq!(
            reason(verify(&sign(&signer, auth), 507)),
            ErrorReason::InvalidPaymentAmount
        );
    }

    #[test]
    fn overpayment_is_accepted() {
        let signer = PrivateKeySigner::random();
        let mut auth = authorization(&signer);
        auth.value = U256::from(10_000u64);
        assert!(verify(&sign(&signer, auth), 507).is_ok());
    }

    #[test]
    fn wrong_scheme_or_network_is_checked_first() {
        let signer = PrivateKeySigner::random();
        let mut payload = sign(&signer, authorization(&signer));
        payload.payload = serde_json::json!({});
        payload.scheme = "upto".into();
        assert_eq!(reason(verify(&payload, 507)), ErrorReason::UnsupportedScheme);
        payload.scheme = "exact".into();
        payload.network = "base".into();
        assert_eq!(reason(verify(&payload, 507)), ErrorReason::ChainIdMismatch);
    }

    #[test]
    fn malformed_payload_is_invalid_format() {
        let signer = PrivateKeySigner::random();
        let mut payload = sign(&signer, authorization(&signer));
        payload.payload["nonce"] = serde_json::json!("0x1234");
        assert_eq!(reason(verify(&payload, 507)), ErrorReason::InvalidFormat);
    }

    #[test]
    fn recipient_mismatch() {
        let signer = PrivateKeySigner::random();
        let mut auth = authorization(&signer);
        auth.to = Address::repeat_byte(9);
        assert_eq!(
            reason(verify(&sign(&signer, auth), 507)),
            ErrorReason::RecipientMismatch
        );
    }

    #[test]
    fn tampering_after_signing_breaks_the_signature() {
        let signer = PrivateKeySigner::random();
        let payload = sign(&signer, authorization(&signer));

        let mut raised = payload.clone();
        raised.payload["value"] = serde_json::json!("600");
        assert_eq!(reason(verify(&raised, 507)), ErrorReason::InvalidSignature);

        let mut shifted = payload.clone();
        shifted.payload["validBefore"] = serde_json::json!(NOW + 301);
        assert_eq!(reason(verify(&shifted, 507)), ErrorReason::InvalidSignature);

        let mut early = payload.clone();
        early.payload["validAfter"] = serde_json::json!(NOW - 61);
        assert_eq!(reason(verify(&early, 507)), ErrorReason::InvalidSignature);

        let mut flipped = payload;
        let mut r = serde_json::from_value::<B256>(flipped.payload["r"].clone()).unwrap();
        r.0[31] ^= 1;
        flipped.payload["r"] = serde_json::to_value(r).unwrap();
        assert_eq!(reason(verify(&flipped, 507)), ErrorReason::InvalidSignature);
    }

    #[test]
    fn signature_from_someone_else_is_rejected() {
        let payer = PrivateKeySigner::random();
        let impostor = PrivateKeySigner::random();
        let payload = sign(&impostor, authorization(&payer));
        assert_eq!(reason(verify(&payload, 507)), ErrorReason::InvalidSignature);
    }

    #[test]
    fn wrong_chain_id_breaks_the_signature() {
        let signer = PrivateKeySigner::random();
        let payload = sign(&signer, authorization(&signer));
        let result = verify_exact_payment(
            &payload,
            &requirements(507),
            42161,
            UnixTimestamp::from_secs(NOW),
        );
        assert_eq!(reason(result), ErrorReason::InvalidSignature);
    }

    #[test]
    fn time_window_edges() {
        let signer = PrivateKeySigner::random();
        let payload = sign(&signer, authorization(&signer));
        let at = |secs| {
            verify_exact_payment(&payload, &requirements(507), CHAIN_ID, UnixTimestamp::from_secs(secs))
        };
        assert!(at(NOW - 60).is_ok());
        assert!(at(NOW + 300).is_ok());
        assert_eq!(reason(at(NOW - 61)), ErrorReason::InvalidPaymentEarly);
        assert_eq!(reason(at(NOW + 301)), ErrorReason::InvalidPaymentExpired);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let signer = PrivateKeySigner::random();
        let mut auth = authorization(&signer);
        auth.valid_after = UnixTimestamp::from_secs(NOW + 10);
        auth.valid_before = UnixTimestamp::from_secs(NOW + 10);
        assert_eq!(
            reason(verify(&sign(&signer, auth), 507)),
            ErrorReason::InvalidTimeWindow
        );
    }

    #[test]
    fn missing_domain_is_a_server_fault() {
        let signer = PrivateKeySigner::random();
        let payload = sign(&signer, authorization(&signer));
        let mut req = requirements(507);
        req.extra = None;
        let err = verify_exact_payment(&payload, &req, CHAIN_ID, UnixTimestamp::from_secs(NOW))
            .unwrap_err();
        assert!(err.is_server_fault());
    }

    #[test]
    fn typed_requirements_parse_challenge_strings() {
        let raw = chat402::proto::v1::PaymentRequirements {
            scheme: "exact".into(),
            network: "arbitrum-sepolia".into(),
            max_amount_required: "507".into(),
            resource: "/chat".into(),
            description: String::new(),
            mime_type: "application/json".into(),
            output_schema: None,
            pay_to: PAY_TO.to_string().to_lowercase(),
            max_timeout_seconds: 300,
            asset: ASSET.to_string(),
            extra: Some(serde_json::json!({"name": "TestUSDC", "version": "1"})),
        };
        assert_eq!(typed_requirements(&raw).unwrap(), requirements(507));
        let mut broken = raw;
        broken.pay_to = "nobody".into();
        assert!(typed_requirements(&broken).unwrap_err().is_server_fault());
    }
}
