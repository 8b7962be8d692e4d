//! EIP-712 hashing and ECDSA recovery for EIP-3009 authorizations.

use alloy_primitives::{Address, B256, Signature, U256};
use alloy_sol_types::{Eip712Domain, SolStruct, eip712_domain};
use chat402::proto::PaymentVerificationError;

use crate::exact::types::{Eip3009Authorization, PaymentRequirementsExtra, TransferWithAuthorization, VrsSignature};

/// Half the secp256k1 group order. Signatures with `s` above this are the
/// malleable twin of a canonical signature and are refused (EIP-2).
pub const SECP256K1_N_DIV_2: U256 = U256::from_limbs([
    0xDFE9_2F46_681B_20A0,
    0x5D57_6E73_57A4_501D,
    0xFFFF_FFFF_FFFF_FFFF,
    0x7FFF_FFFF_FFFF_FFFF,
]);

/// The token contract's EIP-712 domain.
#[must_use]
pub fn domain(extra: &PaymentRequirementsExtra, chain_id: u64, asset: Address) -> Eip712Domain {
    eip712_domain! {
        name: extra.name.clone(),
        version: extra.version.clone(),
        chain_id: chain_id,
        verifying_contract: asset,
    }
}

/// The digest the payer signs.
#[must_use]
pub fn signing_hash(authorization: &Eip3009Authorization, domain: &Eip712Domain) -> B256 {
    TransferWithAuthorization::from(authorization).eip712_signing_hash(domain)
}

/// Recovers the address that produced `signature` over `hash`.
///
/// # Errors
///
/// Returns [`PaymentVerificationError::InvalidSignature`] when `v` is not a
/// valid recovery id, `r` or `s` is zero, `s` is in the upper half of the
/// curve order, or recovery fails.
pub fn recover_signer(hash: &B256, signature: &VrsSignature) -> Result<Address, PaymentVerificationError> {
    let parity = match signature.v {
        0 | 27 => false,
        1 | 28 => true,
        other => {
            return Err(PaymentVerificationError::InvalidSignature(format!(
                "invalid recovery id {other}"
            )));
        }
    };
    let r = U256::from_be_bytes(signature.r.0);
    let s = U256::from_be_bytes(signature.s.0);
    if r.is_zero() || s.is_zero() {
        return Err(PaymentVerificationError::InvalidSignature(
            "zero signature component".to_owned(),
        ));
    }
    if s > SECP256K1_N_DIV_2 {
        return Err(PaymentVerificationError::InvalidSignature(
            "non-canonical s value".to_owned(),
        ));
    }
    Signature::new(r, s, parity)
        .recover_address_from_prehash(hash)
        .map_err(|e| PaymentVerificationError::InvalidSignature(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use chat402::timestamp::UnixTimestamp;

    fn authorization(from: Address) -> Eip3009Authorization {
        Eip3009Authorization {
            from,
            to: address!("0x209693Bc6afc0C5328bA36FaF03C514EF312287C"),
            value: U256::from(507u64),
            valid_after: UnixTimestamp::from_secs(1_700_000_000),
            valid_before: UnixTimestamp::from_secs(1_700_000_300),
            nonce: B256::repeat_byte(7),
        }
    }

    fn test_domain() -> Eip712Domain {
        domain(
            &PaymentRequirementsExtra {
                name: "TestUSDC".into(),
                version: "1".into(),
            },
            421_614,
            address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
        )
    }

    #[test]
    fn recovers_the_signer() {
        let signer = PrivateKeySigner::random();
        let hash = signing_hash(&authorization(signer.address()), &test_domain());
        let signature = VrsSignature::from(signer.sign_hash_sync(&hash).unwrap());
        assert!(signature.v == 27 || signature.v == 28);
        assert_eq!(recover_signer(&hash, &signature).unwrap(), signer.address());
    }

    #[test]
    fn zero_one_recovery_ids_are_accepted() {
        let signer = PrivateKeySigner::random();
        let hash = signing_hash(&authorization(signer.address()), &test_domain());
        let mut signature = VrsSignature::from(signer.sign_hash_sync(&hash).unwrap());
        signature.v -= 27;
        assert_eq!(recover_signer(&hash, &signature).unwrap(), signer.address());
    }

    #[test]
    fn domain_binds_chain_and_contract() {
        let auth = authorization(Address::ZERO);
        let base = signing_hash(&auth, &test_domain());
        let extra = PaymentRequirementsExtra {
            name: "TestUSDC".into(),
            version: "1".into(),
        };
        let other_chain = domain(&extra, 42161, address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"));
        let other_asset = domain(&extra, 421_614, Address::ZERO);
        assert_ne!(base, signing_hash(&auth, &other_chain));
        assert_ne!(base, signing_hash(&auth, &other_asset));
    }

    #[test]
    fn rejects_bad_recovery_id() {
        let signature = VrsSignature {
            v: 29,
            r: B256::repeat_byte(1),
            s: B256::repeat_byte(1),
        };
        assert!(matches!(
            recover_signer(&B256::ZERO, &signature),
            Err(PaymentVerificationError::InvalidSignature(_))
        ));
    }

    #[test]
    fn rejects_high_s() {
        let signer = PrivateKeySigner::random();
        let hash = signing_hash(&authorization(signer.address()), &test_domain());
        let sig = signer.sign_hash_sync(&hash).unwrap();
        // The malleable twin (n - s, flipped parity) recovers the same key on
        // a permissive verifier; it must be refused here.
        let n = SECP256K1_N_DIV_2 * U256::from(2u64) + U256::from(1u64);
        let twin = VrsSignature {
            v: 27 + u8::from(!sig.v()),
            r: B256::from(sig.r()),
            s: B256::from(n - sig.s()),
        };
        assert!(matches!(
            recover_signer(&hash, &twin),
            Err(PaymentVerificationError::InvalidSignature(_))
        ));
    }
}
