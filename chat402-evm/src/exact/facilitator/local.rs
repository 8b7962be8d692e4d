//! In-process facilitator for the EVM `exact` scheme.
//!
//! Implements [`Facilitator`] by running the pure verifier and, when a
//! [`SettlementExecutor`] is attached, submitting the authorization on-chain
//! under a deadline of `maxTimeoutSeconds`.

use std::sync::Arc;
use std::time::Duration;

use chat402::facilitator::{BoxFuture, Facilitator, VerifiedPayment};
use chat402::proto::v1::{PaymentPayload, PaymentRequirements};
use chat402::proto::{PaymentVerificationError, SettlementResult};
use chat402::timestamp::UnixTimestamp;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use super::settle::SettlementExecutor;
use super::verify::{VerifiedAuthorization, typed_requirements, verify_exact_payment};
use crate::networks::NetworkInfo;

/// Verifies `exact` proofs for one network and optionally settles them.
#[derive(Clone)]
pub struct ExactEvmFacilitator {
    network: NetworkInfo,
    settler: Option<Arc<dyn SettlementExecutor>>,
}

impl std::fmt::Debug for ExactEvmFacilitator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactEvmFacilitator")
            .field("network", &self.network.name)
            .field("chain_id", &self.network.chain_id)
            .field("settles", &self.settler.is_some())
            .finish()
    }
}

impl ExactEvmFacilitator {
    /// A facilitator that only verifies; verified proofs authorize service.
    #[must_use]
    pub const fn verification_only(network: NetworkInfo) -> Self {
        Self {
            network,
            settler: None,
        }
    }

    /// A facilitator that settles every verified proof through `settler`.
    #[must_use]
    pub fn with_settlement(network: NetworkInfo, settler: Arc<dyn SettlementExecutor>) -> Self {
        Self {
            network,
            settler: Some(settler),
        }
    }

    /// The network this facilitator serves.
    #[must_use]
    pub const fn network(&self) -> &NetworkInfo {
        &self.network
    }

    fn verify_now(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifiedAuthorization, PaymentVerificationError> {
        let typed = typed_requirements(requirements)?;
        verify_exact_payment(payload, &typed, self.network.chain_id, UnixTimestamp::now())
    }

    #[cfg_attr(feature = "telemetry", instrument(skip_all, fields(nonce = %verified.authorization.nonce)))]
    async fn settle_verified(
        &self,
        settler: &dyn SettlementExecutor,
        verified: &VerifiedAuthorization,
        timeout_secs: u64,
    ) -> SettlementResult {
        match tokio::time::timeout(Duration::from_secs(timeout_secs), settler.execute(verified)).await {
            Ok(Ok(receipt)) => SettlementResult::confirmed(
                receipt.transaction_hash.to_string(),
                receipt.block_number,
                receipt.gas_used.to_string(),
            ),
            Ok(Err(e)) => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(error = %e, "settlement failed");
                SettlementResult::failed(e.settlement_reason())
            }
            Err(_) => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(timeout_secs, "settlement timed out");
                SettlementResult::failed(format!("settlement timed out after {timeout_secs}s"))
            }
        }
    }
}

impl Facilitator for ExactEvmFacilitator {
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifiedPayment, PaymentVerificationError>> {
        Box::pin(async move {
            self.verify_now(payload, requirements)
                .map(|verified| verified.summary())
        })
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, SettlementResult> {
        Box::pin(async move {
            let Some(settler) = self.settler.as_deref() else {
                return SettlementResult::failed("settlement is disabled");
            };
            match self.verify_now(payload, requirements) {
                Ok(verified) => {
                    self.settle_verified(settler, &verified, requirements.max_timeout_seconds)
                        .await
                }
                Err(e) => SettlementResult::failed(e.to_string()),
            }
        })
    }

    fn settles(&self) -> bool {
        self.settler.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, TxHash, U256, address};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use async_trait::async_trait;
    use chat402::proto::v1::V1;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use crate::exact::facilitator::{Eip155ExactError, SettlementReceipt, signature};
    use crate::exact::{Eip3009Authorization, ExactEvmPayload, PaymentRequirementsExtra, VrsSignature};
    use crate::networks::network_by_name;

    const PAY_TO: Address = address!("0x209693Bc6afc0C5328bA36FaF03C514EF312287C");
    const ASSET: Address = address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e");

    #[derive(Default)]
    struct FakeChain {
        used: Mutex<HashSet<(Address, B256)>>,
    }

    #[async_trait]
    impl SettlementExecutor for FakeChain {
        async fn execute(
            &self,
            verified: &VerifiedAuthorization,
        ) -> Result<SettlementReceipt, Eip155ExactError> {
            let key = (verified.authorization.from, verified.authorization.nonce);
            if !self.used.lock().unwrap().insert(key) {
                return Err(PaymentVerificationError::NonceAlreadyUsed.into());
            }
            Ok(SettlementReceipt {
                transaction_hash: TxHash::repeat_byte(0x42),
                block_number: Some(7),
                gas_used: 51_234,
            })
        }
    }

    struct StuckChain;

    #[async_trait]
    impl SettlementExecutor for StuckChain {
        async fn execute(
            &self,
            _verified: &VerifiedAuthorization,
        ) -> Result<SettlementReceipt, Eip155ExactError> {
            std::future::pending().await
        }
    }

    fn requirements(timeout: u64) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "arbitrum-sepolia".into(),
            max_amount_required: "507".into(),
            resource: "/chat".into(),
            description: String::new(),
            mime_type: "application/json".into(),
            output_schema: None,
            pay_to: PAY_TO.to_string(),
            max_timeout_seconds: timeout,
            asset: ASSET.to_string(),
            extra: Some(serde_json::json!({"name": "TestUSDC", "version": "1"})),
        }
    }

    fn proof(signer: &PrivateKeySigner) -> PaymentPayload {
        let now = UnixTimestamp::now();
        let authorization = Eip3009Authorization {
            from: signer.address(),
            to: PAY_TO,
            value: U256::from(507u64),
            valid_after: now - 60,
            valid_before: now + 300,
            nonce: B256::repeat_byte(0x5a),
        };
        let extra = PaymentRequirementsExtra {
            name: "TestUSDC".into(),
            version: "1".into(),
        };
        let digest = signature::signing_hash(
            &authorization,
            &signature::domain(&extra, 421_614, ASSET),
        );
        let signature = VrsSignature::from(signer.sign_hash_sync(&digest).unwrap());
        PaymentPayload {
            x402_version: V1,
            scheme: "exact".into(),
            network: "arbitrum-sepolia".into(),
            payload: serde_json::to_value(ExactEvmPayload {
                authorization,
                signature,
            })
            .unwrap(),
        }
    }

    fn network() -> NetworkInfo {
        *network_by_name("arbitrum-sepolia").unwrap()
    }

    #[tokio::test]
    async fn verification_only_accepts_replays() {
        let facilitator = ExactEvmFacilitator::verification_only(network());
        let signer = PrivateKeySigner::random();
        let payload = proof(&signer);
        let req = requirements(300);
        assert!(!facilitator.settles());
        assert!(facilitator.verify(&payload, &req).await.is_ok());
        assert!(facilitator.verify(&payload, &req).await.is_ok());
    }

    #[tokio::test]
    async fn settlement_rejects_a_reused_nonce() {
        let facilitator =
            ExactEvmFacilitator::with_settlement(network(), Arc::new(FakeChain::default()));
        let signer = PrivateKeySigner::random();
        let payload = proof(&signer);
        let req = requirements(300);

        let first = facilitator.settle(&payload, &req).await;
        assert!(first.success);
        assert_eq!(first.block_number, Some(7));
        assert_eq!(first.gas_used.as_deref(), Some("51234"));

        let second = facilitator.settle(&payload, &req).await;
        assert!(!second.success);
        assert_eq!(second.error.as_deref(), Some("authorization nonce already used"));
    }

    #[tokio::test(start_paused = true)]
    async fn settlement_times_out() {
        let facilitator = ExactEvmFacilitator::with_settlement(network(), Arc::new(StuckChain));
        let signer = PrivateKeySigner::random();
        let result = facilitator.settle(&proof(&signer), &requirements(5)).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("settlement timed out after 5s"));
    }

    #[tokio::test]
    async fn settle_without_settler_fails_closed() {
        let facilitator = ExactEvmFacilitator::verification_only(network());
        let signer = PrivateKeySigner::random();
        let result = facilitator.settle(&proof(&signer), &requirements(300)).await;
        assert!(!result.success);
    }
}
