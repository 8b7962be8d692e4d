//! On-chain settlement of verified authorizations.
//!
//! [`Eip3009Settler`] submits `transferWithAuthorization(from, to, value,
//! validAfter, validBefore, nonce, v, r, s)` to the token contract from the
//! payee's wallet and waits for the receipt.

use alloy_network::{EthereumWallet, ReceiptResponse};
use alloy_primitives::{TxHash, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use chat402::proto::PaymentVerificationError;
use std::future::IntoFuture;
#[cfg(feature = "telemetry")]
use tracing::Level;
use url::Url;

use super::contract::IEIP3009;
use super::error::Eip155ExactError;
use super::verify::VerifiedAuthorization;

/// Awaits a future, optionally instrumenting it with a tracing span.
macro_rules! traced {
    ($fut:expr, $span:expr) => {{
        #[cfg(feature = "telemetry")]
        {
            use tracing::Instrument;
            $fut.instrument($span).await
        }
        #[cfg(not(feature = "telemetry"))]
        {
            $fut.await
        }
    }};
}

/// A settlement that made it into a block with receipt status 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementReceipt {
    /// Settlement transaction hash.
    pub transaction_hash: TxHash,
    /// Block the transaction was included in.
    pub block_number: Option<u64>,
    /// Gas used by the transaction.
    pub gas_used: u64,
}

/// Submits verified authorizations on-chain.
///
/// Implementations are shared across concurrent requests.
#[async_trait]
pub trait SettlementExecutor: Send + Sync {
    /// Executes the transfer described by `authorization`.
    ///
    /// # Errors
    ///
    /// Returns [`Eip155ExactError`] if the nonce is already consumed, the
    /// transaction cannot be sent, or it reverts.
    async fn execute(
        &self,
        authorization: &VerifiedAuthorization,
    ) -> Result<SettlementReceipt, Eip155ExactError>;
}

/// Settles through an alloy [`Provider`] with the payee's wallet attached.
#[derive(Debug, Clone)]
pub struct Eip3009Settler<P> {
    provider: P,
    confirmations: u64,
}

impl<P> Eip3009Settler<P> {
    /// Wraps a wallet-enabled provider; waits for one confirmation.
    pub const fn new(provider: P) -> Self {
        Self {
            provider,
            confirmations: 1,
        }
    }

    /// Sets how many confirmations to wait for before reporting success.
    #[must_use]
    pub const fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }
}

impl Eip3009Settler<DynProvider> {
    /// Connects to `rpc_url` over HTTP, signing with `signer`.
    #[must_use]
    pub fn connect(rpc_url: Url, signer: PrivateKeySigner) -> Self {
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(rpc_url)
            .erased();
        Self::new(provider)
    }
}

#[async_trait]
impl<P> SettlementExecutor for Eip3009Settler<P>
where
    P: Provider + Send + Sync,
{
    async fn execute(
        &self,
        verified: &VerifiedAuthorization,
    ) -> Result<SettlementReceipt, Eip155ExactError> {
        let authorization = &verified.authorization;
        let contract = IEIP3009::new(verified.asset, &self.provider);

        let state_call = contract.authorizationState(authorization.from, authorization.nonce);
        let used = traced!(
            state_call.call().into_future(),
            tracing::info_span!("authorization_state",
                from = %authorization.from,
                nonce = %authorization.nonce,
                otel.kind = "client",
            )
        )?;
        if used {
            return Err(PaymentVerificationError::NonceAlreadyUsed.into());
        }

        let call = contract.transferWithAuthorization(
            authorization.from,
            authorization.to,
            authorization.value,
            U256::from(authorization.valid_after.as_secs()),
            U256::from(authorization.valid_before.as_secs()),
            authorization.nonce,
            verified.signature.v,
            verified.signature.r,
            verified.signature.s,
        );
        let send_fut = call.send();
        let pending = traced!(
            send_fut,
            tracing::info_span!("call_transferWithAuthorization",
                from = %authorization.from,
                to = %authorization.to,
                value = %authorization.value,
                valid_after = %authorization.valid_after,
                valid_before = %authorization.valid_before,
                nonce = %authorization.nonce,
                token_contract = %verified.asset,
                otel.kind = "client",
            )
        )?;
        let receipt = pending
            .with_required_confirmations(self.confirmations)
            .get_receipt()
            .await?;

        let transaction_hash = receipt.transaction_hash();
        if receipt.status() {
            #[cfg(feature = "telemetry")]
            tracing::event!(Level::INFO,
                status = "ok",
                tx = %transaction_hash,
                block = ?receipt.block_number(),
                "transferWithAuthorization succeeded"
            );
            Ok(SettlementReceipt {
                transaction_hash,
                block_number: receipt.block_number(),
                gas_used: receipt.gas_used(),
            })
        } else {
            #[cfg(feature = "telemetry")]
            tracing::event!(
                Level::WARN,
                status = "failed",
                tx = %transaction_hash,
                "transferWithAuthorization reverted"
            );
            Err(Eip155ExactError::TransactionReverted(transaction_hash))
        }
    }
}
