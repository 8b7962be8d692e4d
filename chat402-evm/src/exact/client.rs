//! Client-side signing for the EVM `exact` scheme.
//!
//! [`Eip155ExactClient`] answers a challenge by moving the wallet to the
//! required network, drawing a fresh random nonce and signing an EIP-3009
//! authorization for exactly the quoted amount.
//!
//! Wallet access goes through [`PaymentWallet`] so a browser-style wallet
//! (which may be on the wrong chain, may not know the chain, or may refuse to
//! sign) and a local key behave the same way to the negotiator.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use alloy_primitives::{Address, B256, FixedBytes, Signature, U256};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use chat402::facilitator::BoxFuture;
use chat402::proto::v1::{self, PaymentPayload, PaymentRequirements};
use chat402::scheme::{ClientError, ExactScheme, SchemeClient};
use chat402::timestamp::UnixTimestamp;
use rand::RngExt;
use rand::rng;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use super::facilitator::signature;
use super::types::{self, Eip3009Authorization, ExactEvmPayload, PaymentRequirementsExtra, VrsSignature};
use crate::networks::{KNOWN_NETWORKS, NetworkInfo, network_by_name};

/// How far back `validAfter` is set, to absorb clock skew between client and server.
pub const VALID_AFTER_SKEW_SECS: u64 = 60;

/// Failures reported by a [`PaymentWallet`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// The wallet has no record of the chain and must be told about it first.
    #[error("chain {0} is not configured in the wallet")]
    UnknownChain(u64),
    /// The wallet refused to change networks.
    #[error("network switch rejected: {0}")]
    SwitchRejected(String),
    /// The wallet refused to sign.
    #[error("signature request rejected: {0}")]
    SigningRejected(String),
}

/// A signing account that lives on some chain.
#[async_trait]
pub trait PaymentWallet: Send + Sync {
    /// The connected account, if any.
    fn address(&self) -> Option<Address>;

    /// The chain the wallet is currently on.
    async fn chain_id(&self) -> Result<u64, WalletError>;

    /// Moves the wallet to `chain_id`.
    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError>;

    /// Registers a chain the wallet does not know yet.
    async fn add_chain(&self, network: &NetworkInfo) -> Result<(), WalletError>;

    /// Signs a 32-byte digest.
    async fn sign_hash(&self, hash: &B256) -> Result<Signature, WalletError>;
}

/// A [`PaymentWallet`] backed by a local private key.
#[derive(Debug)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
    active_chain: AtomicU64,
    known_chains: Mutex<HashSet<u64>>,
}

impl LocalWallet {
    /// A wallet that knows every network in [`KNOWN_NETWORKS`] and starts on the first.
    #[must_use]
    pub fn new(signer: PrivateKeySigner) -> Self {
        let active = KNOWN_NETWORKS.first().map_or(0, |n| n.chain_id);
        Self::with_chains(signer, active, KNOWN_NETWORKS.iter().map(|n| n.chain_id))
    }

    /// A wallet on `active_chain` that knows only `known_chains` (plus the active one).
    #[must_use]
    pub fn with_chains(
        signer: PrivateKeySigner,
        active_chain: u64,
        known_chains: impl IntoIterator<Item = u64>,
    ) -> Self {
        let mut known: HashSet<u64> = known_chains.into_iter().collect();
        known.insert(active_chain);
        Self {
            signer,
            active_chain: AtomicU64::new(active_chain),
            known_chains: Mutex::new(known),
        }
    }
}

#[async_trait]
impl PaymentWallet for LocalWallet {
    fn address(&self) -> Option<Address> {
        Some(self.signer.address())
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        Ok(self.active_chain.load(Ordering::Acquire))
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        let known = self
            .known_chains
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&chain_id);
        if !known {
            return Err(WalletError::UnknownChain(chain_id));
        }
        self.active_chain.store(chain_id, Ordering::Release);
        Ok(())
    }

    async fn add_chain(&self, network: &NetworkInfo) -> Result<(), WalletError> {
        self.known_chains
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(network.chain_id);
        Ok(())
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, WalletError> {
        alloy_signer::Signer::sign_hash(&self.signer, hash)
            .await
            .map_err(|e| WalletError::SigningRejected(e.to_string()))
    }
}

/// Puts `wallet` on `network`, adding the chain once if the wallet does not know it.
///
/// # Errors
///
/// Returns [`ClientError::NetworkSwitch`] if the wallet refuses to switch or
/// to add the chain.
#[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(chain_id = network.chain_id)))]
pub async fn ensure_network<W: PaymentWallet + ?Sized>(
    wallet: &W,
    network: &NetworkInfo,
) -> Result<(), ClientError> {
    let switch_error = |e: WalletError| ClientError::NetworkSwitch(format!("{}: {e}", network.display_name));
    let current = wallet.chain_id().await.map_err(switch_error)?;
    if current == network.chain_id {
        return Ok(());
    }
    #[cfg(feature = "telemetry")]
    tracing::info!(from = current, to = network.chain_id, "switching wallet network");
    match wallet.switch_chain(network.chain_id).await {
        Ok(()) => Ok(()),
        Err(WalletError::UnknownChain(_)) => {
            #[cfg(feature = "telemetry")]
            tracing::info!(network = network.name, "adding network to wallet");
            wallet.add_chain(network).await.map_err(switch_error)?;
            wallet.switch_chain(network.chain_id).await.map_err(switch_error)
        }
        Err(e) => Err(switch_error(e)),
    }
}

/// Parameters of an EIP-3009 authorization to sign.
#[derive(Debug, Clone)]
pub struct Eip3009SigningParams {
    /// The EIP-155 chain id.
    pub chain_id: u64,
    /// Token contract, the EIP-712 verifying contract.
    pub asset_address: Address,
    /// Recipient of the transfer.
    pub pay_to: Address,
    /// Amount to authorize.
    pub amount: U256,
    /// Length of the validity window from now.
    pub max_timeout_seconds: u64,
    /// EIP-712 domain name and version.
    pub extra: PaymentRequirementsExtra,
}

/// Signs an EIP-3009 `TransferWithAuthorization` with a fresh random nonce.
///
/// The window runs from [`VALID_AFTER_SKEW_SECS`] before `now` to
/// `max_timeout_seconds` after it.
///
/// # Errors
///
/// Returns [`ClientError::SigningRejected`] if the wallet does not sign.
pub async fn sign_erc3009_authorization<W: PaymentWallet + ?Sized>(
    wallet: &W,
    from: Address,
    params: &Eip3009SigningParams,
    now: UnixTimestamp,
) -> Result<ExactEvmPayload, ClientError> {
    let domain = signature::domain(&params.extra, params.chain_id, params.asset_address);
    let nonce: [u8; 32] = rng().random();
    let authorization = Eip3009Authorization {
        from,
        to: params.pay_to,
        value: params.amount,
        valid_after: now - VALID_AFTER_SKEW_SECS,
        valid_before: now + params.max_timeout_seconds,
        nonce: FixedBytes(nonce),
    };
    let digest = signature::signing_hash(&authorization, &domain);
    let signature = wallet
        .sign_hash(&digest)
        .await
        .map_err(|e| ClientError::SigningRejected(e.to_string()))?;
    Ok(ExactEvmPayload {
        authorization,
        signature: VrsSignature::from(signature),
    })
}

/// Pays `exact` challenges on known EVM networks.
#[derive(Debug)]
pub struct Eip155ExactClient<W> {
    wallet: W,
}

impl<W> Eip155ExactClient<W> {
    /// Creates a client that signs with `wallet`.
    pub const fn new(wallet: W) -> Self {
        Self { wallet }
    }

    /// The wallet this client signs with.
    pub const fn wallet(&self) -> &W {
        &self.wallet
    }
}

impl<W: PaymentWallet> Eip155ExactClient<W> {
    async fn sign_payment(&self, requirements: &PaymentRequirements) -> Result<PaymentPayload, ClientError> {
        let typed: types::v1::PaymentRequirements = requirements.as_concrete().ok_or_else(|| {
            ClientError::InvalidRequirements(format!(
                "cannot interpret requirement for {} on {}",
                requirements.asset, requirements.network
            ))
        })?;
        let network = network_by_name(&typed.network)
            .ok_or_else(|| ClientError::UnsupportedNetwork(typed.network.clone()))?;
        let from = self.wallet.address().ok_or(ClientError::NoSigner)?;
        ensure_network(&self.wallet, network).await?;

        let extra = typed.extra.clone().ok_or_else(|| {
            ClientError::InvalidRequirements("missing EIP-712 domain".to_owned())
        })?;
        let params = Eip3009SigningParams {
            chain_id: network.chain_id,
            asset_address: typed.asset,
            pay_to: typed.pay_to,
            amount: typed.max_amount_required,
            max_timeout_seconds: typed.max_timeout_seconds,
            extra,
        };
        let payload = sign_erc3009_authorization(&self.wallet, from, &params, UnixTimestamp::now()).await?;

        #[cfg(feature = "telemetry")]
        tracing::debug!(
            from = %from,
            amount = %params.amount,
            nonce = %payload.authorization.nonce,
            "signed transfer authorization"
        );

        Ok(PaymentPayload {
            x402_version: v1::V1,
            scheme: ExactScheme.to_string(),
            network: typed.network,
            payload: serde_json::to_value(payload)?,
        })
    }
}

impl<W: PaymentWallet> SchemeClient for Eip155ExactClient<W> {
    fn accepts(&self, requirements: &PaymentRequirements) -> bool {
        requirements.scheme == ExactScheme::NAME && network_by_name(&requirements.network).is_some()
    }

    fn create_payment<'a>(
        &'a self,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<PaymentPayload, ClientError>> {
        Box::pin(self.sign_payment(requirements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    use crate::exact::facilitator::{typed_requirements, verify_exact_payment};
    use crate::networks::{ARBITRUM_SEPOLIA, BASE_MAINNET};

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "arbitrum-sepolia".into(),
            max_amount_required: "507".into(),
            resource: "/chat".into(),
            description: "Payment for AI chat (7 input + 500 max output tokens)".into(),
            mime_type: "application/json".into(),
            output_schema: None,
            pay_to: address!("0x209693Bc6afc0C5328bA36FaF03C514EF312287C").to_string(),
            max_timeout_seconds: 300,
            asset: address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e").to_string(),
            extra: Some(serde_json::json!({"name": "TestUSDC", "version": "1"})),
        }
    }

    struct NoAccount;

    #[async_trait]
    impl PaymentWallet for NoAccount {
        fn address(&self) -> Option<Address> {
            None
        }
        async fn chain_id(&self) -> Result<u64, WalletError> {
            Ok(ARBITRUM_SEPOLIA)
        }
        async fn switch_chain(&self, _chain_id: u64) -> Result<(), WalletError> {
            Ok(())
        }
        async fn add_chain(&self, _network: &NetworkInfo) -> Result<(), WalletError> {
            Ok(())
        }
        async fn sign_hash(&self, _hash: &B256) -> Result<Signature, WalletError> {
            Err(WalletError::SigningRejected("no account".into()))
        }
    }

    struct Refuses(LocalWallet);

    #[async_trait]
    impl PaymentWallet for Refuses {
        fn address(&self) -> Option<Address> {
            self.0.address()
        }
        async fn chain_id(&self) -> Result<u64, WalletError> {
            self.0.chain_id().await
        }
        async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
            self.0.switch_chain(chain_id).await
        }
        async fn add_chain(&self, _network: &NetworkInfo) -> Result<(), WalletError> {
            Err(WalletError::SwitchRejected("user rejected the request".into()))
        }
        async fn sign_hash(&self, _hash: &B256) -> Result<Signature, WalletError> {
            Err(WalletError::SigningRejected("user denied message signature".into()))
        }
    }

    #[tokio::test]
    async fn signed_proof_passes_verification() {
        let client = Eip155ExactClient::new(LocalWallet::new(PrivateKeySigner::random()));
        let req = requirements();
        assert!(client.accepts(&req));
        let payload = client.create_payment(&req).await.unwrap();
        assert_eq!(payload.scheme, "exact");
        assert_eq!(payload.payload["value"], "507");

        let typed = typed_requirements(&req).unwrap();
        let verified =
            verify_exact_payment(&payload, &typed, ARBITRUM_SEPOLIA, UnixTimestamp::now()).unwrap();
        assert_eq!(Some(verified.authorization.from), client.wallet().address());
    }

    #[tokio::test]
    async fn window_spans_skew_and_timeout() {
        let client = Eip155ExactClient::new(LocalWallet::new(PrivateKeySigner::random()));
        let before = UnixTimestamp::now();
        let payload = client.create_payment(&requirements()).await.unwrap();
        let evm: ExactEvmPayload = serde_json::from_value(payload.payload).unwrap();
        let after = UnixTimestamp::now();
        let auth = evm.authorization;
        assert!(auth.valid_after >= before - 60 && auth.valid_after <= after - 60);
        assert!(auth.valid_before >= before + 300 && auth.valid_before <= after + 300);
    }

    #[tokio::test]
    async fn every_proof_has_a_fresh_nonce() {
        let client = Eip155ExactClient::new(LocalWallet::new(PrivateKeySigner::random()));
        let a = client.create_payment(&requirements()).await.unwrap();
        let b = client.create_payment(&requirements()).await.unwrap();
        assert_ne!(a.payload["nonce"], b.payload["nonce"]);
    }

    #[tokio::test]
    async fn switches_to_the_required_chain() {
        let wallet = LocalWallet::new(PrivateKeySigner::random());
        wallet.switch_chain(BASE_MAINNET).await.unwrap();
        let client = Eip155ExactClient::new(wallet);
        client.create_payment(&requirements()).await.unwrap();
        assert_eq!(client.wallet().chain_id().await.unwrap(), ARBITRUM_SEPOLIA);
    }

    #[tokio::test]
    async fn adds_an_unknown_chain_then_switches() {
        let wallet = LocalWallet::with_chains(PrivateKeySigner::random(), BASE_MAINNET, []);
        assert_eq!(
            wallet.switch_chain(ARBITRUM_SEPOLIA).await,
            Err(WalletError::UnknownChain(ARBITRUM_SEPOLIA))
        );
        let client = Eip155ExactClient::new(wallet);
        client.create_payment(&requirements()).await.unwrap();
        assert_eq!(client.wallet().chain_id().await.unwrap(), ARBITRUM_SEPOLIA);
    }

    #[tokio::test]
    async fn refusing_to_add_the_chain_is_terminal() {
        let wallet = Refuses(LocalWallet::with_chains(PrivateKeySigner::random(), BASE_MAINNET, []));
        let err = Eip155ExactClient::new(wallet)
            .create_payment(&requirements())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NetworkSwitch(_)));
    }

    #[tokio::test]
    async fn refusing_to_sign_is_terminal() {
        let wallet = Refuses(LocalWallet::new(PrivateKeySigner::random()));
        let err = Eip155ExactClient::new(wallet)
            .create_payment(&requirements())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::SigningRejected(_)));
    }

    #[tokio::test]
    async fn missing_account_is_terminal() {
        let err = Eip155ExactClient::new(NoAccount)
            .create_payment(&requirements())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NoSigner));
    }

    #[tokio::test]
    async fn unknown_network_is_not_accepted() {
        let client = Eip155ExactClient::new(LocalWallet::new(PrivateKeySigner::random()));
        let mut req = requirements();
        req.network = "solana-devnet".into();
        assert!(!client.accepts(&req));
        assert!(matches!(
            client.create_payment(&req).await.unwrap_err(),
            ClientError::UnsupportedNetwork(_)
        ));
    }
}
