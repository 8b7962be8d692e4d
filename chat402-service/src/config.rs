//! Service configuration.
//!
//! Every setting is a command-line flag with an environment fallback; the
//! binary loads `.env` with `dotenvy` before parsing, so a `.env` file works
//! the same as exported variables.
//!
//! # Environment Variables
//!
//! - `HOST` / `PORT` - Bind address (default: `0.0.0.0:3001`)
//! - `NETWORK` - x402 network name (default: `arbitrum-sepolia`)
//! - `RPC_URL` - Chain RPC endpoint (default: the network's public RPC)
//! - `ASSET_ADDRESS` - Token contract (required)
//! - `TOKEN_NAME` / `TOKEN_VERSION` - EIP-712 domain of the token
//! - `PAYEE_PRIVATE_KEY` - Settlement key; the payee address is derived from it
//! - `PAY_TO` - Payee address when no key is given
//! - `ENABLE_SETTLEMENT` - Submit verified authorizations on-chain
//! - `SETTLEMENT_CONFIRMATIONS` - Blocks to wait for per settlement (default: 1)
//! - `GROQ_API_KEY` - Enables Groq generation; without it replies are echoed

use std::net::{IpAddr, SocketAddr};

use alloy_primitives::{Address, U256};
use alloy_signer_local::PrivateKeySigner;
use chat402::challenge::{AssetDomain, ChallengeConfig};
use chat402::pricing::PricingConfig;
use chat402_evm::{NetworkInfo, network_by_name};
use clap::Parser;
use url::Url;

use crate::error::ServiceError;
use crate::generator::{DEFAULT_MODEL, GROQ_BASE_URL};

/// Command-line and environment settings of `chat402-service`.
#[derive(Debug, Clone, Parser)]
#[command(name = "chat402-service", version, about = "Pay-per-request AI chat over x402", long_about = None)]
pub struct ServiceConfig {
    /// Bind address.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Bind port.
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// x402 network name.
    #[arg(long, env = "NETWORK", default_value = "arbitrum-sepolia")]
    pub network: String,

    /// Chain RPC endpoint; defaults to the network's public RPC.
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<Url>,

    /// Token contract address.
    #[arg(long = "asset", env = "ASSET_ADDRESS")]
    pub asset: Address,

    /// EIP-712 domain name of the token.
    #[arg(long, env = "TOKEN_NAME", default_value = "TestUSDC")]
    pub token_name: String,

    /// EIP-712 domain version of the token.
    #[arg(long, env = "TOKEN_VERSION", default_value = "1")]
    pub token_version: String,

    /// Payee key used to submit settlements.
    #[arg(long, env = "PAYEE_PRIVATE_KEY", hide_env_values = true)]
    pub payee_private_key: Option<PrivateKeySigner>,

    /// Payee address when no key is given.
    #[arg(long, env = "PAY_TO")]
    pub pay_to: Option<Address>,

    /// Submit verified authorizations on-chain.
    #[arg(long, env = "ENABLE_SETTLEMENT")]
    pub enable_settlement: bool,

    /// Blocks to wait for before a settlement counts as confirmed.
    #[arg(long, env = "SETTLEMENT_CONFIRMATIONS", default_value_t = 1)]
    pub settlement_confirmations: u64,

    /// Lifetime of an authorization and bound on settlement.
    #[arg(long, env = "MAX_TIMEOUT_SECONDS", default_value_t = 300)]
    pub max_timeout_seconds: u64,

    /// Atomic units of the asset charged per token.
    #[arg(long, env = "PRICE_PER_TOKEN", default_value_t = 1)]
    pub price_per_token: u64,

    /// Tokens reserved for the reply.
    #[arg(long, env = "OUTPUT_TOKEN_BUFFER", default_value_t = 500)]
    pub output_token_buffer: u64,

    /// Facilitator URL advertised in challenges.
    #[arg(long, env = "FACILITATOR_URL")]
    pub facilitator_url: Option<Url>,

    /// Groq API key; without one, replies are echoed.
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub groq_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible Groq API.
    #[arg(long, env = "GROQ_BASE_URL", default_value = GROQ_BASE_URL)]
    pub groq_base_url: Url,

    /// Model name sent to the provider and reported in replies.
    #[arg(long, env = "MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,
}

/// Validated settings the service is assembled from.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Socket to listen on.
    pub bind: SocketAddr,
    /// Network payments are accepted on.
    pub network: NetworkInfo,
    /// Chain RPC endpoint.
    pub rpc_url: Url,
    /// Payee address.
    pub pay_to: Address,
    /// Key to settle with; `Some` only when settlement is enabled.
    pub settlement_key: Option<PrivateKeySigner>,
    /// Confirmations awaited per settlement.
    pub settlement_confirmations: u64,
    /// Fixed parts of every challenge.
    pub challenge: ChallengeConfig,
    /// Pricing constants.
    pub pricing: PricingConfig,
    /// Groq API key, if generation should use Groq.
    pub groq_api_key: Option<String>,
    /// Base URL of the Groq API.
    pub groq_base_url: Url,
    /// Model name.
    pub model: String,
}

impl ServiceConfig {
    /// Checks the settings against each other and resolves defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if the network is unknown, settlement is
    /// enabled without a key, no payee is configured, or `PAY_TO` disagrees
    /// with the payee key.
    pub fn resolve(self) -> Result<Settings, ServiceError> {
        let network = *network_by_name(&self.network)
            .ok_or_else(|| ServiceError::UnknownNetwork(self.network.clone()))?;

        if self.enable_settlement && self.payee_private_key.is_none() {
            return Err(ServiceError::SettlementWithoutKey);
        }
        let pay_to = match (&self.payee_private_key, self.pay_to) {
            (Some(key), Some(pay_to)) if key.address() != pay_to => {
                return Err(ServiceError::PayeeMismatch {
                    pay_to,
                    key: key.address(),
                });
            }
            (Some(key), _) => key.address(),
            (None, Some(pay_to)) => pay_to,
            (None, None) => return Err(ServiceError::MissingPayee),
        };

        let rpc_url = match self.rpc_url {
            Some(url) => url,
            None => network.rpc_url.parse()?,
        };

        let mut challenge = ChallengeConfig::new(
            network.name,
            pay_to.to_string(),
            self.asset.to_string(),
            AssetDomain {
                name: self.token_name,
                version: self.token_version,
            },
        );
        challenge.max_timeout_seconds = self.max_timeout_seconds;
        challenge.facilitator_url = self.facilitator_url;

        let pricing = PricingConfig {
            output_token_buffer: self.output_token_buffer,
            price_per_token: U256::from(self.price_per_token),
            ..PricingConfig::default()
        };

        Ok(Settings {
            bind: SocketAddr::new(self.host, self.port),
            network,
            rpc_url,
            pay_to,
            settlement_key: self.payee_private_key.filter(|_| self.enable_settlement),
            settlement_confirmations: self.settlement_confirmations.max(1),
            challenge,
            pricing,
            groq_api_key: self.groq_api_key.filter(|key| !key.trim().is_empty()),
            groq_base_url: self.groq_base_url,
            model: self.model,
        })
    }
}
