//! Known EVM networks.
//!
//! x402 v1 names networks by slug. This table maps slugs to EIP-155 chain ids
//! and carries what a wallet needs to add a chain it has never seen.

/// Arbitrum One chain ID.
pub const ARBITRUM_ONE: u64 = 42161;

/// Arbitrum Sepolia (testnet) chain ID.
pub const ARBITRUM_SEPOLIA: u64 = 421_614;

/// Base Mainnet chain ID.
pub const BASE_MAINNET: u64 = 8453;

/// Base Sepolia (testnet) chain ID.
pub const BASE_SEPOLIA: u64 = 84532;

/// Static description of an EVM network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkInfo {
    /// x402 network slug (e.g., `"arbitrum-sepolia"`).
    pub name: &'static str,
    /// Display name used when adding the chain to a wallet.
    pub display_name: &'static str,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Public JSON-RPC endpoint.
    pub rpc_url: &'static str,
    /// Block explorer base URL.
    pub explorer_url: &'static str,
}

impl NetworkInfo {
    /// Explorer link for a transaction hash.
    #[must_use]
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{tx_hash}", self.explorer_url)
    }
}

/// Every network this crate knows about.
pub const KNOWN_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "arbitrum-sepolia",
        display_name: "Arbitrum Sepolia",
        chain_id: ARBITRUM_SEPOLIA,
        rpc_url: "https://sepolia-rollup.arbitrum.io/rpc",
        explorer_url: "https://sepolia.arbiscan.io",
    },
    NetworkInfo {
        name: "arbitrum",
        display_name: "Arbitrum One",
        chain_id: ARBITRUM_ONE,
        rpc_url: "https://arb1.arbitrum.io/rpc",
        explorer_url: "https://arbiscan.io",
    },
    NetworkInfo {
        name: "base",
        display_name: "Base",
        chain_id: BASE_MAINNET,
        rpc_url: "https://mainnet.base.org",
        explorer_url: "https://basescan.org",
    },
    NetworkInfo {
        name: "base-sepolia",
        display_name: "Base Sepolia",
        chain_id: BASE_SEPOLIA,
        rpc_url: "https://sepolia.base.org",
        explorer_url: "https://sepolia.basescan.org",
    },
];

/// Looks up a network by its x402 slug.
#[must_use]
pub fn network_by_name(name: &str) -> Option<&'static NetworkInfo> {
    KNOWN_NETWORKS.iter().find(|n| n.name == name)
}

/// Looks up a network by its EIP-155 chain id.
#[must_use]
pub fn network_by_chain_id(chain_id: u64) -> Option<&'static NetworkInfo> {
    KNOWN_NETWORKS.iter().find(|n| n.chain_id == chain_id)
}
