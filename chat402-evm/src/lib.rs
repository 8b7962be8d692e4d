#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EIP-155 (EVM) support for chat402.
//!
//! Implements the x402 `exact` scheme on top of EIP-3009
//! `transferWithAuthorization`: the payer signs an EIP-712 typed-data
//! authorization off-chain and the payee submits it on-chain, paying the gas.
//!
//! # Architecture
//!
//! - [`networks`] - Known EVM networks, looked up by slug or chain id
//! - [`exact`] - The `exact` scheme: wire types, signature handling,
//!   verification, settlement and client-side signing
//!
//! # Feature Flags
//!
//! - `client` - Client-side payment signing and wallet abstraction
//! - `facilitator` - On-chain settlement and the in-process facilitator
//! - `telemetry` - Tracing instrumentation

pub mod exact;
pub mod networks;

pub use networks::{NetworkInfo, network_by_chain_id, network_by_name};
