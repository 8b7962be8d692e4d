#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for pay-per-request AI chat over the x402 payment protocol.
//!
//! A client asks for a chat completion; the server prices the request from its
//! content and answers `402 Payment Required` with a machine-readable
//! challenge. The client signs a transfer authorization for the quoted amount
//! and retries. The server verifies the authorization, optionally settles it
//! on-chain, and serves the completion.
//!
//! This crate is chain-agnostic. The EVM "exact" scheme lives in
//! `chat402-evm`, the HTTP transport in `chat402-http`.
//!
//! # Modules
//!
//! - [`amount`] - Human-readable rendering of atomic token amounts
//! - [`chat`] - Chat request and response bodies
//! - [`challenge`] - Builds the `402 Payment Required` envelope
//! - [`facilitator`] - Verification and settlement seam used by the HTTP gate
//! - [`pricing`] - Usage-based price quotes
//! - [`proto`] - Wire format types and verification errors
//! - [`scheme`] - Client-side payment scheme abstraction
//! - [`timestamp`] - Unix timestamps for authorization windows
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation

pub mod amount;
pub mod challenge;
pub mod chat;
pub mod facilitator;
pub mod pricing;
pub mod proto;
pub mod scheme;
pub mod timestamp;
