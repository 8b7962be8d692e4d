#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP transport layer for chat402.
//!
//! Provides the `X-Payment` / `X-Payment-Response` header codec and, behind
//! features, both ends of the 402 exchange.
//!
//! # Modules
//!
//! - [`constants`] - HTTP header names and status codes
//! - [`headers`] - Base64 encoding/decoding for x402 HTTP headers
//! - [`error`] - HTTP transport error types
//! - [`server`] - Axum payment gate (feature: `server`)
//! - [`client`] - Payment negotiator for reqwest (feature: `client`)

pub mod constants;
pub mod error;
pub mod headers;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "server")]
pub mod server;
