//! Pay-per-request AI chat over x402.
//!
//! `POST /chat` is priced per request from the size of the conversation and
//! served only once the caller presents a signed EIP-3009 authorization for
//! that price. The companion `chat402-pay` binary is a paying client.
//!
//! # Modules
//!
//! - [`config`] - Command-line and environment settings
//! - [`error`] - Startup error types
//! - [`generator`] - Reply generation (Groq or local echo)
//! - [`handlers`] - Axum route handlers and router builder
//! - [`util`] - Shutdown signal handling

pub mod config;
pub mod error;
pub mod generator;
pub mod handlers;
pub mod util;

pub use handlers::{AppState, SharedState, chat_router};
