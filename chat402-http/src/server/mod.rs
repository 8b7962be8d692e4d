//! Axum payment gate for the x402 v1 exchange.
//!
//! [`Paygate`] wraps a metered resource: it asks for payment when the
//! request carries no proof, verifies proofs through a
//! [`Facilitator`](chat402::facilitator::Facilitator), settles them when the
//! facilitator is configured to, and attaches the `X-Payment-Response`
//! receipt to the resource's output.
//!
//! Every refusal is a `402` whose body is a fresh challenge priced for the
//! current request, with `error` stating why the previous proof was refused.

pub mod error;
pub mod paygate;

pub use error::PaygateError;
pub use paygate::Paygate;
