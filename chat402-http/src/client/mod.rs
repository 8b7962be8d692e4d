//! Client side of the x402 v1 exchange over reqwest.
//!
//! [`PaymentNegotiator`] sends a request, and if the server answers
//! `402 Payment Required`, signs the first offered requirement with its
//! [`SchemeClient`](chat402::scheme::SchemeClient) and resubmits the request
//! once with an `X-Payment` header. A second `402` is terminal.
//!
//! The exchange is an explicit state machine; every transition is recorded
//! in [`Negotiated::transcript`].

mod negotiator;

pub use negotiator::*;
