//! HTTP-specific constants for the x402 v1 exchange.

/// Request header carrying the base64 JSON payment proof (client to server).
pub const X_PAYMENT_HEADER: &str = "X-Payment";

/// Response header carrying the base64 JSON payment outcome (server to client).
pub const X_PAYMENT_RESPONSE_HEADER: &str = "X-Payment-Response";
