//! HTTP header encoding and decoding for x402 protocol messages.
//!
//! Both headers carry standard, padded base64 of a JSON document. Decoding
//! trims surrounding whitespace and fails closed: anything that is not valid
//! base64 of a JSON value of the expected shape is an error.

use base64::prelude::*;
use chat402::proto::PaymentResponse;
use chat402::proto::v1::PaymentPayload;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::HttpError;

fn encode_json<T: Serialize>(value: &T) -> Result<String, HttpError> {
    let json = serde_json::to_vec(value)?;
    Ok(BASE64_STANDARD.encode(&json))
}

fn decode_json<T: DeserializeOwned>(header_value: &str) -> Result<T, HttpError> {
    let bytes = BASE64_STANDARD.decode(header_value.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Encodes a payment proof for the `X-Payment` header.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_x_payment(payload: &PaymentPayload) -> Result<String, HttpError> {
    encode_json(payload)
}

/// Decodes an `X-Payment` header value.
///
/// # Errors
///
/// Returns [`HttpError`] on Base64 or JSON decode failure, including a
/// missing field or an `x402Version` other than `1`.
pub fn decode_x_payment(header_value: &str) -> Result<PaymentPayload, HttpError> {
    decode_json(header_value)
}

/// Encodes a [`PaymentResponse`] for the `X-Payment-Response` header.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_payment_response(response: &PaymentResponse) -> Result<String, HttpError> {
    encode_json(response)
}

/// Decodes an `X-Payment-Response` header value.
///
/// # Errors
///
/// Returns [`HttpError`] on Base64 or JSON decode failure.
pub fn decode_payment_response(header_value: &str) -> Result<PaymentResponse, HttpError> {
    decode_json(header_value)
}
