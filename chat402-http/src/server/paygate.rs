//! Core payment gate logic.
//!
//! The [`Paygate`] struct handles the full payment lifecycle for one request:
//! extracting the proof header, verifying with the facilitator, settling
//! on-chain when enabled, running the metered resource and returning `402`
//! challenges when payment is required.

use std::fmt::Display;
use std::future::Future;

use axum::Json;
use axum::response::{IntoResponse, Response};
use chat402::challenge::ChallengeBuilder;
use chat402::facilitator::Facilitator;
use chat402::pricing::PriceQuote;
use chat402::proto::PaymentResponse;
use http::{HeaderMap, HeaderValue};
use serde_json::json;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use super::error::PaygateError;
use crate::constants::{X_PAYMENT_HEADER, X_PAYMENT_RESPONSE_HEADER};
use crate::error::HttpError;
use crate::headers::{decode_x_payment, encode_payment_response};

/// Payment gate in front of one metered resource.
///
/// The facilitator decides whether verified proofs are settled; the gate only
/// asks it through [`Facilitator::settles`].
#[derive(Debug, Clone)]
pub struct Paygate<TFacilitator> {
    facilitator: TFacilitator,
    challenge: ChallengeBuilder,
}

impl<TFacilitator> Paygate<TFacilitator> {
    /// Creates a gate that verifies through `facilitator` and challenges with `challenge`.
    pub const fn new(facilitator: TFacilitator, challenge: ChallengeBuilder) -> Self {
        Self {
            facilitator,
            challenge,
        }
    }

    /// The facilitator payments are verified with.
    pub const fn facilitator(&self) -> &TFacilitator {
        &self.facilitator
    }

    /// The builder every `402` body comes from.
    pub const fn challenge(&self) -> &ChallengeBuilder {
        &self.challenge
    }

    /// Converts a [`PaygateError`] into its HTTP response.
    ///
    /// Payment errors become `402` with a challenge priced by `quote`;
    /// internal failures become a bare `500`.
    #[must_use]
    pub fn error_into_response(&self, err: PaygateError, quote: &PriceQuote) -> Response {
        let status = err.status();
        match err {
            PaygateError::Internal(detail) => {
                #[cfg(feature = "telemetry")]
                tracing::error!(detail = %detail, "paid request failed");
                #[cfg(not(feature = "telemetry"))]
                let _ = detail;
                (status, Json(json!({ "error": "Internal server error" }))).into_response()
            }
            PaygateError::PaymentRequired => {
                (status, Json(self.challenge.build(quote))).into_response()
            }
            refused => {
                #[cfg(feature = "telemetry")]
                tracing::info!(
                    code = refused.reason().map(|code| code.as_str()),
                    reason = %refused,
                    "payment refused, re-issuing challenge"
                );
                let body = self.challenge.build_with_error(quote, refused.to_string());
                (status, Json(body)).into_response()
            }
        }
    }
}

impl<TFacilitator> Paygate<TFacilitator>
where
    TFacilitator: Facilitator,
{
    /// Handles a request for the resource priced at `quote`.
    ///
    /// `resource` runs only after the proof is verified (and settled, when
    /// settlement is enabled). Every failure is turned into a response.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "chat402.handle_request", skip_all, fields(amount = %quote.amount))
    )]
    pub async fn handle_request<R, Fut, T, E>(
        &self,
        headers: &HeaderMap,
        quote: &PriceQuote,
        resource: R,
    ) -> Response
    where
        R: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: IntoResponse,
        E: Display,
    {
        match self.handle_request_fallible(headers, quote, resource).await {
            Ok(response) => response,
            Err(err) => self.error_into_response(err, quote),
        }
    }

    /// Handles a request, returning errors as [`PaygateError`].
    ///
    /// This is the fallible version of [`Paygate::handle_request`] that
    /// returns the error instead of turning it into a response.
    ///
    /// # Errors
    ///
    /// Returns [`PaygateError`] if payment is missing, malformed, invalid or
    /// fails to settle, or if the resource itself fails.
    pub async fn handle_request_fallible<R, Fut, T, E>(
        &self,
        headers: &HeaderMap,
        quote: &PriceQuote,
        resource: R,
    ) -> Result<Response, PaygateError>
    where
        R: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: IntoResponse,
        E: Display,
    {
        let header = headers
            .get(X_PAYMENT_HEADER)
            .ok_or(PaygateError::PaymentRequired)?;
        let header = header
            .to_str()
            .map_err(|e| PaygateError::ProofMalformed(HttpError::HeaderValue(e.to_string())))?;
        let payload = decode_x_payment(header).map_err(PaygateError::ProofMalformed)?;

        let requirements = self.challenge.requirements(quote);
        let verified = self.facilitator.verify(&payload, &requirements).await?;

        #[cfg(feature = "telemetry")]
        tracing::info!(
            payer = %verified.payer,
            amount = %verified.amount,
            nonce = %verified.nonce,
            "payment verified"
        );

        let receipt = if self.facilitator.settles() {
            let settlement = self.facilitator.settle(&payload, &requirements).await;
            if !settlement.success {
                return Err(PaygateError::SettlementFailed(
                    settlement.error.unwrap_or_else(|| "unknown error".to_owned()),
                ));
            }
            #[cfg(feature = "telemetry")]
            tracing::info!(
                transaction_hash = ?settlement.transaction_hash,
                block_number = ?settlement.block_number,
                gas_used = ?settlement.gas_used,
                "settlement confirmed"
            );
            PaymentResponse::completed(settlement, verified.amount, verified.asset)
        } else {
            PaymentResponse::verified(verified.amount, verified.asset)
        };

        let output = resource()
            .await
            .map_err(|e| PaygateError::Internal(e.to_string()))?;
        let header_value = receipt_to_header(&receipt)?;

        let mut response = output.into_response();
        response.headers_mut().insert(X_PAYMENT_RESPONSE_HEADER, header_value);
        Ok(response)
    }
}

/// Encodes the receipt as an `X-Payment-Response` header value.
fn receipt_to_header(receipt: &PaymentResponse) -> Result<HeaderValue, PaygateError> {
    let encoded =
        encode_payment_response(receipt).map_err(|e| PaygateError::Internal(e.to_string()))?;
    HeaderValue::from_str(&encoded).map_err(|e| PaygateError::Internal(e.to_string()))
}
