//! The request, challenge and paid retry exchange.

use std::fmt;
use std::future::Future;

use chat402::proto::PaymentResponse;
use chat402::proto::v1::{PaymentRequired, PaymentRequirements};
use chat402::scheme::{ClientError, SchemeClient};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::constants::{X_PAYMENT_HEADER, X_PAYMENT_RESPONSE_HEADER};
use crate::error::HttpError;
use crate::headers::{decode_payment_response, encode_x_payment};

/// States of a payment negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    /// Nothing sent yet.
    Idle,
    /// The unpaid request is in flight.
    Requested,
    /// The server answered `402` with a challenge.
    ChallengeReceived,
    /// A requirement was selected and is being signed.
    Authorizing,
    /// A proof is ready to send.
    Signed,
    /// The paid request is in flight.
    RetryRequested,
    /// The server answered with something other than `402`.
    Served,
}

impl NegotiationState {
    /// Short lowercase name, as logged.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requested => "requested",
            Self::ChallengeReceived => "challenge_received",
            Self::Authorizing => "authorizing",
            Self::Signed => "signed",
            Self::RetryRequested => "retry_requested",
            Self::Served => "served",
        }
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failures of a negotiation.
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    /// The request could not be sent or its response read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The cancellation token fired.
    #[error("payment negotiation cancelled")]
    Cancelled,
    /// A `402` body that is not a payment challenge.
    #[error("invalid payment challenge: {0}")]
    InvalidChallenge(String),
    /// The challenge offered no requirements at all.
    #[error("payment challenge offers no payment requirements")]
    NoPaymentRequirements,
    /// The proof could not be produced.
    #[error(transparent)]
    Payment(#[from] ClientError),
    /// The paid retry was answered with another `402`.
    #[error("payment rejected: {reason}")]
    PaymentRejected {
        /// The server's stated reason.
        reason: String,
    },
    /// The server answered with a non-success status other than `402`.
    #[error("request failed with status {status}: {message}")]
    RequestFailed {
        /// Response status.
        status: StatusCode,
        /// The server's `error` message, or the raw body.
        message: String,
    },
    /// A header or body could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] HttpError),
}

/// Outcome of a served request.
#[derive(Debug, Clone)]
pub struct Negotiated<T> {
    /// Final response status.
    pub status: StatusCode,
    /// Decoded response body.
    pub body: T,
    /// Decoded `X-Payment-Response`, if the server sent a readable one.
    pub payment_response: Option<PaymentResponse>,
    /// Every state the negotiation passed through, in order.
    pub transcript: Vec<NegotiationState>,
}

impl<T> Negotiated<T> {
    /// Whether the request was paid for.
    #[must_use]
    pub fn paid(&self) -> bool {
        self.transcript.contains(&NegotiationState::RetryRequested)
    }
}

enum Step {
    Send(Option<String>),
    Challenged(PaymentRequired),
    Authorize(PaymentRequirements),
    Signed(String),
    Served(Response),
}

/// Drives the two-phase exchange with a single scheme client.
#[derive(Debug, Clone)]
pub struct PaymentNegotiator<S> {
    http: Client,
    scheme: S,
}

impl<S> PaymentNegotiator<S> {
    /// Creates a negotiator with a default reqwest client.
    pub fn new(scheme: S) -> Self {
        Self::with_client(Client::new(), scheme)
    }

    /// Creates a negotiator over an existing reqwest client.
    pub const fn with_client(http: Client, scheme: S) -> Self {
        Self { http, scheme }
    }

    /// The scheme client proofs are signed with.
    pub const fn scheme(&self) -> &S {
        &self.scheme
    }
}

impl<S: SchemeClient> PaymentNegotiator<S> {
    /// POSTs `body` as JSON to `url`, paying once if asked to.
    ///
    /// The body is serialized once and sent byte-for-byte identical on the
    /// retry. Once `cancel` fires no further request is sent.
    ///
    /// # Errors
    ///
    /// Returns [`NegotiationError`] on transport failure, cancellation, an
    /// unusable challenge, a refused or failed signature, a second `402`, or
    /// a non-success final status.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "chat402.negotiate", skip_all, err, fields(url = %url))
    )]
    pub async fn post_json<B, T>(
        &self,
        url: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<Negotiated<T>, NegotiationError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(body).map_err(HttpError::from)?;
        let mut transcript = vec![NegotiationState::Idle];
        let mut step = Step::Send(None);
        loop {
            step = match step {
                Step::Send(payment) => {
                    if cancel.is_cancelled() {
                        return Err(NegotiationError::Cancelled);
                    }
                    let paid = payment.is_some();
                    transcript.push(if paid {
                        NegotiationState::RetryRequested
                    } else {
                        NegotiationState::Requested
                    });
                    let response = until_cancelled(cancel, self.send(url, &body, payment)).await??;
                    if response.status() != StatusCode::PAYMENT_REQUIRED {
                        Step::Served(response)
                    } else {
                        transcript.push(NegotiationState::ChallengeReceived);
                        let text = until_cancelled(cancel, response.text()).await??;
                        if paid {
                            let reason = error_message(&text);
                            #[cfg(feature = "telemetry")]
                            tracing::warn!(reason = %reason, "paid request refused");
                            return Err(NegotiationError::PaymentRejected { reason });
                        }
                        #[cfg(feature = "telemetry")]
                        tracing::info!("received 402 Payment Required, processing payment");
                        let challenge = serde_json::from_str(&text)
                            .map_err(|e| NegotiationError::InvalidChallenge(e.to_string()))?;
                        Step::Challenged(challenge)
                    }
                }
                Step::Challenged(challenge) => {
                    transcript.push(NegotiationState::Authorizing);
                    Step::Authorize(self.select(challenge)?)
                }
                Step::Authorize(requirements) => {
                    #[cfg(feature = "telemetry")]
                    tracing::debug!(
                        network = %requirements.network,
                        amount = %requirements.max_amount_required,
                        "signing payment"
                    );
                    let payload =
                        until_cancelled(cancel, self.scheme.create_payment(&requirements)).await??;
                    transcript.push(NegotiationState::Signed);
                    Step::Signed(encode_x_payment(&payload)?)
                }
                Step::Signed(header) => Step::Send(Some(header)),
                Step::Served(response) => {
                    transcript.push(NegotiationState::Served);
                    return finish(response, transcript, cancel).await;
                }
            };
        }
    }

    /// Picks the first offered requirement the scheme client can pay.
    fn select(&self, challenge: PaymentRequired) -> Result<PaymentRequirements, NegotiationError> {
        if challenge.accepts.is_empty() {
            return Err(NegotiationError::NoPaymentRequirements);
        }
        challenge
            .accepts
            .into_iter()
            .find(|requirements| self.scheme.accepts(requirements))
            .ok_or(NegotiationError::Payment(ClientError::NoMatchingPaymentOption))
    }

    async fn send(&self, url: &str, body: &[u8], payment: Option<String>) -> Result<Response, reqwest::Error> {
        let mut request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec());
        if let Some(payment) = payment {
            request = request.header(X_PAYMENT_HEADER, payment);
        }
        request.send().await
    }
}

async fn finish<T: DeserializeOwned>(
    response: Response,
    transcript: Vec<NegotiationState>,
    cancel: &CancellationToken,
) -> Result<Negotiated<T>, NegotiationError> {
    let status = response.status();
    let payment_response = response
        .headers()
        .get(X_PAYMENT_RESPONSE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| match decode_payment_response(value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(error = %err, "ignoring unreadable X-Payment-Response header");
                #[cfg(not(feature = "telemetry"))]
                let _ = err;
                None
            }
        });

    if !status.is_success() {
        let text = until_cancelled(cancel, response.text()).await??;
        return Err(NegotiationError::RequestFailed {
            status,
            message: error_message(&text),
        });
    }

    let bytes = until_cancelled(cancel, response.bytes()).await??;
    let body = serde_json::from_slice(&bytes).map_err(HttpError::from)?;
    Ok(Negotiated {
        status,
        body,
        payment_response,
        transcript,
    })
}

/// The `error` member of a JSON error body, or the body itself.
fn error_message(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|value| value.get("error")?.as_str().map(str::to_owned))
        .unwrap_or_else(|| text.to_owned())
}

async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, NegotiationError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(NegotiationError::Cancelled),
        output = future => Ok(output),
    }
}
