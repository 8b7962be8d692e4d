//! Axum route handlers for the chat service.
//!
//! `POST /chat` prices the conversation, hands the request to the
//! [`Paygate`] and generates the reply only once payment is accepted.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chat402::chat::{ChatRequest, ChatResponse};
use chat402::facilitator::Facilitator;
use chat402::pricing::PricingEngine;
use chat402_http::constants::X_PAYMENT_HEADER;
use chat402_http::server::Paygate;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::generator::TextGenerator;

/// Everything a request handler needs.
pub struct AppState {
    /// Gate in front of `/chat`.
    pub paygate: Paygate<Arc<dyn Facilitator>>,
    /// Prices each conversation.
    pub pricing: PricingEngine,
    /// Writes the replies.
    pub generator: Arc<dyn TextGenerator>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("network", &self.paygate.challenge().config().network)
            .field("settles", &self.paygate.facilitator().settles())
            .field("pricing", &self.pricing)
            .field("model", &self.generator.model())
            .finish()
    }
}

impl AppState {
    /// Bundles the gate, the pricing engine and the generator.
    #[must_use]
    pub fn new(
        paygate: Paygate<Arc<dyn Facilitator>>,
        pricing: PricingEngine,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            paygate,
            pricing,
            generator,
        }
    }
}

/// Shared application state.
pub type SharedState = Arc<AppState>;

/// Builds the router: `POST /chat`, `GET /health`, CORS and request tracing.
pub fn chat_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(post_chat))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-payment"),
        ])
        .expose_headers([HeaderName::from_static("x-payment-response")])
}

/// `POST /chat` - Paid chat completion.
///
/// The body is parsed before the payment header since the price depends on
/// it. Bodies that are not a conversation get `400` without a challenge.
pub async fn post_chat(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return bad_request(&rejection.body_text()),
    };
    if request.messages.is_empty() {
        return bad_request("messages must not be empty");
    }

    let quote = state.pricing.quote(&request.messages);
    tracing::debug!(
        input_tokens = quote.input_tokens,
        amount = %quote.amount,
        paid = headers.contains_key(X_PAYMENT_HEADER),
        "priced chat request"
    );

    let generator = Arc::clone(&state.generator);
    state
        .paygate
        .handle_request(&headers, &quote, || async move {
            let content = generator.generate(&request.messages).await?;
            Ok::<_, crate::generator::GenerationError>(Json(ChatResponse {
                role: "assistant".to_owned(),
                content,
                model: generator.model().to_owned(),
            }))
        })
        .await
}

/// `GET /health` - Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
    }))
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}
