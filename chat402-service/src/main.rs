//! Pay-per-request AI chat server.
//!
//! # Usage
//!
//! ```bash
//! # Verification only, replies echoed locally
//! ASSET_ADDRESS=0x... PAY_TO=0x... cargo run -p chat402-service
//!
//! # Settle every payment on-chain and answer with Groq
//! ASSET_ADDRESS=0x... PAYEE_PRIVATE_KEY=0x... ENABLE_SETTLEMENT=true \
//!     GROQ_API_KEY=gsk_... cargo run -p chat402-service --release
//!
//! # Configure logging level
//! RUST_LOG=debug cargo run -p chat402-service
//! ```
//!
//! Settings are read from flags, the environment and `.env`; see
//! [`chat402_service::config`].

use std::sync::Arc;

use chat402::challenge::ChallengeBuilder;
use chat402::facilitator::Facilitator;
use chat402::pricing::PricingEngine;
use chat402_evm::exact::{Eip3009Settler, ExactEvmFacilitator};
use chat402_http::server::Paygate;
use chat402_service::config::{ServiceConfig, Settings};
use chat402_service::generator::{EchoGenerator, GroqGenerator, TextGenerator};
use chat402_service::handlers::{AppState, chat_router};
use chat402_service::util::SigDown;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(ServiceConfig::parse()).await {
        tracing::error!("chat402-service failed: {e}");
        std::process::exit(1);
    }
}

async fn run(config: ServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let settings = config.resolve()?;
    tracing::info!(
        network = settings.network.name,
        chain_id = settings.network.chain_id,
        pay_to = %settings.pay_to,
        asset = %settings.challenge.asset,
        settlement = settings.settlement_key.is_some(),
        "Loaded configuration"
    );

    let state = Arc::new(build_state(&settings));
    let app = chat_router(state);

    let sig_down = SigDown::try_new()?;
    let listener = tokio::net::TcpListener::bind(settings.bind).await?;
    tracing::info!("chat402-service listening on http://{}", settings.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { sig_down.recv().await })
        .await?;

    tracing::info!("chat402-service shut down gracefully");
    Ok(())
}

fn build_state(settings: &Settings) -> AppState {
    let facilitator: Arc<dyn Facilitator> = match &settings.settlement_key {
        Some(key) => {
            tracing::info!(
                rpc_url = %settings.rpc_url,
                confirmations = settings.settlement_confirmations,
                "on-chain settlement enabled"
            );
            let settler = Eip3009Settler::connect(settings.rpc_url.clone(), key.clone())
                .with_confirmations(settings.settlement_confirmations);
            Arc::new(ExactEvmFacilitator::with_settlement(
                settings.network,
                Arc::new(settler),
            ))
        }
        None => {
            tracing::info!("settlement disabled, verified payments are served directly");
            Arc::new(ExactEvmFacilitator::verification_only(settings.network))
        }
    };

    let generator: Arc<dyn TextGenerator> = match &settings.groq_api_key {
        Some(key) => Arc::new(GroqGenerator::with_base_url(
            key.clone(),
            settings.model.clone(),
            settings.groq_base_url.clone(),
        )),
        None => {
            tracing::warn!("GROQ_API_KEY not set, replies will be echoed");
            Arc::new(EchoGenerator)
        }
    };

    AppState::new(
        Paygate::new(facilitator, ChallengeBuilder::new(settings.challenge.clone())),
        PricingEngine::new(settings.pricing),
        generator,
    )
}
