//! Paying command-line client for `chat402-service`.
//!
//! ```bash
//! PRIVATE_KEY=0x... chat402-pay chat --message "Hello there, how are you?"
//! ```
//!
//! Sends the message, pays the quoted price once if challenged, and prints
//! the reply with the payment receipt. Ctrl-C aborts the exchange without
//! sending anything further.

use alloy_primitives::U256;
use alloy_signer_local::PrivateKeySigner;
use chat402::amount::format_units;
use chat402::chat::{ChatMessage, ChatRequest, ChatResponse};
use chat402::proto::{PaymentResponse, SettlementStatus};
use chat402_evm::exact::{Eip155ExactClient, LocalWallet, PaymentWallet};
use chat402_evm::network_by_chain_id;
use chat402_http::client::{Negotiated, PaymentNegotiator};
use chat402_service::util::SigDown;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "chat402-pay", version, about = "Chat with a paid x402 endpoint", long_about = None)]
struct Cli {
    /// Chat endpoint.
    #[arg(long, env = "SERVICE_URL", default_value = "http://localhost:3001/chat", global = true)]
    url: String,

    /// Payer key.
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true, global = true)]
    private_key: Option<PrivateKeySigner>,

    /// Decimals of the payment token, for display only.
    #[arg(long, default_value_t = 6, global = true)]
    token_decimals: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send one message and print the reply.
    Chat {
        /// The message to send.
        #[arg(short, long)]
        message: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        tracing::error!("chat402-pay failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let Command::Chat { message } = cli.command;
    let key = cli.private_key.ok_or("PRIVATE_KEY is not set")?;

    let sig_down = SigDown::try_new()?;
    let negotiator = PaymentNegotiator::new(Eip155ExactClient::new(LocalWallet::new(key)));
    let request = ChatRequest {
        messages: vec![ChatMessage::user(message)],
    };

    let outcome: Negotiated<ChatResponse> = negotiator
        .post_json(&cli.url, &request, &sig_down.cancellation_token())
        .await?;

    let explorer = match negotiator.scheme().wallet().chain_id().await {
        Ok(chain_id) => network_by_chain_id(chain_id),
        Err(_) => None,
    };
    report(&outcome, cli.token_decimals, |tx| explorer.map(|n| n.tx_url(tx)));
    Ok(())
}

#[allow(clippy::print_stdout)]
fn report(
    outcome: &Negotiated<ChatResponse>,
    token_decimals: u32,
    tx_url: impl Fn(&str) -> Option<String>,
) {
    println!("{}: {}", outcome.body.model, outcome.body.content);
    println!();
    match &outcome.payment_response {
        Some(receipt) => print_receipt(receipt, token_decimals, tx_url),
        None if outcome.paid() => println!("paid, but the server sent no readable receipt"),
        None => println!("no payment was required"),
    }
}

#[allow(clippy::print_stdout)]
fn print_receipt(
    receipt: &PaymentResponse,
    token_decimals: u32,
    tx_url: impl Fn(&str) -> Option<String>,
) {
    let amount = receipt
        .amount
        .parse::<U256>()
        .map_or_else(|_| receipt.amount.clone(), |atomic| format_units(atomic, token_decimals));
    let status = match receipt.status {
        SettlementStatus::Verified => "verified, not settled",
        SettlementStatus::Completed => "settled on-chain",
    };
    println!("payment:  {status} ({amount} tokens of {})", receipt.token);
    if let Some(hash) = &receipt.transaction_hash {
        println!("tx:       {}", tx_url(hash).unwrap_or_else(|| hash.clone()));
    }
    if let Some(block) = receipt.block_number {
        println!("block:    {block}");
    }
}
