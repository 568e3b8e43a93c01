use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rtvi_client::types::{BotReadyData, Transcript, TransportState};
use rtvi_client::{LlmContextMessage, LlmHelper, RtviClient, RtviClientDelegate, RtviClientOptions, WebSocketTransport};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
struct Cli {
    /// Socket URL used when no RTVI_BASE_URL is configured
    #[arg(long)]
    ws_url: Option<String>,
    /// Something to say to the bot once it is ready
    #[arg(long)]
    prompt: Option<String>,
    /// How long to keep the session open, in seconds
    #[arg(long, default_value_t = 30)]
    duration: u64,
}

struct Printer;

impl RtviClientDelegate for Printer {
    fn on_bot_ready(&self, data: &BotReadyData) {
        println!("bot ready, protocol version {}", data.version());
    }

    fn on_user_transcript(&self, data: &Transcript) {
        if data.is_final().unwrap_or(false) {
            println!("user: {}", data.text());
        }
    }

    fn on_bot_transcript(&self, text: &str) {
        println!("bot: {}", text);
    }

    fn on_error(&self, message: &str) {
        eprintln!("error: {}", message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let args = Cli::parse();
    let options = RtviClientOptions::from_env().context("Failed to load client options")?;

    let mut transport = WebSocketTransport::new();
    if let Some(url) = &args.ws_url {
        transport = transport.with_url(url);
    }
    let client = RtviClient::new(Arc::new(transport), options);
    let delegate: Arc<dyn RtviClientDelegate> = Arc::new(Printer);
    client.set_delegate(Some(&delegate));
    let llm = client.register_helper::<LlmHelper>("llm")?;

    let mut state = client.subscribe_state();
    client.start().await.context("Failed to start session")?;
    state
        .wait_for(|s| matches!(s, TransportState::Ready | TransportState::Disconnected))
        .await?;
    if client.state() != TransportState::Ready {
        anyhow::bail!("session ended before the bot was ready");
    }

    let actions = client.describe_actions().await?;
    for action in actions.actions() {
        tracing::info!("available action: {}:{}", action.service(), action.action());
    }

    if let Some(prompt) = args.prompt {
        llm.append_to_messages(LlmContextMessage::new("user", &prompt), true)
            .await?;
    }

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(args.duration)) => {}
        _ = state.wait_for(|s| *s == TransportState::Disconnected) => {
            tracing::info!("session closed by the bot");
        }
    }

    client.disconnect().await?;
    client.release().await;
    Ok(())
}
