use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gemini_live_voice::{AppConfig, Session};

/// Gemini Live voice client - talk to the model through your microphone
#[derive(Parser, Debug)]
#[command(name = "gemini-live-voice")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Model name (overrides config and GEMINI_MODEL)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// Inline system instruction (overrides every other source)
    #[arg(short = 'i', long = "instruction")]
    instruction: Option<String>,

    /// URL to fetch the system instruction from
    #[arg(long = "instruction-url", value_name = "URL")]
    instruction_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env values become environment variables before config loading.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(text) = cli.instruction {
        config.instruction_text = Some(text);
    }
    if let Some(url) = cli.instruction_url {
        config.instruction_url = Some(url);
    }
    config.validate()?;

    let mut session = Session::new(config);
    session.start().await?;
    info!("Speak into the microphone; press Ctrl-C to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, stopping");
        }
        _ = session.wait_closed() => {
            info!("Connection closed, stopping");
        }
    }

    session.stop().await;
    Ok(())
}
