use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use stripe_gateway::application::factory::stripe_gateway_builder;
use stripe_gateway::application::gateway::{DEFAULT_MAX_DEPTH, execute_on};
use stripe_gateway::domain::intent::IntentKind;
use stripe_gateway::infrastructure::in_memory::{InMemoryStripe, Seed};
use stripe_gateway::interfaces::json::{ContextReader, ContextWriter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Payment model as a JSON file
    context: PathBuf,

    /// Request to execute on the model
    #[arg(long, default_value = "capture")]
    intent: IntentKind,

    /// JSON file with tokens and customers to preload into the provider
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Treat the model's `card` as a secret that must not be written back out
    #[arg(long)]
    sensitive_card: bool,

    /// Deepest allowed chain of nested requests
    #[arg(long, env = "STRIPE_GATEWAY_MAX_DEPTH", default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let stripe = match cli.seed {
        Some(path) => {
            let file = File::open(path).into_diagnostic()?;
            let seed: Seed = serde_json::from_reader(file).into_diagnostic()?;
            InMemoryStripe::from_seed(seed)
        }
        None => InMemoryStripe::new(),
    };
    let gateway = stripe_gateway_builder(Arc::new(stripe))
        .max_depth(cli.max_depth)
        .build();

    let file = File::open(cli.context).into_diagnostic()?;
    let mut model = ContextReader::new(file)
        .sensitive_card(cli.sensitive_card)
        .read()
        .into_diagnostic()?;

    execute_on(&gateway, cli.intent, &mut model)
        .await
        .into_diagnostic()?;

    // A secret card that was never exchanged for a stored one is not echoed back.
    if model.get_or_null("card").is_sensitive() {
        model.remove("card");
    }

    let stdout = io::stdout();
    let mut writer = ContextWriter::new(stdout.lock());
    writer.write(&model).into_diagnostic()?;

    Ok(())
}
