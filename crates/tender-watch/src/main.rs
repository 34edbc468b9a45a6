//! tender-watch — run the failed-tender monitor once.

use anyhow::Context;
use clap::Parser;
use tender_watch::{MonitorConfig, Pipeline, RunResult};

#[derive(Parser)]
#[command(
    name = "tender-watch",
    about = "Forward failed tenders in northern Taiwan from the e-procurement portal to a webhook",
    version
)]
struct Cli {
    /// Webhook that receives each notice as a JSON POST.
    #[arg(long, env = "GAS_URL", hide_env_values = true)]
    gas_url: Option<String>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the run summary as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configuration problems end the run before any request goes out.
    let config = match MonitorConfig::resolve(cli.gas_url.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "cannot start");
            eprintln!("  Error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!("tender-watch v{}", env!("CARGO_PKG_VERSION"));
    let pipeline = Pipeline::new(&config).context("failed to build HTTP client")?;
    let result = pipeline.run().await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }
    Ok(())
}

fn print_summary(result: &RunResult) {
    println!("Periods scanned:   {}", result.periods_processed);
    for p in &result.periods {
        println!(
            "  {}  {:<16} candidates {:>4}  northern {:>4}  sent {:>4}  failed {:>4}",
            p.period,
            format!("{:?}", p.status),
            p.candidates,
            p.northern,
            p.dispatched,
            p.failed
        );
    }
    println!("Failed tenders:    {}", result.candidates);
    println!("Northern region:   {}", result.northern);
    println!("Delivered:         {}", result.dispatched);
    println!("Delivery failures: {}", result.failed);
}
