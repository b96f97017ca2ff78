//! Ping/pong throughput harness entry point

use anyhow::Result;
use clap::Parser;
use courier_config::{expand_env, resolve_config_path};
use courier_pingpong::{bench, BenchConfig, Mode, Style, Verdict};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONFIG_PATH_ENV: &str = "COURIER_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "pingpong.toml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (TOML); `$VAR` references are expanded.
    /// Falls back to `$COURIER_CONFIG`, then `pingpong.toml` if present.
    #[arg(short, long)]
    config: Option<String>,

    /// Pings per round across all clients
    #[arg(long)]
    repeat: Option<u64>,

    /// Client/destination pairs
    #[arg(long)]
    clients: Option<usize>,

    /// Where destinations live
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// How actor methods move onto their context
    #[arg(long, value_enum)]
    style: Option<Style>,

    /// Hard cap on rounds
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "courier_pingpong=info,warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn config_path(&self) -> Result<Option<PathBuf>> {
        match &self.config {
            Some(path) => Ok(Some(PathBuf::from(expand_env(path)?))),
            None => Ok(resolve_config_path(CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE)),
        }
    }

    fn apply(&self, config: &mut BenchConfig) {
        if let Some(repeat) = self.repeat {
            config.repeat = repeat;
        }
        if let Some(clients) = self.clients {
            config.clients = clients;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(style) = self.style {
            config.style = style;
        }
        if let Some(max_rounds) = self.max_rounds {
            config.max_rounds = max_rounds;
        }
    }
}

fn init_logging(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if args.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let config_path = args.config_path()?;
    let mut config = BenchConfig::load(config_path.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    info!(
        repeat = config.repeat,
        clients = config.clients,
        mode = ?config.mode,
        style = ?config.style,
        "Starting ping/pong harness"
    );

    println!("Actor count, Messages/sec");
    let tracker = bench::run(&config, |report, verdict| {
        let marker = match verdict {
            Verdict::Improved => "",
            Verdict::Red => " (red)",
        };
        println!("{}, {}{}", report.clients * 2, report.throughput, marker);
    })
    .await?;

    info!(
        rounds = tracker.rounds(),
        best = tracker.best(),
        "Harness finished"
    );
    Ok(())
}
