/// Market feed simulator - runs one or more multicast feeds through a
/// scripted trading session: normal, burst, normal, market closed, stop.

use clap::Parser;
use market_feed_sim::{FeedEngine, SimulatorConfig};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "feed-simulator")]
#[command(about = "Publish synthetic market-data ticks over UDP multicast")]
struct Cli {
    /// TOML config file; two demo exchanges when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only run the named feed
    #[arg(long)]
    feed: Option<String>,

    /// Override messages per second for every feed
    #[arg(long)]
    rate: Option<u32>,

    /// Fixed seed for every feed
    #[arg(long)]
    seed: Option<u64>,

    /// Seconds of normal trading before burst
    #[arg(long, default_value_t = 2)]
    warmup_secs: u64,

    /// Seconds of burst mode
    #[arg(long, default_value_t = 10)]
    burst_secs: u64,

    /// Seconds of normal trading after burst
    #[arg(long, default_value_t = 20)]
    normal_secs: u64,

    /// Seconds with the market closed before stopping
    #[arg(long, default_value_t = 5)]
    closed_secs: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("market_feed_sim=info,feed_simulator=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SimulatorConfig::from_file(path)?,
        None => SimulatorConfig::default(),
    };
    if let Some(name) = &cli.feed {
        config.feeds.retain(|f| &f.name == name);
    }
    if config.feeds.is_empty() {
        return Err("no feeds configured".into());
    }

    let mut engines = Vec::with_capacity(config.feeds.len());
    for feed in &mut config.feeds {
        if let Some(rate) = cli.rate {
            feed.engine.messages_per_second = rate;
        }
        if cli.seed.is_some() {
            feed.engine.seed = cli.seed;
        }
        engines.push(FeedEngine::from_config(feed)?);
    }

    for engine in &mut engines {
        engine.start()?;
    }
    for feed in &config.feeds {
        info!("{}: {}:{}", feed.name, feed.group, feed.port);
    }

    thread::sleep(Duration::from_secs(cli.warmup_secs));
    info!("market opening - enabling burst mode");
    engines.iter().for_each(|e| e.set_burst_mode(true));

    thread::sleep(Duration::from_secs(cli.burst_secs));
    info!("normal trading mode");
    engines.iter().for_each(|e| e.set_burst_mode(false));

    thread::sleep(Duration::from_secs(cli.normal_secs));
    info!("market closing");
    engines.iter().for_each(|e| e.set_market_open(false));

    thread::sleep(Duration::from_secs(cli.closed_secs));
    for engine in &mut engines {
        engine.stop();
        for inst in engine.instruments() {
            info!(
                feed = engine.name(),
                symbol = %inst.symbol,
                price = inst.current_price,
                volume = inst.cumulative_volume,
                ticks = inst.next_sequence() - 1,
                "final state"
            );
        }
    }

    info!("simulation complete");
    Ok(())
}
