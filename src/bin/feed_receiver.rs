/// Feed receiver - joins one or more multicast groups and reports the
/// decoded tick stream, latency, rate and sequence gaps.

use clap::Parser;
use market_feed_sim::protocol::unix_micros;
use market_feed_sim::transport::RECV_BUFFER_SIZE;
use market_feed_sim::{FeedMonitor, MulticastReceiver, SimulatorConfig};
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "feed-receiver")]
#[command(about = "Receive and decode synthetic market-data ticks")]
struct Cli {
    /// Group to join as ip:port; repeatable. Defaults to every configured feed.
    #[arg(long = "group")]
    groups: Vec<SocketAddrV4>,

    /// TOML config file used when no --group is given
    #[arg(long)]
    config: Option<PathBuf>,

    /// Local interface used to join
    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    interface: Ipv4Addr,

    /// Stop each receiver after this many datagrams
    #[arg(long)]
    max_messages: Option<u64>,

    /// Rate report interval in messages
    #[arg(long, default_value_t = 100)]
    report_every: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("market_feed_sim=info,feed_receiver=info")),
        )
        .init();

    let cli = Cli::parse();

    let targets: Vec<(String, SocketAddrV4)> = if cli.groups.is_empty() {
        let config = match &cli.config {
            Some(path) => SimulatorConfig::from_file(path)?,
            None => SimulatorConfig::default(),
        };
        config
            .feeds
            .iter()
            .map(|f| (f.name.clone(), SocketAddrV4::new(f.group, f.port)))
            .collect()
    } else {
        cli.groups.iter().map(|g| (g.to_string(), *g)).collect()
    };

    let handles: Vec<_> = targets
        .into_iter()
        .map(|(label, group)| {
            let interface = cli.interface;
            let max_messages = cli.max_messages;
            let report_every = cli.report_every;
            thread::spawn(move || {
                if let Err(e) = listen(&label, group, interface, max_messages, report_every) {
                    error!(feed = %label, "receiver error: {}", e);
                }
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            error!("receiver thread panicked");
        }
    }
    Ok(())
}

fn listen(
    label: &str,
    group: SocketAddrV4,
    interface: Ipv4Addr,
    max_messages: Option<u64>,
    report_every: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let receiver = MulticastReceiver::join(*group.ip(), group.port(), interface)?;
    receiver.set_read_timeout(Some(Duration::from_secs(1)))?;
    let mut monitor = FeedMonitor::with_report_interval(label, report_every);
    let mut buf = [0u8; RECV_BUFFER_SIZE];

    let local = receiver.local_addr()?;
    info!(feed = %label, %local, "listening on {}", receiver.group());
    loop {
        match receiver.recv(&mut buf) {
            Ok(n) => {
                // decode failures are logged by the monitor
                let _ = monitor.observe(&buf[..n], unix_micros());
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(e) => {
                monitor.log_summary();
                return Err(e.into());
            }
        }

        if max_messages.is_some_and(|max| monitor.stats().total_messages() >= max) {
            break;
        }
    }

    monitor.log_summary();
    Ok(())
}
