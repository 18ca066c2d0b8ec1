//! Vakaru Pixel CLI
//!
//! Replays storefront events through the pixel pipeline.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vakaru_pixel::{
    collector::{track_navigation, ChannelSource, PageSignal, SourceEvent, StorefrontEvent, Subscriptions},
    config::Config,
    diagnostics::DeliveryLog,
    identity::{FileStore, IdentityStore, USER_ID_KEY},
    sink::{ExportSink, IngestionSink, LogSink},
    PageEnvironment, Pixel, COLLECTION_DECLARATION, VERSION,
};

#[derive(Parser)]
#[command(name = "vakaru-pixel")]
#[command(author = "Vakaru")]
#[command(version = VERSION)]
#[command(about = "Storefront event pixel: buffers, batches and ships interaction telemetry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SinkKind {
    /// Log the ingestion call instead of sending it
    Log,
    /// Append batches to a JSON-lines file under the export path
    Export,
    /// POST batches to the ingestion endpoint (requires gateway feature)
    Gateway,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay JSON-lines storefront events through the pixel
    Start {
        /// Input file (reads stdin when omitted)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Where flushed batches go
        #[arg(long, value_enum, default_value = "log")]
        sink: SinkKind,

        /// Override the flush threshold
        #[arg(long)]
        buffer_size: Option<usize>,

        /// Override the flush interval in milliseconds
        #[arg(long)]
        flush_interval_ms: Option<u64>,

        /// Storefront account id
        #[arg(long)]
        account_id: Option<String>,

        /// Initial page URL
        #[arg(long, default_value = "about:blank")]
        page_url: String,
    },

    /// Record a synthetic event, flush it and print statistics
    Test,

    /// Show identity and cumulative delivery statistics
    Status,

    /// List the storefront events the pixel subscribes to
    Events,

    /// Show configuration
    Config,

    /// Forget the persisted user id
    ResetIdentity,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start {
            input,
            sink,
            buffer_size,
            flush_interval_ms,
            account_id,
            page_url,
        } => cmd_start(
            input,
            sink,
            buffer_size,
            flush_interval_ms,
            account_id,
            page_url,
        ),
        Commands::Test => cmd_test(),
        Commands::Status => {
            cmd_status();
            Ok(())
        }
        Commands::Events => {
            cmd_events();
            Ok(())
        }
        Commands::Config => {
            cmd_config();
            Ok(())
        }
        Commands::ResetIdentity => cmd_reset_identity(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Handles the sink kinds need after the pixel is gone.
struct BuiltSink {
    sink: Arc<dyn IngestionSink>,
    #[cfg(feature = "gateway")]
    gateway: Option<Arc<vakaru_pixel::GatewaySink>>,
}

impl BuiltSink {
    fn plain(sink: Arc<dyn IngestionSink>) -> Self {
        Self {
            sink,
            #[cfg(feature = "gateway")]
            gateway: None,
        }
    }

    /// Give in-flight requests a moment before exit.
    fn drain(&self) {
        #[cfg(feature = "gateway")]
        if let Some(ref gateway) = self.gateway {
            if !gateway.wait_idle(Duration::from_secs(5)) {
                eprintln!(
                    "Warning: {} batch request(s) still in flight at exit",
                    gateway.in_flight()
                );
            }
        }
    }
}

fn build_sink(kind: SinkKind, config: &Config) -> anyhow::Result<BuiltSink> {
    match kind {
        SinkKind::Log => Ok(BuiltSink::plain(Arc::new(LogSink::new(&config.endpoint)))),
        SinkKind::Export => {
            let sink = ExportSink::new(&config.export_path);
            println!("  Exporting batches to {:?}", sink.path());
            Ok(BuiltSink::plain(Arc::new(sink)))
        }
        #[cfg(feature = "gateway")]
        SinkKind::Gateway => {
            let gateway = Arc::new(
                vakaru_pixel::GatewaySink::new(vakaru_pixel::GatewayConfig::new(&config.endpoint))
                    .map_err(|e| anyhow::anyhow!("{e}"))?,
            );
            println!("  Posting batches to {}", gateway.endpoint());
            Ok(BuiltSink {
                sink: gateway.clone(),
                gateway: Some(gateway),
            })
        }
        #[cfg(not(feature = "gateway"))]
        SinkKind::Gateway => {
            eprintln!("Warning: gateway sink unavailable (gateway feature not enabled at compile time)");
            eprintln!("Falling back to the log sink.");
            Ok(BuiltSink::plain(Arc::new(LogSink::new(&config.endpoint))))
        }
    }
}

fn cmd_start(
    input: Option<PathBuf>,
    sink_kind: SinkKind,
    buffer_size: Option<usize>,
    flush_interval_ms: Option<u64>,
    account_id: Option<String>,
    page_url: String,
) -> anyhow::Result<()> {
    println!("Vakaru Pixel v{VERSION}");
    println!();

    let mut config = Config::load().context("loading configuration")?;
    if let Some(size) = buffer_size {
        config.buffer_size = size;
    }
    if let Some(ms) = flush_interval_ms {
        config.flush_interval = Duration::from_millis(ms);
    }
    if account_id.is_some() {
        config.account_id = account_id;
    }
    config.validate()?;
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("Starting pixel...");
    println!("  Buffer size: {}", config.buffer_size);
    println!("  Flush interval: {}ms", config.flush_interval.as_millis());
    let built = build_sink(sink_kind, &config)?;

    let reader: Box<dyn BufRead + Send> = match input {
        Some(ref path) => Box::new(std::io::BufReader::new(
            std::fs::File::open(path).with_context(|| format!("opening {path:?}"))?,
        )),
        None => Box::new(std::io::BufReader::new(std::io::stdin())),
    };

    let environment = Arc::new(PageEnvironment::local());
    environment.navigate(page_url);
    let store = FileStore::new(config.identity_path());
    let delivery_log = DeliveryLog::with_persistence(config.delivery_log_path()).shared();

    let pixel = Pixel::start_with_log(
        &config,
        &store,
        environment.clone(),
        built.sink.clone(),
        delivery_log.clone(),
    );
    println!("  Session ID: {}", pixel.session().session_id);
    println!("  User ID: {}", pixel.session().user_id);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let mut subscriptions = Subscriptions::new();
    track_navigation(&mut subscriptions, environment);
    pixel.subscribe(&mut subscriptions);

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let (receiver, reader_handle) = ChannelSource::new().spawn_reader(reader)?;

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(SourceEvent::Storefront(raw)) => {
                if subscriptions.publish(&raw) == 0 {
                    tracing::debug!(name = %raw.name, "Ignoring unsubscribed event");
                }
            }
            Ok(SourceEvent::Signal(signal)) => {
                pixel.handle_signal(signal);
                if signal == PageSignal::Unload {
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    println!();
    println!("Stopping pixel...");

    pixel.teardown();
    let stats = pixel.stats();
    drop(pixel);
    built.drain();

    // A reader blocked on stdin is left behind; the process is exiting.
    if reader_handle.is_finished() {
        if let Ok(forwarded) = reader_handle.join() {
            println!("Read {forwarded} events from input");
        }
    }

    if let Err(e) = delivery_log.save() {
        eprintln!("Warning: Could not save delivery log: {e}");
    }

    println!();
    println!("Session Statistics:");
    println!("  Total events: {}", stats.total_events);
    println!("  Session duration: {}", stats.session_duration_label());
    for count in stats.top_events(config.top_events) {
        println!("  {count}");
    }
    println!();
    println!("{}", delivery_log.summary());
    Ok(())
}

fn cmd_test() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    let store = FileStore::new(config.identity_path());
    let environment = Arc::new(PageEnvironment::local());
    let pixel = Pixel::start(
        &config,
        &store,
        environment,
        Arc::new(LogSink::new(&config.endpoint)),
    );

    let diagnostics = pixel.diagnostics();
    diagnostics.test();
    let outcome = diagnostics.flush();

    println!("Session: {}", diagnostics.session_id());
    println!("Flushed: {} events", outcome.events());
    println!(
        "{}",
        serde_json::to_string_pretty(&diagnostics.stats()).unwrap_or_else(|_| "Error".to_string())
    );

    pixel.shutdown();
    Ok(())
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("Vakaru Pixel Status");
    println!("===================");
    println!();

    let store = FileStore::new(config.identity_path());
    match store.get(USER_ID_KEY) {
        Ok(Some(user_id)) => println!("User ID: {user_id}"),
        Ok(None) => println!("User ID: not yet assigned"),
        Err(e) => println!("User ID: unavailable ({e})"),
    }
    println!();

    println!("Configuration:");
    println!("  Buffer size: {}", config.buffer_size);
    println!("  Flush interval: {}ms", config.flush_interval.as_millis());
    println!("  Source: {}", config.source);
    println!("  Endpoint: {}", config.endpoint);
    println!();

    let stats_path = config.delivery_log_path();
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                for key in [
                    "records_accepted",
                    "records_failed",
                    "batches_flushed",
                    "events_flushed",
                    "batches_dropped",
                ] {
                    if let Some(value) = stats.get(key) {
                        println!("  {}: {value}", key.replace('_', " "));
                    }
                }
            }
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_events() {
    println!("{COLLECTION_DECLARATION}");
    println!("Subscribed storefront events:");
    for event in StorefrontEvent::ALL {
        println!("  {event}");
    }
    println!();
    println!("Page signals: page_hidden, page_visible, page_unload");
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

fn cmd_reset_identity() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    let store = FileStore::new(config.identity_path());
    let removed = store.remove(USER_ID_KEY).map_err(|e| anyhow::anyhow!("{e}"))?;
    if removed {
        println!("User ID cleared. A new one is assigned on next start.");
    } else {
        println!("No user ID stored.");
    }
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")
}
