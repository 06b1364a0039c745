mod framework;
mod server;

use clap::{Parser, Subcommand};
use framework::analyzers::{CorrelationAnalyzer, FileLogger, OutputAnalyzer, CORRELATOR_SOURCE};
use framework::core::{
    CollectorConfig, Environment, FrameworkError, RelayConfig, TabId, DEFAULT_RESOURCE_TYPES,
};
use framework::correlator::Correlator;
use framework::dispatcher::{Dispatcher, HttpTransport};
use framework::filter::ResourceFilter;
use framework::pending::{FileStore, MemoryStore, PendingStore};
use framework::resolver::BodyFetcher;
use framework::runners::{FakeRunner, ReplayRunner, Runner};
use futures::stream::StreamExt;
use log::info;
use server::CollectorServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

type MainError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "tabrelay")]
#[command(about = "Relays selected browser-tab request/response pairs to a collector")]
#[command(version)]
struct Cli {
    /// Deployment environment; picks the default collector URL
    #[arg(long = "env", value_enum, default_value_t = Environment::Local, global = true)]
    environment: Environment,

    /// Collector base URL, overriding the environment default
    #[arg(long, global = true)]
    collector_url: Option<String>,

    /// Bearer token sent to (or required by) the collector
    #[arg(long, env = "TABRELAY_AUTH_TOKEN", hide_env_values = true, global = true)]
    auth_token: Option<String>,

    /// Collector request timeout in milliseconds
    #[arg(long, default_value_t = 10_000, global = true)]
    timeout_ms: u64,

    /// Resource type to relay (repeatable, default: Fetch and XHR)
    #[arg(long = "resource-type", global = true)]
    resource_types: Vec<String>,

    /// Keep pending requests on disk under this directory
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Evict pending requests that saw no dispatched response within this many seconds
    #[arg(long, global = true)]
    pending_ttl_secs: Option<u64>,

    /// Append every dispatched record to this JSONL file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Do not print dispatched records
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print dispatched records as JSON events
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded JSONL traffic capture
    Replay {
        /// Capture file
        file: PathBuf,
        /// Tab to correlate (repeatable; all tabs in the capture by default)
        #[arg(long = "tab")]
        tabs: Vec<TabId>,
    },
    /// Relay simulated traffic for one tab
    Fake {
        #[arg(long, default_value_t = 1)]
        tab: TabId,
        /// Request/response pairs to generate
        #[arg(long, default_value_t = 5)]
        count: usize,
        /// Delay between pairs in milliseconds
        #[arg(long, default_value_t = 100)]
        delay_ms: u64,
    },
    /// Run a local development collector
    Serve {
        #[arg(long, default_value = "127.0.0.1:8787")]
        bind: SocketAddr,
    },
}

impl Cli {
    fn relay_config(&self) -> RelayConfig {
        let mut collector = CollectorConfig::for_environment(self.environment);
        if let Some(url) = &self.collector_url {
            collector.base_url = url.clone();
        }
        collector.auth_token = self.auth_token.clone();
        collector.timeout = Duration::from_millis(self.timeout_ms);

        let resource_types = if self.resource_types.is_empty() {
            DEFAULT_RESOURCE_TYPES.iter().map(|t| t.to_string()).collect()
        } else {
            self.resource_types.clone()
        };

        RelayConfig {
            collector,
            resource_types,
            store_dir: self.store_dir.clone(),
            pending_ttl: self.pending_ttl_secs.map(Duration::from_secs),
        }
    }
}

fn build_dispatcher(config: &RelayConfig) -> Result<Dispatcher, FrameworkError> {
    config.validate()?;
    let transport = HttpTransport::new(&config.collector)?;
    info!("Relaying to {}", transport.endpoint());
    Ok(Dispatcher::new(Arc::new(transport)))
}

/// Build the correlation analyzer for one tab
async fn tab_analyzer(
    tab_id: TabId,
    config: &RelayConfig,
    fetcher: Arc<dyn BodyFetcher>,
    dispatcher: Dispatcher,
) -> Result<CorrelationAnalyzer, FrameworkError> {
    let store: Arc<dyn PendingStore> = match &config.store_dir {
        Some(root) => {
            let store = FileStore::for_tab(root, tab_id).await?;
            info!("Tab {}: pending requests kept in {}", tab_id, store.dir().display());
            Arc::new(store)
        }
        None => Arc::new(MemoryStore::new()),
    };

    let filter = ResourceFilter::new(config.resource_types.iter().cloned());
    info!(
        "Tab {}: relaying {} with a {} pending store",
        tab_id,
        filter.allowed().join(", "),
        store.name()
    );
    let correlator = Correlator::new(tab_id, filter, store, fetcher, dispatcher);
    let analyzer = CorrelationAnalyzer::new(correlator);
    Ok(match config.pending_ttl {
        Some(ttl) => analyzer.with_pending_ttl(ttl),
        None => analyzer,
    })
}

fn add_sinks<R: Runner>(mut runner: R, cli: &Cli) -> Result<R, MainError> {
    if let Some(path) = &cli.log_file {
        runner = runner.add_analyzer(Box::new(FileLogger::new(path)?));
    }
    if !cli.quiet {
        runner = runner.add_analyzer(Box::new(OutputAnalyzer::new_with_options(true, cli.json)));
    }
    Ok(runner)
}

async fn drain<R: Runner>(mut runner: R) -> Result<(), MainError> {
    info!("Starting {} runner {}", runner.name(), runner.id());
    let mut stream = runner.run().await?;

    let mut dispatched = 0usize;
    while let Some(event) = stream.next().await {
        if event.source == CORRELATOR_SOURCE {
            dispatched += 1;
        }
    }

    info!("{} runner finished: {} records dispatched", runner.name(), dispatched);
    Ok(())
}

async fn serve(bind: SocketAddr, config: &RelayConfig) -> Result<(), FrameworkError> {
    let server = CollectorServer::new(config.collector.auth_token.clone());
    if config.collector.auth_token.is_none() {
        info!("Collector accepts unauthenticated events");
    }
    server.start(bind).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = cli.relay_config();

    match &cli.command {
        Commands::Serve { bind } => serve(*bind, &config).await?,
        Commands::Replay { file, tabs } => {
            let dispatcher = build_dispatcher(&config)?;

            let mut runner = ReplayRunner::new(file);
            runner.load().await?;
            let tabs = if tabs.is_empty() { runner.tab_ids() } else { tabs.clone() };
            let fetcher: Arc<dyn BodyFetcher> = Arc::new(runner.fetcher());

            for tab_id in tabs {
                let analyzer =
                    tab_analyzer(tab_id, &config, Arc::clone(&fetcher), dispatcher.clone()).await?;
                runner = runner.add_analyzer(Box::new(analyzer));
            }
            drain(add_sinks(runner, &cli)?).await?;
        }
        Commands::Fake { tab, count, delay_ms } => {
            let dispatcher = build_dispatcher(&config)?;

            let runner = FakeRunner::new().tab_id(*tab).event_count(*count).delay_ms(*delay_ms);
            let fetcher: Arc<dyn BodyFetcher> = Arc::new(runner.fetcher());
            let analyzer = tab_analyzer(*tab, &config, fetcher, dispatcher).await?;
            let runner = runner.add_analyzer(Box::new(analyzer));
            drain(add_sinks(runner, &cli)?).await?;
        }
    }

    Ok(())
}
