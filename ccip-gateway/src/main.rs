use std::panic;
use std::sync::Arc;

use anyhow::ensure;
use anyhow::Context;
use backtrace::Backtrace;
use ccip_gateway::config::Config;
use ccip_gateway::handlers;
use ccip_gateway::server;
use ccip_gateway::Gateway;
use ccip_resolver::LookupResolver;
use clap::Parser;
use mimalloc::MiMalloc;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing::span;
use tracing::warn;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Clone, Debug)]
struct Cli {
    /// Path to the configuration file.
    #[clap(short, long)]
    config: Option<String>,

    /// If set, output logs in JSON format.
    #[clap(short, long, action)]
    json: bool,
}

fn setup_logging(json: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if json {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_env_filter(env_filter)
            .with_span_events(FmtSpan::CLOSE)
            .finish();
        tracing::subscriber::set_global_default(subscriber).context("Setting up logging failed")
    } else {
        let subscriber = tracing_subscriber::fmt()
            .pretty()
            .compact()
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_env_filter(env_filter)
            .with_span_events(FmtSpan::CLOSE)
            .finish();
        tracing::subscriber::set_global_default(subscriber).context("Setting up logging failed")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.json)?;

    panic::set_hook(Box::new(|panic_info| {
        let msg = match panic_info.payload().downcast_ref::<&'static str>() {
            Some(s) => *s,
            None => {
                match panic_info.payload().downcast_ref::<String>() {
                    Some(s) => &s[..],
                    None => "Box<dyn Any>",
                }
            },
        };
        let (file, lineno, col) = match panic_info.location() {
            Some(l) => (l.file(), l.line(), l.column()),
            None => ("<unknown>", 0, 0),
        };

        error!(
            msg,
            file,
            lineno,
            col,
            "Panic occurred: {:?}",
            Backtrace::new(),
        );
    }));

    run(cli).await.inspect_err(|err| {
        error!("Gateway exited due to an error: {err:?}");
    })
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    info!("Starting gateway. version: {}", version);

    let config = Config::load(cli.config)?;
    config.validate().context("invalid configuration")?;
    debug!("Loaded configuration: {:?}", config);

    let span = span!(Level::INFO, "gateway", "version" = version);
    let _guard = span.enter();

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.prometheus.port))
        .install()
        .context("setting up Prometheus")?;

    let resolver = LookupResolver::new(config.lookup.request_timeout())
        .context("building the lookup HTTP client")?;
    let dispatcher = handlers::dispatcher(resolver).context("registering handlers")?;
    ensure!(!dispatcher.is_empty(), "no handler registered");
    info!("Handlers registered. count: {}", dispatcher.len());

    let policy = config.gateway.sender_policy();
    if config.gateway.supported_senders.is_empty() {
        warn!("No supported senders configured, accepting any sender");
    } else {
        info!(
            "Restricting senders. supported: {:?}",
            config.gateway.supported_senders
        );
    }

    let gateway = Arc::new(Gateway::new(dispatcher, policy));
    let addr = config.server.socket_addr()?;

    let (addr, server) = warp::serve(server::routes(gateway))
        .try_bind_with_graceful_shutdown(addr, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Shutting down");
        })
        .context("binding the gateway server")?;

    info!("Gateway listening. addr: {}", addr);
    server.await;

    Ok(())
}
