//! portgate: admission-controlled TCP gateway.
//!
//! ```text
//! parse flags → load config → logging → credentials → resolver
//!     → dialer + ForwardHandler → signals → listen_and_serve → drain → exit
//! ```

use clap::Parser;

use portgate::auth::Credentials;
use portgate::cli::Cli;
use portgate::config::ObservabilityConfig;
use portgate::dns::NameResolver;
use portgate::lifecycle::{Readiness, ReadyState, Shutdown, TerminationSignals};
use portgate::net::{Dialer, DialerConfig};
use portgate::observability::{logging, metrics};
use portgate::server::{ForwardHandler, Params, Server};
use portgate::version::version_info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", version_info());
        return Ok(());
    }

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            let _ = logging::init_logging(&ObservabilityConfig::default());
            tracing::error!(error = %e, "invalid configuration");
            return Err(e.into());
        }
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = %version_info(), "portgate starting");

    let credentials = Credentials::load(config.auth.file.as_deref(), &config.auth.allowed_roots)?;
    if credentials.requires_auth() {
        tracing::warn!("credentials loaded but forward mode does not authenticate clients");
    }

    let resolver = NameResolver::new(config.dns.server.as_deref(), config.timeouts.dns())?;

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let upstream = config
        .upstream
        .address
        .clone()
        .ok_or("upstream address is required")?;
    let dialer = Dialer::new(DialerConfig::from(&config), resolver);
    let server = Server::new(ForwardHandler::new(dialer, upstream));
    let params = Params::from(&config);

    tracing::info!(
        address = %params.addr,
        max_connections = params.connections,
        idle_timeout = ?params.idle_timeout,
        upstream = server.handler().upstream(),
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    let stop = shutdown.signalled();
    let mut signals = TerminationSignals::install()?;
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        let signal = signals.recv().await;
        tracing::info!(signal, "taken signal");
        trigger.trigger();
    });

    let readiness = Readiness::new();
    let announce = readiness.clone();
    tokio::spawn(async move {
        if let ReadyState::Listening(addr) = announce.wait().await {
            tracing::info!(address = %addr, "Listening for connections");
        }
    });

    server
        .listen_and_serve(&params, &readiness, stop)
        .await?;

    tracing::info!("server stopped");
    Ok(())
}
