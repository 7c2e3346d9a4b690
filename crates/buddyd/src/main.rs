// # buddyd - DNS buddy daemon
//
// Keeps Cloud DNS managed zones in line with the Compute Engine instances
// of one zone or region. This binary only wires things together: every
// reconciliation rule lives in buddy-core.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering the Cloud DNS provider and the Compute Engine source
// 4. Running the periodic sync loop and the status HTTP server
//
// ## Configuration
//
// ### Google Cloud
// - `BUDDY_PROJECT`: Project owning the instances and the DNS zones (required)
// - `BUDDY_ACCESS_TOKEN`: OAuth2 bearer token for both APIs (required)
// - `BUDDY_COMPUTE_ZONE`: Compute zone to watch
// - `BUDDY_COMPUTE_REGION`: Compute region to watch (all of its zones)
// - `BUDDY_DNS_ENDPOINT`: Cloud DNS API base URL override
// - `BUDDY_COMPUTE_ENDPOINT`: Compute Engine API base URL override
//
// Exactly one of `BUDDY_COMPUTE_ZONE` and `BUDDY_COMPUTE_REGION` must be set.
//
// ### DNS
// - `BUDDY_DNS_ZONES`: Comma-separated extra managed zones to reconcile
// - `BUDDY_INTERNAL_IP_DNS_ZONE`: Default managed zone for internal IPs
// - `BUDDY_EXTERNAL_IP_DNS_ZONE`: Default managed zone for external IPs
// - `BUDDY_DNS_TTL`: TTL of managed records in seconds (default: 300)
// - `BUDDY_MULTIPLE_IP_RECORD`: Allow several IPs per name (default: true)
// - `BUDDY_LABEL_PREFIX`: Prefix of ownership labels (default: buddy)
//
// ### Daemon
// - `BUDDY_SYNC_INTERVAL_SECS`: Seconds between cycles, 0 disables (default: 15)
// - `BUDDY_HTTP_ADDR`: Status server address (default: 0.0.0.0:8080)
// - `BUDDY_LOG_LEVEL`: trace, debug, info, warn or error (default: info)
//
// ## Example
//
// ```bash
// export BUDDY_PROJECT=my-project
// export BUDDY_ACCESS_TOKEN=$(gcloud auth print-access-token)
// export BUDDY_COMPUTE_REGION=europe-west1
// export BUDDY_INTERNAL_IP_DNS_ZONE=internal-example-com
//
// buddyd
// ```

mod http;

use anyhow::{Context, Result};
use buddy_core::config::DEFAULT_LABEL_PREFIX;
use buddy_core::{
    BuddyConfig, EngineConfig, ProviderConfig, Reconciler, SourceConfig, ZonesConfig,
};
use std::env;
use std::future::Future;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

/// Upper bound on waiting for the server and the sync loop after a signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuddyExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<BuddyExitCode> for ExitCode {
    fn from(code: BuddyExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration
struct Config {
    buddy: BuddyConfig,
    http_addr: SocketAddr,
    log_level: Level,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let Some(project) = var("BUDDY_PROJECT") else {
            anyhow::bail!(
                "BUDDY_PROJECT is required. \
                Set it via: export BUDDY_PROJECT=my-project"
            );
        };
        let Some(access_token) = var("BUDDY_ACCESS_TOKEN") else {
            anyhow::bail!(
                "BUDDY_ACCESS_TOKEN is required. \
                Set it via: export BUDDY_ACCESS_TOKEN=$(gcloud auth print-access-token)"
            );
        };

        let zone = var("BUDDY_COMPUTE_ZONE");
        let region = var("BUDDY_COMPUTE_REGION");
        match (&zone, &region) {
            (None, None) => anyhow::bail!(
                "Please provide BUDDY_COMPUTE_ZONE or BUDDY_COMPUTE_REGION"
            ),
            (Some(_), Some(_)) => anyhow::bail!(
                "Please provide either BUDDY_COMPUTE_ZONE or BUDDY_COMPUTE_REGION, not both"
            ),
            _ => {}
        }

        let dns_zones = var("BUDDY_DNS_ZONES")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let dns_ttl = parse_var(&var, "BUDDY_DNS_TTL", 300u32)?;
        if dns_ttl == 0 {
            anyhow::bail!("BUDDY_DNS_TTL must be greater than 0");
        }

        let multiple_ip_record = match var("BUDDY_MULTIPLE_IP_RECORD") {
            None => true,
            Some(value) => parse_bool(&value).with_context(|| {
                format!("BUDDY_MULTIPLE_IP_RECORD '{}' is not a boolean", value)
            })?,
        };

        let zones = ZonesConfig {
            dns_zones,
            internal_ip_dns_zone: var("BUDDY_INTERNAL_IP_DNS_ZONE"),
            external_ip_dns_zone: var("BUDDY_EXTERNAL_IP_DNS_ZONE"),
            dns_ttl,
            multiple_ip_record,
            label_prefix: var("BUDDY_LABEL_PREFIX")
                .unwrap_or_else(|| DEFAULT_LABEL_PREFIX.to_string()),
        };

        let engine = EngineConfig {
            sync_interval_secs: parse_var(&var, "BUDDY_SYNC_INTERVAL_SECS", 15u64)?,
            ..EngineConfig::default()
        };

        let buddy = BuddyConfig {
            provider: ProviderConfig::CloudDns {
                project: project.clone(),
                access_token: access_token.clone(),
                endpoint: var("BUDDY_DNS_ENDPOINT"),
            },
            source: SourceConfig::ComputeEngine {
                project,
                access_token,
                zone,
                region,
                endpoint: var("BUDDY_COMPUTE_ENDPOINT"),
            },
            zones,
            engine,
        };
        buddy.validate()?;

        let http_addr = var("BUDDY_HTTP_ADDR").unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        let http_addr = http_addr
            .parse()
            .with_context(|| format!("BUDDY_HTTP_ADDR '{}' is not a socket address", http_addr))?;

        let log_level = var("BUDDY_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_level = match log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => anyhow::bail!(
                "BUDDY_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                log_level
            ),
        };

        Ok(Self {
            buddy,
            http_addr,
            log_level,
        })
    }
}

fn parse_var<F, T>(var: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .with_context(|| format!("{} '{}' is not a valid number", key, value)),
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => anyhow::bail!("expected true or false"),
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return BuddyExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return BuddyExitCode::ConfigError.into();
    }

    info!("Starting buddyd daemon");
    debug!("Configuration: {:?}", config.buddy);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return BuddyExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => BuddyExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                exit_code_for(&e)
            }
        }
    });

    code.into()
}

/// Configuration problems found at startup exit with 1, anything else with 2
fn exit_code_for(err: &anyhow::Error) -> BuddyExitCode {
    match err.downcast_ref::<buddy_core::Error>() {
        Some(e) if e.is_config() => BuddyExitCode::ConfigError,
        _ => BuddyExitCode::RuntimeError,
    }
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(config: Config) -> Result<()> {
    let registry = buddy_core::ProviderRegistry::new();

    #[cfg(feature = "clouddns")]
    {
        info!("Registering Cloud DNS provider");
        buddy_provider_clouddns::register(&registry);
    }

    #[cfg(feature = "gce")]
    {
        info!("Registering Compute Engine source");
        buddy_source_gce::register(&registry);
    }

    debug!(
        "Registered providers {:?}, sources {:?}",
        registry.list_providers(),
        registry.list_sources()
    );

    let BuddyConfig {
        provider,
        source,
        zones,
        engine,
    } = config.buddy;

    let provider = registry.create_provider(&provider)?;
    let source = registry.create_source(&source, &zones).await?;
    let (reconciler, mut events) = Reconciler::new(provider, source, &zones, &engine).await?;
    let reconciler = Arc::new(reconciler);

    info!(
        "Managing DNS zones {:?} for compute zones {:?}",
        reconciler.dns_zones(),
        reconciler.compute_zones()
    );

    // Ends once the reconciler is dropped
    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Reconciler event: {:?}", event);
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.http_addr))?;
    info!("Status server listening on {}", listener.local_addr()?);

    let app = http::router(Arc::clone(&reconciler));
    let server_shutdown = shutdown_requested(shutdown_rx.clone());
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(server_shutdown)
            .await
    });

    let sync_reconciler = Arc::clone(&reconciler);
    let sync_shutdown = shutdown_requested(shutdown_rx);
    let sync_loop = tokio::spawn(async move { sync_reconciler.run_until(sync_shutdown).await });

    let outcome = tokio::select! {
        signal = wait_for_shutdown() => signal.map(|name| info!("Received shutdown signal: {}", name)),
        result = &mut server => Err(match result {
            Ok(Ok(())) => anyhow::anyhow!("Status server stopped unexpectedly"),
            Ok(Err(e)) => anyhow::Error::new(e).context("Status server failed"),
            Err(e) => anyhow::Error::new(e).context("Status server task panicked"),
        }),
    };

    info!("Shutting down daemon");
    // Receivers also complete when the sender is gone
    drop(shutdown_tx);

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        if !server.is_finished()
            && let Ok(Err(e)) = server.await
        {
            warn!("Status server error during shutdown: {}", e);
        }
        match sync_loop.await {
            Ok(Err(e)) => warn!("Sync loop error during shutdown: {}", e),
            Err(e) => warn!("Sync loop task failed: {}", e),
            Ok(Ok(())) => {}
        }
    })
    .await;
    if drained.is_err() {
        warn!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT);
    }

    drop(reconciler);
    event_logger.abort();

    outcome
}

fn shutdown_requested(mut rx: watch::Receiver<()>) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let _ = rx.changed().await;
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
