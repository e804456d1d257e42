use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use mediagate::core::config::AppConfig;
use mediagate::core::ratelimit::RateLimiter;
use mediagate::core::redact::Redacted;
use mediagate::core::shutdown::{ShutdownCoordinator, SHUTDOWN_TIMEOUT_SECS};
use mediagate::core::signer::UrlSigner;
use mediagate::delivery::router::{self, AppState};
use mediagate::observability::metrics as obs_metrics;
use mediagate::storage::fs::LocalFileStore;
use mediagate::storage::memory::InMemoryMetadataStore;
use mediagate::views::analytics::AnalyticsAggregator;
use mediagate::views::tracker::ViewTracker;

#[tokio::main]
async fn main() -> ExitCode {
    // Install Prometheus metrics recorder before any metric is recorded.
    let metrics_handle = obs_metrics::install_prometheus_recorder();

    // Panic hook: log panics with full backtrace and increment counter.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        obs_metrics::inc_panic_total();
        let backtrace = std::backtrace::Backtrace::force_capture();
        eprintln!("PANIC: {info}\nBacktrace:\n{backtrace}");
        default_hook(info);
    }));

    // Load configuration (layered: default.toml → {env}.toml → env vars).
    // Fails fast on an empty signing secret.
    let config = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    info!(version = env!("CARGO_PKG_VERSION"), "mediagate starting");

    obs_metrics::describe_all_metrics();

    // Initialize shared components
    let shutdown = ShutdownCoordinator::new();
    let signer = match UrlSigner::new(&config.signing) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, "invalid signing configuration");
            return ExitCode::FAILURE;
        }
    };
    info!(
        secret = %Redacted::new(&config.signing.secret),
        url_ttl_secs = config.signing.url_ttl_secs,
        "url signer ready"
    );
    let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
    let store = Arc::new(InMemoryMetadataStore::new());
    let files = Arc::new(LocalFileStore::new(&config.storage.upload_dir));
    let analytics = Arc::new(AnalyticsAggregator::new(store.clone()));
    let tracker = Arc::new(ViewTracker::new(
        limiter.clone(),
        store.clone(),
        analytics.clone(),
    ));

    if let Err(e) = files.ensure_root().await {
        error!(error = %e, upload_dir = %config.storage.upload_dir, "failed to prepare upload directory");
        return ExitCode::FAILURE;
    }

    // Periodic limiter sweep keeps the window map bounded.
    let sweep_limiter = limiter.clone();
    let sweep_interval = std::time::Duration::from_secs(config.rate_limit.sweep_interval_secs);
    let sweep_cancel = shutdown.token();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sweep_cancel.cancelled() => {
                    info!("limiter sweep task shutting down");
                    return;
                }
                _ = tokio::time::sleep(sweep_interval) => {
                    sweep_limiter.sweep();
                    obs_metrics::set_rate_limiter_windows(sweep_limiter.window_count() as f64);
                }
            }
        }
    });

    // Build the HTTP router
    let start_time = std::time::Instant::now();
    let app_state = AppState {
        store,
        files,
        signer,
        tracker,
        analytics,
        config: config.clone(),
        start_time,
        metrics_handle,
    };
    let app = router::build_router(app_state, &config.security);

    // Uptime gauge task
    let uptime_cancel = shutdown.token();
    tokio::spawn(async move {
        obs_metrics::run_uptime_task(start_time, uptime_cancel).await;
    });

    let http_addr: SocketAddr = match format!("{}:{}", config.server.host, config.server.port)
        .parse()
    {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "invalid HTTP bind address");
            return ExitCode::FAILURE;
        }
    };

    let listener = match tokio::net::TcpListener::bind(http_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, %http_addr, "failed to bind HTTP listener");
            return ExitCode::FAILURE;
        }
    };

    info!(%http_addr, "HTTP server listening");

    // Run HTTP server with graceful shutdown. ConnectInfo provides the
    // peer address used as the rate-limit fallback identity.
    let shutdown_token = shutdown.token();
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown_token.cancelled().await;
        })
        .await
        {
            error!(error = %e, "HTTP server error");
        }
    });

    // Wait for SIGINT/SIGTERM
    shutdown.wait_for_signal_and_shutdown().await;

    info!("initiating graceful shutdown");
    match tokio::time::timeout(
        std::time::Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        server,
    )
    .await
    {
        Ok(_) => {
            info!("graceful shutdown completed");
            ExitCode::SUCCESS
        }
        Err(_) => {
            error!("shutdown timed out after {}s, forcing exit", SHUTDOWN_TIMEOUT_SECS);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: &str, log_format: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    match log_format {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}
