//! sensmon_service binary.
//!
//! # Environment Variables
//!
//! - `SENSMON_CONFIG`: TOML config file (default: sensmon.toml)
//! - `HOST`, `PORT`: bind address (default: 0.0.0.0:10000)
//! - `SENSMON_SOURCE_URL`, `SENSMON_DATA_DIR`, `SENSMON_REFRESH_SECS`
//! - `SENSMON_LOG_LEVEL`, `SENSMON_LOG_FILE`
//! - `RUST_LOG`: overrides the configured log level

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use sensmon_service::config::{ServiceConfig, SourceMode};
use sensmon_service::dev_mode::ReplayExtractor;
use sensmon_service::http::{AppState, create_router};
use sensmon_service::ingest::Extractor;
use sensmon_service::ingest::iriseup::SensorPageExtractor;
use sensmon_service::logging::{self, Component};
use sensmon_service::refresh::{RefreshLoop, RefreshMonitor};
use sensmon_service::registry::CategoryRegistry;
use sensmon_service::store::SnapshotStore;

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = ServiceConfig::from_env().context("loading configuration")?;

    logging::init_logger(
        config.log_level(),
        config.logging.file.as_deref(),
        config.logging.timestamps,
    )
    .map_err(|e| anyhow::anyhow!(e))
    .context("installing logger")?;

    logging::info(Component::System, None, "Starting sensor network monitoring service");

    let registry = match &config.registry_file {
        Some(path) => CategoryRegistry::load(path)
            .with_context(|| format!("loading registry from {}", path.display()))?,
        None => CategoryRegistry::default(),
    };
    logging::info(
        Component::System,
        None,
        &format!("Registry: {} expected sensors", registry.total_expected()),
    );
    let registry = Arc::new(registry);

    let store = Arc::new(SnapshotStore::open(config.store_paths()));
    logging::info(
        Component::System,
        None,
        &format!("Persisting snapshots to {}", store.paths().snapshot.display()),
    );
    let monitor = Arc::new(RefreshMonitor::new());

    // The blocking HTTP client must be built outside any tokio runtime.
    let extractor: Box<dyn Extractor> = match config.source.mode {
        SourceMode::Live => Box::new(
            SensorPageExtractor::new(
                config.timeout(),
                config.retry_config(),
                config.source.user_agent.as_deref(),
            )
            .context("building HTTP client")?,
        ),
        SourceMode::Replay => {
            let replay = ReplayExtractor::new(
                config
                    .source
                    .replay_file
                    .clone()
                    .context("replay mode without source.replay_file")?,
            );
            logging::info(
                Component::System,
                None,
                &format!("Replay mode: rows from {}", replay.path().display()),
            );
            Box::new(replay)
        }
    };

    let mut refresh = RefreshLoop::new(
        extractor,
        config.source.url.clone(),
        Arc::clone(&registry),
        Arc::clone(&store),
        Arc::clone(&monitor),
    );

    // A failed bootstrap is already logged; the API starts regardless.
    let bootstrap = refresh.bootstrap();

    let worker = refresh
        .spawn(config.refresh_interval(), bootstrap.run_immediately())
        .context("starting refresh worker")?;

    let state = AppState::new(Arc::clone(&store), Arc::clone(&monitor), config.max_snapshot_age());
    let app = create_router(state);
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_address()))?;

    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    let served = runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {}", addr))?;
        logging::info(Component::Api, None, &format!("Server listening on http://{}", addr));
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("serving HTTP")
    });

    logging::info(Component::System, None, "Stopping refresh worker");
    worker.shutdown();
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        logging::error(Component::System, None, &format!("Ctrl-C handler failed: {}", e));
        std::future::pending::<()>().await;
    }
    logging::info(Component::System, None, "Shutdown requested");
}
