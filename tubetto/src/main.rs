use std::sync::Arc;

use media_extractor::{YtDlpConfig, YtDlpExtractor};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tubetto::api::{ApiServer, AppState};
use tubetto::cache::DEFAULT_SWEEP_INTERVAL;
use tubetto::config::AppConfig;
use tubetto::database::{self, SqlxCatalogRepository};
use tubetto::logging::init_logging;
use tubetto::proxy::StreamProxy;
use tubetto::resolver::{MetadataCache, StreamResolver};
use tubetto::utils::http_client::install_rustls_provider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();

    // Keep the guard alive so buffered file output is flushed on exit
    let (logging_config, _log_guard) = init_logging(&config.log_dir)?;

    install_rustls_provider();

    // Initialize database
    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;
    let catalog = Arc::new(SqlxCatalogRepository::new(pool));

    let extractor = YtDlpExtractor::new(YtDlpConfig {
        binary_path: config.ytdlp_path.clone(),
        extra_args: config.ytdlp_extra_args.clone(),
        timeout: config.extractor_timeout,
        ..Default::default()
    });
    match extractor.version().await {
        Ok(version) => info!(version = %version, "yt-dlp available"),
        Err(e) => warn!(error = %e, path = %config.ytdlp_path, "yt-dlp not usable, extraction will fail"),
    }

    let cache = Arc::new(MetadataCache::with_max_entries(config.cache_max_entries));
    let resolver = Arc::new(
        StreamResolver::new(Arc::new(extractor), cache.clone())
            .with_ttls(config.cache_ttls)
            .with_channel_listing_limit(config.channel_scan_limit),
    );
    let proxy = StreamProxy::with_timeout(config.upstream_timeout)
        .allow_private_upstreams(config.allow_private_upstreams);

    let state = AppState::new(resolver, proxy, catalog).with_logging_config(logging_config.clone());
    let sync = state.sync.clone();

    let cancel_token = CancellationToken::new();
    let server = ApiServer::with_state(config.server.clone(), state)
        .with_cancel_token(cancel_token.clone());

    let mut tasks = vec![
        cache.spawn_sweeper(DEFAULT_SWEEP_INTERVAL, cancel_token.clone()),
        logging_config.start_retention_cleanup(cancel_token.clone()),
    ];
    if let Some(interval) = config.sync_interval {
        info!(interval_secs = interval.as_secs(), "Periodic metadata sync enabled");
        tasks.push(sync.spawn_periodic(interval, cancel_token.clone()));
    }

    let shutdown = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        shutdown.cancel();
    });

    info!("tubetto initialized successfully");
    server.run().await?;

    cancel_token.cancel();
    for task in tasks {
        let _ = task.await;
    }

    Ok(())
}
