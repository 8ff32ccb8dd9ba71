//! API server setup and configuration.

use axum::Router;
use axum::extract::Request;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::routes;
use crate::database::CatalogRepository;
use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use crate::proxy::StreamProxy;
use crate::resolver::StreamResolver;
use crate::sync::MetadataSync;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    /// Stream resolution with its metadata cache
    pub resolver: Arc<StreamResolver>,
    /// Upstream streaming proxy
    pub proxy: StreamProxy,
    /// Catalog used to authorize items and by the sync jobs
    pub catalog: Arc<dyn CatalogRepository>,
    /// Batch metadata synchronization
    pub sync: Arc<MetadataSync>,
    /// Logging configuration for dynamic log level changes
    pub logging_config: Option<Arc<LoggingConfig>>,
}

impl AppState {
    pub fn new(
        resolver: Arc<StreamResolver>,
        proxy: StreamProxy,
        catalog: Arc<dyn CatalogRepository>,
    ) -> Self {
        let sync = Arc::new(MetadataSync::new(resolver.clone(), catalog.clone()));
        Self {
            start_time: Instant::now(),
            resolver,
            proxy,
            catalog,
            sync,
            logging_config: None,
        }
    }

    /// Set the logging configuration.
    pub fn with_logging_config(mut self, config: Arc<LoggingConfig>) -> Self {
        self.logging_config = Some(config);
        self
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    /// Create with custom state.
    pub fn with_state(config: ApiServerConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token for graceful shutdown.
    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    /// Get the cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Build the router with all middleware and routes.
    pub fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone());

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any);
            router = router.layer(cors);
        }

        router = router.layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    if req.uri().path().starts_with("/health") {
                        Span::none()
                    } else {
                        let mut make_span =
                            tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO);
                        use tower_http::trace::MakeSpan;
                        make_span.make_span(req)
                    }
                })
                .on_request(|req: &Request, span: &Span| {
                    if span.is_disabled() {
                        return;
                    }
                    let mut on_request =
                        tower_http::trace::DefaultOnRequest::new().level(tracing::Level::INFO);
                    use tower_http::trace::OnRequest;
                    on_request.on_request(req, span);
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        let on_response =
                            tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO);
                        use tower_http::trace::OnResponse;
                        on_response.on_response(res, latency, span);
                    },
                )
                .on_failure(
                    |class: tower_http::classify::ServerErrorsFailureClass,
                     latency: Duration,
                     span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        let mut on_failure =
                            tower_http::trace::DefaultOnFailure::new().level(tracing::Level::ERROR);
                        use tower_http::trace::OnFailure;
                        on_failure.on_failure(class, latency, span);
                    },
                ),
        );
        router
    }

    /// Start the server and serve until the cancellation token fires.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| Error::config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("API server listening on http://{}", addr);

        let cancel_token = self.cancel_token.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down...");
            })
            .await?;

        Ok(())
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::database::InMemoryCatalog;
    use crate::proxy::DEFAULT_UPSTREAM_TIMEOUT;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::StatusCode;
    use media_extractor::media::PlaylistEntry;
    use media_extractor::{ExtractorError, MediaExtractor, MediaInfo};
    use tower::ServiceExt;

    struct UnavailableExtractor;

    #[async_trait]
    impl MediaExtractor for UnavailableExtractor {
        async fn extract(&self, item_id: &str) -> std::result::Result<MediaInfo, ExtractorError> {
            Err(ExtractorError::InvalidId(item_id.to_string()))
        }

        async fn extract_comments(
            &self,
            item_id: &str,
            _max_comments: usize,
        ) -> std::result::Result<MediaInfo, ExtractorError> {
            self.extract(item_id).await
        }

        async fn extract_channel(
            &self,
            channel_id: &str,
        ) -> std::result::Result<MediaInfo, ExtractorError> {
            self.extract(channel_id).await
        }

        async fn list_channel_entries(
            &self,
            _channel_id: &str,
            _limit: usize,
        ) -> std::result::Result<Vec<PlaylistEntry>, ExtractorError> {
            Ok(Vec::new())
        }
    }

    fn test_state() -> AppState {
        let resolver = Arc::new(StreamResolver::new(
            Arc::new(UnavailableExtractor),
            Arc::new(TtlCache::new()),
        ));
        AppState::new(
            resolver,
            StreamProxy::with_timeout(DEFAULT_UPSTREAM_TIMEOUT),
            Arc::new(InMemoryCatalog::new()),
        )
    }

    #[test]
    fn test_config_defaults() {
        let config = ApiServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert!(config.enable_cors);
    }

    #[tokio::test]
    async fn test_router_sets_cors_headers() {
        let server = ApiServer::with_state(ApiServerConfig::default(), test_state());
        let request = axum::http::Request::builder()
            .uri("/health/live")
            .header("origin", "http://player.local")
            .body(Body::empty())
            .unwrap();

        let response = server.build_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_malformed_item_id_is_bad_request() {
        let server = ApiServer::with_state(ApiServerConfig::default(), test_state());
        let request = axum::http::Request::builder()
            .uri("/api/videos/bad%20id/related")
            .body(Body::empty())
            .unwrap();

        let response = server.build_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let config = ApiServerConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            enable_cors: false,
        };
        let server = Arc::new(ApiServer::with_state(config, test_state()));
        let running = tokio::spawn({
            let server = Arc::clone(&server);
            async move { server.run().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        server.shutdown();
        assert!(server.cancel_token().is_cancelled());

        let outcome = tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_address() {
        let config = ApiServerConfig {
            bind_address: "not an address".to_string(),
            ..Default::default()
        };
        let server = ApiServer::with_state(config, test_state());
        assert!(matches!(server.run().await, Err(Error::Configuration(_))));
    }
}
