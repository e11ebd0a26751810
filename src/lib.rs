pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod discovery;
pub mod middleware;
pub mod server;
pub mod session;
pub mod util;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower::Layer;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] db::DbError),
    #[error("Catalog error: {0}")]
    Catalog(#[from] catalog::CatalogError),
    #[error("Server error: {0}")]
    Server(String),
}

pub async fn run(config_path: &str, debug_logs: bool) -> Result<(), ServerError> {
    let mut config = config::Config::from_file(config_path)?;
    config.debug_logs = debug_logs;

    info!("Using config file: {}", config_path);
    if debug_logs {
        info!("Debug logging enabled");
    }

    let db_path = config
        .get_database_path()
        .ok_or_else(|| ServerError::Server("No database path configured".to_string()))?;

    info!("Opening database at {}", db_path);
    let db = Arc::new(db::SqliteRepository::new(&db_path).await?);

    db.clone().start_background_tasks();

    let catalog = Arc::new(
        catalog::CatalogRepo::load(db.clone(), config.seed, config.discovery.page_size).await?,
    );

    let tmdb = if config.tmdb.is_configured() {
        match catalog::TmdbClient::new(config.tmdb.clone()) {
            Ok(client) => {
                info!("TMDB enabled at {}", config.tmdb.base_url);
                Some(Arc::new(client))
            }
            Err(e) => {
                warn!("TMDB disabled: {}", e);
                None
            }
        }
    } else {
        info!("TMDB not configured, remote discovery disabled");
        None
    };

    let address = config.listen.address.as_deref().unwrap_or("[::]");
    let port = &config.listen.port;
    let addr: SocketAddr = format!("{}:{}", address, port)
        .parse()
        .map_err(|e| ServerError::Server(format!("Invalid address: {}", e)))?;

    let tls = config.listen.tlscert.clone().zip(config.listen.tlskey.clone());

    let state = server::AppState::new(config, db, catalog, tmdb);
    let router = server::build_router(state);
    // Path normalization has to happen before routing.
    let app = Router::new()
        .fallback_service(axum::middleware::from_fn(middleware::normalize_path).layer(router));

    if let Some((cert_path, key_path)) = tls {
        info!("Loading TLS certificate from {}", cert_path);
        info!("Loading TLS key from {}", key_path);

        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert_path, &key_path)
            .await
            .map_err(|e| ServerError::Server(format!("Failed to load TLS config: {}", e)))?;

        info!("Serving HTTPS on {}", addr);

        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await
            .map_err(|e| ServerError::Server(format!("Server error: {}", e)))?;
    } else {
        info!("Serving HTTP on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Server(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, app.into_make_service())
            .await
            .map_err(|e| ServerError::Server(format!("Server error: {}", e)))?;
    }

    Ok(())
}
