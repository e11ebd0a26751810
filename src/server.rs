use axum::{extract::Request, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::catalog::{CatalogRepo, TmdbClient};
use crate::config::Config;
use crate::db::SqliteRepository;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<SqliteRepository>,
    pub catalog: Arc<CatalogRepo>,
    /// Absent when no TMDB credentials are configured.
    pub tmdb: Option<Arc<TmdbClient>>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Arc<SqliteRepository>,
        catalog: Arc<CatalogRepo>,
        tmdb: Option<Arc<TmdbClient>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            db,
            catalog,
            tmdb,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let api_routes = crate::api::build_api_router(state.clone());

    let mut router = Router::new()
        .route("/robots.txt", get(robots_txt_handler))
        .route("/health", get(health_handler))
        .merge(api_routes)
        .fallback(fallback_handler);

    if let Some(ref appdir) = state.config.appdir {
        // The frontend is a single-page app; unknown paths get index.html.
        let index = std::path::Path::new(appdir).join("index.html");
        router = router.fallback_service(
            ServeDir::new(appdir).fallback(tower_http::services::ServeFile::new(index)),
        );
    }

    router
        .layer(axum::middleware::from_fn(crate::middleware::log_request))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn robots_txt_handler() -> &'static str {
    "User-agent: *\nDisallow: /api/\n"
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn fallback_handler(req: Request<axum::body::Body>) -> impl IntoResponse {
    if req.method() == axum::http::Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    StatusCode::NOT_FOUND.into_response()
}
