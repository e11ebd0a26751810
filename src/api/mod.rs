pub mod auth;
pub mod error;
pub mod movies;
pub mod reviews;
pub mod tmdb;
pub mod types;
pub mod watchlist;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

pub use auth::AuthUser;
pub use error::{ApiError, ApiResult};

use crate::server::AppState;

pub fn build_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/movies", get(movies::list_movies).post(movies::create_movie))
        .route("/api/movies/genres", get(movies::list_genres))
        .route(
            "/api/movies/:id",
            get(movies::get_movie).delete(movies::delete_movie),
        )
        .route(
            "/api/movies/:id/reviews",
            get(reviews::list_movie_reviews).post(reviews::create_review),
        )
        .route(
            "/api/reviews/:id",
            put(reviews::update_review).delete(reviews::delete_review),
        )
        .route("/api/users/:id/reviews", get(reviews::list_user_reviews))
        .route(
            "/api/users/:id/watchlist",
            get(watchlist::get_watchlist).post(watchlist::add_to_watchlist),
        )
        .route(
            "/api/users/:id/watchlist/:movie_id",
            delete(watchlist::remove_from_watchlist),
        )
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/tmdb/movies", get(tmdb::list_movies))
        .route("/api/tmdb/movies/:id", get(tmdb::get_movie))
        .layer(axum::middleware::from_fn_with_state(
            state,
            auth::auth_middleware,
        ))
}
