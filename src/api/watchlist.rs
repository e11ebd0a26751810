use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::auth::AuthUser;
use super::error::{ApiError, ApiResult};
use super::types::WatchlistRequest;
use crate::catalog::Movie;
use crate::db::WatchlistRepo;
use crate::server::AppState;

fn require_self(user: &AuthUser, user_id: &str) -> ApiResult<()> {
    if user.id == user_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Watchlists can only be changed by their owner"))
    }
}

/// The listed movies, in the order they were added. Entries whose movie
/// was deleted are left out.
pub async fn get_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<Movie>>> {
    require_self(&user, &user_id)?;
    let ids = state.db.get_watchlist(&user_id).await?;
    let movies = ids
        .iter()
        .filter_map(|id| state.catalog.get_movie(id).ok())
        .collect();
    Ok(Json(movies))
}

pub async fn add_to_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<String>,
    Json(req): Json<WatchlistRequest>,
) -> ApiResult<(StatusCode, Json<Vec<String>>)> {
    require_self(&user, &user_id)?;
    state.catalog.get_movie(&req.movie_id)?;
    state.db.add_to_watchlist(&user_id, &req.movie_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(state.db.get_watchlist(&user_id).await?),
    ))
}

pub async fn remove_from_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
    Path((user_id, movie_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<String>>> {
    require_self(&user, &user_id)?;
    state.db.remove_from_watchlist(&user_id, &movie_id).await?;
    Ok(Json(state.db.get_watchlist(&user_id).await?))
}
