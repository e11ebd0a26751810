use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::auth::AuthUser;
use super::error::{ApiError, ApiResult};
use super::types::MovieListResponse;
use crate::catalog::{Movie, NewMovie, GENRES};
use crate::discovery::{self, sync, Criteria};
use crate::server::AppState;
use crate::util::QueryParams;

const MAX_LIMIT: usize = 100;

/// Page size from `limit`, or the configured default.
pub(super) fn page_size(state: &AppState, params: &QueryParams) -> ApiResult<usize> {
    match params.get_nonempty("limit") {
        None => Ok(state.config.discovery.page_size.max(1)),
        Some(limit) => limit
            .parse::<usize>()
            .ok()
            .filter(|l| (1..=MAX_LIMIT).contains(l))
            .ok_or_else(|| {
                ApiError::BadRequest(format!("limit must be between 1 and {}", MAX_LIMIT))
            }),
    }
}

/// Shareable query string for the criteria as applied.
pub(super) fn canonical_query(criteria: &Criteria, page: u32) -> String {
    let applied = Criteria {
        page,
        ..criteria.clone()
    };
    sync::to_query_string(&sync::encode(&applied))
}

pub async fn list_movies(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<MovieListResponse>> {
    let criteria = Criteria::from_params_strict(&params)?;
    let page_size = page_size(&state, &params)?;

    let result = discovery::discover(
        &state.catalog.snapshot(),
        &criteria,
        page_size,
        discovery::current_year(),
    );
    let query = canonical_query(&criteria, result.page);
    Ok(Json(MovieListResponse::new(result, query)))
}

/// The fixed genre list plus any genre a catalog movie carries.
pub async fn list_genres(State(state): State<AppState>) -> Json<Vec<String>> {
    let mut genres: Vec<String> = GENRES.iter().map(|g| g.to_string()).collect();
    genres.extend(state.catalog.source().genres());
    genres.sort();
    genres.dedup();
    Json(genres)
}

pub async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Movie>> {
    Ok(Json(state.catalog.get_movie(&id)?))
}

pub async fn create_movie(
    State(state): State<AppState>,
    user: AuthUser,
    Json(new_movie): Json<NewMovie>,
) -> ApiResult<(StatusCode, Json<Movie>)> {
    user.require_admin()?;
    let movie = state.catalog.add_movie(new_movie).await?;
    Ok((StatusCode::CREATED, Json(movie)))
}

pub async fn delete_movie(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;
    state.catalog.delete_movie(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
