use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::error::{ApiError, ApiResult};
use super::movies::{canonical_query, page_size};
use super::types::MovieListResponse;
use crate::catalog::PagedMovieSource;
use crate::discovery::Criteria;
use crate::server::AppState;
use crate::util::QueryParams;

/// Discovery against TMDB. Filtering, sorting and paging happen
/// remotely, so `limit` is accepted but TMDB decides the page size.
pub async fn list_movies(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<MovieListResponse>> {
    let tmdb = state.tmdb.as_ref().ok_or(ApiError::TmdbUnavailable)?;
    let mut criteria = Criteria::from_params_strict(&params)?;
    page_size(&state, &params)?;

    let mut page = tmdb.fetch_page(&criteria).await?;
    if page.total_pages > 0 && criteria.page > page.total_pages {
        criteria.page = page.total_pages;
        page = tmdb.fetch_page(&criteria).await?;
    }

    let result = page.into_result_page();
    let query = canonical_query(&criteria, result.page);
    Ok(Json(MovieListResponse::new(result, query)))
}

pub async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<serde_json::Value>> {
    let tmdb = state.tmdb.as_ref().ok_or(ApiError::TmdbUnavailable)?;
    Ok(Json(tmdb.get_movie(id).await?))
}
