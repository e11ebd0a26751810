use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::auth::AuthUser;
use super::error::{ApiError, ApiResult};
use super::types::ReviewRequest;
use crate::catalog::Review;
use crate::db::ReviewRepo;
use crate::server::AppState;

pub async fn list_movie_reviews(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> ApiResult<Json<Vec<Review>>> {
    Ok(Json(state.catalog.list_reviews(&movie_id).await?))
}

pub async fn list_user_reviews(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<Review>>> {
    Ok(Json(state.db.list_reviews_by_user(&user_id).await?))
}

pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(movie_id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    let review = state
        .catalog
        .add_review(&movie_id, &user.id, &user.username, req.rating, &req.text)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn update_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> ApiResult<Json<Review>> {
    let review = own_review(&state, &user, &id).await?;
    Ok(Json(
        state.catalog.update_review(review, req.rating, &req.text).await?,
    ))
}

pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let review = own_review(&state, &user, &id).await?;
    state.catalog.delete_review(&review).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn own_review(state: &AppState, user: &AuthUser, id: &str) -> ApiResult<Review> {
    let review = state.catalog.get_review(id).await?;
    if review.user_id != user.id {
        return Err(ApiError::Forbidden("Reviews can only be changed by their author"));
    }
    Ok(review)
}
