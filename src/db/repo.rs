use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::*;
use crate::catalog::{Movie, Review};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_user(&self, username: &str) -> DbResult<User>;
    async fn get_user_by_id(&self, id: &str) -> DbResult<User>;
    async fn get_user_by_email(&self, email: &str) -> DbResult<User>;
    /// Fails with `AlreadyExists` when the username or email is taken.
    async fn create_user(&self, user: &User) -> DbResult<()>;
}

#[async_trait]
pub trait AccessTokenRepo: Send + Sync {
    async fn get_token(&self, token: &str) -> DbResult<AccessToken>;
    async fn upsert_token(&self, token: &AccessToken) -> DbResult<()>;
    async fn delete_token(&self, token: &str) -> DbResult<()>;
    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> DbResult<u64>;
}

#[async_trait]
pub trait MovieRepo: Send + Sync {
    /// All movies in insertion order.
    async fn list_movies(&self) -> DbResult<Vec<Movie>>;
    async fn get_movie(&self, id: &str) -> DbResult<Movie>;
    async fn upsert_movie(&self, movie: &Movie) -> DbResult<()>;
    async fn delete_movie(&self, id: &str) -> DbResult<()>;
    async fn count_movies(&self) -> DbResult<i64>;
}

/// Adding, editing or deleting a review recomputes the movie's average.
#[async_trait]
pub trait ReviewRepo: Send + Sync {
    async fn get_review(&self, id: &str) -> DbResult<Review>;
    async fn list_reviews_by_movie(&self, movie_id: &str) -> DbResult<Vec<Review>>;
    async fn list_reviews_by_user(&self, user_id: &str) -> DbResult<Vec<Review>>;
    async fn upsert_review(&self, review: &Review) -> DbResult<()>;
    async fn delete_review(&self, id: &str) -> DbResult<()>;
}

#[async_trait]
pub trait WatchlistRepo: Send + Sync {
    async fn get_watchlist(&self, user_id: &str) -> DbResult<Vec<String>>;
    /// Adding a movie that is already listed is not an error.
    async fn add_to_watchlist(&self, user_id: &str, movie_id: &str) -> DbResult<()>;
    async fn remove_from_watchlist(&self, user_id: &str, movie_id: &str) -> DbResult<()>;
}

pub trait Repository:
    UserRepo + AccessTokenRepo + MovieRepo + ReviewRepo + WatchlistRepo + Send + Sync
{
}

impl<T> Repository for T where
    T: UserRepo + AccessTokenRepo + MovieRepo + ReviewRepo + WatchlistRepo + Send + Sync
{
}
