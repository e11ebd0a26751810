use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use super::model::*;
use super::repo::*;
use crate::catalog::{average_rating, Movie, Review};

const MOVIE_COLUMNS: &str = "id, title, genres, release_year, director, castlist, synopsis, \
     poster, backdrop, trailer, average_rating, runtime_minutes";

const REVIEW_SELECT: &str = "SELECT r.id, r.movieid, r.userid, COALESCE(u.username, '') AS username, \
     r.rating, r.text, r.timestamp FROM reviews r LEFT JOIN users u ON u.id = r.userid";

type TokenRow = (String, String, Option<String>, Option<String>);

pub struct SqliteRepository {
    pool: SqlitePool,
    token_cache: Arc<RwLock<HashMap<String, AccessToken>>>,
}

impl SqliteRepository {
    pub async fn new(db_path: &str) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(db_path)?.create_if_missing(true);

        // Every connection to ":memory:" opens its own database.
        let pool = if db_path.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let repo = Self {
            pool,
            token_cache: Arc::new(RwLock::new(HashMap::new())),
        };

        repo.init_schema().await?;

        info!("Database initialized at {}", db_path);

        Ok(repo)
    }

    async fn init_schema(&self) -> DbResult<()> {
        let schema = include_str!("schema.sql");
        sqlx::raw_sql(schema).execute(&self.pool).await?;
        Ok(())
    }

    pub fn start_background_tasks(self: Arc<Self>) {
        let repo_clone = Arc::clone(&self);
        tokio::spawn(async move {
            repo_clone.token_expiry_loop().await;
        });
    }

    async fn token_expiry_loop(&self) {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match self.delete_expired_tokens(Utc::now()).await {
                Ok(0) => {}
                Ok(n) => debug!("Removed {} expired access tokens", n),
                Err(e) => error!("Failed to remove expired tokens: {}", e),
            }
        }
    }

    /// Recompute a movie's average from its reviews.
    async fn update_average(tx: &mut Transaction<'_, Sqlite>, movie_id: &str) -> DbResult<()> {
        let ratings: Vec<(i64,)> = sqlx::query_as("SELECT rating FROM reviews WHERE movieid = ?")
            .bind(movie_id)
            .fetch_all(&mut **tx)
            .await?;
        let ratings: Vec<u8> = ratings
            .into_iter()
            .map(|(r,)| r.clamp(0, u8::MAX as i64) as u8)
            .collect();
        let average = average_rating(&ratings);

        sqlx::query("UPDATE movies SET average_rating = ? WHERE id = ?")
            .bind(average as f64)
            .bind(movie_id)
            .execute(&mut **tx)
            .await?;
        debug!(movie = movie_id, average = average, "Average rating updated");
        Ok(())
    }
}

fn not_found(what: &str, id: &str) -> impl FnOnce(sqlx::Error) -> DbError {
    let msg = format!("{} not found: {}", what, id);
    move |e| match e {
        sqlx::Error::RowNotFound => DbError::NotFound(msg),
        _ => DbError::Sqlx(e),
    }
}

fn parse_time(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

fn token_from_row(r: TokenRow) -> AccessToken {
    AccessToken {
        token: r.0,
        userid: r.1,
        created: parse_time(r.2),
        expires: parse_time(r.3),
    }
}

fn movie_from_row(row: MovieRow) -> DbResult<Movie> {
    Ok(Movie {
        id: row.id,
        title: row.title,
        genres: serde_json::from_str(&row.genres).map_err(|e| DbError::Corrupt("genres", e))?,
        release_year: row.release_year as i32,
        director: row.director,
        cast: serde_json::from_str(&row.castlist).map_err(|e| DbError::Corrupt("castlist", e))?,
        synopsis: row.synopsis,
        poster: row.poster,
        backdrop: row.backdrop,
        trailer: row.trailer,
        average_rating: row.average_rating as f32,
        runtime_minutes: row.runtime_minutes.max(0) as u32,
    })
}

fn review_from_row(row: ReviewRow) -> Review {
    Review {
        id: row.id,
        movie_id: row.movieid,
        user_id: row.userid,
        username: row.username,
        rating: row.rating.clamp(0, u8::MAX as i64) as u8,
        text: row.text,
        timestamp: row.timestamp,
    }
}

#[async_trait]
impl UserRepo for SqliteRepository {
    async fn get_user(&self, username: &str) -> DbResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, email, password, is_admin, created FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("User", username))
    }

    async fn get_user_by_id(&self, id: &str) -> DbResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, email, password, is_admin, created FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("User", id))
    }

    async fn get_user_by_email(&self, email: &str) -> DbResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, email, password, is_admin, created FROM users WHERE email = ? COLLATE NOCASE",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("User", email))
    }

    async fn create_user(&self, user: &User) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO users (id, username, email, password, is_admin, created) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.is_admin)
        .bind(&user.created)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                DbError::AlreadyExists("Username or email already exists".to_string())
            }
            _ => DbError::Sqlx(e),
        })?;
        Ok(())
    }
}

#[async_trait]
impl AccessTokenRepo for SqliteRepository {
    async fn get_token(&self, token: &str) -> DbResult<AccessToken> {
        {
            let cache = self.token_cache.read().await;
            if let Some(t) = cache.get(token) {
                return Ok(t.clone());
            }
        }

        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT token, userid, created, expires FROM accesstokens WHERE token = ?",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("Token", token))?;

        let access_token = token_from_row(row);

        let mut cache = self.token_cache.write().await;
        cache.insert(token.to_string(), access_token.clone());

        Ok(access_token)
    }

    async fn upsert_token(&self, token: &AccessToken) -> DbResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO accesstokens (token, userid, created, expires) VALUES (?, ?, ?, ?)",
        )
        .bind(&token.token)
        .bind(&token.userid)
        .bind(token.created.as_ref().map(|dt| dt.to_rfc3339()))
        .bind(token.expires.as_ref().map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        let mut cache = self.token_cache.write().await;
        cache.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn delete_token(&self, token: &str) -> DbResult<()> {
        {
            let mut cache = self.token_cache.write().await;
            cache.remove(token);
        }

        sqlx::query("DELETE FROM accesstokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let rows = sqlx::query_as::<_, TokenRow>(
            "SELECT token, userid, created, expires FROM accesstokens WHERE expires IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        let expired: Vec<AccessToken> = rows
            .into_iter()
            .map(token_from_row)
            .filter(|t| t.is_expired(now))
            .collect();

        for token in &expired {
            self.delete_token(&token.token).await?;
        }
        Ok(expired.len() as u64)
    }
}

#[async_trait]
impl MovieRepo for SqliteRepository {
    async fn list_movies(&self) -> DbResult<Vec<Movie>> {
        let rows = sqlx::query_as::<_, MovieRow>(&format!(
            "SELECT {} FROM movies ORDER BY rowid",
            MOVIE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(movie_from_row).collect()
    }

    async fn get_movie(&self, id: &str) -> DbResult<Movie> {
        let row = sqlx::query_as::<_, MovieRow>(&format!(
            "SELECT {} FROM movies WHERE id = ?",
            MOVIE_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("Movie", id))?;

        movie_from_row(row)
    }

    async fn upsert_movie(&self, movie: &Movie) -> DbResult<()> {
        let genres = serde_json::to_string(&movie.genres).map_err(|e| DbError::Corrupt("genres", e))?;
        let cast = serde_json::to_string(&movie.cast).map_err(|e| DbError::Corrupt("castlist", e))?;

        // ON CONFLICT keeps the rowid, and with it the listing order.
        sqlx::query(&format!(
            "INSERT INTO movies ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                genres = excluded.genres,
                release_year = excluded.release_year,
                director = excluded.director,
                castlist = excluded.castlist,
                synopsis = excluded.synopsis,
                poster = excluded.poster,
                backdrop = excluded.backdrop,
                trailer = excluded.trailer,
                average_rating = excluded.average_rating,
                runtime_minutes = excluded.runtime_minutes",
            MOVIE_COLUMNS
        ))
        .bind(&movie.id)
        .bind(&movie.title)
        .bind(genres)
        .bind(movie.release_year as i64)
        .bind(&movie.director)
        .bind(cast)
        .bind(&movie.synopsis)
        .bind(&movie.poster)
        .bind(&movie.backdrop)
        .bind(&movie.trailer)
        .bind(movie.average_rating as f64)
        .bind(movie.runtime_minutes as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_movie(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM movies WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Movie not found: {}", id)));
        }

        sqlx::query("DELETE FROM reviews WHERE movieid = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM watchlist WHERE movieid = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn count_movies(&self) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movies")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl ReviewRepo for SqliteRepository {
    async fn get_review(&self, id: &str) -> DbResult<Review> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!("{} WHERE r.id = ?", REVIEW_SELECT))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found("Review", id))?;
        Ok(review_from_row(row))
    }

    async fn list_reviews_by_movie(&self, movie_id: &str) -> DbResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "{} WHERE r.movieid = ? ORDER BY r.timestamp, r.rowid",
            REVIEW_SELECT
        ))
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(review_from_row).collect())
    }

    async fn list_reviews_by_user(&self, user_id: &str) -> DbResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "{} WHERE r.userid = ? ORDER BY r.timestamp, r.rowid",
            REVIEW_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(review_from_row).collect())
    }

    async fn upsert_review(&self, review: &Review) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT OR REPLACE INTO reviews (id, movieid, userid, rating, text, timestamp) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&review.id)
        .bind(&review.movie_id)
        .bind(&review.user_id)
        .bind(review.rating as i64)
        .bind(&review.text)
        .bind(&review.timestamp)
        .execute(&mut *tx)
        .await?;

        Self::update_average(&mut tx, &review.movie_id).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_review(&self, id: &str) -> DbResult<()> {
        let review = self.get_review(id).await?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        Self::update_average(&mut tx, &review.movie_id).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl WatchlistRepo for SqliteRepository {
    async fn get_watchlist(&self, user_id: &str) -> DbResult<Vec<String>> {
        let results = sqlx::query_as::<_, (String,)>(
            "SELECT movieid FROM watchlist WHERE userid = ? ORDER BY rowid",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(results.into_iter().map(|(id,)| id).collect())
    }

    async fn add_to_watchlist(&self, user_id: &str, movie_id: &str) -> DbResult<()> {
        sqlx::query("INSERT OR IGNORE INTO watchlist (userid, movieid, added) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(movie_id)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_from_watchlist(&self, user_id: &str, movie_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM watchlist WHERE userid = ? AND movieid = ?")
            .bind(user_id)
            .bind(movie_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::seed_movies;

    async fn repo() -> SqliteRepository {
        SqliteRepository::new("sqlite::memory:").await.unwrap()
    }

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.to_string(),
            username: name.to_string(),
            email: format!("{}@example.com", name),
            password: "x".to_string(),
            is_admin: false,
            created: Some(Utc::now().to_rfc3339()),
        }
    }

    fn review(id: &str, movie: &str, user: &str, rating: u8) -> Review {
        Review {
            id: id.to_string(),
            movie_id: movie.to_string(),
            user_id: user.to_string(),
            username: String::new(),
            rating,
            text: "ok".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_users_are_unique() {
        let repo = repo().await;
        repo.create_user(&user("1", "ada")).await.unwrap();
        assert!(matches!(
            repo.create_user(&user("2", "ada")).await,
            Err(DbError::AlreadyExists(_))
        ));
        assert_eq!(repo.get_user_by_email("ADA@example.com").await.unwrap().id, "1");
        assert!(matches!(repo.get_user("bob").await, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_movies_keep_order_and_lists() {
        let repo = repo().await;
        for movie in seed_movies() {
            repo.upsert_movie(&movie).await.unwrap();
        }
        let mut first = seed_movies().remove(0);
        first.title = "Interstellar (IMAX)".to_string();
        repo.upsert_movie(&first).await.unwrap();

        let movies = repo.list_movies().await.unwrap();
        assert_eq!(movies.len(), 5);
        assert_eq!(movies[0].title, "Interstellar (IMAX)");
        assert_eq!(movies[0].genres, vec!["Sci-Fi", "Drama", "Adventure"]);
        assert_eq!(movies[4].cast[0], "Timothée Chalamet");

        repo.delete_movie("2").await.unwrap();
        assert_eq!(repo.count_movies().await.unwrap(), 4);
        assert!(matches!(repo.delete_movie("2").await, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reviews_update_average() {
        let repo = repo().await;
        repo.upsert_movie(&seed_movies()[0]).await.unwrap();
        repo.create_user(&user("u1", "ada")).await.unwrap();

        repo.upsert_review(&review("r1", "1", "u1", 5)).await.unwrap();
        repo.upsert_review(&review("r2", "1", "u2", 2)).await.unwrap();
        assert_eq!(repo.get_movie("1").await.unwrap().average_rating, 3.5);

        let reviews = repo.list_reviews_by_movie("1").await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].username, "ada");

        repo.upsert_review(&review("r2", "1", "u2", 4)).await.unwrap();
        assert_eq!(repo.get_movie("1").await.unwrap().average_rating, 4.5);

        repo.delete_review("r1").await.unwrap();
        repo.delete_review("r2").await.unwrap();
        assert_eq!(repo.get_movie("1").await.unwrap().average_rating, 0.0);
    }

    #[tokio::test]
    async fn test_watchlist() {
        let repo = repo().await;
        repo.add_to_watchlist("u1", "3").await.unwrap();
        repo.add_to_watchlist("u1", "3").await.unwrap();
        repo.add_to_watchlist("u1", "5").await.unwrap();
        assert_eq!(repo.get_watchlist("u1").await.unwrap(), vec!["3", "5"]);

        repo.remove_from_watchlist("u1", "3").await.unwrap();
        assert_eq!(repo.get_watchlist("u1").await.unwrap(), vec!["5"]);
        assert!(repo.get_watchlist("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_tokens_are_removed() {
        let repo = repo().await;
        let now = Utc::now();
        let token = |t: &str, hours: i64| AccessToken {
            token: t.to_string(),
            userid: "u1".to_string(),
            created: Some(now),
            expires: Some(now + chrono::Duration::hours(hours)),
        };
        repo.upsert_token(&token("old", -1)).await.unwrap();
        repo.upsert_token(&token("new", 1)).await.unwrap();

        assert_eq!(repo.delete_expired_tokens(now).await.unwrap(), 1);
        assert!(matches!(repo.get_token("old").await, Err(DbError::NotFound(_))));
        assert_eq!(repo.get_token("new").await.unwrap().userid, "u1");
    }
}
