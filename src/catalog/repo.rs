use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::movie::{validate_review_rating, Movie, NewMovie, Review, ValidationError};
use super::seed::seed_movies;
use super::source::LocalSource;
use crate::db::{DbError, MovieRepo, ReviewRepo, SqliteRepository};

/// The movie catalog: persisted in the database, served from memory.
/// Every write goes to the database first and is then mirrored into the
/// in-memory source that discovery runs against.
pub struct CatalogRepo {
    db: Arc<SqliteRepository>,
    source: Arc<LocalSource>,
}

impl CatalogRepo {
    /// Load all movies, seeding an empty database first when asked to.
    pub async fn load(
        db: Arc<SqliteRepository>,
        seed: bool,
        page_size: usize,
    ) -> Result<Self, CatalogError> {
        if seed && db.count_movies().await? == 0 {
            let movies = seed_movies();
            info!("Seeding empty catalog with {} movies", movies.len());
            for movie in &movies {
                db.upsert_movie(movie).await?;
            }
        }

        let movies = db.list_movies().await?;
        info!("Loaded {} movies", movies.len());

        Ok(Self {
            db,
            source: Arc::new(LocalSource::new(movies).with_page_size(page_size)),
        })
    }

    pub fn source(&self) -> Arc<LocalSource> {
        Arc::clone(&self.source)
    }

    pub fn snapshot(&self) -> Arc<Vec<Movie>> {
        self.source.snapshot()
    }

    pub fn get_movie(&self, id: &str) -> Result<Movie, CatalogError> {
        self.source
            .get(id)
            .ok_or_else(|| CatalogError::NotFound(format!("Movie not found: {}", id)))
    }

    pub async fn add_movie(&self, new_movie: NewMovie) -> Result<Movie, CatalogError> {
        new_movie.validate()?;
        let movie = new_movie.into_movie(uuid::Uuid::new_v4().to_string());
        self.db.upsert_movie(&movie).await?;
        self.source.upsert(movie.clone());
        info!(id = %movie.id, title = %movie.title, "Movie added");
        Ok(movie)
    }

    pub async fn delete_movie(&self, id: &str) -> Result<(), CatalogError> {
        self.db.delete_movie(id).await?;
        self.source.remove(id);
        info!(id = id, "Movie deleted");
        Ok(())
    }

    pub async fn list_reviews(&self, movie_id: &str) -> Result<Vec<Review>, CatalogError> {
        self.get_movie(movie_id)?;
        Ok(self.db.list_reviews_by_movie(movie_id).await?)
    }

    pub async fn get_review(&self, id: &str) -> Result<Review, CatalogError> {
        Ok(self.db.get_review(id).await?)
    }

    pub async fn add_review(
        &self,
        movie_id: &str,
        user_id: &str,
        username: &str,
        rating: u8,
        text: &str,
    ) -> Result<Review, CatalogError> {
        validate_review_rating(rating)?;
        self.get_movie(movie_id)?;

        let review = Review {
            id: uuid::Uuid::new_v4().to_string(),
            movie_id: movie_id.to_string(),
            user_id: user_id.to_string(),
            username: username.to_string(),
            rating,
            text: text.trim().to_string(),
            timestamp: Utc::now().to_rfc3339(),
        };
        self.db.upsert_review(&review).await?;
        self.refresh_movie(movie_id).await?;
        Ok(review)
    }

    pub async fn update_review(
        &self,
        mut review: Review,
        rating: u8,
        text: &str,
    ) -> Result<Review, CatalogError> {
        validate_review_rating(rating)?;
        review.rating = rating;
        review.text = text.trim().to_string();
        self.db.upsert_review(&review).await?;
        self.refresh_movie(&review.movie_id).await?;
        Ok(review)
    }

    pub async fn delete_review(&self, review: &Review) -> Result<(), CatalogError> {
        self.db.delete_review(&review.id).await?;
        self.refresh_movie(&review.movie_id).await
    }

    /// Pick up a recomputed average rating.
    async fn refresh_movie(&self, id: &str) -> Result<(), CatalogError> {
        match self.db.get_movie(id).await {
            Ok(movie) => self.source.upsert(movie),
            Err(DbError::NotFound(_)) => {
                self.source.remove(id);
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0}")]
    Invalid(#[from] ValidationError),
    #[error("{0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Db(DbError),
}

impl From<DbError> for CatalogError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(msg) => CatalogError::NotFound(msg),
            e => CatalogError::Db(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn catalog(seed: bool) -> CatalogRepo {
        let db = Arc::new(SqliteRepository::new("sqlite::memory:").await.unwrap());
        CatalogRepo::load(db, seed, 12).await.unwrap()
    }

    #[tokio::test]
    async fn test_seeds_empty_database_once() {
        let seeded = catalog(true).await;
        assert_eq!(seeded.snapshot().len(), 5);

        let again = CatalogRepo::load(Arc::clone(&seeded.db), true, 12).await.unwrap();
        assert_eq!(again.snapshot().len(), 5);

        assert!(catalog(false).await.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_reviews_move_average_in_memory() {
        let catalog = catalog(true).await;
        catalog.add_review("5", "u1", "ada", 1, "meh").await.unwrap();
        let review = catalog.add_review("5", "u2", "bob", 4, " fine ").await.unwrap();
        assert_eq!(review.text, "fine");
        assert_eq!(catalog.get_movie("5").unwrap().average_rating, 2.5);

        let review = catalog.update_review(review, 5, "great").await.unwrap();
        assert_eq!(catalog.get_movie("5").unwrap().average_rating, 3.0);

        catalog.delete_review(&review).await.unwrap();
        assert_eq!(catalog.get_movie("5").unwrap().average_rating, 1.0);
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let catalog = catalog(true).await;
        assert!(matches!(
            catalog.add_review("5", "u1", "ada", 6, "").await,
            Err(CatalogError::Invalid(ValidationError::ReviewRating(6)))
        ));
        assert!(matches!(
            catalog.add_review("nope", "u1", "ada", 3, "").await,
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            catalog.delete_movie("nope").await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_and_delete_movie() {
        let catalog = catalog(false).await;
        let new_movie: NewMovie = serde_json::from_value(serde_json::json!({
            "title": "Heat",
            "releaseYear": 1995,
            "genres": ["Crime"],
            "runtimeMinutes": 170
        }))
        .unwrap();
        let movie = catalog.add_movie(new_movie).await.unwrap();
        assert_eq!(catalog.source().genres(), vec!["Crime"]);

        catalog.delete_movie(&movie.id).await.unwrap();
        assert!(catalog.snapshot().is_empty());
    }
}
