use serde::{Deserialize, Serialize};

/// Upper bound of the star scale used for ratings throughout the crate.
pub const MAX_RATING: f32 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub genres: Vec<String>,
    pub release_year: i32,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub cast: Vec<String>,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backdrop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailer: Option<String>,
    #[serde(default)]
    pub average_rating: f32,
    #[serde(default)]
    pub runtime_minutes: u32,
}

impl Movie {
    pub fn has_genre(&self, genre: &str) -> bool {
        self.genres.iter().any(|g| g == genre)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub movie_id: String,
    pub user_id: String,
    pub username: String,
    pub rating: u8,
    pub text: String,
    pub timestamp: String,
}

/// Payload for creating a movie through the admin API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMovie {
    pub title: String,
    #[serde(default)]
    pub genres: Vec<String>,
    pub release_year: i32,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub cast: Vec<String>,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub backdrop: Option<String>,
    #[serde(default)]
    pub trailer: Option<String>,
    #[serde(default)]
    pub runtime_minutes: u32,
}

impl NewMovie {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if !(1870..=2100).contains(&self.release_year) {
            return Err(ValidationError::ReleaseYear(self.release_year));
        }
        if self.genres.iter().any(|g| g.trim().is_empty()) {
            return Err(ValidationError::EmptyGenre);
        }
        Ok(())
    }

    pub fn into_movie(self, id: String) -> Movie {
        Movie {
            id,
            title: self.title.trim().to_string(),
            genres: self.genres.into_iter().map(|g| g.trim().to_string()).collect(),
            release_year: self.release_year,
            director: self.director,
            cast: self.cast,
            synopsis: self.synopsis,
            poster: self.poster,
            backdrop: self.backdrop,
            trailer: self.trailer,
            average_rating: 0.0,
            runtime_minutes: self.runtime_minutes,
        }
    }
}

/// Reviews are whole stars from 1 to 5.
pub fn validate_review_rating(rating: u8) -> Result<(), ValidationError> {
    if (1..=MAX_RATING as u8).contains(&rating) {
        Ok(())
    } else {
        Err(ValidationError::ReviewRating(rating))
    }
}

/// Mean of the given star ratings rounded to one decimal, 0 when empty.
pub fn average_rating(ratings: &[u8]) -> f32 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: u32 = ratings.iter().map(|r| *r as u32).sum();
    let avg = sum as f32 / ratings.len() as f32;
    (avg * 10.0).round() / 10.0
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("title is required")]
    MissingTitle,
    #[error("release year {0} is out of range")]
    ReleaseYear(i32),
    #[error("genre names must not be empty")]
    EmptyGenre,
    #[error("review rating {0} must be between 1 and 5")]
    ReviewRating(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_movie(title: &str) -> NewMovie {
        NewMovie {
            title: title.to_string(),
            genres: vec!["Drama".to_string()],
            release_year: 1999,
            director: String::new(),
            cast: vec![],
            synopsis: String::new(),
            poster: None,
            backdrop: None,
            trailer: None,
            runtime_minutes: 120,
        }
    }

    #[test]
    fn test_validate_new_movie() {
        assert!(new_movie("Magnolia").validate().is_ok());
        assert!(matches!(
            new_movie("  ").validate(),
            Err(ValidationError::MissingTitle)
        ));

        let mut m = new_movie("Future");
        m.release_year = 3000;
        assert!(matches!(m.validate(), Err(ValidationError::ReleaseYear(3000))));
    }

    #[test]
    fn test_average_rating() {
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(average_rating(&[5, 4]), 4.5);
        assert_eq!(average_rating(&[5, 4, 4]), 4.3);
    }

    #[test]
    fn test_review_rating_bounds() {
        assert!(validate_review_rating(0).is_err());
        assert!(validate_review_rating(1).is_ok());
        assert!(validate_review_rating(5).is_ok());
        assert!(validate_review_rating(6).is_err());
    }
}
