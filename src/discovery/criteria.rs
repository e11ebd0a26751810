use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::MAX_RATING;
use crate::util::QueryParams;

use super::sync::decode_genres;

/// Coarse release-date filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum YearBucket {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "recent")]
    Recent,
    #[serde(rename = "2010s")]
    Tens,
    #[serde(rename = "2000s")]
    Noughties,
    #[serde(rename = "classic")]
    Classic,
}

/// How far back `recent` reaches from the current year, inclusive.
pub const RECENT_YEARS: i32 = 3;

impl YearBucket {
    pub const ALL: [YearBucket; 5] = [
        YearBucket::All,
        YearBucket::Recent,
        YearBucket::Tens,
        YearBucket::Noughties,
        YearBucket::Classic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            YearBucket::All => "all",
            YearBucket::Recent => "recent",
            YearBucket::Tens => "2010s",
            YearBucket::Noughties => "2000s",
            YearBucket::Classic => "classic",
        }
    }

    pub fn contains(&self, year: i32, current_year: i32) -> bool {
        match self {
            YearBucket::All => true,
            YearBucket::Recent => year >= current_year - RECENT_YEARS,
            YearBucket::Tens => (2010..2020).contains(&year),
            YearBucket::Noughties => (2000..2010).contains(&year),
            YearBucket::Classic => year < 2000,
        }
    }

    /// Inclusive release-year bounds, for sources that filter server side.
    pub fn year_range(&self, current_year: i32) -> (Option<i32>, Option<i32>) {
        match self {
            YearBucket::All => (None, None),
            YearBucket::Recent => (Some(current_year - RECENT_YEARS), None),
            YearBucket::Tens => (Some(2010), Some(2019)),
            YearBucket::Noughties => (Some(2000), Some(2009)),
            YearBucket::Classic => (None, Some(1999)),
        }
    }
}

impl fmt::Display for YearBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for YearBucket {
    type Err = CriteriaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        YearBucket::ALL
            .iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| CriteriaError::InvalidYearBucket(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    #[serde(rename = "rating-desc")]
    RatingDesc,
    #[serde(rename = "year-desc")]
    YearDesc,
    #[serde(rename = "title-asc")]
    TitleAsc,
    #[serde(rename = "duration-desc")]
    DurationDesc,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        SortKey::RatingDesc,
        SortKey::YearDesc,
        SortKey::TitleAsc,
        SortKey::DurationDesc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::RatingDesc => "rating-desc",
            SortKey::YearDesc => "year-desc",
            SortKey::TitleAsc => "title-asc",
            SortKey::DurationDesc => "duration-desc",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = CriteriaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(key) = SortKey::ALL.iter().find(|k| k.as_str().eq_ignore_ascii_case(s)) {
            return Ok(*key);
        }
        // Short names used by the first version of the listing page.
        match s.to_ascii_lowercase().as_str() {
            "rating" => Ok(SortKey::RatingDesc),
            "year" => Ok(SortKey::YearDesc),
            "title" => Ok(SortKey::TitleAsc),
            "duration" => Ok(SortKey::DurationDesc),
            _ => Err(CriteriaError::InvalidSortKey(s.to_string())),
        }
    }
}

/// Validates a rating floor on the 0-5 scale.
pub fn parse_rating(s: &str) -> Result<f32, CriteriaError> {
    let value: f32 = s
        .trim()
        .parse()
        .map_err(|_| CriteriaError::InvalidRating(s.to_string()))?;
    check_rating(value)
}

fn check_rating(value: f32) -> Result<f32, CriteriaError> {
    if value.is_finite() && (0.0..=MAX_RATING).contains(&value) {
        Ok(value)
    } else {
        Err(CriteriaError::InvalidRating(value.to_string()))
    }
}

/// The complete set of user-chosen discovery parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criteria {
    pub query: String,
    pub genres: BTreeSet<String>,
    pub year_bucket: YearBucket,
    pub minimum_rating: Option<f32>,
    pub sort_key: SortKey,
    pub page: u32,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            query: String::new(),
            genres: BTreeSet::new(),
            year_bucket: YearBucket::All,
            minimum_rating: None,
            sort_key: SortKey::default(),
            page: 1,
        }
    }
}

/// A single-field mutation of [`Criteria`].
#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaUpdate {
    Query(String),
    Genres(BTreeSet<String>),
    ToggleGenre(String),
    YearBucket(YearBucket),
    MinimumRating(Option<f32>),
    SortKey(SortKey),
    Page(u32),
    /// Back to defaults, as the "Clear All" control does.
    Clear,
}

impl CriteriaUpdate {
    pub fn is_page(&self) -> bool {
        matches!(self, CriteriaUpdate::Page(_))
    }
}

impl Criteria {
    /// Applies one update. Returns whether the criteria changed.
    ///
    /// Any effective change to a field other than the page resets the
    /// page to 1. Updates that leave the value untouched are no-ops.
    pub fn apply(&mut self, update: CriteriaUpdate) -> Result<bool, CriteriaError> {
        let before = self.clone();

        match update {
            CriteriaUpdate::Query(query) => self.query = query,
            CriteriaUpdate::Genres(genres) => {
                self.genres = genres
                    .into_iter()
                    .filter(|g| !g.trim().is_empty())
                    .collect();
            }
            CriteriaUpdate::ToggleGenre(genre) => {
                if genre.trim().is_empty() {
                    return Ok(false);
                }
                if !self.genres.remove(&genre) {
                    self.genres.insert(genre);
                }
            }
            CriteriaUpdate::YearBucket(bucket) => self.year_bucket = bucket,
            CriteriaUpdate::MinimumRating(rating) => {
                self.minimum_rating = rating.map(check_rating).transpose()?;
            }
            CriteriaUpdate::SortKey(key) => self.sort_key = key,
            CriteriaUpdate::Page(page) => {
                if page == 0 {
                    return Err(CriteriaError::InvalidPage(page));
                }
                self.page = page;
                return Ok(self.page != before.page);
            }
            CriteriaUpdate::Clear => {
                *self = Criteria::default();
                return Ok(*self != before);
            }
        }

        if *self == before {
            return Ok(false);
        }
        self.page = 1;
        Ok(true)
    }

    pub fn is_default(&self) -> bool {
        *self == Criteria::default()
    }

    /// Number of active filters, sort order and page not included.
    pub fn active_filter_count(&self) -> usize {
        let mut count = self.genres.len();
        if !self.query.is_empty() {
            count += 1;
        }
        if self.year_bucket != YearBucket::All {
            count += 1;
        }
        if self.minimum_rating.is_some() {
            count += 1;
        }
        count
    }

    /// Parses request parameters, rejecting values outside the
    /// enumerations instead of falling back to defaults.
    pub fn from_params_strict(params: &QueryParams) -> Result<Self, CriteriaError> {
        let mut criteria = Criteria::default();

        if let Some(query) = params.get("query") {
            criteria.query = query.to_string();
        }
        if let Some(genres) = params.get_nonempty("genre") {
            criteria.genres = decode_genres(genres)
                .into_iter()
                .map(|g| g.trim().to_string())
                .collect();
        }
        if let Some(year) = params.get_nonempty("year") {
            criteria.year_bucket = year.parse()?;
        }
        if let Some(sort) = params.get_nonempty("sortBy") {
            criteria.sort_key = sort.parse()?;
        }
        if let Some(rating) = params.get_nonempty("rating") {
            criteria.minimum_rating = Some(parse_rating(rating)?);
        } else if let Some(vote) = params.get_nonempty("voteAverage") {
            let vote: f32 = vote
                .parse()
                .map_err(|_| CriteriaError::InvalidRating(vote.to_string()))?;
            criteria.minimum_rating = Some(check_rating(vote / 2.0)?);
        }
        if let Some(page) = params.get_nonempty("page") {
            criteria.page = page
                .parse::<u32>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| CriteriaError::InvalidPageText(page.to_string()))?;
        }

        Ok(criteria)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CriteriaError {
    #[error("Invalid year bucket: {0}")]
    InvalidYearBucket(String),
    #[error("Invalid sort key: {0}")]
    InvalidSortKey(String),
    #[error("Invalid minimum rating: {0}")]
    InvalidRating(String),
    #[error("Invalid page number: {0}")]
    InvalidPage(u32),
    #[error("Invalid page number: {0}")]
    InvalidPageText(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enumerations() {
        assert_eq!("2010s".parse::<YearBucket>().unwrap(), YearBucket::Tens);
        assert_eq!("Classic".parse::<YearBucket>().unwrap(), YearBucket::Classic);
        assert!(matches!(
            "1990s".parse::<YearBucket>(),
            Err(CriteriaError::InvalidYearBucket(_))
        ));

        assert_eq!("title-asc".parse::<SortKey>().unwrap(), SortKey::TitleAsc);
        assert_eq!("duration".parse::<SortKey>().unwrap(), SortKey::DurationDesc);
        assert!(matches!(
            "popularity.desc".parse::<SortKey>(),
            Err(CriteriaError::InvalidSortKey(_))
        ));
    }

    #[test]
    fn test_recent_bucket_boundary() {
        assert!(YearBucket::Recent.contains(2021, 2024));
        assert!(!YearBucket::Recent.contains(2020, 2024));
        assert!(YearBucket::Tens.contains(2019, 2024));
        assert!(!YearBucket::Tens.contains(2020, 2024));
        assert!(YearBucket::Classic.contains(1999, 2024));
        assert!(!YearBucket::Classic.contains(2000, 2024));
    }

    #[test]
    fn test_non_page_change_resets_page() {
        let mut criteria = Criteria {
            page: 4,
            ..Criteria::default()
        };

        assert!(criteria.apply(CriteriaUpdate::SortKey(SortKey::YearDesc)).unwrap());
        assert_eq!(criteria.page, 1);

        criteria.apply(CriteriaUpdate::Page(3)).unwrap();
        assert_eq!(criteria.page, 3);

        criteria
            .apply(CriteriaUpdate::ToggleGenre("Drama".to_string()))
            .unwrap();
        assert_eq!(criteria.page, 1);
        assert!(criteria.genres.contains("Drama"));
    }

    #[test]
    fn test_unchanged_value_keeps_page() {
        let mut criteria = Criteria {
            query: "nolan".to_string(),
            page: 2,
            ..Criteria::default()
        };
        assert!(!criteria.apply(CriteriaUpdate::Query("nolan".to_string())).unwrap());
        assert_eq!(criteria.page, 2);
    }

    #[test]
    fn test_toggle_genre_twice() {
        let mut criteria = Criteria::default();
        criteria.apply(CriteriaUpdate::ToggleGenre("Horror".to_string())).unwrap();
        criteria.apply(CriteriaUpdate::ToggleGenre("Horror".to_string())).unwrap();
        assert!(criteria.genres.is_empty());
        assert!(!criteria.apply(CriteriaUpdate::ToggleGenre(" ".to_string())).unwrap());
    }

    #[test]
    fn test_rejects_bad_rating_and_page() {
        let mut criteria = Criteria::default();
        assert!(criteria.apply(CriteriaUpdate::MinimumRating(Some(7.5))).is_err());
        assert!(criteria.apply(CriteriaUpdate::MinimumRating(Some(f32::NAN))).is_err());
        assert!(criteria.apply(CriteriaUpdate::Page(0)).is_err());
        assert!(criteria.is_default());
    }

    #[test]
    fn test_clear() {
        let mut criteria = Criteria {
            query: "dune".to_string(),
            year_bucket: YearBucket::Recent,
            page: 2,
            ..Criteria::default()
        };
        assert_eq!(criteria.active_filter_count(), 2);
        assert!(criteria.apply(CriteriaUpdate::Clear).unwrap());
        assert!(criteria.is_default());
        assert!(!criteria.apply(CriteriaUpdate::Clear).unwrap());
    }

    #[test]
    fn test_from_params_strict() {
        let params = QueryParams::from_pairs([
            ("query", "knight"),
            ("genre", "Action,Crime"),
            ("year", "2000s"),
            ("sortBy", "year-desc"),
            ("rating", "4.5"),
            ("page", "2"),
        ]);
        let criteria = Criteria::from_params_strict(&params).unwrap();
        assert_eq!(criteria.query, "knight");
        assert_eq!(criteria.genres.len(), 2);
        assert_eq!(criteria.year_bucket, YearBucket::Noughties);
        assert_eq!(criteria.sort_key, SortKey::YearDesc);
        assert_eq!(criteria.minimum_rating, Some(4.5));
        assert_eq!(criteria.page, 2);

        let bad = QueryParams::from_pairs([("year", "1980s")]);
        assert_eq!(
            Criteria::from_params_strict(&bad),
            Err(CriteriaError::InvalidYearBucket("1980s".to_string()))
        );

        let bad = QueryParams::from_pairs([("page", "0")]);
        assert!(Criteria::from_params_strict(&bad).is_err());
    }

    #[test]
    fn test_strict_genres_match_encoded_form() {
        let criteria = Criteria {
            genres: BTreeSet::from(["Film Noir".to_string(), "Action, Adventure".to_string()]),
            ..Criteria::default()
        };
        let encoded = crate::discovery::sync::encode(&criteria);
        let params = QueryParams::from_pairs([("genre", encoded["genre"].as_str())]);
        assert_eq!(Criteria::from_params_strict(&params).unwrap(), criteria);

        let plain = QueryParams::from_pairs([("genre", "Film Noir, War")]);
        let genres = Criteria::from_params_strict(&plain).unwrap().genres;
        assert_eq!(genres, BTreeSet::from(["Film Noir".to_string(), "War".to_string()]));
    }

    #[test]
    fn test_vote_average_is_halved() {
        let params = QueryParams::from_pairs([("voteAverage", "8")]);
        let criteria = Criteria::from_params_strict(&params).unwrap();
        assert_eq!(criteria.minimum_rating, Some(4.0));
    }
}
