use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::criteria::{parse_rating, Criteria, CriteriaError, CriteriaUpdate, SortKey, YearBucket};

pub const KEY_QUERY: &str = "query";
pub const KEY_GENRE: &str = "genre";
pub const KEY_YEAR: &str = "year";
pub const KEY_SORT: &str = "sortBy";
pub const KEY_RATING: &str = "rating";
/// Read-only alias carrying a 0-10 vote average.
pub const KEY_VOTE_AVERAGE: &str = "voteAverage";
pub const KEY_PAGE: &str = "page";

pub type Params = BTreeMap<String, String>;

/// Encode criteria into flat parameters. Fields at their default value
/// are left out, so default criteria encode to an empty map.
pub fn encode(criteria: &Criteria) -> Params {
    let mut params = Params::new();

    if !criteria.query.is_empty() {
        params.insert(KEY_QUERY.to_string(), criteria.query.clone());
    }
    if !criteria.genres.is_empty() {
        let genres: Vec<String> = criteria
            .genres
            .iter()
            .map(|g| urlencoding::encode(g).into_owned())
            .collect();
        params.insert(KEY_GENRE.to_string(), genres.join(","));
    }
    if criteria.year_bucket != YearBucket::default() {
        params.insert(KEY_YEAR.to_string(), criteria.year_bucket.to_string());
    }
    if criteria.sort_key != SortKey::default() {
        params.insert(KEY_SORT.to_string(), criteria.sort_key.to_string());
    }
    if let Some(rating) = criteria.minimum_rating {
        params.insert(KEY_RATING.to_string(), rating.to_string());
    }
    if criteria.page > 1 {
        params.insert(KEY_PAGE.to_string(), criteria.page.to_string());
    }

    params
}

/// Decode criteria from flat parameters. Missing fields take their
/// default, and values that do not parse fall back to the default too.
pub fn decode(params: &Params) -> Criteria {
    let mut criteria = Criteria::default();

    if let Some(query) = params.get(KEY_QUERY) {
        criteria.query = query.clone();
    }

    if let Some(genres) = params.get(KEY_GENRE) {
        criteria.genres = decode_genres(genres);
    }

    if let Some(year) = params.get(KEY_YEAR) {
        criteria.year_bucket = fallback(year.parse(), KEY_YEAR);
    }

    if let Some(sort) = params.get(KEY_SORT) {
        criteria.sort_key = fallback(sort.parse(), KEY_SORT);
    }

    criteria.minimum_rating = match (params.get(KEY_RATING), params.get(KEY_VOTE_AVERAGE)) {
        (Some(rating), _) => parse_rating(rating).ok(),
        (None, Some(vote)) => vote
            .trim()
            .parse::<f32>()
            .ok()
            .and_then(|v| parse_rating(&(v / 2.0).to_string()).ok()),
        (None, None) => None,
    };

    if let Some(page) = params.get(KEY_PAGE) {
        criteria.page = page.trim().parse::<u32>().ok().filter(|p| *p > 0).unwrap_or(1);
    }

    criteria
}

/// Split a `genre` value on `,` and percent-decode each name. Names
/// are encoded one by one, so a comma inside a name survives.
pub fn decode_genres(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|g| {
            urlencoding::decode(g)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| g.to_string())
        })
        .filter(|g| !g.trim().is_empty())
        .collect()
}

fn fallback<T: Default>(parsed: Result<T, CriteriaError>, key: &str) -> T {
    parsed.unwrap_or_else(|e| {
        debug!(key = key, error = %e, "Ignoring unparseable criteria value");
        T::default()
    })
}

/// Render parameters as a URL query string, without the leading `?`.
pub fn to_query_string(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Parse a URL query string (with or without the leading `?`).
/// Later occurrences of a key win.
pub fn parse_query_string(query: &str) -> Params {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut params = Params::new();

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.insert(decode_component(key), decode_component(value));
    }

    params
}

fn decode_component(s: &str) -> String {
    let s = s.replace('+', " ");
    urlencoding::decode(&s)
        .map(|d| d.into_owned())
        .unwrap_or(s)
}

/// The external key-value representation of the criteria, such as the
/// query string of the browser location.
pub trait CriteriaStore {
    fn read(&self) -> Params;

    /// Record a new representation (a navigation entry).
    fn write(&mut self, params: Params);

    /// Overwrite the current representation without adding an entry.
    fn replace(&mut self, params: Params) {
        self.write(params);
    }
}

/// A store holding only the current representation.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    params: Params,
    writes: usize,
}

impl MemoryStore {
    pub fn new(params: Params) -> Self {
        Self { params, writes: 0 }
    }

    pub fn from_query_string(query: &str) -> Self {
        Self::new(parse_query_string(query))
    }

    pub fn query_string(&self) -> String {
        to_query_string(&self.params)
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl CriteriaStore for MemoryStore {
    fn read(&self) -> Params {
        self.params.clone()
    }

    fn write(&mut self, params: Params) {
        self.writes += 1;
        self.params = params;
    }
}

/// A store with browser-like history: writes push an entry and drop any
/// forward entries, `back` and `forward` move through the entries.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    entries: Vec<Params>,
    cursor: usize,
}

impl HistoryStore {
    pub fn new(initial: Params) -> Self {
        Self {
            entries: vec![initial],
            cursor: 0,
        }
    }

    pub fn back(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn forward(&mut self) -> bool {
        if self.cursor + 1 >= self.entries.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(Params::new())
    }
}

impl CriteriaStore for HistoryStore {
    fn read(&self) -> Params {
        self.entries[self.cursor].clone()
    }

    fn write(&mut self, params: Params) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(params);
        self.cursor = self.entries.len() - 1;
    }

    fn replace(&mut self, params: Params) {
        self.entries[self.cursor] = params;
    }
}

/// Criteria paired with their external representation. Every effective
/// change is written through to the store before it is acted on.
#[derive(Debug)]
pub struct SyncedCriteria<S> {
    criteria: Criteria,
    store: S,
}

impl<S: CriteriaStore> SyncedCriteria<S> {
    /// Read the initial criteria from the store.
    pub fn mount(store: S) -> Self {
        let criteria = decode(&store.read());
        Self { criteria, store }
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn update(&mut self, update: CriteriaUpdate) -> Result<bool, CriteriaError> {
        let changed = self.criteria.apply(update)?;
        if changed {
            self.store.write(encode(&self.criteria));
        }
        Ok(changed)
    }

    /// Correct the page after the result set turned out smaller than
    /// the requested page. Rewrites the current entry in place.
    pub fn clamp_page(&mut self, page: u32) {
        if self.criteria.page != page {
            debug!(from = self.criteria.page, to = page, "Clamping page number");
            self.criteria.page = page;
            self.store.replace(encode(&self.criteria));
        }
    }

    /// Pick up a representation changed from outside (history
    /// navigation). Returns whether the criteria changed.
    pub fn resync(&mut self) -> bool {
        let decoded = decode(&self.store.read());
        if decoded == self.criteria {
            return false;
        }
        self.criteria = decoded;
        true
    }
}
