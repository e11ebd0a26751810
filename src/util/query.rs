use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer};

/// Raw query-string parameters, looked up by their camelCase name.
#[derive(Debug, Default, Clone)]
pub struct QueryParams {
    map: HashMap<String, String>,
}

impl<'de> Deserialize<'de> for QueryParams {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Deserialize into a temporary normal map first
        let map = HashMap::<String, String>::deserialize(deserializer)?;
        Ok(QueryParams { map })
    }
}

impl QueryParams {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        QueryParams { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        // First try to get the value the normal way.
        if let Some(val) = self.map.get(key) {
            return Some(val);
        }

        // Clients built against older routes send snake_case keys
        // ("sort_by", "vote_average"), try that spelling too.
        let snake = to_snake_case(key);
        if snake != key {
            return self.map.get(&snake).map(|x| x.as_str());
        }
        None
    }

    /// Returns the value unless it is missing or blank.
    pub fn get_nonempty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn to_sorted_map(&self) -> BTreeMap<String, String> {
        self.map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
