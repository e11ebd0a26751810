mod query;

pub use query::QueryParams;
