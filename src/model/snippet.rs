use chrono::{DateTime, Utc};

pub type Id = i64;

/// How many snippets the home page lists.
pub const LATEST_LIMIT: u32 = 10;

/// The lifetimes, in days, a snippet may be created with.
pub const PERMITTED_EXPIRY_DAYS: [i64; 3] = [1, 7, 365];

#[derive(Clone, Debug, serde::Serialize)]
pub struct Snippet {
    pub id: Id,
    pub title: String,
    pub content: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}
