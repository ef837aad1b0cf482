use chrono::{DateTime, Utc};
use serde::Serialize;

/// A named credential holder with an optional shorthand alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub name: String,
    pub shorthand: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Service {
    /// Label used in listings: `name` or `name (shorthand)`.
    pub fn label(&self) -> String {
        match &self.shorthand {
            Some(short) => format!("{} ({})", self.name, short),
            None => self.name.clone(),
        }
    }
}

/// One row of `ls`. `username` is only set in the per-account view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingRow {
    pub service: String,
    pub shorthand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}
