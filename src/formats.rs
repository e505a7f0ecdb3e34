use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,
    pub isbn: String,
    pub isbn13: String,
    pub author_name: Option<String>,
    pub author_id: Option<u64>,
    pub author_link: Option<String>,
    pub avg_rating: f64,
    pub user_rating: Option<u8>,
    pub num_pages: Option<u32>,
    pub publishing_date: String,
    pub started_date: String,
    pub finished_date: String,
    pub added_date: String,
}

/// Field text exactly as read from one `.bookalike` row, before normalization.
///
/// Both extraction strategies produce this shape; the in-page script returns it
/// as JSON with the same field names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBook {
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub isbn13: Option<String>,
    pub author_name: Option<String>,
    pub author_link: Option<String>,
    pub avg_rating: Option<String>,
    pub user_rating: Option<String>,
    pub num_pages: Option<String>,
    pub publishing_date: Option<String>,
    pub started_date: Option<String>,
    pub finished_date: Option<String>,
    pub added_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorOrigin {
    pub birthplace: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<f64>,
}
