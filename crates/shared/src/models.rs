//! Wire types for the movie catalog backend.
//!
//! Field names follow the backend's JSON (`snake_case` for records, `camelCase` for the
//! pagination block). List and detail endpoints may answer with either the bare payload or
//! a `{ data, pagination }` envelope; [`Envelope`] accepts both.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;

/// A movie record. Detail fetches also populate `reviews` and `theaters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub movie_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub runtime_in_minutes: Option<u32>,
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub is_showing: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reviews: Vec<Review>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub theaters: Vec<Theater>,
}

impl Movie {
    /// Mean review score rounded to the nearest integer, or `None` without reviews.
    pub fn average_score(&self) -> Option<i32> {
        if self.reviews.is_empty() {
            return None;
        }
        let total: i32 = self.reviews.iter().map(|r| r.score).sum();
        Some((f64::from(total) / self.reviews.len() as f64).round() as i32)
    }

    /// Reviews ordered by the critic's preferred name.
    pub fn sorted_reviews(&self) -> Vec<&Review> {
        let mut reviews: Vec<&Review> = self.reviews.iter().collect();
        reviews.sort_by(|a, b| a.critic_name().cmp(b.critic_name()));
        reviews
    }
}

/// A critic's review of a movie. `score` is 1 to 5 inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: i64,
    pub movie_id: i64,
    pub score: i32,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub critic: Option<Critic>,
}

impl Review {
    fn critic_name(&self) -> &str {
        self.critic
            .as_ref()
            .map(|c| c.preferred_name.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critic {
    #[serde(default)]
    pub preferred_name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub organization_name: String,
}

/// A theater. Only the id is interpreted; every other field is passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theater {
    pub theater_id: i64,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Theater {
    pub fn name(&self) -> Option<&str> {
        self.details.get("name").and_then(Value::as_str)
    }
}

/// Pagination block returned alongside paged movie lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// One page of the movie list.
#[derive(Debug, Clone, PartialEq)]
pub struct MoviePage {
    pub movies: Vec<Movie>,
    pub pagination: Option<Pagination>,
}

/// A decoded response body with the `{ data, pagination }` wrapper removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    pub data: T,
    pub pagination: Option<Pagination>,
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Decodes a JSON value, preferring a non-null `data` field and falling back to the
    /// bare payload.
    pub fn from_value(mut value: Value) -> Result<Self, ClientError> {
        if let Value::Object(map) = &mut value {
            if let Some(data) = map.remove("data").filter(|d| !d.is_null()) {
                let pagination = match map.remove("pagination") {
                    None | Some(Value::Null) => None,
                    Some(p) => Some(serde_json::from_value(p)?),
                };
                return Ok(Self {
                    data: serde_json::from_value(data)?,
                    pagination,
                });
            }
        }

        Ok(Self {
            data: serde_json::from_value(value)?,
            pagination: None,
        })
    }

    /// Decodes a response body that must carry a payload. `None` means the server
    /// answered 204 or sent nothing.
    pub fn from_body(body: Option<Value>, what: &str) -> Result<Self, ClientError> {
        match body {
            Some(value) => Self::from_value(value),
            None => Err(ClientError::Decode(format!("{what} response was empty"))),
        }
    }
}

impl<T: DeserializeOwned + Default> Envelope<T> {
    /// Like [`Envelope::from_body`] but an empty body decodes to `T::default()`.
    pub fn from_body_or_default(body: Option<Value>) -> Result<Self, ClientError> {
        match body {
            Some(value) => Self::from_value(value),
            None => Ok(Self {
                data: T::default(),
                pagination: None,
            }),
        }
    }
}
