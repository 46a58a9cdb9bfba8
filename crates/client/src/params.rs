//! Movie list parameters: filters, pagination and sort.
//!
//! [`ListParams`] is what the list cache key and the `GET /movies` query string are built
//! from. Query pairs always come out in the same order (page, limit, sortBy, sortOrder,
//! title, rating, minRuntime, maxRuntime, year, is_showing), skipping unset and empty fields.

use std::fmt;
use std::str::FromStr;

use marquee_query::KeySegment;
use marquee_shared::http::QueryPairs;
use marquee_shared::ClientError;

/// Page sizes offered by the list view.
pub const PAGE_LIMITS: [u32; 4] = [5, 10, 20, 50];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortField {
    #[default]
    Title,
    RuntimeInMinutes,
    Rating,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::RuntimeInMinutes => "runtime_in_minutes",
            Self::Rating => "rating",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

impl FromStr for SortField {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "runtime" | "runtime_in_minutes" => Ok(Self::RuntimeInMinutes),
            "rating" => Ok(Self::Rating),
            "created_at" => Ok(Self::CreatedAt),
            "updated_at" => Ok(Self::UpdatedAt),
            other => Err(ClientError::Validation(format!("unknown sort field: {other}"))),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(ClientError::Validation(format!("unknown sort order: {other}"))),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field filters for the movie list. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub title: Option<String>,
    pub rating: Option<String>,
    pub min_runtime: Option<u32>,
    pub max_runtime: Option<u32>,
    pub year: Option<u32>,
    pub is_showing: Option<bool>,
}

/// A single-field filter edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterEdit {
    Title(Option<String>),
    Rating(Option<String>),
    MinRuntime(Option<u32>),
    MaxRuntime(Option<u32>),
    Year(Option<u32>),
    IsShowing(Option<bool>),
}

impl FilterState {
    pub fn apply(&mut self, edit: FilterEdit) {
        match edit {
            FilterEdit::Title(v) => self.title = v,
            FilterEdit::Rating(v) => self.rating = v,
            FilterEdit::MinRuntime(v) => self.min_runtime = v,
            FilterEdit::MaxRuntime(v) => self.max_runtime = v,
            FilterEdit::Year(v) => self.year = v,
            FilterEdit::IsShowing(v) => self.is_showing = v,
        }
    }

    /// True when at least one field would narrow the list.
    pub fn is_active(&self) -> bool {
        let text = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        text(&self.title)
            || text(&self.rating)
            || self.min_runtime.is_some()
            || self.max_runtime.is_some()
            || self.year.is_some()
            || self.is_showing.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    pub page: u32,
    pub limit: u32,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            sort_by: SortField::Title,
            sort_order: SortOrder::Asc,
        }
    }
}

/// Parameters of one `GET /movies` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortOrder>,
    pub title: Option<String>,
    pub rating: Option<String>,
    pub min_runtime: Option<u32>,
    pub max_runtime: Option<u32>,
    pub year: Option<u32>,
    pub is_showing: Option<bool>,
}

impl ListParams {
    pub fn from_state(filters: &FilterState, pagination: &PaginationState) -> Self {
        Self {
            page: Some(pagination.page),
            limit: Some(pagination.limit),
            sort_by: Some(pagination.sort_by),
            sort_order: Some(pagination.sort_order),
            title: filters.title.clone(),
            rating: filters.rating.clone(),
            min_runtime: filters.min_runtime,
            max_runtime: filters.max_runtime,
            year: filters.year,
            is_showing: filters.is_showing,
        }
    }

    /// Only movies currently in theaters, unpaged.
    pub fn showing() -> Self {
        Self {
            is_showing: Some(true),
            ..Self::default()
        }
    }

    pub fn query_pairs(&self) -> QueryPairs {
        let mut pairs = QueryPairs::new();
        let mut push = |name: &'static str, value: Option<String>| {
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                pairs.push((name, v));
            }
        };

        push("page", self.page.map(|v| v.to_string()));
        push("limit", self.limit.map(|v| v.to_string()));
        push("sortBy", self.sort_by.map(|v| v.as_str().to_string()));
        push("sortOrder", self.sort_order.map(|v| v.as_str().to_string()));
        push("title", self.title.clone());
        push("rating", self.rating.clone());
        push("minRuntime", self.min_runtime.map(|v| v.to_string()));
        push("maxRuntime", self.max_runtime.map(|v| v.to_string()));
        push("year", self.year.map(|v| v.to_string()));
        push("is_showing", self.is_showing.map(|v| v.to_string()));

        pairs
    }

    /// Normalized key segment for these parameters.
    pub fn key_segment(&self) -> KeySegment {
        KeySegment::params(self.query_pairs())
    }
}
