//! Project listing parameters: filter, pagination and sort.
//!
//! [`Pagination::new`] never fails. Missing values fall back to the defaults and
//! out-of-range values are clamped, so a client asking for `pageSize=1000` gets
//! [`MAX_PAGE_SIZE`] items per page rather than an error.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::Project;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;
/// Highest page number; keeps every offset representable as a SQL `BIGINT`.
pub const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PAGE_SIZE;

/// Free-text, category and tag filter for project listings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProjectFilter {
    /// Case-insensitive substring of the title or description.
    pub text: Option<String>,
    /// Exact category.
    pub category: Option<String>,
    /// A project matches when it carries any of these tags.
    pub tags: Vec<String>,
}

impl ProjectFilter {
    pub fn matches(&self, project: &Project) -> bool {
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            let needle = text.to_lowercase();
            let in_title = project.title.to_lowercase().contains(&needle);
            if !in_title && !project.description_text().to_lowercase().contains(&needle) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if project.category.as_ref() != Some(category) {
                return false;
            }
        }
        if !self.tags.is_empty() && !project.tags.iter().any(|t| self.tags.contains(t)) {
            return false;
        }
        true
    }
}

/// A clamped page request. Pages are 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(page: Option<u64>, page_size: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE),
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }

    #[inline]
    pub fn total_pages(&self, total_items: u64) -> u64 {
        total_items.div_ceil(self.page_size)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Likes,
}

impl FromStr for SortField {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "createdat" | "created_at" => Ok(Self::CreatedAt),
            "updatedat" | "updated_at" => Ok(Self::UpdatedAt),
            "title" => Ok(Self::Title),
            "likes" | "likescount" | "likes_count" => Ok(Self::Likes),
            other => Err(StoreError::Validation(format!(
                "unsupported sort field: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Sort for project listings. Defaults to newest first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProjectSort {
    pub field: SortField,
    pub order: SortOrder,
}

impl ProjectSort {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    /// Order two projects. Ties fall back to newest first, then id.
    pub fn compare(&self, a: &Project, b: &Project) -> std::cmp::Ordering {
        let primary = match self.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Likes => a.likes_count().cmp(&b.likes_count()),
        };
        let primary = match self.order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current_page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub total_items: u64,
}

/// One page of results in the `{data, pagination}` envelope.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, pagination: Pagination, total_items: u64) -> Self {
        Self {
            data,
            pagination: PageInfo {
                current_page: pagination.page,
                page_size: pagination.page_size,
                total_pages: pagination.total_pages(total_items),
                total_items,
            },
        }
    }

    pub fn with_data<U>(self, data: Vec<U>) -> Page<U> {
        Page {
            data,
            pagination: self.pagination,
        }
    }
}
