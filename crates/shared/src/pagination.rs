//! Page-based pagination utilities.
//!
//! Queries never count the full result set. Instead they request one row
//! more than the page size; if that extra row comes back there is a next
//! page, and the row is dropped before the page is returned.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for list option resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("Unknown order key: {0}")]
    UnknownOrderKey(String),
}

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    /// SQL keyword for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// A whitelisted column a list query may be ordered by.
///
/// Each query type declares its own key set and its own default, so the
/// "caller gave no order" case is resolved in exactly one place per query.
pub trait SortKey: Copy + Sized {
    /// Key used when the caller supplies none.
    const DEFAULT: Self;
    /// Direction used with [`SortKey::DEFAULT`] when the caller supplies none.
    const DEFAULT_DIRECTION: OrderDirection;

    /// Parses a caller-supplied order key.
    fn parse(key: &str) -> Option<Self>;

    /// Column or output alias to place in the ORDER BY clause.
    fn column(&self) -> &'static str;
}

/// Page size bounds applied during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_per_page: u32,
    pub max_per_page: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_per_page: 100,
            max_per_page: 1000,
        }
    }
}

/// Raw list options as supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Zero-based page number.
    pub page: u32,
    pub per_page: Option<u32>,
    pub order_key: Option<String>,
    pub order_direction: Option<OrderDirection>,
}

impl ListOptions {
    /// Resolves caller options into a concrete page request.
    ///
    /// - no order key: the query type's default key and direction (an
    ///   explicit direction is still honoured)
    /// - explicit order key without direction: ascending
    /// - `per_page` absent or zero: `limits.default_per_page`
    /// - `per_page` above `limits.max_per_page`: clamped
    pub fn resolve<K: SortKey>(&self, limits: &PageLimits) -> Result<PageRequest<K>, PaginationError> {
        let requested_key = self
            .order_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());

        let (order, direction) = match requested_key {
            None => (
                K::DEFAULT,
                self.order_direction.unwrap_or(K::DEFAULT_DIRECTION),
            ),
            Some(key) => {
                let order = K::parse(key)
                    .ok_or_else(|| PaginationError::UnknownOrderKey(key.to_string()))?;
                (order, self.order_direction.unwrap_or_default())
            }
        };

        let per_page = match self.per_page {
            None | Some(0) => limits.default_per_page,
            Some(n) => n.min(limits.max_per_page),
        };

        Ok(PageRequest {
            page: self.page,
            per_page: per_page.max(1),
            order,
            direction,
        })
    }
}

/// A fully resolved page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest<K> {
    pub page: u32,
    pub per_page: u32,
    pub order: K,
    pub direction: OrderDirection,
}

impl<K> PageRequest<K> {
    /// Number of rows to request from the store: one beyond the page.
    pub fn fetch_limit(&self) -> i64 {
        i64::from(self.per_page) + 1
    }

    /// Row offset of the first row of this page. Saturates at `i64::MAX`,
    /// which simply yields an empty page.
    pub fn offset(&self) -> i64 {
        i64::from(self.page).saturating_mul(i64::from(self.per_page))
    }

    /// Turns an over-fetched row set into a page with metadata.
    pub fn paginate<T>(&self, mut rows: Vec<T>) -> Page<T> {
        let per_page = self.per_page as usize;
        let has_next = rows.len() > per_page;
        rows.truncate(per_page);

        Page {
            items: rows,
            meta: PaginationMetadata {
                has_previous: self.page > 0,
                has_next,
            },
        }
    }
}

/// Navigation flags returned with every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaginationMetadata {
    pub has_previous: bool,
    pub has_next: bool,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PaginationMetadata,
}

impl<T> Page<T> {
    /// Converts every item, keeping the metadata.
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }

    /// Fallible variant of [`Page::map`].
    pub fn try_map<U, E, F: FnMut(T) -> Result<U, E>>(self, f: F) -> Result<Page<U>, E> {
        Ok(Page {
            items: self
                .items
                .into_iter()
                .map(f)
                .collect::<Result<Vec<_>, E>>()?,
            meta: self.meta,
        })
    }
}
