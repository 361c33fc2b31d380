//! Page/size/order arithmetic shared by the listing and search paths.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid pagination parameter `{field}`: {value:?}")]
pub struct PaginationError {
    pub field: &'static str,
    pub value: String,
}

/// Parsed pagination request.
///
/// `page == 0` means "no paging offset". Sizes of zero are accepted and
/// yield zero total pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationQuery {
    pub page: u32,
    pub size: u32,
    pub order_by: Option<String>,
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            order_by: None,
        }
    }
}

impl PaginationQuery {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            order_by: None,
        }
    }

    #[must_use]
    pub fn with_order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Builds a query from raw query-string values. Absent or blank values
    /// take their defaults; anything else must parse as a non-negative integer.
    pub fn from_raw(
        page: Option<&str>,
        size: Option<&str>,
        order_by: Option<&str>,
    ) -> Result<Self, PaginationError> {
        let query = Self {
            page: parse_field("page", page)?.unwrap_or(0),
            size: parse_field("size", size)?.unwrap_or(DEFAULT_PAGE_SIZE),
            order_by: order_by
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string),
        };

        if query.checked_offset().is_none() {
            return Err(PaginationError {
                field: "page",
                value: query.page.to_string(),
            });
        }
        Ok(query)
    }

    fn checked_offset(&self) -> Option<i64> {
        i64::from(self.page.saturating_sub(1)).checked_mul(i64::from(self.size))
    }

    /// Row offset of the first item on this page, saturating at `i64::MAX`.
    pub fn offset(&self) -> i64 {
        self.checked_offset().unwrap_or(i64::MAX)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub fn total_pages(&self, total_count: i64) -> i64 {
        if self.size == 0 || total_count <= 0 {
            return 0;
        }
        let size = i64::from(self.size);
        (total_count + size - 1) / size
    }

    pub fn has_more(&self, total_count: i64) -> bool {
        self.size != 0 && i64::from(self.page) < self.total_pages(total_count)
    }

    pub fn order_column(&self) -> OrderColumn {
        OrderColumn::parse(self.order_by.as_deref())
    }
}

fn parse_field(field: &'static str, raw: Option<&str>) -> Result<Option<u32>, PaginationError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<u32>().map(Some).map_err(|_| PaginationError {
            field,
            value: value.to_string(),
        }),
    }
}

/// Columns a listing may be ordered by. Unknown names fall back to `username`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderColumn {
    #[default]
    Username,
    Email,
    Role,
    CreatedAt,
    UpdatedAt,
    LoginDate,
}

impl OrderColumn {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            Some("email") => Self::Email,
            Some("role") => Self::Role,
            Some("created_at" | "createdat") => Self::CreatedAt,
            Some("updated_at" | "updatedat") => Self::UpdatedAt,
            Some("login_date" | "logindate") => Self::LoginDate,
            _ => Self::Username,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
            Self::Role => "role",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::LoginDate => "login_date",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_when_absent() {
        let q = PaginationQuery::from_raw(None, None, None).unwrap();
        assert_eq!(q, PaginationQuery::default());
        assert_eq!(q.offset(), 0);
        assert_eq!(q.limit(), 10);
    }

    #[test]
    fn blank_values_take_defaults() {
        let q = PaginationQuery::from_raw(Some(""), Some(" "), Some("")).unwrap();
        assert_eq!(q.page, 0);
        assert_eq!(q.size, DEFAULT_PAGE_SIZE);
        assert!(q.order_by.is_none());
    }

    #[test]
    fn rejects_non_numeric() {
        let err = PaginationQuery::from_raw(Some("two"), None, None).unwrap_err();
        assert_eq!(err.field, "page");
        assert!(PaginationQuery::from_raw(None, Some("-1"), None).is_err());
    }

    #[test]
    fn offset_for_later_pages() {
        assert_eq!(PaginationQuery::new(1, 10).offset(), 0);
        assert_eq!(PaginationQuery::new(3, 10).offset(), 20);
        assert_eq!(PaginationQuery::new(0, 10).offset(), 0);
    }

    #[test]
    fn offset_beyond_i64_is_rejected() {
        let max = u32::MAX.to_string();
        let err = PaginationQuery::from_raw(Some(&max), Some(&max), None).unwrap_err();
        assert_eq!(err.field, "page");

        let q = PaginationQuery::new(u32::MAX, u32::MAX);
        assert_eq!(q.offset(), i64::MAX);
        assert_eq!(q.limit(), i64::from(u32::MAX));
    }

    #[test]
    fn largest_page_within_range_is_accepted() {
        let q = PaginationQuery::from_raw(Some(&u32::MAX.to_string()), Some("10"), None).unwrap();
        assert_eq!(q.offset(), i64::from(u32::MAX - 1) * 10);
    }

    #[test]
    fn twenty_five_rows_in_pages_of_ten() {
        let total = 25;
        assert_eq!(PaginationQuery::new(1, 10).total_pages(total), 3);
        assert!(PaginationQuery::new(1, 10).has_more(total));
        assert!(PaginationQuery::new(2, 10).has_more(total));
        assert!(!PaginationQuery::new(3, 10).has_more(total));
    }

    #[test]
    fn zero_size_does_not_divide() {
        let q = PaginationQuery::new(2, 0);
        assert_eq!(q.total_pages(100), 0);
        assert!(!q.has_more(100));
    }

    #[test]
    fn order_column_whitelist() {
        assert_eq!(OrderColumn::parse(Some("email")), OrderColumn::Email);
        assert_eq!(OrderColumn::parse(Some("Created_At")), OrderColumn::CreatedAt);
        assert_eq!(OrderColumn::parse(Some("id; drop table users")), OrderColumn::Username);
        assert_eq!(OrderColumn::parse(None).as_sql(), "username");
    }

    proptest! {
        #[test]
        fn empty_result_is_always_empty_page(page in 0u32..10_000, size in 0u32..10_000) {
            let q = PaginationQuery::new(page, size);
            prop_assert_eq!(q.total_pages(0), 0);
            prop_assert!(!q.has_more(0));
        }

        #[test]
        fn total_pages_covers_every_row(total in 1i64..1_000_000, size in 1u32..1_000) {
            let q = PaginationQuery::new(1, size);
            let pages = q.total_pages(total);
            prop_assert!(pages * i64::from(size) >= total);
            prop_assert!((pages - 1) * i64::from(size) < total);
        }

        #[test]
        fn last_page_has_no_more(total in 1i64..100_000, size in 1u32..500) {
            let pages = PaginationQuery::new(1, size).total_pages(total);
            let last = u32::try_from(pages).unwrap();
            prop_assert!(!PaginationQuery::new(last, size).has_more(total));
        }
    }
}
