//! # Search, Sort, and Paging
//!
//! Listing requests carry free-text filters, a sort key checked against an
//! explicit safelist, and page/page-size values. [`Filters::validate`]
//! turns raw input into a [`Page`] whose sort column is one of the
//! safelisted `'static` strings, so it can be interpolated into SQL.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, ValidationErrors};

/// Largest page number accepted.
pub const MAX_PAGE: i64 = 10_000_000;
/// Largest page size accepted.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Sort keys accepted when listing businesses. A leading `-` means descending.
pub const BUSINESS_SORT_SAFELIST: &[&str] = &[
    "id",
    "name",
    "cnpj",
    "email",
    "created_at",
    "-id",
    "-name",
    "-cnpj",
    "-email",
    "-created_at",
];

/// Free-text filters for business listing. Empty strings match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessFilter {
    /// Matched against the business name.
    #[serde(default)]
    pub name: String,
    /// Matched against the business email.
    #[serde(default)]
    pub email: String,
    /// Matched against the business CNPJ.
    #[serde(default)]
    pub cnpj: String,
}

/// Raw paging input as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    /// 1-based page number.
    pub page: i64,
    /// Rows per page.
    pub page_size: i64,
    /// Sort key, optionally prefixed with `-`.
    pub sort: String,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            sort: "id".to_string(),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    /// SQL keyword.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A safelisted sort column and its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    /// Column name, borrowed from the safelist.
    pub column: &'static str,
    /// Direction.
    pub direction: SortDirection,
}

/// Validated paging request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub page: i64,
    /// Rows per page.
    pub page_size: i64,
    /// Sort order; ties are always broken by `id ASC`.
    pub sort: SortSpec,
}

impl Page {
    /// SQL `LIMIT`.
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    /// SQL `OFFSET`.
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

impl Filters {
    /// Check ranges and the sort key against `safelist`.
    pub fn validate(&self, safelist: &'static [&'static str]) -> Result<Page, DomainError> {
        let mut v = ValidationErrors::new();
        v.check(self.page > 0, "page", "must be greater than zero");
        v.check(self.page <= MAX_PAGE, "page", "must be a maximum of 10 million");
        v.check(self.page_size > 0, "page_size", "must be greater than zero");
        v.check(
            self.page_size <= MAX_PAGE_SIZE,
            "page_size",
            "must be a maximum of 100",
        );

        let sort = safelist
            .iter()
            .copied()
            .find(|candidate| *candidate == self.sort)
            .map(|candidate| match candidate.strip_prefix('-') {
                Some(column) => SortSpec {
                    column,
                    direction: SortDirection::Desc,
                },
                None => SortSpec {
                    column: candidate,
                    direction: SortDirection::Asc,
                },
            });
        v.check(sort.is_some(), "sort", "invalid sort value");

        v.into_result()?;
        match sort {
            Some(sort) => Ok(Page {
                page: self.page,
                page_size: self.page_size,
                sort,
            }),
            None => Err(DomainError::invalid("sort", "invalid sort value")),
        }
    }
}

/// Paging metadata returned alongside a page of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Page that was returned.
    pub current_page: i64,
    /// Requested page size.
    pub page_size: i64,
    /// Always 1 when there are records.
    pub first_page: i64,
    /// Total number of pages.
    pub last_page: i64,
    /// Number of matching records across all pages.
    pub total_records: i64,
}

impl Metadata {
    /// Compute metadata for `total_records` matching rows. All zero when
    /// nothing matched.
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records <= 0 || page_size <= 0 {
            return Self::default();
        }
        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }

    /// Same as `last_page`.
    pub fn total_pages(&self) -> i64 {
        self.last_page
    }
}
