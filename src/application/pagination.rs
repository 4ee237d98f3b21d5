//! Offset pagination value objects shared by list queries and cache keys.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page size must be between 1 and {MAX_PAGE_SIZE}, got {0}")]
    InvalidSize(u32),
    #[error("sort property must not be empty")]
    EmptySortProperty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SortDirective {
    pub property: String,
    pub direction: SortDirection,
}

impl SortDirective {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Requested page: zero-based page number, page size and sort directives.
///
/// Used verbatim as part of composite cache keys, so two specs are equal only
/// when every field is equal, including the order of sort directives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PageSpec {
    page: u32,
    size: u32,
    sort: Vec<SortDirective>,
}

impl PageSpec {
    pub fn new(page: u32, size: u32) -> Result<Self, PaginationError> {
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(PaginationError::InvalidSize(size));
        }
        Ok(Self {
            page,
            size,
            sort: Vec::new(),
        })
    }

    pub fn sorted_by(mut self, directive: SortDirective) -> Result<Self, PaginationError> {
        if directive.property.trim().is_empty() {
            return Err(PaginationError::EmptySortProperty);
        }
        self.sort.push(directive);
        Ok(self)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn sort(&self) -> &[SortDirective] {
        &self.sort
    }

    /// Number of items preceding this page.
    pub fn offset(&self) -> usize {
        self.page as usize * self.size as usize
    }
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: Vec::new(),
        }
    }
}

impl fmt::Display for PageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page={} size={}", self.page, self.size)?;
        for directive in &self.sort {
            let direction = match directive.direction {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            };
            write!(f, " sort={},{direction}", directive.property)?;
        }
        Ok(())
    }
}

/// One page of results plus the total count across all pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_items: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, spec: &PageSpec, total_items: u64) -> Self {
        Self {
            items,
            page: spec.page(),
            size: spec.size(),
            total_items,
        }
    }

    pub fn empty(spec: &PageSpec) -> Self {
        Self::new(Vec::new(), spec, 0)
    }

    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total_items.div_ceil(u64::from(self.size))
    }

    pub fn is_last(&self) -> bool {
        u64::from(self.page) + 1 >= self.total_pages()
    }
}
