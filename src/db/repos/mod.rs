pub mod attachments;
pub mod conversations;
pub mod cursor;
pub mod entries;
pub mod groups;
pub mod memberships;
pub mod tasks;
pub mod transfers;

pub use attachments::*;
pub use conversations::*;
pub use cursor::*;
pub use entries::*;
pub use groups::*;
pub use memberships::*;
pub use tasks::*;
pub use transfers::*;

/// Sort order for list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending order (oldest first)
    Asc,
    /// Descending order (newest first)
    #[default]
    Desc,
}

impl SortOrder {
    /// Get the SQL ORDER BY direction string.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Get the opposite sort order.
    pub fn opposite(&self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }

    /// Compute SQL comparison operator and ORDER BY direction for cursor-based pagination.
    ///
    /// Returns (comparison_operator, order_direction, should_reverse_results).
    pub fn cursor_query_params(
        &self,
        direction: CursorDirection,
    ) -> (&'static str, &'static str, bool) {
        match (self, direction) {
            (SortOrder::Desc, CursorDirection::Forward) => ("<", "DESC", false),
            (SortOrder::Desc, CursorDirection::Backward) => (">", "ASC", true),
            (SortOrder::Asc, CursorDirection::Forward) => (">", "ASC", false),
            (SortOrder::Asc, CursorDirection::Backward) => ("<", "DESC", true),
        }
    }
}

/// Pagination and listing parameters using cursor-based pagination.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    /// Maximum number of records to return.
    pub limit: Option<i64>,
    /// Cursor for keyset pagination. When provided, results start from this position.
    pub cursor: Option<Cursor>,
    /// Direction for cursor-based pagination.
    pub direction: CursorDirection,
    /// Sort order for results (asc = oldest first, desc = newest first).
    pub sort_order: SortOrder,
    /// Include soft-deleted records in results.
    pub include_deleted: bool,
}

/// Result of a paginated list query.
#[derive(Debug, Clone)]
pub struct ListResult<T> {
    /// The items returned for this page.
    pub items: Vec<T>,
    /// Whether there are more items after this page.
    pub has_more: bool,
    /// Cursors for navigating to next/previous pages.
    pub cursors: PageCursors,
}

impl<T> ListResult<T> {
    pub fn new(items: Vec<T>, has_more: bool, cursors: PageCursors) -> Self {
        Self {
            items,
            has_more,
            cursors,
        }
    }
}
