//! Pagination module
//!
//! Supports: Offset (legacy v1), Cursor (`paging.next.after`), CRM Search
//!
//! # Overview
//!
//! Each stream selects one strategy matching its API version. A strategy
//! only maps a [`PageToken`] onto a request and derives the next token from a
//! response; [`PageIterator`] turns that into a lazy, restartable sequence of
//! pages.

mod iterator;
mod strategies;
mod types;

pub use iterator::{Page, PageIterator};
pub use strategies::{
    CursorPaginator, NoPaginator, OffsetPaginator, SearchPaginator, SEARCH_RESULT_CAP,
};
pub use types::{next_after, NextPage, PageRequest, PageToken, Paginator, RecordSelector};
pub(crate) use types::json_kind;
