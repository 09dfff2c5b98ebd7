//! Partition routing module
//!
//! Supports: Static lists, date windows
//!
//! # Overview
//!
//! A [`Context`] is the set of parameters a stream's requests are rendered
//! with. Contexts come from three places:
//! - Parent records (a form id handed to its submissions stream)
//! - A static list of values (one `properties` request per object type)
//! - Date windows (search requests split into bounded ranges)
//!
//! Contexts also key per-partition bookmarks in the state.

mod routers;
mod types;

pub use routers::{date_windows, trailing_years, DateWindow, ListRouter};
pub use types::{Context, PartitionRouter};
