//! Stream definition
//!
//! A definition is plain data: the endpoint, schema and keys of one entity
//! type, plus references to the pagination strategy and parent stream it
//! uses. Behavior shared between streams lives in the pagination and schema
//! modules, not here.

use crate::pagination::{
    CursorPaginator, NoPaginator, OffsetPaginator, Paginator, RecordSelector,
};
use crate::partition::{Context, ListRouter};
use crate::schema::{flatten_schema, FieldType, ObjectSchema};
use crate::types::{JsonObject, ReplicationMode, SortOrder};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Derives child contexts from one parent record
///
/// The timestamp is the run's notion of "now", so date windows are stable
/// within a run.
pub type ChildContextFn = fn(&JsonObject, DateTime<Utc>) -> Vec<Context>;

/// Pagination strategy used by a stream's list endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationKind {
    /// Single response
    None,
    /// Legacy `offset`/`limit`
    Offset,
    /// `paging.next.after` cursor
    Cursor,
}

impl PaginationKind {
    /// Build the paginator for a page size
    pub fn paginator(self, page_size: u32) -> Box<dyn Paginator> {
        match self {
            Self::None => Box::new(NoPaginator),
            Self::Offset => Box::new(OffsetPaginator::new("offset", "limit", page_size)),
            Self::Cursor => Box::new(CursorPaginator::new(page_size)),
        }
    }
}

/// Property names requested from CRM object endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertySource {
    /// No `properties` parameter
    None,
    /// A fixed list
    Fixed(&'static [&'static str]),
    /// Discovered from `/crm/v3/properties/{object}` once per run
    Dynamic(&'static str),
}

/// Link from a child stream to its parent
#[derive(Debug, Clone, Copy)]
pub struct ParentLink {
    /// Parent stream name
    pub stream: &'static str,
    /// Context derivation from each parent record
    pub contexts: ChildContextFn,
}

/// One synced entity type
#[derive(Debug, Clone)]
pub struct StreamDefinition {
    pub name: &'static str,
    /// Path template, rendered against the context
    pub path: &'static str,
    /// Search endpoint, used for incremental runs with a start value
    pub search_path: Option<&'static str>,
    pub schema: ObjectSchema,
    pub primary_key: &'static [&'static str],
    pub replication_mode: ReplicationMode,
    pub replication_key: Option<&'static str>,
    /// Order of the list endpoint; search is always ascending
    pub sort_order: SortOrder,
    pub selector: RecordSelector,
    pub pagination: PaginationKind,
    /// Overrides the configured page size
    pub page_size: Option<u32>,
    /// Query parameter templates
    pub params: &'static [(&'static str, &'static str)],
    pub properties: PropertySource,
    pub parent: Option<ParentLink>,
    /// Fixed partitions, each synced as its own context
    pub partitions: Option<ListRouter>,
    /// Copy `properties.<replication_key>` to the top level
    pub promote_replication_key: bool,
}

impl StreamDefinition {
    /// A full-table stream reading `results` with cursor pagination
    pub fn new(name: &'static str, path: &'static str, schema: ObjectSchema) -> Self {
        Self {
            name,
            path,
            search_path: None,
            schema,
            primary_key: &["id"],
            replication_mode: ReplicationMode::FullTable,
            replication_key: None,
            sort_order: SortOrder::Unsorted,
            selector: RecordSelector::Field("results"),
            pagination: PaginationKind::Cursor,
            page_size: None,
            params: &[],
            properties: PropertySource::None,
            parent: None,
            partitions: None,
            promote_replication_key: false,
        }
    }

    #[must_use]
    pub fn primary_key(mut self, key: &'static [&'static str]) -> Self {
        self.primary_key = key;
        self
    }

    /// Replicate incrementally on `key`
    #[must_use]
    pub fn incremental(mut self, key: &'static str, order: SortOrder) -> Self {
        self.replication_mode = ReplicationMode::Incremental;
        self.replication_key = Some(key);
        self.sort_order = order;
        self
    }

    #[must_use]
    pub fn search(mut self, path: &'static str) -> Self {
        self.search_path = Some(path);
        self
    }

    #[must_use]
    pub fn selector(mut self, selector: RecordSelector) -> Self {
        self.selector = selector;
        self
    }

    #[must_use]
    pub fn pagination(mut self, kind: PaginationKind) -> Self {
        self.pagination = kind;
        self
    }

    #[must_use]
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    #[must_use]
    pub fn params(mut self, params: &'static [(&'static str, &'static str)]) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn properties(mut self, source: PropertySource) -> Self {
        self.properties = source;
        self
    }

    #[must_use]
    pub fn child_of(mut self, stream: &'static str, contexts: ChildContextFn) -> Self {
        self.parent = Some(ParentLink { stream, contexts });
        self
    }

    #[must_use]
    pub fn partitioned(mut self, router: ListRouter) -> Self {
        self.partitions = Some(router);
        self
    }

    /// CRM object stream with discovered properties
    ///
    /// The schema is the standard object envelope. When incremental, the
    /// replication key is lifted out of `properties` onto the record.
    pub fn crm_object(
        name: &'static str,
        path: &'static str,
        search_path: &'static str,
        replication_key: &'static str,
    ) -> Self {
        let schema = object_envelope(FieldType::open_object(), FieldType::DateTime)
            .with(replication_key, FieldType::DateTime);

        let mut def = Self::new(name, path, schema)
            .incremental(replication_key, SortOrder::Unsorted)
            .search(search_path)
            .properties(PropertySource::Dynamic(name));
        def.promote_replication_key = true;
        def
    }

    pub fn is_incremental(&self) -> bool {
        self.replication_mode == ReplicationMode::Incremental && self.replication_key.is_some()
    }

    pub fn parent_name(&self) -> Option<&'static str> {
        self.parent.map(|p| p.stream)
    }

    /// JSON Schema for the catalog, flattened when a depth is given
    pub fn json_schema(&self, flatten_depth: Option<usize>) -> Value {
        match flatten_depth {
            Some(depth) => flatten_schema(&self.schema, depth).to_json_schema(),
            None => self.schema.to_json_schema(),
        }
    }

    /// Catalog entry
    pub fn metadata(&self, flatten_depth: Option<usize>) -> StreamMetadata {
        StreamMetadata {
            name: self.name.to_string(),
            schema: self.json_schema(flatten_depth),
            primary_key: self.primary_key.iter().map(ToString::to_string).collect(),
            replication_method: self.replication_mode,
            replication_key: self.replication_key.map(ToString::to_string),
            parent_stream: self.parent_name().map(ToString::to_string),
        }
    }
}

/// What discovery reports about a stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamMetadata {
    pub name: String,
    pub schema: Value,
    pub primary_key: Vec<String>,
    pub replication_method: ReplicationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_stream: Option<String>,
}

/// `id`, `properties`, `createdAt`, `updatedAt`, `archived`
pub(crate) fn object_envelope(properties: FieldType, timestamps: FieldType) -> ObjectSchema {
    ObjectSchema::new([
        ("id", FieldType::String),
        ("properties", properties),
        ("createdAt", timestamps.clone()),
        ("updatedAt", timestamps),
        ("archived", FieldType::Boolean),
    ])
}
