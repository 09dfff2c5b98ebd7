//! Stream definitions and the HubSpot catalog
//!
//! Each entity type is described by a [`StreamDefinition`]. The
//! [`Catalog`] holds the fixed set in source order, which is also the
//! tie-break order when scheduling streams.

mod catalog;
mod definition;

pub use catalog::{Catalog, CAMPAIGN_ASSET_TYPES, PROPERTY_OBJECT_TYPES};
pub use definition::{
    ChildContextFn, PaginationKind, ParentLink, PropertySource, StreamDefinition,
    StreamMetadata,
};
