//! Track catalog projection and the collaborator it is loaded from

pub mod source;
pub mod store;

pub use source::{CatalogRows, CatalogService, CatalogSource, StaticCatalog, TrackDelta};
pub use store::{GroupKey, GroupedIndex, MetadataStore};
