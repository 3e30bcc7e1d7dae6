pub mod document;
pub mod filter;
pub mod keywords;
pub mod text;

pub use document::{Document, DocumentMetadata, MetaValue, StoredMetadata, StoredValue};
pub use filter::{FilterExpr, FilterValue, LooseFilter, LooseScalar, LooseValue};
