//! Shape descriptors: how a type's fields map onto result columns
//!
//! - [`declared`]: the type-side description (`Entity`, `EntityShape`)
//! - [`columns`]: the result-side description (`ColumnMetadata`)
//! - [`tree`]: the two resolved against each other into a `ShapeTree`

pub mod columns;
pub mod declared;
pub mod errors;
pub mod tree;

pub use columns::ColumnMetadata;
pub use declared::{Entity, EntityShape, FieldKind, FieldShape, ShapeSource};
pub use errors::{ShapeError, ShapeIssue};
pub use tree::{BuildOptions, NodeId, NodeKind, ShapeNode, ShapeTree};
