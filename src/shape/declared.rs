//! Declared shape of a mappable type
//!
//! Rust has no runtime reflection, so every mappable type describes itself
//! through [`Entity::shape`]. The description is plain data: field names in
//! declaration order, their structural category, nullability, and the
//! table/column overrides that steer column resolution.
//!
//! ```
//! use rowgraph::shape::{Entity, EntityShape};
//! use rowgraph::value::ScalarType;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Grandchild {
//!     id: u64,
//!     note: Option<String>,
//! }
//!
//! impl Entity for Grandchild {
//!     fn shape() -> EntityShape {
//!         EntityShape::new("Grandchild")
//!             .table("grandchild")
//!             .key("id", ScalarType::UInt)
//!             .optional("note", ScalarType::Text)
//!     }
//! }
//! ```

use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::value::ScalarType;

/// A type that can be hydrated from joined rows.
///
/// Construction goes through `Deserialize`: hydration assembles a JSON object
/// per entity in declared field order and decodes it. Fields marked
/// `excluded` (or cut off by the depth limit) are absent from that object, so
/// they need `#[serde(default)]`.
pub trait Entity: DeserializeOwned {
    fn shape() -> EntityShape;
}

/// Where a nested/element shape comes from.
///
/// `Declared` is resolved lazily, which lets self-referencing types terminate
/// at the depth limit.
#[derive(Debug, Clone)]
pub enum ShapeSource {
    Declared(fn() -> EntityShape),
    Inline(Arc<EntityShape>),
}

impl ShapeSource {
    pub fn of<E: Entity>() -> Self {
        ShapeSource::Declared(E::shape)
    }

    pub fn resolve(&self) -> EntityShape {
        match self {
            ShapeSource::Declared(shape) => shape(),
            ShapeSource::Inline(shape) => shape.as_ref().clone(),
        }
    }
}

impl From<EntityShape> for ShapeSource {
    fn from(shape: EntityShape) -> Self {
        ShapeSource::Inline(Arc::new(shape))
    }
}

/// Structural category of a field
#[derive(Debug, Clone)]
pub enum FieldKind {
    Scalar(ScalarType),
    Nested(ShapeSource),
    /// List of entities; the source describes the element type
    Collection(ShapeSource),
}

#[derive(Debug, Clone)]
pub struct FieldShape {
    pub name: String,
    /// Column name override; defaults to the field name
    pub column: Option<String>,
    pub nullable: bool,
    /// Declared identity column
    pub key: bool,
    /// Never mapped
    pub excluded: bool,
    pub kind: FieldKind,
}

impl FieldShape {
    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::with_kind(name, FieldKind::Scalar(ty))
    }

    pub fn nested(name: impl Into<String>, source: impl Into<ShapeSource>) -> Self {
        Self::with_kind(name, FieldKind::Nested(source.into()))
    }

    pub fn collection(name: impl Into<String>, source: impl Into<ShapeSource>) -> Self {
        Self::with_kind(name, FieldKind::Collection(source.into()))
    }

    fn with_kind(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            column: None,
            nullable: false,
            key: false,
            excluded: false,
            kind,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Column this field resolves against
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

/// Declared shape of one entity type
#[derive(Debug, Clone)]
pub struct EntityShape {
    /// Type name, used in error messages and as the default table name
    pub name: String,
    pub table: String,
    pub schema: Option<String>,
    pub fields: Vec<FieldShape>,
}

impl EntityShape {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            schema: None,
            fields: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn field(mut self, field: FieldShape) -> Self {
        self.fields.push(field);
        self
    }

    pub fn scalar(self, name: impl Into<String>, ty: ScalarType) -> Self {
        self.field(FieldShape::scalar(name, ty))
    }

    pub fn optional(self, name: impl Into<String>, ty: ScalarType) -> Self {
        self.field(FieldShape::scalar(name, ty).nullable())
    }

    pub fn key(self, name: impl Into<String>, ty: ScalarType) -> Self {
        self.field(FieldShape::scalar(name, ty).key())
    }

    pub fn nested<E: Entity>(self, name: impl Into<String>) -> Self {
        self.field(FieldShape::nested(name, ShapeSource::of::<E>()))
    }

    pub fn optional_nested<E: Entity>(self, name: impl Into<String>) -> Self {
        self.field(FieldShape::nested(name, ShapeSource::of::<E>()).nullable())
    }

    pub fn collection<E: Entity>(self, name: impl Into<String>) -> Self {
        self.field(FieldShape::collection(name, ShapeSource::of::<E>()))
    }
}
