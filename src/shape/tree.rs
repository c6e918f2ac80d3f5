//! Descriptor tree built from a declared shape and the columns of one result
//!
//! Nodes live in a flat arena in depth-first preorder, so the subtree of a node
//! is the contiguous id range `id..end`. Hydration keeps its per-row state in a
//! parallel table indexed by `NodeId`; the tree itself is immutable once built.

use std::ops::Range;

use super::{
    columns::ColumnMetadata,
    declared::{EntityShape, FieldKind, FieldShape},
    errors::{ShapeError, ShapeIssue},
};
use crate::value::ScalarType;

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Scalar(ScalarType),
    Nested,
    Collection,
}

/// Options steering descriptor construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Nested/collection levels to descend; deeper fields are left out
    pub max_depth: u16,
    /// Use every resolved field as identity when a group declares no key
    pub identity_fallback: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_depth: 20,
            identity_fallback: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShapeNode {
    pub kind: NodeKind,
    /// Field name (type name for the root)
    pub name: String,
    /// Type declaring this field
    pub entity: String,
    /// Type held by a root/nested/collection node
    pub target: Option<String>,
    /// Effective nullability: declared, or inherited from a nullable nested ancestor
    pub nullable: bool,
    pub declared_nullable: bool,
    /// Inside a collection element: a NULL here rejects the element instead of failing
    pub guarded: bool,
    pub source_column: Option<ColumnMetadata>,
    pub is_key: bool,
    pub parent: Option<NodeId>,
    /// Position among the parent's children
    pub slot: usize,
    pub children: Vec<NodeId>,
    /// Scalar children whose values identify one instance of this group
    pub identity: Vec<NodeId>,
    end: NodeId,
}

impl ShapeNode {
    pub fn is_container(&self) -> bool {
        !matches!(self.kind, NodeKind::Scalar(_))
    }

    pub fn ordinal(&self) -> Option<usize> {
        self.source_column.as_ref().map(|c| c.ordinal)
    }

    pub fn column_name(&self) -> Option<&str> {
        self.source_column.as_ref().map(|c| c.name.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ShapeTree {
    nodes: Vec<ShapeNode>,
    column_count: usize,
}

impl ShapeTree {
    /// Resolve `shape` against the result columns.
    ///
    /// Fails with every structural issue of the whole tree at once; no rows
    /// should be read when this fails.
    pub fn build(
        shape: &EntityShape,
        columns: &[ColumnMetadata],
        options: BuildOptions,
    ) -> Result<Self, ShapeError> {
        for column in columns.iter().filter(|c| c.table.is_none()) {
            log::warn!(
                "Column '{}' has no table information and cannot be mapped to a field",
                column.name
            );
        }

        let mut builder = TreeBuilder {
            columns,
            options,
            nodes: Vec::new(),
            issues: Vec::new(),
        };

        let root = builder.push(
            None,
            ShapeNode {
                kind: NodeKind::Root,
                name: shape.name.clone(),
                entity: shape.name.clone(),
                target: Some(shape.name.clone()),
                nullable: false,
                declared_nullable: false,
                guarded: false,
                source_column: None,
                is_key: false,
                parent: None,
                slot: 0,
                children: Vec::new(),
                identity: Vec::new(),
                end: 0,
            },
        );
        builder.build_fields(root, shape, 0, false, false);
        builder.finish(root);
        builder.assign_identities();

        if !builder.issues.is_empty() {
            return Err(ShapeError::Invalid {
                entity: shape.name.clone(),
                issues: builder.issues,
            });
        }

        Ok(Self {
            nodes: builder.nodes,
            column_count: columns.len(),
        })
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> &ShapeNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[ShapeNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of columns the tree was resolved against
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Ids of `id` and all of its descendants
    pub fn subtree(&self, id: NodeId) -> Range<NodeId> {
        id..self.nodes[id].end
    }

    /// Find a direct child by field name
    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .find(|&child| self.nodes[child].name == name)
    }

    pub fn has_collections(&self) -> bool {
        self.nodes.iter().any(|n| n.kind == NodeKind::Collection)
    }
}

struct TreeBuilder<'c> {
    columns: &'c [ColumnMetadata],
    options: BuildOptions,
    nodes: Vec<ShapeNode>,
    issues: Vec<ShapeIssue>,
}

impl TreeBuilder<'_> {
    fn push(&mut self, parent: Option<NodeId>, mut node: ShapeNode) -> NodeId {
        let id = self.nodes.len();
        node.parent = parent;
        node.end = id + 1;
        if let Some(parent) = parent {
            node.slot = self.nodes[parent].children.len();
            self.nodes[parent].children.push(id);
        }
        self.nodes.push(node);
        id
    }

    fn finish(&mut self, id: NodeId) {
        self.nodes[id].end = self.nodes.len();
    }

    fn resolve(&self, owner: &EntityShape, field: &FieldShape) -> Option<ColumnMetadata> {
        let column = field.column_name();
        self.columns
            .iter()
            .find(|c| c.name == column && c.belongs_to(owner.schema.as_deref(), &owner.table))
            .cloned()
    }

    fn build_fields(
        &mut self,
        parent: NodeId,
        owner: &EntityShape,
        depth: u16,
        inherited_nullable: bool,
        guarded: bool,
    ) {
        for field in owner.fields.iter().filter(|f| !f.excluded) {
            match &field.kind {
                FieldKind::Scalar(ty) => {
                    let column = self.resolve(owner, field);
                    let nullable = field.nullable || inherited_nullable;
                    if column.is_none() && !nullable {
                        self.issues.push(ShapeIssue::UnresolvedField {
                            entity: owner.name.clone(),
                            field: field.name.clone(),
                            column: field.column_name().to_string(),
                            table: owner.table.clone(),
                        });
                    }
                    let is_key = column.as_ref().is_some_and(|c| c.is_key || field.key);
                    self.push(
                        Some(parent),
                        ShapeNode {
                            kind: NodeKind::Scalar(*ty),
                            name: field.name.clone(),
                            entity: owner.name.clone(),
                            target: None,
                            nullable,
                            declared_nullable: field.nullable,
                            guarded,
                            source_column: column,
                            is_key,
                            parent: None,
                            slot: 0,
                            children: Vec::new(),
                            identity: Vec::new(),
                            end: 0,
                        },
                    );
                }
                FieldKind::Nested(source) | FieldKind::Collection(source) => {
                    if depth >= self.options.max_depth {
                        log::debug!(
                            "Leaving out '{}.{}': beyond max depth {}",
                            owner.name,
                            field.name,
                            self.options.max_depth
                        );
                        continue;
                    }

                    let target = source.resolve();
                    let is_collection = matches!(field.kind, FieldKind::Collection(_));
                    // collections are never null, only empty
                    let nullable = !is_collection && (field.nullable || inherited_nullable);
                    let id = self.push(
                        Some(parent),
                        ShapeNode {
                            kind: if is_collection {
                                NodeKind::Collection
                            } else {
                                NodeKind::Nested
                            },
                            name: field.name.clone(),
                            entity: owner.name.clone(),
                            target: Some(target.name.clone()),
                            nullable,
                            declared_nullable: field.nullable,
                            guarded,
                            source_column: None,
                            is_key: false,
                            parent: None,
                            slot: 0,
                            children: Vec::new(),
                            identity: Vec::new(),
                            end: 0,
                        },
                    );

                    if is_collection {
                        self.build_fields(id, &target, depth + 1, false, true);
                    } else {
                        self.build_fields(id, &target, depth + 1, nullable, guarded);
                    }
                    self.finish(id);
                }
            }
        }
    }

    fn assign_identities(&mut self) {
        let has_collections = self.nodes.iter().any(|n| n.kind == NodeKind::Collection);

        for id in 0..self.nodes.len() {
            if !self.nodes[id].is_container() {
                continue;
            }

            let resolved: Vec<NodeId> = self.nodes[id]
                .children
                .iter()
                .copied()
                .filter(|&c| {
                    let child = &self.nodes[c];
                    !child.is_container() && child.source_column.is_some()
                })
                .collect();
            let keys: Vec<NodeId> = resolved
                .iter()
                .copied()
                .filter(|&c| self.nodes[c].is_key)
                .collect();

            let node = &self.nodes[id];
            let identity = if !keys.is_empty() {
                keys
            } else {
                match node.kind {
                    NodeKind::Nested => resolved,
                    NodeKind::Root if !has_collections => Vec::new(),
                    NodeKind::Root | NodeKind::Collection => {
                        let entity = node.target.clone().unwrap_or_else(|| node.name.clone());
                        let field = (node.kind == NodeKind::Collection).then(|| node.name.clone());
                        if self.options.identity_fallback {
                            log::warn!(
                                "'{}' declares no key column; identifying by all {} resolved fields",
                                entity,
                                resolved.len()
                            );
                            resolved
                        } else {
                            self.issues
                                .push(ShapeIssue::MissingIdentity { entity, field });
                            Vec::new()
                        }
                    }
                    NodeKind::Scalar(_) => Vec::new(),
                }
            };
            self.nodes[id].identity = identity;
        }
    }
}
