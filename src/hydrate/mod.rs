//! Row hydration: flat joined rows in, nested entities out
//!
//! One logical entity usually spans several physical rows once 1:N joins are
//! involved:
//!
//! ```text
//! root.Id  root.Name  child.Id  child.Name  grandchild.Id
//! 1        "a"        10        "x"         100
//! 1        "a"        10        "x"         101
//! 1        "a"        11        "y"         NULL     <- left join, no grandchild
//! 2        "b"        12        "z"         102
//! ```
//!
//! hydrates into two roots, the first holding children 10 (two grandchildren)
//! and 11 (none), the second holding child 12.
//!
//! Per row the [`Hydrator`]:
//! 1. resets the value state of every group whose identity tuple changed since
//!    the previous row, together with its whole subtree
//! 2. finds the root whose key values match the row, or starts a new one
//! 3. fills the root depth-first; a field written once in the current group is
//!    left alone (first write wins), collection elements are matched by
//!    identity, and brand-new elements built only from NULLs are dropped

pub mod errors;
pub mod state;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub use errors::HydrateError;
pub use state::{Record, RecordId, Slot, ValueState};

use crate::{
    shape::{NodeId, NodeKind, ShapeTree},
    value::{DbValue, ScalarType},
};

/// What a row did to the result list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    NewRoot,
    Merged,
}

/// What populating one instance from one row produced
#[derive(Debug, Default, Clone, Copy)]
struct Fill {
    /// Some field under the instance received a non-null value
    any_value: bool,
    /// A field declared non-nullable received NULL
    disallowed_null: bool,
}

impl Fill {
    fn absorb(&mut self, other: Fill) {
        self.any_value |= other.any_value;
        self.disallowed_null |= other.disallowed_null;
    }

    fn is_valid(&self) -> bool {
        self.any_value && !self.disallowed_null
    }
}

/// Hydration state for one call. Never reuse across calls.
pub struct Hydrator<'t> {
    tree: &'t ShapeTree,
    states: Vec<ValueState>,
    records: Vec<Record>,
    roots: Vec<RecordId>,
    prev: Option<Vec<DbValue>>,
}

impl<'t> Hydrator<'t> {
    pub fn new(tree: &'t ShapeTree) -> Self {
        Self {
            tree,
            states: vec![ValueState::Unset; tree.len()],
            records: Vec::new(),
            roots: Vec::new(),
            prev: None,
        }
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    pub fn state(&self, node: NodeId) -> ValueState {
        self.states[node]
    }

    /// Whether `row` belongs to none of the roots built so far
    pub fn would_start_new_root(&self, row: &[DbValue]) -> bool {
        self.find_root(row).is_none()
    }

    /// Merge one row into the entities built so far
    pub fn push_row(&mut self, row: Vec<DbValue>) -> Result<RowOutcome, HydrateError> {
        if row.len() != self.tree.column_count() {
            return Err(HydrateError::RowWidth {
                expected: self.tree.column_count(),
                found: row.len(),
            });
        }

        if let Some(prev) = self.prev.take() {
            self.reset_changed_groups(&prev, &row);
        }

        let root = self.tree.root();
        let (record, outcome) = match self.find_root(&row) {
            Some(record) => (record, RowOutcome::Merged),
            None => {
                let record = self.new_record(root);
                self.roots.push(record);
                self.reset(root);
                (record, RowOutcome::NewRoot)
            }
        };

        self.populate(root, record, &row)?;
        self.prev = Some(row);
        Ok(outcome)
    }

    /// Render every root as a JSON object, in first-seen order
    pub fn finish(self) -> Vec<Value> {
        let root = self.tree.root();
        self.roots
            .iter()
            .map(|&record| self.render(root, record))
            .collect()
    }

    fn new_record(&mut self, container: NodeId) -> RecordId {
        self.records.push(Record::for_node(self.tree, container));
        self.records.len() - 1
    }

    fn reset(&mut self, node: NodeId) {
        for id in self.tree.subtree(node) {
            self.states[id] = ValueState::Unset;
        }
    }

    fn reset_changed_groups(&mut self, prev: &[DbValue], row: &[DbValue]) {
        let tree = self.tree;
        let mut id = 0;
        while id < tree.len() {
            let node = tree.node(id);
            let changed = node.is_container()
                && node.identity.iter().any(|&key| {
                    let ordinal = tree.node(key).ordinal();
                    ordinal.and_then(|o| prev.get(o)) != ordinal.and_then(|o| row.get(o))
                });
            if changed {
                let subtree = tree.subtree(id);
                id = subtree.end;
                for reset in subtree {
                    self.states[reset] = ValueState::Unset;
                }
            } else {
                id += 1;
            }
        }
    }

    /// Whether `record` (an instance of `container`) carries the row's identity values
    fn matches_identity(&self, container: NodeId, record: RecordId, row: &[DbValue]) -> bool {
        let tree = self.tree;
        tree.node(container).identity.iter().all(|&key| {
            let node = tree.node(key);
            match (&self.records[record].slots[node.slot], node.ordinal()) {
                (Slot::Value(value), Some(ordinal)) => row.get(ordinal) == Some(value),
                _ => false,
            }
        })
    }

    fn find_root(&self, row: &[DbValue]) -> Option<RecordId> {
        let root = self.tree.root();
        if self.tree.node(root).identity.is_empty() {
            // no key: every row is its own root
            return None;
        }
        // most recent first; joined rows of one root are usually adjacent
        self.roots
            .iter()
            .rev()
            .copied()
            .find(|&record| self.matches_identity(root, record, row))
    }

    fn populate(
        &mut self,
        container: NodeId,
        record: RecordId,
        row: &[DbValue],
    ) -> Result<Fill, HydrateError> {
        let tree = self.tree;
        let mut fill = Fill::default();
        for &child in &tree.node(container).children {
            match tree.node(child).kind {
                NodeKind::Scalar(ty) => self.populate_scalar(child, ty, record, row, &mut fill)?,
                NodeKind::Nested => self.populate_nested(child, record, row, &mut fill)?,
                NodeKind::Collection => self.populate_collection(child, record, row, &mut fill)?,
                NodeKind::Root => {}
            }
        }
        Ok(fill)
    }

    fn populate_scalar(
        &mut self,
        id: NodeId,
        ty: ScalarType,
        record: RecordId,
        row: &[DbValue],
        fill: &mut Fill,
    ) -> Result<(), HydrateError> {
        if self.states[id] != ValueState::Unset {
            return Ok(());
        }

        let tree = self.tree;
        let node = tree.node(id);
        let Some(column) = node.source_column.as_ref() else {
            // unresolved, which the builder only allows for nullable fields
            self.records[record].slots[node.slot] = Slot::Value(DbValue::Null);
            self.states[id] = ValueState::SetNull;
            return Ok(());
        };

        let value = row.get(column.ordinal).ok_or(HydrateError::RowWidth {
            expected: column.ordinal + 1,
            found: row.len(),
        })?;

        if value.is_null() {
            if !node.nullable && !node.guarded {
                return Err(HydrateError::NullabilityViolation {
                    entity: node.entity.clone(),
                    field: node.name.clone(),
                    column: column.name.clone(),
                });
            }
            if !node.declared_nullable {
                fill.disallowed_null = true;
            }
            self.records[record].slots[node.slot] = Slot::Value(DbValue::Null);
            self.states[id] = ValueState::SetNull;
            return Ok(());
        }

        if !ty.accepts(value) {
            return Err(HydrateError::TypeMismatch {
                entity: node.entity.clone(),
                field: node.name.clone(),
                column: column.name.clone(),
                expected: ty,
                found: value.type_name(),
            });
        }

        self.records[record].slots[node.slot] = Slot::Value(value.clone());
        self.states[id] = ValueState::Set;
        fill.any_value = true;
        Ok(())
    }

    fn populate_nested(
        &mut self,
        id: NodeId,
        record: RecordId,
        row: &[DbValue],
        fill: &mut Fill,
    ) -> Result<(), HydrateError> {
        let tree = self.tree;
        let node = tree.node(id);
        let existing = match self.records[record].slots[node.slot] {
            Slot::Object(child) => Some(child),
            _ => None,
        };

        match (self.states[id], existing) {
            (ValueState::SetNull, _) => Ok(()),
            (ValueState::Set, None) => Ok(()),
            (ValueState::Set, Some(child)) => {
                let inner = self.populate(id, child, row)?;
                fill.absorb(inner);
                Ok(())
            }
            (ValueState::Unset, Some(child)) => {
                let inner = self.populate(id, child, row)?;
                if node.nullable && !inner.is_valid() {
                    // identity changed to all NULLs within the same parent
                    self.records[record].slots[node.slot] = Slot::Null;
                    self.states[id] = ValueState::SetNull;
                } else {
                    fill.absorb(inner);
                    self.states[id] = ValueState::Set;
                }
                Ok(())
            }
            (ValueState::Unset, None) => {
                let child = self.new_record(id);
                self.reset(id);
                let inner = self.populate(id, child, row)?;

                if node.nullable && !inner.is_valid() {
                    // outer join without a match: the whole object is absent
                    self.records.truncate(child);
                    self.records[record].slots[node.slot] = Slot::Null;
                    self.states[id] = ValueState::SetNull;
                } else {
                    self.records[record].slots[node.slot] = Slot::Object(child);
                    self.states[id] = ValueState::Set;
                    fill.absorb(inner);
                }
                Ok(())
            }
        }
    }

    fn populate_collection(
        &mut self,
        id: NodeId,
        record: RecordId,
        row: &[DbValue],
        fill: &mut Fill,
    ) -> Result<(), HydrateError> {
        let slot = self.tree.node(id).slot;
        let found = match &self.records[record].slots[slot] {
            Slot::List(items) => items
                .iter()
                .copied()
                .find(|&item| self.matches_identity(id, item, row)),
            _ => None,
        };

        if let Some(item) = found {
            self.populate(id, item, row)?;
            self.states[id] = ValueState::Set;
            fill.any_value = true;
            return Ok(());
        }

        let item = self.new_record(id);
        self.reset(id);
        let inner = self.populate(id, item, row)?;

        if inner.is_valid() {
            if let Slot::List(items) = &mut self.records[record].slots[slot] {
                items.push(item);
            }
            fill.any_value = true;
        } else {
            // phantom element from an outer join; drop it and everything under it
            self.records.truncate(item);
        }
        self.states[id] = ValueState::Set;
        Ok(())
    }

    fn render(&self, container: NodeId, record: RecordId) -> Value {
        let tree = self.tree;
        let mut map = Map::new();
        for &child in &tree.node(container).children {
            let node = tree.node(child);
            let value = match (&self.records[record].slots[node.slot], node.kind) {
                (Slot::Value(value), NodeKind::Scalar(ty)) => value.to_json(ty),
                (Slot::Object(inner), _) => self.render(child, *inner),
                (Slot::List(items), _) => Value::Array(
                    items
                        .iter()
                        .map(|&item| self.render(child, item))
                        .collect(),
                ),
                _ => Value::Null,
            };
            map.insert(node.name.clone(), value);
        }
        Value::Object(map)
    }
}

/// Hydrate rows into JSON objects shaped by `tree`
pub fn hydrate_values<I>(tree: &ShapeTree, rows: I) -> Result<Vec<Value>, HydrateError>
where
    I: IntoIterator<Item = Vec<DbValue>>,
{
    let mut hydrator = Hydrator::new(tree);
    for row in rows {
        hydrator.push_row(row)?;
    }
    Ok(hydrator.finish())
}

/// Hydrate rows into typed entities
pub fn hydrate<T, I>(tree: &ShapeTree, rows: I) -> Result<Vec<T>, HydrateError>
where
    T: DeserializeOwned,
    I: IntoIterator<Item = Vec<DbValue>>,
{
    decode(hydrate_values(tree, rows)?)
}

/// Decode hydrated JSON objects; any failure fails the whole batch
pub fn decode<T: DeserializeOwned>(values: Vec<Value>) -> Result<Vec<T>, HydrateError> {
    values
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(HydrateError::from))
        .collect()
}
