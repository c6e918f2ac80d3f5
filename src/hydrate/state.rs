//! Per-call hydration state
//!
//! `ValueState` is kept per descriptor node and says whether the current
//! identity group already wrote that node. `Record`s hold the entities under
//! construction; a record's slots line up with the children of the node that
//! describes it.

use crate::{
    shape::{NodeId, NodeKind, ShapeTree},
    value::DbValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueState {
    #[default]
    Unset,
    Set,
    SetNull,
}

pub type RecordId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Unset,
    Value(DbValue),
    /// Nested field hydrated as null
    Null,
    Object(RecordId),
    List(Vec<RecordId>),
}

#[derive(Debug, Clone)]
pub struct Record {
    pub slots: Vec<Slot>,
}

impl Record {
    /// Empty record for an instance of `container`
    pub fn for_node(tree: &ShapeTree, container: NodeId) -> Self {
        let slots = tree
            .node(container)
            .children
            .iter()
            .map(|&child| match tree.node(child).kind {
                NodeKind::Collection => Slot::List(Vec::new()),
                _ => Slot::Unset,
            })
            .collect();
        Self { slots }
    }
}
