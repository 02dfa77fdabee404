use std::collections::BTreeMap;

use crate::store::{EdgeId, NodeId};
use crate::value::Value;

/// A node to be restored or bulk-loaded into the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, Value>,
}

/// An edge to be restored or bulk-loaded into the store.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub src: NodeId,
    pub dst: NodeId,
    pub rel_type: String,
    pub properties: BTreeMap<String, Value>,
}

/// A deep, independent copy of the store's entire observable state.
///
/// Produced by `Store::snapshot()`, consumed by `Store::restore()` and the
/// snapshot codecs. Records are held in ascending id order, which is also
/// the adjacency insertion order, so a restore reproduces the original
/// iteration order exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub next_node_id: u64,
    pub next_edge_id: u64,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}
