use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{Error, Result};
use crate::snapshot::{EdgeRecord, NodeRecord, Snapshot};
use crate::value::Value;

pub type NodeId = u64;
pub type EdgeId = u64;

/// A node: stable id, label set, property map.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, Value>,
}

impl Node {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// A directed edge between two nodes, with a single type tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub src: NodeId,
    pub dst: NodeId,
    pub rel_type: String,
    pub properties: BTreeMap<String, Value>,
}

/// Description of one edge for [`Store::create_edges_batch`].
#[derive(Debug, Clone)]
pub struct EdgeSpec {
    pub src: NodeId,
    pub dst: NodeId,
    pub rel_type: String,
    pub properties: BTreeMap<String, Value>,
}

/// In-memory directed property multigraph.
///
/// Nodes and edges are owned by the store and addressed by stable 64-bit
/// ids that are never reissued. Endpoint existence checks, id lookups and
/// label/type index hits are all O(1) map operations; adjacency lists keep
/// insertion order so query results are deterministic.
///
/// The store is single-writer: callers must not share it across threads
/// without external mutual exclusion.
#[derive(Debug, Default, Clone)]
pub struct Store {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    label_index: HashMap<String, BTreeSet<NodeId>>,
    type_index: HashMap<String, BTreeSet<EdgeId>>,
    adjacency_out: HashMap<NodeId, Vec<EdgeId>>,
    adjacency_in: HashMap<NodeId, Vec<EdgeId>>,
    next_node_id: u64,
    next_edge_id: u64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Creates a node with an auto-assigned id.
    pub fn create_node(
        &mut self,
        labels: Vec<String>,
        properties: BTreeMap<String, Value>,
    ) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        self.insert_node(Node {
            id,
            labels,
            properties,
        });
        id
    }

    /// Creates a node under a caller-chosen id.
    ///
    /// Fails with [`Error::DuplicateId`] if the id is live. The id counter
    /// advances past the supplied id so later auto-assignments never collide.
    pub fn create_node_with_id(
        &mut self,
        id: NodeId,
        labels: Vec<String>,
        properties: BTreeMap<String, Value>,
    ) -> Result<NodeId> {
        if self.nodes.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }
        if id >= self.next_node_id {
            self.next_node_id = id + 1;
        }
        self.insert_node(Node {
            id,
            labels,
            properties,
        });
        Ok(id)
    }

    fn insert_node(&mut self, node: Node) {
        for label in &node.labels {
            self.label_index
                .entry(label.clone())
                .or_default()
                .insert(node.id);
        }
        self.adjacency_out.insert(node.id, Vec::new());
        self.adjacency_in.insert(node.id, Vec::new());
        self.nodes.insert(node.id, node);
    }

    /// Creates a directed edge. Endpoint existence is a direct key lookup,
    /// never a scan.
    pub fn create_edge(
        &mut self,
        src: NodeId,
        dst: NodeId,
        rel_type: impl Into<String>,
        properties: BTreeMap<String, Value>,
    ) -> Result<EdgeId> {
        if !self.nodes.contains_key(&src) {
            return Err(Error::MissingNode(src));
        }
        if !self.nodes.contains_key(&dst) {
            return Err(Error::MissingNode(dst));
        }
        Ok(self.insert_edge(src, dst, rel_type.into(), properties))
    }

    /// Creates many edges at once. All endpoints are validated up front;
    /// if any is missing, nothing is created.
    pub fn create_edges_batch(&mut self, specs: Vec<EdgeSpec>) -> Result<Vec<EdgeId>> {
        for spec in &specs {
            if !self.nodes.contains_key(&spec.src) {
                return Err(Error::MissingNode(spec.src));
            }
            if !self.nodes.contains_key(&spec.dst) {
                return Err(Error::MissingNode(spec.dst));
            }
        }
        let ids = specs
            .into_iter()
            .map(|spec| self.insert_edge(spec.src, spec.dst, spec.rel_type, spec.properties))
            .collect();
        Ok(ids)
    }

    fn insert_edge(
        &mut self,
        src: NodeId,
        dst: NodeId,
        rel_type: String,
        properties: BTreeMap<String, Value>,
    ) -> EdgeId {
        let id = self.next_edge_id;
        self.next_edge_id += 1;
        self.type_index
            .entry(rel_type.clone())
            .or_default()
            .insert(id);
        self.adjacency_out.entry(src).or_default().push(id);
        self.adjacency_in.entry(dst).or_default().push(id);
        self.edges.insert(
            id,
            Edge {
                id,
                src,
                dst,
                rel_type,
                properties,
            },
        );
        id
    }

    /// Deletes a node and every incident edge.
    pub fn delete_node(&mut self, id: NodeId) -> Result<()> {
        if !self.nodes.contains_key(&id) {
            return Err(Error::NodeNotFound(id));
        }
        let mut incident: Vec<EdgeId> = self.adjacency_out.get(&id).cloned().unwrap_or_default();
        incident.extend(self.adjacency_in.get(&id).cloned().unwrap_or_default());
        incident.sort_unstable();
        incident.dedup();
        for edge_id in incident {
            self.delete_edge(edge_id)?;
        }
        let node = self.nodes.remove(&id).expect("checked above");
        for label in &node.labels {
            if let Some(set) = self.label_index.get_mut(label) {
                set.remove(&id);
                if set.is_empty() {
                    self.label_index.remove(label);
                }
            }
        }
        self.adjacency_out.remove(&id);
        self.adjacency_in.remove(&id);
        Ok(())
    }

    pub fn delete_edge(&mut self, id: EdgeId) -> Result<()> {
        let edge = self.edges.remove(&id).ok_or(Error::EdgeNotFound(id))?;
        if let Some(set) = self.type_index.get_mut(&edge.rel_type) {
            set.remove(&id);
            if set.is_empty() {
                self.type_index.remove(&edge.rel_type);
            }
        }
        if let Some(out) = self.adjacency_out.get_mut(&edge.src) {
            out.retain(|e| *e != id);
        }
        if let Some(inn) = self.adjacency_in.get_mut(&edge.dst) {
            inn.retain(|e| *e != id);
        }
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(Error::NodeNotFound(id))
    }

    pub fn edge(&self, id: EdgeId) -> Result<&Edge> {
        self.edges.get(&id).ok_or(Error::EdgeNotFound(id))
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn set_node_property(&mut self, id: NodeId, key: impl Into<String>, value: Value) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        node.properties.insert(key.into(), value);
        Ok(())
    }

    pub fn set_edge_property(&mut self, id: EdgeId, key: impl Into<String>, value: Value) -> Result<()> {
        let edge = self.edges.get_mut(&id).ok_or(Error::EdgeNotFound(id))?;
        edge.properties.insert(key.into(), value);
        Ok(())
    }

    /// Removes a node property. Missing keys are a no-op.
    pub fn remove_node_property(&mut self, id: NodeId, key: &str) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        node.properties.remove(key);
        Ok(())
    }

    /// Removes an edge property. Missing keys are a no-op.
    pub fn remove_edge_property(&mut self, id: EdgeId, key: &str) -> Result<()> {
        let edge = self.edges.get_mut(&id).ok_or(Error::EdgeNotFound(id))?;
        edge.properties.remove(key);
        Ok(())
    }

    /// Adds a label to a node if it does not carry it yet.
    pub fn add_node_label(&mut self, id: NodeId, label: impl Into<String>) -> Result<()> {
        let label = label.into();
        let node = self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        if !node.has_label(&label) {
            node.labels.push(label.clone());
            self.label_index.entry(label).or_default().insert(id);
        }
        Ok(())
    }

    /// All nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All edges in ascending id order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Nodes carrying `label`, in ascending id order. O(1) index hit plus
    /// O(k) iteration.
    pub fn nodes_by_label<'a>(&'a self, label: &str) -> Box<dyn Iterator<Item = &'a Node> + 'a> {
        match self.label_index.get(label) {
            Some(ids) => Box::new(ids.iter().filter_map(|id| self.nodes.get(id))),
            None => Box::new(std::iter::empty()),
        }
    }

    /// Edges of `rel_type`, in ascending id order.
    pub fn edges_by_type<'a>(&'a self, rel_type: &str) -> Box<dyn Iterator<Item = &'a Edge> + 'a> {
        match self.type_index.get(rel_type) {
            Some(ids) => Box::new(ids.iter().filter_map(|id| self.edges.get(id))),
            None => Box::new(std::iter::empty()),
        }
    }

    /// Outgoing edge ids of a node, in insertion order.
    pub fn out_edges(&self, id: NodeId) -> &[EdgeId] {
        self.adjacency_out.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Incoming edge ids of a node, in insertion order.
    pub fn in_edges(&self, id: NodeId) -> &[EdgeId] {
        self.adjacency_in.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes matching all given labels and property values.
    pub fn find_nodes<'a>(
        &'a self,
        labels: &'a [String],
        properties: &'a BTreeMap<String, Value>,
    ) -> impl Iterator<Item = &'a Node> {
        self.nodes.values().filter(move |node| {
            labels.iter().all(|l| node.has_label(l))
                && properties
                    .iter()
                    .all(|(k, v)| node.properties.get(k) == Some(v))
        })
    }

    /// Edges matching the given type (if any) and property values.
    pub fn find_edges<'a>(
        &'a self,
        rel_type: Option<&'a str>,
        properties: &'a BTreeMap<String, Value>,
    ) -> impl Iterator<Item = &'a Edge> {
        self.edges.values().filter(move |edge| {
            rel_type.is_none_or(|t| edge.rel_type == t)
                && properties
                    .iter()
                    .all(|(k, v)| edge.properties.get(k) == Some(v))
        })
    }

    /// Removes all nodes and edges. Id counters are reset.
    pub fn clear(&mut self) {
        *self = Store::default();
    }

    /// Captures the full observable state as an independent deep copy.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            next_node_id: self.next_node_id,
            next_edge_id: self.next_edge_id,
            nodes: self
                .nodes
                .values()
                .map(|n| NodeRecord {
                    id: n.id,
                    labels: n.labels.clone(),
                    properties: n.properties.clone(),
                })
                .collect(),
            edges: self
                .edges
                .values()
                .map(|e| EdgeRecord {
                    id: e.id,
                    src: e.src,
                    dst: e.dst,
                    rel_type: e.rel_type.clone(),
                    properties: e.properties.clone(),
                })
                .collect(),
        }
    }

    /// Replaces the store's state with a previously captured snapshot.
    ///
    /// Snapshots produced by [`Store::snapshot`] always restore cleanly; the
    /// error path only fires for hand-built or corrupted record sets.
    pub fn restore(&mut self, snapshot: Snapshot) -> Result<()> {
        self.bulk_load(
            snapshot.nodes,
            snapshot.edges,
            snapshot.next_node_id,
            snapshot.next_edge_id,
        )
    }

    /// Rebuilds the store from flat records in O(n).
    ///
    /// Indexes are constructed in one pass per collection rather than per
    /// element. Edge endpoints are validated against the node set before any
    /// state is replaced, so a failed load leaves the store untouched.
    pub fn bulk_load(
        &mut self,
        nodes: Vec<NodeRecord>,
        edges: Vec<EdgeRecord>,
        next_node_id: u64,
        next_edge_id: u64,
    ) -> Result<()> {
        let mut node_map: BTreeMap<NodeId, Node> = BTreeMap::new();
        for record in nodes {
            if node_map.contains_key(&record.id) {
                return Err(Error::DuplicateId(record.id));
            }
            node_map.insert(
                record.id,
                Node {
                    id: record.id,
                    labels: record.labels,
                    properties: record.properties,
                },
            );
        }
        for record in &edges {
            if !node_map.contains_key(&record.src) {
                return Err(Error::MissingNode(record.src));
            }
            if !node_map.contains_key(&record.dst) {
                return Err(Error::MissingNode(record.dst));
            }
        }

        let mut label_index: HashMap<String, BTreeSet<NodeId>> = HashMap::new();
        let mut adjacency_out: HashMap<NodeId, Vec<EdgeId>> = HashMap::new();
        let mut adjacency_in: HashMap<NodeId, Vec<EdgeId>> = HashMap::new();
        for node in node_map.values() {
            for label in &node.labels {
                label_index.entry(label.clone()).or_default().insert(node.id);
            }
            adjacency_out.insert(node.id, Vec::new());
            adjacency_in.insert(node.id, Vec::new());
        }

        let mut type_index: HashMap<String, BTreeSet<EdgeId>> = HashMap::new();
        let mut edge_map: BTreeMap<EdgeId, Edge> = BTreeMap::new();
        let mut max_node_id = 0u64;
        let mut max_edge_id = 0u64;
        for record in edges {
            if edge_map.contains_key(&record.id) {
                return Err(Error::DuplicateId(record.id));
            }
            type_index
                .entry(record.rel_type.clone())
                .or_default()
                .insert(record.id);
            adjacency_out
                .entry(record.src)
                .or_default()
                .push(record.id);
            adjacency_in.entry(record.dst).or_default().push(record.id);
            max_edge_id = max_edge_id.max(record.id);
            edge_map.insert(
                record.id,
                Edge {
                    id: record.id,
                    src: record.src,
                    dst: record.dst,
                    rel_type: record.rel_type,
                    properties: record.properties,
                },
            );
        }
        if let Some(last) = node_map.keys().next_back() {
            max_node_id = *last;
        }

        self.nodes = node_map;
        self.edges = edge_map;
        self.label_index = label_index;
        self.type_index = type_index;
        self.adjacency_out = adjacency_out;
        self.adjacency_in = adjacency_in;
        // Counters must strictly exceed every live id even if the caller
        // supplied stale values.
        self.next_node_id = next_node_id.max(if self.nodes.is_empty() {
            0
        } else {
            max_node_id + 1
        });
        self.next_edge_id = next_edge_id.max(if self.edges.is_empty() {
            0
        } else {
            max_edge_id + 1
        });
        Ok(())
    }
}
