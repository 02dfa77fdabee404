//! QuiverDB: an embedded, in-process property-graph database with Cypher
//! query support.
//!
//! A [`GraphDb`] owns an in-memory directed multigraph and executes a
//! Cypher subset against it:
//!
//! ```
//! use quiverdb::GraphDb;
//!
//! let mut db = GraphDb::new();
//! db.execute("CREATE (a:Person {name: 'Alice', age: 33})").unwrap();
//! db.execute("CREATE (b:Person {name: 'Bob', age: 25})").unwrap();
//!
//! let result = db
//!     .execute("MATCH (p:Person) WHERE p.age > 30 RETURN p.name")
//!     .unwrap();
//! assert_eq!(result.len(), 1);
//! ```
//!
//! Mutation is also available programmatically via the `create_*` /
//! `delete_*` methods, transactions via [`GraphDb::transaction`], and
//! persistence via the `save_*` / `load_*` methods.

mod error;
mod transaction;

use std::collections::BTreeMap;
use std::path::Path;

use quiverdb_graph::{codec, Edge, EdgeId, Node, NodeId, Snapshot, Store};
use tracing::{debug, info};

pub use error::{Error, Result};
pub use quiverdb_graph::{EdgeSpec, Value};
pub use quiverdb_query::{Params, QueryResult, Record};

/// The main database handle.
///
/// Single-writer: a `GraphDb` must not be shared across threads without
/// external mutual exclusion. Queries do not mutate the store unless they
/// contain `CREATE` or `DELETE` clauses.
///
/// Mutating queries apply their writes as clauses run; a query that fails
/// midway leaves earlier writes in place. Wrap calls in
/// [`GraphDb::transaction`] when all-or-nothing behaviour is needed.
#[derive(Debug, Default)]
pub struct GraphDb {
    pub(crate) store: Store,
    pub(crate) active_snapshot: Option<Snapshot>,
}

impl GraphDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.store.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.store.edge_count()
    }

    /// Read-only access to the underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    // -- Mutation --------------------------------------------------------

    pub fn create_node(
        &mut self,
        labels: Vec<String>,
        properties: BTreeMap<String, Value>,
    ) -> NodeId {
        self.store.create_node(labels, properties)
    }

    /// Creates a node under an explicit id; fails if the id is taken.
    pub fn create_node_with_id(
        &mut self,
        id: NodeId,
        labels: Vec<String>,
        properties: BTreeMap<String, Value>,
    ) -> Result<NodeId> {
        Ok(self.store.create_node_with_id(id, labels, properties)?)
    }

    pub fn create_edge(
        &mut self,
        src: NodeId,
        dst: NodeId,
        rel_type: impl Into<String>,
        properties: BTreeMap<String, Value>,
    ) -> Result<EdgeId> {
        Ok(self.store.create_edge(src, dst, rel_type, properties)?)
    }

    /// Creates many edges atomically: endpoints are validated first, and a
    /// failure creates nothing.
    pub fn create_edges_batch(&mut self, specs: Vec<EdgeSpec>) -> Result<Vec<EdgeId>> {
        Ok(self.store.create_edges_batch(specs)?)
    }

    /// Deletes a node and all incident edges.
    pub fn delete_node(&mut self, id: NodeId) -> Result<()> {
        Ok(self.store.delete_node(id)?)
    }

    pub fn delete_edge(&mut self, id: EdgeId) -> Result<()> {
        Ok(self.store.delete_edge(id)?)
    }

    pub fn set_node_property(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: Value,
    ) -> Result<()> {
        Ok(self.store.set_node_property(id, key, value)?)
    }

    pub fn set_edge_property(
        &mut self,
        id: EdgeId,
        key: impl Into<String>,
        value: Value,
    ) -> Result<()> {
        Ok(self.store.set_edge_property(id, key, value)?)
    }

    pub fn remove_node_property(&mut self, id: NodeId, key: &str) -> Result<()> {
        Ok(self.store.remove_node_property(id, key)?)
    }

    pub fn remove_edge_property(&mut self, id: EdgeId, key: &str) -> Result<()> {
        Ok(self.store.remove_edge_property(id, key)?)
    }

    /// Removes all nodes and edges and resets id counters.
    pub fn clear(&mut self) {
        self.store.clear();
    }

    // -- Lookup ----------------------------------------------------------

    pub fn get_node(&self, id: NodeId) -> Result<&Node> {
        Ok(self.store.node(id)?)
    }

    pub fn get_edge(&self, id: EdgeId) -> Result<&Edge> {
        Ok(self.store.edge(id)?)
    }

    pub fn nodes_by_label<'a>(&'a self, label: &str) -> impl Iterator<Item = &'a Node> {
        self.store.nodes_by_label(label)
    }

    pub fn edges_by_type<'a>(&'a self, rel_type: &str) -> impl Iterator<Item = &'a Edge> {
        self.store.edges_by_type(rel_type)
    }

    /// Nodes matching all given labels and exact property values.
    pub fn find_nodes<'a>(
        &'a self,
        labels: &'a [String],
        properties: &'a BTreeMap<String, Value>,
    ) -> impl Iterator<Item = &'a Node> {
        self.store.find_nodes(labels, properties)
    }

    /// Edges matching the given type (if any) and exact property values.
    pub fn find_edges<'a>(
        &'a self,
        rel_type: Option<&'a str>,
        properties: &'a BTreeMap<String, Value>,
    ) -> impl Iterator<Item = &'a Edge> {
        self.store.find_edges(rel_type, properties)
    }

    pub fn out_edges(&self, id: NodeId) -> &[EdgeId] {
        self.store.out_edges(id)
    }

    pub fn in_edges(&self, id: NodeId) -> &[EdgeId] {
        self.store.in_edges(id)
    }

    // -- Queries ---------------------------------------------------------

    /// Parses and executes a Cypher query.
    pub fn execute(&mut self, query: &str) -> Result<QueryResult> {
        self.execute_with_params(query, &Params::new())
    }

    /// Parses and executes a Cypher query with `$name` parameters.
    pub fn execute_with_params(&mut self, query: &str, params: &Params) -> Result<QueryResult> {
        debug!(query, "executing cypher query");
        let parsed = quiverdb_query::parse(query)?;
        Ok(quiverdb_query::execute(&mut self.store, &parsed, params)?)
    }

    // -- Persistence -----------------------------------------------------

    /// Saves the full store state to `path` in the compact binary format.
    pub fn save_binary(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        codec::save_binary(&self.store.snapshot(), path)?;
        info!(path = %path.display(), nodes = self.node_count(), edges = self.edge_count(), "saved binary snapshot");
        Ok(())
    }

    /// Replaces the store state with a binary snapshot read from `path`.
    pub fn load_binary(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let snapshot = codec::load_binary(path)?;
        self.store.restore(snapshot)?;
        info!(path = %path.display(), nodes = self.node_count(), edges = self.edge_count(), "loaded binary snapshot");
        Ok(())
    }

    /// Saves the full store state to `path` as human-readable JSON.
    pub fn save_text(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        codec::save_text(&self.store.snapshot(), path)?;
        info!(path = %path.display(), nodes = self.node_count(), edges = self.edge_count(), "saved text snapshot");
        Ok(())
    }

    /// Replaces the store state with a JSON snapshot read from `path`.
    pub fn load_text(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let snapshot = codec::load_text(path)?;
        self.store.restore(snapshot)?;
        info!(path = %path.display(), nodes = self.node_count(), edges = self.edge_count(), "loaded text snapshot");
        Ok(())
    }
}
