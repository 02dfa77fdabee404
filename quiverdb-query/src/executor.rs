//! Query execution.
//!
//! Clauses are interpreted sequentially over a set of binding rows:
//! `MATCH` grows rows by pattern matching, `WHERE` filters them, `WITH`
//! re-projects them, `CREATE`/`DELETE` mutate the store per row, and
//! `RETURN` projects rows into records. `DISTINCT`, `ORDER BY`, `SKIP` and
//! `LIMIT` then shape the projected output.
//!
//! Mutating clauses write straight to the store as they run; callers that
//! need all-or-nothing behaviour across a failing query wrap the call in a
//! transaction.

use std::collections::{BTreeMap, HashMap, HashSet};

use quiverdb_graph::{Edge, EdgeId, NodeId, Store, Value};

use crate::Params;
use crate::ast::{
    AggregateCall, AggregateFunction, Clause, CreateClause, DeleteClause, Direction, Expression,
    HopRange, MatchClause, NodePattern, OrderByClause, OrderItem, PathElement, Pattern,
    Projection, PropertyMap, Query, RelDirection, RelPattern,
};
use crate::error::{Error, Result};
use crate::evaluator::{binding_value, evaluate, evaluate_predicate};
use crate::result::QueryResult;

/// Hard cap on variable-length traversal depth. Unbounded ranges (`*`,
/// `*n..`) stop here, which guarantees termination on cyclic graphs.
pub const MAX_VAR_LENGTH_HOPS: u32 = 15;

/// What a query variable is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Node(NodeId),
    Edge(EdgeId),
    /// A variable-length relationship binds the list of traversed edges.
    Edges(Vec<EdgeId>),
    Value(Value),
}

/// One binding row. Small, so linear search beats a map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cols: Vec<(String, Binding)>,
}

impl Row {
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.cols
            .iter()
            .find_map(|(k, v)| if k == name { Some(v) } else { None })
    }

    pub fn set(&mut self, name: impl Into<String>, binding: Binding) {
        let name = name.into();
        if let Some((_k, v)) = self.cols.iter_mut().find(|(k, _)| *k == name) {
            *v = binding;
        } else {
            self.cols.push((name, binding));
        }
    }

    pub fn with(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.set(name, binding);
        self
    }

    pub fn columns(&self) -> &[(String, Binding)] {
        &self.cols
    }
}

/// Materialises a node as a self-contained value: `{id, labels, properties}`.
pub fn node_value(store: &Store, id: NodeId) -> Value {
    match store.get_node(id) {
        Some(node) => {
            let mut map = BTreeMap::new();
            map.insert("id".to_string(), Value::Int(node.id as i64));
            map.insert(
                "labels".to_string(),
                Value::List(node.labels.iter().map(|l| Value::from(l.as_str())).collect()),
            );
            map.insert("properties".to_string(), Value::Map(node.properties.clone()));
            Value::Map(map)
        }
        None => Value::Null,
    }
}

/// Materialises an edge as `{id, src, dst, type, properties}`.
pub fn edge_value(store: &Store, id: EdgeId) -> Value {
    match store.get_edge(id) {
        Some(edge) => {
            let mut map = BTreeMap::new();
            map.insert("id".to_string(), Value::Int(edge.id as i64));
            map.insert("src".to_string(), Value::Int(edge.src as i64));
            map.insert("dst".to_string(), Value::Int(edge.dst as i64));
            map.insert("type".to_string(), Value::from(edge.rel_type.as_str()));
            map.insert("properties".to_string(), Value::Map(edge.properties.clone()));
            Value::Map(map)
        }
        None => Value::Null,
    }
}

type ProjectedRows = Vec<(Row, Option<Row>)>;

/// Executes a parsed query against the store.
pub fn execute(store: &mut Store, query: &Query, params: &Params) -> Result<QueryResult> {
    let mut rows: Vec<Row> = Vec::new();
    let mut seeded = false;
    let mut projected: Option<(Vec<String>, ProjectedRows)> = None;

    for clause in &query.clauses {
        match clause {
            Clause::Match(m) => {
                if !seeded {
                    rows = vec![Row::default()];
                    seeded = true;
                }
                rows = match_clause(store, rows, m, params)?;
            }
            Clause::Where(w) => {
                let mut kept = Vec::new();
                for row in rows {
                    if evaluate_predicate(&w.expression, &row, store, params)? {
                        kept.push(row);
                    }
                }
                rows = kept;
            }
            Clause::With(w) => {
                if !seeded {
                    rows = vec![Row::default()];
                    seeded = true;
                }
                let (_, pairs) = project(store, std::mem::take(&mut rows), &w.items, w.distinct, params)?;
                rows = pairs.into_iter().map(|(out, _)| out).collect();
            }
            Clause::Create(c) => {
                if !seeded {
                    rows = vec![Row::default()];
                    seeded = true;
                }
                create_clause(store, &mut rows, c, params)?;
            }
            Clause::Delete(d) => {
                delete_clause(store, &rows, d)?;
            }
            Clause::Return(r) => {
                projected = Some(project(
                    store,
                    std::mem::take(&mut rows),
                    &r.items,
                    r.distinct,
                    params,
                )?);
            }
            Clause::OrderBy(order) => match projected.as_mut() {
                Some((columns, pairs)) => order_projected(store, pairs, columns, order, params),
                None => order_bindings(store, &mut rows, order, params),
            },
            Clause::Skip(n) => match projected.as_mut() {
                Some((_, pairs)) => drop_front(pairs, *n as usize),
                None => drop_front(&mut rows, *n as usize),
            },
            Clause::Limit(n) => match projected.as_mut() {
                Some((_, pairs)) => pairs.truncate(*n as usize),
                None => rows.truncate(*n as usize),
            },
        }
    }

    match projected {
        Some((columns, pairs)) => {
            let records = pairs
                .into_iter()
                .map(|(out, _)| materialize(store, &out))
                .collect();
            Ok(QueryResult::new(columns, records))
        }
        None => Ok(QueryResult::new(Vec::new(), Vec::new())),
    }
}

fn drop_front<T>(items: &mut Vec<T>, n: usize) {
    if n >= items.len() {
        items.clear();
    } else {
        items.drain(..n);
    }
}

fn materialize(store: &Store, row: &Row) -> Vec<Value> {
    row.columns()
        .iter()
        .map(|(_, binding)| binding_value(binding, store))
        .collect()
}

fn row_key(store: &Store, row: &Row) -> String {
    format!("{:?}", materialize(store, row))
}

// ---------------------------------------------------------------------------
// MATCH
// ---------------------------------------------------------------------------

/// In-flight state while matching one chain: the row built so far, the node
/// the chain currently ends at, and the edges already used by this path.
/// Edge re-use within a single path is forbidden; node re-visits are fine.
#[derive(Debug, Clone)]
struct PathState {
    row: Row,
    end: NodeId,
    used_edges: Vec<EdgeId>,
}

fn match_clause(
    store: &Store,
    rows: Vec<Row>,
    clause: &MatchClause,
    params: &Params,
) -> Result<Vec<Row>> {
    let mut current = rows;
    // Comma-separated patterns join on shared variables: bound variables
    // constrain candidate sets in later patterns.
    for pattern in &clause.patterns {
        let mut next = Vec::new();
        for row in current {
            next.extend(match_chain(store, &row, pattern, params)?);
        }
        current = next;
    }
    Ok(current)
}

fn match_chain(
    store: &Store,
    row: &Row,
    pattern: &Pattern,
    params: &Params,
) -> Result<Vec<Row>> {
    let mut elements = pattern.elements.iter();
    let first = match elements.next() {
        Some(PathElement::Node(n)) => n,
        _ => return Err(Error::Other("pattern must start with a node".to_string())),
    };

    let mut states = node_candidates(store, row, first, params)?;

    loop {
        let rel = match elements.next() {
            Some(PathElement::Relationship(r)) => r,
            Some(PathElement::Node(_)) => {
                return Err(Error::Other("expected relationship in pattern".to_string()));
            }
            None => break,
        };
        let node = match elements.next() {
            Some(PathElement::Node(n)) => n,
            _ => return Err(Error::Other("pattern must end with a node".to_string())),
        };

        let mut next_states = Vec::new();
        for state in states {
            next_states.extend(extend_state(store, state, rel, node, params)?);
        }
        states = next_states;
    }

    Ok(states.into_iter().map(|s| s.row).collect())
}

/// Candidate start nodes for a node pattern: the bound node if the variable
/// is already bound, otherwise the label index (or all nodes), in ascending
/// id order.
fn node_candidates(
    store: &Store,
    row: &Row,
    npat: &NodePattern,
    params: &Params,
) -> Result<Vec<PathState>> {
    if let Some(var) = &npat.variable
        && let Some(binding) = row.get(var)
    {
        return match binding {
            Binding::Node(id) => {
                let id = *id;
                if node_matches(store, id, npat, row, params)? {
                    Ok(vec![PathState {
                        row: row.clone(),
                        end: id,
                        used_edges: Vec::new(),
                    }])
                } else {
                    Ok(Vec::new())
                }
            }
            _ => Ok(Vec::new()),
        };
    }

    let candidates: Vec<NodeId> = match npat.labels.first() {
        Some(label) => store.nodes_by_label(label).map(|n| n.id).collect(),
        None => store.nodes().map(|n| n.id).collect(),
    };

    let mut states = Vec::new();
    for id in candidates {
        if !node_matches(store, id, npat, row, params)? {
            continue;
        }
        let mut new_row = row.clone();
        if let Some(var) = &npat.variable {
            new_row.set(var.clone(), Binding::Node(id));
        }
        states.push(PathState {
            row: new_row,
            end: id,
            used_edges: Vec::new(),
        });
    }
    Ok(states)
}

fn node_matches(
    store: &Store,
    id: NodeId,
    npat: &NodePattern,
    row: &Row,
    params: &Params,
) -> Result<bool> {
    let Some(node) = store.get_node(id) else {
        return Ok(false);
    };
    if !npat.labels.iter().all(|l| node.has_label(l)) {
        return Ok(false);
    }
    if let Some(map) = &npat.properties {
        return properties_match(&node.properties, map, row, store, params);
    }
    Ok(true)
}

fn properties_match(
    actual: &BTreeMap<String, Value>,
    expected: &PropertyMap,
    row: &Row,
    store: &Store,
    params: &Params,
) -> Result<bool> {
    for pair in &expected.entries {
        let wanted = evaluate(&pair.value, row, store, params)?;
        if actual.get(&pair.key) != Some(&wanted) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn edge_matches(
    store: &Store,
    edge: &Edge,
    rpat: &RelPattern,
    row: &Row,
    params: &Params,
) -> Result<bool> {
    if !rpat.types.is_empty() && !rpat.types.iter().any(|t| *t == edge.rel_type) {
        return Ok(false);
    }
    if let Some(map) = &rpat.properties {
        return properties_match(&edge.properties, map, row, store, params);
    }
    Ok(true)
}

/// Candidate (edge, neighbour) pairs leaving `node` in the pattern's
/// direction. Adjacency lists iterate in insertion order; the undirected
/// case unions outgoing then incoming without repeating self-loops.
fn neighbor_edges(store: &Store, node: NodeId, direction: RelDirection) -> Vec<(EdgeId, NodeId)> {
    let mut out = Vec::new();
    match direction {
        RelDirection::Outgoing => {
            for &edge_id in store.out_edges(node) {
                if let Some(edge) = store.get_edge(edge_id) {
                    out.push((edge_id, edge.dst));
                }
            }
        }
        RelDirection::Incoming => {
            for &edge_id in store.in_edges(node) {
                if let Some(edge) = store.get_edge(edge_id) {
                    out.push((edge_id, edge.src));
                }
            }
        }
        RelDirection::Undirected => {
            let mut seen = HashSet::new();
            for &edge_id in store.out_edges(node) {
                if let Some(edge) = store.get_edge(edge_id)
                    && seen.insert(edge_id)
                {
                    out.push((edge_id, edge.dst));
                }
            }
            for &edge_id in store.in_edges(node) {
                if let Some(edge) = store.get_edge(edge_id)
                    && seen.insert(edge_id)
                {
                    out.push((edge_id, edge.src));
                }
            }
        }
    }
    out
}

fn extend_state(
    store: &Store,
    state: PathState,
    rel: &RelPattern,
    node: &NodePattern,
    params: &Params,
) -> Result<Vec<PathState>> {
    let mut results = Vec::new();

    match &rel.range {
        None => {
            // Fixed length 1: the relationship variable binds a single edge.
            for (edge_id, target) in neighbor_edges(store, state.end, rel.direction) {
                if state.used_edges.contains(&edge_id) {
                    continue;
                }
                let edge = store.edge(edge_id)?;
                if !edge_matches(store, edge, rel, &state.row, params)? {
                    continue;
                }
                // Re-used relationship variables join on edge identity.
                if let Some(var) = &rel.variable
                    && let Some(bound) = state.row.get(var)
                    && *bound != Binding::Edge(edge_id)
                {
                    continue;
                }
                let Some(mut new_state) =
                    accept_target(store, &state, target, node, params)?
                else {
                    continue;
                };
                if let Some(var) = &rel.variable {
                    new_state.row.set(var.clone(), Binding::Edge(edge_id));
                }
                new_state.used_edges.push(edge_id);
                results.push(new_state);
            }
        }
        Some(range) => {
            results.extend(extend_var_length(store, &state, rel, range, node, params)?);
        }
    }

    Ok(results)
}

/// Variable-length expansion: enumerates paths of every length in
/// `[min, max]`, shortest first, each length in adjacency insertion order.
/// `min = 0` admits the zero-length path (chain end matched against the
/// target pattern directly).
fn extend_var_length(
    store: &Store,
    state: &PathState,
    rel: &RelPattern,
    range: &HopRange,
    node: &NodePattern,
    params: &Params,
) -> Result<Vec<PathState>> {
    let min = range.min.unwrap_or(1);
    let max = range.max.unwrap_or(MAX_VAR_LENGTH_HOPS);
    let mut results = Vec::new();

    if min == 0 {
        let bound_mismatch = rel.variable.as_ref().is_some_and(|var| {
            state
                .row
                .get(var)
                .is_some_and(|bound| *bound != Binding::Edges(Vec::new()))
        });
        if !bound_mismatch
            && let Some(mut new_state) = accept_target(store, state, state.end, node, params)?
        {
            if let Some(var) = &rel.variable {
                new_state.row.set(var.clone(), Binding::Edges(Vec::new()));
            }
            results.push(new_state);
        }
    }

    for length in min.max(1)..=max {
        let mut paths = Vec::new();
        let mut used = state.used_edges.clone();
        let mut path = Vec::new();
        collect_paths(
            store, state, rel, params, state.end, length, &mut used, &mut path, &mut paths,
        )?;
        for (target, edges) in paths {
            let Some(mut new_state) = accept_target(store, state, target, node, params)? else {
                continue;
            };
            if let Some(var) = &rel.variable {
                if let Some(bound) = state.row.get(var) {
                    if *bound != Binding::Edges(edges.clone()) {
                        continue;
                    }
                }
                new_state.row.set(var.clone(), Binding::Edges(edges.clone()));
            }
            new_state.used_edges.extend(edges);
            results.push(new_state);
        }
    }

    Ok(results)
}

#[allow(clippy::too_many_arguments)]
fn collect_paths(
    store: &Store,
    state: &PathState,
    rel: &RelPattern,
    params: &Params,
    current: NodeId,
    remaining: u32,
    used: &mut Vec<EdgeId>,
    path: &mut Vec<EdgeId>,
    out: &mut Vec<(NodeId, Vec<EdgeId>)>,
) -> Result<()> {
    if remaining == 0 {
        out.push((current, path.clone()));
        return Ok(());
    }
    for (edge_id, target) in neighbor_edges(store, current, rel.direction) {
        if used.contains(&edge_id) {
            continue;
        }
        let edge = store.edge(edge_id)?;
        if !edge_matches(store, edge, rel, &state.row, params)? {
            continue;
        }
        used.push(edge_id);
        path.push(edge_id);
        collect_paths(
            store,
            state,
            rel,
            params,
            target,
            remaining - 1,
            used,
            path,
            out,
        )?;
        path.pop();
        used.pop();
    }
    Ok(())
}

/// Checks the chain's next node pattern against `target`, honouring an
/// existing binding of the pattern variable. Returns the advanced state.
fn accept_target(
    store: &Store,
    state: &PathState,
    target: NodeId,
    node: &NodePattern,
    params: &Params,
) -> Result<Option<PathState>> {
    if let Some(var) = &node.variable
        && let Some(bound) = state.row.get(var)
    {
        if *bound != Binding::Node(target) {
            return Ok(None);
        }
        if !node_matches(store, target, node, &state.row, params)? {
            return Ok(None);
        }
        return Ok(Some(PathState {
            row: state.row.clone(),
            end: target,
            used_edges: state.used_edges.clone(),
        }));
    }

    if !node_matches(store, target, node, &state.row, params)? {
        return Ok(None);
    }
    let mut row = state.row.clone();
    if let Some(var) = &node.variable {
        row.set(var.clone(), Binding::Node(target));
    }
    Ok(Some(PathState {
        row,
        end: target,
        used_edges: state.used_edges.clone(),
    }))
}

// ---------------------------------------------------------------------------
// CREATE / DELETE
// ---------------------------------------------------------------------------

fn create_clause(
    store: &mut Store,
    rows: &mut [Row],
    clause: &CreateClause,
    params: &Params,
) -> Result<()> {
    for row in rows.iter_mut() {
        for pattern in &clause.patterns {
            create_chain(store, row, pattern, params)?;
        }
    }
    Ok(())
}

fn create_chain(
    store: &mut Store,
    row: &mut Row,
    pattern: &Pattern,
    params: &Params,
) -> Result<()> {
    let mut prev: Option<NodeId> = None;
    let mut pending_rel: Option<&RelPattern> = None;

    for element in &pattern.elements {
        match element {
            PathElement::Node(npat) => {
                let id = resolve_create_node(store, row, npat, params)?;
                if let Some(rel) = pending_rel.take() {
                    let src_dst = match rel.direction {
                        RelDirection::Incoming => (id, prev.expect("chain starts with a node")),
                        _ => (prev.expect("chain starts with a node"), id),
                    };
                    create_rel(store, row, rel, src_dst.0, src_dst.1, params)?;
                }
                prev = Some(id);
            }
            PathElement::Relationship(rpat) => {
                if rpat.range.is_some() {
                    return Err(Error::Other(
                        "variable-length relationships cannot be created".to_string(),
                    ));
                }
                pending_rel = Some(rpat);
            }
        }
    }
    Ok(())
}

/// Resolves a node pattern inside CREATE: reuses a bound node (properties
/// merge, labels are additive), otherwise creates a new one.
fn resolve_create_node(
    store: &mut Store,
    row: &mut Row,
    npat: &NodePattern,
    params: &Params,
) -> Result<NodeId> {
    if let Some(var) = &npat.variable
        && let Some(binding) = row.get(var)
    {
        let id = match binding {
            Binding::Node(id) => *id,
            _ => {
                return Err(Error::Other(format!(
                    "variable '{var}' is not bound to a node"
                )));
            }
        };
        if let Some(map) = &npat.properties {
            let existing = store.node(id)?.properties.clone();
            for pair in &map.entries {
                // Merge, don't overwrite: already-present keys win.
                if !existing.contains_key(&pair.key) {
                    let value = evaluate(&pair.value, row, store, params)?;
                    store.set_node_property(id, pair.key.clone(), value)?;
                }
            }
        }
        for label in &npat.labels {
            store.add_node_label(id, label.clone())?;
        }
        return Ok(id);
    }

    let mut properties = BTreeMap::new();
    if let Some(map) = &npat.properties {
        for pair in &map.entries {
            properties.insert(pair.key.clone(), evaluate(&pair.value, row, store, params)?);
        }
    }
    let id = store.create_node(npat.labels.clone(), properties);
    if let Some(var) = &npat.variable {
        row.set(var.clone(), Binding::Node(id));
    }
    Ok(id)
}

/// Edges in a CREATE path always create new edges, even between bound nodes.
fn create_rel(
    store: &mut Store,
    row: &mut Row,
    rpat: &RelPattern,
    src: NodeId,
    dst: NodeId,
    params: &Params,
) -> Result<()> {
    let rel_type = rpat
        .types
        .first()
        .cloned()
        .unwrap_or_else(|| "RELATED".to_string());
    let mut properties = BTreeMap::new();
    if let Some(map) = &rpat.properties {
        for pair in &map.entries {
            properties.insert(pair.key.clone(), evaluate(&pair.value, row, store, params)?);
        }
    }
    let id = store.create_edge(src, dst, rel_type, properties)?;
    if let Some(var) = &rpat.variable {
        row.set(var.clone(), Binding::Edge(id));
    }
    Ok(())
}

/// Deletes the entities bound to the listed variables across all rows.
/// Targets are deduplicated first; node deletion cascades to incident
/// edges, so edges are removed before their endpoints.
fn delete_clause(store: &mut Store, rows: &[Row], clause: &DeleteClause) -> Result<()> {
    let mut nodes: Vec<NodeId> = Vec::new();
    let mut edges: Vec<EdgeId> = Vec::new();
    let mut seen_nodes = HashSet::new();
    let mut seen_edges = HashSet::new();

    for row in rows {
        for var in &clause.variables {
            match row.get(var) {
                Some(Binding::Node(id)) => {
                    if seen_nodes.insert(*id) {
                        nodes.push(*id);
                    }
                }
                Some(Binding::Edge(id)) => {
                    if seen_edges.insert(*id) {
                        edges.push(*id);
                    }
                }
                Some(Binding::Edges(ids)) => {
                    for id in ids {
                        if seen_edges.insert(*id) {
                            edges.push(*id);
                        }
                    }
                }
                Some(Binding::Value(_)) => {
                    return Err(Error::Other(format!(
                        "DELETE expects a node or relationship, got an expression value for '{var}'"
                    )));
                }
                None => return Err(Error::UnboundVariable(var.clone())),
            }
        }
    }

    for id in edges {
        if store.get_edge(id).is_some() {
            store.delete_edge(id)?;
        }
    }
    for id in nodes {
        if store.get_node(id).is_some() {
            store.delete_node(id)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Projection, aggregation, ordering
// ---------------------------------------------------------------------------

/// Projects rows through RETURN/WITH items.
///
/// If any item aggregates, the remaining items form the grouping key and one
/// output row is produced per group. Otherwise projection is per-row. Output
/// rows keep entity bindings for plainly projected variables so later
/// ordering can still reach their properties.
fn project(
    store: &Store,
    rows: Vec<Row>,
    items: &[Projection],
    distinct: bool,
    params: &Params,
) -> Result<(Vec<String>, ProjectedRows)> {
    let columns: Vec<String> = items.iter().map(Projection::column_name).collect();
    let has_aggregate = items.iter().any(|i| i.expression.contains_aggregate());

    let mut pairs: ProjectedRows = if has_aggregate {
        aggregate_rows(store, &rows, items, &columns, params)?
    } else {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut projected = Row::default();
            for (item, column) in items.iter().zip(&columns) {
                let binding = match &item.expression {
                    Expression::Variable(name) if row.get(name).is_some() => {
                        row.get(name).expect("checked").clone()
                    }
                    expr => Binding::Value(evaluate(expr, &row, store, params)?),
                };
                // Push, not set: duplicate column names keep their own slot.
                projected.cols.push((column.clone(), binding));
            }
            out.push((projected, Some(row)));
        }
        out
    };

    if distinct {
        let mut seen = HashSet::new();
        pairs.retain(|(out, _)| seen.insert(row_key(store, out)));
    }

    Ok((columns, pairs))
}

fn aggregate_rows(
    store: &Store,
    rows: &[Row],
    items: &[Projection],
    columns: &[String],
    params: &Params,
) -> Result<ProjectedRows> {
    for item in items {
        if item.expression.contains_aggregate()
            && !matches!(item.expression, Expression::Aggregate(_))
        {
            return Err(Error::Other(
                "aggregates must be top-level projections".to_string(),
            ));
        }
    }

    let group_positions: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.expression.contains_aggregate())
        .map(|(i, _)| i)
        .collect();

    // Bucket rows by the evaluated grouping key, keeping encounter order.
    let mut group_order: Vec<Vec<Value>> = Vec::new();
    let mut group_rows: Vec<Vec<&Row>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let key: Vec<Value> = group_positions
            .iter()
            .map(|&i| evaluate(&items[i].expression, row, store, params))
            .collect::<Result<_>>()?;
        let repr = format!("{key:?}");
        match index.get(&repr) {
            Some(&slot) => group_rows[slot].push(row),
            None => {
                index.insert(repr, group_order.len());
                group_order.push(key);
                group_rows.push(vec![row]);
            }
        }
    }

    // No grouping keys: aggregates always yield exactly one row, even over
    // empty input (COUNT -> 0, the rest -> null).
    if group_order.is_empty() && group_positions.is_empty() {
        group_order.push(Vec::new());
        group_rows.push(Vec::new());
    }

    let mut out = Vec::with_capacity(group_order.len());
    for (key, bucket) in group_order.into_iter().zip(group_rows) {
        let mut projected = Row::default();
        let mut key_iter = key.into_iter();
        for (item, column) in items.iter().zip(columns) {
            let binding = match &item.expression {
                Expression::Aggregate(agg) => {
                    Binding::Value(compute_aggregate(store, agg, &bucket, params)?)
                }
                _ => Binding::Value(key_iter.next().expect("one key value per group item")),
            };
            projected.cols.push((column.clone(), binding));
        }
        out.push((projected, None));
    }
    Ok(out)
}

fn compute_aggregate(
    store: &Store,
    agg: &AggregateCall,
    rows: &[&Row],
    params: &Params,
) -> Result<Value> {
    match (agg.function, &agg.argument) {
        (AggregateFunction::Count, None) => Ok(Value::Int(rows.len() as i64)),
        (AggregateFunction::Count, Some(expr)) => {
            let mut count = 0i64;
            for row in rows {
                if !evaluate(expr, row, store, params)?.is_null() {
                    count += 1;
                }
            }
            Ok(Value::Int(count))
        }
        (function, Some(expr)) => {
            // Non-numeric evaluations are skipped, matching query tolerance
            // elsewhere.
            let mut values = Vec::new();
            for row in rows {
                let value = evaluate(expr, row, store, params)?;
                if value.as_f64().is_some() {
                    values.push(value);
                }
            }
            if values.is_empty() {
                return Ok(Value::Null);
            }
            Ok(match function {
                AggregateFunction::Sum => sum_values(&values),
                AggregateFunction::Avg => {
                    let total: f64 = values.iter().filter_map(Value::as_f64).sum();
                    Value::Float(total / values.len() as f64)
                }
                AggregateFunction::Min => pick_extreme(values, |a, b| a < b),
                AggregateFunction::Max => pick_extreme(values, |a, b| a > b),
                AggregateFunction::Count => unreachable!("handled above"),
            })
        }
        (function, None) => Err(Error::ArgumentError {
            function: function.name().to_string(),
            expected: "1",
            got: 0,
        }),
    }
}

/// Integer sums stay integers until a float joins in.
fn sum_values(values: &[Value]) -> Value {
    let mut int_sum = 0i64;
    let mut float_sum = 0f64;
    let mut is_float = false;
    for value in values {
        match value {
            Value::Int(i) => {
                int_sum += i;
                float_sum += *i as f64;
            }
            Value::Float(f) => {
                is_float = true;
                float_sum += f;
            }
            _ => {}
        }
    }
    if is_float {
        Value::Float(float_sum)
    } else {
        Value::Int(int_sum)
    }
}

fn pick_extreme<F>(values: Vec<Value>, better: F) -> Value
where
    F: Fn(f64, f64) -> bool,
{
    let mut best: Option<Value> = None;
    for value in values {
        let candidate = value.as_f64().expect("filtered to numerics");
        match &best {
            None => best = Some(value),
            Some(current) => {
                let current_num = current.as_f64().expect("filtered to numerics");
                if better(candidate, current_num) {
                    best = Some(value);
                }
            }
        }
    }
    best.unwrap_or(Value::Null)
}

fn order_projected(
    store: &Store,
    pairs: &mut ProjectedRows,
    columns: &[String],
    order: &OrderByClause,
    params: &Params,
) {
    let mut keyed: Vec<((Row, Option<Row>), Vec<Value>)> = std::mem::take(pairs)
        .into_iter()
        .map(|pair| {
            let keys = order
                .items
                .iter()
                .map(|item| sort_key(store, &pair.0, pair.1.as_ref(), columns, item, params))
                .collect();
            (pair, keys)
        })
        .collect();

    keyed.sort_by(|a, b| compare_sort_keys(&a.1, &b.1, &order.items));
    *pairs = keyed.into_iter().map(|(pair, _)| pair).collect();
}

fn order_bindings(store: &Store, rows: &mut Vec<Row>, order: &OrderByClause, params: &Params) {
    let mut keyed: Vec<(Row, Vec<Value>)> = std::mem::take(rows)
        .into_iter()
        .map(|row| {
            let keys = order
                .items
                .iter()
                .map(|item| {
                    evaluate(&item.expression, &row, store, params).unwrap_or(Value::Null)
                })
                .collect();
            (row, keys)
        })
        .collect();
    keyed.sort_by(|a, b| compare_sort_keys(&a.1, &b.1, &order.items));
    *rows = keyed.into_iter().map(|(row, _)| row).collect();
}

/// Resolves one ORDER BY key for a projected row: a column of the same text
/// is used directly, anything else is re-evaluated against the source row.
/// Unresolvable keys sort as null rather than erroring.
fn sort_key(
    store: &Store,
    out: &Row,
    source: Option<&Row>,
    columns: &[String],
    item: &OrderItem,
    params: &Params,
) -> Value {
    let name = item.expression.text();
    if let Some(pos) = columns.iter().position(|c| *c == name) {
        let (_, binding) = &out.columns()[pos];
        return binding_value(binding, store);
    }
    let row = source.unwrap_or(out);
    evaluate(&item.expression, row, store, params).unwrap_or(Value::Null)
}

/// Stable multi-key comparison; nulls order last in both directions.
fn compare_sort_keys(a: &[Value], b: &[Value], items: &[OrderItem]) -> std::cmp::Ordering {
    for ((ka, kb), item) in a.iter().zip(b.iter()).zip(items) {
        let ordering = match (ka.is_null(), kb.is_null()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => {
                let o = ka.sort_cmp(kb);
                match item.direction {
                    Direction::Ascending => o,
                    Direction::Descending => o.reverse(),
                }
            }
        };
        if ordering != std::cmp::Ordering::Equal {
            return ordering;
        }
    }
    std::cmp::Ordering::Equal
}
