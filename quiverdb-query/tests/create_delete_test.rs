use std::collections::BTreeMap;

use quiverdb_graph::{Store, Value};
use quiverdb_query::{Params, QueryResult, execute, parse};

fn run(store: &mut Store, query: &str) -> QueryResult {
    let parsed = parse(query).unwrap();
    execute(store, &parsed, &Params::new()).unwrap()
}

fn props(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn create_node_with_labels_and_properties() {
    let mut store = Store::new();
    run(
        &mut store,
        "CREATE (n:Person:Employee {name: 'Ada', age: 36})",
    );
    assert_eq!(store.node_count(), 1);
    let node = store.nodes().next().unwrap();
    assert!(node.has_label("Person"));
    assert!(node.has_label("Employee"));
    assert_eq!(node.properties.get("name"), Some(&Value::from("Ada")));
    assert_eq!(node.properties.get("age"), Some(&Value::Int(36)));
}

#[test]
fn create_path_creates_nodes_and_edge() {
    let mut store = Store::new();
    run(
        &mut store,
        "CREATE (a {name: 'A'})-[:KNOWS {since: 2021}]->(b {name: 'B'})",
    );
    assert_eq!(store.node_count(), 2);
    assert_eq!(store.edge_count(), 1);
    let edge = store.edges().next().unwrap();
    assert_eq!(edge.rel_type, "KNOWS");
    assert_eq!(edge.properties.get("since"), Some(&Value::Int(2021)));
}

#[test]
fn create_without_type_defaults_to_related() {
    let mut store = Store::new();
    run(&mut store, "CREATE (a)-[]->(b)");
    assert_eq!(store.edges().next().unwrap().rel_type, "RELATED");
}

#[test]
fn create_incoming_direction_flips_endpoints() {
    let mut store = Store::new();
    run(&mut store, "CREATE (a {name: 'A'})<-[:R]-(b {name: 'B'})");
    let edge = store.edges().next().unwrap();
    let src = store.node(edge.src).unwrap();
    let dst = store.node(edge.dst).unwrap();
    assert_eq!(src.properties.get("name"), Some(&Value::from("B")));
    assert_eq!(dst.properties.get("name"), Some(&Value::from("A")));
}

#[test]
fn create_per_matched_row() {
    let mut store = Store::new();
    store.create_node(vec!["Person".into()], props(&[("name", Value::from("Alice"))]));
    store.create_node(vec!["Person".into()], props(&[("name", Value::from("Bob"))]));

    run(
        &mut store,
        "MATCH (p:Person) CREATE (p)-[:HAS]->(x:Task {title: 'review'})",
    );
    // One new task node and one edge per matched person.
    assert_eq!(store.node_count(), 4);
    assert_eq!(store.edge_count(), 2);
}

#[test]
fn create_on_zero_matched_rows_creates_nothing() {
    let mut store = Store::new();
    run(&mut store, "MATCH (p:Nothing) CREATE (p)-[:HAS]->(x:Task)");
    assert_eq!(store.node_count(), 0);
    assert_eq!(store.edge_count(), 0);
}

#[test]
fn create_reusing_bound_node_merges_properties_and_labels() {
    let mut store = Store::new();
    store.create_node(
        vec!["Person".into()],
        props(&[("name", Value::from("Alice")), ("age", Value::Int(30))]),
    );

    run(
        &mut store,
        "MATCH (p:Person) CREATE (p:Employee {age: 99, team: 'core'})",
    );
    assert_eq!(store.node_count(), 1);
    let node = store.nodes().next().unwrap();
    // Existing keys keep their value; new keys and labels are added.
    assert_eq!(node.properties.get("age"), Some(&Value::Int(30)));
    assert_eq!(node.properties.get("team"), Some(&Value::from("core")));
    assert!(node.has_label("Employee"));
    assert!(node.has_label("Person"));
}

#[test]
fn create_edge_between_bound_nodes_is_always_new() {
    let mut store = Store::new();
    let a = store.create_node(vec![], props(&[("name", Value::from("A"))]));
    let b = store.create_node(vec![], props(&[("name", Value::from("B"))]));
    store.create_edge(a, b, "KNOWS", BTreeMap::new()).unwrap();

    run(
        &mut store,
        "MATCH (a {name: 'A'}), (b {name: 'B'}) CREATE (a)-[:KNOWS]->(b)",
    );
    assert_eq!(store.edge_count(), 2);
}

#[test]
fn created_bindings_are_visible_to_return() {
    let mut store = Store::new();
    let result = run(&mut store, "CREATE (n:Person {name: 'Ada'}) RETURN n.name");
    assert_eq!(result.len(), 1);
    assert_eq!(result.records()[0][0], Value::from("Ada"));
}

#[test]
fn delete_node_cascades_to_incident_edges() {
    let mut store = Store::new();
    let a = store.create_node(vec![], props(&[("name", Value::from("A"))]));
    let b = store.create_node(vec![], props(&[("name", Value::from("B"))]));
    let c = store.create_node(vec![], props(&[("name", Value::from("C"))]));
    store.create_edge(a, b, "R", BTreeMap::new()).unwrap();
    store.create_edge(b, c, "R", BTreeMap::new()).unwrap();

    run(&mut store, "MATCH (n {name: 'B'}) DELETE n");
    assert_eq!(store.node_count(), 2);
    assert_eq!(store.edge_count(), 0);
    assert!(store.get_node(a).is_some());
    assert!(store.get_node(c).is_some());
}

#[test]
fn delete_relationship_variable() {
    let mut store = Store::new();
    let a = store.create_node(vec![], BTreeMap::new());
    let b = store.create_node(vec![], BTreeMap::new());
    store.create_edge(a, b, "KNOWS", BTreeMap::new()).unwrap();

    run(&mut store, "MATCH (a)-[r:KNOWS]->(b) DELETE r");
    assert_eq!(store.node_count(), 2);
    assert_eq!(store.edge_count(), 0);
}

#[test]
fn delete_deduplicates_across_rows() {
    let mut store = Store::new();
    let hub = store.create_node(vec![], props(&[("name", Value::from("hub"))]));
    let s1 = store.create_node(vec![], BTreeMap::new());
    let s2 = store.create_node(vec![], BTreeMap::new());
    store.create_edge(hub, s1, "R", BTreeMap::new()).unwrap();
    store.create_edge(hub, s2, "R", BTreeMap::new()).unwrap();

    // hub appears in two rows; it must be deleted exactly once.
    run(&mut store, "MATCH (h {name: 'hub'})-[:R]->(x) DELETE h");
    assert_eq!(store.node_count(), 2);
    assert_eq!(store.edge_count(), 0);
}
