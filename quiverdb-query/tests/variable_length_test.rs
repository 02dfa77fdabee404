use std::collections::BTreeMap;

use quiverdb_graph::{Store, Value};
use quiverdb_query::{Params, QueryResult, execute, parse};

fn run(store: &mut Store, query: &str) -> QueryResult {
    let parsed = parse(query).unwrap();
    execute(store, &parsed, &Params::new()).unwrap()
}

fn named(store: &mut Store, name: &str) -> u64 {
    let mut props = BTreeMap::new();
    props.insert("name".to_string(), Value::from(name));
    store.create_node(vec!["Node".into()], props)
}

/// A -> B -> C -> D chain over type R.
fn chain_store() -> Store {
    let mut store = Store::new();
    let a = named(&mut store, "A");
    let b = named(&mut store, "B");
    let c = named(&mut store, "C");
    let d = named(&mut store, "D");
    store.create_edge(a, b, "R", BTreeMap::new()).unwrap();
    store.create_edge(b, c, "R", BTreeMap::new()).unwrap();
    store.create_edge(c, d, "R", BTreeMap::new()).unwrap();
    store
}

#[test]
fn range_one_to_three_reaches_all_descendants_in_length_order() {
    let mut store = chain_store();
    let result = run(
        &mut store,
        "MATCH (s {name: 'A'})-[:R*1..3]->(x) RETURN x.name",
    );
    let names: Vec<&Value> = result.records().iter().map(|r| &r[0]).collect();
    // Shortest paths first: one hop, then two, then three.
    assert_eq!(
        names,
        vec![&Value::from("B"), &Value::from("C"), &Value::from("D")]
    );
}

#[test]
fn exact_hop_count() {
    let mut store = chain_store();
    let result = run(&mut store, "MATCH (s {name: 'A'})-[:R*2]->(x) RETURN x.name");
    assert_eq!(result.len(), 1);
    assert_eq!(result.records()[0][0], Value::from("C"));
}

#[test]
fn zero_length_path_includes_the_start_node() {
    let mut store = chain_store();
    let result = run(
        &mut store,
        "MATCH (s {name: 'A'})-[:R*0..1]->(x) RETURN x.name",
    );
    let names: Vec<&Value> = result.records().iter().map(|r| &r[0]).collect();
    assert_eq!(names, vec![&Value::from("A"), &Value::from("B")]);
}

#[test]
fn unbounded_range_terminates_on_cycles() {
    let mut store = Store::new();
    let a = named(&mut store, "A");
    let b = named(&mut store, "B");
    store.create_edge(a, b, "R", BTreeMap::new()).unwrap();
    store.create_edge(b, a, "R", BTreeMap::new()).unwrap();

    // No edge is reused within a path: A->B, then A->B->A, then nothing.
    let result = run(&mut store, "MATCH (s {name: 'A'})-[:R*]->(x) RETURN x.name");
    let names: Vec<&Value> = result.records().iter().map(|r| &r[0]).collect();
    assert_eq!(names, vec![&Value::from("B"), &Value::from("A")]);
}

#[test]
fn named_range_relationship_binds_the_edge_list() {
    let mut store = chain_store();
    let result = run(
        &mut store,
        "MATCH (s {name: 'A'})-[r:R*2..2]->(x) RETURN r",
    );
    assert_eq!(result.len(), 1);
    match &result.records()[0][0] {
        Value::List(edges) => {
            assert_eq!(edges.len(), 2);
            for edge in edges {
                let Value::Map(map) = edge else {
                    panic!("edge entries materialise as maps");
                };
                assert_eq!(map.get("type"), Some(&Value::from("R")));
            }
        }
        other => panic!("expected a list of edges, got {other:?}"),
    }
}

#[test]
fn type_filter_applies_to_every_hop() {
    let mut store = Store::new();
    let a = named(&mut store, "A");
    let b = named(&mut store, "B");
    let c = named(&mut store, "C");
    store.create_edge(a, b, "R", BTreeMap::new()).unwrap();
    store.create_edge(b, c, "OTHER", BTreeMap::new()).unwrap();

    let result = run(
        &mut store,
        "MATCH (s {name: 'A'})-[:R*1..2]->(x) RETURN x.name",
    );
    let names: Vec<&Value> = result.records().iter().map(|r| &r[0]).collect();
    assert_eq!(names, vec![&Value::from("B")]);
}

#[test]
fn variable_length_continues_into_fixed_pattern() {
    let mut store = chain_store();
    let result = run(
        &mut store,
        "MATCH (s {name: 'A'})-[:R*1..2]->(m)-[:R]->(x) RETURN m.name, x.name",
    );
    // Paths: A->B (then B->C), A->B->C (then C->D).
    let pairs: Vec<(Value, Value)> = result
        .records()
        .iter()
        .map(|r| (r[0].clone(), r[1].clone()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (Value::from("B"), Value::from("C")),
            (Value::from("C"), Value::from("D")),
        ]
    );
}

#[test]
fn undirected_variable_length() {
    let mut store = chain_store();
    let result = run(
        &mut store,
        "MATCH (s {name: 'C'})-[:R*1]-(x) RETURN x.name",
    );
    let names: Vec<&Value> = result.records().iter().map(|r| &r[0]).collect();
    // Outgoing first (insertion order), then incoming.
    assert_eq!(names, vec![&Value::from("D"), &Value::from("B")]);
}
