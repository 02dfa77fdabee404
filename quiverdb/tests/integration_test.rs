use std::collections::BTreeMap;

use quiverdb::{Error, GraphDb, Value};

fn props(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn crud_with_cascade_delete() {
    let mut db = GraphDb::new();
    let a = db.create_node(vec![], props(&[("name", Value::from("A"))]));
    let b = db.create_node(vec![], props(&[("name", Value::from("B"))]));
    let c = db.create_node(vec![], props(&[("name", Value::from("C"))]));
    db.create_edge(a, b, "R", BTreeMap::new()).unwrap();
    db.create_edge(b, c, "R", BTreeMap::new()).unwrap();

    db.delete_node(b).unwrap();

    assert_eq!(db.node_count(), 2);
    assert_eq!(db.edge_count(), 0);
    assert!(db.get_node(a).is_ok());
    assert!(db.get_node(c).is_ok());
    assert!(db.get_node(b).is_err());
}

#[test]
fn filter_scenario() {
    let mut db = GraphDb::new();
    for age in [20i64, 30, 40] {
        db.create_node(vec!["Person".into()], props(&[("age", Value::Int(age))]));
    }
    let result = db
        .execute("MATCH (p:Person) WHERE p.age > 25 RETURN p.age ORDER BY p.age")
        .unwrap();
    let ages: Vec<&Value> = result.records().iter().map(|r| &r[0]).collect();
    assert_eq!(ages, vec![&Value::Int(30), &Value::Int(40)]);
}

#[test]
fn join_and_aggregate_scenario() {
    let mut db = GraphDb::new();
    let alice = db.create_node(
        vec!["Person".into()],
        props(&[("name", Value::from("Alice"))]),
    );
    let bob = db.create_node(vec!["Person".into()], props(&[("name", Value::from("Bob"))]));
    db.create_edge(alice, bob, "KNOWS", BTreeMap::new()).unwrap();

    let pairs = db
        .execute("MATCH (a)-[:KNOWS]->(b) RETURN a.name, b.name")
        .unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs.records()[0][0], Value::from("Alice"));
    assert_eq!(pairs.records()[0][1], Value::from("Bob"));

    let count = db.execute("MATCH (p:Person) RETURN COUNT(*)").unwrap();
    assert_eq!(count.value().unwrap(), Value::Int(2));
}

#[test]
fn variable_length_scenario() {
    let mut db = GraphDb::new();
    let ids: Vec<u64> = ["A", "B", "C", "D"]
        .iter()
        .map(|name| db.create_node(vec![], props(&[("name", Value::from(*name))])))
        .collect();
    for pair in ids.windows(2) {
        db.create_edge(pair[0], pair[1], "R", BTreeMap::new()).unwrap();
    }

    let result = db
        .execute("MATCH (s {name: 'A'})-[:R*1..3]->(x) RETURN x.name")
        .unwrap();
    let names: Vec<&Value> = result.records().iter().map(|r| &r[0]).collect();
    assert_eq!(
        names,
        vec![&Value::from("B"), &Value::from("C"), &Value::from("D")]
    );
}

#[test]
fn string_search_scenario() {
    let mut db = GraphDb::new();
    db.create_node(
        vec!["Person".into()],
        props(&[("name", Value::from("Alice Johnson"))]),
    );

    let contains = db
        .execute("MATCH (n) WHERE n.name CONTAINS 'Johnson' RETURN n")
        .unwrap();
    assert_eq!(contains.len(), 1);

    let regex = db
        .execute("MATCH (n) WHERE n.name =~ '.*son$' RETURN n")
        .unwrap();
    assert_eq!(regex.len(), 1);
}

#[test]
fn transaction_rollback_scenario() {
    let mut db = GraphDb::new();
    db.create_node(vec!["Base".into()], BTreeMap::new());

    let outcome: Result<(), Error> = db.transaction(|db| {
        for i in 0..10 {
            db.execute(&format!("CREATE (n:Temp {{idx: {i}}})"))?;
        }
        assert_eq!(db.node_count(), 11);
        Err(Error::NoActiveTransaction)
    });

    assert!(outcome.is_err());
    assert_eq!(db.node_count(), 1);
    assert_eq!(db.nodes_by_label("Temp").count(), 0);
}

#[test]
fn cypher_delete_scenario() {
    let mut db = GraphDb::new();
    db.execute("CREATE (a {name: 'A'})-[:R]->(b {name: 'B'})")
        .unwrap();
    db.execute("CREATE (c {name: 'C'})").unwrap();
    db.execute("MATCH (n {name: 'B'}) DELETE n").unwrap();
    assert_eq!(db.node_count(), 2);
    assert_eq!(db.edge_count(), 0);
}

#[test]
fn empty_query_is_a_parse_error() {
    let mut db = GraphDb::new();
    match db.execute("") {
        Err(Error::Query(err)) => {
            let text = err.to_string();
            assert!(text.contains("parse error"), "got: {text}");
        }
        other => panic!("expected query error, got {other:?}"),
    }
}

#[test]
fn queries_are_deterministic() {
    let mut db = GraphDb::new();
    db.execute("CREATE (a:N {v: 3}), (b:N {v: 1}), (c:N {v: 2})")
        .unwrap();
    let first = db.execute("MATCH (n:N) RETURN n.v ORDER BY n.v").unwrap();
    let second = db.execute("MATCH (n:N) RETURN n.v ORDER BY n.v").unwrap();
    assert_eq!(first, second);
}

#[test]
fn table_rendering() {
    let mut db = GraphDb::new();
    db.execute("CREATE (n:Person {name: 'Ada', age: 36})").unwrap();
    let result = db
        .execute("MATCH (p:Person) RETURN p.name AS name, p.age AS age")
        .unwrap();
    let table = result.to_table();
    assert!(table.contains("name"));
    assert!(table.contains("Ada"));
}

#[test]
fn batch_edges_and_finders() {
    let mut db = GraphDb::new();
    let a = db.create_node(vec!["N".into()], BTreeMap::new());
    let b = db.create_node(vec!["N".into()], BTreeMap::new());
    let ids = db
        .create_edges_batch(vec![
            quiverdb::EdgeSpec {
                src: a,
                dst: b,
                rel_type: "X".into(),
                properties: props(&[("w", Value::Int(1))]),
            },
            quiverdb::EdgeSpec {
                src: b,
                dst: a,
                rel_type: "X".into(),
                properties: BTreeMap::new(),
            },
        ])
        .unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(db.edges_by_type("X").count(), 2);

    let wanted = props(&[("w", Value::Int(1))]);
    assert_eq!(db.find_edges(Some("X"), &wanted).count(), 1);
    assert_eq!(db.find_nodes(&["N".to_string()], &BTreeMap::new()).count(), 2);
}

#[test]
fn property_updates_through_the_handle() {
    let mut db = GraphDb::new();
    let id = db.create_node(vec![], BTreeMap::new());
    db.set_node_property(id, "score", Value::Float(0.5)).unwrap();
    assert_eq!(
        db.get_node(id).unwrap().properties.get("score"),
        Some(&Value::Float(0.5))
    );
    db.remove_node_property(id, "score").unwrap();
    assert!(db.get_node(id).unwrap().properties.get("score").is_none());
}
