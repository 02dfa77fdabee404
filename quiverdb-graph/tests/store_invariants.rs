use std::collections::{BTreeMap, BTreeSet};

use quiverdb_graph::{EdgeSpec, Store, Value};

fn props(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Re-derives every index from the primary node/edge maps and compares.
fn check_invariants(store: &Store) {
    // Every edge's endpoints exist.
    for edge in store.edges() {
        assert!(store.get_node(edge.src).is_some(), "dangling src {}", edge.src);
        assert!(store.get_node(edge.dst).is_some(), "dangling dst {}", edge.dst);
    }

    // label_index[L] == {n : L in n.labels}
    let mut labels: BTreeSet<&str> = BTreeSet::new();
    for node in store.nodes() {
        for label in &node.labels {
            labels.insert(label);
        }
    }
    for label in labels {
        let indexed: BTreeSet<u64> = store.nodes_by_label(label).map(|n| n.id).collect();
        let derived: BTreeSet<u64> = store
            .nodes()
            .filter(|n| n.has_label(label))
            .map(|n| n.id)
            .collect();
        assert_eq!(indexed, derived, "label index out of sync for {label}");
    }

    // type_index[T] mirrors edge types.
    let mut types: BTreeSet<&str> = BTreeSet::new();
    for edge in store.edges() {
        types.insert(&edge.rel_type);
    }
    for rel_type in types {
        let indexed: BTreeSet<u64> = store.edges_by_type(rel_type).map(|e| e.id).collect();
        let derived: BTreeSet<u64> = store
            .edges()
            .filter(|e| e.rel_type == rel_type)
            .map(|e| e.id)
            .collect();
        assert_eq!(indexed, derived, "type index out of sync for {rel_type}");
    }

    // adjacency_out[u] holds exactly the edges with source u (and in/dst).
    let mut out_total = 0;
    let mut in_total = 0;
    for node in store.nodes() {
        for &edge_id in store.out_edges(node.id) {
            assert_eq!(store.edge(edge_id).unwrap().src, node.id);
        }
        for &edge_id in store.in_edges(node.id) {
            assert_eq!(store.edge(edge_id).unwrap().dst, node.id);
        }
        out_total += store.out_edges(node.id).len();
        in_total += store.in_edges(node.id).len();
    }
    assert_eq!(out_total, store.edge_count());
    assert_eq!(in_total, store.edge_count());
}

#[test]
fn invariants_hold_across_a_mixed_op_sequence() {
    let mut store = Store::new();
    let mut node_ids = Vec::new();
    for i in 0..40i64 {
        let label = if i % 2 == 0 { "Even" } else { "Odd" };
        node_ids.push(store.create_node(
            vec![label.to_string()],
            props(&[("i", Value::Int(i))]),
        ));
    }
    check_invariants(&store);

    let mut specs = Vec::new();
    for i in 0..node_ids.len() {
        specs.push(EdgeSpec {
            src: node_ids[i],
            dst: node_ids[(i + 3) % node_ids.len()],
            rel_type: if i % 2 == 0 { "A" } else { "B" }.to_string(),
            properties: BTreeMap::new(),
        });
    }
    store.create_edges_batch(specs).unwrap();
    check_invariants(&store);

    // Delete a third of the nodes; cascades must keep everything consistent.
    for id in node_ids.iter().step_by(3) {
        store.delete_node(*id).unwrap();
    }
    check_invariants(&store);

    // Property and label mutation keep the indexes intact.
    let survivor = *node_ids.iter().find(|id| store.get_node(**id).is_some()).unwrap();
    store.set_node_property(survivor, "touched", Value::Bool(true)).unwrap();
    store.add_node_label(survivor, "Touched").unwrap();
    check_invariants(&store);
}

#[test]
fn restore_after_mutations_matches_snapshot_point() {
    let mut store = Store::new();
    let a = store.create_node(vec!["Keep".into()], props(&[("v", Value::Int(1))]));
    let b = store.create_node(vec!["Keep".into()], BTreeMap::new());
    store.create_edge(a, b, "R", BTreeMap::new()).unwrap();

    let snapshot = store.snapshot();

    store.delete_node(a).unwrap();
    store.create_node(vec!["New".into()], BTreeMap::new());
    store.set_node_property(b, "v", Value::Int(9)).unwrap();

    store.restore(snapshot.clone()).unwrap();
    check_invariants(&store);
    assert_eq!(store.snapshot(), snapshot);
}

#[test]
fn ids_are_never_reissued() {
    let mut store = Store::new();
    let a = store.create_node(vec![], BTreeMap::new());
    store.delete_node(a).unwrap();
    let b = store.create_node(vec![], BTreeMap::new());
    assert_ne!(a, b);

    let c = store.create_node(vec![], BTreeMap::new());
    let d = store.create_node(vec![], BTreeMap::new());
    let e1 = store.create_edge(c, d, "R", BTreeMap::new()).unwrap();
    store.delete_edge(e1).unwrap();
    let e2 = store.create_edge(d, c, "R", BTreeMap::new()).unwrap();
    assert_ne!(e1, e2);
}

#[test]
fn node_lookup_scales_to_large_stores() {
    let mut store = Store::new();
    let ids: Vec<u64> = (0..10_000)
        .map(|i| store.create_node(vec![], props(&[("i", Value::Int(i))])))
        .collect();
    // A scan-based lookup would make this quadratic and visibly slow.
    for _ in 0..100 {
        for &id in &ids {
            assert!(store.get_node(id).is_some());
        }
    }
}

#[test]
fn bulk_load_rejects_dangling_edges_without_clobbering_state() {
    let mut store = Store::new();
    store.create_node(vec!["Original".into()], BTreeMap::new());

    let snapshot = {
        let mut other = Store::new();
        let a = other.create_node(vec![], BTreeMap::new());
        let b = other.create_node(vec![], BTreeMap::new());
        other.create_edge(a, b, "R", BTreeMap::new()).unwrap();
        let mut snap = other.snapshot();
        snap.edges[0].dst = 999; // dangling
        snap
    };

    assert!(store.restore(snapshot).is_err());
    // The failed load left the original contents alone.
    assert_eq!(store.node_count(), 1);
    assert!(store.nodes_by_label("Original").next().is_some());
}
