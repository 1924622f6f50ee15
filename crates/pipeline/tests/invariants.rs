//! Property-style checks over the resolution and graph invariants.

use osint_core::types::EntityType;
use osint_pipeline::{
    AttributeKey, EntityCandidate, EntityGraph, EntityResolver, FuzzyMatcher, Normalizer,
    NormalizedEntity, Relationship, ResolverConfig,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

fn candidate_pool() -> Vec<NormalizedEntity> {
    let normalizer = Normalizer::new(Some("US".to_string()));
    let mut pool = Vec::new();

    // Three underlying identities, each observed several ways.
    let observations: Vec<(&str, &str, Option<&str>)> = vec![
        ("Alice Roe", "alice.roe@gmail.com", Some("aroe")),
        ("Alice Roe", "aliceroe@googlemail.com", None),
        ("Roe, Alice", "alice.roe+news@gmail.com", Some("alice_roe")),
        ("Bogdan Chen", "bchen@unrelated.net", Some("bchen")),
        ("Bogdan Chen", "bchen@unrelated.net", None),
        ("Quentin Marsh", "quentin@marsh.example", Some("qmarsh")),
    ];

    for (name, email, username) in observations {
        let mut candidate = EntityCandidate::new(EntityType::Person, "test_source")
            .with_attribute(AttributeKey::FullName, name)
            .with_attribute(AttributeKey::Email, email)
            .with_extraction_confidence(0.9)
            .with_source_confidence(0.85);
        if let Some(username) = username {
            candidate = candidate.with_attribute(AttributeKey::Username, username);
        }
        pool.push(normalizer.normalize(candidate));
    }
    pool
}

fn partition_of(candidates: Vec<NormalizedEntity>) -> Vec<Vec<String>> {
    let resolver = EntityResolver::new(FuzzyMatcher::default(), ResolverConfig::default());
    let outcome = resolver.resolve(candidates);
    let mut partition: Vec<Vec<String>> = outcome
        .entities
        .iter()
        .map(|entity| {
            entity
                .member_candidates
                .iter()
                .map(|id| id.as_str().to_string())
                .collect()
        })
        .collect();
    partition.sort();
    partition
}

#[test]
fn test_resolution_is_order_independent_under_shuffles() {
    let pool = candidate_pool();
    let reference = partition_of(pool.clone());
    assert!(reference.len() >= 3);

    let mut rng = StdRng::seed_from_u64(0x05EED);
    for _ in 0..10 {
        let mut shuffled = pool.clone();
        shuffled.shuffle(&mut rng);
        assert_eq!(partition_of(shuffled), reference);
    }
}

#[test]
fn test_graph_nodes_always_cover_edge_endpoints() {
    use osint_pipeline::EntityId;

    let mut graph = EntityGraph::new();
    let ids: Vec<EntityId> = (0..6).map(|i| EntityId(format!("n{}", i))).collect();
    for id in &ids {
        graph.add_node(id.clone(), EntityType::Person, id.as_str());
    }
    for window in ids.windows(2) {
        graph
            .add_edge(
                &window[0],
                &window[1],
                Relationship::Knows,
                osint_pipeline::EdgeClass::Direct,
                0.7,
                0.7,
                [],
            )
            .unwrap();
    }
    graph.transitive_closure(Relationship::Knows, 4);

    let snapshot = graph.snapshot();
    let node_ids: std::collections::BTreeSet<_> = snapshot
        .nodes
        .iter()
        .map(|node| node.entity_id.clone())
        .collect();
    for edge in &snapshot.edges {
        assert!(node_ids.contains(&edge.src));
        assert!(node_ids.contains(&edge.dst));
        assert!((0.0..=1.0).contains(&edge.strength));
        assert!((0.0..=1.0).contains(&edge.confidence));
    }
}

#[test]
fn test_pagerank_terminates_on_cyclic_graphs() {
    use osint_pipeline::EntityId;

    let mut graph = EntityGraph::new();
    let ids: Vec<EntityId> = (0..8).map(|i| EntityId(format!("c{}", i))).collect();
    for id in &ids {
        graph.add_node(id.clone(), EntityType::Person, id.as_str());
    }
    // A ring plus chords: strongly cyclic.
    for i in 0..ids.len() {
        let next = (i + 1) % ids.len();
        let chord = (i + 3) % ids.len();
        for target in [next, chord] {
            if i != target {
                graph
                    .add_edge(
                        &ids[i],
                        &ids[target],
                        Relationship::CoOccurs,
                        osint_pipeline::EdgeClass::Direct,
                        0.5,
                        0.5,
                        [],
                    )
                    .unwrap();
            }
        }
    }

    let ranks = graph.pagerank();
    let total: f64 = ranks.values().sum();
    assert!((total - 1.0).abs() < 1e-3);
    assert!(ranks.values().all(|rank| *rank > 0.0));
}
