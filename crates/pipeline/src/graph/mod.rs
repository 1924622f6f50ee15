//! Directed multigraph of resolved entities.
//!
//! Nodes and edges live in a petgraph arena; `NodeIndex` values are the
//! stable in-memory identities and `EntityId`s the serializable ones.
//! At most one edge exists per `(src, dst, relationship)`; duplicates merge
//! strength via `1 - (1-s1)(1-s2)` and confidence via max, so both are
//! monotonically non-decreasing under merges.

mod analytics;

pub use analytics::CommunityAssignment;

use crate::entity::EntityId;
use osint_core::types::EntityType;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    WorksWith,
    Knows,
    Family,
    Owns,
    Registered,
    LocatedAt,
    Authored,
    Cites,
    SameIdentity,
    CoOccurs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeClass {
    Direct,
    Inferred,
    Transitive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub entity_id: EntityId,
    pub entity_type: EntityType,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub relationship: Relationship,
    pub edge_class: EdgeClass,
    pub strength: f64,
    pub confidence: f64,
    pub sources: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    pub mean_degree: f64,
    pub component_count: usize,
    pub mean_confidence: f64,
}

/// Serializable projection of the graph for reports and ego networks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<EdgeSnapshot>,
    pub statistics: GraphStatistics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub src: EntityId,
    pub dst: EntityId,
    pub relationship: Relationship,
    pub edge_class: EdgeClass,
    pub strength: f64,
    pub confidence: f64,
    pub sources: BTreeSet<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("self edge on {0} requires same_identity relationship")]
    SelfEdge(EntityId),
    #[error("unknown node: {0}")]
    UnknownNode(EntityId),
    #[error("ego depth must be within 1-5, got {0}")]
    DepthOutOfRange(usize),
}

pub struct EntityGraph {
    graph: DiGraph<GraphNode, GraphEdge>,
    index_of: HashMap<EntityId, NodeIndex>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index_of: HashMap::new(),
        }
    }

    /// Insert a node, idempotent on `entity_id`.
    pub fn add_node(
        &mut self,
        entity_id: EntityId,
        entity_type: EntityType,
        label: impl Into<String>,
    ) -> NodeIndex {
        if let Some(&index) = self.index_of.get(&entity_id) {
            return index;
        }
        let index = self.graph.add_node(GraphNode {
            entity_id: entity_id.clone(),
            entity_type,
            label: label.into(),
        });
        self.index_of.insert(entity_id, index);
        index
    }

    /// Insert or merge an edge. Merging never decreases strength or
    /// confidence.
    pub fn add_edge(
        &mut self,
        src: &EntityId,
        dst: &EntityId,
        relationship: Relationship,
        edge_class: EdgeClass,
        strength: f64,
        confidence: f64,
        sources: impl IntoIterator<Item = String>,
    ) -> Result<(), GraphError> {
        if src == dst && relationship != Relationship::SameIdentity {
            return Err(GraphError::SelfEdge(src.clone()));
        }
        let src_index = *self
            .index_of
            .get(src)
            .ok_or_else(|| GraphError::UnknownNode(src.clone()))?;
        let dst_index = *self
            .index_of
            .get(dst)
            .ok_or_else(|| GraphError::UnknownNode(dst.clone()))?;

        let strength = strength.clamp(0.0, 1.0);
        let confidence = confidence.clamp(0.0, 1.0);
        let new_sources: BTreeSet<String> = sources.into_iter().collect();

        let existing = self
            .graph
            .edges_connecting(src_index, dst_index)
            .find(|edge| edge.weight().relationship == relationship)
            .map(|edge| edge.id());

        match existing {
            Some(edge_id) => {
                let edge = self
                    .graph
                    .edge_weight_mut(edge_id)
                    .expect("edge id from lookup");
                edge.strength = 1.0 - (1.0 - edge.strength) * (1.0 - strength);
                edge.confidence = edge.confidence.max(confidence);
                edge.sources.extend(new_sources);
                // Direct observation upgrades an inferred edge.
                if edge_class == EdgeClass::Direct {
                    edge.edge_class = EdgeClass::Direct;
                }
            }
            None => {
                self.graph.add_edge(
                    src_index,
                    dst_index,
                    GraphEdge {
                        relationship,
                        edge_class,
                        strength,
                        confidence,
                        sources: new_sources,
                    },
                );
            }
        }
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, entity_id: &EntityId) -> bool {
        self.index_of.contains_key(entity_id)
    }

    pub(crate) fn petgraph(&self) -> &DiGraph<GraphNode, GraphEdge> {
        &self.graph
    }

    pub(crate) fn index(&self, entity_id: &EntityId) -> Option<NodeIndex> {
        self.index_of.get(entity_id).copied()
    }

    /// Depth-capped BFS subgraph around a node, depth within 1-5.
    pub fn ego_network(
        &self,
        center: &EntityId,
        depth: usize,
    ) -> Result<GraphSnapshot, GraphError> {
        if !(1..=5).contains(&depth) {
            return Err(GraphError::DepthOutOfRange(depth));
        }
        let start = self
            .index(center)
            .ok_or_else(|| GraphError::UnknownNode(center.clone()))?;

        let mut reachable: BTreeSet<NodeIndex> = BTreeSet::new();
        let mut frontier = VecDeque::from([(start, 0usize)]);
        reachable.insert(start);
        while let Some((node, dist)) = frontier.pop_front() {
            if dist == depth {
                continue;
            }
            for neighbor in self
                .graph
                .neighbors_directed(node, Direction::Outgoing)
                .chain(self.graph.neighbors_directed(node, Direction::Incoming))
            {
                if reachable.insert(neighbor) {
                    frontier.push_back((neighbor, dist + 1));
                }
            }
        }

        Ok(self.snapshot_of(&reachable))
    }

    /// BFS shortest path; among equal-hop paths the one with the highest
    /// product of edge confidences wins.
    pub fn shortest_path(&self, src: &EntityId, dst: &EntityId) -> Option<Vec<EntityId>> {
        let start = self.index(src)?;
        let goal = self.index(dst)?;
        if start == goal {
            return Some(vec![src.clone()]);
        }

        // BFS layering.
        let mut dist: HashMap<NodeIndex, usize> = HashMap::from([(start, 0)]);
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            let d = dist[&node];
            for neighbor in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if !dist.contains_key(&neighbor) {
                    dist.insert(neighbor, d + 1);
                    queue.push_back(neighbor);
                }
            }
        }
        let goal_dist = *dist.get(&goal)?;

        // Dynamic program over the shortest-path DAG, maximizing confidence.
        let mut best: HashMap<NodeIndex, (f64, Option<NodeIndex>)> =
            HashMap::from([(start, (1.0, None))]);
        let mut layer: Vec<NodeIndex> = vec![start];
        for _ in 0..goal_dist {
            let mut next_layer: Vec<NodeIndex> = Vec::new();
            for &node in &layer {
                let (conf_here, _) = best[&node];
                for edge in self.graph.edges_directed(node, Direction::Outgoing) {
                    let neighbor = edge.target();
                    if dist.get(&neighbor) != Some(&(dist[&node] + 1)) {
                        continue;
                    }
                    let best_edge_conf = self
                        .graph
                        .edges_connecting(node, neighbor)
                        .map(|e| e.weight().confidence)
                        .fold(0.0_f64, f64::max);
                    let conf = conf_here * best_edge_conf;
                    let entry = best.entry(neighbor).or_insert((f64::MIN, None));
                    if conf > entry.0 {
                        *entry = (conf, Some(node));
                        if !next_layer.contains(&neighbor) {
                            next_layer.push(neighbor);
                        }
                    }
                }
            }
            layer = next_layer;
        }

        let mut path = Vec::new();
        let mut cursor = Some(goal);
        while let Some(node) = cursor {
            path.push(self.graph[node].entity_id.clone());
            cursor = best.get(&node).and_then(|(_, parent)| *parent);
        }
        path.reverse();
        if path.first() == Some(src) {
            Some(path)
        } else {
            None
        }
    }

    /// Add transitive edges A->C wherever A->B->C chains share
    /// `relationship`. Chain strength is the product of link strengths;
    /// confidence the product with a 0.9 penalty per extra hop. Two-hop
    /// chains are classed `inferred`, longer ones `transitive`.
    pub fn transitive_closure(&mut self, relationship: Relationship, max_depth: usize) {
        let max_depth = max_depth.clamp(2, 6);
        let nodes: Vec<NodeIndex> = self.graph.node_indices().collect();
        let mut additions: Vec<(EntityId, EntityId, usize, f64, f64)> = Vec::new();

        for &origin in &nodes {
            // BFS along same-relationship edges, tracking the best chain.
            let mut seen: HashMap<NodeIndex, (usize, f64, f64)> =
                HashMap::from([(origin, (0, 1.0, 1.0))]);
            let mut queue = VecDeque::from([origin]);
            while let Some(node) = queue.pop_front() {
                let (hops, strength, confidence) = seen[&node];
                if hops == max_depth {
                    continue;
                }
                for edge in self.graph.edges_directed(node, Direction::Outgoing) {
                    if edge.weight().relationship != relationship {
                        continue;
                    }
                    let target = edge.target();
                    if seen.contains_key(&target) {
                        continue;
                    }
                    let chained = (
                        hops + 1,
                        strength * edge.weight().strength,
                        confidence * edge.weight().confidence,
                    );
                    seen.insert(target, chained);
                    queue.push_back(target);
                }
            }

            for (target, (hops, strength, confidence)) in seen {
                if hops < 2 || target == origin {
                    continue;
                }
                let already_direct = self
                    .graph
                    .edges_connecting(origin, target)
                    .any(|edge| edge.weight().relationship == relationship);
                if already_direct {
                    continue;
                }
                let penalty = 0.9_f64.powi(hops as i32 - 1);
                additions.push((
                    self.graph[origin].entity_id.clone(),
                    self.graph[target].entity_id.clone(),
                    hops,
                    strength,
                    confidence * penalty,
                ));
            }
        }

        for (src, dst, hops, strength, confidence) in additions {
            let class = if hops == 2 {
                EdgeClass::Inferred
            } else {
                EdgeClass::Transitive
            };
            let _ = self.add_edge(&src, &dst, relationship, class, strength, confidence, []);
        }
    }

    pub fn statistics(&self) -> GraphStatistics {
        let node_count = self.graph.node_count();
        let edge_count = self.graph.edge_count();
        let density = if node_count > 1 {
            edge_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
        } else {
            0.0
        };
        let mean_degree = if node_count > 0 {
            // In-degree plus out-degree, averaged.
            2.0 * edge_count as f64 / node_count as f64
        } else {
            0.0
        };
        let mean_confidence = if edge_count > 0 {
            self.graph
                .edge_weights()
                .map(|edge| edge.confidence)
                .sum::<f64>()
                / edge_count as f64
        } else {
            0.0
        };

        GraphStatistics {
            node_count,
            edge_count,
            density,
            mean_degree,
            component_count: analytics::component_count(self),
            mean_confidence,
        }
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let all: BTreeSet<NodeIndex> = self.graph.node_indices().collect();
        self.snapshot_of(&all)
    }

    fn snapshot_of(&self, nodes: &BTreeSet<NodeIndex>) -> GraphSnapshot {
        let mut snapshot_nodes: Vec<GraphNode> = nodes
            .iter()
            .map(|&index| self.graph[index].clone())
            .collect();
        snapshot_nodes.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

        let mut edges: Vec<EdgeSnapshot> = self
            .graph
            .edge_indices()
            .filter_map(|edge_id| {
                let (src, dst) = self.graph.edge_endpoints(edge_id)?;
                if !nodes.contains(&src) || !nodes.contains(&dst) {
                    return None;
                }
                let weight = &self.graph[edge_id];
                Some(EdgeSnapshot {
                    src: self.graph[src].entity_id.clone(),
                    dst: self.graph[dst].entity_id.clone(),
                    relationship: weight.relationship,
                    edge_class: weight.edge_class,
                    strength: weight.strength,
                    confidence: weight.confidence,
                    sources: weight.sources.clone(),
                })
            })
            .collect();
        edges.sort_by(|a, b| {
            (&a.src, &a.dst, a.relationship).cmp(&(&b.src, &b.dst, b.relationship))
        });

        GraphSnapshot {
            nodes: snapshot_nodes,
            edges,
            statistics: self.statistics(),
        }
    }

    /// Standard iterative PageRank: damping 0.85, 20 iterations or until
    /// the L1 delta drops below 1e-4.
    pub fn pagerank(&self) -> BTreeMap<EntityId, f64> {
        analytics::pagerank(self)
    }

    pub fn degree_centrality(&self) -> BTreeMap<EntityId, f64> {
        analytics::degree_centrality(self)
    }

    pub fn betweenness_centrality(&self) -> BTreeMap<EntityId, f64> {
        analytics::betweenness_centrality(self)
    }

    /// Connected components over the symmetrized view.
    pub fn community_detection(&self) -> Vec<CommunityAssignment> {
        analytics::communities(self)
    }
}

impl Default for EntityGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<EntityId> {
        (0..n).map(|i| EntityId(format!("e{}", i))).collect()
    }

    fn seeded_graph(n: usize) -> (EntityGraph, Vec<EntityId>) {
        let mut graph = EntityGraph::new();
        let ids = ids(n);
        for id in &ids {
            graph.add_node(id.clone(), EntityType::Person, id.as_str());
        }
        (graph, ids)
    }

    #[test]
    fn test_add_node_idempotent() {
        let (mut graph, ids) = seeded_graph(1);
        graph.add_node(ids[0].clone(), EntityType::Person, "again");
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_self_edge_requires_same_identity() {
        let (mut graph, ids) = seeded_graph(1);
        let err = graph.add_edge(
            &ids[0],
            &ids[0],
            Relationship::Knows,
            EdgeClass::Direct,
            0.5,
            0.5,
            [],
        );
        assert!(err.is_err());

        let ok = graph.add_edge(
            &ids[0],
            &ids[0],
            Relationship::SameIdentity,
            EdgeClass::Direct,
            0.5,
            0.5,
            [],
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_duplicate_edges_merge_monotonically() {
        let (mut graph, ids) = seeded_graph(2);
        graph
            .add_edge(
                &ids[0],
                &ids[1],
                Relationship::CoOccurs,
                EdgeClass::Direct,
                0.5,
                0.6,
                ["a".to_string()],
            )
            .unwrap();
        graph
            .add_edge(
                &ids[0],
                &ids[1],
                Relationship::CoOccurs,
                EdgeClass::Direct,
                0.5,
                0.4,
                ["b".to_string()],
            )
            .unwrap();

        assert_eq!(graph.edge_count(), 1);
        let snapshot = graph.snapshot();
        let edge = &snapshot.edges[0];
        // 1 - (1-0.5)(1-0.5) = 0.75; confidence keeps the max.
        assert!((edge.strength - 0.75).abs() < 1e-9);
        assert!((edge.confidence - 0.6).abs() < 1e-9);
        assert_eq!(edge.sources.len(), 2);
        assert!(edge.strength <= 1.0 && edge.confidence <= 1.0);
    }

    #[test]
    fn test_distinct_relationships_coexist() {
        let (mut graph, ids) = seeded_graph(2);
        for relationship in [Relationship::CoOccurs, Relationship::WorksWith] {
            graph
                .add_edge(
                    &ids[0],
                    &ids[1],
                    relationship,
                    EdgeClass::Direct,
                    0.5,
                    0.5,
                    [],
                )
                .unwrap();
        }
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_ego_network_depth_capped() {
        let (mut graph, ids) = seeded_graph(4);
        for window in ids.windows(2) {
            graph
                .add_edge(
                    &window[0],
                    &window[1],
                    Relationship::Knows,
                    EdgeClass::Direct,
                    0.8,
                    0.8,
                    [],
                )
                .unwrap();
        }

        let ego = graph.ego_network(&ids[0], 2).unwrap();
        assert_eq!(ego.nodes.len(), 3);
        assert!(graph.ego_network(&ids[0], 0).is_err());
        assert!(graph.ego_network(&ids[0], 6).is_err());
    }

    #[test]
    fn test_shortest_path_prefers_confident_route() {
        let (mut graph, ids) = seeded_graph(4);
        // Two 2-hop routes from 0 to 3: via 1 (low confidence) and via 2.
        for (a, b, conf) in [
            (0, 1, 0.3),
            (1, 3, 0.3),
            (0, 2, 0.9),
            (2, 3, 0.9),
        ] {
            graph
                .add_edge(
                    &ids[a],
                    &ids[b],
                    Relationship::Knows,
                    EdgeClass::Direct,
                    0.8,
                    conf,
                    [],
                )
                .unwrap();
        }

        let path = graph.shortest_path(&ids[0], &ids[3]).unwrap();
        assert_eq!(path, vec![ids[0].clone(), ids[2].clone(), ids[3].clone()]);
    }

    #[test]
    fn test_shortest_path_absent() {
        let (graph, ids) = seeded_graph(2);
        assert!(graph.shortest_path(&ids[0], &ids[1]).is_none());
    }

    #[test]
    fn test_transitive_closure_adds_penalized_edges() {
        let (mut graph, ids) = seeded_graph(3);
        for window in ids.windows(2) {
            graph
                .add_edge(
                    &window[0],
                    &window[1],
                    Relationship::WorksWith,
                    EdgeClass::Direct,
                    0.8,
                    0.8,
                    [],
                )
                .unwrap();
        }

        graph.transitive_closure(Relationship::WorksWith, 3);

        let snapshot = graph.snapshot();
        let inferred = snapshot
            .edges
            .iter()
            .find(|edge| edge.src == ids[0] && edge.dst == ids[2])
            .expect("closure edge");
        assert_eq!(inferred.edge_class, EdgeClass::Inferred);
        assert!((inferred.strength - 0.64).abs() < 1e-9);
        assert!((inferred.confidence - 0.64 * 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_statistics() {
        let (mut graph, ids) = seeded_graph(3);
        graph
            .add_edge(
                &ids[0],
                &ids[1],
                Relationship::Knows,
                EdgeClass::Direct,
                1.0,
                0.5,
                [],
            )
            .unwrap();

        let stats = graph.statistics();
        assert_eq!(stats.node_count, 3);
        assert_eq!(stats.edge_count, 1);
        assert_eq!(stats.component_count, 2);
        assert!((stats.mean_confidence - 0.5).abs() < 1e-9);
    }
}
