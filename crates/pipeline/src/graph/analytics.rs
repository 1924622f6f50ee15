//! Graph analytics: PageRank, centrality, communities.

use super::EntityGraph;
use crate::entity::EntityId;
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};

const DAMPING: f64 = 0.85;
const MAX_ITERATIONS: usize = 20;
const CONVERGENCE_L1: f64 = 1e-4;

/// Node count above which betweenness switches to sampled sources.
const EXACT_BETWEENNESS_LIMIT: usize = 1000;
const BETWEENNESS_SAMPLES: usize = 64;

#[derive(Debug, Clone, Serialize)]
pub struct CommunityAssignment {
    pub community_id: usize,
    pub members: Vec<EntityId>,
}

pub fn pagerank(graph: &EntityGraph) -> BTreeMap<EntityId, f64> {
    let g = graph.petgraph();
    let n = g.node_count();
    if n == 0 {
        return BTreeMap::new();
    }

    let nodes: Vec<NodeIndex> = g.node_indices().collect();
    let mut rank: HashMap<NodeIndex, f64> =
        nodes.iter().map(|&i| (i, 1.0 / n as f64)).collect();

    for _ in 0..MAX_ITERATIONS {
        let mut next: HashMap<NodeIndex, f64> =
            nodes.iter().map(|&i| (i, (1.0 - DAMPING) / n as f64)).collect();

        // Dangling mass is spread uniformly.
        let dangling: f64 = nodes
            .iter()
            .filter(|&&i| g.neighbors_directed(i, Direction::Outgoing).next().is_none())
            .map(|i| rank[i])
            .sum();
        let dangling_share = DAMPING * dangling / n as f64;

        for &node in &nodes {
            let out_degree = g.neighbors_directed(node, Direction::Outgoing).count();
            if out_degree == 0 {
                continue;
            }
            let share = DAMPING * rank[&node] / out_degree as f64;
            for neighbor in g.neighbors_directed(node, Direction::Outgoing) {
                *next.get_mut(&neighbor).expect("known node") += share;
            }
        }
        for value in next.values_mut() {
            *value += dangling_share;
        }

        let delta: f64 = nodes.iter().map(|i| (next[i] - rank[i]).abs()).sum();
        rank = next;
        if delta < CONVERGENCE_L1 {
            break;
        }
    }

    nodes
        .iter()
        .map(|&i| (g[i].entity_id.clone(), rank[&i]))
        .collect()
}

/// Degree centrality normalized by the maximum possible degree.
pub fn degree_centrality(graph: &EntityGraph) -> BTreeMap<EntityId, f64> {
    let g = graph.petgraph();
    let n = g.node_count();
    if n <= 1 {
        return g
            .node_indices()
            .map(|i| (g[i].entity_id.clone(), 0.0))
            .collect();
    }
    let denominator = (n - 1) as f64;
    g.node_indices()
        .map(|i| {
            let degree = g.neighbors_directed(i, Direction::Outgoing).count()
                + g.neighbors_directed(i, Direction::Incoming).count();
            (g[i].entity_id.clone(), degree as f64 / denominator)
        })
        .collect()
}

/// Brandes betweenness over the symmetrized view. Above the exact limit,
/// deterministic stride sampling picks the BFS sources and scores scale up
/// by `n / samples`.
pub fn betweenness_centrality(graph: &EntityGraph) -> BTreeMap<EntityId, f64> {
    let g = graph.petgraph();
    let nodes: Vec<NodeIndex> = g.node_indices().collect();
    let n = nodes.len();
    let mut scores: HashMap<NodeIndex, f64> = nodes.iter().map(|&i| (i, 0.0)).collect();
    if n < 3 {
        return finish(graph, scores);
    }

    let sources: Vec<NodeIndex> = if n <= EXACT_BETWEENNESS_LIMIT {
        nodes.clone()
    } else {
        let stride = n.div_ceil(BETWEENNESS_SAMPLES);
        nodes.iter().step_by(stride).copied().collect()
    };
    let scale = n as f64 / sources.len() as f64;

    for &source in &sources {
        // Single-source shortest paths (unweighted, undirected view).
        let mut stack: Vec<NodeIndex> = Vec::new();
        let mut predecessors: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
        let mut sigma: HashMap<NodeIndex, f64> = HashMap::from([(source, 1.0)]);
        let mut dist: HashMap<NodeIndex, usize> = HashMap::from([(source, 0)]);
        let mut queue = VecDeque::from([source]);

        while let Some(v) = queue.pop_front() {
            stack.push(v);
            let neighbors: Vec<NodeIndex> = g
                .neighbors_directed(v, Direction::Outgoing)
                .chain(g.neighbors_directed(v, Direction::Incoming))
                .collect();
            for w in neighbors {
                if !dist.contains_key(&w) {
                    dist.insert(w, dist[&v] + 1);
                    queue.push_back(w);
                }
                if dist[&w] == dist[&v] + 1 {
                    *sigma.entry(w).or_insert(0.0) += sigma[&v];
                    predecessors.entry(w).or_default().push(v);
                }
            }
        }

        let mut delta: HashMap<NodeIndex, f64> = HashMap::new();
        while let Some(w) = stack.pop() {
            let delta_w = *delta.get(&w).unwrap_or(&0.0);
            if let Some(preds) = predecessors.get(&w) {
                for &v in preds {
                    let share = sigma[&v] / sigma[&w] * (1.0 + delta_w);
                    *delta.entry(v).or_insert(0.0) += share;
                }
            }
            if w != source {
                *scores.get_mut(&w).expect("known node") += delta_w * scale;
            }
        }
    }

    // Undirected normalization.
    let norm = ((n - 1) * (n - 2)) as f64;
    for value in scores.values_mut() {
        *value /= norm;
    }
    finish(graph, scores)
}

fn finish(
    graph: &EntityGraph,
    scores: HashMap<NodeIndex, f64>,
) -> BTreeMap<EntityId, f64> {
    let g = graph.petgraph();
    scores
        .into_iter()
        .map(|(index, score)| (g[index].entity_id.clone(), score))
        .collect()
}

/// Connected components over the symmetrized view, largest first.
pub fn communities(graph: &EntityGraph) -> Vec<CommunityAssignment> {
    let g = graph.petgraph();
    let mut assigned: HashMap<NodeIndex, usize> = HashMap::new();
    let mut communities: Vec<Vec<EntityId>> = Vec::new();

    for start in g.node_indices() {
        if assigned.contains_key(&start) {
            continue;
        }
        let community_id = communities.len();
        let mut members = Vec::new();
        let mut queue = VecDeque::from([start]);
        assigned.insert(start, community_id);
        while let Some(node) = queue.pop_front() {
            members.push(g[node].entity_id.clone());
            for neighbor in g
                .neighbors_directed(node, Direction::Outgoing)
                .chain(g.neighbors_directed(node, Direction::Incoming))
            {
                if !assigned.contains_key(&neighbor) {
                    assigned.insert(neighbor, community_id);
                    queue.push_back(neighbor);
                }
            }
        }
        members.sort();
        communities.push(members);
    }

    communities.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    communities
        .into_iter()
        .enumerate()
        .map(|(community_id, members)| CommunityAssignment {
            community_id,
            members,
        })
        .collect()
}

pub fn component_count(graph: &EntityGraph) -> usize {
    communities(graph).len()
}
