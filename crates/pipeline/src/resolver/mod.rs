//! Entity resolution: cluster normalized candidates into resolved entities.
//!
//! Blocking keeps comparisons off the O(n^2) path; a union-find merges
//! pairs whose fuzzy score clears the investigation threshold. Pair
//! decisions depend only on the two candidates, so the final partition is
//! the connected components of the pairwise decision graph and is
//! independent of input order.

mod enrich;

pub use enrich::enrich_graph_and_timeline;

use crate::entity::{
    AttributeKey, AttributeValue, CandidateId, EntityId, NormalizedEntity, ResolvedEntity,
};
use crate::matcher::FuzzyMatcher;
use crate::types::VerificationStatus;
use osint_core::utils::combine_confidence;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// The ambiguity floor is fixed: pairs scoring in [60, threshold) are
/// flagged for review, never merged.
const AMBIGUOUS_FLOOR: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Merge threshold in 0-100 (`thresholds.minimum_entity_confidence`)
    pub merge_threshold: u8,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            merge_threshold: 70,
        }
    }
}

/// A below-threshold pairing worth human review
#[derive(Debug, Clone, serde::Serialize)]
pub struct AmbiguousPair {
    pub first: CandidateId,
    pub second: CandidateId,
    pub score: f64,
}

#[derive(Debug)]
pub struct ResolutionOutcome {
    pub entities: Vec<ResolvedEntity>,
    pub ambiguous_pairs: Vec<AmbiguousPair>,
}

pub struct EntityResolver {
    matcher: FuzzyMatcher,
    config: ResolverConfig,
}

impl EntityResolver {
    pub fn new(matcher: FuzzyMatcher, config: ResolverConfig) -> Self {
        Self { matcher, config }
    }

    pub fn resolve(&self, candidates: Vec<NormalizedEntity>) -> ResolutionOutcome {
        // Canonical processing order makes every downstream artifact
        // (entity ids aside) a pure function of the candidate set.
        let mut candidates = candidates;
        candidates.sort_by(|a, b| a.candidate.candidate_id.cmp(&b.candidate.candidate_id));
        candidates.dedup_by(|a, b| a.candidate.candidate_id == b.candidate.candidate_id);

        let pairs = self.comparable_pairs(&candidates);
        debug!(
            candidates = candidates.len(),
            comparable_pairs = pairs.len(),
            "resolution blocking complete"
        );

        let mut union_find = UnionFind::new(candidates.len());
        let mut merge_scores: Vec<(usize, usize, f64)> = Vec::new();
        let mut ambiguous_raw: Vec<(usize, usize, f64)> = Vec::new();

        for (i, j) in pairs {
            let score = self.matcher.score(&candidates[i], &candidates[j]).total;
            if score >= self.config.merge_threshold as f64 {
                union_find.union(i, j);
                merge_scores.push((i, j, score));
            } else if score >= AMBIGUOUS_FLOOR {
                ambiguous_raw.push((i, j, score));
            }
        }

        let clusters = union_find.clusters();
        let split_clusters = self.split_weak_clusters(clusters, &candidates, &merge_scores);

        let mut entities = Vec::new();
        let mut entity_of_candidate: HashMap<usize, EntityId> = HashMap::new();
        for cluster in split_clusters {
            let entity = self.build_entity(&cluster, &candidates);
            for &index in &cluster {
                entity_of_candidate.insert(index, entity.entity_id.clone());
            }
            entities.push(entity);
        }

        // Ambiguity annotations connect resolved entities, not candidates.
        let mut ambiguous_pairs = Vec::new();
        for (i, j, score) in ambiguous_raw {
            let entity_a = entity_of_candidate.get(&i).cloned();
            let entity_b = entity_of_candidate.get(&j).cloned();
            if let (Some(entity_a), Some(entity_b)) = (entity_a, entity_b) {
                if entity_a != entity_b {
                    for entity in entities.iter_mut() {
                        if entity.entity_id == entity_a
                            && !entity.ambiguous_with.contains(&entity_b)
                        {
                            entity.ambiguous_with.push(entity_b.clone());
                        }
                        if entity.entity_id == entity_b
                            && !entity.ambiguous_with.contains(&entity_a)
                        {
                            entity.ambiguous_with.push(entity_a.clone());
                        }
                    }
                    info!(
                        first = %candidates[i].candidate.candidate_id,
                        second = %candidates[j].candidate.candidate_id,
                        score = format!("{:.1}", score),
                        "ambiguous pairing logged for review"
                    );
                    ambiguous_pairs.push(AmbiguousPair {
                        first: candidates[i].candidate.candidate_id.clone(),
                        second: candidates[j].candidate.candidate_id.clone(),
                        score,
                    });
                }
            }
        }

        entities.sort_by(|a, b| a.member_candidates.cmp(&b.member_candidates));

        ResolutionOutcome {
            entities,
            ambiguous_pairs,
        }
    }

    /// Blocking: two candidates are comparable iff they share a block key
    /// and an entity type.
    fn comparable_pairs(&self, candidates: &[NormalizedEntity]) -> Vec<(usize, usize)> {
        let mut blocks: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, entity) in candidates.iter().enumerate() {
            for key in Self::block_keys(entity) {
                blocks.entry(key).or_default().push(index);
            }
        }

        let mut pairs: BTreeSet<(usize, usize)> = BTreeSet::new();
        for indices in blocks.values() {
            for (a, &i) in indices.iter().enumerate() {
                for &j in &indices[a + 1..] {
                    if candidates[i].candidate.entity_type == candidates[j].candidate.entity_type {
                        pairs.insert((i.min(j), i.max(j)));
                    }
                }
            }
        }
        pairs.into_iter().collect()
    }

    fn block_keys(entity: &NormalizedEntity) -> Vec<String> {
        let forms = &entity.canonical;
        let mut keys = Vec::new();
        if let Some(key) = &forms.deliverable_key {
            keys.push(format!("email:{}", key));
        }
        if let Some(phone) = &forms.e164_phone {
            keys.push(format!("phone:{}", phone));
        }
        if let Some(domain) = &forms.normalized_domain {
            keys.push(format!("domain:{}", domain));
        }
        for code in &forms.phonetic_codes {
            keys.push(format!("phonetic:{}", code));
        }
        for variant in &forms.username_variants {
            keys.push(format!("username:{}", variant));
        }
        keys
    }

    /// Clusters whose combined confidence lands below the `unlikely` floor
    /// split back on their weakest merge.
    fn split_weak_clusters(
        &self,
        clusters: Vec<Vec<usize>>,
        candidates: &[NormalizedEntity],
        merge_scores: &[(usize, usize, f64)],
    ) -> Vec<Vec<usize>> {
        let mut out = Vec::new();
        for cluster in clusters {
            if cluster.len() < 2 || self.cluster_confidence(&cluster, candidates) >= 60 {
                out.push(cluster);
                continue;
            }

            let in_cluster: BTreeSet<usize> = cluster.iter().copied().collect();
            let mut edges: Vec<(usize, usize, f64)> = merge_scores
                .iter()
                .filter(|(i, j, _)| in_cluster.contains(i) && in_cluster.contains(j))
                .copied()
                .collect();
            if edges.is_empty() {
                out.push(cluster);
                continue;
            }
            edges.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));
            let weakest = edges.remove(0);
            debug!(
                score = format!("{:.1}", weakest.2),
                "splitting low-confidence cluster on weakest merge"
            );

            // Reconnect with the remaining merges.
            let mut local = UnionFind::new(candidates.len());
            for (i, j, _) in edges {
                local.union(i, j);
            }
            let mut sub: HashMap<usize, Vec<usize>> = HashMap::new();
            for &index in &cluster {
                sub.entry(local.find(index)).or_default().push(index);
            }
            out.extend(sub.into_values());
        }
        out
    }

    fn cluster_confidence(&self, cluster: &[usize], candidates: &[NormalizedEntity]) -> u8 {
        let evidences: Vec<f64> = cluster
            .iter()
            .map(|&i| {
                candidates[i].candidate.extraction_confidence
                    * candidates[i].candidate.source_confidence
            })
            .collect();
        let combined = combine_confidence(&evidences);
        // Soften so a single strong structural observation is credible on
        // its own and corroboration pushes toward certainty.
        (combined.sqrt() * 100.0).round().clamp(0.0, 100.0) as u8
    }

    fn build_entity(&self, cluster: &[usize], candidates: &[NormalizedEntity]) -> ResolvedEntity {
        // Conflict resolution order: source confidence, then extraction
        // confidence, then recency.
        let mut ordered: Vec<&NormalizedEntity> = cluster.iter().map(|&i| &candidates[i]).collect();
        ordered.sort_by(|a, b| {
            b.candidate
                .source_confidence
                .partial_cmp(&a.candidate.source_confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.candidate
                        .extraction_confidence
                        .partial_cmp(&a.candidate.extraction_confidence)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(b.candidate.retrieved_at.cmp(&a.candidate.retrieved_at))
        });

        let mut attributes: BTreeMap<AttributeKey, AttributeValue> = BTreeMap::new();
        let mut disputed: BTreeMap<AttributeKey, Vec<AttributeValue>> = BTreeMap::new();
        for member in &ordered {
            for (key, value) in &member.candidate.attributes {
                match attributes.get(key) {
                    None => {
                        attributes.insert(*key, value.clone());
                    }
                    Some(existing) if existing == value => {}
                    Some(_) => {
                        let losers = disputed.entry(*key).or_default();
                        if !losers.contains(value) {
                            losers.push(value.clone());
                        }
                    }
                }
            }
        }

        let confidence = self.cluster_confidence(cluster, candidates);
        let mut member_candidates: Vec<CandidateId> = cluster
            .iter()
            .map(|&i| candidates[i].candidate.candidate_id.clone())
            .collect();
        member_candidates.sort();

        let sources: BTreeSet<String> = cluster
            .iter()
            .map(|&i| candidates[i].candidate.source_name.clone())
            .collect();
        let source_refs: BTreeSet<_> = cluster
            .iter()
            .flat_map(|&i| candidates[i].candidate.source_refs.iter().cloned())
            .collect();

        ResolvedEntity {
            entity_id: EntityId::new(),
            entity_type: candidates[cluster[0]].candidate.entity_type,
            attributes,
            disputed_attributes: disputed,
            confidence,
            verification_status: VerificationStatus::from_confidence(confidence),
            member_candidates,
            sources,
            source_refs,
            ambiguous_with: Vec::new(),
        }
    }
}

/// Path-compressing union-find over candidate indices.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        match self.rank[root_a].cmp(&self.rank[root_b]) {
            std::cmp::Ordering::Less => self.parent[root_a] = root_b,
            std::cmp::Ordering::Greater => self.parent[root_b] = root_a,
            std::cmp::Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] += 1;
            }
        }
    }

    fn clusters(&mut self) -> Vec<Vec<usize>> {
        let mut by_root: HashMap<usize, Vec<usize>> = HashMap::new();
        for index in 0..self.parent.len() {
            by_root.entry(self.find(index)).or_default().push(index);
        }
        let mut clusters: Vec<Vec<usize>> = by_root.into_values().collect();
        clusters.sort_by_key(|cluster| cluster[0]);
        clusters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityCandidate;
    use crate::normalize::Normalizer;
    use osint_core::types::EntityType;

    fn resolver() -> EntityResolver {
        EntityResolver::new(FuzzyMatcher::default(), ResolverConfig::default())
    }

    fn person(name: &str, email: &str, source_confidence: f64) -> NormalizedEntity {
        let candidate = EntityCandidate::new(EntityType::Person, "test")
            .with_attribute(AttributeKey::FullName, name)
            .with_attribute(AttributeKey::Email, email)
            .with_extraction_confidence(0.9)
            .with_source_confidence(source_confidence);
        Normalizer::new(Some("US".to_string())).normalize(candidate)
    }

    #[test]
    fn test_same_mailbox_candidates_merge() {
        let outcome = resolver().resolve(vec![
            person("Alice Roe", "alice.roe@gmail.com", 0.9),
            person("Alice Roe", "aliceroe@googlemail.com", 0.8),
        ]);

        assert_eq!(outcome.entities.len(), 1);
        let entity = &outcome.entities[0];
        assert_eq!(entity.member_candidates.len(), 2);
        assert_eq!(entity.sources.len(), 1);
        assert!(entity.confidence >= 90);
        assert_eq!(entity.verification_status, VerificationStatus::Verified);
    }

    #[test]
    fn test_unrelated_candidates_stay_apart() {
        let outcome = resolver().resolve(vec![
            person("Alice Roe", "alice@aroe.example", 0.9),
            person("Bogdan Chen", "bchen@unrelated.net", 0.9),
        ]);
        assert_eq!(outcome.entities.len(), 2);
        assert!(outcome.ambiguous_pairs.is_empty());
    }

    #[test]
    fn test_order_independence() {
        let a = person("Alice Roe", "alice.roe@gmail.com", 0.9);
        let b = person("Alice Roe", "aliceroe@googlemail.com", 0.8);
        let c = person("Bogdan Chen", "bchen@unrelated.net", 0.7);

        let forward = resolver().resolve(vec![a.clone(), b.clone(), c.clone()]);
        let backward = resolver().resolve(vec![c, b, a]);

        let partition = |outcome: &ResolutionOutcome| -> Vec<Vec<CandidateId>> {
            let mut partition: Vec<Vec<CandidateId>> = outcome
                .entities
                .iter()
                .map(|entity| entity.member_candidates.clone())
                .collect();
            partition.sort();
            partition
        };
        assert_eq!(partition(&forward), partition(&backward));

        let confidences = |outcome: &ResolutionOutcome| -> Vec<(Vec<CandidateId>, u8)> {
            let mut list: Vec<_> = outcome
                .entities
                .iter()
                .map(|entity| (entity.member_candidates.clone(), entity.confidence))
                .collect();
            list.sort();
            list
        };
        assert_eq!(confidences(&forward), confidences(&backward));
    }

    #[test]
    fn test_conflicts_recorded_as_disputed() {
        let strong = person("Alice Roe", "alice.roe@gmail.com", 0.95);
        let weak = {
            let candidate = EntityCandidate::new(EntityType::Person, "weak_source")
                .with_attribute(AttributeKey::FullName, "Alice Roe")
                .with_attribute(AttributeKey::Email, "alice.roe@gmail.com")
                .with_attribute(AttributeKey::Employer, "Other Corp")
                .with_extraction_confidence(0.9)
                .with_source_confidence(0.4);
            Normalizer::new(Some("US".to_string())).normalize(candidate)
        };
        let strong = {
            let mut s = strong;
            s.candidate = s
                .candidate
                .with_attribute(AttributeKey::Employer, "Example Corp");
            s
        };

        let outcome = resolver().resolve(vec![weak, strong]);
        assert_eq!(outcome.entities.len(), 1);
        let entity = &outcome.entities[0];
        // Higher source confidence wins; the loser is preserved.
        assert_eq!(
            entity.attributes.get(&AttributeKey::Employer),
            Some(&AttributeValue::Text("Example Corp".to_string()))
        );
        assert_eq!(
            entity.disputed_attributes.get(&AttributeKey::Employer),
            Some(&vec![AttributeValue::Text("Other Corp".to_string())])
        );
    }

    #[test]
    fn test_ambiguous_band_annotates_without_merging() {
        // Same name, city, employer; different mailboxes and birth years.
        let make = |email: &str, year: i64| {
            let candidate = EntityCandidate::new(EntityType::Person, "test")
                .with_attribute(AttributeKey::FullName, "Jordan Vale")
                .with_attribute(AttributeKey::Email, email)
                .with_attribute(AttributeKey::City, "Portland")
                .with_attribute(AttributeKey::Region, "OR")
                .with_attribute(AttributeKey::Employer, "Example Corp")
                .with_attribute(AttributeKey::BirthYear, year)
                .with_extraction_confidence(0.9)
                .with_source_confidence(0.9);
            Normalizer::new(Some("US".to_string())).normalize(candidate)
        };

        let outcome = resolver().resolve(vec![
            make("jordan.v@example.com", 1985),
            make("jv.consulting@elsewhere.net", 1990),
        ]);

        assert_eq!(outcome.entities.len(), 2);
        assert_eq!(outcome.ambiguous_pairs.len(), 1);
        let score = outcome.ambiguous_pairs[0].score;
        assert!((60.0..=75.0).contains(&score), "score {:.1}", score);
        for entity in &outcome.entities {
            assert!(entity.is_ambiguous());
        }
    }

    #[test]
    fn test_merging_entity_with_itself_is_noop() {
        let single = person("Alice Roe", "alice@aroe.example", 0.9);
        let outcome_once = resolver().resolve(vec![single.clone()]);
        let outcome_twice = resolver().resolve(vec![single.clone(), single]);

        // The duplicate deduplicates: same attributes, same confidence,
        // no disputed values.
        assert_eq!(outcome_twice.entities.len(), 1);
        assert_eq!(
            outcome_once.entities[0].attributes,
            outcome_twice.entities[0].attributes
        );
        assert_eq!(
            outcome_once.entities[0].confidence,
            outcome_twice.entities[0].confidence
        );
        assert!(outcome_twice.entities[0].disputed_attributes.is_empty());
    }

    #[test]
    fn test_cross_type_candidates_never_compare() {
        let email_candidate = {
            let candidate = EntityCandidate::new(EntityType::Email, "whois_lookup")
                .with_attribute(AttributeKey::Email, "alice@aroe.example")
                .with_extraction_confidence(0.9)
                .with_source_confidence(0.9);
            Normalizer::default().normalize(candidate)
        };
        let person_candidate = person("Alice Roe", "alice@aroe.example", 0.9);

        let outcome = resolver().resolve(vec![email_candidate, person_candidate]);
        assert_eq!(outcome.entities.len(), 2);
    }
}
