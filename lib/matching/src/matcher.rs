//! Cross-source identity matching
//!
//! Scores the candidate pairs produced by the blocker and clusters records
//! with a union-find over the accepted edges. Edges are processed strongest
//! first, so the outcome does not depend on input order beyond the final
//! tie-break on record position.
//!
//! Rules, in order:
//! 1. same-source pairs never form identity edges. A same-source pair that
//!    scores above the high threshold with an identical normalized address
//!    is an internal duplicate: the less complete record is absorbed and an
//!    invariant violation is reported;
//! 2. an edge that would put two records of one source into a cluster is
//!    rejected;
//! 3. edges at or above the high threshold merge unconditionally;
//! 4. gray-zone edges merge only when the edge is the best candidate of both
//!    endpoints and one side is still a singleton.

use crate::blocking::Blocker;
use crate::config::MatchConfig;
use crate::scorer::{PairScore, Scorer};
use ahash::AHashMap;
use dishx_core::{MatchCluster, NormalizedRecord, RunContext, RunIssue};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
struct Edge {
    a: usize,
    b: usize,
    score: f32,
}

/// Union-find over record positions, tracking which sources each set holds.
struct Components {
    parent: Vec<usize>,
    size: Vec<usize>,
    sources: Vec<u8>,
    confidence: Vec<f32>,
}

impl Components {
    fn new(records: &[NormalizedRecord]) -> Self {
        let n = records.len();
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
            sources: records.iter().map(|r| 1u8 << r.source().priority()).collect(),
            confidence: vec![1.0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, ra: usize, rb: usize, score: f32) {
        let (big, small) = if self.size[ra] >= self.size[rb] { (ra, rb) } else { (rb, ra) };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        self.sources[big] |= self.sources[small];
        self.confidence[big] = self.confidence[big].min(self.confidence[small]).min(score);
    }
}

/// Follow the absorption chain to the record that survived.
fn survivor(absorbed_into: &[usize], mut idx: usize) -> usize {
    while absorbed_into[idx] != idx {
        idx = absorbed_into[idx];
    }
    idx
}

fn edge_order(records: &[NormalizedRecord], x: &Edge, y: &Edge) -> std::cmp::Ordering {
    let priorities = |e: &Edge| {
        let (pa, pb) = (records[e.a].source().priority(), records[e.b].source().priority());
        (pa.min(pb), pa.max(pb))
    };
    y.score
        .total_cmp(&x.score)
        .then_with(|| priorities(x).cmp(&priorities(y)))
        .then_with(|| (x.a, x.b).cmp(&(y.a, y.b)))
}

#[derive(Debug, Clone)]
pub struct Matcher {
    scorer: Scorer,
}

impl Matcher {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            scorer: Scorer::new(config),
        }
    }

    pub fn config(&self) -> &MatchConfig {
        self.scorer.config()
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Partition `records` into clusters. Every input record ends up in
    /// exactly one cluster, as a member or as an absorbed duplicate.
    pub fn match_records(&self, ctx: &RunContext, records: Vec<NormalizedRecord>) -> Vec<MatchCluster> {
        let n = records.len();
        if n == 0 {
            return Vec::new();
        }
        let config = self.config();

        let pairs = Blocker::new(config).candidate_pairs(&records);
        let scored: Vec<(usize, usize, PairScore)> = pairs
            .par_iter()
            .map(|&(i, j)| (i, j, self.scorer.score(&records[i], &records[j])))
            .collect();
        debug!(records = n, candidate_pairs = scored.len(), "scored candidate pairs");

        let mut duplicate_edges = Vec::new();
        let mut identity_edges = Vec::new();
        for (a, b, pair) in scored {
            let edge = Edge { a, b, score: pair.score };
            if records[a].source() == records[b].source() {
                let same_address = records[a].normalized_address.is_some()
                    && records[a].normalized_address == records[b].normalized_address;
                if pair.score >= config.high_threshold && same_address {
                    duplicate_edges.push(edge);
                }
            } else if pair.score >= config.low_threshold {
                identity_edges.push(edge);
            }
        }

        let absorbed_into = self.absorb_duplicates(ctx, &records, duplicate_edges);

        // Re-point edges at surviving records, keeping the strongest per pair.
        let mut merged_edges: BTreeMap<(usize, usize), f32> = BTreeMap::new();
        for edge in identity_edges {
            let (a, b) = (survivor(&absorbed_into, edge.a), survivor(&absorbed_into, edge.b));
            if a == b {
                continue;
            }
            let slot = merged_edges.entry((a.min(b), a.max(b))).or_insert(edge.score);
            *slot = slot.max(edge.score);
        }
        let mut edges: Vec<Edge> = merged_edges
            .into_iter()
            .map(|((a, b), score)| Edge { a, b, score })
            .collect();

        let mut best = vec![0.0f32; n];
        for edge in &edges {
            best[edge.a] = best[edge.a].max(edge.score);
            best[edge.b] = best[edge.b].max(edge.score);
        }

        edges.sort_by(|x, y| edge_order(&records, x, y));

        let mut components = Components::new(&records);
        for edge in edges {
            let (ra, rb) = (components.find(edge.a), components.find(edge.b));
            if ra == rb {
                continue;
            }
            let collision = components.sources[ra] & components.sources[rb] != 0;
            let high = edge.score >= config.high_threshold;

            if high {
                if collision {
                    debug!(
                        left = %records[edge.a].key(),
                        right = %records[edge.b].key(),
                        score = edge.score,
                        "edge rejected: cluster already holds a record of that source"
                    );
                    continue;
                }
                components.union(ra, rb, edge.score);
                continue;
            }

            let mutual_best = edge.score >= best[edge.a] && edge.score >= best[edge.b];
            let open = components.size[ra] == 1 || components.size[rb] == 1;
            let merged = mutual_best && open && !collision;
            ctx.record(RunIssue::MatchAmbiguity {
                left: records[edge.a].key(),
                right: records[edge.b].key(),
                score: edge.score,
                merged,
            });
            if merged {
                components.union(ra, rb, edge.score);
            }
        }

        let clusters = Self::collect_clusters(records, &absorbed_into, &mut components);
        let multi = clusters.iter().filter(|c| c.members.len() > 1).count();
        ctx.update_counts(|counts| {
            counts.clusters = clusters.len();
            counts.multi_source_clusters = multi;
        });
        info!(records = n, clusters = clusters.len(), multi_source = multi, "matching complete");
        clusters
    }

    /// Resolve same-source duplicates; returns, for every record, the
    /// position of the record it was absorbed into (itself if it survived).
    fn absorb_duplicates(&self, ctx: &RunContext, records: &[NormalizedRecord], mut edges: Vec<Edge>) -> Vec<usize> {
        let mut absorbed_into: Vec<usize> = (0..records.len()).collect();
        edges.sort_by(|x, y| edge_order(records, x, y));

        for edge in edges {
            let (a, b) = (survivor(&absorbed_into, edge.a), survivor(&absorbed_into, edge.b));
            if a == b {
                continue;
            }
            let (ca, cb) = (records[a].completeness(), records[b].completeness());
            let (kept, discarded) = if ca > cb || (ca == cb && a < b) { (a, b) } else { (b, a) };
            absorbed_into[discarded] = kept;

            ctx.record(RunIssue::InvariantViolation {
                source: records[kept].source(),
                kept: records[kept].key(),
                discarded: records[discarded].key(),
                message: format!("internal duplicate within one source (score {:.3})", edge.score),
            });
        }
        absorbed_into
    }

    fn collect_clusters(
        records: Vec<NormalizedRecord>,
        absorbed_into: &[usize],
        components: &mut Components,
    ) -> Vec<MatchCluster> {
        let n = records.len();
        let roots: Vec<usize> = (0..n).map(|i| components.find(survivor(absorbed_into, i))).collect();

        // clusters appear in order of their first record
        let mut slot_of_root: AHashMap<usize, usize> = AHashMap::new();
        let mut groups: Vec<(Vec<usize>, Vec<usize>)> = Vec::new();
        for (idx, &root) in roots.iter().enumerate() {
            let slot = *slot_of_root.entry(root).or_insert_with(|| {
                groups.push((Vec::new(), Vec::new()));
                groups.len() - 1
            });
            if absorbed_into[idx] == idx {
                groups[slot].0.push(idx);
            } else {
                groups[slot].1.push(idx);
            }
        }

        let mut slots: Vec<Option<NormalizedRecord>> = records.into_iter().map(Some).collect();
        let mut take = |idx: usize| slots[idx].take();

        groups
            .into_iter()
            .map(|(mut members, duplicates)| {
                let confidence = match members.first() {
                    Some(&first) => {
                        let root = components.find(first);
                        components.confidence[root]
                    }
                    None => 1.0,
                };
                let mut members: Vec<NormalizedRecord> = members.into_iter().filter_map(&mut take).collect();
                members.sort_by_key(|m| m.source().priority());
                MatchCluster {
                    members,
                    duplicates: duplicates.into_iter().filter_map(&mut take).collect(),
                    confidence,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use chrono::Utc;
    use dishx_core::{RawRecord, SourceId};
    use std::collections::BTreeSet;

    fn rec(source: SourceId, id: &str, name: &str, address: &str) -> NormalizedRecord {
        normalize(RawRecord::new(source, id, name, address, Utc::now()))
    }

    fn run(records: Vec<NormalizedRecord>) -> (Vec<MatchCluster>, RunContext) {
        let ctx = RunContext::new();
        let clusters = Matcher::new(MatchConfig::default()).match_records(&ctx, records);
        (clusters, ctx)
    }

    #[test]
    fn test_cross_source_variants_merge() {
        let (clusters, _) = run(vec![
            rec(SourceId::Resy, "r1", "Joes Pizza", "7 Carmine Street, New York"),
            rec(SourceId::Google, "g1", "Joe's Pizza", "7 Carmine St, New York"),
            rec(SourceId::Osm, "o1", "JOE'S PIZZA", "7 Carmine St., New York"),
        ]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].sources(), vec![SourceId::Google, SourceId::Osm, SourceId::Resy]);
        assert!(clusters[0].confidence >= 0.85);
    }

    #[test]
    fn test_dissimilar_names_without_address_stay_apart() {
        let (clusters, _) = run(vec![
            rec(SourceId::Google, "g1", "Joe's Pizza", ""),
            rec(SourceId::Resy, "r1", "Joe's Shanghai", ""),
        ]);
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| c.is_singleton() && c.confidence == 1.0));
    }

    #[test]
    fn test_same_source_never_shares_cluster() {
        let (clusters, ctx) = run(vec![
            rec(SourceId::Google, "g1", "Joe's Pizza", "7 Carmine St, New York"),
            rec(SourceId::Google, "g2", "Joe's Pizza", "7 Carmine St, New York"),
            rec(SourceId::Resy, "r1", "Joe's Pizza", "7 Carmine St, New York"),
        ]);
        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.members.len(), 2);
        assert_eq!(cluster.duplicates.len(), 1);
        assert_eq!(cluster.duplicates[0].key(), "google:g2");
        assert_eq!(ctx.report().count_of("invariant_violation"), 1);
    }

    #[test]
    fn test_chain_branches_in_one_source_stay_apart() {
        let branch = |id: &str, address: &str, lon: f64| {
            normalize(RawRecord::new(SourceId::Google, id, "Joe's Pizza", address, Utc::now()).with_coordinates(40.7305, lon))
        };
        let (clusters, ctx) = run(vec![
            branch("g1", "7 Carmine St, New York", -74.0022),
            branch("g2", "1435 Broadway, New York", -74.0021),
        ]);
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| c.members.len() == 1 && c.duplicates.is_empty()));
        assert_eq!(ctx.report().count_of("invariant_violation"), 0);
    }

    #[test]
    fn test_gray_zone_mutual_best_merges() {
        let (clusters, ctx) = run(vec![
            rec(SourceId::Google, "g1", "Joe's Pizza", "7 Carmine St"),
            rec(SourceId::Resy, "r1", "Joe's Pizza", "Carmine St"),
        ]);
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].confidence < 0.85);
        let report = ctx.report();
        let ambiguity: Vec<_> = report.issues_of("match_ambiguity").collect();
        assert_eq!(ambiguity.len(), 1);
        assert!(matches!(ambiguity[0], RunIssue::MatchAmbiguity { merged: true, .. }));
    }

    #[test]
    fn test_gray_zone_loses_to_stronger_candidate() {
        let (clusters, ctx) = run(vec![
            rec(SourceId::Google, "g1", "Joe's Pizza", "7 Carmine St"),
            rec(SourceId::Osm, "o1", "Joe's Pizza", "7 Carmine Street"),
            rec(SourceId::Resy, "r1", "Joe's Pizza", "Carmine St"),
        ]);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].sources(), vec![SourceId::Google, SourceId::Osm]);
        assert!(clusters[1].is_singleton());
        let report = ctx.report();
        assert!(report
            .issues_of("match_ambiguity")
            .all(|i| matches!(i, RunIssue::MatchAmbiguity { merged: false, .. })));
    }

    #[test]
    fn test_clusters_partition_input() {
        let records = vec![
            rec(SourceId::Google, "g1", "Joe's Pizza", "7 Carmine St, New York"),
            rec(SourceId::Osm, "o1", "Joe's Pizza", "7 Carmine St, New York"),
            rec(SourceId::Google, "g2", "Carbone", "181 Thompson St, New York"),
            rec(SourceId::Resy, "r1", "Carbone", "181 Thompson Street, New York"),
            rec(SourceId::OpenTable, "t1", "Lilia", "567 Union Ave, Brooklyn"),
            rec(SourceId::Website, "w1", "Lilia", ""),
        ];
        let input: BTreeSet<String> = records.iter().map(|r| r.key()).collect();
        let (clusters, _) = run(records);

        let mut seen = BTreeSet::new();
        for cluster in &clusters {
            for key in cluster.record_keys() {
                assert!(seen.insert(key), "record in two clusters");
            }
            let sources: BTreeSet<_> = cluster.sources().into_iter().collect();
            assert_eq!(sources.len(), cluster.members.len());
        }
        assert_eq!(seen, input);
    }

    #[test]
    fn test_input_order_does_not_change_grouping() {
        let records = vec![
            rec(SourceId::Google, "g1", "Joe's Pizza", "7 Carmine St, New York"),
            rec(SourceId::Resy, "r1", "Joes Pizza", "7 Carmine Street, New York"),
            rec(SourceId::Google, "g2", "Carbone", "181 Thompson St, New York"),
            rec(SourceId::Osm, "o1", "Carbone", "181 Thompson St, New York"),
        ];
        let grouping = |clusters: Vec<MatchCluster>| -> BTreeSet<BTreeSet<String>> {
            clusters.iter().map(|c| c.record_keys().into_iter().collect()).collect()
        };
        let (forward, _) = run(records.clone());
        let (backward, _) = run(records.into_iter().rev().collect());
        assert_eq!(grouping(forward), grouping(backward));
    }

    #[test]
    fn test_empty_input() {
        let (clusters, _) = run(Vec::new());
        assert!(clusters.is_empty());
    }
}
