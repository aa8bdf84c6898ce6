use crate::poa::graph::PoaGraph;
use crate::utils::Result;
use std::collections::{HashMap, HashSet};

/// Fraction of a sequence's length that a consensus path must cover before
/// that sequence stops contributing weight to later paths.
pub const DEFAULT_MAX_FRACTION: f64 = 0.5;

/// One heaviest path through the graph and the residues along it.
#[derive(Debug, Clone)]
pub struct Consensus {
    pub path: Vec<usize>,
    pub bases: String,
}

/// Extracts consensus paths until every tracked sequence is saturated.
///
/// Each round finds the heaviest path, then excludes every sequence whose
/// label was seen along it at least `max_fraction` of that sequence's own
/// length; excluded labels no longer add weight in later rounds. A round
/// that produces a non-empty path but excludes nothing would loop forever
/// and is reported as a fatal inconsistency instead.
pub fn all_consensuses(graph: &mut PoaGraph, max_fraction: f64) -> Result<Vec<Consensus>> {
    graph.ensure_sorted()?;
    graph.verify_sort()?;

    let mut exclusions: HashSet<String> = HashSet::new();
    let mut consensuses = Vec::new();

    while exclusions.len() < graph.sequence_count() {
        let (consensus, label_counts, weight) = heaviest_path(graph, &exclusions);
        if consensus.path.is_empty() {
            break;
        }
        log::debug!(
            "consensus round {}: {} nodes, weight {}",
            consensuses.len(),
            consensus.path.len(),
            weight
        );

        let newly_excluded: Vec<String> = graph
            .sequences()
            .filter(|(label, seq, _)| {
                !exclusions.contains(*label)
                    && label_counts.get(*label).copied().unwrap_or(0) as f64
                        >= max_fraction * seq.len() as f64
            })
            .map(|(label, _, _)| label.to_string())
            .collect();
        if newly_excluded.is_empty() {
            return Err(
                "consensus extraction stalled: a non-empty path saturated no sequence".to_string(),
            );
        }

        consensuses.push(consensus);
        exclusions.extend(newly_excluded);
    }

    Ok(consensuses)
}

/// Single heaviest-path round. Edge weight is the count of its labels outside
/// the exclusion set; every node's best successor maximizes
/// `(weight, downstream score, neighbor id)` lexicographically, so ties fall
/// to the higher-id neighbor. Returns the path, a per-label tally of path
/// nodes carrying that label on an incident edge, and the path's weight sum.
fn heaviest_path(
    graph: &PoaGraph,
    exclusions: &HashSet<String>,
) -> (Consensus, HashMap<String, usize>, i64) {
    let num_nodes = graph.node_count();
    let mut next_in_path: Vec<Option<usize>> = vec![None; num_nodes];
    let mut scores: Vec<i64> = vec![0; num_nodes];

    for &node_id in graph.topo_order().iter().rev() {
        let mut best: Option<(i64, i64, usize)> = None;
        for (neighbor_id, edge) in graph.node(node_id).out_edges() {
            let weight = edge
                .labels()
                .iter()
                .filter(|label| !exclusions.contains(*label))
                .count() as i64;
            let candidate = (weight, scores[neighbor_id], neighbor_id);
            if best.is_none_or(|current| candidate > current) {
                best = Some(candidate);
            }
        }
        if let Some((weight, downstream, neighbor)) = best {
            scores[node_id] = weight + downstream;
            next_in_path[node_id] = Some(neighbor);
        }
    }

    let mut consensus = Consensus {
        path: Vec::new(),
        bases: String::new(),
    };
    let mut label_counts: HashMap<String, usize> = HashMap::new();
    if num_nodes == 0 {
        return (consensus, label_counts, 0);
    }

    let mut start = 0;
    for (id, &score) in scores.iter().enumerate() {
        if score > scores[start] {
            start = id;
        }
    }

    let mut cursor = Some(start);
    while let Some(id) = cursor {
        consensus.path.push(id);
        consensus.bases.push(graph.node(id).base as char);
        for label in graph.node(id).labels() {
            *label_counts.entry(label).or_insert(0) += 1;
        }
        cursor = next_in_path[id];
    }

    (consensus, label_counts, scores[start])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poa::align::{align_to_graph, PoaScoring};
    use crate::poa::integrate::integrate_alignment;

    fn scoring() -> PoaScoring {
        PoaScoring {
            match_scr: 4.0,
            mism_scr: -2.0,
            gapo_scr: -4.0,
            gape_scr: -2.0,
        }
    }

    fn integrate(graph: &mut PoaGraph, sequence: &str, label: &str) {
        let alignment = align_to_graph(graph, &scoring(), sequence, label).unwrap();
        integrate_alignment(graph, &alignment).unwrap();
    }

    #[test]
    fn consensus_of_two_similar_sequences() {
        let mut graph = PoaGraph::new();
        graph.add_chain("ACGT", "base", true);
        integrate(&mut graph, "ACT", "new");

        let consensuses = all_consensuses(&mut graph, DEFAULT_MAX_FRACTION).unwrap();
        assert_eq!(consensuses.len(), 1);
        assert_eq!(consensuses[0].bases, "ACGT");
        assert_eq!(consensuses[0].path, vec![0, 1, 2, 3]);
    }

    #[test]
    fn disjoint_chains_yield_one_consensus_each() {
        let mut graph = PoaGraph::new();
        graph.add_chain("AAAA", "a", true);
        integrate(&mut graph, "TTTT", "t");

        let consensuses = all_consensuses(&mut graph, DEFAULT_MAX_FRACTION).unwrap();
        assert_eq!(consensuses.len(), 2);
        assert_eq!(consensuses[0].bases, "AAAA");
        assert_eq!(consensuses[1].bases, "TTTT");
    }

    #[test]
    fn empty_graph_has_no_consensus() {
        let mut graph = PoaGraph::new();
        let consensuses = all_consensuses(&mut graph, DEFAULT_MAX_FRACTION).unwrap();
        assert!(consensuses.is_empty());
    }

    #[test]
    fn empty_sequence_saturates_immediately() {
        let mut graph = PoaGraph::new();
        graph.add_chain("ACGT", "base", true);
        graph.add_chain("", "empty", true);

        let consensuses = all_consensuses(&mut graph, DEFAULT_MAX_FRACTION).unwrap();
        assert_eq!(consensuses.len(), 1);
        assert_eq!(consensuses[0].bases, "ACGT");
    }

    #[test]
    fn stalled_extraction_is_fatal() {
        let mut graph = PoaGraph::new();
        graph.add_chain("ACGT", "base", true);
        // a tracked sequence far longer than anything a path can cover
        graph.record_sequence(&"Z".repeat(100), "ghost", None);

        assert!(all_consensuses(&mut graph, DEFAULT_MAX_FRACTION).is_err());
    }

    #[test]
    fn path_weight_matches_brute_force_tally() {
        let mut graph = PoaGraph::new();
        graph.add_chain("ACGT", "s1", true);
        integrate(&mut graph, "ACT", "s2");
        integrate(&mut graph, "AGGT", "s3");
        graph.ensure_sorted().unwrap();

        let exclusions = HashSet::new();
        let (consensus, _, weight) = heaviest_path(&graph, &exclusions);
        assert!(!consensus.path.is_empty());

        let mut recomputed = 0i64;
        for pair in consensus.path.windows(2) {
            let edge = graph
                .node(pair[0])
                .out_edge(pair[1])
                .expect("consensus path must follow edges");
            recomputed += edge.labels().len() as i64;
        }
        assert_eq!(weight, recomputed);
    }

    #[test]
    fn excluded_labels_carry_no_weight() {
        let mut graph = PoaGraph::new();
        graph.add_chain("AAAA", "a", true);
        integrate(&mut graph, "TTTT", "t");
        graph.ensure_sorted().unwrap();

        let exclusions: HashSet<String> = ["a".to_string()].into_iter().collect();
        let (consensus, _, weight) = heaviest_path(&graph, &exclusions);
        assert_eq!(consensus.bases, "TTTT");
        assert_eq!(weight, 3);
    }
}
