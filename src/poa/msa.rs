use crate::poa::consensus::all_consensuses;
use crate::poa::graph::PoaGraph;
use crate::utils::Result;

const GAP: char = '-';

/// Renders the multiple sequence alignment held by the graph.
///
/// Every node is projected onto a shared column, each tracked sequence is
/// replayed along its labeled edges, and consensus paths are appended as
/// `Consensus0`, `Consensus1`, ... rows. Returns parallel lists of row names
/// and equal-length row strings.
pub fn generate_alignment_strings(
    graph: &mut PoaGraph,
    max_fraction: f64,
) -> Result<(Vec<String>, Vec<String>)> {
    let consensuses = all_consensuses(graph, max_fraction)?;

    let (column_of, num_columns) = assign_columns(graph);

    let mut names = Vec::new();
    let mut rows = Vec::new();

    for (label, _, start) in graph.sequences() {
        let mut row = vec![GAP; num_columns];
        let mut cursor = start;
        while let Some(id) = cursor {
            let node = graph.node(id);
            row[column_of[id]] = node.base as char;
            cursor = node.next_node(label);
        }
        names.push(label.to_string());
        rows.push(row.into_iter().collect());
    }

    for (round, consensus) in consensuses.iter().enumerate() {
        debug_assert_eq!(consensus.path.len(), consensus.bases.len());
        let mut row = vec![GAP; num_columns];
        for (&id, base) in consensus.path.iter().zip(consensus.bases.chars()) {
            row[column_of[id]] = base;
        }
        names.push(format!("Consensus{}", round));
        rows.push(row.into_iter().collect());
    }

    Ok((names, rows))
}

/// Column assignment: in topological order, every node takes the smallest
/// column already held by a member of its equivalence set, or a fresh column
/// if no member has one yet.
fn assign_columns(graph: &PoaGraph) -> (Vec<usize>, usize) {
    let num_nodes = graph.node_count();
    let mut column_of = vec![0usize; num_nodes];
    let mut assigned = vec![false; num_nodes];
    let mut next_column = 0;

    for &id in graph.topo_order() {
        let existing = graph
            .node(id)
            .aligned_to()
            .iter()
            .filter(|&&other| assigned[other])
            .map(|&other| column_of[other])
            .min();
        column_of[id] = match existing {
            Some(column) => column,
            None => {
                next_column += 1;
                next_column - 1
            }
        };
        assigned[id] = true;
    }

    (column_of, next_column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poa::align::{align_to_graph, PoaScoring};
    use crate::poa::consensus::DEFAULT_MAX_FRACTION;
    use crate::poa::integrate::integrate_alignment;
    use rand::Rng;

    fn scoring() -> PoaScoring {
        PoaScoring {
            match_scr: 4.0,
            mism_scr: -2.0,
            gapo_scr: -4.0,
            gape_scr: -2.0,
        }
    }

    fn build_msa(seqs: &[(&str, &str)]) -> (Vec<String>, Vec<String>) {
        let mut graph = PoaGraph::new();
        let (first_label, first_seq) = seqs[0];
        graph.add_chain(first_seq, first_label, true);
        for &(label, seq) in &seqs[1..] {
            let alignment = align_to_graph(&mut graph, &scoring(), seq, label).unwrap();
            integrate_alignment(&mut graph, &alignment).unwrap();
        }
        generate_alignment_strings(&mut graph, DEFAULT_MAX_FRACTION).unwrap()
    }

    #[test]
    fn deletion_renders_as_gap() {
        let (names, rows) = build_msa(&[("base", "ACGT"), ("new", "ACT")]);

        assert_eq!(names, vec!["base", "new", "Consensus0"]);
        assert_eq!(rows, vec!["ACGT", "AC-T", "ACGT"]);
    }

    #[test]
    fn mismatch_shares_one_column() {
        let (names, rows) = build_msa(&[("s1", "ACGT"), ("s2", "AGGT")]);

        assert_eq!(names, vec!["s1", "s2", "Consensus0"]);
        assert_eq!(rows[0], "ACGT");
        assert_eq!(rows[1], "AGGT");
        assert_eq!(rows[2], "AGGT");
    }

    #[test]
    fn detached_chains_occupy_disjoint_columns() {
        let (names, rows) = build_msa(&[("a", "AAAA"), ("t", "TTTT")]);

        assert_eq!(
            names,
            vec!["a", "t", "Consensus0", "Consensus1"]
        );
        assert_eq!(rows[0], "----AAAA");
        assert_eq!(rows[1], "TTTT----");
        assert_eq!(rows[2], "----AAAA");
        assert_eq!(rows[3], "TTTT----");
    }

    #[test]
    fn protein_rows_round_trip_their_inputs() {
        let seq1 = "PKMIVRPQKNETV";
        let seq2 = "THKMLVRNETIM";
        let (names, rows) = build_msa(&[("seq1", seq1), ("seq2", seq2)]);

        assert_eq!(names.len(), 3);
        assert_eq!(names[2], "Consensus0");
        let width = rows[0].len();
        assert!(rows.iter().all(|row| row.len() == width));
        assert_eq!(rows[0].replace('-', ""), seq1);
        assert_eq!(rows[1].replace('-', ""), seq2);
        assert!(!rows[2].replace('-', "").is_empty());
    }

    #[test]
    fn empty_sequence_renders_as_all_gaps() {
        let mut graph = PoaGraph::new();
        graph.add_chain("ACGT", "base", true);
        graph.add_chain("", "empty", true);

        let (names, rows) =
            generate_alignment_strings(&mut graph, DEFAULT_MAX_FRACTION).unwrap();
        assert_eq!(names, vec!["base", "empty", "Consensus0"]);
        assert_eq!(rows[1], "----");
    }

    #[test]
    fn random_sequences_round_trip() {
        let mut rng = rand::rng();
        let bases = [b'A', b'C', b'G', b'T'];
        let mut seqs: Vec<(String, String)> = Vec::new();
        for i in 0..6 {
            let len = rng.random_range(8..20);
            let seq: String = (0..len)
                .map(|_| bases[rng.random_range(0..bases.len())] as char)
                .collect();
            seqs.push((format!("read{}", i), seq));
        }

        let borrowed: Vec<(&str, &str)> = seqs
            .iter()
            .map(|(label, seq)| (label.as_str(), seq.as_str()))
            .collect();
        let (names, rows) = build_msa(&borrowed);

        let width = rows[0].len();
        for (i, (label, seq)) in seqs.iter().enumerate() {
            assert_eq!(&names[i], label);
            assert_eq!(rows[i].len(), width);
            assert_eq!(&rows[i].replace('-', ""), seq, "row for {} mangled", label);
        }
    }
}
