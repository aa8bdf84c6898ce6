use crate::poa::align::Alignment;
use crate::poa::graph::PoaGraph;
use crate::utils::Result;

/// Merges an aligned sequence into the graph.
///
/// Matched nodes are reused when the base agrees; a mismatch reuses an
/// equivalence-set member with the right base or founds a new member; pure
/// insertions get fresh nodes. Unaligned prefixes and suffixes are attached
/// as plain chains. The graph is re-sorted and the order verified before the
/// sequence is recorded — a verification failure means the integration broke
/// acyclicity and the run must stop.
pub fn integrate_alignment(graph: &mut PoaGraph, alignment: &Alignment) -> Result<()> {
    let seq = alignment.sequence.as_bytes();
    let label = &alignment.label;

    let valid_idxs: Vec<usize> = alignment.seq_idxs.iter().copied().flatten().collect();
    if valid_idxs.is_empty() {
        // nothing aligned: the whole sequence enters as a detached chain
        graph.add_chain(&alignment.sequence, label, true);
        graph.ensure_sorted()?;
        graph.verify_sort()?;
        return Ok(());
    }

    let start_seq_idx = valid_idxs[0];
    let end_seq_idx = *valid_idxs.last().unwrap();

    let mut first_id = None;
    let mut head_id = None;
    let mut tail_id = None;

    if start_seq_idx > 0 {
        let (first, last) = graph.add_chain(&alignment.sequence[..start_seq_idx], label, false);
        first_id = first;
        head_id = last;
    }
    if end_seq_idx + 1 < seq.len() {
        let (first, _) = graph.add_chain(&alignment.sequence[end_seq_idx + 1..], label, false);
        tail_id = first;
    }

    for (step, &seq_idx) in alignment.seq_idxs.iter().enumerate() {
        let Some(seq_idx) = seq_idx else {
            continue;
        };
        let base = seq[seq_idx];

        let node_id = match alignment.matches[step] {
            None => graph.add_node(base),
            Some(match_id) if graph.node(match_id).base == base => match_id,
            Some(match_id) => {
                let equivalent = graph
                    .node(match_id)
                    .aligned_to()
                    .iter()
                    .copied()
                    .find(|&other| graph.node(other).base == base);
                match equivalent {
                    Some(other) => other,
                    None => {
                        let new_id = graph.add_node(base);
                        graph.merge_aligned(new_id, match_id);
                        new_id
                    }
                }
            }
        };

        graph.add_edge(head_id, Some(node_id), label);
        head_id = Some(node_id);
        if first_id.is_none() {
            first_id = head_id;
        }
    }
    graph.add_edge(head_id, tail_id, label);

    graph.ensure_sorted()?;
    graph.verify_sort()?;
    graph.record_sequence(&alignment.sequence, label, first_id);
    Ok(())
}
