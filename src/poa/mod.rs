mod align;
mod consensus;
mod graph;
mod integrate;
mod msa;

pub use align::{align_to_graph, Alignment, PoaScoring};
pub use consensus::{all_consensuses, Consensus, DEFAULT_MAX_FRACTION};
pub use graph::{Edge, Node, PoaGraph};
pub use integrate::integrate_alignment;
pub use msa::generate_alignment_strings;
