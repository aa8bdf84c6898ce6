use crate::utils::Result;
use itertools::izip;
use std::collections::BTreeMap;

/// Directed edge between two residue nodes. Carries the label of every
/// sequence whose path traverses it; at most one edge exists per ordered
/// node pair.
#[derive(Debug, Clone, Default)]
pub struct Edge {
    labels: Vec<String>,
}

impl Edge {
    pub fn add_label(&mut self, label: &str) {
        if !self.has_label(label) {
            self.labels.push(label.to_string());
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// A single residue in the partial-order graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: usize,
    pub base: u8,
    in_edges: BTreeMap<usize, Edge>,
    out_edges: BTreeMap<usize, Edge>,
    aligned_to: Vec<usize>,
}

impl Node {
    fn new(id: usize, base: u8) -> Self {
        Node {
            id,
            base,
            in_edges: BTreeMap::new(),
            out_edges: BTreeMap::new(),
            aligned_to: Vec::new(),
        }
    }

    pub fn in_degree(&self) -> usize {
        self.in_edges.len()
    }

    pub fn out_degree(&self) -> usize {
        self.out_edges.len()
    }

    pub fn predecessors(&self) -> impl Iterator<Item = usize> + '_ {
        self.in_edges.keys().copied()
    }

    pub fn successors(&self) -> impl Iterator<Item = usize> + '_ {
        self.out_edges.keys().copied()
    }

    pub fn out_edges(&self) -> impl Iterator<Item = (usize, &Edge)> + '_ {
        self.out_edges.iter().map(|(&id, edge)| (id, edge))
    }

    pub fn out_edge(&self, to: usize) -> Option<&Edge> {
        self.out_edges.get(&to)
    }

    /// Ids of the nodes occupying the same alignment column as this one.
    pub fn aligned_to(&self) -> &[usize] {
        &self.aligned_to
    }

    /// Successor of this node on the path of the sequence `label`, if any.
    /// Neighbors are probed in ascending id order.
    pub fn next_node(&self, label: &str) -> Option<usize> {
        self.out_edges
            .iter()
            .find(|(_, edge)| edge.has_label(label))
            .map(|(&id, _)| id)
    }

    /// Labels of every sequence touching this node, via either an incoming
    /// or an outgoing edge.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for edge in self.in_edges.values().chain(self.out_edges.values()) {
            for label in edge.labels() {
                if !labels.iter().any(|l| l == label) {
                    labels.push(label.clone());
                }
            }
        }
        labels
    }
}

/// A partial-order graph accumulating a multiple sequence alignment. Nodes
/// live in an arena where `node.id` equals its index; nodes and edges are
/// never deleted.
#[derive(Debug, Clone, Default)]
pub struct PoaGraph {
    nodes: Vec<Node>,
    node_list: Vec<usize>,
    need_sort: bool,
    num_edges: usize,
    labels: Vec<String>,
    seqs: Vec<String>,
    starts: Vec<Option<usize>>,
}

impl PoaGraph {
    pub fn new() -> Self {
        PoaGraph::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.num_edges
    }

    /// Number of sequences tracked for path replay and consensus exclusion.
    pub fn sequence_count(&self) -> usize {
        self.labels.len()
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    /// Node ids in topological order. Only valid while the graph is sorted.
    pub fn topo_order(&self) -> &[usize] {
        &self.node_list
    }

    pub fn is_sorted(&self) -> bool {
        !self.need_sort
    }

    /// Tracked sequences as `(label, residues, start node)` in integration
    /// order.
    pub fn sequences(&self) -> impl Iterator<Item = (&str, &str, Option<usize>)> {
        izip!(&self.labels, &self.seqs, &self.starts)
            .map(|(label, seq, start)| (label.as_str(), seq.as_str(), *start))
    }

    pub fn add_node(&mut self, base: u8) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::new(id, base));
        self.node_list.push(id);
        self.need_sort = true;
        id
    }

    /// Connects `from` to `to`, creating the edge if absent or adding the
    /// label to the existing one. A `None` endpoint makes this a no-op, so
    /// callers can thread an optional predecessor through a chain without
    /// special-casing its head.
    pub fn add_edge(&mut self, from: Option<usize>, to: Option<usize>, label: &str) {
        let (Some(from), Some(to)) = (from, to) else {
            return;
        };
        if !self.nodes[from].out_edges.contains_key(&to) {
            self.num_edges += 1;
        }
        self.nodes[from].out_edges.entry(to).or_default().add_label(label);
        self.nodes[to].in_edges.entry(from).or_default().add_label(label);
        self.need_sort = true;
    }

    /// Adds `sequence` as a fresh linear chain of nodes with edges labeled
    /// `label`, returning the first and last node id (`None` for an empty
    /// sequence). With `record` set, the sequence is also tracked for path
    /// replay.
    pub fn add_chain(
        &mut self,
        sequence: &str,
        label: &str,
        record: bool,
    ) -> (Option<usize>, Option<usize>) {
        let mut first = None;
        let mut last = None;
        for &base in sequence.as_bytes() {
            let id = self.add_node(base);
            if first.is_none() {
                first = Some(id);
            }
            self.add_edge(last, Some(id), label);
            last = Some(id);
        }
        if record {
            self.record_sequence(sequence, label, first);
        }
        (first, last)
    }

    pub fn record_sequence(&mut self, sequence: &str, label: &str, start: Option<usize>) {
        self.seqs.push(sequence.to_string());
        self.labels.push(label.to_string());
        self.starts.push(start);
    }

    /// Makes `new_id` a member of `match_id`'s equivalence set: the new node
    /// is linked bidirectionally to `match_id` and to every node already
    /// aligned to it, keeping the set symmetric.
    pub fn merge_aligned(&mut self, new_id: usize, match_id: usize) {
        let mut members = self.nodes[match_id].aligned_to.clone();
        members.push(match_id);
        for &member in &members {
            self.nodes[member].aligned_to.push(new_id);
        }
        self.nodes[new_id].aligned_to = members;
    }

    /// Recomputes the topological order if the graph changed since the last
    /// sort. A cycle is a fatal inconsistency: the integrator's node reuse
    /// rules must never create one.
    pub fn ensure_sorted(&mut self) -> Result<()> {
        if !self.need_sort {
            return Ok(());
        }
        let num_nodes = self.nodes.len();
        let mut marked = vec![false; num_nodes];
        let mut on_stack = vec![false; num_nodes];
        let mut finished: Vec<usize> = Vec::with_capacity(num_nodes);

        let roots = self.node_list.clone();
        for root in roots {
            if !marked[root] {
                self.dfs_post_order(root, &mut marked, &mut on_stack, &mut finished)?;
            }
        }

        finished.reverse();
        self.node_list = finished;
        self.need_sort = false;
        Ok(())
    }

    fn dfs_post_order(
        &self,
        root: usize,
        marked: &mut [bool],
        on_stack: &mut [bool],
        finished: &mut Vec<usize>,
    ) -> Result<()> {
        struct Frame {
            node: usize,
            succs: Vec<usize>,
            next: usize,
        }

        marked[root] = true;
        on_stack[root] = true;
        let mut stack = vec![Frame {
            node: root,
            succs: self.nodes[root].successors().collect(),
            next: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            if frame.next < frame.succs.len() {
                let node = frame.node;
                let succ = frame.succs[frame.next];
                frame.next += 1;
                if on_stack[succ] {
                    return Err(format!(
                        "cycle detected in alignment graph at edge ({}) -> ({})",
                        node, succ
                    ));
                }
                if !marked[succ] {
                    marked[succ] = true;
                    on_stack[succ] = true;
                    stack.push(Frame {
                        node: succ,
                        succs: self.nodes[succ].successors().collect(),
                        next: 0,
                    });
                }
            } else {
                on_stack[frame.node] = false;
                finished.push(frame.node);
                stack.pop();
            }
        }
        Ok(())
    }

    /// Checks that the current order places every node after all of its
    /// predecessors. A violation after integration means the graph is
    /// inconsistent and the run must stop.
    pub fn verify_sort(&self) -> Result<()> {
        if self.node_list.len() != self.nodes.len() {
            return Err(format!(
                "topological order covers {} of {} nodes",
                self.node_list.len(),
                self.nodes.len()
            ));
        }
        let mut seen = vec![false; self.nodes.len()];
        for &id in &self.node_list {
            for pred in self.nodes[id].predecessors() {
                if !seen[pred] {
                    return Err(format!(
                        "topological order violated: node {} placed before its predecessor {}",
                        id, pred
                    ));
                }
            }
            seen[id] = true;
        }
        Ok(())
    }

    /// Dense position of every node in the topological order and back:
    /// `id_to_index[id]` is the node's 0-based rank, `index_to_id[rank]` its
    /// id. Requires a sorted graph.
    pub fn node_index_maps(&self) -> Result<(Vec<usize>, Vec<usize>)> {
        if self.need_sort {
            return Err("node_index_maps requires a sorted graph".to_string());
        }
        let mut id_to_index = vec![0; self.nodes.len()];
        for (index, &id) in self.node_list.iter().enumerate() {
            id_to_index[id] = index;
        }
        Ok((id_to_index, self.node_list.clone()))
    }
}
