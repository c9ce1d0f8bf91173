//! Alignment of a query to paths through a locus graph.
//!
//! Self-edges are unrolled into a bounded chain of node copies, turning the
//! graph into a DAG whose nodes are processed in topological order. The
//! affine state columns of the node aligner are carried across edges, so
//! gaps continue over node boundaries and the score is optimal over every
//! admissible path. The per-node matrices double as the alignment's
//! memoisation, keyed by (node visit, node offset, query position), and are
//! dropped when the alignment completes.

use super::{
    graph::{Graph, NodeId},
    graph_mapping::GraphMapping,
    mapping::Mapping,
    node_aligner::{
        collect_operations, AlignScoring, Cell, Column, NodeAligner, NodeMatrix, State, Step,
        TieBreak, NEG_INF,
    },
    path::GraphPath,
};
use crate::utils::{Error, Result};
use std::sync::Arc;

pub struct GraphAligner {
    graph: Arc<Graph>,
    node_aligner: NodeAligner,
}

/// One copy of a base node in the unrolled DAG. Copies of a self-looping
/// node chain one into the next; the first copy inherits the base node's
/// predecessors.
struct UnrolledNode {
    base: NodeId,
    preds: Vec<usize>,
    /// Reference offset of matrix column 0 on the base node; nonzero only
    /// for a pinned-start copy.
    offset: usize,
}

struct Lattice {
    unodes: Vec<UnrolledNode>,
    matrices: Vec<NodeMatrix>,
}

#[derive(Debug, Clone, Copy)]
struct EndPoint {
    unode: usize,
    col: usize,
    row: usize,
    state: State,
    score: i32,
}

struct Trace {
    /// Steps in alignment order, each tagged with the unrolled node whose
    /// matrix produced it.
    steps: Vec<(usize, Step)>,
    /// Matrix column where the alignment starts on its first node.
    start_col: usize,
}

/// Tie-break between equal-score graph alignments: fewer clipped bases,
/// then fewer node visits, then the node aligner's end rules.
struct GraphTieBreak {
    clipped: usize,
    visits: usize,
    inner: TieBreak,
}

impl GraphTieBreak {
    fn from_trace(trace: &Trace) -> GraphTieBreak {
        let steps: Vec<Step> = trace.steps.iter().map(|(_, step)| *step).collect();
        let clipped = steps.iter().filter(|step| step.code == 'S').count();

        let mut visits = 0;
        let mut previous = None;
        for &(unode, _) in &trace.steps {
            if previous != Some(unode) {
                visits += 1;
                previous = Some(unode);
            }
        }

        GraphTieBreak {
            clipped,
            visits,
            inner: TieBreak::from_steps(&steps),
        }
    }

    fn beats(&self, other: &GraphTieBreak) -> bool {
        if self.clipped != other.clipped {
            return self.clipped < other.clipped;
        }
        if self.visits != other.visits {
            return self.visits < other.visits;
        }
        self.inner.beats(&other.inner)
    }
}

impl GraphAligner {
    pub fn new(graph: Arc<Graph>, scoring: AlignScoring) -> Self {
        GraphAligner {
            graph,
            node_aligner: NodeAligner::new(scoring),
        }
    }

    /// Max times a self-edge may be traversed for a query of this length.
    fn max_traversals(&self, node: NodeId, query_len: usize) -> usize {
        let unit_len = self.graph.node_len(node);
        query_len.div_ceil(unit_len) + 1
    }

    /// Aligns `query`, letting the alignment begin and end anywhere on the
    /// graph. Soft-clips are admitted only where the graph itself ends.
    /// Returns `None` when no placement scores above zero.
    pub fn align(&self, query: &str) -> Result<Option<GraphMapping>> {
        self.align_impl(query, None)
    }

    /// Aligns `query` with the alignment pinned to begin at `offset` on
    /// `node`.
    pub fn align_from(
        &self,
        query: &str,
        node: NodeId,
        offset: usize,
    ) -> Result<Option<GraphMapping>> {
        if node as usize >= self.graph.num_nodes() {
            return Err(Error::Internal(format!("Unknown start node {}", node)));
        }
        if offset >= self.graph.node_len(node) {
            return Err(Error::Internal(format!(
                "Start offset {} is out of bounds on node {}",
                offset, node
            )));
        }
        self.align_impl(query, Some((node, offset)))
    }

    fn align_impl(&self, query: &str, start: Option<(NodeId, usize)>) -> Result<Option<GraphMapping>> {
        if query.is_empty() {
            return Ok(None);
        }
        let query = query.as_bytes();
        let lattice = self.fill_lattice(query, start);

        let ends = self.find_ends(query.len(), &lattice);
        if ends.first().map_or(true, |end| end.score <= 0) {
            return Ok(None);
        }

        // Every end of maximal score is traced out and the winner picked by
        // the tie-break rules; with a unique optimum this is one traceback.
        let mut chosen: Option<(GraphTieBreak, Trace)> = None;
        for end in ends {
            let trace = self.traceback(query, &lattice, end)?;
            let key = GraphTieBreak::from_trace(&trace);
            if chosen.as_ref().map_or(true, |(best, _)| key.beats(best)) {
                chosen = Some((key, trace));
            }
        }

        let (_, trace) =
            chosen.ok_or_else(|| Error::Internal("Alignment has no viable end".to_string()))?;
        self.assemble(query, &lattice, trace).map(Some)
    }

    fn fill_lattice(&self, query: &[u8], start: Option<(NodeId, usize)>) -> Lattice {
        let free_start = start.is_none();
        let rows = query.len() + 1;
        let num_nodes = self.graph.num_nodes();

        let mut copies: Vec<Vec<usize>> = vec![Vec::new(); num_nodes];
        let mut unodes: Vec<UnrolledNode> = Vec::new();
        let mut matrices: Vec<NodeMatrix> = Vec::new();

        for &base in self.graph.topological_order() {
            let num_copies = if self.graph.has_self_loop(base) {
                self.max_traversals(base, query.len())
            } else {
                1
            };

            let entry_preds: Vec<usize> = self
                .graph
                .predecessors(base)
                .flat_map(|pred| copies[pred as usize].iter().copied())
                .collect();

            for copy in 0..num_copies {
                let pinned_here = copy == 0 && matches!(start, Some((node, _)) if node == base);
                let offset = match start {
                    Some((_, offset)) if pinned_here => offset,
                    _ => 0,
                };
                // Nothing precedes a pinned start.
                let preds = if copy > 0 {
                    vec![unodes.len() - 1]
                } else if pinned_here {
                    Vec::new()
                } else {
                    entry_preds.clone()
                };

                let mut entry: Column = vec![Cell::IMPOSSIBLE; rows];
                for &pred in &preds {
                    let exit = matrices[pred].columns.last().unwrap();
                    for (cell, from) in entry.iter_mut().zip(exit) {
                        cell.m = cell.m.max(from.m);
                        cell.del = cell.del.max(from.del);
                        cell.ins = cell.ins.max(from.ins);
                    }
                }

                if free_start {
                    entry[0].m = 0;
                    if preds.is_empty() {
                        // Bases before the source start can only be
                        // soft-clipped; row i marks i clipped query bases.
                        for cell in entry.iter_mut().skip(1) {
                            cell.m = cell.m.max(0);
                        }
                    }
                } else if pinned_here {
                    entry[0].m = 0;
                }

                let window = &self.graph.node_seq(base).as_bytes()[offset..];
                matrices.push(self.node_aligner.fill(query, window, entry, free_start));
                unodes.push(UnrolledNode { base, preds, offset });
                copies[base as usize].push(unodes.len() - 1);
            }
        }

        Lattice { unodes, matrices }
    }

    /// Every end achieving the maximal score, in a scan order that leaves
    /// the leftmost placement first as the final tie-break fallback.
    fn find_ends(&self, query_len: usize, lattice: &Lattice) -> Vec<EndPoint> {
        let mut candidates: Vec<EndPoint> = Vec::new();

        // Full-query ends, anywhere on the graph. Column 0 cells replicate a
        // predecessor's exit column and are skipped so ends attribute to the
        // node that produced them.
        for (u, matrix) in lattice.matrices.iter().enumerate() {
            for (j, col) in matrix.columns.iter().enumerate().skip(1) {
                let cell = col[query_len];
                for state in [State::M, State::Ins] {
                    let score = state.value(&cell);
                    if score > NEG_INF {
                        candidates.push(EndPoint { unode: u, col: j, row: query_len, state, score });
                    }
                }
            }
        }

        // Clipped ends: remaining query bases fall off the sink.
        let sink = self.graph.sink();
        for (u, unode) in lattice.unodes.iter().enumerate() {
            if unode.base != sink {
                continue;
            }
            let last = lattice.matrices[u].columns.len() - 1;
            if last == 0 {
                continue;
            }
            let col = &lattice.matrices[u].columns[last];
            for row in (1..query_len).rev() {
                for state in [State::M, State::Ins] {
                    let score = state.value(&col[row]);
                    if score > NEG_INF {
                        candidates.push(EndPoint { unode: u, col: last, row, state, score });
                    }
                }
            }
        }

        let Some(max) = candidates.iter().map(|end| end.score).max() else {
            return Vec::new();
        };
        candidates.retain(|end| end.score == max);
        candidates
    }

    fn traceback(&self, query: &[u8], lattice: &Lattice, end: EndPoint) -> Result<Trace> {
        let scoring = self.node_aligner.scoring();
        let open = scoring.gapo_scr + scoring.gape_scr;
        let extend = scoring.gape_scr;

        let mut steps: Vec<(usize, Step)> = Vec::new();
        for t in (end.row..query.len()).rev() {
            steps.push((end.unode, Step::clip(query[t])));
        }

        let mut u = end.unode;
        let mut j = end.col;
        let mut i = end.row;
        let mut state = end.state;

        let start_col = loop {
            let cell = lattice.matrices[u].columns[j][i];
            let value = state.value(&cell);
            if value <= NEG_INF {
                return Err(Error::Internal("Traceback entered an unreachable cell".to_string()));
            }

            if matches!(state, State::M) && value == 0 {
                if i == 0 {
                    break j;
                }
                if j == 0 && lattice.unodes[u].preds.is_empty() {
                    // Lead clip at the source start.
                    for t in (0..i).rev() {
                        steps.push((u, Step::clip(query[t])));
                    }
                    break 0;
                }
            }

            if j == 0 {
                let pred = lattice.unodes[u]
                    .preds
                    .iter()
                    .copied()
                    .find(|&p| state.value(&lattice.matrices[p].columns.last().unwrap()[i]) == value)
                    .ok_or_else(|| {
                        Error::Internal("Traceback lost the trail at a node boundary".to_string())
                    })?;
                u = pred;
                j = lattice.matrices[u].columns.len() - 1;
                continue;
            }

            let unode = &lattice.unodes[u];
            let r = self.graph.node_seq(unode.base).as_bytes()[unode.offset + j - 1];

            match state {
                State::M => {
                    let q = query[i - 1];
                    steps.push((u, Step::diagonal(q, r)));
                    let diag = lattice.matrices[u].columns[j - 1][i - 1];
                    let target = value - self.node_aligner.substitution_score(q, r);
                    state = if diag.m == target {
                        State::M
                    } else if diag.del == target {
                        State::Del
                    } else if diag.ins == target {
                        State::Ins
                    } else {
                        return Err(Error::Internal("Traceback lost the match chain".to_string()));
                    };
                    i -= 1;
                    j -= 1;
                }
                State::Del => {
                    steps.push((u, Step::deletion(r)));
                    let prev = lattice.matrices[u].columns[j - 1][i];
                    state = if prev.m - open == value {
                        State::M
                    } else if prev.del - extend == value {
                        State::Del
                    } else if prev.ins - open == value {
                        State::Ins
                    } else {
                        return Err(Error::Internal("Traceback lost the deletion chain".to_string()));
                    };
                    j -= 1;
                }
                State::Ins => {
                    steps.push((u, Step::insertion(query[i - 1])));
                    let below = lattice.matrices[u].columns[j][i - 1];
                    state = if below.m - open == value {
                        State::M
                    } else if below.ins - extend == value {
                        State::Ins
                    } else if below.del - open == value {
                        State::Del
                    } else {
                        return Err(Error::Internal("Traceback lost the insertion chain".to_string()));
                    };
                    i -= 1;
                }
            }
        };

        steps.reverse();
        Ok(Trace { steps, start_col })
    }

    fn assemble(&self, query: &[u8], lattice: &Lattice, trace: Trace) -> Result<GraphMapping> {
        if trace.steps.is_empty() {
            return Err(Error::Internal("Empty alignment cannot be assembled".to_string()));
        }

        let mut node_ids = Vec::new();
        let mut mappings = Vec::new();

        let mut index = 0;
        while index < trace.steps.len() {
            let unode = trace.steps[index].0;
            let mut run = Vec::new();
            while index < trace.steps.len() && trace.steps[index].0 == unode {
                run.push(trace.steps[index].1);
                index += 1;
            }

            let reference_start = if mappings.is_empty() {
                lattice.unodes[unode].offset + trace.start_col
            } else {
                0
            };
            node_ids.push(lattice.unodes[unode].base);
            mappings.push(Mapping::new(reference_start, collect_operations(&run)));
        }

        let last = mappings.last().unwrap();
        let end_offset = (last.reference_start() + last.reference_span()).saturating_sub(1);
        let start_offset = mappings[0].reference_start();

        let path = GraphPath::new(self.graph.clone(), node_ids, start_offset, end_offset)?;
        let mapping = GraphMapping::new(path, mappings)?;

        debug_assert_eq!(mapping.query().as_bytes(), query);
        Ok(mapping)
    }
}
