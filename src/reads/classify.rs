//! Classification of aligned reads against the locus's repeat node.

use crate::graphs::{GraphMapping, NodeId};

/// Read category with the observed repeat unit count it contributes.
/// Exactly one category applies to a classified read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadClass {
    /// Alignment touches both flanks; the observation is the number of
    /// repeat node traversals (possibly zero for a contraction).
    Spanning(usize),
    /// Alignment touches one flank and consumes repeat bases.
    Flanking(usize),
    /// Alignment lies wholly inside the repeat; the observation saturates
    /// at the most units a read can contain.
    InRepeat(usize),
    Irrelevant,
}

/// The locus nodes the classifier distinguishes: the repeat node and the
/// linear nodes on either side of it.
#[derive(Debug, Clone)]
pub struct LocusNodes {
    pub repeat_node: NodeId,
    pub left_nodes: Vec<NodeId>,
    pub right_nodes: Vec<NodeId>,
}

/// Classifies one read's canonical mapping. A flank or the repeat node only
/// counts as covered when at least one of its bases is consumed by a match
/// or mismatch; insertions and clips do not qualify. In-repeat reads
/// additionally require the mate-pair evidence to place the fragment near
/// the locus.
pub fn classify_read(
    mapping: &GraphMapping,
    nodes: &LocusNodes,
    read_len: usize,
    unit_len: usize,
    mate_near_locus: bool,
    min_match_frac: f64,
) -> ReadClass {
    let aligned = mapping.num_aligned_bases();
    if aligned == 0 {
        return ReadClass::Irrelevant;
    }
    if (mapping.num_matches() as f64) < min_match_frac * aligned as f64 {
        return ReadClass::Irrelevant;
    }

    let covered = |ids: &[NodeId]| -> usize {
        ids.iter().map(|&id| mapping.aligned_bases_on(id)).sum()
    };
    let left = covered(&nodes.left_nodes);
    let right = covered(&nodes.right_nodes);
    let repeat = mapping.aligned_bases_on(nodes.repeat_node);
    let traversals = mapping.num_traversals(nodes.repeat_node);

    if left > 0 && right > 0 {
        return ReadClass::Spanning(traversals);
    }
    if (left > 0) != (right > 0) && repeat > 0 {
        return ReadClass::Flanking(traversals);
    }
    if left == 0 && right == 0 && repeat > 0 {
        if mate_near_locus {
            return ReadClass::InRepeat(read_len / unit_len);
        }
        return ReadClass::Irrelevant;
    }

    ReadClass::Irrelevant
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::{AlignScoring, Graph, GraphAligner, GraphMapping, Node};
    use std::sync::Arc;

    fn cag_graph() -> Arc<Graph> {
        let nodes = vec![
            Node::new("TTAACC").unwrap(),
            Node::new("CAG").unwrap(),
            Node::new("GGTTAA").unwrap(),
        ];
        Arc::new(Graph::new(nodes, &[(0, 1), (1, 1), (1, 2), (0, 2)]).unwrap())
    }

    fn locus_nodes() -> LocusNodes {
        LocusNodes {
            repeat_node: 1,
            left_nodes: vec![0],
            right_nodes: vec![2],
        }
    }

    fn map(query: &str) -> GraphMapping {
        let aligner = GraphAligner::new(cag_graph(), AlignScoring::default());
        aligner.align(query).unwrap().unwrap()
    }

    #[test]
    fn read_across_both_flanks_is_spanning() {
        let query = "ACCCAGCAGGGT";
        let class = classify_read(&map(query), &locus_nodes(), query.len(), 3, false, 0.7);
        assert_eq!(class, ReadClass::Spanning(2));
    }

    #[test]
    fn contraction_read_is_spanning_with_zero_units() {
        let query = "ACCGGT";
        let class = classify_read(&map(query), &locus_nodes(), query.len(), 3, false, 0.7);
        assert_eq!(class, ReadClass::Spanning(0));
    }

    #[test]
    fn read_entering_repeat_from_one_side_is_flanking() {
        let query = "CCCAGCAGCA";
        let class = classify_read(&map(query), &locus_nodes(), query.len(), 3, false, 0.7);
        assert_eq!(class, ReadClass::Flanking(3));
    }

    #[test]
    fn pure_repeat_read_with_consistent_mate_is_in_repeat() {
        let query = "CAGCAGCAGCAG";
        let class = classify_read(&map(query), &locus_nodes(), query.len(), 3, true, 0.7);
        assert_eq!(class, ReadClass::InRepeat(4));
    }

    #[test]
    fn pure_repeat_read_without_mate_evidence_is_irrelevant() {
        let query = "CAGCAGCAGCAG";
        let class = classify_read(&map(query), &locus_nodes(), query.len(), 3, false, 0.7);
        assert_eq!(class, ReadClass::Irrelevant);
    }

    #[test]
    fn in_repeat_observation_saturates_at_read_capacity() {
        let query = "CAGCAGCAGCA";
        // 11 bases over a 3-base unit support at most 3 whole units.
        let class = classify_read(&map(query), &locus_nodes(), query.len(), 3, true, 0.7);
        assert_eq!(class, ReadClass::InRepeat(3));
    }

    #[test]
    fn flank_only_read_is_irrelevant() {
        let query = "TTAACC";
        let class = classify_read(&map(query), &locus_nodes(), query.len(), 3, false, 0.7);
        assert_eq!(class, ReadClass::Irrelevant);
    }

    #[test]
    fn insertion_only_repeat_contact_does_not_make_a_read_flanking() {
        // Hand-built mapping: the repeat visit consumes no repeat bases,
        // only an inserted base, so the read does not qualify as flanking.
        let graph = cag_graph();
        let mapping = GraphMapping::decode(graph, 0, "0[6M]1[1I]", "TTAACCT").unwrap();
        let class = classify_read(&mapping, &locus_nodes(), 7, 3, false, 0.7);
        assert_eq!(class, ReadClass::Irrelevant);
    }

    #[test]
    fn low_identity_alignment_is_irrelevant() {
        // One mismatch in twelve aligned bases fails a 0.95 identity gate.
        let query = "ACCCAGCTGGGT";
        let class = classify_read(&map(query), &locus_nodes(), query.len(), 3, false, 0.95);
        assert_eq!(class, ReadClass::Irrelevant);
    }
}
