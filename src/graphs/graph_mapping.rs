use super::{
    graph::{Graph, NodeId},
    mapping::Mapping,
    operation::Operation,
    path::GraphPath,
};
use crate::utils::{Error, Result};
use std::sync::Arc;

/// A graph path paired with one mapping per node visit, in visit order.
/// Concatenating the per-visit query windows reproduces the original query.
#[derive(Debug, Clone)]
pub struct GraphMapping {
    path: GraphPath,
    mappings: Vec<Mapping>,
}

impl GraphMapping {
    pub fn new(path: GraphPath, mappings: Vec<Mapping>) -> Result<Self> {
        if path.num_visits() != mappings.len() {
            return Err(Error::Internal(format!(
                "Path visits {} nodes but {} mappings were supplied",
                path.num_visits(),
                mappings.len()
            )));
        }
        Ok(GraphMapping { path, mappings })
    }

    /// Decodes a graph CIGAR such as `0[4M]1[2M1I3M]2[5M]` against the graph
    /// and the query it aligns.
    pub fn decode(
        graph: Arc<Graph>,
        first_node_start: usize,
        graph_cigar: &str,
        query: &str,
    ) -> Result<Self> {
        let node_cigars = split_graph_cigar(graph_cigar)?;
        if node_cigars.is_empty() {
            return Err(Error::Parse(format!(
                "{} is a malformed graph CIGAR",
                graph_cigar
            )));
        }

        let mut node_ids = Vec::new();
        let mut mappings: Vec<Mapping> = Vec::new();
        let mut query_pos = 0;

        for node_cigar in &node_cigars {
            let (node_id, cigar) = split_node_cigar(node_cigar)?;
            if node_id as usize >= graph.num_nodes() {
                return Err(Error::Parse(format!(
                    "{} references unknown node {}",
                    node_cigar, node_id
                )));
            }

            let reference_start = if mappings.is_empty() { first_node_start } else { 0 };
            let mapping = Mapping::from_cigar(
                reference_start,
                cigar,
                &query[query_pos..],
                graph.node_seq(node_id),
            )?;
            query_pos += mapping.query_span();
            node_ids.push(node_id);
            mappings.push(mapping);
        }

        if query_pos != query.len() {
            return Err(Error::Parse(format!(
                "Graph CIGAR {} consumes {} query bases out of {}",
                graph_cigar,
                query_pos,
                query.len()
            )));
        }

        let last = mappings.last().unwrap();
        let last_node_end = (last.reference_start() + last.reference_span()).saturating_sub(1);
        let path = GraphPath::new(graph, node_ids, first_node_start, last_node_end)?;

        GraphMapping::new(path, mappings)
    }

    /// Renders the graph CIGAR wire form, `<node_id>[<ops>]` concatenated.
    pub fn graph_cigar(&self) -> String {
        self.path
            .node_ids()
            .iter()
            .zip(&self.mappings)
            .map(|(node_id, mapping)| format!("{}[{}]", node_id, mapping.cigar()))
            .collect()
    }

    /// Renders a three-line alignment: query, match pattern, reference.
    /// Only match and mismatch bases are shown; node boundaries appear as a
    /// single `-` in all three lines and `padding` spaces precede the first
    /// node. The match pattern uses `|` for matches and a space otherwise.
    pub fn render(&self, padding: usize) -> String {
        let mut query_line = " ".repeat(padding);
        let mut pattern_line = " ".repeat(padding);
        let mut reference_line = " ".repeat(padding);

        for (index, mapping) in self.mappings.iter().enumerate() {
            if index > 0 {
                query_line.push('-');
                pattern_line.push('-');
                reference_line.push('-');
            }
            for op in mapping.operations() {
                match op {
                    Operation::Match(seq) => {
                        query_line.push_str(seq);
                        pattern_line.push_str(&"|".repeat(seq.len()));
                        reference_line.push_str(seq);
                    }
                    Operation::Mismatch { query, reference } => {
                        query_line.push_str(query);
                        pattern_line.push_str(&" ".repeat(query.len()));
                        reference_line.push_str(reference);
                    }
                    _ => {}
                }
            }
        }

        format!("{}\n{}\n{}", query_line, pattern_line, reference_line)
    }

    pub fn path(&self) -> &GraphPath {
        &self.path
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn visits(&self) -> impl Iterator<Item = (NodeId, &Mapping)> {
        self.path.node_ids().iter().copied().zip(self.mappings.iter())
    }

    /// The full query this mapping aligns, reassembled from the per-visit
    /// windows.
    pub fn query(&self) -> String {
        self.mappings.iter().map(|m| m.query()).collect()
    }

    /// Query bases consumed by match or mismatch operations on `node_id`
    /// across all its visits.
    pub fn aligned_bases_on(&self, node_id: NodeId) -> usize {
        self.visits()
            .filter(|(id, _)| *id == node_id)
            .map(|(_, mapping)| mapping.num_aligned_bases())
            .sum()
    }

    /// Visits of `node_id` in which at least one query base is consumed by a
    /// match or mismatch; insertion-only visits do not qualify.
    pub fn num_traversals(&self, node_id: NodeId) -> usize {
        self.visits()
            .filter(|(id, mapping)| *id == node_id && mapping.num_aligned_bases() > 0)
            .count()
    }

    pub fn touches(&self, node_id: NodeId) -> bool {
        self.path.node_ids().contains(&node_id)
    }

    pub fn num_matches(&self) -> usize {
        self.mappings.iter().map(|m| m.num_matches()).sum()
    }

    pub fn num_aligned_bases(&self) -> usize {
        self.mappings.iter().map(|m| m.num_aligned_bases()).sum()
    }

    pub fn num_clipped(&self) -> usize {
        self.mappings.iter().map(|m| m.num_clipped()).sum()
    }
}

fn split_graph_cigar(graph_cigar: &str) -> Result<Vec<&str>> {
    let mut node_cigars = Vec::new();
    let mut start = 0;
    for (index, c) in graph_cigar.char_indices() {
        if c == ']' {
            node_cigars.push(&graph_cigar[start..=index]);
            start = index + 1;
        }
    }
    if start != graph_cigar.len() {
        return Err(Error::Parse(format!(
            "{} is a malformed graph CIGAR",
            &graph_cigar[start..]
        )));
    }
    Ok(node_cigars)
}

fn split_node_cigar(node_cigar: &str) -> Result<(NodeId, &str)> {
    for (index, c) in node_cigar.char_indices() {
        if c == '[' {
            if index == 0 {
                return Err(Error::Parse(format!(
                    "{} is a malformed node CIGAR",
                    node_cigar
                )));
            }
            let node_id: NodeId = node_cigar[..index].parse().map_err(|_| {
                Error::Parse(format!("{} is a malformed node CIGAR", node_cigar))
            })?;
            let cigar = &node_cigar[index + 1..node_cigar.len() - 1];
            return Ok((node_id, cigar));
        }
        if !c.is_ascii_digit() {
            return Err(Error::Parse(format!(
                "{} is a malformed node CIGAR",
                node_cigar
            )));
        }
    }
    Err(Error::Parse(format!(
        "{} is a malformed node CIGAR",
        node_cigar
    )))
}
