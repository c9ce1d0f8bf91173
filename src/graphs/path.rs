use super::graph::{Graph, NodeId};
use crate::utils::{Error, Result};
use std::sync::Arc;

/// A walk through the graph: an ordered list of node ids (consecutive
/// repeats of the same id traverse the self-edge), a start offset on the
/// first node, and an inclusive end offset on the last node.
#[derive(Debug, Clone)]
pub struct GraphPath {
    graph: Arc<Graph>,
    node_ids: Vec<NodeId>,
    start_offset: usize,
    end_offset: usize,
}

impl GraphPath {
    pub fn new(
        graph: Arc<Graph>,
        node_ids: Vec<NodeId>,
        start_offset: usize,
        end_offset: usize,
    ) -> Result<Self> {
        if node_ids.is_empty() {
            return Err(Error::Config("Path must visit at least one node".to_string()));
        }

        for &id in &node_ids {
            if id as usize >= graph.num_nodes() {
                return Err(Error::Config(format!("Path references unknown node {}", id)));
            }
        }

        for pair in node_ids.windows(2) {
            if !graph.has_edge(pair[0], pair[1]) {
                return Err(Error::Config(format!(
                    "Path uses nonexistent edge ({}, {})",
                    pair[0], pair[1]
                )));
            }
        }

        let first = node_ids[0];
        let last = *node_ids.last().unwrap();
        if start_offset >= graph.node_len(first) {
            return Err(Error::Config(format!(
                "Path start offset {} is out of bounds on node {}",
                start_offset, first
            )));
        }
        if end_offset >= graph.node_len(last) {
            return Err(Error::Config(format!(
                "Path end offset {} is out of bounds on node {}",
                end_offset, last
            )));
        }
        if node_ids.len() == 1 && start_offset > end_offset {
            return Err(Error::Config(format!(
                "Single-node path has start offset {} past end offset {}",
                start_offset, end_offset
            )));
        }

        Ok(GraphPath {
            graph,
            node_ids,
            start_offset,
            end_offset,
        })
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    pub fn num_visits(&self) -> usize {
        self.node_ids.len()
    }

    pub fn num_visits_of(&self, node_id: NodeId) -> usize {
        self.node_ids.iter().filter(|&&id| id == node_id).count()
    }

    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    pub fn end_offset(&self) -> usize {
        self.end_offset
    }

    /// The nucleotide sequence spelled by the path.
    pub fn seq(&self) -> String {
        let mut seq = String::new();
        let last_index = self.node_ids.len() - 1;
        for (index, &id) in self.node_ids.iter().enumerate() {
            let node_seq = self.graph.node_seq(id);
            let from = if index == 0 { self.start_offset } else { 0 };
            let to = if index == last_index {
                self.end_offset + 1
            } else {
                node_seq.len()
            };
            seq.push_str(&node_seq[from..to]);
        }
        seq
    }
}
