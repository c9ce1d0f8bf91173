mod graph;
mod graph_aligner;
mod graph_mapping;
mod mapping;
mod node_aligner;
mod operation;
mod path;

pub use graph::{Graph, Node, NodeId};
pub use graph_aligner::GraphAligner;
pub use graph_mapping::GraphMapping;
pub use mapping::Mapping;
pub use node_aligner::{AlignScoring, NodeAligner};
pub use operation::Operation;
pub use path::GraphPath;
