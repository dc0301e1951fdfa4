//! C6 (source resolution), C7 (dependency graph builder), and C8
//! (round-based scheduler): turning user-supplied Feature identifiers
//! into a deterministic install order.

mod graph;
mod scheduler;
mod source;

pub use graph::{build_graph, BuildResult, GraphNode, NodeId, NodeKind};
pub use scheduler::schedule;
pub use source::{FeatureResolver, Resolver};

pub use devcontainer_features_common::feature_set::FeatureSet;
pub use devcontainer_features_common::identifier::{parse_identifier, SourceDescriptor};
pub use devcontainer_features_common::option_value::OptionsMap;
pub use devcontainer_features_common::{Error, Result};
