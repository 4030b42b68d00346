//! The source-generation seam.
//!
//! Turning a graph into host source text is done by an external collaborator
//! implementing [`SourceGenerator`]. The runtime only records that
//! generation succeeded, the compiled type's name, and the hash of the graph
//! the text was produced from.

use serde::{Deserialize, Serialize};

use nodegraph_core::graph::Graph;

/// Produces host source for a graph.
pub trait SourceGenerator: Send + Sync {
    /// Name of the type the generated source defines.
    fn type_name(&self, graph: &Graph) -> String {
        graph.qualified_name()
    }

    /// Source text for `graph`, or a message describing why it failed.
    fn generate(&self, graph: &Graph) -> Result<String, String>;
}

/// Result of a successful generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSource {
    pub type_name: String,
    pub source: String,
    /// Hash of the graph the source was generated from; a compiled artifact
    /// built from this source should carry the same stamp.
    pub graph_hash: [u8; 32],
}

impl GeneratedSource {
    pub fn hash_hex(&self) -> String {
        blake3::Hash::from(self.graph_hash).to_hex().to_string()
    }
}
