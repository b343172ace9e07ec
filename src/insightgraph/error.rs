//! Error type shared by every layer of the graph engine.
//!
//! Orchestrators distinguish between errors that abort a whole operation
//! (a missing anchor node, a failed search) and errors scoped to a single
//! fan-out branch. The latter never escape the branch pool; they are folded
//! into [`FanOutReport::failures`](crate::insightgraph::graph_builder::FanOutReport).
//!
//! ```
//! use insightgraph::GraphError;
//!
//! let err = GraphError::not_found("node", "1234");
//! assert_eq!(err.to_string(), "node not found: 1234");
//! ```

use std::error::Error;
use std::fmt;

/// Errors produced while building or reading the insight graph.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// The reply-wait loop hit its attempt bound without a completed run.
    ///
    /// Carries the prompt that was being answered so the failure can be
    /// attributed to a specific step.
    ServiceExhausted {
        /// Prompt text appended to the context before the runs were started.
        prompt: String,
        /// Number of runs that were attempted.
        attempts: usize,
    },

    /// The reasoning service returned a transport or protocol error.
    Service(String),

    /// A reply did not contain the structured segments a step requires.
    Parse(String),

    /// A referenced hub, node, question or image does not exist.
    NotFound {
        /// Entity kind (`"hub"`, `"node"`, `"question"`, `"image"`).
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// The search service failed.
    Search(String),

    /// The node store rejected or failed an operation.
    Store(String),

    /// A node was created with a parent that is missing or belongs to another hub.
    InvalidParent {
        /// The parent id that was supplied.
        parent_id: String,
        /// The hub the new node was meant to belong to.
        hub_id: String,
    },

    /// A node cannot be deleted while other nodes still point at it.
    HasChildren {
        /// The node whose deletion was refused.
        node_id: String,
        /// How many children reference it.
        children: usize,
    },

    /// Missing or invalid configuration (e.g. an unset API key).
    Config(String),

    /// A branch task panicked or was aborted by the runtime.
    BranchPanicked(String),
}

impl GraphError {
    /// Shorthand for [`GraphError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        GraphError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// `true` for errors that callers should surface as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::NotFound { .. })
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::ServiceExhausted { prompt, attempts } => write!(
                f,
                "Failed to receive response after {} attempts for message: {}",
                attempts, prompt
            ),
            GraphError::Service(msg) => write!(f, "Reasoning service error: {}", msg),
            GraphError::Parse(msg) => write!(f, "Parse error: {}", msg),
            GraphError::NotFound { kind, id } => write!(f, "{} not found: {}", kind, id),
            GraphError::Search(msg) => write!(f, "Search error: {}", msg),
            GraphError::Store(msg) => write!(f, "Store error: {}", msg),
            GraphError::InvalidParent { parent_id, hub_id } => write!(
                f,
                "Parent node {} does not exist in hub {}",
                parent_id, hub_id
            ),
            GraphError::HasChildren { node_id, children } => write!(
                f,
                "Node {} still has {} child node(s)",
                node_id, children
            ),
            GraphError::Config(msg) => write!(f, "Configuration error: {}", msg),
            GraphError::BranchPanicked(msg) => write!(f, "Branch task failed: {}", msg),
        }
    }
}

impl Error for GraphError {}

impl From<reqwest::Error> for GraphError {
    fn from(err: reqwest::Error) -> Self {
        GraphError::Service(err.to_string())
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Parse(err.to_string())
    }
}
