//! Graph-construction event system.
//!
//! Provides a callback-based observability layer for the orchestrators.
//! Implement [`EventHandler`] to receive notifications about fan-out
//! progress, per-branch outcomes and persisted nodes:
//!
//! ```text
//! FanOutStarted { branches: 3 }
//!   ├─ BranchStarted { branch: 0 } ─ NodePersisted ─ BranchCompleted { branch: 0 }
//!   ├─ BranchStarted { branch: 1 } ─ BranchFailed { branch: 1 }
//!   └─ BranchStarted { branch: 2 } ─ BranchSuppressed { branch: 2 }
//! FanOutCompleted { created: 1, suppressed: 1, failed: 1 }
//! ```
//!
//! Branches run concurrently, so events from different branches interleave
//! in any order. Level-1.5 continuations emit only `NodePersisted`.
//!
//! # Example
//!
//! ```rust,no_run
//! use insightgraph::event::{EventHandler, GraphEvent};
//! use async_trait::async_trait;
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl EventHandler for Printer {
//!     async fn on_graph_event(&self, event: &GraphEvent) {
//!         if let GraphEvent::BranchFailed { level, branch, error, .. } = event {
//!             eprintln!("{} branch {} failed: {}", level.label(), branch, error);
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::insightgraph::model::{HubId, Level, NodeId};

/// Events emitted while the graph is being built.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// A fan-out is about to dispatch its branches.
    FanOutStarted {
        hub_id: HubId,
        level: Level,
        /// Anchor node for level-2 expansions, `None` for level-1.
        anchor_id: Option<NodeId>,
        branches: usize,
    },

    /// A branch began executing on a worker.
    BranchStarted {
        hub_id: HubId,
        level: Level,
        /// Zero-based position of the branch in its fan-out.
        branch: usize,
    },

    /// A branch persisted its node.
    BranchCompleted {
        hub_id: HubId,
        level: Level,
        branch: usize,
        node_id: NodeId,
    },

    /// A branch finished but the surprise gate dropped its finding.
    BranchSuppressed {
        hub_id: HubId,
        level: Level,
        branch: usize,
        score: u8,
    },

    /// A branch failed and produced no node. Siblings are unaffected.
    BranchFailed {
        hub_id: HubId,
        level: Level,
        branch: usize,
        error: String,
    },

    /// Every branch of a fan-out has finished.
    FanOutCompleted {
        hub_id: HubId,
        level: Level,
        created: usize,
        suppressed: usize,
        failed: usize,
    },

    /// A node was committed to the store.
    NodePersisted {
        hub_id: HubId,
        level: Level,
        node_id: NodeId,
        parent_id: Option<NodeId>,
    },
}

/// Receiver for [`GraphEvent`]s.
///
/// The default implementation is a no-op. The handler is shared across
/// branch tasks as `Arc<dyn EventHandler>`, so any internal state needs
/// synchronisation.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_graph_event(&self, _event: &GraphEvent) {}
}
