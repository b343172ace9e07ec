//! Entities of the insight graph.
//!
//! ```text
//! Hub ──owns──▶ Node ──owns──▶ Question*
//!                 │  └──owns──▶ ImageRef*
//!                 └─ parent_id ─▶ Node (same hub, non-owning)
//! ```
//!
//! A node is immutable once created; every field is populated before the
//! store makes it visible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::insightgraph::reasoning::{ContextId, IdentityId};

pub type HubId = Uuid;
pub type NodeId = Uuid;
pub type QuestionId = Uuid;
pub type ImageId = Uuid;

/// Which orchestrator produced a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    /// Initial fan-out from the hub's root prompt.
    One,
    /// Single continuation of an existing node.
    OneHalf,
    /// Search-augmented expansion of an existing node.
    Two,
}

impl Level {
    pub fn label(&self) -> &'static str {
        match self {
            Level::One => "L1",
            Level::OneHalf => "L1.5",
            Level::Two => "L2",
        }
    }
}

/// A dataset-scoped owner of one reasoning identity and its nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hub {
    pub id: HubId,
    pub file_name: String,
    pub identity_id: IdentityId,
    pub created_at: DateTime<Utc>,
}

/// Input to [`NodeStore::create_hub`](crate::insightgraph::store::NodeStore::create_hub).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHub {
    pub file_name: String,
    pub identity_id: IdentityId,
}

/// A suggested follow-up prompt attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub node_id: NodeId,
    pub content: String,
}

/// A stored binary artifact, with its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub url: String,
    pub data: Vec<u8>,
}

impl Image {
    pub fn to_ref(&self) -> ImageRef {
        ImageRef {
            id: self.id,
            url: self.url.clone(),
        }
    }
}

/// How a node links to an image: id and serving URL, no bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: ImageId,
    pub url: String,
}

/// One persisted finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub hub_id: HubId,
    pub parent_id: Option<NodeId>,
    pub level: Level,
    /// Prompt text that produced the finding.
    pub prompt: String,
    /// Findings text.
    pub text: String,
    pub title: String,
    /// Context a follow-up on this node continues.
    pub context_id: ContextId,
    pub questions: Vec<Question>,
    pub images: Vec<ImageRef>,
    pub created_at: DateTime<Utc>,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Everything needed to create a node in one atomic store call.
///
/// `image_ids` must name images already committed through
/// [`NodeStore::create_image`](crate::insightgraph::store::NodeStore::create_image);
/// `questions` are plain texts, the store assigns their ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub hub_id: HubId,
    pub parent_id: Option<NodeId>,
    pub level: Level,
    pub prompt: String,
    pub text: String,
    pub title: String,
    pub context_id: ContextId,
    pub questions: Vec<String>,
    pub image_ids: Vec<ImageId>,
}
