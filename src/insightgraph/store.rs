//! Node graph persistence seam and an in-memory implementation.
//!
//! The engine does not own persistence; it requires two guarantees from any
//! [`NodeStore`]:
//!
//! 1. **Atomic node creation.** A node becomes visible together with its
//!    questions and image links, or not at all.
//! 2. **Images before links.** An image is committed (and has its id and URL)
//!    before a node references it.
//!
//! The store also owns the graph's structural invariants: a node's parent
//! must exist in the same hub, and a node with children cannot be deleted
//! (deleting it would orphan them). Deleting a node removes its questions and
//! images with it.
//!
//! ```rust
//! use insightgraph::store::{MemoryNodeStore, NodeStore};
//! use insightgraph::model::{Level, NewHub, NewNode};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), insightgraph::GraphError> {
//! let store = MemoryNodeStore::new();
//! let hub = store
//!     .create_hub(NewHub { file_name: "rain.csv".into(), identity_id: "asst_1".into() })
//!     .await?;
//!
//! let chart = store.create_image(vec![0x89, 0x50, 0x4e, 0x47]).await?;
//! let node = store
//!     .create_node(NewNode {
//!         hub_id: hub.id,
//!         parent_id: None,
//!         level: Level::One,
//!         prompt: "Correlate humidity and rain".into(),
//!         text: "Strong positive correlation".into(),
//!         title: "Humidity predicts rain".into(),
//!         context_id: "thread_1".into(),
//!         questions: vec!["Is it causal?".into()],
//!         image_ids: vec![chart.id],
//!     })
//!     .await?;
//!
//! assert_eq!(node.images[0].url, chart.url);
//! assert_eq!(store.nodes_for_hub(&hub.id).await?.len(), 1);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::insightgraph::error::GraphError;
use crate::insightgraph::model::{
    Hub, HubId, Image, ImageId, NewHub, NewNode, Node, NodeId, Question, QuestionId,
};

/// Persistence contract for hubs, nodes, questions and images.
#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn create_hub(&self, hub: NewHub) -> Result<Hub, GraphError>;

    async fn get_hub(&self, id: &HubId) -> Result<Option<Hub>, GraphError>;

    /// Commit image bytes and assign the image its id and URL.
    async fn create_image(&self, data: Vec<u8>) -> Result<Image, GraphError>;

    async fn get_image(&self, id: &ImageId) -> Result<Option<Image>, GraphError>;

    /// Remove an image no node links to. Used to clean up after a node
    /// creation that failed after its images were committed.
    async fn delete_image(&self, id: &ImageId) -> Result<(), GraphError>;

    /// Create a node with its questions and image links atomically.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the hub or a referenced image does not exist.
    /// - `InvalidParent` if the parent is missing or belongs to another hub.
    async fn create_node(&self, node: NewNode) -> Result<Node, GraphError>;

    async fn get_node(&self, id: &NodeId) -> Result<Option<Node>, GraphError>;

    async fn get_question(&self, id: &QuestionId) -> Result<Option<Question>, GraphError>;

    /// All nodes of a hub in creation order.
    async fn nodes_for_hub(&self, hub_id: &HubId) -> Result<Vec<Node>, GraphError>;

    /// Direct children of a node in creation order.
    async fn children_of(&self, node_id: &NodeId) -> Result<Vec<Node>, GraphError>;

    /// Delete a childless node together with its questions and images.
    ///
    /// # Errors
    ///
    /// `HasChildren` if any node names this one as its parent.
    async fn delete_node(&self, id: &NodeId) -> Result<(), GraphError>;
}

#[derive(Debug, Default)]
struct Tables {
    hubs: HashMap<HubId, Hub>,
    nodes: HashMap<NodeId, Node>,
    /// Node ids in insertion order; `HashMap` iteration order is unstable.
    node_order: Vec<NodeId>,
    questions: HashMap<QuestionId, Question>,
    images: HashMap<ImageId, Image>,
    linked_images: HashSet<ImageId>,
}

/// Thread-safe in-memory [`NodeStore`].
///
/// All tables sit behind one mutex, so node creation is trivially atomic.
/// Cloning shares the underlying tables.
#[derive(Debug, Clone)]
pub struct MemoryNodeStore {
    tables: Arc<Mutex<Tables>>,
    image_base_url: String,
}

impl Default for MemoryNodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNodeStore {
    /// Store serving image URLs from `http://localhost:8001`.
    pub fn new() -> Self {
        Self::with_image_base_url("http://localhost:8001")
    }

    /// Store minting image URLs as `<base_url>/images/<id>`.
    pub fn with_image_base_url(base_url: impl Into<String>) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            image_base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn image_url(&self, id: &ImageId) -> String {
        format!("{}/images/{}", self.image_base_url, id)
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn create_hub(&self, hub: NewHub) -> Result<Hub, GraphError> {
        let hub = Hub {
            id: Uuid::new_v4(),
            file_name: hub.file_name,
            identity_id: hub.identity_id,
            created_at: Utc::now(),
        };
        self.tables().hubs.insert(hub.id, hub.clone());
        Ok(hub)
    }

    async fn get_hub(&self, id: &HubId) -> Result<Option<Hub>, GraphError> {
        Ok(self.tables().hubs.get(id).cloned())
    }

    async fn create_image(&self, data: Vec<u8>) -> Result<Image, GraphError> {
        let id = Uuid::new_v4();
        let image = Image {
            id,
            url: self.image_url(&id),
            data,
        };
        self.tables().images.insert(id, image.clone());
        Ok(image)
    }

    async fn get_image(&self, id: &ImageId) -> Result<Option<Image>, GraphError> {
        Ok(self.tables().images.get(id).cloned())
    }

    async fn delete_image(&self, id: &ImageId) -> Result<(), GraphError> {
        let mut tables = self.tables();
        if tables.linked_images.contains(id) {
            return Err(GraphError::Store(format!(
                "image {} is linked to a node",
                id
            )));
        }
        tables.images.remove(id);
        Ok(())
    }

    async fn create_node(&self, new: NewNode) -> Result<Node, GraphError> {
        let mut tables = self.tables();

        if !tables.hubs.contains_key(&new.hub_id) {
            return Err(GraphError::not_found("hub", new.hub_id));
        }
        if let Some(parent_id) = new.parent_id {
            let same_hub = tables
                .nodes
                .get(&parent_id)
                .map(|parent| parent.hub_id == new.hub_id)
                .unwrap_or(false);
            if !same_hub {
                return Err(GraphError::InvalidParent {
                    parent_id: parent_id.to_string(),
                    hub_id: new.hub_id.to_string(),
                });
            }
        }

        let mut images = Vec::with_capacity(new.image_ids.len());
        for image_id in &new.image_ids {
            let image = tables
                .images
                .get(image_id)
                .ok_or_else(|| GraphError::not_found("image", image_id))?;
            if tables.linked_images.contains(image_id) {
                return Err(GraphError::Store(format!(
                    "image {} is already linked to a node",
                    image_id
                )));
            }
            images.push(image.to_ref());
        }

        let node_id = Uuid::new_v4();
        let questions: Vec<Question> = new
            .questions
            .into_iter()
            .map(|content| Question {
                id: Uuid::new_v4(),
                node_id,
                content,
            })
            .collect();

        let node = Node {
            id: node_id,
            hub_id: new.hub_id,
            parent_id: new.parent_id,
            level: new.level,
            prompt: new.prompt,
            text: new.text,
            title: new.title,
            context_id: new.context_id,
            questions,
            images,
            created_at: Utc::now(),
        };

        // All checks passed; nothing below can fail.
        for question in &node.questions {
            tables.questions.insert(question.id, question.clone());
        }
        tables.linked_images.extend(new.image_ids);
        tables.nodes.insert(node_id, node.clone());
        tables.node_order.push(node_id);

        Ok(node)
    }

    async fn get_node(&self, id: &NodeId) -> Result<Option<Node>, GraphError> {
        Ok(self.tables().nodes.get(id).cloned())
    }

    async fn get_question(&self, id: &QuestionId) -> Result<Option<Question>, GraphError> {
        Ok(self.tables().questions.get(id).cloned())
    }

    async fn nodes_for_hub(&self, hub_id: &HubId) -> Result<Vec<Node>, GraphError> {
        let tables = self.tables();
        Ok(tables
            .node_order
            .iter()
            .filter_map(|id| tables.nodes.get(id))
            .filter(|node| node.hub_id == *hub_id)
            .cloned()
            .collect())
    }

    async fn children_of(&self, node_id: &NodeId) -> Result<Vec<Node>, GraphError> {
        let tables = self.tables();
        Ok(tables
            .node_order
            .iter()
            .filter_map(|id| tables.nodes.get(id))
            .filter(|node| node.parent_id == Some(*node_id))
            .cloned()
            .collect())
    }

    async fn delete_node(&self, id: &NodeId) -> Result<(), GraphError> {
        let mut tables = self.tables();
        if !tables.nodes.contains_key(id) {
            return Err(GraphError::not_found("node", id));
        }
        let children = tables
            .nodes
            .values()
            .filter(|node| node.parent_id == Some(*id))
            .count();
        if children > 0 {
            return Err(GraphError::HasChildren {
                node_id: id.to_string(),
                children,
            });
        }

        if let Some(node) = tables.nodes.remove(id) {
            for question in &node.questions {
                tables.questions.remove(&question.id);
            }
            for image in &node.images {
                tables.images.remove(&image.id);
                tables.linked_images.remove(&image.id);
            }
        }
        tables.node_order.retain(|n| n != id);
        Ok(())
    }
}
