//! Level-1.5: a single continuation of an existing node.
//!
//! The continuation is asked on the parent's context so the service can draw
//! on the earlier exchange. The new node records that same context, so a
//! later continuation of the child carries the whole thread forward.

use crate::insightgraph::channel::ConversationChannel;
use crate::insightgraph::error::GraphError;
use crate::insightgraph::event::GraphEvent;
use crate::insightgraph::graph_builder::GraphBuilder;
use crate::insightgraph::model::{Level, NewNode, Node, NodeId, QuestionId};
use crate::insightgraph::prompts;

impl GraphBuilder {
    /// Answer a stored follow-up question as a child of the question's node.
    pub async fn continue_from_question(&self, question_id: &QuestionId) -> Result<Node, GraphError> {
        let question = self
            .store
            .get_question(question_id)
            .await?
            .ok_or_else(|| GraphError::not_found("question", question_id))?;
        let parent = self.load_node(&question.node_id).await?;
        self.continue_node(parent, &question.content).await
    }

    /// Answer free-form `text` as a child of `node_id`.
    pub async fn continue_from_prompt(&self, node_id: &NodeId, text: &str) -> Result<Node, GraphError> {
        let parent = self.load_node(node_id).await?;
        self.continue_node(parent, text).await
    }

    async fn continue_node(&self, parent: Node, question: &str) -> Result<Node, GraphError> {
        let hub = self.load_hub(&parent.hub_id).await?;
        let channel = ConversationChannel::new(hub.identity_id, parent.context_id.clone());
        let prompt = prompts::continuation_prompt(question, &self.config);

        // One run at a time per context.
        let _guard = self.context_locks.acquire(&parent.context_id).await;

        let answer = self.send(&channel, &prompt).await?;
        let text = answer.joined_text();
        if text.trim().is_empty() {
            return Err(GraphError::Parse(format!(
                "empty answer on context {}",
                channel.context_id
            )));
        }
        let title = self.generate_title(&channel).await?;
        let questions = self.generate_questions(&channel).await?;

        let image_ids = self.persist_images(answer.artifacts).await?;
        let created = self
            .store
            .create_node(NewNode {
                hub_id: parent.hub_id,
                parent_id: Some(parent.id),
                level: Level::OneHalf,
                prompt,
                text,
                title: title.title,
                context_id: parent.context_id.clone(),
                questions,
                image_ids: image_ids.clone(),
            })
            .await;
        let node = match created {
            Ok(node) => node,
            Err(e) => {
                self.discard_images(&image_ids).await;
                return Err(e);
            }
        };

        log::info!("L1.5 node {} continues node {}", node.id, parent.id);
        self.emit(GraphEvent::NodePersisted {
            hub_id: node.hub_id,
            level: Level::OneHalf,
            node_id: node.id,
            parent_id: Some(parent.id),
        })
        .await;
        Ok(node)
    }
}
