//! Level-1: the initial fan-out from a hub's root context.
//!
//! The root context is asked for a list of delimited analysis instructions.
//! Each instruction becomes one branch on its own fresh context; branches
//! share nothing but the hub and run on the bounded worker pool.

use crate::insightgraph::channel::ConversationChannel;
use crate::insightgraph::error::GraphError;
use crate::insightgraph::event::GraphEvent;
use crate::insightgraph::graph_builder::{BranchOutcome, FanOutReport, GraphBuilder};
use crate::insightgraph::model::{Hub, Level, NewNode};
use crate::insightgraph::parser::extract_delimited;
use crate::insightgraph::pool::run_branches;
use crate::insightgraph::prompts;
use crate::insightgraph::reasoning::ContextId;

impl GraphBuilder {
    /// Build the root nodes of a hub.
    ///
    /// Sends the candidate-instruction prompt on `root_context`, then runs one
    /// branch per extracted candidate. The service may return more or fewer
    /// candidates than configured; blank candidates are skipped, extras beyond
    /// `candidate_prompt_count` are dropped and a short list is used as-is.
    ///
    /// # Errors
    ///
    /// Only the root exchange can fail the call. Branch failures are reported
    /// in [`FanOutReport::failures`].
    pub async fn build_initial_graph(
        &self,
        hub: &Hub,
        root_context: &ContextId,
    ) -> Result<FanOutReport, GraphError> {
        let root = ConversationChannel::new(hub.identity_id.clone(), root_context.clone());
        let reply = {
            let _guard = self.context_locks.acquire(root_context).await;
            self.send(&root, &prompts::initial_prompt(&self.config)).await?
        };

        let mut candidates =
            extract_delimited(reply.first_text().unwrap_or(""), &self.config.delimiter);
        let extracted = candidates.len();
        candidates.retain(|candidate| !candidate.trim().is_empty());
        if candidates.len() < extracted {
            log::warn!(
                "Dropped {} blank candidate prompts for hub {}",
                extracted - candidates.len(),
                hub.id
            );
        }
        if candidates.len() != self.config.candidate_prompt_count {
            log::warn!(
                "Hub {} asked for {} candidate prompts, got {}",
                hub.id,
                self.config.candidate_prompt_count,
                candidates.len()
            );
        }
        candidates.truncate(self.config.candidate_prompt_count);

        self.emit(GraphEvent::FanOutStarted {
            hub_id: hub.id,
            level: Level::One,
            anchor_id: None,
            branches: candidates.len(),
        })
        .await;
        log::info!("Starting L1 fan-out of {} branches for hub {}", candidates.len(), hub.id);

        let outcomes = run_branches(candidates, self.config.max_workers, |branch, candidate| {
            let builder = self.clone();
            let hub = hub.clone();
            async move {
                let outcome = builder.level_one_branch(&hub, branch, candidate).await;
                builder.finish_branch(hub.id, Level::One, branch, outcome).await
            }
        })
        .await;

        Ok(self.collect_fan_out(hub.id, Level::One, outcomes).await)
    }

    async fn level_one_branch(
        &self,
        hub: &Hub,
        branch: usize,
        candidate: String,
    ) -> Result<BranchOutcome, GraphError> {
        self.emit(GraphEvent::BranchStarted {
            hub_id: hub.id,
            level: Level::One,
            branch,
        })
        .await;

        let channel = ConversationChannel::open(self.reasoning.as_ref(), hub.identity_id.clone()).await?;
        let prompt = prompts::level_one_prompt(&candidate);

        let answer = self.send(&channel, &prompt).await?;
        let title = self.generate_title(&channel).await?;
        if self.config.surprise_gate.suppresses(title.surprise) {
            let score = title.surprise.unwrap_or_default();
            log::warn!(
                "Suppressed L1 branch {} of hub {} (surprise {}): {}",
                branch,
                hub.id,
                score,
                title.title
            );
            return Ok(BranchOutcome::Suppressed(score));
        }
        let questions = self.generate_questions(&channel).await?;

        let text = answer.joined_text();
        let image_ids = self.persist_images(answer.artifacts).await?;
        let created = self
            .store
            .create_node(NewNode {
                hub_id: hub.id,
                parent_id: None,
                level: Level::One,
                prompt,
                text,
                title: title.title,
                context_id: channel.context_id,
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

        self.emit(GraphEvent::NodePersisted {
            hub_id: hub.id,
            level: Level::One,
            node_id: node.id,
            parent_id: None,
        })
        .await;
        Ok(BranchOutcome::Created(node))
    }
}
