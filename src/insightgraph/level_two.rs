//! Level-2: search-augmented expansion of an anchor node.
//!
//! The anchor's context phrases a web search query; every result then gets a
//! branch on a fresh context that relates it back to the anchor and returns a
//! delimited `(summary, title)` pair.

use crate::insightgraph::channel::ConversationChannel;
use crate::insightgraph::error::GraphError;
use crate::insightgraph::event::GraphEvent;
use crate::insightgraph::graph_builder::{BranchOutcome, FanOutReport, GraphBuilder};
use crate::insightgraph::model::{Hub, Level, NewNode, Node, NodeId};
use crate::insightgraph::parser::extract_delimited;
use crate::insightgraph::pool::run_branches;
use crate::insightgraph::prompts;
use crate::insightgraph::search::SearchResult;

impl GraphBuilder {
    /// Expand `node_id` with one child per search result.
    ///
    /// # Errors
    ///
    /// Fails as a whole when the anchor or its hub is missing, when no query
    /// can be obtained, or when the search itself fails. Individual result
    /// branches only fail themselves.
    pub async fn expand_with_search(&self, node_id: &NodeId) -> Result<FanOutReport, GraphError> {
        let anchor = self.load_node(node_id).await?;
        let hub = self.load_hub(&anchor.hub_id).await?;

        let query = {
            let channel = ConversationChannel::new(hub.identity_id.clone(), anchor.context_id.clone());
            let _guard = self.context_locks.acquire(&anchor.context_id).await;
            let reply = self
                .send(&channel, &prompts::search_query_prompt(&anchor.title, &anchor.text))
                .await?;
            reply.first_text().unwrap_or("").trim().to_string()
        };
        if query.is_empty() {
            return Err(GraphError::Parse(format!(
                "no search query produced for node {}",
                anchor.id
            )));
        }
        log::info!("L2 query for node {}: {}", anchor.id, query);

        let mut results = self
            .search
            .search(&query, self.config.search_result_count)
            .await?;
        results.truncate(self.config.search_result_count);

        self.emit(GraphEvent::FanOutStarted {
            hub_id: hub.id,
            level: Level::Two,
            anchor_id: Some(anchor.id),
            branches: results.len(),
        })
        .await;

        let outcomes = run_branches(results, self.config.max_workers, |branch, result| {
            let builder = self.clone();
            let hub = hub.clone();
            let anchor = anchor.clone();
            async move {
                let outcome = builder.level_two_branch(&hub, &anchor, branch, result).await;
                builder.finish_branch(hub.id, Level::Two, branch, outcome).await
            }
        })
        .await;

        Ok(self.collect_fan_out(hub.id, Level::Two, outcomes).await)
    }

    async fn level_two_branch(
        &self,
        hub: &Hub,
        anchor: &Node,
        branch: usize,
        result: SearchResult,
    ) -> Result<BranchOutcome, GraphError> {
        self.emit(GraphEvent::BranchStarted {
            hub_id: hub.id,
            level: Level::Two,
            branch,
        })
        .await;

        let channel = ConversationChannel::open(self.reasoning.as_ref(), hub.identity_id.clone()).await?;
        let prompt = prompts::relate_prompt(&result, &anchor.title, &anchor.text, &self.config);
        let reply = self.send(&channel, &prompt).await?;

        let segments = extract_delimited(reply.first_text().unwrap_or(""), &self.config.delimiter);
        let (summary, title) = match segments.as_slice() {
            [summary, title, ..] => (summary.clone(), title.clone()),
            _ => {
                return Err(GraphError::Parse(format!(
                    "expected summary and title for {}, found {} segment(s)",
                    result.url,
                    segments.len()
                )))
            }
        };

        let node = self
            .store
            .create_node(NewNode {
                hub_id: hub.id,
                parent_id: Some(anchor.id),
                level: Level::Two,
                prompt,
                text: format!("{}\n\n\n{}", result.markdown_link(), summary),
                title,
                context_id: channel.context_id,
                questions: Vec::new(),
                image_ids: Vec::new(),
            })
            .await?;

        self.emit(GraphEvent::NodePersisted {
            hub_id: hub.id,
            level: Level::Two,
            node_id: node.id,
            parent_id: Some(anchor.id),
        })
        .await;
        Ok(BranchOutcome::Created(node))
    }
}
