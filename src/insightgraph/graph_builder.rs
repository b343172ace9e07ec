//! The graph-construction engine.
//!
//! [`GraphBuilder`] wires a [`ReasoningService`], a [`SearchService`] and a
//! [`NodeStore`] together and exposes the three node-generation strategies:
//!
//! | Level | Entry point | Shape |
//! |-------|-------------|-------|
//! | 1 | [`build_initial_graph`](GraphBuilder::build_initial_graph) | fan-out of root findings |
//! | 1.5 | [`continue_from_question`](GraphBuilder::continue_from_question), [`continue_from_prompt`](GraphBuilder::continue_from_prompt) | one child on the parent's context |
//! | 2 | [`expand_with_search`](GraphBuilder::expand_with_search) | fan-out of search-derived children |
//!
//! The level-specific algorithms live in `level_one`, `level_one_half` and
//! `level_two`; this module holds the shared plumbing.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use insightgraph::clients::exa::ExaSearchClient;
//! use insightgraph::clients::openai_assistants::OpenAIAssistantsClient;
//! use insightgraph::store::MemoryNodeStore;
//! use insightgraph::{GraphBuilder, InsightGraphConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     insightgraph::init_logger();
//!
//!     let config = InsightGraphConfig::default().with_surprise_gate(true);
//!     let builder = GraphBuilder::new(
//!         Arc::new(OpenAIAssistantsClient::from_env(&config.model)?),
//!         Arc::new(ExaSearchClient::from_env()?),
//!         Arc::new(MemoryNodeStore::new()),
//!     )
//!     .with_config(config);
//!
//!     let csv = std::fs::read("weather.csv")?;
//!     let seed = builder.create_hub("weather.csv", csv).await?;
//!     let report = builder.build_initial_graph(&seed.hub, &seed.root_context).await?;
//!
//!     if let Some(first) = report.created.first() {
//!         let expansion = builder.expand_with_search(&first.id).await?;
//!         println!("{} search-derived nodes", expansion.created.len());
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::insightgraph::channel::{ContextLocks, ConversationChannel, Reply, RetryPolicy};
use crate::insightgraph::config::InsightGraphConfig;
use crate::insightgraph::error::GraphError;
use crate::insightgraph::event::{EventHandler, GraphEvent};
use crate::insightgraph::model::{Hub, HubId, Image, ImageId, Level, NewHub, Node, NodeId};
use crate::insightgraph::parser::{extract_questions, parse_title, ParsedTitle, TitleParse};
use crate::insightgraph::prompts;
use crate::insightgraph::reasoning::{ContextId, ReasoningService};
use crate::insightgraph::search::SearchService;
use crate::insightgraph::store::NodeStore;

/// A freshly created hub and the root context its level-1 fan-out starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubSeed {
    pub hub: Hub,
    pub root_context: ContextId,
}

/// A branch that produced no node.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchFailure {
    /// Zero-based position of the branch in its fan-out.
    pub branch: usize,
    pub error: GraphError,
}

/// Outcome of a fan-out: however many branches succeeded.
///
/// Callers must expect `created` to be shorter than the number of branches
/// dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutReport {
    pub level: Level,
    /// Persisted nodes, in branch order.
    pub created: Vec<Node>,
    /// `(branch, score)` for findings dropped by the surprise gate.
    pub suppressed: Vec<(usize, u8)>,
    pub failures: Vec<BranchFailure>,
}

impl FanOutReport {
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.created.iter().map(|node| node.id).collect()
    }

    /// Total number of branches the fan-out dispatched.
    pub fn branches(&self) -> usize {
        self.created.len() + self.suppressed.len() + self.failures.len()
    }
}

/// What one branch ended with, short of an error.
#[derive(Debug)]
pub(crate) enum BranchOutcome {
    Created(Node),
    Suppressed(u8),
}

/// Orchestrates node generation over the three collaborator seams.
///
/// Cloning is cheap; every branch task holds its own clone.
#[derive(Clone)]
pub struct GraphBuilder {
    pub(crate) reasoning: Arc<dyn ReasoningService>,
    pub(crate) search: Arc<dyn SearchService>,
    pub(crate) store: Arc<dyn NodeStore>,
    pub(crate) config: Arc<InsightGraphConfig>,
    event_handler: Option<Arc<dyn EventHandler>>,
    pub(crate) context_locks: ContextLocks,
}

impl GraphBuilder {
    /// Create a builder with [`InsightGraphConfig::default`].
    pub fn new(
        reasoning: Arc<dyn ReasoningService>,
        search: Arc<dyn SearchService>,
        store: Arc<dyn NodeStore>,
    ) -> Self {
        Self {
            reasoning,
            search,
            store,
            config: Arc::new(InsightGraphConfig::default()),
            event_handler: None,
            context_locks: ContextLocks::new(),
        }
    }

    pub fn with_config(mut self, config: InsightGraphConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn config(&self) -> &InsightGraphConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    /// Upload a dataset, create its reasoning identity and root context, and
    /// persist the hub.
    ///
    /// The identity is created with the configured instructions and the
    /// code-execution tool; the dataset is its only attached file.
    pub async fn create_hub(&self, file_name: &str, bytes: Vec<u8>) -> Result<HubSeed, GraphError> {
        let file_ref = self.reasoning.upload_dataset(file_name, bytes).await?;
        let identity_id = self
            .reasoning
            .create_identity(&self.config.instructions, &[file_ref])
            .await?;
        let root_context = self.reasoning.create_context().await?;

        let hub = self
            .store
            .create_hub(NewHub {
                file_name: file_name.to_string(),
                identity_id,
            })
            .await?;
        log::info!("Created hub {} for {}", hub.id, file_name);

        Ok(HubSeed { hub, root_context })
    }

    /// Run level-1 construction on a background task.
    pub fn spawn_initial_graph(
        &self,
        hub: Hub,
        root_context: ContextId,
    ) -> JoinHandle<Result<FanOutReport, GraphError>> {
        let builder = self.clone();
        tokio::spawn(async move { builder.build_initial_graph(&hub, &root_context).await })
    }

    /// All nodes of a hub, in creation order.
    pub async fn hub_nodes(&self, hub_id: &HubId) -> Result<Vec<Node>, GraphError> {
        self.load_hub(hub_id).await?;
        self.store.nodes_for_hub(hub_id).await
    }

    pub async fn image(&self, image_id: &ImageId) -> Result<Image, GraphError> {
        self.store
            .get_image(image_id)
            .await?
            .ok_or_else(|| GraphError::not_found("image", image_id))
    }

    /// Delete a leaf node with its questions and images.
    ///
    /// Nodes that still have children are refused with
    /// [`GraphError::HasChildren`]; delete the children first.
    pub async fn delete_node(&self, node_id: &NodeId) -> Result<(), GraphError> {
        self.store.delete_node(node_id).await
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.config.retry_limit,
            poll_interval: self.config.poll_interval,
            run_timeout: self.config.run_timeout,
        }
    }

    pub(crate) async fn emit(&self, event: GraphEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_graph_event(&event).await;
        }
    }

    pub(crate) async fn send(
        &self,
        channel: &ConversationChannel,
        prompt: &str,
    ) -> Result<Reply, GraphError> {
        channel
            .send_and_await(self.reasoning.as_ref(), prompt, &self.retry_policy())
            .await
    }

    pub(crate) async fn load_hub(&self, hub_id: &HubId) -> Result<Hub, GraphError> {
        self.store
            .get_hub(hub_id)
            .await?
            .ok_or_else(|| GraphError::not_found("hub", hub_id))
    }

    pub(crate) async fn load_node(&self, node_id: &NodeId) -> Result<Node, GraphError> {
        self.store
            .get_node(node_id)
            .await?
            .ok_or_else(|| GraphError::not_found("node", node_id))
    }

    /// Ask for a one-line title on `channel` and parse it.
    pub(crate) async fn generate_title(
        &self,
        channel: &ConversationChannel,
    ) -> Result<ParsedTitle, GraphError> {
        let reply = self.send(channel, &prompts::title_prompt(&self.config)).await?;
        match parse_title(reply.first_text().unwrap_or("")) {
            TitleParse::Parsed(title) => Ok(title),
            TitleParse::Unrecoverable => Err(GraphError::Parse(format!(
                "no title in reply on context {}",
                channel.context_id
            ))),
        }
    }

    /// Ask for follow-up questions on `channel`.
    pub(crate) async fn generate_questions(
        &self,
        channel: &ConversationChannel,
    ) -> Result<Vec<String>, GraphError> {
        let reply = self
            .send(channel, &prompts::question_prompt(&self.config))
            .await?;
        Ok(extract_questions(
            reply.first_text().unwrap_or(""),
            &self.config.delimiter,
        ))
    }

    /// Commit artifacts as images ahead of the node that links them.
    ///
    /// On failure, images committed so far are discarded again.
    pub(crate) async fn persist_images(
        &self,
        artifacts: Vec<Vec<u8>>,
    ) -> Result<Vec<ImageId>, GraphError> {
        let mut ids = Vec::with_capacity(artifacts.len());
        for bytes in artifacts {
            match self.store.create_image(bytes).await {
                Ok(image) => ids.push(image.id),
                Err(e) => {
                    self.discard_images(&ids).await;
                    return Err(e);
                }
            }
        }
        Ok(ids)
    }

    pub(crate) async fn discard_images(&self, ids: &[ImageId]) {
        for id in ids {
            if let Err(e) = self.store.delete_image(id).await {
                log::warn!("Could not discard unlinked image {}: {}", id, e);
            }
        }
    }

    /// Emit the outcome event for one branch as it finishes.
    ///
    /// Runs inside the branch task, so a branch's outcome event directly
    /// follows its own `BranchStarted` and `NodePersisted`.
    pub(crate) async fn finish_branch(
        &self,
        hub_id: HubId,
        level: Level,
        branch: usize,
        outcome: Result<BranchOutcome, GraphError>,
    ) -> Result<BranchOutcome, GraphError> {
        match &outcome {
            Ok(BranchOutcome::Created(node)) => {
                self.emit(GraphEvent::BranchCompleted {
                    hub_id,
                    level,
                    branch,
                    node_id: node.id,
                })
                .await;
            }
            Ok(BranchOutcome::Suppressed(score)) => {
                self.emit(GraphEvent::BranchSuppressed {
                    hub_id,
                    level,
                    branch,
                    score: *score,
                })
                .await;
            }
            Err(error) => {
                log::warn!("{} branch {} produced no node: {}", level.label(), branch, error);
                self.emit(GraphEvent::BranchFailed {
                    hub_id,
                    level,
                    branch,
                    error: error.to_string(),
                })
                .await;
            }
        }
        outcome
    }

    /// Fold branch results into a report.
    ///
    /// Outcome events were already emitted by [`finish_branch`](Self::finish_branch);
    /// only branches whose task died before reaching it are reported here.
    pub(crate) async fn collect_fan_out(
        &self,
        hub_id: HubId,
        level: Level,
        outcomes: Vec<Result<BranchOutcome, GraphError>>,
    ) -> FanOutReport {
        let mut report = FanOutReport {
            level,
            created: Vec::new(),
            suppressed: Vec::new(),
            failures: Vec::new(),
        };

        for (branch, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(BranchOutcome::Created(node)) => report.created.push(node),
                Ok(BranchOutcome::Suppressed(score)) => report.suppressed.push((branch, score)),
                Err(error) => {
                    if let GraphError::BranchPanicked(_) = error {
                        log::warn!("{} branch {} produced no node: {}", level.label(), branch, error);
                        self.emit(GraphEvent::BranchFailed {
                            hub_id,
                            level,
                            branch,
                            error: error.to_string(),
                        })
                        .await;
                    }
                    report.failures.push(BranchFailure { branch, error });
                }
            }
        }

        log::info!(
            "{} fan-out for hub {}: {} created, {} suppressed, {} failed",
            level.label(),
            hub_id,
            report.created.len(),
            report.suppressed.len(),
            report.failures.len()
        );
        self.emit(GraphEvent::FanOutCompleted {
            hub_id,
            level,
            created: report.created.len(),
            suppressed: report.suppressed.len(),
            failed: report.failures.len(),
        })
        .await;

        report
    }
}
