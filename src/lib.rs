//! # InsightGraph
//!
//! InsightGraph builds a branching tree of data-analysis findings over an uploaded dataset. It
//! drives a stateful reasoning service (a code-executing assistant holding one conversation
//! context per line of inquiry) and a web-search service through fixed conversational
//! protocols, and persists every finding as a node in a graph store.
//!
//! The crate is organised around a few seams:
//!
//! * **Reasoning**: [`reasoning::ReasoningService`] abstracts datasets, identities, contexts
//!   and runs. [`clients::openai_assistants::OpenAIAssistantsClient`] implements it over the
//!   OpenAI Assistants API.
//! * **Search**: [`search::SearchService`] returns titled, summarised web results.
//!   [`clients::exa::ExaSearchClient`] implements it over Exa.
//! * **Persistence**: [`store::NodeStore`] stores hubs, nodes, questions and images with
//!   atomic node creation. [`store::MemoryNodeStore`] is the in-process implementation.
//! * **Engine**: [`GraphBuilder`] runs the three node-generation strategies on top of those
//!   seams and reports per-branch outcomes through [`FanOutReport`] and [`event`]s.
//!
//! ## Node generation levels
//!
//! ```text
//!                 Hub (dataset + identity)
//!                          │ root context
//!        ┌─────────────────┼─────────────────┐
//!      L1 node           L1 node           L1 node       build_initial_graph (fan-out)
//!        │                 │
//!    L1.5 node          L2 node  L2 node                 continue_from_question / expand_with_search
//! ```
//!
//! * **Level 1** asks the root context for candidate analyses and explores each on its own
//!   context, in parallel.
//! * **Level 1.5** answers one follow-up question on the parent node's context.
//! * **Level 2** turns a node into a web search query and relates each result back to the
//!   node, in parallel.
//!
//! Fan-out branches are isolated: a branch that exhausts its retries or returns unparseable
//! text produces no node and is listed in [`FanOutReport::failures`], while its siblings carry
//! on.
//!
//! ## Getting Started
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
//!     let config = InsightGraphConfig::default();
//!     let builder = GraphBuilder::new(
//!         Arc::new(OpenAIAssistantsClient::from_env(&config.model)?),
//!         Arc::new(ExaSearchClient::from_env()?),
//!         Arc::new(MemoryNodeStore::new()),
//!     )
//!     .with_config(config);
//!
//!     let seed = builder.create_hub("sales.csv", std::fs::read("sales.csv")?).await?;
//!     let report = builder.build_initial_graph(&seed.hub, &seed.root_context).await?;
//!
//!     for node in &report.created {
//!         println!("{}: {}", node.title, node.questions.len());
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Applications embedding InsightGraph can opt in to `RUST_LOG` driven diagnostics without
/// choosing a logging backend upfront.
///
/// ```rust
/// insightgraph::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `insightgraph` module.
pub mod insightgraph;

// Re-exporting key items for easier external access.
pub use insightgraph::channel;
pub use insightgraph::clients;
pub use insightgraph::config::{InsightGraphConfig, SurpriseGate};
pub use insightgraph::error::GraphError;
pub use insightgraph::event;
pub use insightgraph::event::{EventHandler, GraphEvent};
pub use insightgraph::model;
pub use insightgraph::parser;
pub use insightgraph::pool;
pub use insightgraph::prompts;
pub use insightgraph::reasoning;
pub use insightgraph::search;
pub use insightgraph::search::SearchResult;
pub use insightgraph::store;
pub use insightgraph::{BranchFailure, FanOutReport, GraphBuilder, HubSeed};
