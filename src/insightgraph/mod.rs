// src/insightgraph/mod.rs

pub mod channel;
pub mod clients;
pub mod config;
pub mod error;
pub mod event;
pub mod graph_builder;
pub mod model;
pub mod parser;
pub mod pool;
pub mod prompts;
pub mod reasoning;
pub mod search;
pub mod store;

mod level_one;
mod level_one_half;
mod level_two;

// Export the engine at the module root so callers can write
// insightgraph::GraphBuilder instead of going through graph_builder.
pub use graph_builder::{BranchFailure, FanOutReport, GraphBuilder, HubSeed};
