//! HTTP-backed implementations of the reasoning and search seams.

pub mod exa;
pub mod http_pool;
pub mod openai_assistants;
