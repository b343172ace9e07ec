//! Configuration for the graph engine.
//!
//! Provides the [`InsightGraphConfig`] struct holding every tunable the
//! orchestrators consume. Users construct this in code; no config-file
//! parsing dependencies are required.
//!
//! # Example
//!
//! ```rust
//! use insightgraph::InsightGraphConfig;
//!
//! // Use the defaults (5 candidate prompts, 3 search results, 5 attempts)
//! let config = InsightGraphConfig::default();
//! assert_eq!(config.candidate_prompt_count, 5);
//!
//! // Or adjust a few fields
//! let config = InsightGraphConfig::default()
//!     .with_candidate_prompt_count(2)
//!     .with_surprise_gate(true);
//! assert!(config.surprise_gate.enabled);
//! ```

use std::time::Duration;

use crate::insightgraph::prompts::DEFAULT_INSTRUCTIONS;

/// Quality filter that drops low-novelty level-1 findings.
///
/// A finding is suppressed only when the gate is enabled *and* the parsed
/// surprise score is at or below `threshold`. A finding without a score is
/// never suppressed.
///
/// ```rust
/// use insightgraph::SurpriseGate;
///
/// let gate = SurpriseGate { enabled: true, threshold: 2 };
/// assert!(gate.suppresses(Some(2)));
/// assert!(!gate.suppresses(Some(3)));
/// assert!(!gate.suppresses(None));
///
/// let off = SurpriseGate::default();
/// assert!(!off.suppresses(Some(1)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurpriseGate {
    /// Whether the gate is active. Also controls whether the title prompt asks
    /// the service for a score at all.
    pub enabled: bool,
    /// Scores `<= threshold` are suppressed.
    pub threshold: u8,
}

impl SurpriseGate {
    /// Returns `true` when a finding with `score` must not become a node.
    pub fn suppresses(&self, score: Option<u8>) -> bool {
        match score {
            Some(s) => self.enabled && s <= self.threshold,
            None => false,
        }
    }
}

impl Default for SurpriseGate {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 2,
        }
    }
}

/// Tunables for prompt construction, retrying, parsing and fan-out.
#[derive(Debug, Clone)]
pub struct InsightGraphConfig {
    /// How many candidate analysis prompts the root prompt asks for.
    pub candidate_prompt_count: usize,
    /// How many follow-up questions are requested per node.
    pub question_count: usize,
    /// How many results a level-2 search requests.
    pub search_result_count: usize,
    /// Run attempts per prompt before the reply-wait loop gives up.
    pub retry_limit: usize,
    /// Token bounding every structured segment in a reply.
    pub delimiter: String,
    /// Low-novelty filter applied to level-1 titles.
    pub surprise_gate: SurpriseGate,
    /// Maximum title length requested from the service.
    pub one_liner_max_chars: usize,
    /// Maximum answer length requested for level-1.5 continuations.
    pub answer_max_chars: usize,
    /// Wait between two polls of the same run.
    pub poll_interval: Duration,
    /// A run still not finished after this long counts as a failed attempt.
    pub run_timeout: Duration,
    /// Upper bound on branches executing at the same time.
    pub max_workers: usize,
    /// Model the reasoning identity is created with.
    pub model: String,
    /// System instructions for the reasoning identity.
    pub instructions: String,
}

impl Default for InsightGraphConfig {
    fn default() -> Self {
        Self {
            candidate_prompt_count: 5,
            question_count: 3,
            search_result_count: 3,
            retry_limit: 5,
            delimiter: "~".to_string(),
            surprise_gate: SurpriseGate::default(),
            one_liner_max_chars: 50,
            answer_max_chars: 300,
            poll_interval: Duration::from_secs(1),
            run_timeout: Duration::from_secs(600),
            max_workers: 8,
            model: "gpt-4o".to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

impl InsightGraphConfig {
    pub fn with_candidate_prompt_count(mut self, count: usize) -> Self {
        self.candidate_prompt_count = count;
        self
    }

    pub fn with_question_count(mut self, count: usize) -> Self {
        self.question_count = count;
        self
    }

    pub fn with_search_result_count(mut self, count: usize) -> Self {
        self.search_result_count = count;
        self
    }

    pub fn with_retry_limit(mut self, limit: usize) -> Self {
        self.retry_limit = limit;
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Enable or disable the surprise gate, keeping its threshold.
    pub fn with_surprise_gate(mut self, enabled: bool) -> Self {
        self.surprise_gate.enabled = enabled;
        self
    }

    pub fn with_surprise_threshold(mut self, threshold: u8) -> Self {
        self.surprise_gate.threshold = threshold;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Set the worker bound. Zero is bumped to one.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }
}
