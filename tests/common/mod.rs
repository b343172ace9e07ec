#![allow(dead_code)]

use async_trait::async_trait;
use insightgraph::reasoning::{
    ContentItem, ContextId, FileRef, IdentityId, ReasoningService, RunHandle, RunStatus,
};
use insightgraph::search::{SearchResult, SearchService};
use insightgraph::store::MemoryNodeStore;
use insightgraph::{GraphBuilder, GraphError, InsightGraphConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Substrings identifying each fixed prompt.
pub const INITIAL: &str = "possible instructions for the dataset";
pub const LEVEL_ONE: &str = "Be precise with your results";
pub const TITLE: &str = "Summarize the key findings";
pub const QUESTIONS: &str = "follow-up questions that a user might ask";
pub const CONTINUE: &str = "Use the previous responses in this thread";
pub const QUERY: &str = "create a web search query";
pub const RELATE: &str = "You have a summary of a new source";

struct Rule {
    needle: String,
    within: Option<String>,
    items: Vec<ContentItem>,
}

#[derive(Default)]
struct State {
    contexts: HashMap<ContextId, Vec<String>>,
    runs_per_prompt: HashMap<String, usize>,
}

/// In-process reasoning service answering from a script.
///
/// A run answers the latest prompt of its context with the items of the
/// first matching rule. Prompts containing a `fail_on` needle never complete.
#[derive(Default)]
pub struct ScriptedReasoning {
    rules: Mutex<Vec<Rule>>,
    failing: Mutex<Vec<String>>,
    artifacts: Mutex<HashMap<String, Vec<u8>>>,
    state: Mutex<State>,
    next_context: AtomicUsize,
    next_run: AtomicUsize,
    pub runs: AtomicUsize,
    pub appends: AtomicUsize,
    pub cancels: AtomicUsize,
}

impl ScriptedReasoning {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply `text` to any prompt containing `needle`.
    pub fn on(self, needle: &str, text: &str) -> Self {
        self.on_items(needle, None, vec![ContentItem::Text(text.into())])
    }

    /// Reply `text` to prompts containing `needle` on contexts where some
    /// earlier prompt contained `within`.
    pub fn on_within(self, needle: &str, within: &str, text: &str) -> Self {
        self.on_items(needle, Some(within), vec![ContentItem::Text(text.into())])
    }

    pub fn on_items(self, needle: &str, within: Option<&str>, items: Vec<ContentItem>) -> Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.into(),
            within: within.map(str::to_string),
            items,
        });
        self
    }

    pub fn fail_on(self, needle: &str) -> Self {
        self.failing.lock().unwrap().push(needle.into());
        self
    }

    pub fn with_artifact(self, id: &str, bytes: Vec<u8>) -> Self {
        self.artifacts.lock().unwrap().insert(id.into(), bytes);
        self
    }

    /// Every prompt appended to `context_id`, in order.
    pub fn prompts_on(&self, context_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .contexts
            .get(context_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Runs started for prompts containing `needle`.
    pub fn runs_for(&self, needle: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .runs_per_prompt
            .iter()
            .filter(|(prompt, _)| prompt.contains(needle))
            .map(|(_, n)| *n)
            .sum()
    }

    pub fn contexts_created(&self) -> usize {
        self.next_context.load(Ordering::SeqCst)
    }

    fn latest_prompt(&self, context_id: &str) -> String {
        self.prompts_on(context_id).last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoning {
    async fn upload_dataset(&self, file_name: &str, _bytes: Vec<u8>) -> Result<FileRef, GraphError> {
        Ok(format!("file-{}", file_name))
    }

    async fn create_identity(&self, _instructions: &str, _file_refs: &[FileRef]) -> Result<IdentityId, GraphError> {
        Ok("asst_test".into())
    }

    async fn create_context(&self) -> Result<ContextId, GraphError> {
        let n = self.next_context.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("thread_{}", n);
        self.state.lock().unwrap().contexts.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn append_message(&self, context_id: &str, text: &str) -> Result<(), GraphError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap()
            .contexts
            .entry(context_id.to_string())
            .or_default()
            .push(text.to_string());
        Ok(())
    }

    async fn create_run(&self, _identity_id: &str, context_id: &str) -> Result<RunHandle, GraphError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let prompt = self.latest_prompt(context_id);
        *self
            .state
            .lock()
            .unwrap()
            .runs_per_prompt
            .entry(prompt)
            .or_default() += 1;
        let n = self.next_run.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RunHandle {
            id: format!("run_{}", n),
            context_id: context_id.to_string(),
        })
    }

    async fn poll_run(&self, run: &RunHandle) -> Result<RunStatus, GraphError> {
        let prompt = self.latest_prompt(&run.context_id);
        let fails = self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|needle| prompt.contains(needle.as_str()));
        Ok(if fails { RunStatus::Failed } else { RunStatus::Completed })
    }

    async fn cancel_run(&self, _run: &RunHandle) -> Result<(), GraphError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read_last_turn(&self, context_id: &str) -> Result<Vec<ContentItem>, GraphError> {
        let history = self.prompts_on(context_id);
        let latest = history.last().cloned().unwrap_or_default();
        let rules = self.rules.lock().unwrap();
        let items = rules
            .iter()
            .find(|rule| {
                latest.contains(&rule.needle)
                    && rule
                        .within
                        .as_ref()
                        .map(|w| history.iter().any(|p| p.contains(w.as_str())))
                        .unwrap_or(true)
            })
            .map(|rule| rule.items.clone())
            .unwrap_or_else(|| vec![ContentItem::Text("ok".into())]);
        Ok(items)
    }

    async fn fetch_artifact(&self, artifact: &str) -> Result<Vec<u8>, GraphError> {
        self.artifacts
            .lock()
            .unwrap()
            .get(artifact)
            .cloned()
            .ok_or_else(|| GraphError::not_found("artifact", artifact))
    }
}

/// Search service returning a fixed result list, or always failing.
#[derive(Default)]
pub struct ScriptedSearch {
    results: Vec<SearchResult>,
    fail: bool,
    pub queries: Mutex<Vec<(String, usize)>>,
}

impl ScriptedSearch {
    pub fn returning(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SearchService for ScriptedSearch {
    async fn search(&self, query: &str, result_count: usize) -> Result<Vec<SearchResult>, GraphError> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), result_count));
        if self.fail {
            return Err(GraphError::Search("search backend unavailable".into()));
        }
        Ok(self.results.iter().take(result_count).cloned().collect())
    }
}

/// Defaults with millisecond polling.
pub fn fast_config() -> InsightGraphConfig {
    InsightGraphConfig::default()
        .with_poll_interval(Duration::from_millis(1))
        .with_run_timeout(Duration::from_secs(5))
}

pub fn engine(
    reasoning: Arc<ScriptedReasoning>,
    search: Arc<ScriptedSearch>,
    config: InsightGraphConfig,
) -> (GraphBuilder, Arc<MemoryNodeStore>) {
    let store = Arc::new(MemoryNodeStore::new());
    let builder = GraphBuilder::new(reasoning, search, store.clone()).with_config(config);
    (builder, store)
}
