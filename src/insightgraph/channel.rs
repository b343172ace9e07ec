//! Conversation channels and the reply-wait retry loop.
//!
//! A [`ConversationChannel`] is an explicit `(identity, context)` pair. It is
//! a plain value: branches each hold their own channel and share nothing
//! else, so the same [`ReasoningService`] can serve any number of branches
//! concurrently.
//!
//! [`ConversationChannel::send_and_await`] appends a prompt once and then runs
//! the identity against the context, polling until the run finishes. A run
//! that ends in any state other than `completed` (or that outlives
//! `run_timeout`, or whose start/poll call errors) is retried, reusing the
//! already-appended prompt, until `retry_limit` runs have been attempted.
//! Runs that may still hold the context (timed out, or stopped at
//! `requires_action`) are cancelled before the next attempt.
//!
//! ```text
//! append_message(prompt)            (once)
//! ├─ attempt 1: create_run → poll … poll → failed
//! ├─ attempt 2: create_run → poll … (timeout) → cancel_run
//! ├─ attempt 3: create_run → poll … poll → completed
//! └─ read_last_turn → fetch_artifact* → Reply { text_segments, artifacts }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::insightgraph::error::GraphError;
use crate::insightgraph::reasoning::{
    ContentItem, ContextId, IdentityId, ReasoningService, RunHandle, RunStatus,
};

/// Bounds applied by the reply-wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Runs attempted before giving up.
    pub max_attempts: usize,
    /// Wait between polls of one run.
    pub poll_interval: Duration,
    /// A run still unfinished after this long is cancelled and counts as a
    /// failed attempt.
    pub run_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            poll_interval: Duration::from_secs(1),
            run_timeout: Duration::from_secs(600),
        }
    }
}

/// The final turn of a context after a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Text items, in the order the service produced them.
    pub text_segments: Vec<String>,
    /// Artifact bytes (typically rendered charts), in production order.
    pub artifacts: Vec<Vec<u8>>,
}

impl Reply {
    /// The first text segment, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.text_segments.first().map(String::as_str)
    }

    /// All text segments joined with newlines.
    pub fn joined_text(&self) -> String {
        self.text_segments.join("\n")
    }
}

/// An `(identity, context)` pair through which prompts flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationChannel {
    pub identity_id: IdentityId,
    pub context_id: ContextId,
}

impl ConversationChannel {
    pub fn new(identity_id: impl Into<IdentityId>, context_id: impl Into<ContextId>) -> Self {
        Self {
            identity_id: identity_id.into(),
            context_id: context_id.into(),
        }
    }

    /// Open a channel on a brand-new context of `service`.
    pub async fn open(
        service: &dyn ReasoningService,
        identity_id: impl Into<IdentityId>,
    ) -> Result<Self, GraphError> {
        let context_id = service.create_context().await?;
        Ok(Self::new(identity_id, context_id))
    }

    /// Send `prompt` and wait for the service's reply.
    ///
    /// # Errors
    ///
    /// - [`GraphError::ServiceExhausted`] when `policy.max_attempts` runs were
    ///   made without one completing. The error carries `prompt`.
    /// - Any error from appending the prompt or reading the final turn.
    ///
    /// Artifacts that cannot be fetched are logged and skipped; they never fail
    /// the reply.
    pub async fn send_and_await(
        &self,
        service: &dyn ReasoningService,
        prompt: &str,
        policy: &RetryPolicy,
    ) -> Result<Reply, GraphError> {
        service.append_message(&self.context_id, prompt).await?;

        let mut attempts = 0;
        while attempts < policy.max_attempts {
            attempts += 1;
            match self.run_once(service, policy).await {
                Ok(RunStatus::Completed) => {
                    return self.collect_reply(service).await;
                }
                Ok(status) => {
                    log::warn!(
                        "Run on context {} ended as {:?} (attempt {}/{})",
                        self.context_id,
                        status,
                        attempts,
                        policy.max_attempts
                    );
                }
                Err(e) => {
                    log::warn!(
                        "Run on context {} failed (attempt {}/{}): {}",
                        self.context_id,
                        attempts,
                        policy.max_attempts,
                        e
                    );
                }
            }
        }

        Err(GraphError::ServiceExhausted {
            prompt: prompt.to_string(),
            attempts,
        })
    }

    /// Start one run and poll it to a terminal state.
    ///
    /// A timeout is reported as `Expired`. Timed-out runs and runs waiting on
    /// `RequiresAction` are cancelled so the context is free for a retry.
    async fn run_once(
        &self,
        service: &dyn ReasoningService,
        policy: &RetryPolicy,
    ) -> Result<RunStatus, GraphError> {
        let run = service
            .create_run(&self.identity_id, &self.context_id)
            .await?;

        let status =
            match tokio::time::timeout(policy.run_timeout, poll_to_end(service, &run, policy)).await {
                Ok(status) => status?,
                Err(_) => RunStatus::Expired,
            };

        if matches!(status, RunStatus::Expired | RunStatus::RequiresAction) {
            if let Err(e) = service.cancel_run(&run).await {
                log::warn!("Could not cancel run {} on context {}: {}", run.id, self.context_id, e);
            }
        }
        Ok(status)
    }

    async fn collect_reply(&self, service: &dyn ReasoningService) -> Result<Reply, GraphError> {
        let items = service.read_last_turn(&self.context_id).await?;
        let mut reply = Reply::default();
        for item in items {
            match item {
                ContentItem::Text(text) => reply.text_segments.push(text),
                ContentItem::Artifact(reference) => match service.fetch_artifact(&reference).await
                {
                    Ok(bytes) => reply.artifacts.push(bytes),
                    Err(e) => {
                        log::warn!("Skipping artifact {}: {}", reference, e);
                    }
                },
            }
        }
        Ok(reply)
    }
}

async fn poll_to_end(
    service: &dyn ReasoningService,
    run: &RunHandle,
    policy: &RetryPolicy,
) -> Result<RunStatus, GraphError> {
    loop {
        let status = service.poll_run(run).await?;
        if status.is_terminal() {
            return Ok(status);
        }
        tokio::time::sleep(policy.poll_interval).await;
    }
}

/// Per-context async locks.
///
/// A context accepts one run at a time, so operations that continue an
/// existing context (level-1.5, the level-2 query step) take its lock for the
/// duration of their exchange. Fresh per-branch contexts never need it.
#[derive(Debug, Default, Clone)]
pub struct ContextLocks {
    locks: Arc<Mutex<HashMap<ContextId, Arc<AsyncMutex<()>>>>>,
}

impl ContextLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `context_id`.
    pub async fn acquire(&self, context_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            // Drop entries nobody is holding or waiting on.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks
                .entry(context_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
