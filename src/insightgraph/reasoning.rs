//! The stateful reasoning-service seam.
//!
//! A reasoning service hosts *identities* (an instructed model with the
//! code-execution tool and the uploaded dataset attached) and *contexts*
//! (append-only message logs). A prompt is answered by appending a user
//! message to a context and starting a *run* of an identity against it; the
//! run is polled until it reaches a terminal [`RunStatus`], after which the
//! final turn of the context holds the answer.
//!
//! Appending and running are separate calls so that a failed run can be
//! retried without appending the prompt a second time.
//!
//! Implement [`ReasoningService`] to plug in a provider; the crate ships
//! [`OpenAIAssistantsClient`](crate::clients::openai_assistants::OpenAIAssistantsClient).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::insightgraph::error::GraphError;

/// Opaque id of an uploaded dataset file.
pub type FileRef = String;
/// Opaque id of a reasoning identity ("assistant").
pub type IdentityId = String;
/// Opaque id of a conversation context ("thread").
pub type ContextId = String;
/// Opaque id of a binary artifact produced during a run.
pub type ArtifactRef = String;

/// Handle on a started run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub id: String,
    pub context_id: ContextId,
}

/// Lifecycle states of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Incomplete,
    Expired,
    Completed,
}

impl RunStatus {
    /// `true` once the run will not change state any more.
    ///
    /// `RequiresAction` counts as terminal: the engine never submits tool
    /// outputs, so such a run cannot progress on its own.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling
        )
    }

    /// Map a provider status string; unknown values are treated as failures.
    ///
    /// ```
    /// use insightgraph::reasoning::RunStatus;
    ///
    /// assert_eq!(RunStatus::from_wire("in_progress"), RunStatus::InProgress);
    /// assert_eq!(RunStatus::from_wire("completed"), RunStatus::Completed);
    /// assert_eq!(RunStatus::from_wire("exploded"), RunStatus::Failed);
    /// ```
    pub fn from_wire(status: &str) -> Self {
        match status {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "requires_action" => RunStatus::RequiresAction,
            "cancelling" => RunStatus::Cancelling,
            "cancelled" => RunStatus::Cancelled,
            "incomplete" => RunStatus::Incomplete,
            "expired" => RunStatus::Expired,
            "completed" => RunStatus::Completed,
            _ => RunStatus::Failed,
        }
    }
}

/// One content item of a turn, in the order the service produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentItem {
    Text(String),
    Artifact(ArtifactRef),
}

/// Provider contract consumed by the conversation channel and the orchestrators.
///
/// All methods must be callable concurrently; the engine runs many branches
/// against one service, each on its own context.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Upload a dataset and return a reference identities can attach.
    async fn upload_dataset(&self, file_name: &str, bytes: Vec<u8>) -> Result<FileRef, GraphError>;

    /// Create an identity with the code-execution tool and the given files.
    async fn create_identity(
        &self,
        instructions: &str,
        file_refs: &[FileRef],
    ) -> Result<IdentityId, GraphError>;

    /// Create a new, empty conversation context.
    async fn create_context(&self) -> Result<ContextId, GraphError>;

    /// Append `text` to `context_id` as a user turn.
    async fn append_message(&self, context_id: &str, text: &str) -> Result<(), GraphError>;

    /// Start a run of `identity_id` against `context_id`.
    async fn create_run(&self, identity_id: &str, context_id: &str)
        -> Result<RunHandle, GraphError>;

    /// Current status of a run.
    async fn poll_run(&self, run: &RunHandle) -> Result<RunStatus, GraphError>;

    /// Ask the service to stop a run that is still active.
    ///
    /// A context accepts no new run while one is active, so an abandoned run
    /// must be cancelled before the next attempt.
    async fn cancel_run(&self, run: &RunHandle) -> Result<(), GraphError>;

    /// Content items of the last turn in the context.
    async fn read_last_turn(&self, context_id: &str) -> Result<Vec<ContentItem>, GraphError>;

    /// Materialise an artifact produced by a run.
    async fn fetch_artifact(&self, artifact: &str) -> Result<Vec<u8>, GraphError>;
}
