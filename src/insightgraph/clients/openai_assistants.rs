//! [`ReasoningService`] over the OpenAI Assistants v2 REST API.
//!
//! | Contract | Endpoint |
//! |----------|----------|
//! | `upload_dataset` | `POST /v1/files` (multipart, `purpose=assistants`) |
//! | `create_identity` | `POST /v1/assistants` with the `code_interpreter` tool |
//! | `create_context` | `POST /v1/threads` |
//! | `append_message` | `POST /v1/threads/{thread}/messages` |
//! | `create_run` | `POST /v1/threads/{thread}/runs` |
//! | `poll_run` | `GET /v1/threads/{thread}/runs/{run}` |
//! | `read_last_turn` | `GET /v1/threads/{thread}/messages?order=desc&limit=1` |
//! | `fetch_artifact` | `GET /v1/files/{file}/content` |
//!
//! # Example
//!
//! ```rust,no_run
//! use insightgraph::clients::openai_assistants::OpenAIAssistantsClient;
//! use insightgraph::reasoning::ReasoningService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), insightgraph::GraphError> {
//!     let client = OpenAIAssistantsClient::from_env("gpt-4o")?;
//!     let thread = client.create_context().await?;
//!     println!("thread: {}", thread);
//!     Ok(())
//! }
//! ```
//!
//! Requires `OPENAI_API_KEY` for [`OpenAIAssistantsClient::from_env`].

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::insightgraph::clients::http_pool::get_http_client;
use crate::insightgraph::error::GraphError;
use crate::insightgraph::reasoning::{
    ContentItem, ContextId, FileRef, IdentityId, ReasoningService, RunHandle, RunStatus,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Deserialize)]
struct IdObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<MessageObject>,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    #[serde(default)]
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MessageContent {
    Text { text: TextContent },
    ImageFile { image_file: ImageFile },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ImageFile {
    file_id: String,
}

/// Decode a message-list response into the content items of its newest turn.
///
/// Content types other than text and image files are skipped.
pub fn parse_last_turn(body: &str) -> Result<Vec<ContentItem>, GraphError> {
    let list: MessageList = serde_json::from_str(body)?;
    let Some(latest) = list.data.into_iter().next() else {
        return Ok(Vec::new());
    };
    Ok(latest
        .content
        .into_iter()
        .filter_map(|item| match item {
            MessageContent::Text { text } => Some(ContentItem::Text(text.value)),
            MessageContent::ImageFile { image_file } => Some(ContentItem::Artifact(image_file.file_id)),
            MessageContent::Unsupported => None,
        })
        .collect())
}

/// Decode a run object into its id and status.
pub fn parse_run(body: &str) -> Result<(String, RunStatus), GraphError> {
    let run: RunObject = serde_json::from_str(body)?;
    Ok((run.id, RunStatus::from_wire(&run.status)))
}

/// Reasoning service backed by OpenAI assistants and threads.
#[derive(Clone)]
pub struct OpenAIAssistantsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIAssistantsClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            http: get_http_client(DEFAULT_BASE_URL),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.to_string(),
        }
    }

    /// Read the key from `OPENAI_API_KEY`.
    pub fn from_env(model: &str) -> Result<Self, GraphError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| GraphError::Config("OPENAI_API_KEY is not set".into()))?;
        Ok(Self::new(&api_key, model))
    }

    /// Point the client at an OpenAI-compatible host.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        self.http = get_http_client(base_url);
        self.base_url = base_url.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<reqwest::Response, GraphError> {
        let response = request.send().await.map_err(|e| {
            log::error!("OpenAIAssistantsClient::{}: transport error: {}", action, e);
            GraphError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("OpenAIAssistantsClient::{}: HTTP {}: {}", action, status, body);
            return Err(GraphError::Service(format!("{} returned {}: {}", action, status, body)));
        }
        Ok(response)
    }

    async fn send_text(&self, request: RequestBuilder, action: &str) -> Result<String, GraphError> {
        Ok(self.send(request, action).await?.text().await?)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<T, GraphError> {
        let body = self.send_text(request, action).await?;
        serde_json::from_str(&body).map_err(|e| {
            log::error!("OpenAIAssistantsClient::{}: undecodable response: {}", action, e);
            GraphError::from(e)
        })
    }
}

#[async_trait]
impl ReasoningService for OpenAIAssistantsClient {
    async fn upload_dataset(&self, file_name: &str, bytes: Vec<u8>) -> Result<FileRef, GraphError> {
        let form = Form::new()
            .text("purpose", "assistants")
            .part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        let file: IdObject = self
            .send_json(self.request(Method::POST, "/v1/files").multipart(form), "upload_dataset")
            .await?;
        Ok(file.id)
    }

    async fn create_identity(
        &self,
        instructions: &str,
        file_refs: &[FileRef],
    ) -> Result<IdentityId, GraphError> {
        let body = json!({
            "model": self.model,
            "instructions": instructions,
            "tools": [{ "type": "code_interpreter" }],
            "tool_resources": { "code_interpreter": { "file_ids": file_refs } },
        });
        let assistant: IdObject = self
            .send_json(self.request(Method::POST, "/v1/assistants").json(&body), "create_identity")
            .await?;
        Ok(assistant.id)
    }

    async fn create_context(&self) -> Result<ContextId, GraphError> {
        let thread: IdObject = self
            .send_json(self.request(Method::POST, "/v1/threads").json(&json!({})), "create_context")
            .await?;
        Ok(thread.id)
    }

    async fn append_message(&self, context_id: &str, text: &str) -> Result<(), GraphError> {
        let path = format!("/v1/threads/{}/messages", context_id);
        let body = json!({ "role": "user", "content": text });
        self.send(self.request(Method::POST, &path).json(&body), "append_message")
            .await?;
        Ok(())
    }

    async fn create_run(&self, identity_id: &str, context_id: &str) -> Result<RunHandle, GraphError> {
        let path = format!("/v1/threads/{}/runs", context_id);
        let body = json!({ "assistant_id": identity_id });
        let text = self
            .send_text(self.request(Method::POST, &path).json(&body), "create_run")
            .await?;
        let (id, _) = parse_run(&text)?;
        Ok(RunHandle {
            id,
            context_id: context_id.to_string(),
        })
    }

    async fn poll_run(&self, run: &RunHandle) -> Result<RunStatus, GraphError> {
        let path = format!("/v1/threads/{}/runs/{}", run.context_id, run.id);
        let text = self
            .send_text(self.request(Method::GET, &path), "poll_run")
            .await?;
        let (_, status) = parse_run(&text)?;
        Ok(status)
    }

    async fn cancel_run(&self, run: &RunHandle) -> Result<(), GraphError> {
        let path = format!("/v1/threads/{}/runs/{}/cancel", run.context_id, run.id);
        self.send(self.request(Method::POST, &path), "cancel_run").await?;
        Ok(())
    }

    async fn read_last_turn(&self, context_id: &str) -> Result<Vec<ContentItem>, GraphError> {
        let path = format!("/v1/threads/{}/messages?order=desc&limit=1", context_id);
        let text = self
            .send_text(self.request(Method::GET, &path), "read_last_turn")
            .await?;
        parse_last_turn(&text)
    }

    async fn fetch_artifact(&self, artifact: &str) -> Result<Vec<u8>, GraphError> {
        let path = format!("/v1/files/{}/content", artifact);
        let response = self
            .send(self.request(Method::GET, &path), "fetch_artifact")
            .await?;
        Ok(response.bytes().await?.to_vec())
    }
}
