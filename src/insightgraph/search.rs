//! External web-search seam used by level-2 expansion.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::insightgraph::error::GraphError;

/// One hit returned by a [`SearchService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    /// Service-generated summary of the page, when one was produced.
    pub summary: Option<String>,
}

impl SearchResult {
    pub fn new(title: impl Into<String>, url: impl Into<String>, summary: Option<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            summary,
        }
    }

    /// Markdown link to the result, used as the head of a level-2 node's text.
    ///
    /// ```
    /// use insightgraph::SearchResult;
    ///
    /// let r = SearchResult::new("A study", "https://example.org/a", None);
    /// assert_eq!(r.markdown_link(), "[A study](https://example.org/a)");
    /// ```
    pub fn markdown_link(&self) -> String {
        format!("[{}]({})", self.title, self.url)
    }
}

/// A web-search backend returning titled, summarised results.
///
/// Implementations return results in relevance order and at most
/// `result_count` of them.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, query: &str, result_count: usize)
        -> Result<Vec<SearchResult>, GraphError>;
}
