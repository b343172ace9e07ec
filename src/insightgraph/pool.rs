//! Bounded worker pool for branch fan-out.
//!
//! Every branch runs as its own `tokio` task; a semaphore caps how many run
//! at once. The pool is joined before [`run_branches`] returns, and a branch
//! that errors or panics only marks its own slot as failed.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;

use crate::insightgraph::error::GraphError;

/// Run `branch(index, item)` for every item, at most `max_workers` at a time.
///
/// Results come back in input order regardless of completion order.
///
/// ```rust
/// use insightgraph::pool::run_branches;
/// use insightgraph::GraphError;
///
/// # #[tokio::main]
/// # async fn main() {
/// let outcomes = run_branches(vec![1, 2, 3], 2, |_, n| async move {
///     if n == 2 {
///         Err(GraphError::Parse("bad".into()))
///     } else {
///         Ok(n * 10)
///     }
/// })
/// .await;
///
/// assert_eq!(outcomes[0], Ok(10));
/// assert!(outcomes[1].is_err());
/// assert_eq!(outcomes[2], Ok(30));
/// # }
/// ```
pub async fn run_branches<T, R, F, Fut>(
    items: Vec<T>,
    max_workers: usize,
    branch: F,
) -> Vec<Result<R, GraphError>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = Result<R, GraphError>> + Send + 'static,
{
    let permits = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut tasks = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        let permits = permits.clone();
        let work = branch(index, item);
        tasks.push(tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| GraphError::BranchPanicked(format!("worker pool closed: {}", e)))?;
            work.await
        }));
    }

    join_all(tasks)
        .await
        .into_iter()
        .map(|joined| match joined {
            Ok(result) => result,
            Err(e) => Err(GraphError::BranchPanicked(format!("Task join error: {}", e))),
        })
        .collect()
}
