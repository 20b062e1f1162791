//! Fan-out helper that waits for every task and reports each outcome.
//!
//! Unlike `try_join_all`, a failing task never cancels its siblings: every
//! input key comes back exactly once, paired with either the task's value or
//! the reason it did not produce one.

use std::collections::HashMap;
use std::future::Future;
use tokio::task::JoinSet;

/// Why a settled task did not produce a value.
#[derive(thiserror::Error, Debug)]
pub enum TaskError<E> {
    #[error("{0}")]
    Failed(E),
    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Spawns `task(key)` for every key and waits for all of them.
///
/// Results are returned in completion order, one per key.
pub async fn settle_all<K, T, E, F, Fut>(
    keys: impl IntoIterator<Item = K>,
    task: F,
) -> Vec<(K, Result<T, TaskError<E>>)>
where
    K: Clone + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let mut join_set = JoinSet::new();
    let mut task_keys = HashMap::new();

    for key in keys {
        let fut = task(key.clone());
        let abort_handle = join_set.spawn(fut);
        task_keys.insert(abort_handle.id(), key);
    }

    let mut results = Vec::with_capacity(task_keys.len());

    while let Some(join_result) = join_set.join_next_with_id().await {
        match join_result {
            Ok((id, outcome)) => {
                if let Some(key) = task_keys.remove(&id) {
                    results.push((key, outcome.map_err(TaskError::Failed)));
                }
            }
            Err(e) => {
                tracing::error!("Task panicked: {e}");
                if let Some(key) = task_keys.remove(&e.id()) {
                    results.push((key, Err(TaskError::Panicked(e.to_string()))));
                }
            }
        }
    }

    results
}

/// Splits settled outcomes into successes and failures.
pub fn partition<K, T, E>(
    settled: Vec<(K, Result<T, TaskError<E>>)>,
) -> (Vec<(K, T)>, Vec<(K, TaskError<E>)>) {
    let mut ok = Vec::new();
    let mut failed = Vec::new();
    for (key, outcome) in settled {
        match outcome {
            Ok(value) => ok.push((key, value)),
            Err(e) => failed.push((key, e)),
        }
    }
    (ok, failed)
}
