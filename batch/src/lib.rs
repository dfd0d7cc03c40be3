//! Batch Executor (C4)
//!
//! Bounded-concurrency fan-out of identical-shape tasks. Given a list of
//! tasks and an async `task -> Result<R, PipelineError>` function, runs
//! up to `max_parallel` simultaneously, preserves input-index ordering
//! in the merged result regardless of completion order, and never lets
//! one task's failure cancel its siblings.
//!
//! Grounded in the fan-out shape used by agentic orchestrators in the
//! wild: a `Semaphore`-gated `tokio::spawn` per task, `JoinHandle`s
//! collected and re-sorted by the index they were spawned with.

use scenepipe_core::PipelineError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

/// Result of running a batch: successes keep their input index, errors
/// carry the index of the task that failed so callers can reassociate
/// them without losing position.
pub struct BatchOutcome<R> {
    pub results: Vec<Option<R>>,
    pub errors: Vec<(usize, PipelineError)>,
}

impl<R> BatchOutcome<R> {
    pub fn successes(&self) -> impl Iterator<Item = &R> {
        self.results.iter().filter_map(|r| r.as_ref())
    }
}

/// Runs `make_task(item, index)` for every item in `items`, at most
/// `max_parallel` concurrently. Cancellation of one task never cancels
/// its siblings: each is spawned on its own `tokio::spawn`, and a
/// panicked/join-failed task is recorded as an error, not propagated.
pub async fn run_batch<T, R, F, Fut>(
    items: Vec<T>,
    max_parallel: usize,
    make_task: F,
) -> BatchOutcome<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, PipelineError>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let make_task = Arc::new(make_task);
    let mut handles = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        let sem = Arc::clone(&semaphore);
        let make_task = Arc::clone(&make_task);
        let handle = tokio::spawn(async move {
            let _permit = sem
                .acquire()
                .await
                .expect("batch semaphore is never closed while tasks are in flight");
            let result = make_task(item, index).await;
            (index, result)
        });
        handles.push(handle);
    }

    let mut results: Vec<Option<R>> = Vec::new();
    let mut errors = Vec::new();

    for handle in handles {
        match handle.await {
            Ok((index, Ok(value))) => {
                ensure_len(&mut results, index + 1);
                results[index] = Some(value);
            }
            Ok((index, Err(err))) => {
                warn!(index, %err, "batch task failed");
                ensure_len(&mut results, index + 1);
                errors.push((index, err));
            }
            Err(join_err) => {
                warn!(%join_err, "batch task panicked or was aborted");
                errors.push((
                    usize::MAX,
                    PipelineError::UnrecoverableApi(format!("task join error: {join_err}")),
                ));
            }
        }
    }

    errors.sort_by_key(|(index, _)| *index);
    BatchOutcome { results, errors }
}

fn ensure_len<R>(results: &mut Vec<Option<R>>, len: usize) {
    while results.len() < len {
        results.push(None);
    }
}
