//! Bounded, index-preserving worker pool.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Run `worker` over an ordered sequence with fixed parallelism.
///
/// Results come back indexed by input position regardless of completion
/// order. Workers are expected to convert their own failures into sentinel
/// values; the pool does not re-enqueue or cancel.
pub async fn run_indexed<I, T, F, Fut>(items: Vec<I>, concurrency: usize, worker: F) -> Vec<T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I, usize) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let total = items.len();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut join_set = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let worker = worker.clone();
        join_set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("pool semaphore closed");
            (index, worker(item, index).await)
        });
    }

    let mut results: Vec<Option<T>> = (0..total).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        let (index, value) = joined.expect("pool worker panicked");
        results[index] = Some(value);
    }

    results
        .into_iter()
        .map(|slot| slot.expect("pool lost a result slot"))
        .collect()
}
