//! Bounded-concurrency batch dispatch with preserved ordering.
//!
//! Fans a sequence of operations out over at most `max_concurrent` workers
//! and returns results in input order by position index, regardless of
//! completion order. Each slot carries its own `Result`: one request's
//! failure never cancels its siblings, and the dispatcher always completes
//! the whole batch.

use crate::error::{GatewayError, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Dispatches batches with a fixed concurrency bound.
#[derive(Debug, Clone, Copy)]
pub struct BatchDispatcher {
    max_concurrent: usize,
}

impl BatchDispatcher {
    /// Create a dispatcher running at most `max_concurrent` operations at
    /// once. Zero is rejected.
    pub fn new(max_concurrent: usize) -> Result<Self> {
        if max_concurrent == 0 {
            return Err(GatewayError::Config(
                "max_concurrent must be greater than 0".to_string(),
            ));
        }
        Ok(Self { max_concurrent })
    }

    /// The concurrency bound.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run `run` over every item with bounded concurrency; results come back
    /// in input order.
    pub async fn dispatch<T, R, F, Fut>(&self, items: Vec<T>, run: F) -> Vec<Result<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<R>> + Send + 'static,
    {
        self.dispatch_with_cancellation(items, CancellationToken::new(), run)
            .await
    }

    /// Like [`dispatch`](Self::dispatch), with cooperative batch-level
    /// cancellation.
    ///
    /// Once `token` is cancelled, no further operation starts; in-flight
    /// operations are cancelled at their next suspension point. Slots whose
    /// operation never ran (or was cut short) report
    /// [`GatewayError::Cancelled`]; slots that already completed keep their
    /// results.
    pub async fn dispatch_with_cancellation<T, R, F, Fut>(
        &self,
        items: Vec<T>,
        token: CancellationToken,
        run: F,
    ) -> Vec<Result<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<R>> + Send + 'static,
    {
        let run = Arc::new(run);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let total = items.len();
        let mut workers = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let token = token.clone();
            let run = run.clone();
            workers.spawn(async move {
                let _permit = tokio::select! {
                    _ = token.cancelled() => return (index, Err(GatewayError::Cancelled)),
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return (index, Err(GatewayError::Cancelled)),
                    },
                };

                tokio::select! {
                    _ = token.cancelled() => (index, Err(GatewayError::Cancelled)),
                    result = run(item) => (index, result),
                }
            });
        }

        // Restore caller-visible ordering by position index, not by
        // completion order.
        let mut results: Vec<Option<Result<R>>> = (0..total).map(|_| None).collect();
        while let Some(joined) = workers.join_next().await {
            if let Ok((index, result)) = joined {
                results[index] = Some(result);
            }
        }

        // A worker that panicked never reported; its slot reads as cancelled.
        results
            .into_iter()
            .map(|slot| slot.unwrap_or(Err(GatewayError::Cancelled)))
            .collect()
    }
}
