//! Bounded worker pool for crawl tasks
//!
//! Tasks are admitted strictly in submission order: a semaphore permit is
//! acquired before each spawn, so no more than the configured limit is ever
//! in flight and admission is FIFO. The pool waits for every task to finish
//! before returning; per-task failures are handled inside the tasks
//! themselves and never abort siblings.

use crate::MinerError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Launches crawl tasks with a cap on simultaneous execution
pub struct WorkerPool {
    limit: usize,
}

impl WorkerPool {
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit as usize,
        }
    }

    /// Runs all tasks, at most `limit` concurrently, and waits for all of
    /// them to complete
    pub async fn run<F>(&self, tasks: Vec<F>) -> crate::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| MinerError::TaskJoin(e.to_string()))?;

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                task.await;
            }));
        }

        for handle in handles {
            handle
                .await
                .map_err(|e| MinerError::TaskJoin(e.to_string()))?;
        }

        Ok(())
    }
}
