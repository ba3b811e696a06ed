//! Read-only query worker pool.
//!
//! N = min(5, cpus − 1) workers, each owning an independent read-only
//! store connection. Queries arrive as typed [`QueryRequest`] messages
//! over bounded channels (round-robin across workers); replies carry
//! the typed result or error plus the worker-side duration. Workers
//! never touch the memory index.

use super::{store_path, QueryRequest, QueryResponse};
use crate::error::{Result, ServiceError, StoreResult};
use crate::store::Store;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

/// Upper bound on pool size.
const MAX_WORKERS: usize = 5;
/// Queued jobs per worker before senders wait.
const QUEUE_DEPTH: usize = 64;

/// A worker's answer: typed result or error, plus how long it took.
pub struct WorkerReply {
    pub result: Result<QueryResponse>,
    pub duration: Duration,
}

struct Job {
    request: QueryRequest,
    reply: oneshot::Sender<WorkerReply>,
}

pub struct WorkerPool {
    senders: Vec<mpsc::Sender<Job>>,
    next: AtomicUsize,
}

impl WorkerPool {
    /// Spawns the pool. Returns `None` for stores without a backing
    /// file (in-memory tests), which cannot hand out read-only
    /// handles.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if a read-only handle cannot be opened.
    pub fn spawn(store: &Store) -> StoreResult<Option<Self>> {
        let cpus = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(2);
        let count = cpus.saturating_sub(1).clamp(1, MAX_WORKERS);

        let mut senders = Vec::with_capacity(count);
        for worker_id in 0..count {
            let Some(handle) = store.read_only()? else {
                return Ok(None);
            };
            let (tx, mut rx) = mpsc::channel::<Job>(QUEUE_DEPTH);
            std::thread::Builder::new()
                .name(format!("query-worker-{worker_id}"))
                .spawn(move || {
                    while let Some(job) = rx.blocking_recv() {
                        let start = Instant::now();
                        let result = store_path::execute(handle.conn(), &job.request);
                        let reply = WorkerReply {
                            result,
                            duration: start.elapsed(),
                        };
                        // A dropped receiver means the caller went away
                        let _ = job.reply.send(reply);
                    }
                })
                .map_err(|e| {
                    crate::error::StoreError::Migration(format!("worker spawn failed: {e}"))
                })?;
            senders.push(tx);
        }

        Ok(Some(Self {
            senders,
            next: AtomicUsize::new(0),
        }))
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    /// Sends a query to the next worker and awaits its reply.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Internal` when the pool is shut down.
    pub async fn execute(&self, request: QueryRequest) -> Result<WorkerReply> {
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        let (tx, rx) = oneshot::channel();

        self.senders[slot]
            .send(Job {
                request,
                reply: tx,
            })
            .await
            .map_err(|_| ServiceError::Internal("worker pool shut down".to_string()))?;

        rx.await
            .map_err(|_| ServiceError::Internal("worker dropped reply".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FindTypeArgs;
    use crate::types::{Language, NewType, TypeKind};

    fn disk_store(dir: &tempfile::TempDir) -> Store {
        let store = Store::open(&dir.path().join("index.db")).unwrap();
        let file_id = store
            .upsert_file("/g/Actor.h", "Game", "m", 1, Language::Cpp, None)
            .unwrap();
        store
            .insert_types(
                file_id,
                &[NewType {
                    name: "AActor".into(),
                    kind: TypeKind::Class,
                    parent: None,
                    line: 1,
                }],
            )
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_pool_answers_queries() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = disk_store(&dir);
        let pool = WorkerPool::spawn(&store).unwrap().unwrap();
        assert!(pool.worker_count() >= 1);

        let reply = pool
            .execute(QueryRequest::FindType(FindTypeArgs {
                name: "AActor".into(),
                fuzzy: false,
                project: None,
                language: None,
                kind: None,
                max_results: 10,
                include_assets: false,
                context_lines: 0,
            }))
            .await
            .unwrap();

        let QueryResponse::Types(types) = reply.result.unwrap() else {
            panic!("expected types");
        };
        assert_eq!(types.results.len(), 1);
        assert!(reply.duration.as_secs() < 5);
    }

    #[tokio::test]
    async fn test_pool_unavailable_for_memory_store() {
        let store = Store::in_memory().unwrap();
        assert!(WorkerPool::spawn(&store).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_queries_round_robin() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = disk_store(&dir);
        let pool = std::sync::Arc::new(WorkerPool::spawn(&store).unwrap().unwrap());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = std::sync::Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                pool.execute(QueryRequest::FindType(FindTypeArgs {
                    name: "AActor".into(),
                    fuzzy: false,
                    project: None,
                    language: None,
                    kind: None,
                    max_results: 10,
                    include_assets: false,
                    context_lines: 0,
                }))
                .await
            }));
        }
        for handle in handles {
            let reply = handle.await.unwrap().unwrap();
            assert!(reply.result.is_ok());
        }
    }
}
