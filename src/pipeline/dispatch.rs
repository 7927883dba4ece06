//! Chunker/Dispatcher: fan chunks out to a bounded pool of blocking workers.
//!
//! ```text
//!  tasks ──chunk──▶ [c0][c1][c2]…      buffer_unordered(workers)
//!                     │   │   │        each chunk on spawn_blocking,
//!                     ▼   ▼   ▼        items sequential within the chunk
//!                  mpsc::Sender<ChunkReport>  (completion order)
//!                            │
//!                            ▼
//!                  Receiver closes ⇒ every chunk has reported
//! ```
//!
//! A chunk whose worker panics still reports: each of its tasks becomes an
//! [`ItemError::WorkerFailed`] failure. If the receiver is dropped the
//! dispatcher stops forwarding; chunks already running finish and their
//! buffers are dropped.

use crate::error::ItemError;
use crate::output::{ChunkReport, FailedImage, ImageTask, TransformResult};
use crate::pipeline::transform::Transformer;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Split `tasks` into contiguous chunks of at most `chunk_size` items.
pub fn chunk_tasks(tasks: Vec<ImageTask>, chunk_size: usize) -> Vec<Vec<ImageTask>> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(tasks.len().div_ceil(chunk_size));
    let mut iter = tasks.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(chunk_size).collect());
    }
    chunks
}

/// Number of chunks `total` tasks split into.
pub fn chunk_count(total: usize, chunk_size: usize) -> usize {
    total.div_ceil(chunk_size.max(1))
}

/// `min(max_workers, cpus, chunks)`, at least 1.
pub fn worker_count(max_workers: usize, chunks: usize) -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    max_workers.min(cpus).min(chunks).max(1)
}

/// A running dispatch: drain `reports` until it returns `None`.
pub struct Dispatch {
    pub reports: mpsc::Receiver<ChunkReport>,
    pub workers: usize,
    pub chunks: usize,
    handle: JoinHandle<()>,
}

impl Dispatch {
    /// Wait for the dispatcher task itself; call after `reports` is drained.
    pub async fn join(self) {
        drop(self.reports);
        if let Err(e) = self.handle.await {
            warn!("Dispatcher task ended abnormally: {}", e);
        }
    }
}

/// Start transforming `tasks` with `transformer`.
///
/// Must be called within a Tokio runtime.
pub fn dispatch(
    tasks: Vec<ImageTask>,
    transformer: Transformer,
    chunk_size: usize,
    max_workers: usize,
) -> Dispatch {
    let transformer = Arc::new(transformer);
    dispatch_with(tasks, chunk_size, max_workers, move |task| {
        transformer.transform(task)
    })
}

/// [`dispatch`] with an arbitrary per-item transform.
pub fn dispatch_with<F>(
    tasks: Vec<ImageTask>,
    chunk_size: usize,
    max_workers: usize,
    transform: F,
) -> Dispatch
where
    F: Fn(&ImageTask) -> TransformResult + Send + Sync + 'static,
{
    let chunks = chunk_tasks(tasks, chunk_size);
    let chunk_total = chunks.len();
    let workers = worker_count(max_workers, chunk_total);
    let (tx, rx) = mpsc::channel(workers);
    let transform = Arc::new(transform);

    debug!(
        "Dispatching {} chunks (size ≤ {}) to {} workers",
        chunk_total, chunk_size, workers
    );

    let handle = tokio::spawn(async move {
        let mut in_flight = stream::iter(chunks.into_iter().map(|chunk| {
            let transform = Arc::clone(&transform);
            run_chunk(chunk, transform)
        }))
        .buffer_unordered(workers);

        while let Some(report) = in_flight.next().await {
            if tx.send(report).await.is_err() {
                debug!("Report receiver dropped; stopping dispatch");
                break;
            }
        }
    });

    Dispatch {
        reports: rx,
        workers,
        chunks: chunk_total,
        handle,
    }
}

async fn run_chunk<F>(chunk: Vec<ImageTask>, transform: Arc<F>) -> ChunkReport
where
    F: Fn(&ImageTask) -> TransformResult + Send + Sync + 'static,
{
    let roster: Vec<ImageTask> = chunk.clone();
    let joined = tokio::task::spawn_blocking(move || {
        chunk.iter().map(|task| (*transform)(task)).collect::<ChunkReport>()
    })
    .await;

    match joined {
        Ok(report) => report,
        Err(e) => {
            let detail = if e.is_panic() {
                "worker panicked".to_string()
            } else {
                e.to_string()
            };
            warn!(
                "Chunk starting at index {} failed: {}",
                roster.first().map(|t| t.index).unwrap_or_default(),
                detail
            );
            roster
                .into_iter()
                .map(|task| {
                    TransformResult::Failure(FailedImage::new(
                        task.index,
                        ItemError::WorkerFailed {
                            path: task.path,
                            detail: detail.clone(),
                        },
                    ))
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{SourceFormat, TransformedImage};
    use std::path::PathBuf;
    use std::time::Duration;

    fn tasks(n: usize) -> Vec<ImageTask> {
        (0..n)
            .map(|index| ImageTask {
                index,
                path: PathBuf::from(format!("img{index}.png")),
            })
            .collect()
    }

    fn ok(task: &ImageTask) -> TransformResult {
        TransformResult::Success(TransformedImage {
            index: task.index,
            path: task.path.clone(),
            payload: vec![task.index as u8],
            width_pt: 1.0,
            height_pt: 1.0,
            pixel_width: 1,
            pixel_height: 1,
            was_converted: true,
            source_format: SourceFormat::Png,
        })
    }

    async fn drain(mut d: Dispatch) -> Vec<ChunkReport> {
        let mut out = Vec::new();
        while let Some(r) = d.reports.recv().await {
            out.push(r);
        }
        d.join().await;
        out
    }

    #[test]
    fn chunks_are_contiguous_and_bounded() {
        let chunks = chunk_tasks(tasks(12), 5);
        let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![5, 5, 2]);
        assert_eq!(chunks[1][0].index, 5);
        assert_eq!(chunks[2][1].index, 11);
        assert_eq!(chunk_count(12, 5), 3);
        assert!(chunk_tasks(vec![], 5).is_empty());
        assert_eq!(chunk_tasks(tasks(3), 0).len(), 3);
    }

    #[test]
    fn worker_count_is_bounded_by_chunks() {
        assert_eq!(worker_count(10, 1), 1);
        assert_eq!(worker_count(1, 50), 1);
        assert_eq!(worker_count(0, 0), 1);
        assert!(worker_count(64, 64) <= 64);
    }

    #[tokio::test]
    async fn every_task_reports_once() {
        let d = dispatch_with(tasks(23), 4, 3, ok);
        assert_eq!(d.chunks, 6);
        let reports = drain(d).await;
        assert_eq!(reports.len(), 6);
        let mut seen: Vec<usize> = reports.iter().flatten().map(|r| r.index()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reports_arrive_in_completion_order() {
        // Chunk 0 is slow, so it should not be first when workers > 1.
        let d = dispatch_with(tasks(4), 1, 4, |task| {
            if task.index == 0 {
                std::thread::sleep(Duration::from_millis(200));
            }
            ok(task)
        });
        if d.workers < 2 {
            return;
        }
        let reports = drain(d).await;
        assert_eq!(reports.len(), 4);
        assert_ne!(reports[0][0].index(), 0);
    }

    #[tokio::test]
    async fn panicking_chunk_becomes_worker_failures() {
        let d = dispatch_with(tasks(6), 3, 2, |task| {
            if task.index == 4 {
                panic!("boom");
            }
            ok(task)
        });
        let reports = drain(d).await;
        let all: Vec<&TransformResult> = reports.iter().flatten().collect();
        assert_eq!(all.len(), 6);
        for r in &all {
            match r {
                TransformResult::Failure(f) => {
                    assert!((3..6).contains(&f.index));
                    assert!(matches!(f.error, ItemError::WorkerFailed { .. }));
                }
                TransformResult::Success(t) => assert!(t.index < 3),
            }
        }
    }

    #[tokio::test]
    async fn dropping_receiver_stops_dispatch() {
        let d = dispatch_with(tasks(20), 1, 1, ok);
        let Dispatch { reports, handle, .. } = d;
        drop(reports);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("dispatcher should stop")
            .expect("dispatcher should not panic");
    }
}
