// THEORY:
// The engine itself is single-threaded. Throughput across many frames comes
// from running independent detector calls side by side, each with its own
// scratch memory, which is all the engine needs to be safe in parallel.
//
// `WorkerPool` is a small actor system on tokio:
// 1.  Callers send `FrameTask`s to one dispatcher over an unbounded channel.
// 2.  The dispatcher hands tasks to workers round-robin, one channel each.
// 3.  A worker runs the synchronous detector under `spawn_blocking` so the
//     async runtime's threads are never held by pixel work, then answers on
//     the task's `oneshot` channel.
// 4.  Dropping the pool's sender (see `shutdown`) drains the dispatcher, which
//     drops the worker channels, which stops the workers.
//
// A panic inside the detector is caught by `spawn_blocking`, shipped back with
// the reply and resumed in the caller that submitted the frame.

use std::any::Any;
use std::panic;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::future::join_all;
use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::core_modules::blob::Blob;
use crate::core_modules::error::{BlobError, Result};
use crate::core_modules::image_view::FrameBuffer;
use crate::pipeline::BlobPipeline;

type Reply = std::result::Result<Result<Vec<Blob>>, Box<dyn Any + Send + 'static>>;

/// Detector output for one submitted frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// Submission order, starting at 0.
    pub frame_id: u64,
    pub blobs: Vec<Blob>,
    /// Wall time spent inside the detector.
    pub elapsed: Duration,
}

pub struct FrameTask {
    pub frame_id: u64,
    pub frame: FrameBuffer,
    pub result_sender: oneshot::Sender<(Reply, Duration)>,
}

pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<FrameTask>,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    next_frame_id: AtomicU64,
}

impl WorkerPool {
    /// One worker per logical CPU. Must be called inside a tokio runtime.
    pub fn new(pipeline: BlobPipeline) -> Self {
        Self::with_workers(pipeline, num_cpus::get())
    }

    pub fn with_workers(pipeline: BlobPipeline, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let pipeline = Arc::new(pipeline);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<FrameTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<FrameTask>())
            .unzip();

        let dispatcher = tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                if worker_senders[worker_idx].send(task).is_err() {
                    warn!("worker {worker_idx} is gone; dropping its task");
                }
                worker_idx = (worker_idx + 1) % worker_count;
            }
        });

        let workers = worker_receivers
            .into_iter()
            .enumerate()
            .map(|(worker_idx, mut worker_receiver)| {
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move {
                    while let Some(task) = worker_receiver.recv().await {
                        let reply = Self::run_task(&pipeline, task.frame).await;
                        debug!(
                            "worker {worker_idx} finished frame {} in {:?}",
                            task.frame_id, reply.1
                        );
                        // The caller may have stopped waiting.
                        let _ = task.result_sender.send(reply);
                    }
                })
            })
            .collect();

        debug!("worker pool started with {worker_count} worker(s)");
        Self {
            task_sender,
            dispatcher,
            workers,
            next_frame_id: AtomicU64::new(0),
        }
    }

    async fn run_task(pipeline: &Arc<BlobPipeline>, frame: FrameBuffer) -> (Reply, Duration) {
        let pipeline = Arc::clone(pipeline);
        let started = Instant::now();
        let joined = tokio::task::spawn_blocking(move || pipeline.process_frame(&frame)).await;
        let reply = match joined {
            Ok(result) => Ok(result),
            Err(err) if err.is_panic() => Err(err.into_panic()),
            Err(err) => Err(Box::new(err.to_string()) as Box<dyn Any + Send>),
        };
        (reply, started.elapsed())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Runs the detector on `frame` on some worker.
    pub async fn process_frame(&self, frame: FrameBuffer) -> Result<FrameReport> {
        let frame_id = self.next_frame_id.fetch_add(1, Ordering::Relaxed);
        let (result_sender, result_receiver) = oneshot::channel();

        self.task_sender
            .send(FrameTask {
                frame_id,
                frame,
                result_sender,
            })
            .map_err(|_| BlobError::PoolClosed)?;

        let (reply, elapsed) = result_receiver.await.map_err(|_| BlobError::PoolClosed)?;
        match reply {
            Ok(blobs) => Ok(FrameReport {
                frame_id,
                blobs: blobs?,
                elapsed,
            }),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Runs every frame concurrently. Results come back in input order.
    pub async fn process_batch(&self, frames: Vec<FrameBuffer>) -> Vec<Result<FrameReport>> {
        join_all(frames.into_iter().map(|frame| self.process_frame(frame))).await
    }

    /// Stops accepting frames and waits for in-flight work to finish.
    pub async fn shutdown(self) {
        let Self {
            task_sender,
            dispatcher,
            workers,
            ..
        } = self;
        drop(task_sender);

        if let Err(err) = dispatcher.await {
            warn!("dispatcher ended abnormally: {err}");
        }
        for result in join_all(workers).await {
            if let Err(err) = result {
                warn!("worker ended abnormally: {err}");
            }
        }
        debug!("worker pool shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::geometry::Rect;
    use crate::core_modules::threshold::Threshold;
    use crate::pipeline::BlobConfig;

    fn squares(count: usize) -> FrameBuffer {
        // `count` separate 2x2 squares along the top rows.
        FrameBuffer::binary_from_fn(4 * count, 4, |x, y| y < 2 && x % 4 < 2)
    }

    #[tokio::test]
    async fn batch_results_keep_input_order() {
        let pipeline = BlobPipeline::new(BlobConfig::default(), vec![Threshold::binary()]).unwrap();
        let pool = WorkerPool::with_workers(pipeline, 3);
        assert_eq!(pool.worker_count(), 3);

        let frames = (1..=6).map(squares).collect();
        let reports = pool.process_batch(frames).await;

        for (i, report) in reports.into_iter().enumerate() {
            let report = report.unwrap();
            assert_eq!(report.frame_id, i as u64);
            assert_eq!(report.blobs.len(), i + 1);
        }
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn detector_errors_reach_the_caller() {
        let config = BlobConfig {
            roi: Some(Rect::new(100, 100, 5, 5)),
            ..BlobConfig::default()
        };
        let pipeline = BlobPipeline::new(config, vec![Threshold::binary()]).unwrap();
        let pool = WorkerPool::with_workers(pipeline, 1);

        let err = pool.process_frame(squares(1)).await.unwrap_err();
        assert!(matches!(err, BlobError::InvalidRegion { .. }));

        // The single worker keeps serving after a failed frame.
        let err = pool.process_frame(squares(2)).await.unwrap_err();
        assert!(matches!(err, BlobError::InvalidRegion { .. }));

        pool.shutdown().await;
    }
}
