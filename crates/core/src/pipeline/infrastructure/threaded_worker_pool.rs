use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use thiserror::Error;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoolError {
    #[error("all workers are busy and the queue is full")]
    Saturated,
    #[error("worker pool is shut down")]
    ShutDown,
}

/// Fixed set of named OS threads fed from a bounded job queue.
///
/// Layout: `submit → [bounded queue] → detect-worker-0..N`
///
/// `submit` never blocks, so it is safe to call from an async handler. A
/// panicking job is contained to that job; the worker keeps serving.
pub struct ThreadedWorkerPool {
    sender: RwLock<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl ThreadedWorkerPool {
    /// Spawns `threads` workers sharing a queue of `queue_capacity` pending
    /// jobs. Both are clamped to at least 1.
    pub fn new(threads: usize, queue_capacity: usize) -> std::io::Result<Self> {
        let threads = threads.max(1);
        let (sender, receiver) = crossbeam_channel::bounded::<Job>(queue_capacity.max(1));

        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("detect-worker-{index}"))
                .spawn(move || run_worker(receiver))?;
            workers.push(handle);
        }
        log::debug!("Started {threads} detection workers");

        Ok(Self {
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(workers),
            worker_count: threads,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Queues `job` without blocking.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<(), PoolError> {
        let guard = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        let sender = guard.as_ref().ok_or(PoolError::ShutDown)?;
        sender.try_send(Box::new(job)).map_err(|e| match e {
            TrySendError::Full(_) => PoolError::Saturated,
            TrySendError::Disconnected(_) => PoolError::ShutDown,
        })
    }

    /// Closes the queue, lets workers finish everything already queued, and
    /// joins them. Later calls are no-ops.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        log::info!("Draining {} detection workers", workers.len());
        for handle in workers {
            if handle.join().is_err() {
                log::error!("Detection worker exited abnormally");
            }
        }
        log::info!("Detection workers stopped");
    }
}

impl Drop for ThreadedWorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(receiver: Receiver<Job>) {
    for job in receiver {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            log::error!(
                "Job panicked on {}",
                thread::current().name().unwrap_or("detect-worker")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_runs_jobs_on_named_workers() {
        let pool = ThreadedWorkerPool::new(2, 4).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        pool.submit(move || {
            let name = thread::current().name().map(str::to_owned);
            tx.send(name).unwrap();
        })
        .unwrap();

        let name = rx.recv_timeout(RECV_TIMEOUT).unwrap().unwrap();
        assert!(name.starts_with("detect-worker-"));
        assert_eq!(pool.worker_count(), 2);
    }

    #[test]
    fn test_full_queue_is_saturated() {
        let pool = ThreadedWorkerPool::new(1, 1).unwrap();
        let (started_tx, started_rx) = crossbeam_channel::bounded(1);
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(1);

        pool.submit(move || {
            started_tx.send(()).unwrap();
            gate_rx.recv().unwrap();
        })
        .unwrap();
        started_rx.recv_timeout(RECV_TIMEOUT).unwrap();

        // worker is busy: one job fits in the queue, the next does not
        pool.submit(|| {}).unwrap();
        assert_eq!(pool.submit(|| {}), Err(PoolError::Saturated));

        gate_tx.send(()).unwrap();
        pool.shutdown();
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let pool = ThreadedWorkerPool::new(1, 4).unwrap();
        pool.submit(|| panic!("boom")).unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        pool.submit(move || tx.send(42).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap(), 42);
    }

    #[test]
    fn test_shutdown_drains_queued_jobs() {
        let pool = ThreadedWorkerPool::new(1, 8).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let done = done.clone();
            pool.submit(move || {
                thread::sleep(Duration::from_millis(5));
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown();
        assert_eq!(done.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let pool = ThreadedWorkerPool::new(2, 2).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert_eq!(pool.submit(|| {}), Err(PoolError::ShutDown));
    }

    #[test]
    fn test_zero_sizes_are_clamped() {
        let pool = ThreadedWorkerPool::new(0, 0).unwrap();
        assert_eq!(pool.worker_count(), 1);
        let (tx, rx) = crossbeam_channel::unbounded();
        pool.submit(move || tx.send(()).unwrap()).unwrap();
        rx.recv_timeout(RECV_TIMEOUT).unwrap();
    }

    #[test]
    fn test_concurrent_jobs_keep_their_own_results() {
        let pool = ThreadedWorkerPool::new(4, 32).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        for i in 0..20u32 {
            let tx = tx.clone();
            pool.submit(move || tx.send((i, i * i)).unwrap()).unwrap();
        }
        drop(tx);
        let mut results: Vec<(u32, u32)> = rx.iter().take(20).collect();
        results.sort();
        assert_eq!(results.len(), 20);
        assert!(results.iter().all(|(i, sq)| i * i == *sq));
    }
}
