// Worker pool built on a crossbeam channel
//
// Shutdown policy: discard-on-shutdown. Stopping the pool lets every worker
// finish the job it is running; jobs still queued are dropped unrun and
// counted. Callers that need every job to run must call `wait_idle` first.

use std::error::Error as StdError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::collector::{panic_message, ErrorCollector, TaskError, TaskFailure};
use crate::error::PoolError;

/// Identifier assigned to every submitted job, in submission order.
pub type TaskId = u64;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// State shared between the pool handle and its workers
struct Shared {
    stop: AtomicBool,
    outstanding: Mutex<usize>,
    idle: Condvar,
    discarded: AtomicUsize,
    next_task_id: AtomicU64,
    failures: ErrorCollector,
}

impl Shared {
    fn begin(&self) {
        *self.outstanding.lock() += 1;
    }

    fn finish(&self) {
        let mut outstanding = self.outstanding.lock();
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.idle.notify_all();
        }
    }
}

/// What was left over when a pool shut down
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Fire-and-forget failures nobody had collected yet
    pub failures: Vec<TaskFailure>,
    /// Queued jobs dropped without running
    pub discarded: usize,
}

/// Handle to a job submitted with [`WorkerPool::submit_with_result`].
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: TaskId,
    receiver: Receiver<Result<T, PoolError>>,
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Block until the job finished and return its value.
    pub fn wait(self) -> Result<T, PoolError> {
        match self.receiver.recv() {
            Ok(result) => result,
            // Sender dropped without a value: the job was discarded unrun
            Err(_) => Err(PoolError::Discarded),
        }
    }

    /// Return the value if the job already finished.
    pub fn try_wait(&self) -> Option<Result<T, PoolError>> {
        self.receiver.try_recv().ok()
    }
}

/// Fixed-size pool of long-lived worker threads.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Create a pool with `worker_count` threads.
    ///
    /// `queue_capacity` bounds the number of queued (not yet started) jobs;
    /// submitters block while the queue is full. `None` leaves it unbounded.
    pub fn new(worker_count: usize, queue_capacity: Option<usize>) -> Result<Self, PoolError> {
        if worker_count == 0 {
            return Err(PoolError::NoWorkers);
        }

        let (sender, receiver) = match queue_capacity {
            Some(capacity) => crossbeam_channel::bounded::<Job>(capacity),
            None => crossbeam_channel::unbounded::<Job>(),
        };

        let shared = Arc::new(Shared {
            stop: AtomicBool::new(false),
            outstanding: Mutex::new(0),
            idle: Condvar::new(),
            discarded: AtomicUsize::new(0),
            next_task_id: AtomicU64::new(0),
            failures: ErrorCollector::new(),
        });

        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(worker_count),
            shared,
        };

        for index in 0..worker_count {
            let receiver = receiver.clone();
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("pqsplit-worker-{}", index))
                .spawn(move || worker_loop(index, receiver, shared))
                .map_err(|e| PoolError::Spawn {
                    index,
                    reason: e.to_string(),
                })?;
            pool.workers.push(handle);
        }

        debug!(
            workers = worker_count,
            queue_capacity = ?queue_capacity,
            "Worker pool started"
        );

        Ok(pool)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Jobs submitted but not yet finished (queued or running).
    pub fn outstanding(&self) -> usize {
        *self.shared.outstanding.lock()
    }

    /// Jobs not yet picked up by a worker.
    pub fn queued(&self) -> usize {
        self.sender.as_ref().map_or(0, |s| s.len())
    }

    /// The pool-level failure channel for fire-and-forget jobs.
    pub fn failures(&self) -> &ErrorCollector {
        &self.shared.failures
    }

    /// Remove and return every captured fire-and-forget failure.
    pub fn take_failures(&self) -> Vec<TaskFailure> {
        self.shared.failures.take()
    }

    /// Schedule `task` and return a handle to its result.
    pub fn submit_with_result<F, T>(&self, task: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let id = self.claim_task_id();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let job: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(task))
                .map_err(|payload| PoolError::Panicked(panic_message(payload)));
            // Receiver may be gone if the caller dropped the handle
            let _ = tx.send(result);
        });

        self.dispatch(job)?;
        Ok(TaskHandle { id, receiver: rx })
    }

    /// Schedule `task` without waiting for it.
    ///
    /// An `Err` returned by the task, or a panic inside it, is recorded in
    /// [`WorkerPool::failures`] under the returned id and `label`.
    pub fn submit_fire_and_forget<F, E>(
        &self,
        label: impl Into<String>,
        task: F,
    ) -> Result<TaskId, PoolError>
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let label = label.into();
        let failures = self.shared.failures.clone();
        let task_id = self.claim_task_id();

        let job: Job = Box::new(move || {
            let error = match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(Ok(())) => return,
                Ok(Err(err)) => TaskError::Failed(err.into()),
                Err(payload) => TaskError::from_panic(payload),
            };
            failures.record(TaskFailure {
                task_id,
                label,
                error,
            });
        });

        self.dispatch(job)?;
        Ok(task_id)
    }

    /// Block until every submitted job has finished or been discarded.
    pub fn wait_idle(&self) {
        let mut outstanding = self.shared.outstanding.lock();
        while *outstanding > 0 {
            self.shared.idle.wait(&mut outstanding);
        }
    }

    /// Stop the pool, join every worker and report what was left over.
    pub fn shutdown(mut self) -> ShutdownReport {
        self.stop_and_join();
        ShutdownReport {
            failures: self.shared.failures.take(),
            discarded: self.shared.discarded.load(Ordering::Acquire),
        }
    }

    fn claim_task_id(&self) -> TaskId {
        self.shared.next_task_id.fetch_add(1, Ordering::Relaxed)
    }

    fn dispatch(&self, job: Job) -> Result<(), PoolError> {
        let sender = self.sender.as_ref().ok_or(PoolError::ShutDown)?;
        if self.shared.stop.load(Ordering::Acquire) {
            return Err(PoolError::ShutDown);
        }

        self.shared.begin();
        // Blocks while a bounded queue is full
        if sender.send(job).is_err() {
            self.shared.finish();
            return Err(PoolError::ShutDown);
        }
        Ok(())
    }

    fn stop_and_join(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        // Closing the channel wakes workers blocked in recv
        self.sender.take();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Worker thread exited with a panic");
            }
        }

        let discarded = self.shared.discarded.load(Ordering::Acquire);
        if discarded > 0 {
            warn!(discarded, "Worker pool discarded queued tasks at shutdown");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.stop_and_join();
        }
    }
}

fn worker_loop(index: usize, receiver: Receiver<Job>, shared: Arc<Shared>) {
    debug!(worker = index, "Worker started");

    while let Ok(job) = receiver.recv() {
        if shared.stop.load(Ordering::Acquire) {
            drop(job);
            shared.discarded.fetch_add(1, Ordering::AcqRel);
            shared.finish();
            continue;
        }

        job();
        shared.finish();
    }

    debug!(worker = index, "Worker stopped");
}
