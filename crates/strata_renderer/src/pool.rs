//! Dynamically grown worker pool.
//!
//! Tasks go into a mutex-guarded FIFO queue. Worker threads are spawned
//! lazily while the backlog outgrows the idle workers, up to a fixed
//! maximum, and live until the pool shuts down. Shutdown drains the queue and
//! waits on a condition variable that every exiting worker signals.

use crate::error::PoolError;
use std::any::Any;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct State {
    queue: VecDeque<Job>,
    /// Workers spawned and not yet exited
    running: usize,
    /// Workers blocked waiting for a job
    idle: usize,
    /// Total workers ever spawned, used for thread names
    spawned: usize,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    /// Signalled when a job is queued or shutdown begins
    work_ready: Condvar,
    /// Signalled when the last running worker exits
    workers_done: Condvar,
}

impl Shared {
    /// Jobs run outside the lock under `catch_unwind`, so a poisoned lock
    /// still guards consistent state.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decrements the running count when a worker exits, on every path.
struct WorkerGuard {
    shared: Arc<Shared>,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.running -= 1;
        if state.running == 0 {
            self.shared.workers_done.notify_all();
        }
    }
}

/// Handle to the eventual result of a submitted task.
pub struct TaskHandle<T> {
    receiver: Receiver<thread::Result<T>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task has run and return its result.
    pub fn wait(self) -> Result<T, PoolError> {
        match self.receiver.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => Err(PoolError::TaskPanicked(panic_message(payload.as_ref()))),
            Err(_) => Err(PoolError::TaskLost),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// A bounded, lazily grown pool of worker threads.
pub struct WorkerPool {
    shared: Arc<Shared>,
    max_workers: usize,
}

impl WorkerPool {
    /// Create a pool of at most `max_workers` threads.
    ///
    /// Zero, or a value above the available hardware parallelism, clamps to
    /// the hardware parallelism. No threads are started until work arrives.
    pub fn new(max_workers: usize) -> Self {
        let hardware = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        let max_workers = if max_workers == 0 || max_workers > hardware {
            hardware
        } else {
            max_workers
        };

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    running: 0,
                    idle: 0,
                    spawned: 0,
                    shutdown: false,
                }),
                work_ready: Condvar::new(),
                workers_done: Condvar::new(),
            }),
            max_workers,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Number of worker threads currently alive.
    pub fn running_workers(&self) -> usize {
        self.shared.lock().running
    }

    /// Queue `task` and return a handle to its result.
    ///
    /// Fails with [`PoolError::ShutDown`] once [`WorkerPool::shutdown`] has
    /// been called; the task is not run.
    pub fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel(1);
        let job: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(task));
            // The submitter may have dropped its handle
            let _ = sender.send(result);
        });

        let mut state = self.shared.lock();
        if state.shutdown {
            log::error!("Task submitted to a worker pool that has been shut down");
            return Err(PoolError::ShutDown);
        }

        state.queue.push_back(job);
        if state.running < self.max_workers && state.queue.len() > state.idle {
            if let Err(err) = self.spawn_worker(&mut state) {
                if state.running == 0 {
                    state.queue.pop_back();
                    return Err(err);
                }
                log::warn!("Continuing with {} workers: {}", state.running, err);
            }
        }
        drop(state);

        self.shared.work_ready.notify_one();
        Ok(TaskHandle { receiver })
    }

    /// Spawn one worker. Called with the state lock held.
    fn spawn_worker(&self, state: &mut State) -> Result<(), PoolError> {
        let id = state.spawned;
        let shared = Arc::clone(&self.shared);

        thread::Builder::new()
            .name(format!("strata-worker-{}", id))
            .spawn(move || worker_loop(shared))?;

        state.spawned += 1;
        state.running += 1;
        log::debug!("Spawned worker {} ({} running)", id, state.running);
        Ok(())
    }

    /// Stop accepting work, run everything already queued, and block until
    /// every worker has exited. Idempotent.
    ///
    /// Must not be called from inside a task running on this pool.
    pub fn shutdown(&self) {
        let mut state = self.shared.lock();
        if !state.shutdown {
            state.shutdown = true;
            log::debug!(
                "Shutting down worker pool ({} running, {} queued)",
                state.running,
                state.queue.len()
            );
        }
        self.shared.work_ready.notify_all();

        while state.running > 0 {
            state = self
                .shared
                .workers_done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<Shared>) {
    let _guard = WorkerGuard {
        shared: Arc::clone(&shared),
    };

    loop {
        let job = {
            let mut state = shared.lock();
            loop {
                if let Some(job) = state.queue.pop_front() {
                    break job;
                }
                if state.shutdown {
                    return;
                }
                state.idle += 1;
                state = shared
                    .work_ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
                state.idle -= 1;
            }
        };

        job();
    }
}
