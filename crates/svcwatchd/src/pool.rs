//! Fixed-size worker pool.
//!
//! Workers pull tasks from a shared channel. Dropping the pool closes the
//! channel; workers finish the tasks already queued and exit, and the drop
//! waits for them.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use svcwatch_core::Task;
use tracing::{debug, error, warn};

pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `size` worker threads (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel::<Task>();
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..size)
            .filter_map(|id| {
                let rx = Arc::clone(&rx);
                thread::Builder::new()
                    .name(format!("svcwatch-worker-{}", id))
                    .spawn(move || worker_loop(id, rx))
                    .map_err(|e| error!("Failed to start worker {}: {}", id, e))
                    .ok()
            })
            .collect::<Vec<_>>();
        debug!("Worker pool started with {} threads", workers.len());

        Self {
            sender: Some(tx),
            workers,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queues a task. Returns `false` if the pool can no longer run it.
    pub fn execute(&self, task: Task) -> bool {
        if self.workers.is_empty() {
            return false;
        }
        match &self.sender {
            Some(tx) => tx.send(task).is_ok(),
            None => false,
        }
    }
}

fn worker_loop(id: usize, rx: Arc<Mutex<Receiver<Task>>>) {
    loop {
        // Hold the lock only while waiting for the next task.
        let next = match rx.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => break,
        };
        let Ok(task) = next else {
            break;
        };
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            warn!("Task panicked on worker {}", id);
        }
    }
    debug!("Worker {} exiting", id);
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_runs_all_tasks_before_drop_returns() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(4);
        assert_eq!(pool.size(), 4);

        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            assert!(pool.execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })));
        }
        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(1);

        pool.execute(Box::new(|| panic!("boom")));
        let c = Arc::clone(&counter);
        pool.execute(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_size_means_one_worker() {
        assert_eq!(WorkerPool::new(0).size(), 1);
    }
}
