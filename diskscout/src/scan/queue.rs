use std::collections::VecDeque;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// What a task path turned out to be when it was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Directory,
    File,
}

/// One unit of pending filesystem work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTask {
    pub path: PathBuf,
    pub kind: TaskKind,
}

impl ScanTask {
    pub fn new(path: impl Into<PathBuf>, kind: TaskKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Outcome of [`WorkQueue::dequeue`]
#[derive(Debug)]
pub enum Dequeued<'q> {
    /// A task to process. It counts as outstanding until the handle is dropped.
    Task(ClaimedTask<'q>),
    /// Nothing arrived within the timeout, but other tasks are still in flight
    TimedOut,
    /// The queue is empty and every dequeued task has been consumed
    Exhausted,
    /// The queue was closed; no further tasks will be handed out
    Closed,
}

#[derive(Debug, Default)]
struct QueueState {
    tasks: VecDeque<ScanTask>,
    outstanding: usize,
    closed: bool,
}

/// Unbounded multi-producer, multi-consumer task queue with join semantics.
///
/// Every enqueued task stays outstanding until it is dequeued *and* marked
/// consumed. The queue is exhausted only when it is empty and nothing is
/// outstanding, so a worker still listing a directory keeps the others from
/// concluding the scan is over while the queue is momentarily empty.
#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    changed: Condvar,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a task. Never blocks; tasks added after `close` are dropped.
    pub fn enqueue(&self, task: ScanTask) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.tasks.push_back(task);
        state.outstanding += 1;
        drop(state);
        self.changed.notify_one();
    }

    /// Waits up to `timeout` for a task
    pub fn dequeue(&self, timeout: Duration) -> Dequeued<'_> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if state.closed {
                return Dequeued::Closed;
            }
            if let Some(task) = state.tasks.pop_front() {
                return Dequeued::Task(ClaimedTask {
                    queue: self,
                    task: Some(task),
                });
            }
            if state.outstanding == 0 {
                return Dequeued::Exhausted;
            }

            let now = Instant::now();
            if now >= deadline {
                return Dequeued::TimedOut;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Marks one dequeued task as fully processed.
    ///
    /// Normally called by dropping the [`ClaimedTask`]. When the last
    /// outstanding task completes every waiting consumer is woken.
    pub fn notify_consumed(&self) {
        let mut state = self.lock();
        debug_assert!(state.outstanding > 0, "consumed more tasks than enqueued");
        state.outstanding = state.outstanding.saturating_sub(1);
        let exhausted = state.outstanding == 0;
        drop(state);
        if exhausted {
            self.changed.notify_all();
        }
    }

    /// Stops handing out tasks and wakes every waiting consumer
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_all();
    }

    pub fn is_exhausted(&self) -> bool {
        self.lock().outstanding == 0
    }

    /// Tasks waiting to be dequeued
    pub fn pending(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Tasks enqueued but not yet consumed, including the ones in progress
    pub fn outstanding(&self) -> usize {
        self.lock().outstanding
    }
}

/// A dequeued task. Dropping it marks the task consumed, so a worker that
/// unwinds mid-task cannot leave the queue waiting forever.
#[derive(Debug)]
pub struct ClaimedTask<'q> {
    queue: &'q WorkQueue,
    task: Option<ScanTask>,
}

impl ClaimedTask<'_> {
    /// Marks the task consumed now
    pub fn finish(self) {}
}

impl Deref for ClaimedTask<'_> {
    type Target = ScanTask;

    fn deref(&self) -> &ScanTask {
        self.task
            .as_ref()
            .unwrap_or_else(|| unreachable!("task is only taken on drop"))
    }
}

impl Drop for ClaimedTask<'_> {
    fn drop(&mut self) {
        if self.task.take().is_some() {
            self.queue.notify_consumed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    const SHORT: Duration = Duration::from_millis(20);

    fn file(name: &str) -> ScanTask {
        ScanTask::new(name, TaskKind::File)
    }

    #[test]
    fn test_fifo_order() {
        let queue = WorkQueue::new();
        queue.enqueue(file("a"));
        queue.enqueue(file("b"));

        for expected in ["a", "b"] {
            match queue.dequeue(SHORT) {
                Dequeued::Task(task) => assert_eq!(task.path, PathBuf::from(expected)),
                other => panic!("expected a task, got {:?}", other),
            }
        }
        assert!(matches!(queue.dequeue(SHORT), Dequeued::Exhausted));
    }

    #[test]
    fn test_empty_queue_is_exhausted() {
        let queue = WorkQueue::new();
        assert!(queue.is_exhausted());
        assert!(matches!(queue.dequeue(SHORT), Dequeued::Exhausted));
    }

    #[test]
    fn test_join_semantics() {
        let queue = WorkQueue::new();
        queue.enqueue(ScanTask::new("root", TaskKind::Directory));

        let claimed = match queue.dequeue(SHORT) {
            Dequeued::Task(task) => task,
            other => panic!("expected a task, got {:?}", other),
        };

        // Empty but not exhausted while the claimed task is in progress
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.outstanding(), 1);
        assert!(matches!(queue.dequeue(SHORT), Dequeued::TimedOut));

        queue.enqueue(ScanTask::new("root/a", TaskKind::File));
        claimed.finish();
        assert!(!queue.is_exhausted());

        match queue.dequeue(SHORT) {
            Dequeued::Task(task) => assert_eq!(task.path, PathBuf::from("root/a")),
            other => panic!("expected a task, got {:?}", other),
        }
        assert!(queue.is_exhausted());
    }

    #[test]
    fn test_exhaustion_wakes_waiters() {
        let queue = Arc::new(WorkQueue::new());
        queue.enqueue(file("only"));
        let claimed_path = match queue.dequeue(SHORT) {
            Dequeued::Task(task) => {
                let path = task.path.clone();
                std::mem::forget(task);
                path
            }
            other => panic!("expected a task, got {:?}", other),
        };
        assert_eq!(claimed_path, PathBuf::from("only"));

        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let started = Instant::now();
                let outcome = matches!(queue.dequeue(Duration::from_secs(30)), Dequeued::Exhausted);
                (outcome, started.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(50));
        queue.notify_consumed();

        let (exhausted, waited) = waiter.join().unwrap();
        assert!(exhausted);
        assert!(waited < Duration::from_secs(30));
    }

    #[test]
    fn test_close_wakes_waiters() {
        let queue = WorkQueue::new();
        queue.enqueue(file("a"));
        queue.close();
        assert!(matches!(queue.dequeue(SHORT), Dequeued::Closed));

        queue.enqueue(file("b"));
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn test_panicking_consumer_still_consumes() {
        let queue = Arc::new(WorkQueue::new());
        queue.enqueue(file("boom"));

        let result = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                if let Dequeued::Task(_task) = queue.dequeue(SHORT) {
                    panic!("worker failure");
                }
            })
            .join()
        };

        assert!(result.is_err());
        assert!(queue.is_exhausted());
    }

    #[test]
    fn test_many_producers_and_consumers() {
        let queue = Arc::new(WorkQueue::new());
        let processed = Arc::new(AtomicUsize::new(0));

        // Each seed fans out into ten children, each child is a leaf
        for i in 0..20 {
            queue.enqueue(ScanTask::new(format!("dir{}", i), TaskKind::Directory));
        }

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let processed = Arc::clone(&processed);
                thread::spawn(move || loop {
                    match queue.dequeue(SHORT) {
                        Dequeued::Task(task) => {
                            if task.kind == TaskKind::Directory {
                                for j in 0..10 {
                                    let path = task.path.join(j.to_string());
                                    queue.enqueue(ScanTask::new(path, TaskKind::File));
                                }
                            }
                            processed.fetch_add(1, Ordering::SeqCst);
                        }
                        Dequeued::TimedOut => continue,
                        Dequeued::Exhausted | Dequeued::Closed => break,
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(processed.load(Ordering::SeqCst), 20 + 200);
        assert!(queue.is_exhausted());
    }
}
