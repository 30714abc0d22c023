//! Single-worker background queue.
//!
//! Discovery and entry reads are blocking I/O; interactive callers submit
//! them here as units of work so their own thread stays responsive. Work
//! runs strictly sequentially on one worker thread, in submission order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

/// Queue lifecycle notifications, delivered on the [`WorkQueue::events`]
/// channel in the order they occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEvent {
    /// A unit of work was queued.
    ItemAdded,
    /// The worker went from idle to busy.
    Started,
    /// A unit of work finished running.
    ItemRemoved,
    /// The worker drained the queue and went idle again.
    Finished,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Envelope {
    job: Job,
    done: Option<Sender<()>>,
}

/// Runs submitted closures sequentially on a single background worker.
pub struct WorkQueue {
    jobs: Option<Sender<Envelope>>,
    events: Receiver<QueueEvent>,
    announce: Sender<QueueEvent>,
    pending: Arc<AtomicUsize>,
    worker: Option<JoinHandle<()>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        let (job_tx, job_rx) = unbounded::<Envelope>();
        let (event_tx, event_rx) = unbounded();
        let pending = Arc::new(AtomicUsize::new(0));

        let worker_events = event_tx.clone();
        let worker_pending = Arc::clone(&pending);
        let worker = thread::spawn(move || {
            let mut idle = true;
            for envelope in job_rx.iter() {
                if idle {
                    let _ = worker_events.send(QueueEvent::Started);
                    idle = false;
                }
                (envelope.job)();
                let _ = worker_events.send(QueueEvent::ItemRemoved);
                if worker_pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                    let _ = worker_events.send(QueueEvent::Finished);
                    idle = true;
                }
                if let Some(done) = envelope.done {
                    let _ = done.send(());
                }
            }
        });

        Self {
            jobs: Some(job_tx),
            events: event_rx,
            announce: event_tx,
            pending,
            worker: Some(worker),
        }
    }

    /// Queue a unit of work. With `join`, the call blocks until that unit
    /// has finished running on the worker.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static, join: bool) {
        // jobs is only None mid-drop, and submit cannot run then.
        let sender = self.jobs.as_ref().expect("work queue already closed");
        self.pending.fetch_add(1, Ordering::SeqCst);
        let _ = self.announce.send(QueueEvent::ItemAdded);

        if join {
            let (done_tx, done_rx) = bounded(1);
            let _ = sender.send(Envelope {
                job: Box::new(job),
                done: Some(done_tx),
            });
            let _ = done_rx.recv();
        } else {
            let _ = sender.send(Envelope {
                job: Box::new(job),
                done: None,
            });
        }
    }

    /// Event stream; safe to poll from any thread.
    pub fn events(&self) -> Receiver<QueueEvent> {
        self.events.clone()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.load(Ordering::SeqCst) == 0
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_submit_join_runs_before_returning() {
        let queue = WorkQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&ran);

        queue.submit(move || { flag.fetch_add(1, Ordering::SeqCst); }, true);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_work_runs_sequentially_in_submission_order() {
        let queue = WorkQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let sink = Arc::clone(&order);
            // Only the last submission joins; the queue still runs all of
            // them in order before it.
            queue.submit(move || sink.lock().unwrap().push(i), i == 4);
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_event_sequence_for_single_item() {
        let queue = WorkQueue::new();
        let events = queue.events();

        queue.submit(|| {}, true);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                QueueEvent::ItemAdded,
                QueueEvent::Started,
                QueueEvent::ItemRemoved,
                QueueEvent::Finished,
            ]
        );
    }

    #[test]
    fn test_drop_waits_for_queued_work() {
        let ran = Arc::new(AtomicUsize::new(0));
        {
            let queue = WorkQueue::new();
            for _ in 0..3 {
                let flag = Arc::clone(&ran);
                queue.submit(move || { flag.fetch_add(1, Ordering::SeqCst); }, false);
            }
            // queue dropped here; worker drains first
        }
        assert_eq!(ran.load(Ordering::SeqCst), 3);
    }
}
