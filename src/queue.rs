//! # Job Queue
//!
//! Bounded FIFO of encoded print jobs.
//!
//! - Order is arrival order, nothing else.
//! - A full queue rejects the *new* job with [`QueueFull`]; jobs already
//!   accepted are never displaced.
//! - No I/O: the queue only holds bytes for the scheduler.

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::encoder::EncodedJob;

/// Monotonic job identifier, unique for the life of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a job prints, for logs and status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Text,
    RotatedText,
    TwoColumn,
    QrCode,
    Barcode,
    Receipt,
    ShoppingList,
    Feed,
    Separator,
    TableRow,
    Raw,
}

#[derive(Debug, Clone)]
pub struct PrintJob {
    pub id: JobId,
    pub kind: JobKind,
    pub payload: Vec<u8>,
    pub enqueued_at: Instant,
    pub estimated_lines: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("print queue full ({capacity} jobs)")]
pub struct QueueFull {
    pub capacity: usize,
}

/// Summary of a queued job, without its payload.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedJob {
    pub id: JobId,
    pub kind: JobKind,
    pub bytes: usize,
    pub estimated_lines: u32,
}

impl From<&PrintJob> for QueuedJob {
    fn from(job: &PrintJob) -> Self {
        Self {
            id: job.id,
            kind: job.kind,
            bytes: job.payload.len(),
            estimated_lines: job.estimated_lines,
        }
    }
}

#[derive(Debug)]
pub struct JobQueue {
    jobs: VecDeque<PrintJob>,
    capacity: usize,
    next_id: u64,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
        }
    }

    /// Accept a job at the tail, or refuse it when the queue is full.
    pub fn enqueue(&mut self, job: EncodedJob, now: Instant) -> Result<JobId, QueueFull> {
        if self.is_full() {
            warn!(
                kind = ?job.kind,
                capacity = self.capacity,
                "queue full, job rejected"
            );
            return Err(QueueFull {
                capacity: self.capacity,
            });
        }
        let id = JobId(self.next_id);
        self.next_id += 1;
        debug!(%id, kind = ?job.kind, lines = job.estimated_lines, depth = self.jobs.len() + 1, "job queued");
        self.jobs.push_back(PrintJob {
            id,
            kind: job.kind,
            payload: job.payload,
            enqueued_at: now,
            estimated_lines: job.estimated_lines,
        });
        Ok(id)
    }

    pub fn dequeue(&mut self) -> Option<PrintJob> {
        self.jobs.pop_front()
    }

    /// Put back a job just taken with [`JobQueue::dequeue`] that could not be
    /// sent. It keeps its id and its place at the head.
    pub fn requeue_front(&mut self, job: PrintJob) {
        debug!(id = %job.id, "job returned to the head of the queue");
        self.jobs.push_front(job);
    }

    pub fn peek(&self) -> Option<&PrintJob> {
        self.jobs.front()
    }

    /// Remove a job that has not started transmitting.
    pub fn cancel(&mut self, id: JobId) -> Option<PrintJob> {
        let index = self.jobs.iter().position(|job| job.id == id)?;
        let job = self.jobs.remove(index);
        debug!(%id, "job cancelled");
        job
    }

    /// Drop every queued job, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let removed = self.jobs.len();
        self.jobs.clear();
        if removed > 0 {
            debug!(removed, "queue cleared");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queued jobs in transmission order.
    pub fn snapshot(&self) -> Vec<QueuedJob> {
        self.jobs.iter().map(QueuedJob::from).collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn job(tag: u8) -> EncodedJob {
        EncodedJob {
            kind: JobKind::Raw,
            payload: vec![tag],
            estimated_lines: 1,
        }
    }

    #[test]
    fn test_fifo_order() {
        let now = Instant::now();
        let mut q = JobQueue::new(5);
        for tag in 1..=3 {
            q.enqueue(job(tag), now).unwrap();
        }
        let order: Vec<u8> = std::iter::from_fn(|| q.dequeue()).map(|j| j.payload[0]).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_full_queue_rejects_new_job() {
        let now = Instant::now();
        let mut q = JobQueue::new(2);
        let a = q.enqueue(job(1), now).unwrap();
        let b = q.enqueue(job(2), now).unwrap();
        assert_eq!(q.enqueue(job(3), now), Err(QueueFull { capacity: 2 }));
        assert_eq!(q.len(), 2);
        assert_eq!(q.dequeue().unwrap().id, a);
        assert_eq!(q.dequeue().unwrap().id, b);
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let now = Instant::now();
        let mut q = JobQueue::new(3);
        for i in 0..20u8 {
            if i % 3 == 0 {
                q.dequeue();
            }
            let _ = q.enqueue(job(i), now);
            assert!(q.len() <= q.capacity());
        }
    }

    #[test]
    fn test_ids_are_monotonic() {
        let now = Instant::now();
        let mut q = JobQueue::new(2);
        let a = q.enqueue(job(1), now).unwrap();
        q.dequeue();
        let b = q.enqueue(job(2), now).unwrap();
        assert!(b > a);
        assert_eq!(a.to_string(), "#1");
    }

    #[test]
    fn test_cancel() {
        let now = Instant::now();
        let mut q = JobQueue::new(4);
        let a = q.enqueue(job(1), now).unwrap();
        let b = q.enqueue(job(2), now).unwrap();
        let c = q.enqueue(job(3), now).unwrap();
        assert_eq!(q.cancel(b).unwrap().id, b);
        assert!(q.cancel(b).is_none());
        let ids: Vec<JobId> = q.snapshot().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn test_requeue_front_keeps_order() {
        let now = Instant::now();
        let mut q = JobQueue::new(2);
        let a = q.enqueue(job(1), now).unwrap();
        let b = q.enqueue(job(2), now).unwrap();
        let head = q.dequeue().unwrap();
        q.requeue_front(head);
        assert!(q.is_full());
        let ids: Vec<JobId> = q.snapshot().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_clear() {
        let now = Instant::now();
        let mut q = JobQueue::new(4);
        q.enqueue(job(1), now).unwrap();
        q.enqueue(job(2), now).unwrap();
        assert_eq!(q.clear(), 2);
        assert!(q.is_empty());
        assert_eq!(q.clear(), 0);
    }
}
