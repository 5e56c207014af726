//! # Print Scheduler
//!
//! Cooperative state machine that drains the [`JobQueue`] into a
//! [`ByteChannel`]. It only advances when [`PrintScheduler::tick`] is called
//! and never sleeps or blocks; waiting is a state, not a delay.
//!
//! ## States
//!
//! ```text
//!            job queued, printer ready
//!   Idle ──────────────► Checking ──► Transmitting ──► Cooling ──┐
//!    ▲                      │                                    │
//!    │                      │ DTR low                            │ print_delay
//!    │                      ▼                                    │ elapsed
//!    │                  Suspended (timeout: count, mark offline)  │
//!    └───────────────────────────────────────────────────────────┘
//!
//!   any write ──(device lost)──► Halted ──(reconnect)──► Idle, header due
//! ```
//!
//! ## Per-Tick Order
//!
//! 1. Halted: try to reconnect, otherwise stop.
//! 2. Read status replies; send a status query when one is due.
//! 3. Cooling: stop until `print_delay` has passed since the last
//!    transmission started.
//! 4. Empty queue, or manual mode not armed: Idle.
//! 5. Paper sensor and head temperature.
//! 6. Paper estimate for the head job; an unaffordable job is rejected.
//! 7. DTR handshake.
//! 8. Transmit one job, prefixed with the session header when due.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::channel::{ByteChannel, ChannelError};
use crate::encoder::{EncodedJob, Encoder};
use crate::error::CalorError;
use crate::health::{HealthMonitor, StatusByte};
use crate::printer::PrinterConfig;
use crate::protocol::commands;
use crate::queue::{JobId, JobQueue, QueueFull, QueuedJob};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Checking,
    Transmitting,
    Cooling,
    Suspended,
    Halted,
}

/// Why a non-empty queue is not draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Blocker {
    PaperOut,
    Overheated,
    /// Manual mode and no `process_queue` request yet
    AwaitingProcess,
    /// The channel is still holding earlier bytes
    ChannelBusy,
}

/// What one tick did.
#[derive(Debug)]
pub enum TickOutcome {
    Idle,
    Cooling { remaining: Duration },
    Blocked(Blocker),
    /// Waiting for DTR
    Suspended,
    /// The DTR wait exceeded its timeout; the wait restarts
    DtrTimeout,
    Transmitted { id: JobId, bytes: usize },
    /// Head job needed more paper than is left; it was removed
    Rejected {
        id: JobId,
        required_mm: f32,
        remaining_mm: f32,
    },
    /// The write failed; the job is gone
    Dropped { id: JobId, error: ChannelError },
    Halted,
}

/// Queue and scheduler view for status reports.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub auto_process: bool,
    pub process_requested: bool,
    pub queue_len: usize,
    pub queue_capacity: usize,
    pub jobs: Vec<QueuedJob>,
}

pub struct PrintScheduler<C: ByteChannel> {
    channel: C,
    queue: JobQueue,
    monitor: HealthMonitor,
    state: SchedulerState,

    print_delay: Duration,
    auto_process: bool,
    process_armed: bool,

    dtr_handshake: bool,
    dtr_timeout: Duration,
    suspended_since: Option<Instant>,

    header: Vec<u8>,
    header_due: bool,
    sleep_timeout: Option<Duration>,

    poll_interval: Duration,
    next_poll: Option<Instant>,

    last_transmission_start: Option<Instant>,
    last_activity: Option<Instant>,
}

impl<C: ByteChannel> PrintScheduler<C> {
    /// `config` must already be validated.
    pub fn new(channel: C, config: &PrinterConfig, encoder: &Encoder) -> Self {
        Self {
            channel,
            queue: JobQueue::new(usize::from(config.max_queue_size)),
            monitor: HealthMonitor::new(config),
            state: SchedulerState::Idle,
            print_delay: config.print_delay(),
            auto_process: config.auto_process_queue,
            process_armed: false,
            dtr_handshake: config.enable_dtr_handshaking,
            dtr_timeout: config.dtr_timeout(),
            suspended_since: None,
            header: encoder.session_header(),
            header_due: true,
            sleep_timeout: encoder.sleep_timeout(),
            poll_interval: config.paper_check_interval(),
            next_poll: None,
            last_transmission_start: None,
            last_activity: None,
        }
    }

    // ------------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------------

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn monitor(&self) -> &HealthMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut HealthMonitor {
        &mut self.monitor
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Time left in the cooling window, if inside one.
    pub fn cooling_remaining(&self, now: Instant) -> Option<Duration> {
        let start = self.last_transmission_start?;
        let elapsed = now.saturating_duration_since(start);
        (elapsed < self.print_delay).then(|| self.print_delay - elapsed)
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            state: self.state,
            auto_process: self.auto_process,
            process_requested: self.process_armed,
            queue_len: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            jobs: self.queue.snapshot(),
        }
    }

    // ------------------------------------------------------------------------
    // Caller operations
    // ------------------------------------------------------------------------

    /// Add a job to the tail of the queue. Accepted even while halted.
    pub fn enqueue(&mut self, job: EncodedJob, now: Instant) -> Result<JobId, QueueFull> {
        match self.queue.enqueue(job, now) {
            Ok(id) => {
                self.monitor.record_accepted();
                Ok(id)
            }
            Err(full) => {
                self.monitor.record_queue_full();
                Err(full)
            }
        }
    }

    /// Allow transmission in manual mode until the queue drains.
    pub fn process_queue(&mut self) {
        if self.auto_process {
            debug!("process_queue ignored, queue drains automatically");
            return;
        }
        if self.queue.is_empty() {
            debug!("process_queue with empty queue");
            return;
        }
        info!(jobs = self.queue.len(), "queue processing requested");
        self.process_armed = true;
    }

    pub fn cancel(&mut self, id: JobId) -> Result<(), CalorError> {
        match self.queue.cancel(id) {
            Some(_) => Ok(()),
            None => Err(CalorError::UnknownJob(id)),
        }
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.queue.clear();
        if removed > 0 {
            info!(removed, "queue cleared");
        }
        self.process_armed = false;
        removed
    }

    /// Replace the session header; it is sent before the next job.
    pub fn set_session_header(&mut self, header: Vec<u8>) {
        self.header = header;
        self.header_due = true;
    }

    // ------------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------------

    /// Advance the state machine by at most one transmission.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if self.state == SchedulerState::Halted {
            if !self.channel.reconnect() {
                return TickOutcome::Halted;
            }
            info!("channel reconnected, resuming");
            self.monitor.set_channel_failed(false);
            self.monitor.set_online(true);
            self.header_due = true;
            self.set_state(SchedulerState::Idle);
        }

        if let Err(e) = self.poll_status(now) {
            if e.is_fatal() {
                self.halt(&e);
                return TickOutcome::Halted;
            }
            warn!(error = %e, "status poll failed");
            self.monitor.record_error(&e.to_string());
        }

        if let Some(remaining) = self.cooling_remaining(now) {
            self.set_state(SchedulerState::Cooling);
            return TickOutcome::Cooling { remaining };
        }

        let Some(head) = self.queue.peek() else {
            self.process_armed = false;
            self.set_state(SchedulerState::Idle);
            return TickOutcome::Idle;
        };
        let (head_id, head_lines) = (head.id, head.estimated_lines);

        if !self.auto_process && !self.process_armed {
            self.set_state(SchedulerState::Idle);
            return TickOutcome::Blocked(Blocker::AwaitingProcess);
        }

        self.set_state(SchedulerState::Checking);
        let (paper_present, heat_ok) = self.printer_ready();
        if !paper_present {
            self.set_state(SchedulerState::Idle);
            return TickOutcome::Blocked(Blocker::PaperOut);
        }
        if !heat_ok {
            self.set_state(SchedulerState::Idle);
            return TickOutcome::Blocked(Blocker::Overheated);
        }

        if !self.monitor.can_afford(head_lines) {
            self.queue.dequeue();
            let required_mm = self.monitor.required_mm(head_lines);
            let remaining_mm = self.monitor.health().paper_remaining_mm;
            warn!(
                id = %head_id,
                required_mm,
                remaining_mm,
                "insufficient paper, job rejected"
            );
            self.monitor.record_paper_rejection(required_mm);
            self.set_state(SchedulerState::Idle);
            return TickOutcome::Rejected {
                id: head_id,
                required_mm,
                remaining_mm,
            };
        }

        if self.dtr_handshake {
            match self.channel.dtr_asserted() {
                Ok(true) => self.suspended_since = None,
                Ok(false) => return self.suspend(now),
                Err(e) if e.is_fatal() => {
                    self.halt(&e);
                    return TickOutcome::Halted;
                }
                Err(e) => {
                    warn!(error = %e, "DTR read failed");
                    self.monitor.record_error(&e.to_string());
                    self.set_state(SchedulerState::Idle);
                    return TickOutcome::Idle;
                }
            }
        }

        self.transmit_head(now)
    }

    fn suspend(&mut self, now: Instant) -> TickOutcome {
        self.set_state(SchedulerState::Suspended);
        let since = *self.suspended_since.get_or_insert(now);
        if now.saturating_duration_since(since) >= self.dtr_timeout {
            warn!(
                timeout_ms = self.dtr_timeout.as_millis() as u64,
                "DTR handshake timeout, printer marked offline"
            );
            self.monitor.record_dtr_timeout();
            self.suspended_since = Some(now);
            return TickOutcome::DtrTimeout;
        }
        TickOutcome::Suspended
    }

    fn transmit_head(&mut self, now: Instant) -> TickOutcome {
        self.set_state(SchedulerState::Transmitting);
        let Some(job) = self.queue.dequeue() else {
            self.set_state(SchedulerState::Idle);
            return TickOutcome::Idle;
        };

        let result = self.send(&job.payload, job.estimated_lines, now);
        if let Err(error) = &result
            && error.is_busy()
        {
            debug!(id = %job.id, error = %error, "channel busy, job stays at the head");
            self.queue.requeue_front(job);
            self.set_state(SchedulerState::Idle);
            return TickOutcome::Blocked(Blocker::ChannelBusy);
        }
        if self.queue.is_empty() {
            self.process_armed = false;
        }

        match result {
            Ok(bytes) => {
                info!(
                    id = %job.id,
                    kind = ?job.kind,
                    bytes,
                    waited_ms = now.saturating_duration_since(job.enqueued_at).as_millis() as u64,
                    "job transmitted"
                );
                TickOutcome::Transmitted { id: job.id, bytes }
            }
            Err(error) => {
                error!(id = %job.id, error = %error, "job dropped after write failure");
                TickOutcome::Dropped { id: job.id, error }
            }
        }
    }

    /// Print a job without queueing it.
    ///
    /// Used when the queue system is disabled. The same gates apply as for a
    /// queued job, but instead of waiting the call fails.
    pub fn transmit_now(&mut self, job: EncodedJob, now: Instant) -> Result<usize, CalorError> {
        if self.state == SchedulerState::Halted && !self.channel.reconnect() {
            return Err(CalorError::Halted);
        }
        if self.state == SchedulerState::Halted {
            info!("channel reconnected");
            self.monitor.set_channel_failed(false);
            self.monitor.set_online(true);
            self.header_due = true;
            self.set_state(SchedulerState::Idle);
        }
        if let Some(remaining) = self.cooling_remaining(now) {
            return Err(CalorError::Cooling {
                remaining_ms: remaining.as_millis() as u64,
            });
        }
        let (paper_present, heat_ok) = self.printer_ready();
        if !paper_present {
            return Err(CalorError::PaperOut);
        }
        if !heat_ok {
            return Err(CalorError::NotReady("print head over temperature"));
        }
        if !self.monitor.can_afford(job.estimated_lines) {
            let required_mm = self.monitor.required_mm(job.estimated_lines);
            let remaining_mm = self.monitor.health().paper_remaining_mm;
            self.monitor.record_paper_rejection(required_mm);
            return Err(CalorError::InsufficientPaper {
                required_mm,
                remaining_mm,
            });
        }
        if self.dtr_handshake {
            match self.channel.dtr_asserted() {
                Ok(true) => {}
                Ok(false) => return Err(CalorError::NotReady("DTR deasserted")),
                Err(e) => {
                    if e.is_fatal() {
                        self.halt(&e);
                    }
                    return Err(e.into());
                }
            }
        }

        let bytes = match self.send(&job.payload, job.estimated_lines, now) {
            Ok(bytes) => bytes,
            Err(e) if e.is_busy() => return Err(CalorError::NotReady("serial buffer full")),
            Err(e) => return Err(e.into()),
        };
        info!(kind = ?job.kind, bytes, "job printed");
        Ok(bytes)
    }

    // ------------------------------------------------------------------------
    // Channel plumbing
    // ------------------------------------------------------------------------

    /// Write one payload, with the session header when due.
    fn send(&mut self, payload: &[u8], lines: u32, now: Instant) -> Result<usize, ChannelError> {
        let asleep = match (self.sleep_timeout, self.last_activity) {
            (Some(timeout), Some(last)) => now.saturating_duration_since(last) >= timeout,
            _ => false,
        };
        if asleep && !self.header_due {
            debug!("printer idle past its sleep timer, re-sending session header");
            self.header_due = true;
        }

        let header_len = if self.header_due { self.header.len() } else { 0 };
        let mut bytes = Vec::with_capacity(header_len + payload.len());
        if self.header_due {
            bytes.extend_from_slice(&self.header);
        }
        bytes.extend_from_slice(payload);

        self.set_state(SchedulerState::Transmitting);
        match self.channel.write(&bytes) {
            Err(e) if e.is_busy() => {
                self.set_state(SchedulerState::Idle);
                Err(e)
            }
            Ok(()) => {
                self.last_transmission_start = Some(now);
                if self.header_due {
                    self.monitor.record_bytes(header_len);
                    self.header_due = false;
                }
                self.monitor.record_transmission(lines, payload.len());
                self.last_activity = Some(now);
                self.set_state(SchedulerState::Cooling);
                Ok(bytes.len())
            }
            Err(e) => {
                self.last_transmission_start = Some(now);
                self.monitor.record_drop(&e.to_string());
                if e.is_fatal() {
                    self.halt(&e);
                } else {
                    self.set_state(SchedulerState::Cooling);
                }
                Err(e)
            }
        }
    }

    /// Read pending status replies and send a query when one is due.
    fn poll_status(&mut self, now: Instant) -> Result<(), ChannelError> {
        while let Some(byte) = self.channel.read_byte()? {
            self.monitor.apply_status(StatusByte(byte));
        }

        let Some(due) = self.next_poll else {
            self.next_poll = Some(now + self.poll_interval);
            return Ok(());
        };
        if now < due {
            return Ok(());
        }
        self.next_poll = Some(now + self.poll_interval);

        if self.dtr_handshake && !self.channel.dtr_asserted()? {
            return Ok(());
        }
        let query = commands::status_query();
        match self.channel.write(&query) {
            Ok(()) => self.monitor.record_bytes(query.len()),
            Err(e) if e.is_busy() => debug!("channel busy, status query skipped"),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn printer_ready(&self) -> (bool, bool) {
        let health = self.monitor.health();
        (health.paper_present, health.heat_budget_ok)
    }

    fn halt(&mut self, error: &ChannelError) {
        error!(error = %error, "channel lost, scheduler halted");
        self.monitor.set_channel_failed(true);
        self.monitor.record_error(&error.to_string());
        self.set_state(SchedulerState::Halted);
    }

    fn set_state(&mut self, state: SchedulerState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "scheduler state");
            self.state = state;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
