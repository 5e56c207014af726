//! # Scheduler Scenarios
//!
//! End-to-end runs of a [`ThermalPrinter`] over a [`MemoryChannel`], driving
//! the clock by hand.
//!
//! Every scenario disables the startup banner so the queue starts empty.

use calor::channel::MemoryChannel;
use calor::channel::memory::Failure;
use calor::encoder::{Operation, TextParams};
use calor::printer::{ModemLine, PrinterConfig};
use calor::scheduler::{Blocker, SchedulerState, TickOutcome};
use calor::service::Submission;
use calor::{CalorError, ThermalPrinter};
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn config() -> PrinterConfig {
    PrinterConfig {
        startup_message: false,
        ..Default::default()
    }
}

fn printer(config: &PrinterConfig, now: Instant) -> ThermalPrinter<MemoryChannel> {
    ThermalPrinter::new(MemoryChannel::new(), config, now).unwrap()
}

fn raw(tag: u8, lines: u32) -> Operation {
    Operation::Raw {
        bytes: vec![tag; 4],
        estimated_lines: lines,
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// ============================================================================
// QUEUE
// ============================================================================

#[test]
fn test_third_job_rejected_at_capacity_two() {
    let cfg = PrinterConfig {
        max_queue_size: 2,
        ..config()
    };
    let t0 = Instant::now();
    let mut p = printer(&cfg, t0);

    assert!(p.submit(&raw(1, 1), t0).is_ok());
    assert!(p.submit(&raw(2, 1), t0).is_ok());
    let err = p.submit(&raw(3, 1), t0).unwrap_err();

    assert!(matches!(err, CalorError::QueueFull(_)));
    assert_eq!(p.scheduler().queue().len(), 2);
    assert_eq!(p.scheduler().monitor().counters().jobs_rejected_full, 1);
    assert_eq!(p.scheduler().monitor().counters().jobs_accepted, 2);
}

#[test]
fn test_jobs_leave_in_submission_order() {
    let t0 = Instant::now();
    let mut p = printer(&config(), t0);
    for tag in 1..=3 {
        p.submit(&raw(tag, 1), t0).unwrap();
    }

    for step in 0..3 {
        let outcome = p.tick(t0 + ms(1000 * step));
        assert!(matches!(outcome, TickOutcome::Transmitted { .. }), "{outcome:?}");
    }

    let writes = p.scheduler().channel().writes();
    assert_eq!(writes.len(), 3);
    assert!(writes[0].ends_with(&[1; 4]));
    assert_eq!(writes[1], vec![2; 4]);
    assert_eq!(writes[2], vec![3; 4]);
}

// ============================================================================
// PACING
// ============================================================================

#[test]
fn test_print_delay_separates_transmissions() {
    let cfg = PrinterConfig {
        print_delay_ms: 2000,
        ..config()
    };
    let t0 = Instant::now();
    let mut p = printer(&cfg, t0);
    p.submit(&raw(1, 1), t0).unwrap();
    p.submit(&raw(2, 1), t0).unwrap();

    assert!(matches!(p.tick(t0), TickOutcome::Transmitted { .. }));
    match p.tick(t0 + ms(1999)) {
        TickOutcome::Cooling { remaining } => assert_eq!(remaining, ms(1)),
        other => panic!("expected cooling, got {other:?}"),
    }
    assert_eq!(p.scheduler().state(), SchedulerState::Cooling);
    assert!(matches!(p.tick(t0 + ms(2000)), TickOutcome::Transmitted { .. }));
}

#[test]
fn test_first_write_carries_session_header() {
    let t0 = Instant::now();
    let mut p = printer(&config(), t0);
    p.submit(&raw(9, 1), t0).unwrap();
    p.tick(t0);

    let mut expected = p.encoder().session_header();
    expected.extend([9; 4]);
    assert_eq!(p.scheduler().channel().writes()[0], expected);
}

// ============================================================================
// PAPER
// ============================================================================

#[test]
fn test_job_larger_than_remaining_roll_is_rejected() {
    // 1000 mm at 4 mm per line covers 250 lines
    let cfg = PrinterConfig {
        paper_roll_length: 1000.0,
        ..config()
    };
    let t0 = Instant::now();
    let mut p = printer(&cfg, t0);
    p.submit(&raw(1, 300), t0).unwrap();
    p.submit(&raw(2, 10), t0).unwrap();

    match p.tick(t0) {
        TickOutcome::Rejected {
            required_mm,
            remaining_mm,
            ..
        } => {
            assert_eq!(required_mm, 1200.0);
            assert_eq!(remaining_mm, 1000.0);
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(p.scheduler().queue().len(), 1);
    assert!(p.scheduler().channel().writes().is_empty());

    // Rejection does not start a cooling window
    assert!(matches!(p.tick(t0), TickOutcome::Transmitted { .. }));
    let health = p.scheduler().monitor().health();
    assert_eq!(health.paper_remaining_mm, 960.0);
    assert_eq!(p.scheduler().monitor().counters().jobs_rejected_paper, 1);
}

#[test]
fn test_paper_out_reply_blocks_until_paper_returns() {
    let cfg = PrinterConfig {
        paper_check_interval_ms: 1000,
        ..config()
    };
    let t0 = Instant::now();
    let mut p = printer(&cfg, t0);
    p.scheduler_mut().channel_mut().push_reply(0x0C);
    p.submit(&raw(1, 1), t0).unwrap();

    assert!(matches!(p.tick(t0), TickOutcome::Blocked(Blocker::PaperOut)));
    assert_eq!(p.scheduler().queue().len(), 1);

    p.scheduler_mut().channel_mut().push_reply(0x00);
    assert!(matches!(p.tick(t0 + ms(10)), TickOutcome::Transmitted { .. }));
}

// ============================================================================
// DTR HANDSHAKE
// ============================================================================

#[test]
fn test_dtr_low_suspends_then_times_out() {
    let cfg = PrinterConfig {
        enable_dtr_handshaking: true,
        dtr_pin: Some(ModemLine::Cts),
        dtr_timeout_ms: 5000,
        ..config()
    };
    let t0 = Instant::now();
    let mut p = printer(&cfg, t0);
    p.scheduler_mut().channel_mut().set_dtr(false);
    p.submit(&raw(1, 1), t0).unwrap();

    assert!(matches!(p.tick(t0), TickOutcome::Suspended));
    assert_eq!(p.scheduler().state(), SchedulerState::Suspended);
    assert!(matches!(p.tick(t0 + ms(4999)), TickOutcome::Suspended));
    assert!(matches!(p.tick(t0 + ms(5000)), TickOutcome::DtrTimeout));

    let monitor = p.scheduler().monitor();
    assert!(!monitor.health().online);
    assert_eq!(monitor.counters().dtr_timeouts, 1);
    assert_eq!(p.scheduler().queue().len(), 1);

    // The wait restarts rather than firing on every tick
    assert!(matches!(p.tick(t0 + ms(5100)), TickOutcome::Suspended));
    assert!(p.scheduler().channel().writes().is_empty());

    p.scheduler_mut().channel_mut().set_dtr(true);
    assert!(matches!(p.tick(t0 + ms(5200)), TickOutcome::Transmitted { .. }));
}

#[test]
fn test_dtr_low_holds_back_status_query() {
    let cfg = PrinterConfig {
        enable_dtr_handshaking: true,
        dtr_pin: Some(ModemLine::Cts),
        paper_check_interval_ms: 1000,
        ..config()
    };
    let t0 = Instant::now();
    let mut p = printer(&cfg, t0);
    p.scheduler_mut().channel_mut().set_dtr(false);

    for step in 0..5 {
        assert!(matches!(p.tick(t0 + ms(1000 * step)), TickOutcome::Idle));
    }
    assert!(p.scheduler().channel().writes().is_empty());

    // The next due query goes out once the line is back
    p.scheduler_mut().channel_mut().set_dtr(true);
    p.tick(t0 + ms(5000));
    let writes = p.scheduler().channel().writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0], calor::protocol::commands::status_query());
}

// ============================================================================
// CHANNEL FAILURE
// ============================================================================

#[test]
fn test_disconnect_halts_until_reconnect() {
    let t0 = Instant::now();
    let mut p = printer(&config(), t0);
    p.submit(&raw(1, 1), t0).unwrap();
    p.submit(&raw(2, 1), t0).unwrap();
    assert!(matches!(p.tick(t0), TickOutcome::Transmitted { .. }));

    p.scheduler_mut()
        .channel_mut()
        .fail_next_write(Failure::Disconnect);
    assert!(matches!(p.tick(t0 + ms(1000)), TickOutcome::Dropped { .. }));
    assert_eq!(p.scheduler().state(), SchedulerState::Halted);
    assert!(p.scheduler().monitor().health().channel_failed);
    assert!(!p.scheduler().channel().is_connected());

    // Still accepting work while halted
    p.submit(&raw(3, 1), t0 + ms(1500)).unwrap();
    assert!(matches!(p.tick(t0 + ms(2000)), TickOutcome::Halted));

    p.scheduler_mut().channel_mut().clear();
    p.scheduler_mut().channel_mut().allow_reconnect();
    assert!(matches!(p.tick(t0 + ms(3000)), TickOutcome::Transmitted { .. }));
    assert!(!p.scheduler().monitor().health().channel_failed);

    // Reconnect re-sends the session header
    let mut expected = p.encoder().session_header();
    expected.extend([3; 4]);
    assert_eq!(p.scheduler().channel().writes(), &[expected]);
    assert_eq!(p.scheduler().monitor().counters().jobs_dropped, 1);
}

#[test]
fn test_lost_link_on_status_read_halts() {
    let t0 = Instant::now();
    let mut p = printer(&config(), t0);
    p.submit(&raw(1, 1), t0).unwrap();
    p.scheduler_mut().channel_mut().disconnect();

    assert!(matches!(p.tick(t0), TickOutcome::Halted));
    assert_eq!(p.scheduler().state(), SchedulerState::Halted);
    assert!(p.scheduler().monitor().health().channel_failed);
    assert_eq!(p.scheduler().queue().len(), 1);
    assert_eq!(p.scheduler().monitor().counters().jobs_dropped, 0);

    p.scheduler_mut().channel_mut().allow_reconnect();
    assert!(matches!(p.tick(t0 + ms(100)), TickOutcome::Transmitted { .. }));
}

#[test]
fn test_lost_link_on_dtr_read_halts() {
    let cfg = PrinterConfig {
        enable_dtr_handshaking: true,
        dtr_pin: Some(ModemLine::Dsr),
        ..config()
    };
    let t0 = Instant::now();
    let mut p = printer(&cfg, t0);
    p.submit(&raw(1, 1), t0).unwrap();
    p.scheduler_mut().channel_mut().disconnect_on_dtr_read();

    assert!(matches!(p.tick(t0), TickOutcome::Halted));
    assert_eq!(p.scheduler().state(), SchedulerState::Halted);
    assert!(!p.scheduler().monitor().health().online);
    assert!(p.scheduler().channel().writes().is_empty());
    assert_eq!(p.scheduler().queue().len(), 1);
}

#[test]
fn test_busy_channel_retries_same_job() {
    let t0 = Instant::now();
    let mut p = printer(&config(), t0);
    p.submit(&raw(1, 1), t0).unwrap();
    p.submit(&raw(2, 1), t0).unwrap();

    p.scheduler_mut().channel_mut().fail_next_write(Failure::Busy);
    assert!(matches!(
        p.tick(t0),
        TickOutcome::Blocked(Blocker::ChannelBusy)
    ));
    assert_eq!(p.scheduler().queue().len(), 2);
    assert_eq!(p.scheduler().monitor().counters().jobs_dropped, 0);
    assert!(p.scheduler().monitor().last_error().is_none());

    assert!(matches!(p.tick(t0 + ms(20)), TickOutcome::Transmitted { .. }));
    let writes = p.scheduler().channel().writes();
    assert_eq!(writes.len(), 1);
    assert!(writes[0].ends_with(&[1; 4]));
}

#[test]
fn test_transient_write_error_drops_only_that_job() {
    let t0 = Instant::now();
    let mut p = printer(&config(), t0);
    p.submit(&raw(1, 1), t0).unwrap();
    p.submit(&raw(2, 1), t0).unwrap();

    p.scheduler_mut().channel_mut().fail_next_write(Failure::Io);
    assert!(matches!(p.tick(t0), TickOutcome::Dropped { .. }));
    assert_ne!(p.scheduler().state(), SchedulerState::Halted);

    assert!(matches!(p.tick(t0 + ms(1000)), TickOutcome::Transmitted { .. }));
    assert!(p.scheduler().queue().is_empty());
}

// ============================================================================
// MANUAL MODE
// ============================================================================

#[test]
fn test_manual_mode_waits_for_process_request() {
    let cfg = PrinterConfig {
        auto_process_queue: false,
        ..config()
    };
    let t0 = Instant::now();
    let mut p = printer(&cfg, t0);
    p.submit(&raw(1, 1), t0).unwrap();
    p.submit(&raw(2, 1), t0).unwrap();

    assert!(matches!(
        p.tick(t0),
        TickOutcome::Blocked(Blocker::AwaitingProcess)
    ));
    assert_eq!(p.process_queue(), 2);

    assert!(matches!(p.tick(t0), TickOutcome::Transmitted { .. }));
    assert!(matches!(p.tick(t0 + ms(1000)), TickOutcome::Transmitted { .. }));

    // Drained, so the next job waits again
    p.submit(&raw(3, 1), t0 + ms(1500)).unwrap();
    assert!(matches!(
        p.tick(t0 + ms(2000)),
        TickOutcome::Blocked(Blocker::AwaitingProcess)
    ));
}

// ============================================================================
// SYNCHRONOUS MODE
// ============================================================================

#[test]
fn test_synchronous_mode_reports_cooling() {
    let cfg = PrinterConfig {
        enable_queue_system: false,
        ..config()
    };
    let t0 = Instant::now();
    let mut p = printer(&cfg, t0);

    let first = p.print_text(TextParams::new("one"), t0).unwrap();
    assert!(matches!(first, Submission::Printed { .. }));

    let err = p.print_text(TextParams::new("two"), t0 + ms(400)).unwrap_err();
    assert!(matches!(err, CalorError::Cooling { remaining_ms: 600 }));

    let third = p.print_text(TextParams::new("three"), t0 + ms(1000));
    assert!(matches!(third, Ok(Submission::Printed { .. })));
}

#[test]
fn test_synchronous_mode_recovers_after_disconnect() {
    let cfg = PrinterConfig {
        enable_queue_system: false,
        ..config()
    };
    let t0 = Instant::now();
    let mut p = printer(&cfg, t0);
    p.print_text(TextParams::new("one"), t0).unwrap();

    p.scheduler_mut()
        .channel_mut()
        .fail_next_write(Failure::Disconnect);
    assert!(p.print_text(TextParams::new("two"), t0 + ms(1000)).is_err());
    assert!(!p.scheduler().monitor().health().online);

    p.scheduler_mut().channel_mut().allow_reconnect();
    let err = p.print_text(TextParams::new("three"), t0 + ms(1500)).unwrap_err();
    assert!(matches!(err, CalorError::Cooling { .. }));
    assert!(p.scheduler().monitor().health().online);
    assert!(!p.scheduler().monitor().health().channel_failed);
}
