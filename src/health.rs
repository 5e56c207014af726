//! # Paper and Health Monitor
//!
//! Tracks what the host knows about the printer: link state, the paper
//! sensor, head temperature and an estimate of the paper left on the roll.
//!
//! ## Paper Estimate
//!
//! ```text
//! required_mm  = estimated_lines * line_height_calibration
//! remaining_mm = paper_roll_length - sum(required_mm of transmitted jobs)
//! ```
//!
//! The estimate only goes down, and only after a successful transmission. It
//! returns to the full roll length through [`HealthMonitor::replace_paper_roll`].
//!
//! ## Status Byte (reply to `ESC v 0`)
//!
//! | Bits | Meaning when set |
//! |------|------------------|
//! | 0x0C | paper end / near end |
//! | 0x40 | head over temperature |

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CalorError;
use crate::printer::PrinterConfig;

/// Reply byte of the paper sensor status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusByte(pub u8);

impl StatusByte {
    const PAPER_OUT: u8 = 0x0C;
    const OVERHEAT: u8 = 0x40;

    pub fn paper_present(self) -> bool {
        self.0 & Self::PAPER_OUT == 0
    }

    pub fn overheated(self) -> bool {
        self.0 & Self::OVERHEAT != 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PrinterHealth {
    pub online: bool,
    pub paper_present: bool,
    pub paper_remaining_mm: f32,
    pub heat_budget_ok: bool,
    pub channel_failed: bool,
}

/// Running totals since start-up.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Counters {
    pub jobs_accepted: u64,
    pub jobs_transmitted: u64,
    pub jobs_rejected_full: u64,
    pub jobs_rejected_paper: u64,
    pub jobs_dropped: u64,
    pub encoding_errors: u64,
    pub dtr_timeouts: u64,
    pub lines_printed: u64,
    pub bytes_sent: u64,
}

/// Outcome of a paper check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaperCheck {
    Sufficient,
    Insufficient { required_mm: f32, remaining_mm: f32 },
}

/// Paper accounting that survives a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub paper_remaining_mm: f32,
    pub lines_printed: u64,
    pub jobs_transmitted: u64,
}

impl UsageSnapshot {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CalorError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CalorError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Everything `GET /api/status` reports about health.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    #[serde(flatten)]
    pub health: PrinterHealth,
    pub paper_used_percent: f32,
    pub counters: Counters,
    pub last_error: Option<String>,
}

#[derive(Debug)]
pub struct HealthMonitor {
    health: PrinterHealth,
    counters: Counters,
    line_height_mm: f32,
    roll_length_mm: f32,
    last_error: Option<String>,
}

impl HealthMonitor {
    pub fn new(config: &PrinterConfig) -> Self {
        Self {
            health: PrinterHealth {
                online: true,
                paper_present: true,
                paper_remaining_mm: config.paper_roll_length,
                heat_budget_ok: true,
                channel_failed: false,
            },
            counters: Counters::default(),
            line_height_mm: config.line_height_calibration,
            roll_length_mm: config.paper_roll_length,
            last_error: None,
        }
    }

    pub fn health(&self) -> &PrinterHealth {
        &self.health
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn required_mm(&self, lines: u32) -> f32 {
        lines as f32 * self.line_height_mm
    }

    /// Whether the remaining paper covers `lines`.
    pub fn can_afford(&self, lines: u32) -> bool {
        self.required_mm(lines) <= self.health.paper_remaining_mm
    }

    /// Pure check, callable without enqueueing anything.
    pub fn check_paper_sufficiency(&self, lines: u32) -> PaperCheck {
        if self.can_afford(lines) {
            PaperCheck::Sufficient
        } else {
            PaperCheck::Insufficient {
                required_mm: self.required_mm(lines),
                remaining_mm: self.health.paper_remaining_mm,
            }
        }
    }

    /// Used fraction of the roll, 0..=100.
    pub fn usage_percent(&self) -> f32 {
        let used = self.roll_length_mm - self.health.paper_remaining_mm;
        (used / self.roll_length_mm * 100.0).clamp(0.0, 100.0)
    }

    pub fn status(&self) -> HealthStatus {
        HealthStatus {
            health: self.health.clone(),
            paper_used_percent: self.usage_percent(),
            counters: self.counters.clone(),
            last_error: self.last_error.clone(),
        }
    }

    // ------------------------------------------------------------------------
    // Observations
    // ------------------------------------------------------------------------

    /// Fold a status poll reply into the health record.
    pub fn apply_status(&mut self, status: StatusByte) {
        let paper = status.paper_present();
        if paper != self.health.paper_present {
            if paper {
                info!("paper loaded");
            } else {
                warn!(status = status.0, "paper out");
            }
        }
        let heat_ok = !status.overheated();
        if heat_ok != self.health.heat_budget_ok {
            if heat_ok {
                info!("print head cooled down");
            } else {
                warn!(status = status.0, "print head over temperature");
            }
        }
        self.health.paper_present = paper;
        self.health.heat_budget_ok = heat_ok;
        self.set_online(true);
    }

    pub fn set_online(&mut self, online: bool) {
        if online != self.health.online {
            info!(online, "printer online state changed");
        }
        self.health.online = online;
    }

    pub fn set_channel_failed(&mut self, failed: bool) {
        self.health.channel_failed = failed;
        if failed {
            self.health.online = false;
        }
    }

    pub fn record_accepted(&mut self) {
        self.counters.jobs_accepted += 1;
    }

    pub fn record_queue_full(&mut self) {
        self.counters.jobs_rejected_full += 1;
    }

    pub fn record_encoding_error(&mut self, error: &str) {
        self.counters.encoding_errors += 1;
        self.last_error = Some(error.to_string());
    }

    /// Charge a transmitted job against the roll.
    pub fn record_transmission(&mut self, lines: u32, bytes: usize) {
        let required = self.required_mm(lines);
        self.health.paper_remaining_mm = (self.health.paper_remaining_mm - required).max(0.0);
        self.counters.jobs_transmitted += 1;
        self.counters.lines_printed += u64::from(lines);
        self.counters.bytes_sent += bytes as u64;
        self.set_online(true);
    }

    /// Count header or poll bytes that are not part of a job.
    pub fn record_bytes(&mut self, bytes: usize) {
        self.counters.bytes_sent += bytes as u64;
    }

    pub fn record_drop(&mut self, error: &str) {
        self.counters.jobs_dropped += 1;
        self.last_error = Some(error.to_string());
    }

    pub fn record_paper_rejection(&mut self, required_mm: f32) {
        self.counters.jobs_rejected_paper += 1;
        self.last_error = Some(format!(
            "insufficient paper: need {required_mm:.1}mm, {:.1}mm remaining",
            self.health.paper_remaining_mm
        ));
    }

    pub fn record_dtr_timeout(&mut self) {
        self.counters.dtr_timeouts += 1;
        self.last_error = Some("DTR handshake timed out".to_string());
        self.set_online(false);
    }

    pub fn record_error(&mut self, error: &str) {
        self.last_error = Some(error.to_string());
    }

    // ------------------------------------------------------------------------
    // Operator actions
    // ------------------------------------------------------------------------

    /// A fresh roll was loaded.
    pub fn replace_paper_roll(&mut self) {
        self.health.paper_remaining_mm = self.roll_length_mm;
        self.health.paper_present = true;
        info!(length_mm = self.roll_length_mm, "paper roll replaced");
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            paper_remaining_mm: self.health.paper_remaining_mm,
            lines_printed: self.counters.lines_printed,
            jobs_transmitted: self.counters.jobs_transmitted,
        }
    }

    /// Continue from a saved snapshot.
    pub fn restore(&mut self, snapshot: &UsageSnapshot) {
        self.health.paper_remaining_mm = snapshot.paper_remaining_mm.clamp(0.0, self.roll_length_mm);
        self.counters.lines_printed = snapshot.lines_printed;
        self.counters.jobs_transmitted = snapshot.jobs_transmitted;
        info!(
            remaining_mm = self.health.paper_remaining_mm,
            lines = snapshot.lines_printed,
            "paper usage restored"
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
