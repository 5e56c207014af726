//! # Printer Service
//!
//! [`ThermalPrinter`] is the one object callers talk to. It owns the
//! [`Encoder`] and the [`PrintScheduler`] and exposes every print and
//! maintenance operation, both as methods and as a [`ServiceCall`] that can
//! arrive as JSON.
//!
//! ## Queued vs. Synchronous
//!
//! With `enable_queue_system` (the default) print operations return
//! [`Submission::Queued`] and the job goes out on a later tick. Without it the
//! job is written immediately and the call fails instead of waiting when the
//! printer is cooling, not ready or out of paper.
//!
//! ## Service Calls
//!
//! ```json
//! {"service": "print_text", "text": "Hello", "size": "M", "align": "center"}
//! {"service": "print_two_column", "left": "Coffee", "right": "3.50"}
//! {"service": "set_heat_config", "dots": 9, "time": 100, "interval": 3}
//! {"service": "check_paper_sufficiency", "lines": 40}
//! ```

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::channel::ByteChannel;
use crate::encoder::{
    BarcodeParams, EncodedJob, Encoder, Operation, QrParams, ReceiptParams, RotatedTextParams,
    ShoppingListParams, TableRowParams, TextParams, TwoColumnParams,
};
use crate::error::CalorError;
use crate::health::{HealthStatus, PaperCheck, UsageSnapshot};
use crate::printer::{HeatSettings, PrinterConfig};
use crate::protocol::commands;
use crate::queue::JobId;
use crate::scheduler::{PrintScheduler, SchedulerStatus, TickOutcome};

/// Paper a self-test page uses, in lines
const TEST_PAGE_LINES: u32 = 60;

/// Timestamp format for receipts and lists
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Result of a print request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Submission {
    Queued { job_id: JobId },
    Printed { bytes: usize },
}

/// One request, as received over the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "service", rename_all = "snake_case")]
pub enum ServiceCall {
    PrintText(TextParams),
    PrintRotatedText(RotatedTextParams),
    PrintQrCode(QrParams),
    PrintTwoColumn(TwoColumnParams),
    PrintReceipt(ReceiptParams),
    PrintShoppingList(ShoppingListParams),
    PrintBarcode(BarcodeParams),
    PrintTableRow(TableRowParams),
    PrintSeparator,
    PrintTestPage,
    FeedPaper { lines: u8 },
    /// Print text only after checking the sensor and the paper estimate
    SafePrint(TextParams),
    CheckPaperSufficiency { lines: u32 },
    SetHeatConfig(HeatSettings),
    ProcessQueue,
    ClearQueue,
    CancelJob { job_id: JobId },
    ReplacePaperRoll,
    Status,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ServiceReply {
    Queued { job_id: JobId },
    Printed { bytes: usize },
    Paper(PaperCheck),
    HeatUpdated(HeatSettings),
    Processing { pending: usize },
    Cleared { removed: usize },
    Cancelled { job_id: JobId },
    PaperReplaced { remaining_mm: f32 },
    Status(Box<PrinterStatus>),
}

impl From<Submission> for ServiceReply {
    fn from(submission: Submission) -> Self {
        match submission {
            Submission::Queued { job_id } => ServiceReply::Queued { job_id },
            Submission::Printed { bytes } => ServiceReply::Printed { bytes },
        }
    }
}

/// Everything known about the printer, for `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct PrinterStatus {
    pub queue_enabled: bool,
    pub heat: HeatSettings,
    pub cooling_remaining_ms: Option<u64>,
    pub scheduler: SchedulerStatus,
    pub health: HealthStatus,
}

pub struct ThermalPrinter<C: ByteChannel> {
    encoder: Encoder,
    scheduler: PrintScheduler<C>,
    queue_enabled: bool,
}

impl<C: ByteChannel> ThermalPrinter<C> {
    /// Validate `config` and bring the printer up.
    ///
    /// With `startup_message` the banner is submitted straight away.
    pub fn new(channel: C, config: &PrinterConfig, now: Instant) -> Result<Self, CalorError> {
        config.validate()?;
        let encoder = Encoder::new(config);
        let scheduler = PrintScheduler::new(channel, config, &encoder);
        let mut printer = Self {
            encoder,
            scheduler,
            queue_enabled: config.enable_queue_system,
        };

        if config.startup_message {
            let banner = printer.encoder.startup_banner();
            if let Err(e) = printer.submit_encoded(banner, now) {
                warn!(error = %e, "startup message not printed");
            }
        }
        info!(
            queue = config.enable_queue_system,
            capacity = config.max_queue_size,
            "thermal printer ready"
        );
        Ok(printer)
    }

    pub fn scheduler(&self) -> &PrintScheduler<C> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut PrintScheduler<C> {
        &mut self.scheduler
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// Advance the scheduler.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        self.scheduler.tick(now)
    }

    // ------------------------------------------------------------------------
    // Printing
    // ------------------------------------------------------------------------

    /// Encode `operation` and queue it (or print it, without the queue).
    pub fn submit(&mut self, operation: &Operation, now: Instant) -> Result<Submission, CalorError> {
        let job = self.encode(operation)?;
        self.submit_encoded(job, now)
    }

    fn encode(&mut self, operation: &Operation) -> Result<EncodedJob, CalorError> {
        self.encoder.encode(operation).map_err(|e| {
            warn!(kind = ?operation.kind(), error = %e, "operation rejected by encoder");
            self.scheduler
                .monitor_mut()
                .record_encoding_error(&e.to_string());
            CalorError::from(e)
        })
    }

    fn submit_encoded(&mut self, job: EncodedJob, now: Instant) -> Result<Submission, CalorError> {
        if self.queue_enabled {
            let job_id = self.scheduler.enqueue(job, now)?;
            Ok(Submission::Queued { job_id })
        } else {
            let bytes = self.scheduler.transmit_now(job, now)?;
            Ok(Submission::Printed { bytes })
        }
    }

    pub fn print_text(&mut self, params: TextParams, now: Instant) -> Result<Submission, CalorError> {
        self.submit(&Operation::Text(params), now)
    }

    pub fn print_rotated_text(
        &mut self,
        text: &str,
        rotation: u8,
        now: Instant,
    ) -> Result<Submission, CalorError> {
        let params = RotatedTextParams {
            text: text.to_string(),
            rotation,
        };
        self.submit(&Operation::RotatedText(params), now)
    }

    pub fn print_qr_code(
        &mut self,
        data: &str,
        size: u8,
        error_correction: u8,
        now: Instant,
    ) -> Result<Submission, CalorError> {
        let params = QrParams {
            data: data.to_string(),
            size,
            error_correction,
        };
        self.submit(&Operation::QrCode(params), now)
    }

    pub fn print_two_column(
        &mut self,
        params: TwoColumnParams,
        now: Instant,
    ) -> Result<Submission, CalorError> {
        self.submit(&Operation::TwoColumn(params), now)
    }

    /// Print a receipt, stamped with the local time unless a date is given.
    pub fn print_receipt(
        &mut self,
        mut params: ReceiptParams,
        now: Instant,
    ) -> Result<Submission, CalorError> {
        params.date.get_or_insert_with(timestamp);
        self.submit(&Operation::Receipt(params), now)
    }

    pub fn print_shopping_list(
        &mut self,
        mut params: ShoppingListParams,
        now: Instant,
    ) -> Result<Submission, CalorError> {
        params.date.get_or_insert_with(timestamp);
        self.submit(&Operation::ShoppingList(params), now)
    }

    pub fn print_barcode(&mut self, params: BarcodeParams, now: Instant) -> Result<Submission, CalorError> {
        self.submit(&Operation::Barcode(params), now)
    }

    pub fn print_table_row(
        &mut self,
        params: TableRowParams,
        now: Instant,
    ) -> Result<Submission, CalorError> {
        self.submit(&Operation::TableRow(params), now)
    }

    pub fn print_separator(&mut self, now: Instant) -> Result<Submission, CalorError> {
        self.submit(&Operation::Separator, now)
    }

    pub fn print_test_page(&mut self, now: Instant) -> Result<Submission, CalorError> {
        let op = Operation::Raw {
            bytes: commands::test_page(),
            estimated_lines: TEST_PAGE_LINES,
        };
        self.submit(&op, now)
    }

    pub fn feed(&mut self, lines: u8, now: Instant) -> Result<Submission, CalorError> {
        self.submit(&Operation::Feed { lines }, now)
    }

    /// Print text only if the sensor reports paper and the estimate covers it.
    ///
    /// Errors are reported instead of queueing a job that would be rejected
    /// later.
    pub fn safe_print(&mut self, params: TextParams, now: Instant) -> Result<Submission, CalorError> {
        if !self.scheduler.monitor().health().paper_present {
            warn!("safe print refused: paper out");
            return Err(CalorError::PaperOut);
        }
        let job = self.encode(&Operation::Text(params))?;
        if let PaperCheck::Insufficient {
            required_mm,
            remaining_mm,
        } = self.check_paper_sufficiency(job.estimated_lines)
        {
            warn!(required_mm, remaining_mm, "safe print refused: insufficient paper");
            return Err(CalorError::InsufficientPaper {
                required_mm,
                remaining_mm,
            });
        }
        self.submit_encoded(job, now)
    }

    // ------------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------------

    pub fn check_paper_sufficiency(&self, lines: u32) -> PaperCheck {
        self.scheduler.monitor().check_paper_sufficiency(lines)
    }

    /// Validate new heat parameters and send them with the next job.
    pub fn set_heat_config(&mut self, dots: u8, time: u8, interval: u8) -> Result<HeatSettings, CalorError> {
        let heat = HeatSettings::new(dots, time, interval)?;
        self.encoder.set_heat(heat);
        self.scheduler
            .set_session_header(self.encoder.session_header());
        info!(dots, time, interval, intensity = heat.intensity(), "heat configuration updated");
        Ok(heat)
    }

    /// Manual mode: drain the queue on the following ticks.
    pub fn process_queue(&mut self) -> usize {
        self.scheduler.process_queue();
        self.scheduler.queue().len()
    }

    pub fn clear_queue(&mut self) -> usize {
        self.scheduler.clear()
    }

    pub fn cancel_job(&mut self, id: JobId) -> Result<(), CalorError> {
        self.scheduler.cancel(id)
    }

    pub fn replace_paper_roll(&mut self) -> f32 {
        let monitor = self.scheduler.monitor_mut();
        monitor.replace_paper_roll();
        monitor.health().paper_remaining_mm
    }

    pub fn usage_snapshot(&self) -> UsageSnapshot {
        self.scheduler.monitor().snapshot()
    }

    pub fn restore_usage(&mut self, snapshot: &UsageSnapshot) {
        self.scheduler.monitor_mut().restore(snapshot);
    }

    pub fn status(&self, now: Instant) -> PrinterStatus {
        PrinterStatus {
            queue_enabled: self.queue_enabled,
            heat: self.encoder.heat(),
            cooling_remaining_ms: self
                .scheduler
                .cooling_remaining(now)
                .map(|d| d.as_millis() as u64),
            scheduler: self.scheduler.status(),
            health: self.scheduler.monitor().status(),
        }
    }

    /// Dispatch a [`ServiceCall`].
    pub fn call(&mut self, call: ServiceCall, now: Instant) -> Result<ServiceReply, CalorError> {
        let reply = match call {
            ServiceCall::PrintText(p) => self.print_text(p, now)?.into(),
            ServiceCall::PrintRotatedText(p) => self.print_rotated_text(&p.text, p.rotation, now)?.into(),
            ServiceCall::PrintQrCode(p) => self
                .print_qr_code(&p.data, p.size, p.error_correction, now)?
                .into(),
            ServiceCall::PrintTwoColumn(p) => self.print_two_column(p, now)?.into(),
            ServiceCall::PrintReceipt(p) => self.print_receipt(p, now)?.into(),
            ServiceCall::PrintShoppingList(p) => self.print_shopping_list(p, now)?.into(),
            ServiceCall::PrintBarcode(p) => self.print_barcode(p, now)?.into(),
            ServiceCall::PrintTableRow(p) => self.print_table_row(p, now)?.into(),
            ServiceCall::PrintSeparator => self.print_separator(now)?.into(),
            ServiceCall::PrintTestPage => self.print_test_page(now)?.into(),
            ServiceCall::FeedPaper { lines } => self.feed(lines, now)?.into(),
            ServiceCall::SafePrint(p) => self.safe_print(p, now)?.into(),
            ServiceCall::CheckPaperSufficiency { lines } => {
                ServiceReply::Paper(self.check_paper_sufficiency(lines))
            }
            ServiceCall::SetHeatConfig(h) => {
                ServiceReply::HeatUpdated(self.set_heat_config(h.dots, h.time, h.interval)?)
            }
            ServiceCall::ProcessQueue => ServiceReply::Processing {
                pending: self.process_queue(),
            },
            ServiceCall::ClearQueue => ServiceReply::Cleared {
                removed: self.clear_queue(),
            },
            ServiceCall::CancelJob { job_id } => {
                self.cancel_job(job_id)?;
                ServiceReply::Cancelled { job_id }
            }
            ServiceCall::ReplacePaperRoll => ServiceReply::PaperReplaced {
                remaining_mm: self.replace_paper_roll(),
            },
            ServiceCall::Status => ServiceReply::Status(Box::new(self.status(now))),
        };
        Ok(reply)
    }
}

fn timestamp() -> String {
    chrono::Local::now().format(DATE_FORMAT).to_string()
}

// ============================================================================
// TESTS
// ============================================================================
