//! # HTTP Server
//!
//! JSON API in front of the printer task.
//!
//! ## Usage
//!
//! ```bash
//! calor serve --config printer.toml
//! ```
//!
//! ## Routes
//!
//! | Method | Path | Body / Result |
//! |--------|------|---------------|
//! | POST | `/api/service` | any [`ServiceCall`](crate::service::ServiceCall) |
//! | GET | `/api/status` | queue, scheduler and health |
//! | POST | `/api/queue/process` | arm manual processing |
//! | POST | `/api/queue/clear` | drop every queued job |
//! | DELETE | `/api/queue/:id` | cancel one queued job |
//! | GET | `/api/paper/:lines` | paper sufficiency for `lines` |

mod error;
mod handlers;

pub use error::ApiError;

use std::time::{Duration, Instant};

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::channel::SerialChannel;
use crate::error::CalorError;
use crate::health::UsageSnapshot;
use crate::printer::Config;
use crate::runtime::{self, PrinterHandle};
use crate::service::ThermalPrinter;

/// Build the router around a running printer task.
pub fn router(printer: PrinterHandle) -> Router {
    Router::new()
        .route("/api/service", post(handlers::service::call))
        .route("/api/status", get(handlers::service::status))
        .route("/api/paper/:lines", get(handlers::service::paper))
        .route("/api/queue/process", post(handlers::queue::process))
        .route("/api/queue/clear", post(handlers::queue::clear))
        .route("/api/queue/:id", delete(handlers::queue::cancel))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(printer)
}

/// Open the serial device, start the printer task and serve HTTP until the
/// process is stopped.
pub async fn serve(config: Config) -> Result<(), CalorError> {
    config.log_summary();

    let handshake_line = config
        .printer
        .dtr_pin
        .filter(|_| config.printer.enable_dtr_handshaking);
    let channel = SerialChannel::open(&config.serial.device, config.serial.baud_rate, handshake_line)?;
    let mut printer = ThermalPrinter::new(channel, &config.printer, Instant::now())?;

    if let Some(path) = &config.server.usage_file {
        match UsageSnapshot::load(path) {
            Ok(snapshot) => printer.restore_usage(&snapshot),
            Err(e) if path.exists() => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable usage file");
            }
            Err(_) => info!(path = %path.display(), "no saved paper usage, starting with a full roll"),
        }
    }

    let (handle, _task) = runtime::spawn(
        printer,
        Duration::from_millis(config.server.tick_interval_ms),
        config.server.usage_file.clone(),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.listen).await?;
    info!(listen = %config.server.listen, device = %config.serial.device, "calor HTTP server listening");

    axum::serve(listener, router(handle)).await?;
    Ok(())
}
