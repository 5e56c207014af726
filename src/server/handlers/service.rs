//! Service calls, status and paper checks.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::runtime::PrinterHandle;
use crate::server::ApiError;
use crate::service::{PrinterStatus, ServiceCall, ServiceReply};

/// Handle POST /api/service - dispatch one service call.
pub async fn call(
    State(printer): State<PrinterHandle>,
    Json(call): Json<ServiceCall>,
) -> Result<Json<ServiceReply>, ApiError> {
    Ok(Json(printer.call(call).await?))
}

/// Handle GET /api/status
pub async fn status(State(printer): State<PrinterHandle>) -> Result<Json<PrinterStatus>, ApiError> {
    Ok(Json(printer.status().await?))
}

/// Handle GET /api/paper/:lines - would `lines` more lines fit on the roll?
pub async fn paper(
    State(printer): State<PrinterHandle>,
    Path(lines): Path<u32>,
) -> Result<Json<ServiceReply>, ApiError> {
    Ok(Json(
        printer
            .call(ServiceCall::CheckPaperSufficiency { lines })
            .await?,
    ))
}
