//! Queue control.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::queue::JobId;
use crate::runtime::PrinterHandle;
use crate::server::ApiError;
use crate::service::{ServiceCall, ServiceReply};

/// Handle POST /api/queue/process - start draining in manual mode.
pub async fn process(State(printer): State<PrinterHandle>) -> Result<Json<ServiceReply>, ApiError> {
    Ok(Json(printer.call(ServiceCall::ProcessQueue).await?))
}

/// Handle POST /api/queue/clear
pub async fn clear(State(printer): State<PrinterHandle>) -> Result<Json<ServiceReply>, ApiError> {
    Ok(Json(printer.call(ServiceCall::ClearQueue).await?))
}

/// Handle DELETE /api/queue/:id - cancel a job that has not been sent yet.
pub async fn cancel(
    State(printer): State<PrinterHandle>,
    Path(id): Path<u64>,
) -> Result<Json<ServiceReply>, ApiError> {
    let call = ServiceCall::CancelJob { job_id: JobId(id) };
    Ok(Json(printer.call(call).await?))
}
