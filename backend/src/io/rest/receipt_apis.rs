//! # REST API for Receipts
//!
//! Ledger receipt creation, correction, versioning, and deletion.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::{error, info};

use crate::io::rest::{error_response, mappers};
use crate::AppState;
use shared::{
    ApiResponse, CreateReceiptRequest, ReceiptHistoryResponse, ReceiptResponse,
    UpdateReceiptRequest,
};

/// Create a ledger receipt. A duplicate initial receipt returns the existing
/// row with 200 instead of 201.
pub async fn create_receipt(
    State(state): State<AppState>,
    Json(request): Json<CreateReceiptRequest>,
) -> impl IntoResponse {
    info!("POST /api/receipts - request: {:?}", request);

    let command = mappers::to_create_receipt_command(request);
    match state.receipt_service.create_receipt(command).await {
        Ok(outcome) => {
            let (status, message) = if outcome.was_suppressed() {
                (StatusCode::OK, "Receipt already recorded")
            } else {
                (StatusCode::CREATED, "Receipt created")
            };
            (
                status,
                Json(ApiResponse::ok(ReceiptResponse {
                    receipt: outcome.into_receipt(),
                    success_message: message.to_string(),
                })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to create receipt: {}", e);
            error_response(e)
        }
    }
}

pub async fn update_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<String>,
    Json(request): Json<UpdateReceiptRequest>,
) -> impl IntoResponse {
    info!("PUT /api/receipts/{} - request: {:?}", receipt_id, request);

    let command = mappers::to_update_receipt_command(request);
    match state.receipt_service.update_receipt(&receipt_id, command).await {
        Ok(receipt) => Json(ApiResponse::ok(ReceiptResponse {
            receipt,
            success_message: "Receipt updated".to_string(),
        }))
        .into_response(),
        Err(e) => {
            error!("Failed to update receipt {}: {}", receipt_id, e);
            error_response(e)
        }
    }
}

pub async fn delete_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<String>,
) -> impl IntoResponse {
    info!("DELETE /api/receipts/{}", receipt_id);

    match state.receipt_service.delete_receipt(&receipt_id).await {
        Ok(()) => Json(ApiResponse::ok(())).into_response(),
        Err(e) => {
            error!("Failed to delete receipt {}: {}", receipt_id, e);
            error_response(e)
        }
    }
}

/// Supersede a receipt with a corrected version
pub async fn create_receipt_version(
    State(state): State<AppState>,
    Path(receipt_id): Path<String>,
    Json(request): Json<UpdateReceiptRequest>,
) -> impl IntoResponse {
    info!(
        "POST /api/receipts/{}/versions - request: {:?}",
        receipt_id, request
    );

    let command = mappers::to_update_receipt_command(request);
    match state
        .receipt_service
        .create_receipt_version(&receipt_id, command)
        .await
    {
        Ok(receipt) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok(ReceiptResponse {
                receipt,
                success_message: "Receipt superseded".to_string(),
            })),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to version receipt {}: {}", receipt_id, e);
            error_response(e)
        }
    }
}

/// All versions of a receipt chain, oldest first
pub async fn get_receipt_history(
    State(state): State<AppState>,
    Path(receipt_id): Path<String>,
) -> impl IntoResponse {
    info!("GET /api/receipts/{}/history", receipt_id);

    match state.receipt_service.get_receipt_history(&receipt_id).await {
        Ok(receipts) => {
            Json(ApiResponse::ok(ReceiptHistoryResponse { receipts })).into_response()
        }
        Err(e) => error_response(e),
    }
}
