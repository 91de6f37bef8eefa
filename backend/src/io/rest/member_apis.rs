//! # REST API for Members
//!
//! Registration, profile edits, lookups, and due collection.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::{error, info};

use crate::io::rest::{error_response, mappers};
use crate::AppState;
use shared::{
    ApiResponse, CreateMemberRequest, DueAmountResponse, MemberListResponse, MemberResponse,
    PayDueRequest, PayDueResponse, UpdateMemberRequest,
};

/// Register a member, optionally with an initial payment
pub async fn create_member(
    State(state): State<AppState>,
    Json(request): Json<CreateMemberRequest>,
) -> impl IntoResponse {
    info!("POST /api/members - request: {:?}", request);

    let command = mappers::to_create_member_command(request);
    match state.member_service.create_member(command).await {
        Ok(result) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok(MemberResponse {
                member: result.member,
                success_message: result.success_message,
            })),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to create member: {}", e);
            error_response(e)
        }
    }
}

pub async fn list_members(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/members");

    match state.member_service.list_members().await {
        Ok(members) => {
            Json(ApiResponse::ok(MemberListResponse { members })).into_response()
        }
        Err(e) => {
            error!("Failed to list members: {}", e);
            error_response(e)
        }
    }
}

pub async fn get_member(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
) -> impl IntoResponse {
    info!("GET /api/members/{}", member_id);

    match state.member_service.get_member(&member_id).await {
        Ok(member) => Json(ApiResponse::ok(member)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Edit a member profile; a `paid_amount` field routes through the ledger
pub async fn update_member(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
    Json(request): Json<UpdateMemberRequest>,
) -> impl IntoResponse {
    info!("PUT /api/members/{} - request: {:?}", member_id, request);

    let command = mappers::to_update_member_command(request);
    match state.member_service.update_member(&member_id, command).await {
        Ok(member) => Json(ApiResponse::ok(MemberResponse {
            member,
            success_message: "Member updated".to_string(),
        }))
        .into_response(),
        Err(e) => {
            error!("Failed to update member {}: {}", member_id, e);
            error_response(e)
        }
    }
}

/// Outstanding due and the open receipts behind it
pub async fn get_due_amount(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
) -> impl IntoResponse {
    info!("GET /api/members/{}/due", member_id);

    match state.member_service.get_due_amount(&member_id).await {
        Ok(result) => Json(ApiResponse::ok(DueAmountResponse {
            due_amount: result.due_amount,
            unpaid_invoices: result.unpaid_invoices,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// Record a payment against the member's outstanding due
pub async fn pay_due(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
    Json(request): Json<PayDueRequest>,
) -> impl IntoResponse {
    info!("POST /api/members/{}/pay-due - request: {:?}", member_id, request);

    let command = mappers::to_pay_due_command(request);
    match state.member_service.pay_due(&member_id, command).await {
        Ok(result) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok(PayDueResponse {
                member: result.member,
                receipt: result.receipt,
                confirmation_message: result.confirmation_message,
            })),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to record due payment for {}: {}", member_id, e);
            error_response(e)
        }
    }
}
