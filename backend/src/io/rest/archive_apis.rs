//! # REST API for the Deletion Archive
//!
//! Soft delete, restore, and permanent purge of members.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
};
use log::{error, info};

use crate::io::rest::error_response;
use crate::AppState;
use shared::{
    ApiResponse, DeleteMemberRequest, RestoreMemberRequest, RestoreMemberResponse,
    SnapshotListResponse,
};

/// Archive a member and remove it with its dependent rows
pub async fn delete_member(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
    Json(request): Json<DeleteMemberRequest>,
) -> impl IntoResponse {
    info!("DELETE /api/members/{} - by {}", member_id, request.actor);

    match state
        .archive_service
        .delete_member(&member_id, &request.actor, request.reason)
        .await
    {
        Ok(snapshot) => Json(ApiResponse::ok(snapshot)).into_response(),
        Err(e) => {
            error!("Failed to delete member {}: {}", member_id, e);
            error_response(e)
        }
    }
}

/// Bring an archived member back to life
pub async fn restore_member(
    State(state): State<AppState>,
    Json(request): Json<RestoreMemberRequest>,
) -> impl IntoResponse {
    info!("POST /api/members/restore - snapshot {}", request.snapshot_id);

    match state
        .archive_service
        .restore_deleted_member(&request.snapshot_id)
        .await
    {
        Ok(member) => Json(ApiResponse::ok(RestoreMemberResponse {
            member_id: member.id.clone(),
            success_message: format!(
                "Member {} restored with number {}",
                member.name, member.member_number
            ),
        }))
        .into_response(),
        Err(e) => {
            error!("Failed to restore snapshot {}: {}", request.snapshot_id, e);
            error_response(e)
        }
    }
}

pub async fn list_snapshots(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/archive");

    match state.archive_service.list_snapshots().await {
        Ok(snapshots) => {
            Json(ApiResponse::ok(SnapshotListResponse { snapshots })).into_response()
        }
        Err(e) => {
            error!("Failed to list snapshots: {}", e);
            error_response(e)
        }
    }
}

/// Purge a snapshot; the member becomes unrecoverable
pub async fn permanently_delete(
    State(state): State<AppState>,
    Path(snapshot_id): Path<String>,
) -> impl IntoResponse {
    info!("DELETE /api/archive/{}", snapshot_id);

    match state
        .archive_service
        .permanently_delete_member(&snapshot_id)
        .await
    {
        Ok(()) => Json(ApiResponse::ok(())).into_response(),
        Err(e) => {
            error!("Failed to purge snapshot {}: {}", snapshot_id, e);
            error_response(e)
        }
    }
}
