//! API Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::ApiResponse;
use crate::monitor_registry::ActivationOutcome;
use crate::state::AppState;
use crate::store::{CreateContactRequest, CreateTargetRequest, UpdateContactRequest};

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // Streams
        .route("/api/streams", get(list_streams))
        .route("/api/streams", post(add_stream))
        .route("/api/streams/activate", put(activate_stream))
        .route("/api/streams/:id", delete(delete_stream))
        // Targets
        .route("/api/targets", get(list_targets))
        .route("/api/targets", post(create_target))
        .route("/api/targets/:id", delete(delete_target))
        // Contacts
        .route("/api/contacts", get(list_contacts))
        .route("/api/contacts", post(create_contact))
        .route("/api/contacts/:id", put(update_contact))
        .route("/api/contacts/:id", delete(delete_contact))
        .with_state(state)
}

// ========================================
// Streams
// ========================================

async fn list_streams(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let streams = state.streams.list().await?;
    Ok(Json(ApiResponse::success(streams)))
}

#[derive(Debug, Deserialize)]
struct AddStreamRequest {
    stream_url: String,
}

/// Register a stream (if new) and start monitoring it.
///
/// Activating a stream that is already being monitored is a no-op; a
/// registered-but-idle stream is simply restarted.
async fn add_stream(
    State(state): State<AppState>,
    Json(req): Json<AddStreamRequest>,
) -> Result<impl IntoResponse> {
    let url = req.stream_url.trim();
    if url.is_empty() {
        return Err(Error::Validation("stream_url must not be empty".to_string()));
    }

    let (record, created) = match state.streams.find_by_url(url).await? {
        Some(existing) => (existing, false),
        None => (state.streams.create(url).await?, true),
    };

    let outcome = state.registry.activate(&record.stream_id, url).await?;
    let message = match outcome {
        ActivationOutcome::Started => format!("Started monitoring stream with URL {}", url),
        ActivationOutcome::AlreadyActive => {
            format!("Stream with URL {} is already being monitored", url)
        }
    };

    let record = state
        .streams
        .get(&record.stream_id)
        .await?
        .ok_or_else(|| Error::Internal("stream row vanished during activation".to_string()))?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ApiResponse::success_with_message(record, message))))
}

#[derive(Debug, Deserialize)]
struct ActivateStreamRequest {
    stream_url: String,
    active: bool,
}

/// Activate or deactivate an existing stream by URL
async fn activate_stream(
    State(state): State<AppState>,
    Json(req): Json<ActivateStreamRequest>,
) -> Result<impl IntoResponse> {
    let record = state
        .streams
        .find_by_url(&req.stream_url)
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!("stream with URL {} does not exist", req.stream_url))
        })?;

    let message = if req.active {
        let outcome = state
            .registry
            .activate(&record.stream_id, &record.stream_url)
            .await?;
        match outcome {
            ActivationOutcome::Started => {
                format!("Stream with URL {} activated", req.stream_url)
            }
            ActivationOutcome::AlreadyActive => {
                format!("Stream with URL {} is already active", req.stream_url)
            }
        }
    } else {
        state.registry.deactivate(&record.stream_id).await?;
        format!("Stream with URL {} deactivated", req.stream_url)
    };

    let record = state
        .streams
        .get(&record.stream_id)
        .await?
        .ok_or_else(|| Error::Internal("stream row vanished during activation".to_string()))?;

    Ok(Json(ApiResponse::success_with_message(record, message)))
}

/// Stop monitoring (if running) and delete the stream row
async fn delete_stream(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
) -> Result<impl IntoResponse> {
    state
        .streams
        .get(&stream_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("stream {}", stream_id)))?;

    state.registry.deactivate(&stream_id).await?;
    state.streams.delete(&stream_id).await?;

    Ok(Json(ApiResponse::success_with_message(
        stream_id,
        "Stream deleted",
    )))
}

// ========================================
// Targets
// ========================================

async fn list_targets(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let targets = state.targets.list().await?;
    Ok(Json(ApiResponse::success(targets)))
}

async fn create_target(
    State(state): State<AppState>,
    Json(req): Json<CreateTargetRequest>,
) -> Result<impl IntoResponse> {
    if req.target_name.trim().is_empty() {
        return Err(Error::Validation("target_name must not be empty".to_string()));
    }
    if req.image_path.trim().is_empty() {
        return Err(Error::Validation("image_path must not be empty".to_string()));
    }

    let target = state
        .targets
        .create(req.target_name.trim(), req.image_path.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(target))))
}

async fn delete_target(
    State(state): State<AppState>,
    Path(target_id): Path<String>,
) -> Result<impl IntoResponse> {
    if !state.targets.delete(&target_id).await? {
        return Err(Error::NotFound(format!("target {}", target_id)));
    }
    Ok(Json(ApiResponse::success_with_message(
        target_id,
        "Target deleted",
    )))
}

// ========================================
// Contacts
// ========================================

async fn list_contacts(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let contacts = state.contacts.list().await?;
    Ok(Json(ApiResponse::success(contacts)))
}

async fn create_contact(
    State(state): State<AppState>,
    Json(req): Json<CreateContactRequest>,
) -> Result<impl IntoResponse> {
    if req.contact_name.trim().is_empty() {
        return Err(Error::Validation(
            "contact_name must not be empty".to_string(),
        ));
    }

    let contact = state.contacts.create(&req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(contact))))
}

async fn update_contact(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateContactRequest>,
) -> Result<impl IntoResponse> {
    let contact = state.contacts.update(id, &req).await?;
    Ok(Json(ApiResponse::success(contact)))
}

async fn delete_contact(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    if !state.contacts.delete(id).await? {
        return Err(Error::NotFound(format!("contact {}", id)));
    }
    Ok(Json(ApiResponse::success_with_message(id, "Contact deleted")))
}
