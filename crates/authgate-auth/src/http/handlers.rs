//! Route handlers and error translation.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::json;

use crate::engine::{
    LoginRequest, LoginResponse, PasswordUpdateRequest, RegistrationRequest, RegistrationResponse,
};
use crate::error::WorkflowError;
use crate::http::AppState;

/// Identity attached to the request by the session middleware.
#[derive(Debug, Clone)]
pub struct SessionUser {
    /// Email claim of the authenticated caller, when present.
    pub email: Option<String>,
}

/// Caller-facing error. Wraps [`WorkflowError`] so the status code and body
/// are decided in one place.
pub struct ApiError(WorkflowError);

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            WorkflowError::Rejected(rejection) if rejection.is_unauthorized() => {
                (StatusCode::UNAUTHORIZED, rejection.to_string())
            }
            WorkflowError::Rejected(rejection) => {
                (StatusCode::BAD_REQUEST, rejection.to_string())
            }
            WorkflowError::EmailDispatch(source) => {
                tracing::error!(error = %source, "reset email dispatch failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error sending email".to_string(),
                )
            }
            fault => {
                tracing::error!(error = %fault, "workflow fault");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub(super) async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let response = state.workflows.login(&request).await?;
    Ok(Json(response))
}

pub(super) async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegistrationRequest>,
) -> Result<(StatusCode, Json<RegistrationResponse>), ApiError> {
    let response = state.workflows.register(&request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub(super) async fn reset_password(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.workflows.reset_password(&email).await?;
    Ok(Json(json!({ "message": "reset email sent" })))
}

pub(super) async fn update_password(
    State(state): State<AppState>,
    session: Option<Extension<SessionUser>>,
    Json(request): Json<PasswordUpdateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = session.as_ref().and_then(|user| user.email.as_deref());
    state.workflows.update_password(email, &request).await?;
    Ok(Json(json!({ "message": "password updated" })))
}
