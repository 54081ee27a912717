//! User HTTP Routes
//!
//! JSON CRUD endpoints over [`UserService`]. Each request gets its own
//! [`RequestContext`] bounded by the configured request timeout. Server
//! shutdown does not touch it; a client that disconnects drops the handler
//! and the store work it was waiting on.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Json, Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::model::{User, UserField, UserInput};
use crate::service::{ServiceError, UserService};

/// Shared user route state
pub struct UserState {
    pub service: UserService,
    request_timeout: Duration,
}

impl UserState {
    pub fn new(service: UserService, request_timeout: Duration) -> Self {
        Self {
            service,
            request_timeout,
        }
    }

    fn request_context(&self) -> RequestContext {
        RequestContext::new().with_timeout(self.request_timeout)
    }
}

/// User routes with shared state
pub fn user_routes(state: Arc<UserState>) -> Router {
    Router::new()
        .route("/users", get(list_users_handler).post(create_user_handler))
        .route("/users/", get(list_users_handler).post(create_user_handler))
        .route(
            "/users/:id",
            get(get_user_handler)
                .put(update_user_handler)
                .delete(delete_user_handler),
        )
        .route(
            "/users/:id/",
            get(get_user_handler)
                .put(update_user_handler)
                .delete(delete_user_handler),
        )
        .with_state(state)
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub country: Option<String>,
    pub email: Option<String>,
}

impl ListQuery {
    fn filter(&self) -> Result<Option<(UserField, &str)>, ServiceError> {
        match (self.country.as_deref(), self.email.as_deref()) {
            (Some(_), Some(_)) => Err(ServiceError::InvalidParams(
                "filter by either country or email, not both".to_string(),
            )),
            (Some(country), None) => Ok(Some((UserField::Country, country))),
            (None, Some(email)) => Ok(Some((UserField::Email, email))),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl From<&ServiceError> for ErrorResponse {
    fn from(err: &ServiceError) -> Self {
        Self {
            error: err.to_string(),
            code: err.status_code(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Log `err` at a level matching its severity and render it.
fn error_response(ctx: &RequestContext, operation: &str, err: ServiceError) -> ApiError {
    match &err {
        e if e.is_server_error() => {
            tracing::error!(request_id = %ctx.request_id, operation, error = %e, "request failed")
        }
        ServiceError::Cancelled => {
            tracing::debug!(request_id = %ctx.request_id, operation, "request cancelled")
        }
        e => tracing::debug!(request_id = %ctx.request_id, operation, error = %e, "request rejected"),
    }

    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(&err)))
}

fn rejection(ctx: &RequestContext, operation: &str, message: String) -> ApiError {
    error_response(ctx, operation, ServiceError::InvalidParams(message))
}

// ==================
// Handlers
// ==================

async fn create_user_handler(
    State(state): State<Arc<UserState>>,
    body: Result<Json<UserInput>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let ctx = state.request_context();
    let Json(input) = body.map_err(|e| rejection(&ctx, "create", e.body_text()))?;

    match state.service.create(&ctx, input).await {
        Ok(user) => {
            tracing::info!(request_id = %ctx.request_id, user_id = %user.id, "user created");
            Ok((StatusCode::CREATED, Json(user)))
        }
        Err(e) => Err(error_response(&ctx, "create", e)),
    }
}

async fn update_user_handler(
    State(state): State<Arc<UserState>>,
    Path(id): Path<String>,
    body: Result<Json<UserInput>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let ctx = state.request_context();
    let Json(input) = body.map_err(|e| rejection(&ctx, "update", e.body_text()))?;

    match state.service.update(&ctx, &id, input).await {
        Ok(user) => {
            tracing::info!(request_id = %ctx.request_id, user_id = %user.id, "user updated");
            Ok(Json(user))
        }
        Err(e) => Err(error_response(&ctx, "update", e)),
    }
}

async fn get_user_handler(
    State(state): State<Arc<UserState>>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let ctx = state.request_context();

    state
        .service
        .get(&ctx, &id)
        .await
        .map(Json)
        .map_err(|e| error_response(&ctx, "get", e))
}

async fn delete_user_handler(
    State(state): State<Arc<UserState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let ctx = state.request_context();

    match state.service.delete(&ctx, &id).await {
        Ok(()) => {
            tracing::info!(request_id = %ctx.request_id, user_id = %id, "user deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => Err(error_response(&ctx, "delete", e)),
    }
}

async fn list_users_handler(
    State(state): State<Arc<UserState>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<User>>, ApiError> {
    let ctx = state.request_context();
    let Query(query) = query.map_err(|e| rejection(&ctx, "list", e.body_text()))?;

    let result = match query.filter() {
        Ok(Some((field, value))) => state.service.list_by(&ctx, field, value).await,
        Ok(None) => state.service.list_all(&ctx).await,
        Err(e) => Err(e),
    };

    result.map(Json).map_err(|e| error_response(&ctx, "list", e))
}
