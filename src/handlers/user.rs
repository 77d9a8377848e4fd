//! User directory handlers.
//!
//! The list endpoint accepts dynamic filter expressions alongside the
//! recognized pagination parameters, so it reads the raw query string
//! twice: once through `Query` for the typed parameters and once through
//! `RawQuery` for the `field[operator]=value` pairs.

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    db::filter::{self, RESERVED_PARAMS},
    dtos::user::{CreateUserRequest, DeleteUserRequest, ListUsersParams, UpdateUserRequest},
    models::FILTER_FIELDS,
    utils::ValidatedJson,
    AppState,
};
use crate::error::AppError;

/// List users with pagination, sorting, search and field filters
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(ListUsersParams),
    responses(
        (status = 200, description = "Matching users", body = [UserResponse]),
        (status = 400, description = "Invalid filter or sort parameter", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ListUsersParams>,
    RawQuery(raw): RawQuery,
) -> Result<impl IntoResponse, AppError> {
    let pairs: Vec<(String, String)> = match raw.as_deref() {
        Some(query) => serde_urlencoded::from_str(query)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid query string: {}", e)))?,
        None => Vec::new(),
    };
    let conditions = filter::parse_filter_params(&pairs, FILTER_FIELDS, RESERVED_PARAMS)?;

    let users = state.users.list(params, conditions).await?;
    Ok((StatusCode::OK, Json(users)))
}

/// Fetch a single user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "The user", body = UserResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.users.get(id).await?;
    Ok((StatusCode::OK, Json(user)))
}

/// Create a user with an explicit permission set
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Email in use or invalid permissions", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 409, description = "Email uniqueness race lost", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.users.create(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Update a user; absent fields are left untouched
#[utoipa::path(
    put,
    path = "/api/v1/users",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Email in use or invalid permissions", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.users.update(req).await?;
    Ok((StatusCode::OK, Json(user)))
}

/// Soft-delete a user after confirming the account password
#[utoipa::path(
    delete,
    path = "/api/v1/users",
    request_body = DeleteUserRequest,
    responses(
        (status = 200, description = "User deleted", body = UserResponse),
        (status = 401, description = "Wrong password or invalid token", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<DeleteUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.users.delete(req).await?;
    Ok((StatusCode::OK, Json(user)))
}
