use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower_governor::{
    governor::GovernorConfigBuilder,
    key_extractor::GlobalKeyExtractor,
    GovernorLayer,
};
use tracing::{debug, error, info, warn};

use crate::user::{ServiceError, UserId};
use crate::validation::{validate_signup, validate_user_update};

use super::error::ApiError;
use super::responses::{
    present, reply, ChangePasswordRequest, CheckEmailQuery, EmailCheckPayload, EmailExists,
    HealthResponse, MessagePayload, MessageUserPayload, RegisterRequest, Reply,
    UpdateProfileRequest, UserPayload,
};
use super::state::AppState;

pub fn router(state: AppState) -> Router {
    let users = Router::new()
        .route("/register", post(register))
        .route("/check-email", get(check_email))
        .route("/current", get(current_user))
        .route("/edit-profile", put(update_profile))
        .route("/{id}/password", put(change_password))
        .route("/{id}", get(profile))
        .method_not_allowed_fallback(method_not_allowed);

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/users", users);

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(20)
        .burst_size(50)
        .key_extractor(GlobalKeyExtractor)
        .finish();
    let app = match governor_conf {
        Some(conf) => app.layer(GovernorLayer::new(Arc::new(conf))),
        None => {
            warn!("invalid rate limiter configuration; serving without rate limiting");
            app
        }
    };

    // Set must wrap Propagate so generated ids reach the response.
    app.layer(tower_http::request_id::PropagateRequestIdLayer::new(
        axum::http::header::HeaderName::from_static("x-request-id"),
    ))
    .layer(tower_http::request_id::SetRequestIdLayer::new(
        axum::http::header::HeaderName::from_static("x-request-id"),
        tower_http::request_id::MakeRequestUuid::default(),
    ))
    .layer(tower_http::trace::TraceLayer::new_for_http())
    .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Unwraps a JSON body, turning malformed input into a 400 envelope.
fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        debug!(error = %rejection, "rejected request body");
        ApiError::BadRequest("Invalid request body")
    })
}

async fn check_email(
    State(state): State<AppState>,
    query: Result<Query<CheckEmailQuery>, QueryRejection>,
) -> Result<Reply<EmailCheckPayload>, ApiError> {
    let Query(query) = query.map_err(|rejection| {
        debug!(error = %rejection, "rejected check-email query");
        ApiError::BadRequest("Email parameter is required")
    })?;
    let email = query
        .email
        .filter(|email| !email.trim().is_empty())
        .ok_or(ApiError::BadRequest("Email parameter is required"))?;

    let exists = state.users.email_exists(&email).await.map_err(|err| {
        error!(error = %err, "error checking email");
        ApiError::internal("Internal server error")
    })?;
    debug!(exists, "email check requested");

    Ok(reply(
        StatusCode::OK,
        EmailCheckPayload {
            data: EmailExists { exists },
        },
    ))
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Reply<MessageUserPayload>, ApiError> {
    let request = parse_body(payload)?;

    let validation = validate_signup(&request.fields());
    if !validation.is_valid {
        debug!(errors = ?validation.errors, "signup validation failed");
        return Err(ApiError::Validation {
            errors: validation.errors,
        });
    }
    let new_user = request
        .into_new_user()
        .ok_or(ApiError::BadRequest("Validation failed"))?;

    let email_taken = state
        .users
        .email_exists(&new_user.email)
        .await
        .map_err(|err| {
            error!(error = %err, "error registering user");
            ApiError::internal("Internal server error")
        })?;
    if email_taken {
        debug!("registration rejected: email already exists");
        return Err(email_conflict());
    }

    let user = match state.users.create_user(new_user).await {
        Ok(user) => user,
        Err(ServiceError::EmailTaken) => {
            debug!("registration lost email uniqueness race");
            return Err(email_conflict());
        }
        Err(err) => {
            error!(error = %err, "error registering user");
            return Err(ApiError::internal("Internal server error"));
        }
    };
    info!(user_id = %user.id, "user registered");

    Ok(reply(
        StatusCode::CREATED,
        MessageUserPayload {
            message: "User registered successfully",
            user,
        },
    ))
}

fn email_conflict() -> ApiError {
    ApiError::Conflict("Email already exists. Please use a different email.")
}

/// Which route a lookup came through; only the messages differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookupEntry {
    Current,
    Profile,
}

impl LookupEntry {
    fn missing_id_message(self) -> &'static str {
        match self {
            LookupEntry::Current => "Missing userId in path",
            LookupEntry::Profile => "User ID is required",
        }
    }

    fn failure_message(self) -> &'static str {
        match self {
            LookupEntry::Current => "Internal server error",
            LookupEntry::Profile => "Failed to get profile",
        }
    }
}

async fn lookup_user(
    state: &AppState,
    raw_id: Option<&str>,
    entry: LookupEntry,
) -> Result<Reply<UserPayload>, ApiError> {
    let user_id = raw_id
        .and_then(UserId::parse)
        .ok_or(ApiError::BadRequest(entry.missing_id_message()))?;

    let user = state
        .users
        .get_user_by_id(&user_id)
        .await
        .map_err(|err| {
            error!(error = %err, user_id = %user_id, lookup = ?entry, "error fetching user");
            ApiError::internal(entry.failure_message())
        })?
        .ok_or(ApiError::UserNotFound)?;
    debug!(user_id = %user.id, lookup = ?entry, "user fetched");

    Ok(reply(StatusCode::OK, UserPayload { user }))
}

/// `/current` carries no id segment, so the lookup never receives an id and
/// answers 400.
async fn current_user(State(state): State<AppState>) -> Result<Reply<UserPayload>, ApiError> {
    lookup_user(&state, None, LookupEntry::Current).await
}

async fn profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Reply<UserPayload>, ApiError> {
    lookup_user(&state, Some(&id), LookupEntry::Profile).await
}

async fn update_profile(
    State(state): State<AppState>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Reply<MessageUserPayload>, ApiError> {
    let request = parse_body(payload)?;

    let user_id = request
        .user_id
        .as_deref()
        .and_then(UserId::parse)
        .ok_or(ApiError::BadRequest("User ID is required"))?;

    let validation = validate_user_update(&request.fields());
    if !validation.is_valid {
        debug!(errors = ?validation.errors, "profile validation failed");
        return Err(ApiError::Validation {
            errors: validation.errors,
        });
    }
    let patch = request
        .into_patch(user_id)
        .ok_or(ApiError::BadRequest("Validation failed"))?;

    let user = match state.users.update_user(patch).await {
        Ok(user) => user,
        Err(ServiceError::UserNotFound) => {
            warn!("profile update for unknown user");
            return Err(ApiError::UserNotFound);
        }
        Err(err) => {
            error!(error = %err, "error updating user");
            let message = err.to_string();
            return Err(if message.is_empty() {
                ApiError::internal("Failed to update profile")
            } else {
                ApiError::Internal(message)
            });
        }
    };
    debug!(user_id = %user.id, "profile updated");

    Ok(reply(
        StatusCode::OK,
        MessageUserPayload {
            message: "Profile updated successfully",
            user,
        },
    ))
}

/// The user id comes from the body; the `{id}` path segment is not consulted.
async fn change_password(
    State(state): State<AppState>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Reply<MessagePayload>, ApiError> {
    let request = parse_body(payload)?;

    let (Some(user_id), Some(current_password), Some(new_password)) = (
        request.user_id.as_deref().and_then(UserId::parse),
        present(request.current_password),
        present(request.new_password),
    ) else {
        return Err(ApiError::BadRequest("All fields are required"));
    };

    let failed = |err: ServiceError| {
        error!(error = %err, "error changing password");
        ApiError::internal("Failed to change password")
    };

    let user = state
        .users
        .get_user_by_id(&user_id)
        .await
        .map_err(failed)?
        .ok_or(ApiError::UserNotFound)?;

    let verified = state
        .users
        .verify_password(&user.id, &current_password)
        .await
        .map_err(failed)?;
    if !verified {
        warn!(user_id = %user.id, "password change rejected: current password mismatch");
        return Err(ApiError::IncorrectPassword);
    }

    state
        .users
        .update_password(&user.id, &new_password)
        .await
        .map_err(failed)?;
    info!(user_id = %user.id, "password changed");

    Ok(reply(
        StatusCode::OK,
        MessagePayload {
            message: "Password updated successfully",
        },
    ))
}
