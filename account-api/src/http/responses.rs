use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::user::{NewUser, User, UserId, UserPatch};
use crate::validation::{SignupFields, UpdateFields};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Success envelope: `{"success": true, ...payload}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(flatten)]
    pub payload: T,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

pub type Reply<T> = (StatusCode, Json<Envelope<T>>);

pub fn reply<T: Serialize>(status: StatusCode, payload: T) -> Reply<T> {
    (
        status,
        Json(Envelope {
            success: true,
            payload,
        }),
    )
}

#[derive(Debug, Serialize)]
pub struct UserPayload {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MessageUserPayload {
    pub message: &'static str,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MessagePayload {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct EmailCheckPayload {
    pub data: EmailExists,
}

#[derive(Debug, Serialize)]
pub struct EmailExists {
    pub exists: bool,
}

#[derive(Debug, Deserialize)]
pub struct CheckEmailQuery {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub preferable_activity: Option<String>,
    pub target: Option<String>,
}

impl RegisterRequest {
    pub fn fields(&self) -> SignupFields<'_> {
        SignupFields {
            email: self.email.as_deref(),
            password: self.password.as_deref(),
            first_name: self.first_name.as_deref(),
            last_name: self.last_name.as_deref(),
            preferable_activity: self.preferable_activity.as_deref(),
            target: self.target.as_deref(),
        }
    }

    /// `None` if email or password is missing; callers validate first.
    pub fn into_new_user(self) -> Option<NewUser> {
        Some(NewUser {
            email: self.email?.trim().to_string(),
            password: self.password?,
            first_name: self.first_name.map(|name| name.trim().to_string()),
            last_name: self.last_name.map(|name| name.trim().to_string()),
            preferable_activity: present(self.preferable_activity),
            target: present(self.target),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub user_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub preferable_activity: Option<String>,
    pub target: Option<String>,
}

impl UpdateProfileRequest {
    pub fn fields(&self) -> UpdateFields<'_> {
        UpdateFields {
            first_name: self.first_name.as_deref(),
            last_name: self.last_name.as_deref(),
            preferable_activity: self.preferable_activity.as_deref(),
            target: self.target.as_deref(),
        }
    }

    /// Builds the forwarded patch. Optional fields are carried only when the
    /// client sent a non-empty value. `None` if a name is missing.
    pub fn into_patch(self, user_id: UserId) -> Option<UserPatch> {
        Some(UserPatch {
            user_id,
            first_name: self.first_name?.trim().to_string(),
            last_name: self.last_name?.trim().to_string(),
            preferable_activity: present(self.preferable_activity),
            target: present(self.target),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub user_id: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

pub fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
