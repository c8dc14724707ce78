//! Request validation for signup and profile updates.
//!
//! Validators collect every problem instead of stopping at the first one, so a
//! client can fix a form in a single round trip.

use std::sync::LazyLock;

use regex::Regex;

const MAX_EMAIL_LEN: usize = 254;
const MAX_NAME_LEN: usize = 50;
const MAX_PROFILE_FIELD_LEN: usize = 100;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
        .unwrap_or_else(|e| panic!("email regex must be valid: {e}"))
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Borrowed view of a signup payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignupFields<'a> {
    pub email: Option<&'a str>,
    pub password: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub preferable_activity: Option<&'a str>,
    pub target: Option<&'a str>,
}

/// Borrowed view of a profile update payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateFields<'a> {
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub preferable_activity: Option<&'a str>,
    pub target: Option<&'a str>,
}

pub fn validate_signup(fields: &SignupFields<'_>) -> ValidationResult {
    let mut errors = Vec::new();

    match fields.email.map(str::trim).filter(|email| !email.is_empty()) {
        None => errors.push(String::from("Email is required")),
        Some(email) if email.chars().count() > MAX_EMAIL_LEN => errors.push(format!(
            "Email must be at most {MAX_EMAIL_LEN} characters"
        )),
        Some(email) if !EMAIL_RE.is_match(email) => {
            errors.push(String::from("Email format is invalid"))
        }
        Some(_) => {}
    }

    if fields.password.map_or(true, str::is_empty) {
        errors.push(String::from("Password is required"));
    }

    check_optional_name("First name", fields.first_name, &mut errors);
    check_optional_name("Last name", fields.last_name, &mut errors);
    check_profile_field("Preferable activity", fields.preferable_activity, &mut errors);
    check_profile_field("Target", fields.target, &mut errors);

    ValidationResult::from_errors(errors)
}

pub fn validate_user_update(fields: &UpdateFields<'_>) -> ValidationResult {
    let mut errors = Vec::new();

    check_required_name("First name", fields.first_name, &mut errors);
    check_required_name("Last name", fields.last_name, &mut errors);
    check_profile_field("Preferable activity", fields.preferable_activity, &mut errors);
    check_profile_field("Target", fields.target, &mut errors);

    ValidationResult::from_errors(errors)
}

fn check_required_name(label: &str, value: Option<&str>, errors: &mut Vec<String>) {
    match value {
        Some(name) => check_name(label, name, errors),
        None => errors.push(format!("{label} is required")),
    }
}

fn check_optional_name(label: &str, value: Option<&str>, errors: &mut Vec<String>) {
    if let Some(name) = value {
        check_name(label, name, errors);
    }
}

fn check_name(label: &str, name: &str, errors: &mut Vec<String>) {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        errors.push(format!("{label} is required"));
    } else if trimmed.chars().count() > MAX_NAME_LEN {
        errors.push(format!("{label} must be at most {MAX_NAME_LEN} characters"));
    }
}

fn check_profile_field(label: &str, value: Option<&str>, errors: &mut Vec<String>) {
    if value.is_some_and(|v| v.chars().count() > MAX_PROFILE_FIELD_LEN) {
        errors.push(format!(
            "{label} must be at most {MAX_PROFILE_FIELD_LEN} characters"
        ));
    }
}
