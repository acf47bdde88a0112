//! Input validation
//!
//! Turns raw request payloads into the validated inputs the repository accepts. Every
//! failure names the offending field.

use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{AppError, AppResult};
use crate::models::{
    Category, CreateSessionRequest, Level, LoginRequest, NewSession, RegisterRequest,
    SessionChanges, SessionStatus, UpdateSessionRequest,
};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Trims a required field, failing when it is absent or blank.
fn required(field: &str, value: Option<String>) -> AppResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::validation(field, format!("{field} is required"))),
    }
}

/// Trims an optional field; a supplied value must still be non-blank.
fn optional(field: &str, value: Option<String>) -> AppResult<Option<String>> {
    value.map(|v| required(field, Some(v))).transpose()
}

fn parse_label<T: FromStr>(field: &str, value: &str, allowed: &str) -> AppResult<T> {
    value.parse().map_err(|_| {
        AppError::validation(
            field,
            format!("`{value}` is not a valid {field}; expected one of {allowed}"),
        )
    })
}

pub fn parse_category(value: &str) -> AppResult<Category> {
    parse_label(
        "category",
        value,
        "Yoga, Meditation, Breathing, Relaxation, Mindfulness, Wellness",
    )
}

pub fn parse_level(value: &str) -> AppResult<Level> {
    parse_label("level", value, "Beginner, Intermediate, Advanced, All Levels")
}

pub fn parse_status(value: &str) -> AppResult<SessionStatus> {
    parse_label("status", value.trim(), "draft, published")
}

/// Blank tags are dropped; the rest keep their order.
fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn validate_new_session(req: CreateSessionRequest) -> AppResult<NewSession> {
    let title = required("title", req.title)?;
    let description = required("description", req.description)?;
    let category = parse_category(&required("category", req.category)?)?;
    let level = parse_level(&required("level", req.level)?)?;
    let duration = required("duration", req.duration)?;
    let image = required("image", req.image)?;
    let status = match req.status {
        Some(s) => parse_status(&s)?,
        None => SessionStatus::Draft,
    };

    Ok(NewSession {
        title,
        description,
        category,
        level,
        duration,
        image,
        tags: clean_tags(req.tags.unwrap_or_default()),
        status,
    })
}

pub fn validate_session_changes(req: UpdateSessionRequest) -> AppResult<SessionChanges> {
    Ok(SessionChanges {
        title: optional("title", req.title)?,
        description: optional("description", req.description)?,
        category: optional("category", req.category)?
            .map(|c| parse_category(&c))
            .transpose()?,
        level: optional("level", req.level)?
            .map(|l| parse_level(&l))
            .transpose()?,
        duration: optional("duration", req.duration)?,
        image: optional("image", req.image)?,
        tags: req.tags.map(clean_tags),
        status: optional("status", req.status)?
            .map(|s| parse_status(&s))
            .transpose()?,
    })
}

pub fn validate_email(email: &str) -> AppResult<()> {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err(AppError::validation("email", "Invalid email format"));
    }
    Ok(())
}

/// Validated registration fields, with the password still in plain text.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub number: String,
    pub password: String,
}

pub fn validate_registration(req: RegisterRequest) -> AppResult<Registration> {
    let username = required("username", req.username)?;
    let email = required("email", req.email)?.to_lowercase();
    validate_email(&email)?;
    let number = required("number", req.number)?;

    let password = req.password.unwrap_or_default();
    if password.is_empty() {
        return Err(AppError::validation("password", "password is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            "password",
            format!("password must be at least {MIN_PASSWORD_LEN} characters long"),
        ));
    }

    Ok(Registration {
        username,
        email,
        number,
        password,
    })
}

/// Normalizes login input: the email is matched case-insensitively, the password as sent.
pub fn validate_login(req: LoginRequest) -> AppResult<(String, String)> {
    let email = required("email", req.email)?.to_lowercase();
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::validation("password", "password is required"))?;
    Ok((email, password))
}
