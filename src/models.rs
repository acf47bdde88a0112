use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// --- Enumerations ---

/// Category
///
/// The fixed set of session categories. The string form is what the store and the
/// wire format carry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    Serialize, Deserialize, TS, ToSchema, AsRefStr, Display, EnumString, EnumIter,
)]
#[ts(export)]
pub enum Category {
    #[default]
    Yoga,
    Meditation,
    Breathing,
    Relaxation,
    Mindfulness,
    Wellness,
}

/// Level
///
/// Difficulty label. `AllLevels` is spelled "All Levels" everywhere outside Rust.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    Serialize, Deserialize, TS, ToSchema, AsRefStr, Display, EnumString, EnumIter,
)]
#[ts(export)]
pub enum Level {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    #[serde(rename = "All Levels")]
    #[strum(serialize = "All Levels")]
    AllLevels,
}

/// SessionStatus
///
/// Visibility state. Drafts are only ever returned to their creator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default,
    Serialize, Deserialize, TS, ToSchema, AsRefStr, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[ts(export)]
pub enum SessionStatus {
    #[default]
    Draft,
    Published,
}

// --- Core Records ---

/// User
///
/// A registered account. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Phone number, stored as entered.
    pub number: String,
    #[serde(skip)]
    pub password_hash: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Session
///
/// A user-authored wellness activity. `likes` and `bookmarks` are sets of user ids, so a
/// user can appear in each at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Session {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub level: Level,
    /// Free-text label such as "30min".
    pub duration: String,
    /// Cover image URL.
    pub image: String,
    pub tags: Vec<String>,
    pub status: SessionStatus,
    /// The owning user. Set at creation and never changed.
    pub creator: CreatorRef,
    pub likes: BTreeSet<Uuid>,
    pub bookmarks: BTreeSet<Uuid>,
    pub views: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn is_published(&self) -> bool {
        self.status == SessionStatus::Published
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.creator.id == user_id
    }
}

/// CreatorRef
///
/// The creator as embedded in a session: the id plus the username joined in for display.
/// `username` is `None` only when the account row is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreatorRef {
    #[serde(alias = "_id")]
    pub id: Uuid,
    pub username: Option<String>,
}

impl CreatorRef {
    pub fn new(id: Uuid) -> Self {
        Self { id, username: None }
    }
}

// --- Validated Inputs (Repository Layer) ---

/// NewSession
///
/// A fully validated session ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub level: Level,
    pub duration: String,
    pub image: String,
    pub tags: Vec<String>,
    pub status: SessionStatus,
}

/// SessionChanges
///
/// A validated partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub level: Option<Level>,
    pub duration: Option<String>,
    pub image: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<SessionStatus>,
}

/// NewUser
///
/// A validated registration with the password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub number: String,
    pub password_hash: String,
}

/// SessionFilter
///
/// Equality filters and free-text search applied to public listings. Values are
/// compared against the stored labels as-is, so an unknown label matches nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionFilter {
    pub category: Option<String>,
    pub level: Option<String>,
    pub search: Option<String>,
}

/// PageRequest
///
/// 1-indexed page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 10;

    /// Builds a page request from optional query values; zero or missing values fall
    /// back to page 1 and the default limit.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1),
            limit: limit.filter(|l| *l > 0).unwrap_or(Self::DEFAULT_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }

    /// ceil(total / limit)
    pub fn total_pages(&self, total: i64) -> i64 {
        let limit = i64::from(self.limit);
        (total + limit - 1) / limit
    }
}

/// SessionPage
///
/// One slice of a listing plus the size of the whole matching set.
#[derive(Debug, Clone, Default)]
pub struct SessionPage {
    pub sessions: Vec<Session>,
    pub total: i64,
}

// --- Request Payloads (Input Schemas) ---

/// CreateSessionRequest
///
/// Input payload for POST /sessions. Fields arrive as raw strings so that missing or
/// unknown values can be reported per field.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    #[schema(example = "Yoga")]
    pub category: Option<String>,
    #[serde(default)]
    #[schema(example = "Beginner")]
    pub level: Option<String>,
    #[serde(default)]
    #[schema(example = "30min")]
    pub duration: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// "draft" (default) or "published".
    #[serde(default)]
    pub status: Option<String>,
}

/// UpdateSessionRequest
///
/// Partial update payload for PUT /sessions/{id}. Only provided fields are changed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateSessionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// RegisterRequest
///
/// Input payload for POST /auth/register.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Pagination values that are not non-negative integers (`?page=abc`) read as absent and
/// fall back to the defaults.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.trim().parse().ok()))
}

/// Query string of GET /sessions.
#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
pub struct SessionListQuery {
    pub category: Option<String>,
    pub level: Option<String>,
    /// Free-text search over title and description.
    pub search: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub page: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub limit: Option<u32>,
}

/// Query string of GET /sessions/search.
#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
pub struct SessionSearchQuery {
    /// Free-text search over title and description.
    pub q: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub page: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub limit: Option<u32>,
}

// --- Response Payloads (Output Schemas) ---

/// AuthResponse
///
/// Returned by register and login: a bearer token and the account it identifies.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// PaginatedSessions
///
/// Response of the public listing and search endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaginatedSessions {
    pub sessions: Vec<Session>,
    pub total_pages: i64,
    pub current_page: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// SessionSummary
///
/// Compact row used by the owner diagnostics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionSummary {
    pub id: Uuid,
    pub title: String,
    pub status: SessionStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            title: session.title.clone(),
            status: session.status,
            created_at: session.created_at,
        }
    }
}

/// DebugSessionsResponse
///
/// Output of GET /sessions/debug/sessions.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DebugSessionsResponse {
    pub total_sessions: i64,
    pub user_sessions: i64,
    pub user_sessions_list: Vec<SessionSummary>,
    pub user_id: Uuid,
}
