use crate::{
    AppState,
    auth::{self, AuthUser},
    error::{AppError, AppResult},
    extract::{ApiJson, ApiQuery},
    models::{
        AuthResponse, CreateSessionRequest, DebugSessionsResponse, LoginRequest,
        MessageResponse, NewUser, PageRequest, PaginatedSessions, RegisterRequest, Session,
        SessionFilter, SessionListQuery, SessionSearchQuery, SessionSummary,
        UpdateSessionRequest, User,
    },
    repository::{Engagement, RepositoryState},
    validation,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

// --- Helpers ---

/// Blank query values are treated as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Path ids that are not UUIDs cannot name a stored session.
fn parse_session_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Session"))
}

/// Runs a public listing and shapes it into the paginated response. Without `page` and
/// `limit` the whole matching set is returned as a single page.
async fn paginate(
    repo: &RepositoryState,
    filter: SessionFilter,
    page: Option<u32>,
    limit: Option<u32>,
) -> AppResult<PaginatedSessions> {
    if page.is_none() && limit.is_none() {
        let result = repo.list_published(&filter, None).await?;
        return Ok(PaginatedSessions {
            sessions: result.sessions,
            total_pages: 1,
            current_page: 1,
            total: result.total,
        });
    }

    let request = PageRequest::new(page, limit);
    let result = repo.list_published(&filter, Some(request)).await?;
    Ok(PaginatedSessions {
        total_pages: request.total_pages(result.total),
        current_page: i64::from(request.page),
        sessions: result.sessions,
        total: result.total,
    })
}

/// Loads a session for an owner-only mutation: 404 when it does not exist, 403 when the
/// caller is not its creator.
async fn owned_session(repo: &RepositoryState, raw_id: &str, user_id: Uuid) -> AppResult<Uuid> {
    let id = parse_session_id(raw_id)?;
    let session = repo
        .get_session(id)
        .await?
        .ok_or(AppError::NotFound("Session"))?;

    if !session.is_owned_by(user_id) {
        tracing::warn!(session_id = %id, user_id = %user_id, "ownership check failed");
        return Err(AppError::Forbidden);
    }
    Ok(id)
}

async fn toggle(
    repo: &RepositoryState,
    raw_id: &str,
    user_id: Uuid,
    kind: Engagement,
) -> AppResult<Session> {
    let id = parse_session_id(raw_id)?;
    repo.toggle(id, user_id, kind)
        .await?
        .ok_or(AppError::NotFound("Session"))
}

// --- Auth ---

/// register
///
/// [Public Route] Creates an account and signs the caller in.
///
/// The email is stored lowercased and must be unused; the password is hashed with
/// Argon2 before it reaches the store.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid input or email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let registration = validation::validate_registration(payload)?;
    let password_hash = auth::hash_password(&registration.password)?;

    let user = state
        .repo
        .create_user(NewUser {
            username: registration.username,
            email: registration.email,
            number: registration.number,
            password_hash,
        })
        .await?
        .ok_or_else(|| AppError::validation("email", "User already exists with this email"))?;

    let token = auth::issue_token(user.id, &state.config)?;
    tracing::info!(user_id = %user.id, "user registered");

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// login
///
/// [Public Route] Exchanges email and password for a bearer token. Unknown email and
/// wrong password are reported identically.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let (email, password) = validation::validate_login(payload)?;

    let user = state
        .repo
        .get_user_by_email(&email)
        .await?
        .filter(|user| auth::verify_password(&password, &user.password_hash))
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".into()))?;

    let token = auth::issue_token(user.id, &state.config)?;
    tracing::info!(user_id = %user.id, "user logged in");

    Ok(Json(AuthResponse { token, user }))
}

/// get_me
///
/// [Authenticated Route] Returns the caller's account.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_me(AuthUser { user, .. }: AuthUser) -> Json<User> {
    Json(user)
}

// --- Public session reads ---

/// list_sessions
///
/// [Public Route] Lists published sessions, newest first.
///
/// Optional `category`/`level` equality filters and a free-text `search`. Supplying
/// `page` or `limit` switches to paginated output (`limit` defaults to 10).
#[utoipa::path(
    get,
    path = "/api/sessions",
    params(SessionListQuery),
    responses((status = 200, description = "Published sessions", body = PaginatedSessions))
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SessionListQuery>,
) -> AppResult<Json<PaginatedSessions>> {
    let filter = SessionFilter {
        category: non_blank(query.category),
        level: non_blank(query.level),
        search: non_blank(query.search),
    };
    let page = paginate(&state.repo, filter, query.page, query.limit).await?;
    Ok(Json(page))
}

/// search_sessions
///
/// [Public Route] Same as `list_sessions`, with the search text in `q`. Results are
/// ordered by relevance, then newest first.
#[utoipa::path(
    get,
    path = "/api/sessions/search",
    params(SessionSearchQuery),
    responses((status = 200, description = "Matching published sessions", body = PaginatedSessions))
)]
pub async fn search_sessions(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SessionSearchQuery>,
) -> AppResult<Json<PaginatedSessions>> {
    let filter = SessionFilter {
        category: non_blank(query.category),
        level: non_blank(query.level),
        search: non_blank(query.q),
    };
    let page = paginate(&state.repo, filter, query.page, query.limit).await?;
    Ok(Json(page))
}

/// get_categories
///
/// [Public Route] Distinct categories in use across all sessions, sorted.
#[utoipa::path(
    get,
    path = "/api/sessions/categories",
    responses((status = 200, description = "Categories in use", body = [String]))
)]
pub async fn get_categories(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.repo.distinct_categories().await?))
}

/// get_levels
///
/// [Public Route] Distinct levels in use across all sessions, sorted.
#[utoipa::path(
    get,
    path = "/api/sessions/levels",
    responses((status = 200, description = "Levels in use", body = [String]))
)]
pub async fn get_levels(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.repo.distinct_levels().await?))
}

/// get_session
///
/// [Public Route] Fetches one session by id and counts the view.
///
/// Every successful fetch increments `views` by one, whoever the caller is. A draft is
/// only served to its creator (bearer token optional); anyone else gets 404.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Found", body = Session),
        (status = 401, description = "Authorization header present but invalid"),
        (status = 404, description = "Not Found, or a draft of another user")
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Session>> {
    let id = parse_session_id(&id)?;
    let session = state
        .repo
        .view_session(id, viewer.map(|v| v.id))
        .await?
        .ok_or(AppError::NotFound("Session"))?;
    Ok(Json(session))
}

// --- Authenticated session routes ---

/// get_my_sessions
///
/// [Authenticated Route] All of the caller's sessions, drafts included, most recently
/// updated first.
#[utoipa::path(
    get,
    path = "/api/sessions/my/sessions",
    responses((status = 200, description = "My sessions", body = [Session]))
)]
pub async fn get_my_sessions(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Session>>> {
    Ok(Json(state.repo.list_by_creator(id).await?))
}

/// debug_sessions
///
/// [Authenticated Route] Store-wide session count next to a summary of the caller's own
/// sessions.
#[utoipa::path(
    get,
    path = "/api/sessions/debug/sessions",
    responses((status = 200, description = "Diagnostics", body = DebugSessionsResponse))
)]
pub async fn debug_sessions(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DebugSessionsResponse>> {
    let total_sessions = state.repo.count_sessions().await?;
    let mine = state.repo.list_by_creator(id).await?;

    Ok(Json(DebugSessionsResponse {
        total_sessions,
        user_sessions: mine.len() as i64,
        user_sessions_list: mine.iter().map(SessionSummary::from).collect(),
        user_id: id,
    }))
}

/// create_session
///
/// [Authenticated Route] Creates a session owned by the caller. Status defaults to
/// `draft`.
#[utoipa::path(
    post,
    path = "/api/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Created", body = Session),
        (status = 400, description = "Validation error")
    )
)]
pub async fn create_session(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateSessionRequest>,
) -> AppResult<(StatusCode, Json<Session>)> {
    let new_session = validation::validate_new_session(payload)?;
    let session = state.repo.create_session(id, new_session).await?;

    tracing::info!(session_id = %session.id, creator = %id, status = %session.status, "session created");
    Ok((StatusCode::CREATED, Json(session)))
}

/// update_session
///
/// [Authenticated Route] Partially updates a session.
///
/// *Authorization*: owner only. The record is untouched on any failure.
#[utoipa::path(
    put,
    path = "/api/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, description = "Updated", body = Session),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_session(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateSessionRequest>,
) -> AppResult<Json<Session>> {
    let id = owned_session(&state.repo, &id, user_id).await?;
    let changes = validation::validate_session_changes(payload)?;

    let session = state
        .repo
        .update_session(id, user_id, changes)
        .await?
        .ok_or(AppError::NotFound("Session"))?;
    Ok(Json(session))
}

/// delete_session
///
/// [Authenticated Route] Deletes a session along with its likes and bookmarks.
///
/// *Authorization*: owner only.
#[utoipa::path(
    delete,
    path = "/api/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_session(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = owned_session(&state.repo, &id, user_id).await?;

    if !state.repo.delete_session(id, user_id).await? {
        return Err(AppError::NotFound("Session"));
    }
    tracing::info!(session_id = %id, "session deleted");

    Ok(Json(MessageResponse {
        message: "Session deleted successfully".to_string(),
    }))
}

/// publish_session
///
/// [Authenticated Route] Marks a session as published.
///
/// *Authorization*: owner only.
#[utoipa::path(
    patch,
    path = "/api/sessions/{id}/publish",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Published", body = Session),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn publish_session(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Session>> {
    let id = owned_session(&state.repo, &id, user_id).await?;

    let session = state
        .repo
        .publish_session(id, user_id)
        .await?
        .ok_or(AppError::NotFound("Session"))?;
    tracing::info!(session_id = %id, "session published");
    Ok(Json(session))
}

/// like_session
///
/// [Authenticated Route] Toggles the caller's like: removes it when present, adds it
/// otherwise. Other users' drafts are reported as not found.
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/like",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Toggled", body = Session),
        (status = 404, description = "Not Found")
    )
)]
pub async fn like_session(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Session>> {
    Ok(Json(toggle(&state.repo, &id, user_id, Engagement::Like).await?))
}

/// bookmark_session
///
/// [Authenticated Route] Toggles the caller's bookmark.
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/bookmark",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Toggled", body = Session),
        (status = 404, description = "Not Found")
    )
)]
pub async fn bookmark_session(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Session>> {
    Ok(Json(
        toggle(&state.repo, &id, user_id, Engagement::Bookmark).await?,
    ))
}

// --- Profile listings ---

/// get_liked_sessions
///
/// [Authenticated Route] Sessions the caller has liked. Other users' drafts are left out.
#[utoipa::path(
    get,
    path = "/api/users/likes",
    responses((status = 200, description = "Liked sessions", body = [Session]))
)]
pub async fn get_liked_sessions(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Session>>> {
    Ok(Json(state.repo.list_engaged(id, Engagement::Like).await?))
}

/// get_bookmarked_sessions
///
/// [Authenticated Route] Sessions the caller has bookmarked.
#[utoipa::path(
    get,
    path = "/api/users/bookmarks",
    responses((status = 200, description = "Bookmarked sessions", body = [Session]))
)]
pub async fn get_bookmarked_sessions(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Session>>> {
    Ok(Json(
        state.repo.list_engaged(id, Engagement::Bookmark).await?,
    ))
}
