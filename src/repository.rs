use crate::error::RepositoryError;
use crate::models::{
    CreatorRef, NewSession, NewUser, PageRequest, Session, SessionChanges, SessionFilter,
    SessionPage, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Engagement
///
/// The two per-user membership sets a session carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engagement {
    Like,
    Bookmark,
}

impl Engagement {
    fn table(self) -> &'static str {
        match self {
            Engagement::Like => "session_likes",
            Engagement::Bookmark => "session_bookmarks",
        }
    }
}

/// Postgres' `english` stop words. The text-search parser drops them from documents and
/// queries alike, so they can never match.
const STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by",
    "for", "with", "about", "against", "between", "into", "through", "during", "before",
    "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over",
    "under", "again", "further", "then", "once", "here", "there", "when", "where", "why",
    "how", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "no",
    "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will",
    "just", "don", "should", "now",
];

/// Splits free text into lowercase word terms. Punctuation and stop words never reach
/// the store.
pub fn search_terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Terms of the filter's free-text search; `None` when no search was requested.
/// `Some` with no terms means the text was all punctuation or stop words, and such a
/// search matches nothing.
pub fn filter_terms(filter: &SessionFilter) -> Option<Vec<String>> {
    filter.search.as_deref().map(search_terms)
}

/// Repository Trait
///
/// The persistence contract shared by the Postgres store and the in-memory store.
/// Owner-only operations take the caller's id and refuse to touch rows they do not own;
/// handlers check ownership first so they can tell "missing" from "not yours".
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    /// Returns `None` when the email is already registered.
    async fn create_user(&self, user: NewUser) -> RepoResult<Option<User>>;
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    // --- Public Retrieval ---
    /// Published sessions only. `page = None` returns the whole matching set.
    async fn list_published(
        &self,
        filter: &SessionFilter,
        page: Option<PageRequest>,
    ) -> RepoResult<SessionPage>;
    /// Plain lookup, no side effects.
    async fn get_session(&self, id: Uuid) -> RepoResult<Option<Session>>;
    /// Lookup that increments the view counter by exactly one. Drafts are only visible
    /// to their creator: for anyone else (or `viewer = None`) a draft is `None` and is
    /// not counted.
    async fn view_session(&self, id: Uuid, viewer: Option<Uuid>) -> RepoResult<Option<Session>>;
    async fn distinct_categories(&self) -> RepoResult<Vec<String>>;
    async fn distinct_levels(&self) -> RepoResult<Vec<String>>;
    async fn count_sessions(&self) -> RepoResult<i64>;

    // --- Owner Actions ---
    /// Every session of `creator`, any status, most recently updated first.
    async fn list_by_creator(&self, creator: Uuid) -> RepoResult<Vec<Session>>;
    async fn create_session(&self, creator: Uuid, session: NewSession) -> RepoResult<Session>;
    async fn update_session(
        &self,
        id: Uuid,
        creator: Uuid,
        changes: SessionChanges,
    ) -> RepoResult<Option<Session>>;
    async fn delete_session(&self, id: Uuid, creator: Uuid) -> RepoResult<bool>;
    async fn publish_session(&self, id: Uuid, creator: Uuid) -> RepoResult<Option<Session>>;

    // --- Engagement ---
    /// Adds `user_id` to the set if absent, removes it if present. Another user's draft
    /// is treated as missing.
    async fn toggle(
        &self,
        id: Uuid,
        user_id: Uuid,
        kind: Engagement,
    ) -> RepoResult<Option<Session>>;
    /// Sessions in whose `kind` set the user appears: published ones plus the user's own.
    async fn list_engaged(&self, user_id: Uuid, kind: Engagement) -> RepoResult<Vec<Session>>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer stored in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres ---

const SESSION_SELECT: &str = r#"
    SELECT
        s.id, s.title, s.description, s.category, s.level, s.duration, s.image, s.tags,
        s.status, s.creator_id, u.username AS creator_username,
        ARRAY(SELECT l.user_id FROM session_likes l WHERE l.session_id = s.id) AS likes,
        ARRAY(SELECT b.user_id FROM session_bookmarks b WHERE b.session_id = s.id) AS bookmarks,
        s.views, s.created_at, s.updated_at
    FROM sessions s
    LEFT JOIN users u ON u.id = s.creator_id
"#;

/// Raw `sessions` row; labels are decoded into enums on conversion.
#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    title: String,
    description: String,
    category: String,
    level: String,
    duration: String,
    image: String,
    tags: Vec<String>,
    status: String,
    creator_id: Uuid,
    creator_username: Option<String>,
    likes: Vec<Uuid>,
    bookmarks: Vec<Uuid>,
    views: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = RepositoryError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = |field: &str, value: &str| {
            RepositoryError::Corrupt(format!("session {id} has invalid {field} `{value}`"))
        };

        Ok(Session {
            id: row.id,
            category: row
                .category
                .parse()
                .map_err(|_| corrupt("category", &row.category))?,
            level: row.level.parse().map_err(|_| corrupt("level", &row.level))?,
            status: row.status.parse().map_err(|_| corrupt("status", &row.status))?,
            title: row.title,
            description: row.description,
            duration: row.duration,
            image: row.image,
            tags: row.tags,
            creator: CreatorRef {
                id: row.creator_id,
                username: row.creator_username,
            },
            likes: row.likes.into_iter().collect(),
            bookmarks: row.bookmarks.into_iter().collect(),
            views: row.views,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_sessions(rows: Vec<SessionRow>) -> RepoResult<Vec<Session>> {
    rows.into_iter().map(Session::try_from).collect()
}

/// Appends the public-listing predicates. Must follow a `WHERE` clause.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &SessionFilter) {
    if let Some(category) = &filter.category {
        builder.push(" AND s.category = ");
        builder.push_bind(category.clone());
    }
    if let Some(level) = &filter.level {
        builder.push(" AND s.level = ");
        builder.push_bind(level.clone());
    }
    if let Some(query) = ts_query(filter) {
        builder.push(" AND s.search_document @@ to_tsquery('english', ");
        builder.push_bind(query);
        builder.push(")");
    }
}

/// Any-term text query (`a | b | c`) built from sanitized terms.
fn ts_query(filter: &SessionFilter) -> Option<String> {
    filter_terms(filter)
        .filter(|terms| !terms.is_empty())
        .map(|terms| terms.join(" | "))
}

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Likes and bookmarks live in join tables keyed by
/// (session_id, user_id), so membership is a set at the storage level.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_user(&self, user: NewUser) -> RepoResult<Option<User>> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, number, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            ON CONFLICT (email) DO NOTHING
            RETURNING id, username, email, number, password_hash, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.username)
        .bind(user.email)
        .bind(user.number)
        .bind(user.password_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, number, password_hash, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, number, password_hash, created_at, updated_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Builds the count and the page from the same predicates with `QueryBuilder`, so
    /// every user value is a bound parameter. `status = 'published'` is unconditional.
    async fn list_published(
        &self,
        filter: &SessionFilter,
        page: Option<PageRequest>,
    ) -> RepoResult<SessionPage> {
        if filter_terms(filter).is_some_and(|terms| terms.is_empty()) {
            return Ok(SessionPage::default());
        }

        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM sessions s WHERE s.status = 'published'");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(SESSION_SELECT);
        builder.push(" WHERE s.status = 'published'");
        push_filters(&mut builder, filter);

        match ts_query(filter) {
            Some(query) => {
                builder.push(" ORDER BY ts_rank(s.search_document, to_tsquery('english', ");
                builder.push_bind(query);
                builder.push(")) DESC, s.created_at DESC");
            }
            None => {
                builder.push(" ORDER BY s.created_at DESC");
            }
        }

        if let Some(page) = page {
            builder.push(" LIMIT ");
            builder.push_bind(i64::from(page.limit));
            builder.push(" OFFSET ");
            builder.push_bind(page.offset());
        }

        let rows = builder
            .build_query_as::<SessionRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(SessionPage {
            sessions: into_sessions(rows)?,
            total,
        })
    }

    async fn get_session(&self, id: Uuid) -> RepoResult<Option<Session>> {
        let query = format!("{SESSION_SELECT} WHERE s.id = $1");
        sqlx::query_as::<_, SessionRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Session::try_from)
            .transpose()
    }

    /// The increment is a single `UPDATE`, so concurrent viewers are all counted.
    async fn view_session(&self, id: Uuid, viewer: Option<Uuid>) -> RepoResult<Option<Session>> {
        let result = sqlx::query(
            "UPDATE sessions SET views = views + 1 \
             WHERE id = $1 AND (status = 'published' OR creator_id = $2)",
        )
        .bind(id)
        .bind(viewer)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_session(id).await
    }

    async fn distinct_categories(&self) -> RepoResult<Vec<String>> {
        let values = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM sessions ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(values)
    }

    async fn distinct_levels(&self) -> RepoResult<Vec<String>> {
        let values =
            sqlx::query_scalar::<_, String>("SELECT DISTINCT level FROM sessions ORDER BY level")
                .fetch_all(&self.pool)
                .await?;
        Ok(values)
    }

    async fn count_sessions(&self) -> RepoResult<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn list_by_creator(&self, creator: Uuid) -> RepoResult<Vec<Session>> {
        let query = format!("{SESSION_SELECT} WHERE s.creator_id = $1 ORDER BY s.updated_at DESC");
        let rows = sqlx::query_as::<_, SessionRow>(&query)
            .bind(creator)
            .fetch_all(&self.pool)
            .await?;
        into_sessions(rows)
    }

    async fn create_session(&self, creator: Uuid, session: NewSession) -> RepoResult<Session> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO sessions
                (id, title, description, category, level, duration, image, tags, status,
                 creator_id, views, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0, NOW(), NOW())
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session.title)
        .bind(session.description)
        .bind(session.category.as_ref())
        .bind(session.level.as_ref())
        .bind(session.duration)
        .bind(session.image)
        .bind(session.tags)
        .bind(session.status.as_ref())
        .bind(creator)
        .fetch_one(&self.pool)
        .await?;

        self.get_session(id)
            .await?
            .ok_or_else(|| RepositoryError::Corrupt(format!("session {id} vanished after insert")))
    }

    /// Uses `COALESCE` so only the supplied fields change. `creator_id` is never written.
    async fn update_session(
        &self,
        id: Uuid,
        creator: Uuid,
        changes: SessionChanges,
    ) -> RepoResult<Option<Session>> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET title = COALESCE($3, title),
                description = COALESCE($4, description),
                category = COALESCE($5, category),
                level = COALESCE($6, level),
                duration = COALESCE($7, duration),
                image = COALESCE($8, image),
                tags = COALESCE($9, tags),
                status = COALESCE($10, status),
                updated_at = NOW()
            WHERE id = $1 AND creator_id = $2
            "#,
        )
        .bind(id)
        .bind(creator)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.category.map(|c| c.as_ref().to_string()))
        .bind(changes.level.map(|l| l.as_ref().to_string()))
        .bind(changes.duration)
        .bind(changes.image)
        .bind(changes.tags)
        .bind(changes.status.map(|s| s.as_ref().to_string()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_session(id).await
    }

    async fn delete_session(&self, id: Uuid, creator: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1 AND creator_id = $2")
            .bind(id)
            .bind(creator)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn publish_session(&self, id: Uuid, creator: Uuid) -> RepoResult<Option<Session>> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'published', updated_at = NOW() WHERE id = $1 AND creator_id = $2",
        )
        .bind(id)
        .bind(creator)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_session(id).await
    }

    /// Runs in one transaction holding the session row lock, so toggles on the same
    /// session are applied one after another and none is lost.
    async fn toggle(
        &self,
        id: Uuid,
        user_id: Uuid,
        kind: Engagement,
    ) -> RepoResult<Option<Session>> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM sessions \
             WHERE id = $1 AND (status = 'published' OR creator_id = $2) FOR UPDATE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Ok(None);
        }

        let delete = format!(
            "DELETE FROM {} WHERE session_id = $1 AND user_id = $2",
            kind.table()
        );
        let removed = sqlx::query(&delete)
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            let insert = format!(
                "INSERT INTO {} (session_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                kind.table()
            );
            sqlx::query(&insert)
                .bind(id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        self.get_session(id).await
    }

    async fn list_engaged(&self, user_id: Uuid, kind: Engagement) -> RepoResult<Vec<Session>> {
        let query = format!(
            "{SESSION_SELECT} WHERE s.id IN (SELECT e.session_id FROM {} e WHERE e.user_id = $1) \
             AND (s.status = 'published' OR s.creator_id = $1) ORDER BY s.created_at DESC",
            kind.table()
        );
        let rows = sqlx::query_as::<_, SessionRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        into_sessions(rows)
    }
}
