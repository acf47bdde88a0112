use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    CreatorRef, NewSession, NewUser, PageRequest, Session, SessionChanges, SessionFilter, SessionPage,
    SessionStatus, User,
};
use crate::repository::{Engagement, RepoResult, Repository, filter_terms, search_terms};

/// A stored session plus insertion/modification sequence numbers, which break ties
/// between timestamps taken within the same clock tick.
#[derive(Debug, Clone)]
struct Stored {
    session: Session,
    created_seq: u64,
    updated_seq: u64,
}

impl Stored {
    fn is_visible_to(&self, viewer: Option<Uuid>) -> bool {
        self.session.is_published() || viewer.is_some_and(|v| self.session.is_owned_by(v))
    }
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, Stored>,
    seq: u64,
}

impl State {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Clones a session out of the store with the creator's username attached.
    fn render(&self, stored: &Stored) -> Session {
        let mut session = stored.session.clone();
        session.creator.username = self
            .users
            .get(&session.creator.id)
            .map(|u| u.username.clone());
        session
    }

    fn render_id(&self, id: Uuid) -> Option<Session> {
        self.sessions.get(&id).map(|s| self.render(s))
    }

    fn newest_first(&self, mut stored: Vec<&Stored>) -> Vec<Session> {
        stored.sort_by_key(|s| Reverse((s.session.created_at, s.created_seq)));
        stored.into_iter().map(|s| self.render(s)).collect()
    }
}

/// Number of query-term occurrences in title + description. Zero means no match.
fn relevance(session: &Session, terms: &[String]) -> usize {
    let document = search_terms(&format!("{} {}", session.title, session.description));
    terms
        .iter()
        .map(|term| document.iter().filter(|word| *word == term).count())
        .sum()
}

/// InMemoryRepository
///
/// Process-local `Repository` used for local runs without a database and by the test
/// suite. A single `RwLock` guards all records, so every read-modify-write (views,
/// toggles) is atomic with respect to other requests.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(&self, user: NewUser) -> RepoResult<Option<User>> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Ok(None);
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            number: user.number,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(created.id, created.clone());
        Ok(Some(created))
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    /// With a search term, sessions scoring zero are dropped and the rest are ordered by
    /// score, then newest first. A search with no usable terms finds nothing.
    async fn list_published(
        &self,
        filter: &SessionFilter,
        page: Option<PageRequest>,
    ) -> RepoResult<SessionPage> {
        let terms = filter_terms(filter);
        if terms.as_ref().is_some_and(Vec::is_empty) {
            return Ok(SessionPage::default());
        }

        let state = self.state.read().await;

        let mut matching: Vec<(usize, &Stored)> = state
            .sessions
            .values()
            .filter(|s| s.session.is_published())
            .filter(|s| {
                filter
                    .category
                    .as_deref()
                    .is_none_or(|c| s.session.category.as_ref() == c)
            })
            .filter(|s| {
                filter
                    .level
                    .as_deref()
                    .is_none_or(|l| s.session.level.as_ref() == l)
            })
            .filter_map(|s| match &terms {
                Some(terms) => {
                    let score = relevance(&s.session, terms);
                    (score > 0).then_some((score, s))
                }
                None => Some((0, s)),
            })
            .collect();

        matching.sort_by_key(|(score, s)| Reverse((*score, s.session.created_at, s.created_seq)));

        let total = matching.len() as i64;
        let (skip, take) = page.map_or((0, usize::MAX), |p| (p.offset() as usize, p.limit as usize));

        Ok(SessionPage {
            sessions: matching
                .iter()
                .skip(skip)
                .take(take)
                .map(|(_, s)| state.render(s))
                .collect(),
            total,
        })
    }

    async fn get_session(&self, id: Uuid) -> RepoResult<Option<Session>> {
        Ok(self.state.read().await.render_id(id))
    }

    async fn view_session(&self, id: Uuid, viewer: Option<Uuid>) -> RepoResult<Option<Session>> {
        let mut state = self.state.write().await;
        match state
            .sessions
            .get_mut(&id)
            .filter(|s| s.is_visible_to(viewer))
        {
            Some(stored) => stored.session.views += 1,
            None => return Ok(None),
        }
        Ok(state.render_id(id))
    }

    async fn distinct_categories(&self) -> RepoResult<Vec<String>> {
        let state = self.state.read().await;
        let values: BTreeSet<String> = state
            .sessions
            .values()
            .map(|s| s.session.category.to_string())
            .collect();
        Ok(values.into_iter().collect())
    }

    async fn distinct_levels(&self) -> RepoResult<Vec<String>> {
        let state = self.state.read().await;
        let values: BTreeSet<String> = state
            .sessions
            .values()
            .map(|s| s.session.level.to_string())
            .collect();
        Ok(values.into_iter().collect())
    }

    async fn count_sessions(&self) -> RepoResult<i64> {
        Ok(self.state.read().await.sessions.len() as i64)
    }

    async fn list_by_creator(&self, creator: Uuid) -> RepoResult<Vec<Session>> {
        let state = self.state.read().await;
        let mut owned: Vec<&Stored> = state
            .sessions
            .values()
            .filter(|s| s.session.is_owned_by(creator))
            .collect();
        owned.sort_by_key(|s| Reverse((s.session.updated_at, s.updated_seq)));
        Ok(owned.into_iter().map(|s| state.render(s)).collect())
    }

    async fn create_session(&self, creator: Uuid, session: NewSession) -> RepoResult<Session> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let seq = state.next_seq();

        let created = Session {
            id: Uuid::new_v4(),
            title: session.title,
            description: session.description,
            category: session.category,
            level: session.level,
            duration: session.duration,
            image: session.image,
            tags: session.tags,
            status: session.status,
            creator: CreatorRef::new(creator),
            likes: BTreeSet::new(),
            bookmarks: BTreeSet::new(),
            views: 0,
            created_at: now,
            updated_at: now,
        };
        let stored = Stored {
            session: created,
            created_seq: seq,
            updated_seq: seq,
        };
        let rendered = state.render(&stored);
        state.sessions.insert(rendered.id, stored);
        Ok(rendered)
    }

    async fn update_session(
        &self,
        id: Uuid,
        creator: Uuid,
        changes: SessionChanges,
    ) -> RepoResult<Option<Session>> {
        let mut state = self.state.write().await;
        let seq = state.next_seq();
        let Some(stored) = state
            .sessions
            .get_mut(&id)
            .filter(|s| s.session.is_owned_by(creator))
        else {
            return Ok(None);
        };

        let session = &mut stored.session;
        if let Some(title) = changes.title {
            session.title = title;
        }
        if let Some(description) = changes.description {
            session.description = description;
        }
        if let Some(category) = changes.category {
            session.category = category;
        }
        if let Some(level) = changes.level {
            session.level = level;
        }
        if let Some(duration) = changes.duration {
            session.duration = duration;
        }
        if let Some(image) = changes.image {
            session.image = image;
        }
        if let Some(tags) = changes.tags {
            session.tags = tags;
        }
        if let Some(status) = changes.status {
            session.status = status;
        }
        session.updated_at = Utc::now();
        stored.updated_seq = seq;

        Ok(state.render_id(id))
    }

    async fn delete_session(&self, id: Uuid, creator: Uuid) -> RepoResult<bool> {
        let mut state = self.state.write().await;
        let owned = state
            .sessions
            .get(&id)
            .is_some_and(|s| s.session.is_owned_by(creator));
        if owned {
            state.sessions.remove(&id);
        }
        Ok(owned)
    }

    async fn publish_session(&self, id: Uuid, creator: Uuid) -> RepoResult<Option<Session>> {
        self.update_session(
            id,
            creator,
            SessionChanges {
                status: Some(SessionStatus::Published),
                ..SessionChanges::default()
            },
        )
        .await
    }

    async fn toggle(
        &self,
        id: Uuid,
        user_id: Uuid,
        kind: Engagement,
    ) -> RepoResult<Option<Session>> {
        let mut state = self.state.write().await;
        let Some(stored) = state
            .sessions
            .get_mut(&id)
            .filter(|s| s.is_visible_to(Some(user_id)))
        else {
            return Ok(None);
        };

        let set = match kind {
            Engagement::Like => &mut stored.session.likes,
            Engagement::Bookmark => &mut stored.session.bookmarks,
        };
        if !set.remove(&user_id) {
            set.insert(user_id);
        }

        Ok(state.render_id(id))
    }

    async fn list_engaged(&self, user_id: Uuid, kind: Engagement) -> RepoResult<Vec<Session>> {
        let state = self.state.read().await;
        let engaged: Vec<&Stored> = state
            .sessions
            .values()
            .filter(|s| match kind {
                Engagement::Like => s.session.likes.contains(&user_id),
                Engagement::Bookmark => s.session.bookmarks.contains(&user_id),
            })
            .filter(|s| s.is_visible_to(Some(user_id)))
            .collect();
        Ok(state.newest_first(engaged))
    }
}
