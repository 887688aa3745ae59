use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::error::BookingError;
use crate::wizard::WizardSession;

/// Live wizard sessions keyed by id.
///
/// Each session sits behind its own mutex. Holding the guard is the
/// session's in-flight token: a second request for the same session while
/// the first is still running gets `BookingError::Busy` instead of waiting.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<WizardSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: WizardSession) -> Uuid {
        let id = session.id();
        self.sessions.write().await.insert(id, Arc::new(Mutex::new(session)));
        id
    }

    pub async fn acquire(&self, id: Uuid) -> Result<OwnedMutexGuard<WizardSession>, BookingError> {
        let slot = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(BookingError::SessionNotFound(id))?;
        slot.try_lock_owned().map_err(|_| BookingError::Busy)
    }

    /// Removes the session once no request holds it.
    pub async fn remove(&self, id: Uuid) -> Result<OwnedMutexGuard<WizardSession>, BookingError> {
        let guard = self.acquire(id).await?;
        self.sessions.write().await.remove(&id);
        Ok(guard)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Забирает сессии, неактивные дольше `idle`. Занятые запросом пропускаются.
    pub async fn take_idle(&self, idle: Duration, now: DateTime<Utc>) -> Vec<OwnedMutexGuard<WizardSession>> {
        let mut sessions = self.sessions.write().await;
        let mut expired = Vec::new();

        sessions.retain(|_, slot| {
            let Ok(guard) = slot.clone().try_lock_owned() else {
                return true;
            };
            let is_idle = (now - guard.last_activity())
                .to_std()
                .map(|age| age > idle)
                .unwrap_or(false);
            if is_idle {
                expired.push(guard);
            }
            !is_idle
        });

        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MovieInput, MovieStatus};
    use chrono::NaiveDate;

    fn session() -> WizardSession {
        let movie = MovieInput {
            title: "The Guardian".into(),
            image: String::new(),
            rating: 8.5,
            duration: "2h 15m".into(),
            genre: "Action/Thriller".into(),
            showtimes: vec!["6:30 PM".into()],
            status: MovieStatus::NowShowing,
            release_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: None,
        }
        .into_movie(Uuid::new_v4());
        WizardSession::start(movie, None, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn second_request_is_busy_until_first_finishes() {
        let registry = SessionRegistry::new();
        let id = registry.insert(session()).await;

        let first = registry.acquire(id).await.unwrap();
        assert!(matches!(registry.acquire(id).await, Err(BookingError::Busy)));
        drop(first);
        assert!(registry.acquire(id).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        assert!(matches!(registry.acquire(id).await, Err(BookingError::SessionNotFound(got)) if got == id));
    }

    #[tokio::test]
    async fn idle_sessions_are_taken_busy_ones_kept() {
        let registry = SessionRegistry::new();
        let stale = registry.insert(session()).await;
        let busy = registry.insert(session()).await;
        let fresh = registry.insert(session()).await;

        let later = Utc::now() + chrono::Duration::hours(1);
        registry.acquire(fresh).await.unwrap().touch(later);
        let _held = registry.acquire(busy).await.unwrap();

        let taken = registry.take_idle(Duration::from_secs(1800), later).await;
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].id(), stale);
        assert_eq!(registry.len().await, 2);
    }
}
