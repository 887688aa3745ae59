use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::wizard::{flow::BookingFlow, registry::SessionRegistry};

/// Убирает брошенные сессии мастера и отпускает их удержания мест.
pub struct CleanupService {
    sessions: Arc<SessionRegistry>,
    flow: Arc<BookingFlow>,
    idle: Duration,
}

impl CleanupService {
    pub fn new(sessions: Arc<SessionRegistry>, flow: Arc<BookingFlow>, idle: Duration) -> Self {
        Self { sessions, flow, idle }
    }

    /// Возвращает число удалённых сессий.
    pub async fn sweep_idle_sessions(&self) -> usize {
        let expired = self.sessions.take_idle(self.idle, Utc::now()).await;
        if expired.is_empty() {
            debug!("🧹 No idle booking sessions");
            return 0;
        }

        let count = expired.len();
        for mut session in expired {
            if let Some(reference) = session.payment().map(|p| p.reference.clone()) {
                info!(session = %session.id(), reference = %reference, "Dropping session with an unfinished payment");
            }
            self.flow.release_holds(&mut session).await;
        }
        info!("🧹 Removed {} idle booking sessions", count);
        count
    }

    pub async fn run(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.sweep_idle_sessions().await;
        }
    }
}
