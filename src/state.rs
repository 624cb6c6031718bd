use std::sync::Arc;
use std::time::Instant;

use crate::db::Database;
use crate::services::jisho::JishoClient;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    db: Option<Arc<Database>>,
    jisho: Arc<JishoClient>,
}

impl AppState {
    pub fn new(db: Option<Arc<Database>>, jisho: Arc<JishoClient>) -> Self {
        Self {
            started_at: Instant::now(),
            db,
            jisho,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn db(&self) -> Option<Arc<Database>> {
        self.db.clone()
    }

    pub fn jisho(&self) -> Arc<JishoClient> {
        Arc::clone(&self.jisho)
    }
}
