use std::path::PathBuf;
use std::sync::Arc;

use chrono::TimeDelta;
use medi_core::stats::StatsCache;
use medi_core::traits::{IdentityVerifier, TextGenerator};
use medi_core::upload::UploadPolicy;
use medi_db::Database;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub db: Database,
    pub stats: StatsCache,
    /// Text generator for tutor and quiz routes. A `DisabledGenerator` when
    /// no AI key is configured.
    pub generator: Arc<dyn TextGenerator>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub uploads: UploadStore,
    pub session_ttl: TimeDelta,
    pub cookie_secure: bool,
}

/// Where uploaded files are written and which files are accepted.
#[derive(Debug, Clone)]
pub struct UploadStore {
    pub dir: PathBuf,
    pub policy: UploadPolicy,
}

impl UploadStore {
    pub fn path_for(&self, stored_name: &str) -> PathBuf {
        self.dir.join(stored_name)
    }
}
