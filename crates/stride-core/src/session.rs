use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

const SESSION_FILE: &str = "session.json";

/// Refresh when the access token is within an hour of expiring.
const REFRESH_WINDOW_SECS: i64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds, as reported by the auth server.
    pub expires_at: i64,
    pub user_id: Uuid,
    pub email: Option<String>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now.timestamp()
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now.timestamp() < REFRESH_WINDOW_SECS
    }
}

/// On-disk cache for the signed-in session, one JSON file in the data dir.
#[derive(Debug)]
pub struct SessionStore {
    pub path: PathBuf,
}

impl SessionStore {
    pub fn open(data_dir: &Path) -> Self {
        let path = data_dir.join(SESSION_FILE);
        debug!(session = %path.display(), "opened session store");
        Self { path }
    }

    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> anyhow::Result<Option<Session>> {
        if !self.path.exists() {
            debug!("no cached session");
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading {}", self.path.display()))?;
        let session: Session = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.path.display()))?;

        debug!(user_id = %session.user_id, "loaded cached session");
        Ok(Some(session))
    }

    #[tracing::instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub fn save(&self, session: &Session) -> anyhow::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        let serialized = serde_json::to_string_pretty(session)?;
        temp.write_all(serialized.as_bytes())?;
        temp.flush()?;

        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;

        info!(session = %self.path.display(), "saved session");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn clear(&self) -> anyhow::Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed removing {}", self.path.display()))?;
            info!(session = %self.path.display(), "cleared session");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;
    use uuid::Uuid;

    use super::{Session, SessionStore};

    fn session(expires_at: i64) -> Session {
        Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
            user_id: Uuid::new_v4(),
            email: Some("user@example.com".to_string()),
        }
    }

    #[test]
    fn refresh_window_is_one_hour() {
        let now = Utc
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .expect("valid now");

        let fresh = session(now.timestamp() + 7200);
        assert!(!fresh.is_expired(now));
        assert!(!fresh.needs_refresh(now));

        let stale = session(now.timestamp() + 600);
        assert!(!stale.is_expired(now));
        assert!(stale.needs_refresh(now));

        let dead = session(now.timestamp() - 1);
        assert!(dead.is_expired(now));
        assert!(dead.needs_refresh(now));
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::open(dir.path());

        assert!(store.load().expect("load empty").is_none());

        let original = session(1_750_000_000);
        store.save(&original).expect("save");

        let loaded = store.load().expect("load").expect("cached session");
        assert_eq!(loaded.user_id, original.user_id);
        assert_eq!(loaded.access_token, "access");

        store.clear().expect("clear");
        assert!(store.load().expect("load after clear").is_none());
        store.clear().expect("clear is idempotent");
    }
}
