use std::fs;
use std::path::{Path, PathBuf};

use navigator_engine::{AtomicFileWriter, Session};
use navigator_logging::{nav_info, nav_warn};
use serde::{Deserialize, Serialize};

pub const SESSION_FILENAME: &str = ".incident_nav_session.ron";

/// Login state kept between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub token: String,
}

impl From<Session> for StoredSession {
    fn from(session: Session) -> Self {
        Self {
            user_id: session.id,
            username: session.username,
            email: session.email,
            token: session.token,
        }
    }
}

/// Reads the session file. Unreadable or corrupt files count as logged out.
pub(crate) fn load_session(state_dir: &Path) -> Option<StoredSession> {
    let path = state_dir.join(SESSION_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            nav_warn!("Failed to read session from {:?}: {}", path, err);
            return None;
        }
    };

    match ron::from_str::<StoredSession>(&content) {
        Ok(session) => {
            nav_info!("Loaded session for {} from {:?}", session.username, path);
            Some(session)
        }
        Err(err) => {
            nav_warn!("Failed to parse session from {:?}: {}", path, err);
            None
        }
    }
}

pub(crate) fn save_session(state_dir: &Path, session: &StoredSession) -> anyhow::Result<PathBuf> {
    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(session, pretty)?;
    let writer = AtomicFileWriter::new(state_dir.to_path_buf());
    let path = writer.write(SESSION_FILENAME, &content)?;
    nav_info!(
        "Saved session for {} token={}",
        session.username,
        navigator_logging::secret_fingerprint(&session.token)
    );
    Ok(path)
}

pub(crate) fn clear_session(state_dir: &Path) -> anyhow::Result<()> {
    AtomicFileWriter::new(state_dir.to_path_buf()).remove(SESSION_FILENAME)?;
    Ok(())
}
