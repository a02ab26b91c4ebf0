//! On-disk copy of the persisted client slices.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use crate::state::client::PersistedState;

/// Failure while writing or removing the state file.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to encode client state")]
    Encode(#[source] serde_json::Error),
    #[error("i/o error on `{path}`")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PersistenceError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        PersistenceError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// JSON file holding the persisted subset of [`ClientState`](crate::state::client::ClientState).
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted state. A missing file is a fresh client and a corrupt
    /// one is logged and ignored.
    pub async fn load(&self) -> Result<Option<PersistedState>, PersistenceError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no persisted client state");
                return Ok(None);
            }
            Err(err) => return Err(PersistenceError::io(&self.path, err)),
        };

        match serde_json::from_str::<PersistedState>(&contents) {
            Ok(persisted) => Ok(Some(persisted)),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "ignoring corrupt client state file"
                );
                Ok(None)
            }
        }
    }

    /// Replace the file atomically: write a sibling temp file, then rename it over.
    pub async fn save(&self, persisted: &PersistedState) -> Result<(), PersistenceError> {
        let payload = serde_json::to_vec_pretty(persisted).map_err(PersistenceError::Encode)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| PersistenceError::io(parent, err))?;
        }

        let temp = self.temp_path();
        fs::write(&temp, payload)
            .await
            .map_err(|err| PersistenceError::io(&temp, err))?;
        fs::rename(&temp, &self.path)
            .await
            .map_err(|err| PersistenceError::io(&self.path, err))
    }

    /// Remove the file; removing a missing file succeeds.
    pub async fn clear(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PersistenceError::io(&self.path, err)),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use uuid::Uuid;

    use super::*;
    use crate::{
        dao::models::TeamEntity,
        state::client::Session,
    };

    fn sample() -> PersistedState {
        let event_id = Uuid::new_v4();
        let mut persisted = PersistedState::default();
        persisted.session = Some(Session {
            event_id,
            team: TeamEntity {
                id: Uuid::new_v4(),
                event_id,
                name: "Quizzly Bears".into(),
            },
            joined_at: SystemTime::now(),
        });
        persisted.drafts.insert(Uuid::new_v4(), "Paris".into());
        persisted
    }

    #[tokio::test]
    async fn missing_file_is_a_fresh_client() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path().join("state.json"));
        assert!(file.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saved_state_is_loaded_back() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path().join("nested").join("state.json"));
        let persisted = sample();

        file.save(&persisted).await.unwrap();
        assert_eq!(file.load().await.unwrap(), Some(persisted));
        assert!(!file.temp_path().exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        let file = StateFile::new(path);
        assert!(file.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path().join("state.json"));
        file.save(&sample()).await.unwrap();
        file.clear().await.unwrap();
        assert!(!file.path().exists());
        file.clear().await.unwrap();
    }
}
