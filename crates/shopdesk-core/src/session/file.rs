use super::model::Session;
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Stores the authenticated session as TOML so a restarted client can
/// restore it during bootstrap.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the saved session. A missing file, or a saved session without
    /// a token, yields `None`.
    pub async fn load(&self) -> Result<Option<Session>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let session: Session = toml::from_str(&content)?;
        Ok(session.is_authenticated().then_some(session))
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(session)?;
        tokio::fs::write(&self.path, content).await?;
        tracing::debug!(path = %self.path.display(), "[SessionFile] Session saved");
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
