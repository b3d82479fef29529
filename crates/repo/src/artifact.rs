//! The shared artifact file and its backup.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::{ArtifactError, ArtifactStore};
use tracing::{debug, info, instrument};

/// [`ArtifactStore`] over a single file on disk.
///
/// The backup lives next to the artifact with `.backup` appended to the full
/// file name (`index.html` → `index.html.backup`).
#[derive(Debug, Clone)]
pub struct FileArtifact {
    path: PathBuf,
    backup: PathBuf,
}

impl FileArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut backup = path.clone().into_os_string();
        backup.push(".backup");
        Self {
            path,
            backup: PathBuf::from(backup),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }
}

fn io_error(path: &Path, err: std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl ArtifactStore for FileArtifact {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn read(&self) -> Result<String, ArtifactError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| io_error(&self.path, e))
    }

    #[instrument(skip_all, fields(artifact = %self.path.display(), bytes = content.len()))]
    async fn replace(&self, content: &str) -> Result<(), ArtifactError> {
        match tokio::fs::read(&self.path).await {
            Ok(previous) => {
                tokio::fs::write(&self.backup, previous)
                    .await
                    .map_err(|e| io_error(&self.backup, e))?;
                debug!(backup = %self.backup.display(), "artifact backed up");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("artifact does not exist yet; nothing to back up");
            }
            Err(e) => return Err(io_error(&self.path, e)),
        }
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        info!("artifact replaced");
        Ok(())
    }

    #[instrument(skip_all, fields(artifact = %self.path.display()))]
    async fn restore_backup(&self) -> Result<(), ArtifactError> {
        let saved = match tokio::fs::read(&self.backup).await {
            Ok(saved) => saved,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ArtifactError::NoBackup {
                    path: self.backup.display().to_string(),
                })
            }
            Err(e) => return Err(io_error(&self.backup, e)),
        };
        tokio::fs::write(&self.path, saved)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        info!("artifact restored from backup");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replace_backs_up_the_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = FileArtifact::new(dir.path().join("index.html"));
        std::fs::write(artifact.path(), "<html>v1</html>").unwrap();

        artifact.replace("<html>v2</html>").await.unwrap();

        assert_eq!(artifact.read().await.unwrap(), "<html>v2</html>");
        assert_eq!(
            std::fs::read_to_string(artifact.backup_path()).unwrap(),
            "<html>v1</html>"
        );
        assert!(artifact
            .backup_path()
            .to_string_lossy()
            .ends_with("index.html.backup"));
    }

    #[tokio::test]
    async fn restore_returns_the_pre_replace_content() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = FileArtifact::new(dir.path().join("index.html"));
        std::fs::write(artifact.path(), "original").unwrap();

        artifact.replace("first").await.unwrap();
        artifact.replace("second").await.unwrap();
        artifact.restore_backup().await.unwrap();

        assert_eq!(artifact.read().await.unwrap(), "first");
    }

    #[tokio::test]
    async fn restore_without_backup_fails() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = FileArtifact::new(dir.path().join("index.html"));
        std::fs::write(artifact.path(), "only").unwrap();

        assert!(matches!(
            artifact.restore_backup().await,
            Err(ArtifactError::NoBackup { .. })
        ));
        assert_eq!(artifact.read().await.unwrap(), "only");
    }

    #[tokio::test]
    async fn failed_backup_leaves_the_artifact_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = FileArtifact::new(dir.path().join("index.html"));
        std::fs::write(artifact.path(), "keep me").unwrap();
        // A directory in the backup's place makes the backup write fail.
        std::fs::create_dir(artifact.backup_path()).unwrap();

        assert!(matches!(
            artifact.replace("new").await,
            Err(ArtifactError::Io { .. })
        ));
        assert_eq!(artifact.read().await.unwrap(), "keep me");
    }

    #[tokio::test]
    async fn missing_artifact_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = FileArtifact::new(dir.path().join("absent.html"));
        assert!(matches!(
            artifact.read().await,
            Err(ArtifactError::Io { .. })
        ));
    }
}
