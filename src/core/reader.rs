use crate::core::locked_file::{LockedFile, DEFAULT_PERMS};
use crate::domain::model::{LockMode, OpenMode, ReadOutcome};
use crate::domain::ports::{ConfigProvider, LockSession};
use crate::utils::error::{FlockError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Reads a whole file under a shared lock, waiting as long as a writer holds
/// the exclusive one.
pub struct SharedReader {
    path: PathBuf,
    file: Option<LockedFile>,
    waited: Duration,
}

impl SharedReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            waited: Duration::ZERO,
        }
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self::new(config.file_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LockSession for SharedReader {
    type Output = ReadOutcome;

    async fn acquire(&mut self) -> Result<()> {
        let path = self.path.clone();
        let started = Instant::now();

        // flock(LOCK_SH) parks the thread, keep it off the runtime workers
        let file = tokio::task::spawn_blocking(move || -> Result<LockedFile> {
            let mut file = LockedFile::open(&path, OpenMode::Read, DEFAULT_PERMS)?;
            file.lock(LockMode::Shared)?;
            Ok(file)
        })
        .await??;

        self.waited = started.elapsed();
        if self.waited > Duration::from_millis(100) {
            tracing::info!(
                "⏳ Waited {:?} for the exclusive holder of {} to let go",
                self.waited,
                self.path.display()
            );
        }
        self.file = Some(file);
        Ok(())
    }

    async fn work(&mut self) -> Result<ReadOutcome> {
        let file = self.file.as_mut().ok_or_else(|| FlockError::NotOpenError {
            path: self.path.clone(),
        })?;

        let contents = file.read(0, 0)?;
        tracing::debug!("Read {} bytes from {}", contents.len(), self.path.display());

        Ok(ReadOutcome {
            path: self.path.clone(),
            contents,
            waited: self.waited,
        })
    }

    async fn release(&mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => file.close(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::LockEngine;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_unlocked_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.txt");
        std::fs::write(&path, "plain contents").unwrap();

        let mut engine = LockEngine::new(SharedReader::new(&path));
        let outcome = engine.run().await.unwrap();

        assert_eq!(outcome.contents, b"plain contents");
        assert_eq!(outcome.path, path);
    }

    #[tokio::test]
    async fn test_missing_file_fails_to_acquire() {
        let dir = TempDir::new().unwrap();
        let mut engine = LockEngine::new(SharedReader::new(dir.path().join("nope.txt")));

        let err = engine.run().await.unwrap_err();
        assert!(matches!(err, FlockError::FileIoError { .. }));
    }

    #[tokio::test]
    async fn test_work_without_acquire_is_rejected() {
        let mut reader = SharedReader::new("unused.txt");
        assert!(matches!(
            reader.work().await,
            Err(FlockError::NotOpenError { .. })
        ));
    }
}
