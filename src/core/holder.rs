use crate::core::locked_file::{LockedFile, DEFAULT_PERMS};
use crate::domain::model::{HoldOutcome, LockMode, OpenMode};
use crate::domain::ports::{ConfigProvider, LockSession};
use crate::utils::error::{FlockError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Takes the exclusive lock, rewrites the file and sits on the lock for a while,
/// so that readers started meanwhile have to wait.
pub struct ExclusiveHolder {
    path: PathBuf,
    perms: u32,
    owner: Option<u32>,
    group: Option<u32>,
    text: String,
    hold: Duration,
    file: Option<LockedFile>,
    locked_at: Option<Instant>,
}

impl ExclusiveHolder {
    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self {
            path: config.file_path().to_path_buf(),
            perms: config.file_perms(),
            owner: config.owner(),
            group: config.group(),
            text: config.holder_text().to_string(),
            hold: config.hold_duration(),
            file: None,
            locked_at: None,
        }
    }

    /// True between a successful `acquire` and `release`.
    pub fn is_holding(&self) -> bool {
        self.file
            .as_ref()
            .map(LockedFile::is_locked_exclusive)
            .unwrap_or(false)
    }
}

#[async_trait]
impl LockSession for ExclusiveHolder {
    type Output = HoldOutcome;

    async fn acquire(&mut self) -> Result<()> {
        let path = self.path.clone();
        let (perms, owner, group) = (self.perms, self.owner, self.group);

        let file = tokio::task::spawn_blocking(move || -> Result<LockedFile> {
            let mut file = LockedFile::open(&path, OpenMode::ReadWrite, DEFAULT_PERMS)?;
            // creation mode is filtered by the umask, set the real one explicitly
            file.set_perms(perms)?;
            if let Some(uid) = owner {
                file.set_owner(uid)?;
            }
            if let Some(gid) = group {
                file.set_group(gid)?;
            }
            file.lock(LockMode::Exclusive)?;
            Ok(file)
        })
        .await??;

        self.locked_at = Some(Instant::now());
        self.file = Some(file);
        Ok(())
    }

    async fn work(&mut self) -> Result<HoldOutcome> {
        let file = self.file.as_mut().ok_or_else(|| FlockError::NotOpenError {
            path: self.path.clone(),
        })?;

        // truncating only after the lock is held keeps readers from seeing a half-empty file
        file.truncate()?;
        let bytes_written = file.write(self.text.as_bytes(), 0, 0)?;
        tracing::info!(
            "✍️  Wrote {} bytes to {}, holding the lock for {:?}",
            bytes_written,
            self.path.display(),
            self.hold
        );

        tokio::time::sleep(self.hold).await;

        Ok(HoldOutcome {
            path: self.path.clone(),
            bytes_written,
            held: self.locked_at.map(|t| t.elapsed()).unwrap_or_default(),
        })
    }

    async fn release(&mut self) -> Result<()> {
        self.locked_at = None;
        match self.file.take() {
            Some(file) => file.close(),
            None => Ok(()),
        }
    }
}
