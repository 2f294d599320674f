//! An open file together with the advisory `flock` it currently holds.

use crate::domain::model::{LockMode, OpenMode};
use crate::utils::error::{FlockError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Permissions used when `open` has to create the file.
pub const DEFAULT_PERMS: u32 = 0o600;

#[derive(Debug)]
pub struct LockedFile {
    path: PathBuf,
    mode: OpenMode,
    pub(crate) file: File,
    lock: Option<LockMode>,
}

impl LockedFile {
    /// Opens `path`. `Write` and `ReadWrite` create the file with `perms` (minus
    /// the umask) when it is missing; `Read` never creates.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode, perms: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.write(true).create(true),
            OpenMode::ReadWrite => options.read(true).write(true).create(true),
        };
        options.mode(perms);

        let file = options
            .open(&path)
            .map_err(|e| FlockError::file_io(&path, e))?;
        tracing::debug!("Opened {} ({})", path.display(), mode);

        Ok(Self {
            path,
            mode,
            file,
            lock: None,
        })
    }

    pub fn exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists()
    }

    /// Blocks until the lock is granted. Asking for the mode already held is a
    /// no-op; asking for the other mode converts the lock. Conversion is not
    /// atomic: flock drops the old lock before granting the new one, so when a
    /// conversion fails the handle is left holding no lock at all.
    pub fn lock(&mut self, mode: LockMode) -> Result<()> {
        if self.lock == Some(mode) {
            return Ok(());
        }

        tracing::debug!("Waiting for {} lock on {}", mode, self.path.display());
        let result = match mode {
            LockMode::Shared => FileExt::lock_shared(&self.file),
            LockMode::Exclusive => FileExt::lock_exclusive(&self.file),
        };
        self.record_lock(mode, result)?;

        tracing::debug!("Acquired {} lock on {}", mode, self.path.display());
        Ok(())
    }

    /// Returns `Ok(false)` when a conflicting lock is held through another
    /// open file description. A contended conversion loses the old lock too.
    pub fn try_lock(&mut self, mode: LockMode) -> Result<bool> {
        if self.lock == Some(mode) {
            return Ok(true);
        }

        let result = match mode {
            LockMode::Shared => FileExt::try_lock_shared(&self.file),
            LockMode::Exclusive => FileExt::try_lock_exclusive(&self.file),
        };

        match result {
            Err(e) if is_contended(&e) => {
                self.forget_lock(mode);
                Ok(false)
            }
            other => self.record_lock(mode, other).map(|_| true),
        }
    }

    fn record_lock(&mut self, mode: LockMode, result: std::io::Result<()>) -> Result<()> {
        match result {
            Ok(()) => {
                self.lock = Some(mode);
                Ok(())
            }
            Err(source) => {
                self.forget_lock(mode);
                Err(self.lock_error(mode, source))
            }
        }
    }

    fn forget_lock(&mut self, requested: LockMode) {
        if let Some(old) = self.lock.take() {
            tracing::warn!(
                "{} lock on {} was dropped by a failed conversion to {}",
                old,
                self.path.display(),
                requested
            );
        }
    }

    pub fn unlock(&mut self) -> Result<()> {
        let Some(mode) = self.lock else {
            return Ok(());
        };

        FileExt::unlock(&self.file).map_err(|source| self.lock_error(mode, source))?;
        self.lock = None;
        tracing::debug!("Released {} lock on {}", mode, self.path.display());
        Ok(())
    }

    /// Reads from `start`; a `length` of 0 reads to the end of the file.
    pub fn read(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        self.require(self.mode.readable(), "it cannot be read")?;

        let mut buf = Vec::new();
        self.file
            .seek(SeekFrom::Start(start))
            .and_then(|_| {
                if length == 0 {
                    self.file.read_to_end(&mut buf)
                } else {
                    Read::by_ref(&mut self.file)
                        .take(length as u64)
                        .read_to_end(&mut buf)
                }
            })
            .map_err(|e| FlockError::file_io(&self.path, e))?;

        Ok(buf)
    }

    /// `read` under a shared lock. The lock is released afterwards only when
    /// this call took it.
    pub fn read_locked(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        let held = self.lock.is_some();
        if !held {
            self.lock(LockMode::Shared)?;
        }

        let data = self.read(start, length);
        if !held {
            self.unlock()?;
        }
        data
    }

    /// Writes `data[..length]` at `start` and returns the byte count. A `length`
    /// of 0, or one past the end of `data`, writes all of `data`.
    pub fn write(&mut self, data: &[u8], start: u64, length: usize) -> Result<usize> {
        self.require(self.mode.writable(), "it cannot be written")?;

        let len = if length == 0 || length > data.len() {
            data.len()
        } else {
            length
        };

        self.file
            .seek(SeekFrom::Start(start))
            .and_then(|_| self.file.write_all(&data[..len]))
            .map_err(|e| FlockError::file_io(&self.path, e))?;

        Ok(len)
    }

    /// `write` under an exclusive lock. Afterwards the handle is back in the
    /// lock state it started in: unlocked, or converted back to shared. Upgrading
    /// from shared waits for every other shared holder to leave.
    pub fn write_locked(&mut self, data: &[u8], start: u64, length: usize) -> Result<usize> {
        let prev = self.lock;
        self.lock(LockMode::Exclusive)?;

        let written = self.write(data, start, length);
        match prev {
            None => self.unlock()?,
            Some(LockMode::Shared) => self.lock(LockMode::Shared)?,
            Some(LockMode::Exclusive) => {}
        }
        written
    }

    pub fn truncate(&mut self) -> Result<()> {
        self.require(self.mode.writable(), "it cannot be truncated")?;
        self.file
            .set_len(0)
            .and_then(|_| self.file.seek(SeekFrom::Start(0)).map(|_| ()))
            .map_err(|e| FlockError::file_io(&self.path, e))
    }

    pub fn size(&self) -> Result<u64> {
        self.metadata().map(|m| m.len())
    }

    pub(crate) fn metadata(&self) -> Result<std::fs::Metadata> {
        self.file
            .metadata()
            .map_err(|e| FlockError::file_io(&self.path, e))
    }

    /// Releases the lock, then closes the file. Dropping the handle also
    /// releases the lock, silently.
    pub fn close(mut self) -> Result<()> {
        self.unlock()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open_mode(&self) -> OpenMode {
        self.mode
    }

    pub fn lock_mode(&self) -> Option<LockMode> {
        self.lock
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    pub fn is_locked_exclusive(&self) -> bool {
        self.lock == Some(LockMode::Exclusive)
    }

    pub fn is_locked_shared(&self) -> bool {
        self.lock == Some(LockMode::Shared)
    }

    pub fn is_readable(&self) -> bool {
        self.mode.readable()
    }

    pub fn is_writable(&self) -> bool {
        self.mode.writable()
    }

    fn require(&self, allowed: bool, message: &str) -> Result<()> {
        if allowed {
            return Ok(());
        }
        Err(FlockError::AccessModeError {
            path: self.path.clone(),
            mode: self.mode.to_string(),
            message: message.to_string(),
        })
    }

    fn lock_error(&self, mode: LockMode, source: std::io::Error) -> FlockError {
        FlockError::LockError {
            path: self.path.clone(),
            mode: mode.to_string(),
            source,
        }
    }
}

impl AsRawFd for LockedFile {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl AsFd for LockedFile {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
