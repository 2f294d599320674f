use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

pub trait ConfigProvider: Send + Sync {
    fn file_path(&self) -> &Path;
    fn file_perms(&self) -> u32;
    fn owner(&self) -> Option<u32>;
    fn group(&self) -> Option<u32>;
    fn holder_text(&self) -> &str;
    fn hold_duration(&self) -> Duration;
}

/// One pass over a locked file: take the lock, do the work, let go.
#[async_trait]
pub trait LockSession: Send + Sync {
    type Output: Send;

    async fn acquire(&mut self) -> Result<()>;
    async fn work(&mut self) -> Result<Self::Output>;
    async fn release(&mut self) -> Result<()>;
}
