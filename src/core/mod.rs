pub mod engine;
pub mod holder;
pub mod locked_file;
pub mod permissions;
pub mod reader;

pub use crate::domain::model::{HoldOutcome, LockMode, OpenMode, ReadOutcome};
pub use crate::domain::ports::{ConfigProvider, LockSession};
pub use crate::utils::error::Result;
