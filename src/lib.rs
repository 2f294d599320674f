pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{CliConfig, Command, HoldArgs, OutputFormat};

pub use config::Settings;
pub use crate::core::{
    engine::LockEngine, holder::ExclusiveHolder, locked_file::LockedFile, reader::SharedReader,
};
pub use domain::model::{HoldOutcome, LockMode, OpenMode, ReadOutcome};
pub use utils::error::{FlockError, Result};
