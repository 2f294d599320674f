#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml_config::TomlConfig;

pub const DEFAULT_FILE_NAME: &str = "test.txt";
pub const DEFAULT_HOLDER_TEXT: &str = "This file is locked by the holder process";
pub const DEFAULT_HOLD_SECONDS: u64 = 30;
pub const DEFAULT_FILE_PERMS: u32 = 0o644;
pub const MAX_HOLD_SECONDS: u64 = 86_400;

/// `test.txt` next to the running executable, or in the working directory when
/// the executable path is unavailable.
pub fn default_target_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_NAME))
}

/// Fully resolved settings: defaults, then the TOML file, then CLI flags.
#[derive(Debug, Clone)]
pub struct Settings {
    pub file_path: PathBuf,
    pub perms: u32,
    pub owner: Option<u32>,
    pub group: Option<u32>,
    pub holder_text: String,
    pub hold: Duration,
    pub log_level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            file_path: default_target_path(),
            perms: DEFAULT_FILE_PERMS,
            owner: None,
            group: None,
            holder_text: DEFAULT_HOLDER_TEXT.to_string(),
            hold: Duration::from_secs(DEFAULT_HOLD_SECONDS),
            log_level: None,
        }
    }
}

impl Settings {
    pub fn apply_toml(mut self, config: &TomlConfig) -> Result<Self> {
        config.validate()?;

        if let Some(file) = &config.file {
            if let Some(path) = &file.path {
                self.file_path = PathBuf::from(path);
            }
            if let Some(perms) = &file.perms {
                self.perms = validation::validate_mode("file.perms", perms)?;
            }
            self.owner = file.owner.or(self.owner);
            self.group = file.group.or(self.group);
        }

        if let Some(holder) = &config.holder {
            if let Some(text) = &holder.text {
                self.holder_text = text.clone();
            }
            if let Some(seconds) = holder.hold_seconds {
                self.hold = Duration::from_secs(seconds);
            }
        }

        if let Some(level) = config.logging.as_ref().and_then(|l| l.level.clone()) {
            self.log_level = Some(level);
        }

        Ok(self)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        let path = self.file_path.to_string_lossy();
        validation::validate_path("file.path", &path)?;
        validation::validate_range("file.perms", self.perms, 0, 0o7777)?;
        validation::validate_non_empty_string("holder.text", &self.holder_text)?;
        validation::validate_range("holder.hold_seconds", self.hold.as_secs(), 0, MAX_HOLD_SECONDS)?;
        Ok(())
    }
}

impl ConfigProvider for Settings {
    fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn file_perms(&self) -> u32 {
        self.perms
    }

    fn owner(&self) -> Option<u32> {
        self.owner
    }

    fn group(&self) -> Option<u32> {
        self.group
    }

    fn holder_text(&self) -> &str {
        &self.holder_text
    }

    fn hold_duration(&self) -> Duration {
        self.hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path_is_beside_executable() {
        let path = default_target_path();
        assert!(path.ends_with(DEFAULT_FILE_NAME));
        let exe_dir = std::env::current_exe().unwrap().parent().unwrap().to_path_buf();
        assert_eq!(path.parent().unwrap(), exe_dir);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
[file]
path = "/tmp/elsewhere.txt"
perms = "rw-------"

[holder]
hold_seconds = 2
"#,
        )
        .unwrap();

        let settings = Settings::default().apply_toml(&config).unwrap();
        assert_eq!(settings.file_path, PathBuf::from("/tmp/elsewhere.txt"));
        assert_eq!(settings.perms, 0o600);
        assert_eq!(settings.hold, Duration::from_secs(2));
        assert_eq!(settings.holder_text, DEFAULT_HOLDER_TEXT);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let settings = Settings {
            hold: Duration::from_secs(MAX_HOLD_SECONDS + 1),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            file_path: PathBuf::new(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
