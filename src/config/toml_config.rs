use crate::config::MAX_HOLD_SECONDS;
use crate::utils::error::{FlockError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub file: Option<FileConfig>,
    pub holder: Option<HolderConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub path: Option<String>,
    pub perms: Option<String>,
    pub owner: Option<u32>,
    pub group: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HolderConfig {
    pub text: Option<String>,
    pub hold_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl TomlConfig {
    /// Reads and parses a config file from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| FlockError::file_io(path.as_ref(), e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| FlockError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unset variables stay verbatim.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| FlockError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(file) = &self.file {
            if let Some(path) = &file.path {
                validation::validate_path("file.path", path)?;
            }
            if let Some(perms) = &file.perms {
                validation::validate_mode("file.perms", perms)?;
            }
        }

        if let Some(holder) = &self.holder {
            if let Some(text) = &holder.text {
                validation::validate_non_empty_string("holder.text", text)?;
            }
            if let Some(seconds) = holder.hold_seconds {
                validation::validate_range("holder.hold_seconds", seconds, 0, MAX_HOLD_SECONDS)?;
            }
        }

        if let Some(level) = self.logging.as_ref().and_then(|l| l.level.as_deref()) {
            if !LOG_LEVELS.contains(&level) {
                return Err(FlockError::InvalidConfigValueError {
                    field: "logging.level".to_string(),
                    value: level.to_string(),
                    reason: format!("Valid levels: {}", LOG_LEVELS.join(", ")),
                });
            }
        }

        Ok(())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[file]
path = "shared.txt"
perms = "0640"
owner = 1000
group = 100

[holder]
text = "busy writing"
hold_seconds = 5

[logging]
level = "debug"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        let file = config.file.as_ref().unwrap();
        assert_eq!(file.path.as_deref(), Some("shared.txt"));
        assert_eq!(file.owner, Some(1000));
        assert_eq!(config.holder.as_ref().unwrap().hold_seconds, Some(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert!(config.file.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SHARED_FLOCK_TEST_PATH", "/var/tmp/locked.txt");

        let toml_content = r#"
[file]
path = "${SHARED_FLOCK_TEST_PATH}"

[holder]
text = "${SHARED_FLOCK_SURELY_UNSET}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.file.unwrap().path.as_deref(),
            Some("/var/tmp/locked.txt")
        );
        assert_eq!(
            config.holder.unwrap().text.as_deref(),
            Some("${SHARED_FLOCK_SURELY_UNSET}")
        );

        std::env::remove_var("SHARED_FLOCK_TEST_PATH");
    }

    #[test]
    fn test_config_validation() {
        let bad_perms = TomlConfig::from_toml_str("[file]\nperms = \"0999\"\n").unwrap();
        assert!(bad_perms.validate().is_err());

        let bad_level = TomlConfig::from_toml_str("[logging]\nlevel = \"loud\"\n").unwrap();
        assert!(bad_level.validate().is_err());

        let bad_hold = TomlConfig::from_toml_str("[holder]\nhold_seconds = 999999\n").unwrap();
        assert!(bad_hold.validate().is_err());
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = TomlConfig::from_toml_str("[file\npath = 1").unwrap_err();
        assert!(matches!(err, FlockError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[holder]\ntext = \"from file\"\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.holder.unwrap().text.as_deref(), Some("from file"));
    }
}
