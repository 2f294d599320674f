use crate::config::toml_config::TomlConfig;
use crate::config::Settings;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "shared-flock")]
#[command(about = "Read a file under a shared flock, or hold it under an exclusive one")]
pub struct CliConfig {
    /// Target file (defaults to test.txt next to the executable)
    #[arg(long, global = true)]
    pub file: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Wait for a shared lock, then print the whole file
    Read {
        /// `json` carries the contents as a string when they are valid UTF-8,
        /// otherwise as an array of byte values
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Take an exclusive lock, rewrite the file and hold the lock
    Hold(HoldArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct HoldArgs {
    /// Text written into the file once the lock is held
    #[arg(long)]
    pub text: Option<String>,

    /// How long to keep the exclusive lock
    #[arg(long)]
    pub seconds: Option<u64>,

    /// File mode, octal (0644) or symbolic (rw-r--r--)
    #[arg(long)]
    pub perms: Option<String>,

    #[arg(long)]
    pub owner: Option<u32>,

    #[arg(long)]
    pub group: Option<u32>,
}

impl CliConfig {
    /// Layers defaults, the optional config file and these flags, then validates.
    pub fn resolve(&self) -> Result<Settings> {
        let mut settings = Settings::default();

        if let Some(path) = &self.config {
            let toml = TomlConfig::from_file(path)?;
            settings = settings.apply_toml(&toml)?;
        }

        if let Some(file) = &self.file {
            settings.file_path = file.clone();
        }

        if let Command::Hold(args) = &self.command {
            if let Some(text) = &args.text {
                settings.holder_text = text.clone();
            }
            if let Some(seconds) = args.seconds {
                settings.hold = Duration::from_secs(seconds);
            }
            if let Some(perms) = &args.perms {
                settings.perms = validation::validate_mode("--perms", perms)?;
            }
            settings.owner = args.owner.or(settings.owner);
            settings.group = args.group.or(settings.group);
        }

        settings.validate()?;
        Ok(settings)
    }
}
