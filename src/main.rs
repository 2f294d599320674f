use anyhow::Context;
use clap::Parser;
use shared_flock::core::ConfigProvider;
use shared_flock::utils::logger;
use shared_flock::{
    CliConfig, Command, ExclusiveHolder, FlockError, LockEngine, OutputFormat, Settings,
    SharedReader,
};
use std::io::Write;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let settings = match cli.resolve() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    };

    if cli.log_json {
        logger::init_json_logger(cli.verbose, settings.log_level.as_deref());
    } else {
        logger::init_cli_logger(cli.verbose, settings.log_level.as_deref());
    }
    tracing::debug!("Resolved settings: {:?}", settings);

    let result = match &cli.command {
        Command::Read { format } => run_read(&settings, *format).await,
        Command::Hold(_) => run_hold(&settings).await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<FlockError>() {
            Some(err) => {
                tracing::error!(
                    "❌ {} (Category: {:?}, Severity: {:?})",
                    err,
                    err.category(),
                    err.severity()
                );
                eprintln!("❌ {}", err.user_friendly_message());
                eprintln!("💡 {}", err.recovery_suggestion());
                std::process::exit(err.exit_code());
            }
            None => {
                tracing::error!("❌ {:#}", e);
                eprintln!("❌ {:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn run_read(settings: &Settings, format: OutputFormat) -> anyhow::Result<()> {
    let path = settings.file_path();
    tracing::info!("📖 Reading {} under a shared lock", path.display());

    let mut stdout = std::io::stdout();
    if format == OutputFormat::Text {
        writeln!(stdout, "Reading file {}...", path.display())?;
        stdout.flush()?;
    }

    let mut engine = LockEngine::new(SharedReader::from_config(settings));
    let outcome = engine.run().await?;

    match format {
        OutputFormat::Text => {
            stdout
                .write_all(&outcome.contents)
                .and_then(|_| writeln!(stdout))
                .context("writing file contents to stdout")?;
        }
        OutputFormat::Json => {
            let report = serde_json::to_string_pretty(&outcome).map_err(FlockError::from)?;
            writeln!(stdout, "{}", report).context("writing JSON report to stdout")?;
        }
    }

    Ok(())
}

async fn run_hold(settings: &Settings) -> anyhow::Result<()> {
    let path = settings.file_path();
    println!("Locking {} and writing to it", path.display());
    println!(
        "Run `shared-flock read --file {}` within {:?} to watch it wait",
        path.display(),
        settings.hold_duration()
    );

    let mut engine = LockEngine::new(ExclusiveHolder::from_config(settings));
    let outcome = engine.run().await?;

    tracing::info!(
        "✅ Held {} for {:?}, {} bytes written",
        outcome.path.display(),
        outcome.held,
        outcome.bytes_written
    );
    println!("✅ Lock on {} released", outcome.path.display());

    Ok(())
}
