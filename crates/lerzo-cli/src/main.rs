//! lerzo: identity-locked backups of the Lerzo student-management data
//!
//! Commands:
//!   backup          - seal the local dataset into <app>_secure_backup_<date>.enc
//!   restore <file>  - open a backup with the current identity and replace the local dataset
//!   inspect <file>  - show the plaintext fields of a backup file without decrypting
//!   config show     - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use lerzo_backup::{
    AppInfo, BackupFile, BackupService, BackupState, JsonFileStore, OperationStatus,
    RestoreState, SessionIdentity,
};
use lerzo_core::config::{expand_tilde, CryptoConfig, LerzoConfig};
use lerzo_crypto::KdfParams;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "lerzo",
    version,
    about = "Lerzo secure backup tool",
    long_about = "lerzo: create and restore encrypted backups locked to your account email"
)]
struct Cli {
    /// Path to config.toml
    #[arg(
        long,
        short = 'c',
        env = "LERZO_CONFIG",
        default_value = "~/.config/lerzo/config.toml"
    )]
    config: PathBuf,

    /// Signed-in account email (overrides [identity] email)
    #[arg(long, env = "LERZO_IDENTITY", global = true)]
    identity: Option<String>,

    /// Use the developer-bypass identity when no email is set
    #[arg(long, global = true)]
    dev_bypass: bool,

    /// Dataset JSON file (overrides [store] path)
    #[arg(long, env = "LERZO_DATA", global = true)]
    data: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LERZO_LOG", default_value = "warn")]
    log: String,

    /// Log format (json, text)
    #[arg(long, env = "LERZO_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt the local dataset into a backup file only your identity can open
    Backup {
        /// Directory to write the backup into (overrides [backup] output_dir)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Restore a backup file, overwriting all local data
    ///
    /// The file must have been created by the same account email, otherwise
    /// decryption fails and nothing is changed.
    Restore {
        /// Backup file (.enc)
        file: PathBuf,
        /// Skip the overwrite confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Show who a backup claims to be locked to, without decrypting it
    Inspect {
        /// Backup file (.enc)
        file: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log, &cli.log_format);

    let config_path = expand_tilde(&cli.config);
    let config = LerzoConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;
    let session = session_identity(&cli, &config);

    match &cli.command {
        Commands::Backup { output } => {
            cmd_backup(&config, &session, cli.data.as_deref(), output.as_deref()).await
        }
        Commands::Restore { file, yes } => {
            cmd_restore(&config, &session, cli.data.as_deref(), file, *yes).await
        }
        Commands::Inspect { file } => cmd_inspect(file).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

/// CLI flags override the `[identity]` section.
fn session_identity(cli: &Cli, config: &LerzoConfig) -> SessionIdentity {
    SessionIdentity::new(
        cli.identity.clone().or_else(|| config.identity.email.clone()),
        cli.dev_bypass || config.identity.dev_bypass,
    )
}

fn kdf_params(config: &CryptoConfig) -> KdfParams {
    KdfParams::new(
        config.argon2_mem_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
    )
}

fn build_service(config: &LerzoConfig, data: Option<&Path>) -> BackupService<JsonFileStore> {
    let path = expand_tilde(data.unwrap_or(&config.store.path));
    tracing::debug!(data = %path.display(), "using JSON data store");
    BackupService::new(JsonFileStore::new(path), AppInfo::from(&config.app))
        .with_kdf_params(kdf_params(&config.crypto))
}

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn describe(status: OperationStatus) -> &'static str {
    match status {
        OperationStatus::Idle => "",
        OperationStatus::Backup(BackupState::Collecting) => "collecting records",
        OperationStatus::Backup(BackupState::Encrypting) => "deriving key and encrypting",
        OperationStatus::Backup(BackupState::Ready) => "done",
        OperationStatus::Restore(RestoreState::Validating) => "validating backup file",
        OperationStatus::Restore(RestoreState::Decrypting) => "deriving key and decrypting",
        OperationStatus::Restore(RestoreState::Applying) => "replacing local data",
        OperationStatus::Restore(RestoreState::Done) => "done",
        OperationStatus::Backup(BackupState::Failed(_))
        | OperationStatus::Restore(RestoreState::Failed(_)) => "failed",
    }
}

/// Mirror service state changes onto the spinner message.
fn follow_status(mut rx: watch::Receiver<OperationStatus>, pb: ProgressBar) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let status = *rx.borrow_and_update();
            pb.set_message(describe(status));
        }
    })
}

/// `dir/name`, or `dir/<stem>_2.enc`, `_3`, ... if that is taken.
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = name.rsplit_once('.').unwrap_or((name, ""));
    (2u32..)
        .map(|n| {
            if ext.is_empty() {
                dir.join(format!("{stem}_{n}"))
            } else {
                dir.join(format!("{stem}_{n}.{ext}"))
            }
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

// ── `lerzo backup` ────────────────────────────────────────────────────────────

async fn cmd_backup(
    config: &LerzoConfig,
    session: &SessionIdentity,
    data: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let service = build_service(config, data);
    let pb = make_spinner("backup");
    let watcher = follow_status(service.subscribe(), pb.clone());

    let result = service.backup(session).await;
    watcher.abort();
    let artifact = match result {
        Ok(artifact) => artifact,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e).context("failed to create encrypted backup");
        }
    };
    pb.finish_with_message("done");

    let dir = expand_tilde(output.unwrap_or(&config.backup.output_dir));
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("creating output directory: {}", dir.display()))?;
    let path = unique_path(&dir, &artifact.file_name);
    let json = artifact.file.to_json()?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("writing backup: {}", path.display()))?;

    println!("Secure backup written:");
    println!("  file:      {}", path.display());
    println!("  records:   {}", artifact.records);
    println!(
        "  locked to: {}",
        artifact.file.locked_to().unwrap_or("(unknown)")
    );
    println!("It can only be opened by the same account.");
    Ok(())
}

// ── `lerzo restore` ───────────────────────────────────────────────────────────

fn confirm_overwrite(data_path: &Path) -> Result<bool> {
    print!(
        "This will OVERWRITE all current data in {}.\n\
         The file must have been created by YOUR account, otherwise decryption will fail.\n\
         Restore? [y/N] ",
        data_path.display()
    );
    std::io::stdout().flush().context("flushing prompt")?;

    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("reading confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES"))
}

async fn cmd_restore(
    config: &LerzoConfig,
    session: &SessionIdentity,
    data: Option<&Path>,
    file: &Path,
    yes: bool,
) -> Result<()> {
    let service = build_service(config, data);

    if !yes && !confirm_overwrite(service.store().path())? {
        println!("Restore cancelled.");
        return Ok(());
    }

    let contents = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading backup file: {}", file.display()))?;

    let pb = make_spinner("restore");
    let watcher = follow_status(service.subscribe(), pb.clone());

    let result = service.restore_bytes(session, &contents).await;
    watcher.abort();
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e).context("restore failed");
        }
    };
    pb.finish_with_message("done");

    println!("Data restored successfully.");
    println!(
        "  backup:  {} {} created {}",
        report.metadata.app, report.metadata.version, report.metadata.timestamp
    );
    for (collection, count) in &report.counts {
        println!("  {:<10} {count}", format!("{collection}:"));
    }
    Ok(())
}

// ── `lerzo inspect` ───────────────────────────────────────────────────────────

async fn cmd_inspect(file: &Path) -> Result<()> {
    let contents = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading backup file: {}", file.display()))?;
    let backup = BackupFile::from_json(&contents)?;

    println!("File: {}", file.display());
    match backup.info.as_deref() {
        Some(info) => println!("  info:      {info}"),
        None => println!("  info:      (none)"),
    }
    if let Some(owner) = backup.locked_to() {
        println!("  locked to: {owner} (not verified until decryption)");
    }

    match backup.open() {
        Ok(parts) => {
            println!("  salt:      {} bytes", parts.salt.len());
            println!("  iv:        {} bytes", parts.iv.len());
            println!("  payload:   {} bytes encrypted", parts.cipher_text.len());
        }
        Err(e) => println!("  status:    {e}"),
    }
    Ok(())
}

// ── `lerzo config show` ───────────────────────────────────────────────────────

fn cmd_config_show(config: &LerzoConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_identity_flag_overrides_config() {
        let cli = Cli::parse_from(["lerzo", "--identity", "bob@example.com", "backup"]);
        let mut config = LerzoConfig::default();
        config.identity.email = Some("alice@example.com".into());

        let session = session_identity(&cli, &config);
        assert_eq!(session, SessionIdentity::new(Some("bob@example.com".into()), false));
    }

    #[test]
    fn test_identity_from_config_and_bypass_flag() {
        let cli = Cli::parse_from(["lerzo", "restore", "backup.enc", "--dev-bypass", "-y"]);
        let mut config = LerzoConfig::default();
        config.identity.email = Some("alice@example.com".into());

        let session = session_identity(&cli, &config);
        assert_eq!(
            session,
            SessionIdentity::new(Some("alice@example.com".into()), true)
        );
    }

    #[test]
    fn test_kdf_params_from_config() {
        let params = kdf_params(&CryptoConfig {
            argon2_mem_cost_kib: 2048,
            argon2_time_cost: 2,
            argon2_parallelism: 1,
        });
        assert_eq!(params, KdfParams::new(2048, 2, 1));
    }

    #[test]
    fn test_unique_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let name = "lerzo_secure_backup_2026-10-18.enc";

        let first = unique_path(tmp.path(), name);
        assert_eq!(first, tmp.path().join(name));
        std::fs::write(&first, b"{}").unwrap();

        let second = unique_path(tmp.path(), name);
        assert_eq!(
            second,
            tmp.path().join("lerzo_secure_backup_2026-10-18_2.enc")
        );
    }

    #[test]
    fn test_describe_failed() {
        use lerzo_backup::ErrorKind;
        assert_eq!(
            describe(OperationStatus::Restore(RestoreState::Failed(
                ErrorKind::AccessDenied
            ))),
            "failed"
        );
    }
}
