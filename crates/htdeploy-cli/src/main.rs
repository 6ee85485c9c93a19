//! htdeploy: one-way website/app deployment CLI.
//!
//! Commands:
//!   deploy [--config PATH] [--dry-run] [--allow-delete] [-v]
//!   config show [--config PATH]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use htdeploy_core::config::DeployConfig;
use htdeploy_core::types::Job;
use htdeploy_sync::preprocess::{FilterRegistry, Preprocessor};
use htdeploy_sync::{deploy, DeployOptions};
use htdeploy_transport::LocalFsServer;
#[cfg(feature = "sftp")]
use htdeploy_transport::SftpServer;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "htdeploy",
    version,
    about = "One-way synchronization deployer",
    long_about = "htdeploy: reconcile a local directory tree with a remote target over a pluggable file-transfer backend"
)]
struct Cli {
    /// Path to the htdeploy config file.
    #[arg(long, short = 'c', env = "HTDEPLOY_CONFIG", default_value = "htdeploy.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "HTDEPLOY_LOG", default_value = "info")]
    log: String,

    /// Log output format.
    #[arg(long, env = "HTDEPLOY_LOG_FORMAT", default_value = "text")]
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
    /// Reconcile the local tree with the remote target.
    Deploy {
        /// Plan the deploy without writing any changes.
        #[arg(long)]
        dry_run: bool,
        /// Allow remote-only entries to be deleted.
        #[arg(long)]
        allow_delete: bool,
        /// Verbose (debug-level) logging; repeat for trace.
        #[arg(short = 'v', action = clap::ArgAction::Count)]
        verbose: u8,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file).
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Deploy { verbose, .. } => init_logging(&bump_log_level(&cli.log, *verbose), &cli.log_format),
        Commands::Config { .. } => init_logging(&cli.log, &cli.log_format),
    }

    let config = load_config(&cli.config).await?;

    match cli.command {
        Commands::Deploy {
            dry_run,
            allow_delete,
            ..
        } => cmd_deploy(&config, dry_run, allow_delete).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
    }
}

fn bump_log_level(base: &str, verbose: u8) -> String {
    match verbose {
        0 => base.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}

async fn load_config(path: &Path) -> Result<DeployConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(DeployConfig::default())
    }
}

fn make_progress_bar(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

struct CliProgress {
    bar: ProgressBar,
}

impl htdeploy_core::Progress for CliProgress {
    fn step(&self, n: u64, total: u64, label: &str) {
        if total > 0 {
            self.bar.set_length(total);
        }
        self.bar.set_position(n);
        self.bar.set_message(label.to_string());
    }

    fn bytes(&self, percent: u8) {
        self.bar.set_message(format!("{percent}%"));
    }
}

async fn cmd_deploy(config: &DeployConfig, dry_run: bool, allow_delete_flag: bool) -> Result<()> {
    info!(
        local = %config.local.root.display(),
        remote_kind = %config.remote.kind,
        "htdeploy starting"
    );

    let before_jobs: Vec<Job> = config
        .sync
        .before_jobs
        .iter()
        .filter_map(|s| Job::parse(s))
        .collect();
    let after_jobs: Vec<Job> = config
        .sync
        .after_jobs
        .iter()
        .filter_map(|s| Job::parse(s))
        .collect();

    let opts = DeployOptions {
        manifest_filename: config.manifest.filename.clone(),
        ignore: config.sync.ignore.clone(),
        allow_delete: allow_delete_flag || config.sync.allow_delete,
        purge: config.sync.purge.clone(),
        before_jobs,
        after_jobs,
        test_mode: dry_run || config.sync.test_mode,
        temp_dir: config.sync.temp_dir.clone(),
    };

    let preprocessor = Preprocessor::new(FilterRegistry::new(), config.sync.preprocess.clone(), opts.temp_dir.clone());

    let pb = make_progress_bar("deploy");
    let progress = CliProgress { bar: pb.clone() };

    let mut server: Box<dyn htdeploy_transport::Server> = match config.remote.kind.as_str() {
        "local" => Box::new(LocalFsServer::new(config.remote.root.clone())),
        #[cfg(feature = "sftp")]
        "sftp" => {
            let mut sftp = SftpServer::new(
                config.remote.host.clone(),
                config.remote.port,
                config.remote.username.clone().unwrap_or_default(),
                config.remote.root.clone(),
            );
            if let Some(key) = &config.remote.key_file {
                sftp = sftp.with_key_file(key.clone());
            }
            Box::new(sftp)
        }
        #[cfg(not(feature = "sftp"))]
        "sftp" => anyhow::bail!("SFTP support requires building with --features sftp"),
        other => anyhow::bail!(
            "unsupported remote kind `{other}` (build with --features sftp for SFTP support)"
        ),
    };

    let report = deploy(&config.local.root, server.as_mut(), &preprocessor, &opts, &progress).await?;

    pb.finish_and_clear();

    if !report.manifest_changed {
        println!("already synchronized, nothing to do");
    } else if report.dry_run {
        println!(
            "dry run: would upload {} and delete {}",
            report.uploaded, report.deleted
        );
    } else {
        println!(
            "deployed: {} uploaded, {} deleted, {} purged",
            report.uploaded, report.deleted, report.purged
        );
    }

    Ok(())
}

fn cmd_config_show(config: &DeployConfig, config_path: &Path) -> Result<()> {
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
