use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use stash_sync::backup::{choose_backup, list_backups, restore_file, BackupLog};
use stash_sync::config::{SyncConfig, DEFAULT_CONFIG_PATH};
use stash_sync::import::read_rows;
use stash_sync::run_log::{RunLog, RESTORE_LOG_NAME};
use stash_sync::stash::StashClient;
use stash_sync::sync::{run_log_path, run_stamp, SyncRun};
use stash_sync::util::env as env_util;
use tracing::info;

const DEFAULT_CSV: &str = "e621_metadata.csv";

#[derive(Parser, Debug)]
#[command(
    name = "stash-sync",
    version,
    about = "Import post metadata from a dataset export into Stash"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    // Allow `stash-sync --csv x.csv` without the explicit `sync` subcommand.
    // If a subcommand is present, these args are ignored.
    #[command(flatten)]
    sync: SyncArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Update catalog metadata from the import CSV (default when no command supplied)
    Sync(SyncArgs),
    /// Undo a previous run by replaying its backup file
    Restore(RestoreArgs),
}

#[derive(Debug, Args)]
struct SyncArgs {
    /// Path to the JSON configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Import CSV produced by the extraction step
    #[arg(long, default_value = DEFAULT_CSV)]
    csv: PathBuf,
    /// Replace fields that already have a value (overrides the config file)
    #[arg(long, action = ArgAction::SetTrue)]
    overwrite: bool,
}

#[derive(Debug, Args)]
struct RestoreArgs {
    /// Path to the JSON configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Directory searched for backup files when FILE is omitted
    /// (defaults to the configured output directory)
    #[arg(long)]
    dir: Option<PathBuf>,
    /// Backup file to replay; prompts for one when omitted
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    let cli = Cli::parse();
    stash_sync::tracing::init_tracing("warn,stash_sync=info")?;

    match cli.command {
        Some(Command::Restore(args)) => restore(args).await,
        Some(Command::Sync(args)) => sync(args).await,
        None => sync(cli.sync).await,
    }
}

async fn sync(args: SyncArgs) -> Result<()> {
    let mut cfg = SyncConfig::load(&args.config).context("loading configuration")?;
    if args.overwrite {
        cfg.overwrite_existing_metadata = true;
    }
    let data_dir = cfg.validate_for_sync()?;
    println!("Data directory validated: {}", data_dir.display());

    if !args.csv.is_file() {
        bail!(
            "import file {} not found; run the metadata extraction for {} first",
            args.csv.display(),
            data_dir.display()
        );
    }
    let rows = read_rows(&args.csv)?;

    let client = StashClient::new(&cfg).context("building Stash client")?;
    info!(endpoint = client.endpoint(), rows = rows.len(), "starting sync");

    std::fs::create_dir_all(&cfg.output_directory).with_context(|| {
        format!(
            "creating output directory {}",
            cfg.output_directory.display()
        )
    })?;
    let stamp = run_stamp();
    let backup = BackupLog::for_run(&cfg.output_directory, &stamp);
    let log = RunLog::create(run_log_path(&cfg.output_directory, &stamp))?;

    println!("Processing CSV file and updating metadata in Stash...");
    let report = SyncRun::start(&client, cfg.import_options(), backup, log)
        .await?
        .with_progress_every(cfg.progress_every)
        .run(&rows)
        .await?;

    let s = report.stats;
    println!("Processing complete.");
    println!(
        "updated={} unchanged={} skipped={} (unsupported={}, not found={}) tags_created={} tags_skipped={}",
        s.updated,
        s.unchanged,
        s.skipped(),
        s.unsupported,
        s.not_found,
        s.tags_created,
        s.tags_failed
    );
    println!("Log saved to {}.", report.log_path.display());
    match &report.backup_path {
        Some(path) => println!("Backup saved to {}.", path.display()),
        None => println!("No changes made; no backup written."),
    }
    Ok(())
}

async fn restore(args: RestoreArgs) -> Result<()> {
    let cfg = SyncConfig::load(&args.config).context("loading configuration")?;
    let dir = args.dir.unwrap_or_else(|| cfg.output_directory.clone());

    let file = match args.file {
        Some(file) => file,
        None => {
            let files = list_backups(&dir)
                .with_context(|| format!("listing backups in {}", dir.display()))?;
            match choose_backup(&files, io::stdin().lock(), io::stdout())? {
                Some(file) => file,
                None => return Ok(()),
            }
        }
    };

    let client = StashClient::new(&cfg).context("building Stash client")?;
    let mut log = RunLog::append(dir.join(RESTORE_LOG_NAME))?;

    println!("Processing file: {}", file.display());
    let summary = restore_file(&client, &file, &mut log).await?;
    println!(
        "Finished: {}/{} lines restored, {} skipped, {} failed. See {}.",
        summary.restored,
        summary.total,
        summary.skipped,
        summary.failed,
        log.path().display()
    );
    Ok(())
}
