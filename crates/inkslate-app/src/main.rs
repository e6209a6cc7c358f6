//! Inkslate command-line entry point.

use clap::{Parser, Subcommand};
use inkslate_core::{DocumentDirectory, FileVersion, PageStore, PersistConfig, PersistError, SceneAdaptor, StorageError};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "inkslate", version, about = "Inspect and upgrade Inkslate documents")]
struct Cli {
    /// JSON file with persistence settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Summarize pages and the problems found while reading them.
    Inspect {
        document: PathBuf,
        /// Zero-based page index; all pages when omitted.
        #[arg(long)]
        page: Option<usize>,
    },
    /// Print a loaded page as JSON.
    Dump {
        document: PathBuf,
        #[arg(long, default_value_t = 0)]
        page: usize,
        /// Print the stored markup instead.
        #[arg(long)]
        raw: bool,
    },
    /// Rewrite pages saved by older versions in the current format.
    Upgrade { document: PathBuf },
    /// Print or replace a page uuid.
    Uuid {
        document: PathBuf,
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(long)]
        set: Option<Uuid>,
    },
}

#[derive(Debug, Error)]
enum AppError {
    #[error("Cannot read config {}: {source}", .path.display())]
    ConfigFile { path: PathBuf, source: std::io::Error },
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("inkslate: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<String, AppError> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Inspect { document, page } => inspect(&document, page, config),
        Command::Dump { document, page, raw } => dump(&document, page, raw, config),
        Command::Upgrade { document } => upgrade(&document, config),
        Command::Uuid { document, page, set } => page_uuid(&document, page, set, config),
    }
}

fn load_config(path: Option<&Path>) -> Result<PersistConfig, AppError> {
    let Some(path) = path else {
        return Ok(PersistConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| AppError::ConfigFile {
        path: path.to_path_buf(),
        source,
    })?;
    let config = serde_json::from_str(&text)?;
    log::debug!("Loaded config from {}: {:?}", path.display(), config);
    Ok(config)
}

fn open(document: &Path, config: PersistConfig) -> Result<SceneAdaptor<DocumentDirectory>, AppError> {
    Ok(SceneAdaptor::with_config(DocumentDirectory::open(document)?, config))
}

fn inspect(document: &Path, page: Option<usize>, config: PersistConfig) -> Result<String, AppError> {
    // Report pages as stored.
    let config = PersistConfig {
        upgrade_on_load: false,
        ..config
    };
    let adaptor = open(document, config)?;
    let pages: Vec<usize> = match page {
        Some(index) => vec![index],
        None => (0..adaptor.store().page_count()).collect(),
    };

    let mut report = Vec::with_capacity(pages.len());
    for index in pages {
        let mut reader = adaptor.prepare_loading_scene(index)?;
        while !reader.is_finished() {
            reader.step()?;
        }
        let warnings: Vec<String> = reader.warnings().iter().map(ToString::to_string).collect();
        let scene = reader.into_scene()?;
        report.push(json!({
            "page": index,
            "uuid": scene.uuid.braced().to_string(),
            "version": scene.version.to_string(),
            "items": scene.item_count(),
            "warnings": warnings,
        }));
    }
    Ok(serde_json::to_string_pretty(&report)?)
}

fn dump(document: &Path, page: usize, raw: bool, config: PersistConfig) -> Result<String, AppError> {
    let adaptor = open(document, config)?;
    if raw {
        return Ok(adaptor.load_scene_as_text(page)?);
    }
    let scene = adaptor.load_scene(page)?;
    Ok(serde_json::to_string_pretty(&scene)?)
}

fn upgrade(document: &Path, config: PersistConfig) -> Result<String, AppError> {
    let adaptor = open(document, config)?;
    let count = adaptor.store().page_count();
    let mut upgraded = 0;
    for index in 0..count {
        if adaptor.upgrade_scene(index)? {
            upgraded += 1;
        }
    }
    if count > 0 {
        DocumentDirectory::open(document)?.set_version(FileVersion::CURRENT)?;
    }
    Ok(format!("Upgraded {} of {} page(s)", upgraded, count))
}

fn page_uuid(document: &Path, page: usize, set: Option<Uuid>, config: PersistConfig) -> Result<String, AppError> {
    let adaptor = open(document, config)?;
    if let Some(uuid) = set {
        adaptor.set_scene_uuid(page, uuid)?;
    }
    Ok(match adaptor.scene_uuid(page)? {
        Some(uuid) => uuid.braced().to_string(),
        None => "none".to_string(),
    })
}
