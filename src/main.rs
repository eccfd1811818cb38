use std::fs;
use std::io;
use std::path::Path;
use std::process;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};
use video_media_cache::cache::{videos_key, FileStorage, TimeBoundedCache};
use video_media_cache::config::{self, CacheCommand, Command, ConfigError, Settings};
use video_media_cache::host::SystemClock;
use video_media_cache::media::{optimize_for_network, ClassifiedUrl, MediaDescriptor};
use video_media_cache::telemetry::{self, TelemetryError};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no entry for `{0}`")]
    Missing(String),
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let (cli, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    match cli.command {
        Command::Classify { urls } => {
            for url in urls {
                let classified = ClassifiedUrl::from_url(&url);
                println!("{}", serde_json::to_string_pretty(&classified)?);
            }
        }
        Command::Select { network, file } => {
            let videos = read_videos(&file)?;
            let selected = optimize_for_network(&videos, Some(network));
            info!(
                network = network.as_str(),
                total = videos.len(),
                selected = selected.len(),
                "Selected videos for connection"
            );
            println!("{}", serde_json::to_string_pretty(selected)?);
        }
        Command::Cache { command } => run_cache(&settings, command)?,
    }
    Ok(())
}

fn open_cache(settings: &Settings) -> Result<TimeBoundedCache, AppError> {
    let storage = FileStorage::new(&settings.cache.storage_dir)?;
    Ok(TimeBoundedCache::new(
        settings.cache.options(),
        Arc::new(storage),
        Arc::new(SystemClock),
    ))
}

fn run_cache(settings: &Settings, command: CacheCommand) -> Result<(), AppError> {
    let mut cache = open_cache(settings)?;

    match command {
        CacheCommand::List => {
            for key in cache.keys() {
                let age = cache.age_of(&key).unwrap_or_default();
                println!("{key}\t{}s", age.as_secs());
            }
        }
        CacheCommand::Get { key } => {
            let value = cache.get(&key).ok_or_else(|| AppError::Missing(key.clone()))?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        CacheCommand::Videos { site_id } => {
            let videos = cache
                .cached_videos(&site_id)
                .ok_or_else(|| AppError::Missing(videos_key(&site_id)))?;
            println!("{}", serde_json::to_string_pretty(&videos)?);
        }
        CacheCommand::PutVideos { site_id, file } => {
            let videos = read_videos(&file)?;
            cache.set_cached_videos(&site_id, &videos);
            info!(site_id = %site_id, count = videos.len(), "Cached site videos");
        }
        CacheCommand::Invalidate { site } => {
            cache.invalidate_videos(site.as_deref());
            info!(site = site.as_deref().unwrap_or("*"), "Invalidated video cache");
        }
        CacheCommand::Clear => {
            cache.clear();
            info!("Cleared video cache");
        }
    }

    for diagnostic in cache.take_diagnostics() {
        error!(?diagnostic, "Cache operation degraded");
    }
    Ok(())
}

fn read_videos(path: &Path) -> Result<Vec<MediaDescriptor>, AppError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
