use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

use crate::media::NetworkHint;

/// Command-line arguments for the cache maintenance binary.
#[derive(Debug, Parser)]
#[command(
    name = "video-media-cache",
    version,
    about = "Inspect and maintain the video media cache"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "VIDEO_MEDIA_CACHE_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Clone, Default)]
pub struct Overrides {
    /// Directory holding the durable cache snapshot.
    #[arg(long, global = true, value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub storage_dir: Option<PathBuf>,

    /// Entry time-to-live in seconds.
    #[arg(long, global = true, value_name = "SECS")]
    pub ttl_secs: Option<u64>,

    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print provider, id, thumbnails and embed URL for each video URL.
    Classify {
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,
    },
    /// Inspect or modify the cache snapshot.
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    /// Print the part of a JSON video list worth loading on a connection.
    Select {
        /// Effective connection type: slow-2g, 2g, 3g or 4g.
        #[arg(long, value_name = "HINT")]
        network: NetworkHint,
        #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
}

#[derive(Debug, Subcommand, Clone)]
pub enum CacheCommand {
    /// List held keys with their age.
    List,
    /// Print the value stored under a key.
    Get { key: String },
    /// Print the cached video list of a site.
    Videos { site_id: String },
    /// Store a JSON array of videos as a site's list.
    PutVideos {
        site_id: String,
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
    /// Drop one site's list, or the whole cache without `--site`.
    Invalidate {
        #[arg(long, value_name = "SITE_ID")]
        site: Option<String>,
    },
    /// Drop every entry and the durable snapshot.
    Clear,
}
