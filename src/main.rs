use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;

use mp_tiles::config::{DEFAULT_FETCH_ATTEMPTS, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use mp_tiles::{
    Archive, BlobStore, LocalBlobStore, MergeConfig, ResultSink, S3CliBlobStore, TarArchive,
    TextFileSink, TileId, TileMergeEngine,
};

#[derive(Parser)]
#[command(name = "mp-tiles")]
#[command(about = "Merge tiled matrix profile results into one global profile", long_about = None)]
#[command(version)]
struct Cli {
    /// Bucket holding the tile archives
    #[arg(value_name = "BUCKET")]
    bucket: String,

    /// Key prefix (directory) of the tile archives
    #[arg(value_name = "PREFIX")]
    prefix: String,

    /// Columns per tile
    #[arg(value_name = "TILE_WIDTH")]
    tile_width: usize,

    /// Rows per tile
    #[arg(value_name = "TILE_HEIGHT")]
    tile_height: usize,

    /// Length of the full matrix profile
    #[arg(value_name = "MATRIX_PROFILE_LENGTH")]
    matrix_profile_length: usize,

    /// 1 if the tiles come from a self-join, 0 otherwise
    #[arg(value_name = "SELF_JOIN", value_parser = clap::value_parser!(u8).range(0..=1))]
    self_join: u8,

    /// Merge only these tiles (e.g. result_3_4); default is every listed tile
    #[arg(value_name = "TILE")]
    tiles: Vec<String>,

    /// Parallel fetch workers
    #[arg(short = 'w', long, value_name = "INT", default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Maximum tiles fetched but not yet merged
    #[arg(short = 'q', long, value_name = "INT", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Attempts per download or unpack before giving up
    #[arg(short = 'r', long, value_name = "INT", default_value_t = DEFAULT_FETCH_ATTEMPTS)]
    retries: usize,

    /// Parent directory for per-tile scratch space (default: system temp dir)
    #[arg(long, value_name = "DIR")]
    scratch_dir: Option<PathBuf>,

    /// Directory for full_matrix_profile.txt and full_matrix_profile_index.txt
    #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Read tiles from DIR/PREFIX on local disk instead of S3 (BUCKET is ignored)
    #[arg(long, value_name = "DIR")]
    local_store: Option<PathBuf>,

    /// Write a JSON run summary to FILE
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// Verbose level: 1=error, 2=warning, 3=message, 4=debug, 5+=trace
    #[arg(short = 'v', long, value_name = "INT", default_value = "3")]
    verbosity: i32,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let log_level = match cli.verbosity {
        v if v <= 1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    if let Err(e) = run(cli) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let requested = if cli.tiles.is_empty() {
        None
    } else {
        let tiles = cli
            .tiles
            .iter()
            .map(|t| t.parse::<TileId>())
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid tile identifier on the command line")?;
        Some(tiles)
    };

    let mut config = MergeConfig::new(
        cli.tile_width,
        cli.tile_height,
        cli.matrix_profile_length,
        cli.self_join == 1,
    );
    config.workers = cli.workers;
    config.queue_capacity = cli.queue_capacity;
    config.fetch_attempts = cli.retries;
    if let Some(dir) = &cli.scratch_dir {
        config.scratch_dir = dir.clone();
    }

    match &cli.local_store {
        Some(root) => {
            log::info!("Reading tiles from local store {}", root.display());
            merge(&cli, config, LocalBlobStore::new(root), TarArchive, requested.as_deref())
        }
        None => {
            log::info!("Reading tiles from s3://{}/{}", cli.bucket, cli.prefix);
            merge(
                &cli,
                config,
                S3CliBlobStore::new(&cli.bucket),
                TarArchive,
                requested.as_deref(),
            )
        }
    }
}

fn merge<S: BlobStore, A: Archive>(
    cli: &Cli,
    config: MergeConfig,
    store: S,
    archive: A,
    requested: Option<&[TileId]>,
) -> Result<()> {
    let engine = TileMergeEngine::new(config, store, archive)?;
    let Some(outcome) = engine
        .run(&cli.prefix, requested)
        .with_context(|| format!("Merging tiles under `{}` failed", cli.prefix))?
    else {
        log::info!("Nothing to merge");
        return Ok(());
    };

    TextFileSink::new(&cli.output_dir)
        .write(&outcome.profile)
        .context("Could not write the merged profile")?;

    if let Some(path) = &cli.summary {
        outcome
            .summary
            .write_json(path)
            .with_context(|| format!("Could not write summary to {}", path.display()))?;
    }

    log::info!(
        "Finished: {} tiles, {} positions ({} uncovered)",
        outcome.summary.tiles_merged,
        outcome.summary.length,
        outcome.summary.uncovered
    );
    Ok(())
}
