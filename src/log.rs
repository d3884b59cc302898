use crate::grid::Dataset;
use crate::input::{JobConfig, TaskConfig};
use indicatif::{ProgressBar, ProgressStyle};
use log::{LevelFilter, info};

/// Initialises `env_logger` at `level` unless `RUST_LOG` is set. Later calls
/// are ignored.
pub fn init_logging(level: &str) {
    let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    let mut builder = env_logger::Builder::new();
    builder.filter_level(filter);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    let _ = builder.try_init();
}

/// A bar of `len` steps, hidden when `enabled` is false.
pub fn progress_bar(len: u64, enabled: bool, message: &str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

pub fn job_echo(config: &JobConfig) {
    info!("Task: {}", config.task.kind());
    match &config.task {
        TaskConfig::Regrid { params } => {
            info!("  ERA5 file: {}", params.era_file.display());
            info!("  Mooring grid: {}", params.mooring_file.display());
            if let Some((start, end)) = params.dates {
                info!("  Dates: {} to {}", start, end);
            }
            info!("  Output: {}", params.output.display());
        }
        TaskConfig::RegionMask { params } => {
            info!("  Grid file: {}", params.grid_file.display());
            info!("  Mask: {:?}", params.mask);
            info!("  Output: {}", params.output.display());
        }
        TaskConfig::Leads { params } => {
            info!("  Moorings: {}", params.moorings.dir.display());
            info!("  Method: {:?}", params.method);
            info!("  Output: {}", params.output.display());
        }
        TaskConfig::IceGrowth { params } => {
            info!("  Moorings: {}", params.moorings.dir.display());
            info!("  Mask: {:?}", params.mask);
            info!("  Output: {}", params.output.display());
        }
    }
}

pub fn describe_dataset(dataset: &Dataset) {
    info!(
        "Dataset: grid {:?}, {} time steps",
        dataset.grid_shape(),
        dataset.n_time()
    );
    for (name, data) in &dataset.variables {
        info!("  {}: {:?}", name, data.dim());
    }
    for (name, data) in &dataset.statics {
        info!("  {} (static): {:?}", name, data.dim());
    }
}
