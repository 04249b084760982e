use clap::{Parser, Subcommand};
use pixelscale::config::{self, PipelineConfig};
use pixelscale::options::{Filter, OptionsSpec, OutputFormat, Preset, ProcessingOptions};
use pixelscale::output;
use pixelscale::pipeline::Pipeline;
use pixelscale::storage::LocalStorage;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Transformation flags shared by every command that addresses a derivative.
#[derive(clap::Args, Clone, Debug)]
struct OptionArgs {
    /// Target width in pixels (1-4096)
    #[arg(long)]
    width: Option<u32>,
    /// Target height in pixels (1-4096)
    #[arg(long)]
    height: Option<u32>,
    /// Named bounding box: thumbnail (150²), medium (800²), large (1920²)
    #[arg(long)]
    preset: Option<Preset>,
    /// Stretch to exactly --width x --height instead of fitting inside
    #[arg(long)]
    no_maintain_aspect: bool,
    /// Crop origin, left edge
    #[arg(long)]
    crop_x: Option<u32>,
    /// Crop origin, top edge
    #[arg(long)]
    crop_y: Option<u32>,
    /// Crop width (needs all four crop flags)
    #[arg(long)]
    crop_width: Option<u32>,
    /// Crop height (needs all four crop flags)
    #[arg(long)]
    crop_height: Option<u32>,
    /// Clockwise rotation in degrees (0-360)
    #[arg(long, default_value_t = 0)]
    rotate: u32,
    /// Mirror left-right after rotating
    #[arg(long)]
    flip_horizontal: bool,
    /// Flip top-bottom after rotating
    #[arg(long)]
    flip_vertical: bool,
    /// none, grayscale, sepia, blur, sharpen, contour, emboss
    #[arg(long, default_value_t = Filter::None)]
    filter: Filter,
    /// Brightness delta (-100-100)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    brightness: i32,
    /// Contrast delta (-100-100)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    contrast: i32,
    /// Saturation delta (-100-100)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    saturation: i32,
    /// Output codec: jpeg, png, webp
    #[arg(long, default_value_t = OutputFormat::Jpeg)]
    format: OutputFormat,
    /// Lossy quality (1-100)
    #[arg(long, default_value_t = 85)]
    quality: u32,
}

impl OptionArgs {
    fn validate(&self) -> Result<ProcessingOptions, pixelscale::options::OptionsError> {
        OptionsSpec {
            width: self.width,
            height: self.height,
            preset: self.preset,
            maintain_aspect: !self.no_maintain_aspect,
            crop_x: self.crop_x,
            crop_y: self.crop_y,
            crop_width: self.crop_width,
            crop_height: self.crop_height,
            rotate: self.rotate,
            flip_horizontal: self.flip_horizontal,
            flip_vertical: self.flip_vertical,
            filter: self.filter,
            brightness: self.brightness,
            contrast: self.contrast,
            saturation: self.saturation,
            format: self.format,
            quality: self.quality,
        }
        .validate()
    }
}

#[derive(Parser)]
#[command(name = "pixelscale")]
#[command(about = "Deterministic image transformation pipeline")]
#[command(long_about = "\
Deterministic image transformation pipeline

Reads source images from the raw bucket, applies crop, resize, rotation,
filters and adjustments, and publishes the encoded derivative to the
processed bucket under a key derived from the source key and options:

  raw/abc.jpg  --preset medium --format webp  →  processed/medium/abc.webp
  raw/abc.jpg  --width 400                    →  processed/custom/abc.jpg

Objects live on the local filesystem below [storage] root.

Log verbosity follows RUST_LOG, falling back to [logging] level.

Run 'pixelscale gen-config' to generate a documented pixelscale.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./pixelscale.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transform stored sources and publish their derivatives
    Process {
        /// Source keys in the raw bucket, e.g. raw/abc.jpg
        #[arg(required = true)]
        keys: Vec<String>,
        #[command(flatten)]
        options: OptionArgs,
        /// Print one JSON object per source instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the derivative key for a source without touching storage
    Key {
        key: String,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Remove the derivative for a source, reverting to the original
    Revert {
        key: String,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Print a stock pixelscale.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Process {
            keys,
            options,
            json,
        } => {
            let options = options.validate()?;
            let config = resolve_config(cli.config.as_deref())?;
            init_tracing(&config.logging.level);
            init_thread_pool(&config.processing);

            let pipeline = Pipeline::new(config.clone(), LocalStorage::from_config(&config.storage));
            let results: Vec<_> = keys
                .par_iter()
                .map(|key| (key, pipeline.process_stored(key, &options)))
                .collect();

            let mut failed = 0;
            for (key, result) in &results {
                if result.is_err() {
                    failed += 1;
                }
                if json {
                    output::print_process_json(key, result)?;
                } else {
                    output::print_process_result(key, result);
                }
            }
            if !json {
                println!();
                println!(
                    "{}",
                    output::format_process_summary(results.len() - failed, failed)
                );
            }
            if failed > 0 {
                return Err(format!("{failed} of {} sources failed", results.len()).into());
            }
        }
        Command::Key { key, options } => {
            let options = options.validate()?;
            println!(
                "{}",
                output::format_key(&key, &pixelscale::naming::derivative_key(&key, &options))
            );
        }
        Command::Revert { key, options } => {
            let options = options.validate()?;
            let config = resolve_config(cli.config.as_deref())?;
            init_tracing(&config.logging.level);

            let pipeline = Pipeline::new(config.clone(), LocalStorage::from_config(&config.storage));
            let removed = pipeline.revert(&key, &options)?;
            println!("{}", output::format_revert(&key, &removed));
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the config file, then apply `PIXELSCALE_*` environment overrides.
fn resolve_config(path: Option<&Path>) -> Result<PipelineConfig, config::ConfigError> {
    let mut config = match path {
        Some(path) => config::load_config(path)?,
        None => config::load_config_in(Path::new("."))?,
    };
    config.apply_overrides(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

/// Install the global `tracing` subscriber. `RUST_LOG` wins over `level`.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
