use clap::{Parser, Subcommand};
use placeholder_image::config::{self, CropRequest, Installation};
use placeholder_image::cropper::CommandCropper;
use placeholder_image::pipeline::{CropResult, Pipeline, PipelineError};
use placeholder_image::types::DEFAULT_TYPE;
use placeholder_image::{Catalog, output};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "placeholder-image")]
#[command(about = "Generate placeholder images from a catalog of sources")]
#[command(long_about = "\
Generate placeholder images from a catalog of sources

Every file in the catalog directory is a source type named after its stem.
A crop picks a type (or \"random\"), derives an output name from the type and
size, and hands the work to the external cropper executable.

Installation layout:

  <root>/
  ├── bin/cropper      # called as: cropper --input I --output O --width W --height H
  └── images/          # catalog: user.jpg → type \"user\"

Output names (unless --output is given):
  <output-dir>/<type>-<width>x<height>.<extension>   e.g. ./user-128x128.jpg

Existing files are left alone unless --force is passed.

Run 'placeholder-image gen-config' to print a documented request file.")]
#[command(version)]
struct Cli {
    /// Installation root holding images/ and bin/cropper
    /// [default: parent of the executable's directory]
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Catalog directory [default: <root>/images]
    #[arg(long, global = true)]
    images: Option<PathBuf>,

    /// Cropper executable [default: <root>/bin/cropper]
    #[arg(long, global = true)]
    cropper: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Flags for a single crop. Unset flags fall back to the request file, then
/// to the stock defaults.
#[derive(clap::Args)]
struct CropArgs {
    /// Output width in pixels [default: 128]
    #[arg(long)]
    width: Option<u32>,

    /// Output height in pixels [default: 128]
    #[arg(long)]
    height: Option<u32>,

    /// Catalog type or "random" [default: user]
    #[arg(long = "type", value_name = "TYPE")]
    type_name: Option<String>,

    /// Encoding quality, 0-100 [default: 90]
    #[arg(long)]
    quality: Option<u32>,

    /// Directory for generated names [default: current directory]
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Exact output path (overrides --output-dir and --extension)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Crop this image instead of a catalog entry
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// Extension for generated names [default: jpg]
    #[arg(long)]
    extension: Option<String>,

    /// Overwrite the output file if it exists
    #[arg(long)]
    force: bool,

    /// TOML request file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Kill the cropper after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Print the destination and outcome as JSON lines instead of progress
    #[arg(long)]
    json: bool,
}

impl CropArgs {
    /// Flags that were actually given, as a TOML table to merge over the
    /// request file.
    fn overlay(&self) -> toml::Value {
        let mut table = toml::Table::new();
        if let Some(width) = self.width {
            table.insert("width".into(), i64::from(width).into());
        }
        if let Some(height) = self.height {
            table.insert("height".into(), i64::from(height).into());
        }
        if let Some(type_name) = &self.type_name {
            table.insert("type".into(), type_name.clone().into());
        }
        if let Some(quality) = self.quality {
            table.insert("quality".into(), i64::from(quality).into());
        }
        if let Some(dir) = &self.output_dir {
            table.insert("output_dir".into(), dir.to_string_lossy().into_owned().into());
        }
        if let Some(path) = &self.output {
            table.insert("output_path".into(), path.to_string_lossy().into_owned().into());
        }
        if let Some(path) = &self.input {
            table.insert("input_path".into(), path.to_string_lossy().into_owned().into());
        }
        if let Some(ext) = &self.extension {
            table.insert("extension".into(), ext.clone().into());
        }
        if self.force {
            table.insert("force".into(), true.into());
        }
        toml::Value::Table(table)
    }

    fn request(&self) -> Result<CropRequest, config::ConfigError> {
        let base = self
            .config
            .as_deref()
            .map(config::load_raw_request)
            .transpose()?;
        config::resolve_request(base, self.overlay())
    }
}

#[derive(Subcommand)]
enum Command {
    /// Crop a placeholder image
    Crop(CropArgs),
    /// List the source types in the catalog
    Types {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a request file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Crop(args) => {
            let install = resolve_installation(&cli)?;
            let catalog = Catalog::scan(&install.images_dir)?;
            let request = args.request()?;
            let result = crop(catalog, install, args, &request);
            let failed = result.is_err() && !is_already_exists(&result);
            if args.json {
                println!("{}", output::outcome_json(&result, &request));
            } else {
                output::print_outcome(&result);
            }
            if failed {
                std::process::exit(1);
            }
        }
        Command::Types { json } => {
            let install = resolve_installation(&cli)?;
            let catalog = Catalog::scan(&install.images_dir)?;
            if *json {
                let value = output::catalog_json(&catalog, DEFAULT_TYPE);
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                output::print_catalog(&catalog, DEFAULT_TYPE);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Run one request to completion, printing progress as it happens. The
/// destination is printed as soon as it is resolved, before the cropper exits.
fn crop(
    catalog: Catalog,
    install: Installation,
    args: &CropArgs,
    request: &CropRequest,
) -> CropResult {
    let mut cropper = CommandCropper::new(install.cropper);
    if let Some(secs) = args.timeout {
        cropper = cropper.with_timeout(Duration::from_secs(secs));
    }
    let pipeline = Pipeline::new(Arc::new(catalog), Arc::new(cropper));

    let json = args.json;
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            if json {
                if let Some(value) = output::crop_event_json(&event) {
                    println!("{}", value);
                }
            } else {
                for line in output::format_crop_event(&event) {
                    println!("{}", line);
                }
            }
        }
    });
    let pipeline = pipeline.with_events(tx);
    let result = pipeline.submit(request).wait();
    drop(pipeline);
    printer.join().ok();
    result
}

/// Installation paths from `--root`, `--images` and `--cropper`.
fn resolve_installation(cli: &Cli) -> Result<Installation, config::ConfigError> {
    let mut install = match &cli.root {
        Some(root) => Installation::from_root(root),
        None if cli.images.is_some() && cli.cropper.is_some() => {
            Installation::from_root(std::path::Path::new("."))
        }
        None => Installation::detect()?,
    };
    if let Some(images) = &cli.images {
        install.images_dir = images.clone();
    }
    if let Some(cropper) = &cli.cropper {
        install.cropper = cropper.clone();
    }
    Ok(install)
}

fn is_already_exists(result: &CropResult) -> bool {
    matches!(result, Err(PipelineError::AlreadyExists(_)))
}
