//! curve-extract CLI - digitize curves from datasheet graph images

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// Datasheet graph curve extraction tool.
#[derive(Parser)]
#[command(name = "curve-extract")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(long, global = true, env = "CURVE_EXTRACT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract curves from one graph image
    Extract(ExtractArgs),

    /// List the curve colours found in an image
    Colors {
        /// Input image
        image: PathBuf,

        /// Plot area as x0,y0,x1,y1 (detected when omitted)
        #[arg(long)]
        bounds: Option<String>,
    },

    /// Extract curves from many images in parallel
    Batch {
        /// Manifest JSON: a list of {"image": path, "options": {...}}
        manifest: PathBuf,

        /// Output JSON report
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output CSV summary
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Render a synthetic demo graph
    Synth {
        /// Output PNG file
        output: PathBuf,

        /// Image width
        #[arg(long, default_value_t = 800)]
        width: usize,

        /// Image height
        #[arg(long, default_value_t = 600)]
        height: usize,

        /// Use a log y axis from 1 to 1000
        #[arg(long)]
        y_log: bool,
    },
}

/// Arguments of the `extract` command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input image
    image: PathBuf,

    /// Request options file (JSON); flags below override it
    #[arg(long)]
    options: Option<PathBuf>,

    /// Comma-separated colour names or #rrggbb values
    #[arg(long, value_delimiter = ',')]
    colors: Vec<String>,

    /// X axis range as min,max
    #[arg(long)]
    x_range: Option<String>,

    /// Y axis range as min,max
    #[arg(long)]
    y_range: Option<String>,

    /// Logarithmic x axis
    #[arg(long)]
    x_log: bool,

    /// Logarithmic y axis
    #[arg(long)]
    y_log: bool,

    /// Plot area as x0,y0,x1,y1 (detected when omitted)
    #[arg(long)]
    bounds: Option<String>,

    /// Strategy: legacy, optimized, auto or enhanced
    #[arg(long)]
    profile: Option<String>,

    /// Hue tolerance in degrees (0-60)
    #[arg(long)]
    tolerance: Option<u8>,

    /// Minimum blob size in pixels
    #[arg(long)]
    min_size: Option<u32>,

    /// Time limit in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Write points as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the full report as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract(args) => commands::extract::run(args, config, cli.verbose),
        Commands::Colors { image, bounds } => commands::colors::run(image, bounds, config, cli.verbose),
        Commands::Batch { manifest, output, csv } => {
            commands::batch::run(manifest, output, csv, config, cli.verbose)
        }
        Commands::Synth { output, width, height, y_log } => {
            commands::synth::run(output, width, height, y_log, cli.verbose)
        }
    }
}
