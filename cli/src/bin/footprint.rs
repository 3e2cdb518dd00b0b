use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use footprint::BoundingBox;
use footprint_cli::{load_config, parse_bbox, run_job, schema_json, write_default_config, ExtractionJob};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract building footprints from a georeferenced tile
    Run {
        /// Pipeline configuration (.toml or .json); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Tile image (png, jpeg or tiff)
        #[arg(short, long)]
        image: PathBuf,
        /// Bounds of the image as west,east,north,south
        #[arg(short, long, value_parser = parse_bbox, allow_hyphen_values = true)]
        bbox: BoundingBox,
        /// Region to run, repeatable; the whole image when omitted
        #[arg(short, long, value_parser = parse_bbox, allow_hyphen_values = true)]
        region: Vec<BoundingBox>,
        /// Use a local SVG mask instead of calling the segmentation service
        #[arg(long)]
        svg: Option<PathBuf>,
        /// GeoJSON output path
        #[arg(short, long, default_value = "footprints.geojson")]
        output: PathBuf,
        /// Also write a tar.zst archive of the footprints
        #[arg(long)]
        archive: Option<PathBuf>,
    },
    /// Print the JSON schema of the pipeline configuration
    Schema,
    /// Write a configuration file with every default filled in
    InitConfig {
        #[arg(short, long, default_value = "footprint.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            image,
            bbox,
            region,
            svg,
            output,
            archive,
        } => {
            let config = load_config(config.as_deref())?;
            let job = ExtractionJob {
                image,
                bbox,
                regions: region,
                svg,
                output,
                archive,
            };

            let summary = run_job(&config, &job).await?;
            if summary.failed > 0 {
                warn!("{} region(s) failed, see the log above", summary.failed);
            }
            info!(
                "✅ {} footprints, {:.2} m² in total ({} completed, {} empty)",
                summary.features, summary.total_area_m2, summary.completed, summary.nothing_detected
            );
        }
        Commands::Schema => {
            println!("{}", schema_json()?);
        }
        Commands::InitConfig { output } => {
            write_default_config(&output)?;
            info!("📄 Configuration saved to: {:?}", output);
        }
    }

    Ok(())
}
