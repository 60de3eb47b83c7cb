use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bbox_control::{
    bbox::{self, BBoxOutcome},
    config::AppConfig,
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Bounding-box selection and generation control API")]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// Override the generator executable
    #[arg(long)]
    generator: Option<PathBuf>,

    /// Validate a `lat,lng,lat,lng` string, print its size tier and exit
    #[arg(long, value_name = "COORDS", allow_hyphen_values = true)]
    check_bbox: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(text) = cli.check_bbox {
        match bbox::parse_text(&text) {
            Ok(BBoxOutcome::Accepted { bbox, tier }) => {
                println!(
                    "{} ({:.0} m², {:?}): {}",
                    bbox.to_bbox_text(),
                    bbox.area(),
                    tier,
                    tier.message()
                );
            }
            Ok(BBoxOutcome::Cleared) => println!("No selection."),
            Err(err) => {
                eprintln!("{err}");
                std::process::exit(2);
            }
        }
        return Ok(());
    }

    web::run(WebServerConfig {
        host: cli.host.unwrap_or(config.server.host),
        port: cli.port.unwrap_or(config.server.port),
        generator: cli.generator.unwrap_or(config.generator.program),
        generator_args: config.generator.args,
        saves_dir: config.generator.saves_dir,
        progress_capacity: config.server.progress_capacity,
    })
    .await
}
