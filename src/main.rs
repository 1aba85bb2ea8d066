use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use soundon_export::config::Config;
use soundon_export::feed::{extract_title_url_map, write_mapping};

#[derive(Parser, Debug)]
#[command(
    name = "soundon-export",
    about = "Export a JSON mapping of episode titles to their MP3 URLs from soundon.xml"
)]
struct Args {
    /// Path to soundon.xml file
    #[arg(value_name = "XML_PATH")]
    xml_path: PathBuf,

    /// Destination JSON file
    #[arg(value_name = "OUTPUT_PATH")]
    output_path: PathBuf,

    /// Indentation for JSON output [default: 2]
    #[arg(long, value_name = "N")]
    indent: Option<usize>,

    /// TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // RUST_LOG, when set, takes precedence over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => Config::default(),
    };
    let indent = config.indent_or(args.indent);

    let mapping = extract_title_url_map(&args.xml_path)
        .with_context(|| format!("Failed to extract episodes from '{}'", args.xml_path.display()))?;
    if mapping.is_empty() {
        tracing::warn!(path = %args.xml_path.display(), "No episodes with an enclosure url found");
    }

    write_mapping(&mapping, &args.output_path, indent)
        .with_context(|| format!("Failed to export mapping to '{}'", args.output_path.display()))?;

    tracing::info!(
        episodes = mapping.len(),
        output = %args.output_path.display(),
        "Export complete"
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    run(&args)
}
