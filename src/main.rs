use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use scenecap::client::RpcSceneClient;
use scenecap::config::CaptureConfig;
use scenecap::pipeline::CapturePipeline;
use scenecap::task::TaskDescription;
use scenecap::variants::PoseJitterGenerator;

#[derive(Parser)]
#[command(name = "scenecap")]
#[command(about = "Capture multi-view scene images from randomized task variants")]
struct Args {
    /// Path to the task description JSON file
    #[arg(long)]
    task_json: PathBuf,

    /// Number of variants to generate
    #[arg(long, default_value_t = 5)]
    num_variants: usize,

    /// Output directory for images and metadata
    #[arg(long, default_value = "task_variants")]
    output_dir: PathBuf,

    /// Scene service host:port
    #[arg(long, default_value = "localhost:50051")]
    host: String,

    /// Capture settings file path
    #[arg(short, long, default_value = "capture.toml")]
    config: String,

    /// Seed for variant randomization (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(format!("scenecap={}", log_level))
        .try_init(); // Use try_init to avoid panic if already initialized

    if !args.task_json.exists() {
        error!("Task JSON file not found: {}", args.task_json.display());
        std::process::exit(1);
    }

    match run(args).await {
        Ok(()) => {}
        Err(e) => {
            error!("Capture run failed: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<()> {
    info!("Starting scenecap - multi-view task variant capture");

    let config = CaptureConfig::load(&args.config).await?;
    info!("Configuration loaded successfully");

    info!("Loading task configuration from: {}", args.task_json.display());
    let task = TaskDescription::load(&args.task_json).await?;

    let client = RpcSceneClient::connect(&args.host).await?;
    info!("Connected to scene service at {}", client.host());
    let generator = PoseJitterGenerator::new(args.seed);

    let mut pipeline = CapturePipeline::new(
        Box::new(client),
        Box::new(generator),
        config,
        task,
        args.task_json.clone(),
        &args.output_dir,
        args.num_variants,
    )?;

    let summary = pipeline.run().await?;
    info!(
        "Run complete: {} variants for task '{}'",
        summary.num_variants, summary.task_name
    );
    Ok(())
}
