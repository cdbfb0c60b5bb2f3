//! scene-ingest - Classify and ingest viewer inputs from the command line.
//!
//! This binary wires the library components together: it fetches inputs,
//! runs the ingestion pipeline, creates a headless viewer and prints the
//! resulting scene.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scene_ingest::{
    classify,
    config::{ClassifyConfig, Cli, Command, InspectConfig, LoadConfig, RemoteConfig},
    create_s3_client, ChunkedMultiscaleImage, DefaultFetcher, HeadlessEngine, Locator,
    NativeDecoder, ViewerFactory,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Load(config) => run_load(config).await,
        Command::Classify(config) => run_classify(config),
        Command::Inspect(config) => run_inspect(config).await,
    }
}

// =============================================================================
// Load Command
// =============================================================================

async fn run_load(config: LoadConfig) -> ExitCode {
    init_logging(config.verbose());

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let locators = config
        .inputs
        .iter()
        .chain(config.image.iter())
        .chain(config.label_image.iter())
        .chain(config.label_image_names.iter());
    let needs_s3 = locators
        .into_iter()
        .any(|l| l.trim_start().starts_with("s3://"));
    let fetcher = Arc::new(build_fetcher(&config.remote, needs_s3).await);

    let engine = Arc::new(HeadlessEngine::new());
    let decoder = Arc::new(NativeDecoder::new(config.workers));
    let factory = ViewerFactory::new(engine.clone(), decoder, fetcher);

    info!("Configuration:");
    info!("  Inputs: {}", config.inputs.len());
    info!("  Workers: {}", config.workers);
    if let Ok(viewport) = config.viewport() {
        info!("  Viewport: {}", viewport);
    }

    let progress = |received: u64, total: Option<u64>| match total {
        Some(total) => tracing::debug!(received, total, "download progress"),
        None => tracing::debug!(received, "download progress"),
    };

    let viewer = match factory
        .create_viewer_from_urls(config.to_request(), Some(&progress))
        .await
    {
        Ok(viewer) => viewer,
        Err(e) => {
            error!("Failed to load scene: {}", e);
            return ExitCode::FAILURE;
        }
    };
    viewer.render();

    info!(
        state = %viewer.machine_state(),
        dark_mode = viewer.ui_dark_mode(),
        layers = viewer.layers().len(),
        "viewer ready"
    );
    for entry in viewer.layers().entries() {
        info!("  {}", entry.tooltip);
    }

    match serde_json::to_string_pretty(&viewer.scene().summary()) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize scene: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Classify Command
// =============================================================================

fn run_classify(config: ClassifyConfig) -> ExitCode {
    for name in &config.names {
        let category = classify(name);
        match category {
            scene_ingest::ReaderCategory::Mesh(io) => {
                println!("{}\t{} ({})", name, category.name(), io.name())
            }
            _ => println!("{}\t{}", name, category.name()),
        }
    }
    ExitCode::SUCCESS
}

// =============================================================================
// Inspect Command
// =============================================================================

async fn run_inspect(config: InspectConfig) -> ExitCode {
    init_logging(config.remote.verbose);

    let locator: Locator = match config.locator.parse() {
        Ok(locator) => locator,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let needs_s3 = matches!(locator, Locator::S3 { .. });
    let fetcher = Arc::new(build_fetcher(&config.remote, needs_s3).await);

    let image = match ChunkedMultiscaleImage::open(fetcher, locator).await {
        Ok(image) => image,
        Err(e) => {
            error!("Failed to parse multiscale metadata: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Name:   {}", image.name());
    println!("Scales: {}", image.scale_count());
    match serde_json::to_string_pretty(image.metadata()) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to serialize metadata: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if config.materialize {
        match image.top_level_largest_image().await {
            Ok(top) => println!(
                "Coarsest scale: {:?} ({} pixels)",
                top.size,
                top.pixel_count()
            ),
            Err(e) => {
                error!("Failed to materialize coarsest scale: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Helpers
// =============================================================================

async fn build_fetcher(remote: &RemoteConfig, needs_s3: bool) -> DefaultFetcher {
    if !needs_s3 {
        return DefaultFetcher::without_s3();
    }
    if let Some(ref endpoint) = remote.s3_endpoint {
        info!("  S3 endpoint: {}", endpoint);
    }
    info!("  S3 region: {}", remote.s3_region);
    let client = create_s3_client(remote.s3_endpoint.as_deref(), &remote.s3_region).await;
    DefaultFetcher::new(reqwest::Client::new(), Some(client))
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "scene_ingest=debug"
    } else {
        "scene_ingest=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
