//! Image Preloader - deduplicating image preload cache and server.
//!
//! This binary runs the HTTP server, warms images from the command line,
//! and prints progressive image URLs.

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_preloader::{
    config::{parse_url_list, Cli, Command, ServeConfig, SourceConfig, UrlConfig, WarmConfig},
    create_router, create_s3_client, ConfiguredSource, HttpImageSource, ImageSource, PreloadCache,
    PreloadRequest, ProgressiveImageProps, RouterConfig, S3ImageSource,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Warm(config) => run_warm(config).await,
        Command::Url(config) => run_url(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let source = match build_source(&config.source).await {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to create image source: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Image Preloader v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Source: {}", source.describe());
    info!(
        "  Batch: {} concurrent, {}ms timeout",
        config.batch.concurrency, config.batch.timeout_ms
    );
    info!("  Cache max-age: {}s", config.cache_max_age);
    if config.cors_origins.is_none() {
        warn!("  CORS: any origin allowed");
    }

    let cache = PreloadCache::new(source);
    let router = create_router(cache, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/stats", addr);
    info!(
        "    curl -X POST http://{}/preload -H 'content-type: application/json' -d '{{\"url\":\"/hero.jpg\"}}'",
        addr
    );
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "image_preloader=debug,tower_http=debug"
    } else {
        "image_preloader=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_batch_options(config.batch.options())
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

/// Create the image source selected on the command line.
async fn build_source(config: &SourceConfig) -> Result<ConfiguredSource, String> {
    if let Some(bucket) = config.bucket() {
        let client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
        let source = S3ImageSource::new(client, bucket, config.s3_prefix.clone());
        return Ok(ConfiguredSource::S3(source));
    }

    let source = HttpImageSource::new(config.base_url.as_deref(), config.fetch_timeout())
        .map_err(|e| e.to_string())?;
    Ok(ConfiguredSource::Http(source))
}

// =============================================================================
// Warm Command
// =============================================================================

#[derive(Serialize)]
struct WarmItem<'a> {
    url: &'a str,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn run_warm(config: WarmConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let mut urls = config.urls.clone();
    if let Some(ref path) = config.file {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => urls.extend(parse_url_list(&contents)),
            Err(e) => {
                eprintln!("Error: failed to read {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    let source = match build_source(&config.source).await {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cache = PreloadCache::new(source);
    let requests = urls.iter().map(|u| PreloadRequest::new(u.as_str())).collect();
    let outcomes = cache.preload_images(requests, &config.batch.options()).await;

    let mut failed = 0;
    for outcome in &outcomes {
        if !outcome.success {
            failed += 1;
        }
        let item = WarmItem {
            url: &outcome.url,
            success: outcome.success,
            bytes: outcome.result.as_ref().map(|image| image.len()),
            error: outcome.error.as_ref().map(|e| e.to_string()),
        };
        match serde_json::to_string(&item) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("Error: failed to serialize result: {}", e),
        }
    }

    let stats = cache.cache_stats().await;
    match serde_json::to_string(&serde_json::json!({ "stats": stats })) {
        Ok(line) => println!("{}", line),
        Err(e) => eprintln!("Error: failed to serialize stats: {}", e),
    }

    if failed > 0 {
        eprintln!("{} of {} image(s) failed to preload", failed, outcomes.len());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// =============================================================================
// Url Command
// =============================================================================

fn run_url(config: UrlConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let mut props = ProgressiveImageProps::new(&config.src, "", config.width, config.height)
        .quality(config.quality)
        .low_quality(config.low_quality);
    if let Some(ref sizes) = config.sizes {
        props = props.sizes(sizes.clone());
    }

    println!("url:          {}", props.high_quality_url());
    println!("low quality:  {}", props.low_quality_url());
    println!("sizes:        {}", props.sizes_hint());
    println!("srcset:       {}", props.srcset());
    if let Some(placeholder) = props.placeholder_url() {
        println!("placeholder:  {}", placeholder);
    }

    ExitCode::SUCCESS
}
