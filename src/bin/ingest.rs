//! Command-line driver: transcode one source file into an HLS rendition set.
//!
//! Usage: ingest <source> [dest_root]

use std::path::PathBuf;

use crooner::{
    FfmpegEncoder, Pipeline, PipelineConfig, PipelineError, ProfileCatalog, TranscodeRequest,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = PipelineConfig::from_env();

    let mut args = std::env::args().skip(1);
    let source = match args.next() {
        Some(arg) => PathBuf::from(arg),
        None => {
            eprintln!("usage: ingest <source> [dest_root]");
            std::process::exit(2);
        }
    };
    let dest_root = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| config.output_root.clone());

    let catalog = match &config.profile_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path).expect("failed to read PROFILE_FILE");
            ProfileCatalog::from_json(&raw).expect("invalid profile catalog")
        }
        None => ProfileCatalog::standard(),
    };

    let pipeline = Pipeline::new(
        FfmpegEncoder::new(config.ffmpeg_bin.clone()),
        config.max_concurrent_encodes,
    );

    let handle = match pipeline
        .start(TranscodeRequest {
            source,
            dest_root,
            catalog,
            owns_source: false,
        })
        .await
    {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("rejected: {err}");
            std::process::exit(1);
        }
    };

    println!("run {} started", handle.run_id());
    match handle.wait().await {
        Ok(outcome) => {
            println!("stream ready: {}", outcome.manifest_path.display());
        }
        Err(err @ PipelineError::Canceled { .. }) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("run failed during {}: {err}", err.phase());
            std::process::exit(1);
        }
    }
}
