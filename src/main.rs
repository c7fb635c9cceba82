use anyhow::Context;
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod common;
mod config;
mod infrastructure;
mod modules;
mod state;
mod workers;

use config::settings::{LogFormat, WorkerConfig};
use state::WorkerState;
use workers::transcoder::start_transcoder_worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = WorkerConfig::new().context("Failed to load configuration")?;
    init_tracing(&config.log_format);

    info!("Starting media worker...");

    tokio::fs::create_dir_all(&config.scratch_dir)
        .await
        .with_context(|| format!("Failed to create scratch dir {}", config.scratch_dir.display()))?;

    let state = WorkerState::new(config).context("Invalid REDIS_URL")?;

    match state.transcoder.locate() {
        Some(path) => info!("Using encoder at {}", path.display()),
        None => warn!(
            "Encoder '{}' not found on PATH; every job will fail until it is installed",
            state.config.ffmpeg_path
        ),
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_stop_signal().await;
        info!("Stop requested; finishing the current job before exiting");
        signal_token.cancel();
    });

    let mut queue = state.queue();
    let pipeline = state.pipeline();
    info!(
        queue = queue.queue_name(),
        input_bucket = %state.config.input_bucket,
        output_bucket = %state.config.output_bucket,
        "Media worker ready"
    );

    start_transcoder_worker(&mut queue, &pipeline, state.config.retry_delay(), shutdown).await;

    drop(pipeline);
    drop(state);
    info!("Media worker stopped");
    Ok(())
}

fn init_tracing(format: &LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("media_worker=info"));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(env_filter)
            .init(),
    }
}

async fn wait_for_stop_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
