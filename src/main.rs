use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use mailpress::config::{Config, load_env_file};
use mailpress::pipeline::Pipeline;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Seed the environment before anything reads it, RUST_LOG included
    let env_file = std::env::var("MAILPRESS_ENV_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".env"));
    let env_loaded = load_env_file(&env_file);

    let _log_guard = init_tracing();

    match env_loaded {
        Ok(true) => tracing::debug!(path = %env_file.display(), "Loaded env file"),
        Ok(false) => {}
        Err(e) => {
            tracing::error!("{e}");
            return Err(e.into());
        }
    }

    let config = Config::from_env().inspect_err(|e| tracing::error!("{e}"))?;

    tracing::info!(
        "mailpress v{}: {} -> {}@{}",
        env!("CARGO_PKG_VERSION"),
        config.mail.host,
        config.ssh.username,
        config.ssh.hostname
    );

    let summary = Pipeline::from_config(&config)
        .run()
        .await
        .inspect_err(|e| tracing::error!("Publishing run failed: {e}"))?;

    tracing::info!(
        posts = summary.posts_written.len(),
        uploaded = summary.files_uploaded,
        "Publishing run complete"
    );

    Ok(())
}

/// Stderr logging filtered by `RUST_LOG`, plus a daily log file when
/// `MAILPRESS_LOG_DIR` is set. Keep the returned guard alive until exit.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let (file_layer, guard) = match std::env::var("MAILPRESS_LOG_DIR") {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "mailpress.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .init();

    guard
}
