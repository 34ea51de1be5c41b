//! Darshan - guided scripture reader
//!
//! Walks chapter by chapter and verse by verse through a scripture, with
//! optional narrated autoplay through a text-to-speech service.

pub mod app;
pub mod audio;
pub mod autoplay;
pub mod config;
pub mod content;
pub mod database;
pub mod favorites;
pub mod narration;
pub mod navigation;
pub mod shell;

use anyhow::Context;
use app::App;
use content::ContentStore;
use favorites::{Favorites, MemoryPersistence, Persistence, SqlitePersistence};
use narration::{GeminiClient, NarrationProvider, SilentProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Set up console and file logging (local time for readability)
///
/// Console output goes to stderr; stdout belongs to the shell.
fn init_logging() {
    use tracing_subscriber::prelude::*;

    /// Format timestamps using the system's local time via chrono
    struct LocalTimer;
    impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
        fn format_time(
            &self,
            w: &mut tracing_subscriber::fmt::format::Writer<'_>,
        ) -> std::fmt::Result {
            write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
        }
    }

    let log_dir = config::get_data_dir().join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("darshan-debug.log"))
        .ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if let Some(file) = log_file {
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_timer(LocalTimer)
            .with_ansi(false);
        let console_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(LocalTimer);
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_timer(LocalTimer)
            .init();
    }
}

/// Favorites over SQLite, or in memory if the database cannot be opened
fn open_favorites(cfg: &config::Config) -> Favorites {
    let path = cfg
        .storage
        .database_path
        .clone()
        .unwrap_or_else(database::get_database_path);

    let store: Box<dyn Persistence> = match database::open(&path) {
        Ok(conn) => Box::new(SqlitePersistence::new(conn)),
        Err(e) => {
            tracing::error!(
                "Failed to open database at {}, favorites will not be saved: {}",
                path.display(),
                e
            );
            Box::new(MemoryPersistence::new())
        }
    };
    Favorites::load(store)
}

fn load_content(cfg: &config::Config) -> anyhow::Result<ContentStore> {
    match &cfg.content.path {
        Some(path) => ContentStore::load(path)
            .with_context(|| format!("Failed to load content from {}", path.display())),
        None => ContentStore::bundled().context("Bundled dataset is invalid"),
    }
}

/// Gemini when narration is enabled and a key is available, silence otherwise
fn create_provider(cfg: &config::Config) -> Arc<dyn NarrationProvider> {
    if !cfg.narration.enabled {
        tracing::info!("Narration disabled in config");
        return Arc::new(SilentProvider);
    }

    match GeminiClient::from_env(&cfg.narration) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::warn!("Narration unavailable, continuing silently: {}", e);
            Arc::new(SilentProvider)
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    init_logging();
    tracing::info!("Darshan starting");

    let cfg = config::load_or_default();
    let content = Arc::new(load_content(&cfg)?);
    tracing::info!("Content ready: {} chapters", content.chapter_count());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    let result = runtime.block_on(async {
        let (app, inbox) = App::new(
            content.clone(),
            create_provider(&cfg),
            audio::create_output(cfg.playback.output),
            open_favorites(&cfg),
            &cfg,
        );
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let snapshots = app.subscribe();

        let (_, shell_result) = tokio::join!(
            app.run(inbox, commands_rx),
            shell::run(content, commands_tx, snapshots)
        );
        shell_result
    });

    // stdin reads block a worker thread; don't wait for them
    runtime.shutdown_timeout(Duration::from_millis(100));
    tracing::info!("Darshan stopped");
    result
}
