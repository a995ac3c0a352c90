//! photosift-engine - Main entry point
//!
//! Interactive triage engine over a directory of photos. Reads one-letter
//! intents from stdin and drives the controller; state persists in the data
//! directory across runs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use photosift_common::events::EventBus;
use photosift_common::model::Decision;
use photosift_engine::config::ConfigOverrides;
use photosift_engine::source::DynMediaSource;
use photosift_engine::{
    CacheConfig, ContinuousPacer, EngineConfig, FsMediaSource, PredictiveCache, TriageController,
    TriageStore,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for photosift-engine
#[derive(Parser, Debug)]
#[command(name = "photosift-engine")]
#[command(about = "Triage engine for large photo collections")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding persisted triage state
    #[arg(short, long, env = "PHOTOSIFT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Root directory scanned for photos
    #[arg(short, long, env = "PHOTOSIFT_PHOTOS_ROOT")]
    photos_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photosift_engine=info,photosift_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = EngineConfig::load(ConfigOverrides {
        config_path: args.config,
        data_dir: args.data_dir,
        photos_root: args.photos_root,
    })
    .context("Failed to load configuration")?;

    let photos_root = config
        .photos_root
        .clone()
        .context("No photos root configured (use --photos-root, PHOTOSIFT_PHOTOS_ROOT, or the config file)")?;

    info!("Starting photosift engine");
    info!("Photos root: {}", photos_root.display());
    info!("Data directory: {}", config.data_dir.display());

    // Assemble the services
    let event_bus = Arc::new(EventBus::new(config.event_capacity));
    let source: DynMediaSource = Arc::new(FsMediaSource::new(photos_root));
    let store = Arc::new(TriageStore::new(
        config.data_dir.clone(),
        config.autosave_interval(),
        Arc::clone(&event_bus),
    ));
    let cache = Arc::new(PredictiveCache::new(
        Arc::clone(&source),
        CacheConfig {
            lookahead: config.lookahead,
            evict_distance: config.evict_distance,
            target_size: config.target_size,
        },
        Arc::clone(&event_bus),
    ));
    let controller = Arc::new(TriageController::new(
        Arc::clone(&store),
        Arc::clone(&cache),
        source,
        Arc::new(photosift_engine::source::NullLibraryOps),
        Arc::clone(&event_bus),
    ));
    let pacer = ContinuousPacer::new(
        Arc::clone(&controller),
        config.pacer_interval(),
        Arc::clone(&event_bus),
    );

    store.start_writer();
    cache.start_workers();

    let summary = controller
        .load_session()
        .await
        .context("Failed to load triage session")?;
    info!(
        "Ready: {} items, resuming at {} ({} already processed)",
        summary.item_count,
        summary.cursor,
        summary.counts.processed()
    );
    print_current(&controller).await;

    // Intent loop: one-letter commands per line, until EOF or a signal
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = shutdown_signal() => break,
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_intent(line.trim(), &controller, &pacer).await {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
        }
    }

    // Orderly shutdown: no timer may keep firing decisions afterwards
    pacer.stop().await;
    cache.shutdown().await;
    store.shutdown().await;
    info!("Engine shutdown complete");
    Ok(())
}

/// Apply one decoded intent; returns false to quit
async fn handle_intent(
    intent: &str,
    controller: &Arc<TriageController>,
    pacer: &ContinuousPacer,
) -> bool {
    match intent {
        "k" => {
            controller.decide(Decision::Keep).await;
            print_current(controller).await;
        }
        "d" => {
            controller.decide(Decision::Delete).await;
            print_current(controller).await;
        }
        "b" => {
            controller.go_back().await;
            print_current(controller).await;
        }
        "K" => pacer.start(Decision::Keep).await,
        "D" => pacer.start(Decision::Delete).await,
        "s" => {
            pacer.stop().await;
            print_current(controller).await;
        }
        "r" => {
            if let Err(e) = controller.reset().await {
                warn!("Reset failed: {}", e);
            }
            print_current(controller).await;
        }
        "t" => {
            let deleted = controller.deleted_items().await;
            if deleted.is_empty() {
                println!("No deleted items");
            }
            for item in deleted {
                println!("deleted: {}", item.id);
            }
        }
        "P" => match controller.purge_deleted().await {
            Ok(removed) => println!("Purged {} items", removed),
            Err(e) => warn!("Purge failed: {}", e),
        },
        "e" => match controller.export_snapshot().await {
            Ok(bytes) => println!("{}", String::from_utf8_lossy(&bytes)),
            Err(e) => warn!("Export failed: {}", e),
        },
        "c" => {
            let counts = controller.counts().await;
            println!(
                "{} kept / {} deleted / {} unprocessed, cursor {}",
                counts.kept,
                counts.deleted,
                counts.unprocessed,
                controller.cursor().await
            );
        }
        "q" => return false,
        "" => {}
        "h" | "?" => {
            println!("k keep | d delete | b back | K/D continuous | s stop");
            println!("t list deleted | u <id> restore | r reset | P purge deleted");
            println!("e export | i <path> import | c counts | q quit");
        }
        other => {
            // Import takes a file path: "i /path/to/snapshot.json"
            if let Some(path) = other.strip_prefix("i ") {
                match tokio::fs::read(path.trim()).await {
                    Ok(bytes) => match controller.import_snapshot(&bytes).await {
                        Ok(summary) => {
                            println!("Imported {} items, cursor {}", summary.item_count, summary.cursor)
                        }
                        Err(e) => warn!("Import rejected: {}", e),
                    },
                    Err(e) => warn!("Could not read '{}': {}", path, e),
                }
            } else if let Some(id) = other.strip_prefix("u ") {
                match controller.restore(id.trim()).await {
                    Ok(()) => print_current(controller).await,
                    Err(e) => warn!("Restore failed: {}", e),
                }
            } else {
                println!("Unknown intent '{}' (h for help)", other);
            }
        }
    }
    true
}

/// Print the item under the cursor, or the completion summary
async fn print_current(controller: &Arc<TriageController>) {
    match controller.current_item().await {
        Some(item) => {
            let ready = if controller.is_resident(&item.id) { "ready" } else { "loading" };
            println!(
                "[{}/{}] {} ({})",
                controller.cursor().await + 1,
                controller.len().await,
                item.id,
                ready
            );
        }
        None => {
            let counts = controller.counts().await;
            println!(
                "Triage complete: {} kept, {} deleted",
                counts.kept, counts.deleted
            );
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    /// Wire up the same service graph as main(), over temp directories
    fn intent_fixture(photos: &Path, data: &Path) -> (Arc<TriageController>, ContinuousPacer) {
        let event_bus = Arc::new(EventBus::new(64));
        let source: DynMediaSource = Arc::new(FsMediaSource::new(photos.to_path_buf()));
        let store = Arc::new(TriageStore::new(
            data.to_path_buf(),
            Duration::from_secs(60),
            Arc::clone(&event_bus),
        ));
        let cache = Arc::new(PredictiveCache::new(
            Arc::clone(&source),
            CacheConfig::default(),
            Arc::clone(&event_bus),
        ));
        let controller = Arc::new(TriageController::new(
            store,
            cache,
            source,
            Arc::new(photosift_engine::source::NullLibraryOps),
            Arc::clone(&event_bus),
        ));
        let pacer = ContinuousPacer::new(Arc::clone(&controller), Duration::from_millis(300), event_bus);
        (controller, pacer)
    }

    #[tokio::test]
    async fn restore_intent_returns_a_deleted_item_to_unprocessed() {
        let photos = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            std::fs::write(photos.path().join(name), b"x").unwrap();
        }
        let (controller, pacer) = intent_fixture(photos.path(), data.path());
        controller.load_session().await.unwrap();

        let first = controller.current_item().await.unwrap().id;
        assert!(handle_intent("d", &controller, &pacer).await);
        assert_eq!(controller.counts().await.deleted, 1);
        assert_eq!(controller.deleted_items().await.len(), 1);

        assert!(handle_intent("t", &controller, &pacer).await);
        assert!(handle_intent(&format!("u {}", first), &controller, &pacer).await);

        let counts = controller.counts().await;
        assert_eq!(counts.deleted, 0);
        assert_eq!(counts.unprocessed, 3);
        assert!(controller.deleted_items().await.is_empty());
    }

    #[tokio::test]
    async fn restore_intent_with_unknown_id_leaves_state_alone() {
        let photos = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        std::fs::write(photos.path().join("a.jpg"), b"x").unwrap();
        let (controller, pacer) = intent_fixture(photos.path(), data.path());
        controller.load_session().await.unwrap();

        assert!(handle_intent("u nope.jpg", &controller, &pacer).await);
        assert_eq!(controller.counts().await.unprocessed, 1);
        assert_eq!(controller.cursor().await, 0);
    }
}
