mod console;

use anyhow::Result;
use console::Console;
use pmocache::MediaCacheConfigExt;
use pmoconfig::Config;
use pmosession::SessionConfigExt;
use pmosource::SourceConfigExt;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installe le subscriber : `RUST_LOG` en priorité, sinon `host.logger.min_level`
fn init_logging(config: &Config) {
    let level = config
        .get_log_min_level()
        .unwrap_or_else(|_| "INFO".to_string());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()));

    let enable_console = config.get_log_enable_console().unwrap_or(true);
    let subscriber = tracing_subscriber::registry().with(filter);

    if enable_console {
        // Sur stderr : stdout appartient au pilote console
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ========== PHASE 1 : Configuration et logs ==========
    let config_dir = std::env::args().nth(1).unwrap_or_default();
    let config = Arc::new(Config::load_config(&config_dir)?);
    init_logging(&config);
    info!("Configuration loaded from {}", config.path());

    // ========== PHASE 2 : Cache, backends et sessions ==========
    let cache = config.create_media_cache()?;
    info!(
        "Media cache ready in {} ({} / {} tracks)",
        cache.cache_dir().display(),
        cache.len().await,
        cache.capacity()
    );

    let registry = Arc::new(config.create_source_registry()?);
    info!("Sources: {:?}", registry.kinds());

    let manager = config.create_session_manager(cache, registry)?;
    let restored = manager.restore_sessions().await?;
    info!("{} group session(s) restored", restored.len());

    // ========== PHASE 3 : Pilote console ==========
    Console::new(manager.clone()).run().await?;

    manager.save_all().await?;
    info!("PMOBot stopped");
    Ok(())
}
