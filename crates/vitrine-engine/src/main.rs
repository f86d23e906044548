//! Vitrine engine binary.

use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use vitrine_core::Catalog;
use vitrine_engine::metrics::init_metrics;
use vitrine_engine::settings::{EngineSettings, LoggingSettings, StoreKind};
use vitrine_engine::{ContentEngine, RunState, ValidationScheduler};
use vitrine_sources::{PlaceholderContentCheck, StaticGenerator, ValidationPipeline};
use vitrine_store::{DurableStore, FileStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = EngineSettings::load().context("failed to load settings")?;
    init_tracing(&settings.logging);

    info!("Starting Vitrine engine v{}", env!("CARGO_PKG_VERSION"));

    let catalog = Arc::new(load_catalog(&settings));

    let (store, file_store): (Arc<dyn DurableStore>, Option<Arc<FileStore>>) =
        match settings.store.kind {
            StoreKind::Memory => (Arc::new(MemoryStore::new()) as Arc<dyn DurableStore>, None),
            StoreKind::File => {
                let file = Arc::new(
                    FileStore::open(&settings.store.path)
                        .await
                        .with_context(|| {
                            format!("failed to open store at {}", settings.store.path.display())
                        })?,
                );
                (file.clone() as Arc<dyn DurableStore>, Some(file))
            },
        };

    if let Err(e) = store.health_check().await {
        warn!(store = %store.name(), error = %e, "Durable store health check failed, serving degraded");
    }

    if let Some(listen) = settings.metrics.listen {
        init_metrics(listen)?;
    }

    let generator = Arc::new(StaticGenerator::new(json!({
        "status": "pending",
        "message": "Content for this section is being prepared",
    })));

    let mut pipeline = ValidationPipeline::standard(Arc::clone(&store));
    if settings.catalog.placeholder_check {
        pipeline = pipeline.with_check(Arc::new(PlaceholderContentCheck::new()));
    }

    let engine = Arc::new(
        ContentEngine::builder(catalog, store, generator)
            .pipeline(pipeline)
            .settings(&settings)
            .build(),
    );

    engine.rebuild_dependencies().await;

    let report = engine.warmup_startup_cache().await;
    info!(
        attempted = report.attempted,
        stored = report.stored,
        failed = report.failures.len(),
        "Startup cache warmed"
    );

    let handle =
        ValidationScheduler::with_defaults(Arc::clone(&engine), Arc::new(RunState::new())).start();

    shutdown_signal().await;
    handle.shutdown().await;

    if let Some(file) = file_store {
        file.flush()
            .await
            .context("failed to write final store snapshot")?;
    }

    info!("Vitrine engine stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// A missing or broken catalog leaves every page in tier 3 with no
/// dependencies.
fn load_catalog(settings: &EngineSettings) -> Catalog {
    let Some(path) = settings.catalog.path.as_ref() else {
        warn!("No catalog configured, all pages default to tier 3");
        return Catalog::default();
    };

    match Catalog::from_path(path) {
        Ok(catalog) => {
            info!(path = %path.display(), pages = catalog.pages().count(), "Catalog loaded");
            catalog
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Catalog could not be loaded, all pages default to tier 3");
            Catalog::default()
        },
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
