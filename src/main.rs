//! Social Cache demo host
//!
//! Wires the coordinator to an in-memory backend, plays through a short
//! session (login, follow, feed reads, background/foreground) and prints
//! the resulting health report. Keeps the maintenance task running until
//! Ctrl+C or SIGTERM.

use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use social_cache::models::{FeedType, Profile};
use social_cache::services::{ConnectivityMonitor, InMemoryBackend};
use social_cache::{
    spawn_maintenance_task, AppEvent, CacheConfig, CacheCoordinator, RefreshStrategy, Services,
    SocialInteraction,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "social_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting social cache demo");

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: max_entries={}, max_cost={}, maintenance_interval={:?}",
        config.max_entries, config.max_cost, config.maintenance_interval
    );

    let backend = Arc::new(seed_backend());
    let monitor = ConnectivityMonitor::new();
    let coordinator = CacheCoordinator::new(
        config.clone(),
        Services::from_backend(backend.clone()),
        monitor.handle(),
    );

    let maintenance_handle =
        spawn_maintenance_task(coordinator.clone(), config.maintenance_interval);
    info!("Background maintenance task started");

    run_session(&coordinator, &backend, &monitor).await?;

    let report = coordinator.health_report();
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!("Demo session finished; press Ctrl+C to exit");
    shutdown_signal(maintenance_handle).await;
    info!("Shutdown complete");
    Ok(())
}

fn seed_backend() -> InMemoryBackend {
    let backend = InMemoryBackend::new(5);
    for (id, name) in [("u1", "ana"), ("u2", "ben"), ("u3", "cleo")] {
        let mut profile = Profile::new(id, name);
        profile.display_name = name.to_uppercase();
        backend.add_profile(profile);
    }
    backend.follow("u1", "u3");
    for i in 1..=8 {
        backend.add_post("u2", &format!("Interval session #{}", i));
    }
    backend.add_post("u3", "Long ride along the coast");
    backend.sign_in("u1");
    backend
}

async fn run_session(
    coordinator: &CacheCoordinator,
    backend: &InMemoryBackend,
    monitor: &ConnectivityMonitor,
) -> anyhow::Result<()> {
    coordinator.handle_app_event(AppEvent::DidLogin("u1".into())).await;
    coordinator.refresh_all().await?;

    backend.follow("u1", "u2");
    coordinator.handle_interaction(SocialInteraction::Follow {
        actor_id: "u1".into(),
        target_id: "u2".into(),
    });

    let feed = coordinator
        .load_feed(FeedType::Activity, "u1", 0, RefreshStrategy::Immediate, false)
        .await?;
    info!(
        "Activity feed page 0: {} entries ({:?})",
        feed.entries.map_or(0, |e| e.len()),
        feed.status
    );

    let followers = coordinator.load_follower_count("u2", false).await?;
    info!("ben now has {:?} followers", followers);

    let results = coordinator.search_users("cle", false).await?;
    info!("Search for 'cle' found {}", results.map_or(0, |r| r.len()));

    monitor.set_connected(false);
    let offline = coordinator
        .load_feed(FeedType::Activity, "u1", 0, RefreshStrategy::NetworkFirst, false)
        .await?;
    info!("Offline read served as {:?}", offline.status);
    monitor.set_connected(true);

    coordinator.handle_app_event(AppEvent::DidEnterBackground).await;
    coordinator.handle_app_event(AppEvent::DidBecomeActive).await;

    let report = coordinator.run_maintenance();
    info!("Maintenance pass: {:?}", report);
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the maintenance task.
async fn shutdown_signal(maintenance_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    maintenance_handle.abort();
    warn!("Maintenance task aborted");
}
