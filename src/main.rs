use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use innkeep::config::Config;
use innkeep::mail::{LogTransport, MailTemplates, Mailer};
use innkeep::session::SessionStore;
use innkeep::store::Store;
use innkeep::web::state::AppState;
use innkeep::{auth, observability, reaper, web};

const SEED_ROOMS: &[&str] = &["General's Quarters", "Major's Suite"];
const SESSION_SWEEP_EVERY: Duration = Duration::from_secs(300);

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {e}");
                ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
    info!("shutdown signal received, draining requests");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::from_env());
    observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(Store::open(config.wal_path(), config.store_timeout)?);
    let seeded = store.seed_rooms_if_empty(SEED_ROOMS).await?;
    if seeded > 0 {
        info!("seeded {seeded} rooms");
    }
    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        auth::seed_administrator(&store, email, password).await?;
    }

    let sessions = Arc::new(SessionStore::new(config.session_lifetime));
    let transport = Arc::new(LogTransport {
        smtp_host: config.smtp_host.clone(),
        smtp_port: config.smtp_port,
    });
    let mailer = Mailer::spawn(
        MailTemplates::new(&config.templates_dir, config.template_cache),
        transport,
    );

    tokio::spawn(reaper::run_session_reaper(sessions.clone(), SESSION_SWEEP_EVERY));
    tokio::spawn(reaper::run_compactor(store.clone(), config.compact_threshold));

    let state = AppState::new(store.clone(), sessions, mailer, config.clone());
    let app = web::build_router(state);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("innkeep listening on http://{addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  rooms: {}", store.room_count());
    info!("  max_connections: {}", config.max_connections);
    info!("  production: {}", config.production);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("innkeep stopped");
    Ok(())
}
