use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use larder_api::mailer::{LogMailer, Mailer, SmtpMailer};
use larder_api::vision::VisionClient;
use larder_api::{AppState, AppStateInner};
use larder_db::Database;
use larder_gateway::Dispatcher;
use larder_server::config::Config;
use larder_server::{build_router, scheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "larder=debug,larder_server=debug,larder_api=debug,larder_gateway=debug,larder_db=debug,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;
    let db = Arc::new(Database::open(&config.db_path)?);
    info!("Database ready at {}", config.db_path.display());

    let vision = config.clarifai_pat.clone().map(VisionClient::new);
    if vision.is_none() {
        warn!("CLARIFAI_PAT is unset, image analysis is disabled");
    }

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            info!("Sending email through {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpMailer::new(smtp)?)
        }
        None => {
            warn!("LARDER_SMTP_HOST is unset, emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        dispatcher: Dispatcher::new(),
        jwt_secret: config.jwt_secret.clone(),
        cron_key: config.cron_key.clone(),
        mailer,
        vision,
    });

    tokio::spawn(scheduler::run_daily_expiry_scan(
        state.clone(),
        config.expiry_scan_hour,
    ));

    let app = build_router(state, config.cors_origin.as_deref())?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Larder server listening on {}", addr);
    info!("Daily expiry scan at {:02}:00 UTC", config.expiry_scan_hour);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
