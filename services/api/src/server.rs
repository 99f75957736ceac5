use crate::cli::ServeArgs;
use crate::infra::{
    seed_demo_data, AppState, InMemoryCampaignStore, InMemoryContactStore, LoggingSender,
};
use crate::routes::with_crm_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use crm_engine::config::AppConfig;
use crm_engine::error::AppError;
use crm_engine::telemetry;
use crm_engine::workflows::campaigns::{run_poller, CampaignScheduler};
use crm_engine::workflows::scoring::LeadScoringService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;
    let policy = config.scoring.load_policy()?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let contacts = InMemoryContactStore::default();
    let campaigns = InMemoryCampaignStore::default();
    if args.seed_demo {
        seed_demo_data(&contacts, &campaigns, Utc::now())?;
        info!("demo tenant seeded");
    }

    let scoring = Arc::new(LeadScoringService::new(Arc::new(contacts), policy));
    let scheduler = Arc::new(CampaignScheduler::new(
        Arc::new(campaigns),
        Arc::new(LoggingSender),
        config.scheduler.dispatch_policy(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = tokio::spawn(run_poller(
        scheduler.clone(),
        config.scheduler.poll_interval,
        shutdown_rx,
    ));

    let app = with_crm_routes(scoring, scheduler)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "crm engine ready");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    readiness_flag.store(false, Ordering::Release);
    let _ = shutdown_tx.send(true);
    if let Err(err) = poller.await {
        warn!(error = %err, "campaign poller did not shut down cleanly");
    }

    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
