use crate::cli::ServeArgs;
use crate::infra::{AppState, Runtime};
use crate::routes::with_enquiry_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use fund_leads::config::AppConfig;
use fund_leads::error::AppError;
use fund_leads::telemetry;
use fund_leads::workflows::notifications::NotificationWorker;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const RATE_LIMIT_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let runtime = Runtime::build(&config, args.fixtures.as_deref())?;
    let (queue, worker) =
        NotificationWorker::spawn(runtime.dispatcher.clone(), config.leads.queue_capacity);
    let enquiry_service = Arc::new(runtime.enquiry_service(&config.leads, queue)?);

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        jobs: Arc::new(runtime.jobs(&config.leads)),
    };

    let purge_service = enquiry_service.clone();
    let purge_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = purge_service.purge_rate_limits();
            if purged > 0 {
                tracing::debug!(purged, "expired rate limit windows purged");
            }
        }
    });

    let app = with_enquiry_routes(enquiry_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "fund leads service ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    readiness_flag.store(false, Ordering::Release);
    purge_task.abort();
    let _ = purge_task.await;
    let stats = worker.shutdown().await;
    info!(
        jobs = stats.jobs,
        sent = stats.sent,
        failed = stats.failed,
        "fund leads service stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
