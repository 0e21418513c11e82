use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryApplicationRepository, InMemoryDocumentStore, LoggingNotifier,
};
use crate::routes::with_application_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use civic_registry::config::AppConfig;
use civic_registry::error::AppError;
use civic_registry::telemetry;
use civic_registry::workflows::certificates::{CertificatePortal, StaticTokenRegistry};
use std::sync::atomic::Ordering;
use std::sync::Arc;
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

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let identity = StaticTokenRegistry::from_config(&config.identity);
    if identity.is_empty() {
        warn!("no officer tokens configured; officer routes will refuse every request");
    }

    let portal = Arc::new(CertificatePortal::new(
        Arc::new(InMemoryApplicationRepository::default()),
        Arc::new(LoggingNotifier::default()),
        Arc::new(InMemoryDocumentStore::default()),
        Arc::new(identity),
    ));

    let app = with_application_routes(portal)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "civic registry portal ready");

    axum::serve(listener, app).await?;
    Ok(())
}
