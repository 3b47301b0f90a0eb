use crate::cli::ServeArgs;
use crate::infra::{build_service, AppState, SharedService};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use yedid_tor::config::{AppConfig, AppEnvironment};
use yedid_tor::error::AppError;
use yedid_tor::telemetry;

pub(crate) fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let addr = config.server.socket_addr()?;
    // Built before the runtime; this handle outlives it so a blocking HTTP
    // client is never dropped on a runtime thread.
    let service = build_service(&config)?;
    let reports = service.refresh_all();
    for report in reports.iter().filter(|report| !report.warnings.is_empty()) {
        warn!(
            facility = %report.facility,
            warnings = ?report.warnings,
            "facility loaded with warnings"
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(serve(config.environment, addr, service.clone()));
    drop(runtime);
    drop(service);
    result
}

async fn serve(
    environment: AppEnvironment,
    addr: SocketAddr,
    service: SharedService,
) -> Result<(), AppError> {
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = with_service_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?environment, %addr, "waitlist service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
