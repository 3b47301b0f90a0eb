use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;
use yedid_tor::config::{AppConfig, BackendKind, ConfigError, WaitlistConfig};
use yedid_tor::error::AppError;
use yedid_tor::waitlist::{
    HttpSheetFetcher, MemoryStore, PublishedSheetStore, RemoteTableStore, RestTableClient,
    SpreadsheetStore, WaitlistBackend, WaitlistService,
};

pub(crate) type SharedService = Arc<WaitlistService<dyn WaitlistBackend>>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Builds the configured backend. The HTTP clients block, so this must run
/// before any async runtime is started.
pub(crate) fn build_backend(
    config: &WaitlistConfig,
) -> Result<Arc<dyn WaitlistBackend>, AppError> {
    let backend: Arc<dyn WaitlistBackend> = match config.backend {
        BackendKind::Memory => Arc::new(MemoryStore::new()),
        BackendKind::Spreadsheet => Arc::new(SpreadsheetStore::new(
            config.workbook_dir.clone(),
            config.translator(),
        )),
        BackendKind::Remote => {
            let remote = config
                .remote
                .as_ref()
                .ok_or(ConfigError::MissingRemote("REMOTE_TABLE_URL"))?;
            let client = RestTableClient::new(&remote.url, &remote.api_key, remote.timeout)?;
            Arc::new(RemoteTableStore::new(Arc::new(client)))
        }
        BackendKind::PublishedSheet => {
            let published = config
                .published
                .as_ref()
                .ok_or(ConfigError::MissingPublished("WAITLIST_SHEET_ID"))?;
            let fetcher = HttpSheetFetcher::new(&published.base_url, published.timeout)?;
            Arc::new(PublishedSheetStore::new(
                Arc::new(fetcher),
                vec![published.sheet.clone()],
                config.translator(),
            ))
        }
    };

    info!(backend = backend.name(), "waitlist backend ready");
    Ok(backend)
}

pub(crate) fn build_service(config: &AppConfig) -> Result<SharedService, AppError> {
    let taxonomy = config.waitlist.taxonomy()?;
    let backend = build_backend(&config.waitlist)?;
    Ok(Arc::new(WaitlistService::new(backend, taxonomy)))
}
