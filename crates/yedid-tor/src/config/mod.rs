use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::waitlist::backend::published::DEFAULT_EXPORT_BASE_URL;
use crate::waitlist::backend::PublishedSheet;
use crate::waitlist::taxonomy::{Taxonomy, TaxonomyError};
use crate::waitlist::translator::{FieldTranslator, SchemaProfile};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub waitlist: WaitlistConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            waitlist: WaitlistConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Which persistence adapter backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Spreadsheet,
    Remote,
    PublishedSheet,
}

impl BackendKind {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "spreadsheet" | "workbook" | "xlsx" => Ok(Self::Spreadsheet),
            "remote" | "table" => Ok(Self::Remote),
            "published" | "published-sheet" | "google-sheet" => Ok(Self::PublishedSheet),
            _ => Err(ConfigError::InvalidBackend(value.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub url: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// Read-only published spreadsheet for one facility.
#[derive(Debug, Clone)]
pub struct PublishedSheetConfig {
    pub sheet: PublishedSheet,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct WaitlistConfig {
    pub backend: BackendKind,
    pub schema: SchemaProfile,
    pub workbook_dir: PathBuf,
    pub taxonomy_path: Option<PathBuf>,
    pub name_aliases: Vec<String>,
    pub remote: Option<RemoteConfig>,
    pub published: Option<PublishedSheetConfig>,
}

impl WaitlistConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let backend = BackendKind::parse(
            &env::var("WAITLIST_BACKEND").unwrap_or_else(|_| "memory".to_string()),
        )?;

        let schema_raw = env::var("WAITLIST_SCHEMA").unwrap_or_else(|_| "hebrew".to_string());
        let schema = schema_raw
            .parse::<SchemaProfile>()
            .map_err(|_| ConfigError::InvalidSchema(schema_raw.clone()))?;

        let workbook_dir =
            PathBuf::from(env::var("WAITLIST_WORKBOOK_DIR").unwrap_or_else(|_| "data".to_string()));
        let taxonomy_path = non_empty_var("WAITLIST_TAXONOMY_PATH").map(PathBuf::from);
        let name_aliases = non_empty_var("WAITLIST_NAME_ALIASES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|alias| !alias.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let timeout_secs = env::var("REMOTE_TABLE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::InvalidTimeout)?;

        let remote = match (
            non_empty_var("REMOTE_TABLE_URL"),
            non_empty_var("REMOTE_TABLE_API_KEY"),
        ) {
            (Some(url), Some(api_key)) => Some(RemoteConfig {
                url,
                api_key,
                timeout: Duration::from_secs(timeout_secs),
            }),
            (None, _) if backend == BackendKind::Remote => {
                return Err(ConfigError::MissingRemote("REMOTE_TABLE_URL"))
            }
            (_, None) if backend == BackendKind::Remote => {
                return Err(ConfigError::MissingRemote("REMOTE_TABLE_API_KEY"))
            }
            _ => None,
        };

        let published = published_sheet(backend, Duration::from_secs(timeout_secs))?;

        Ok(Self {
            backend,
            schema,
            workbook_dir,
            taxonomy_path,
            name_aliases,
            remote,
            published,
        })
    }

    /// Taxonomy from the configured file, or the built-in default.
    pub fn taxonomy(&self) -> Result<Taxonomy, TaxonomyError> {
        match &self.taxonomy_path {
            Some(path) => Taxonomy::from_path(path),
            None => Ok(Taxonomy::standard()),
        }
    }

    pub fn translator(&self) -> FieldTranslator {
        FieldTranslator::new(self.schema).with_name_aliases(&self.name_aliases)
    }
}

fn published_sheet(
    backend: BackendKind,
    timeout: Duration,
) -> Result<Option<PublishedSheetConfig>, ConfigError> {
    let keys = ["WAITLIST_SHEET_FACILITY", "WAITLIST_SHEET_ID", "WAITLIST_SHEET_GIDS"];
    let [facility, sheet_id, gids] = keys.map(non_empty_var);
    let (facility, sheet_id, gids) = match (facility, sheet_id, gids) {
        (Some(facility), Some(sheet_id), Some(gids)) => (facility, sheet_id, gids),
        (facility, sheet_id, _) if backend == BackendKind::PublishedSheet => {
            let missing = match (facility, sheet_id) {
                (None, _) => keys[0],
                (_, None) => keys[1],
                _ => keys[2],
            };
            return Err(ConfigError::MissingPublished(missing));
        }
        _ => return Ok(None),
    };

    let branch_gids = PublishedSheet::parse_gids(&gids).map_err(ConfigError::InvalidSheetGids)?;
    Ok(Some(PublishedSheetConfig {
        sheet: PublishedSheet {
            facility,
            sheet_id,
            branch_gids,
        },
        base_url: non_empty_var("WAITLIST_SHEET_BASE_URL")
            .unwrap_or_else(|| DEFAULT_EXPORT_BASE_URL.to_string()),
        timeout,
    }))
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidBackend(String),
    InvalidSchema(String),
    InvalidTimeout,
    MissingRemote(&'static str),
    MissingPublished(&'static str),
    InvalidSheetGids(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBackend(value) => write!(
                f,
                "WAITLIST_BACKEND must be memory, spreadsheet, remote or published (got '{value}')"
            ),
            ConfigError::InvalidSchema(value) => write!(
                f,
                "WAITLIST_SCHEMA must be english, hebrew or remote (got '{value}')"
            ),
            ConfigError::InvalidTimeout => {
                write!(f, "REMOTE_TABLE_TIMEOUT_SECS must be a positive integer")
            }
            ConfigError::MissingRemote(key) => {
                write!(f, "{key} is required when WAITLIST_BACKEND=remote")
            }
            ConfigError::MissingPublished(key) => {
                write!(f, "{key} is required when WAITLIST_BACKEND=published")
            }
            ConfigError::InvalidSheetGids(entry) => write!(
                f,
                "WAITLIST_SHEET_GIDS entries must look like Branch=gid (got '{entry}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
