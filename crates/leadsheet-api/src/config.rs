//! Configuration management for the lead intake service.

use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use leadsheet_core::{SheetsConfig, DEFAULT_TABLE_NAME};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "leadsheet.toml";

/// Which backend leads are written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process table, lost on restart.
    Memory,
    /// Google Sheets spreadsheet.
    Sheets,
    /// PostgreSQL database.
    Postgres,
    /// Directory of CSV files, one per table.
    Csv,
}

/// Complete service configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`leadsheet.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// The target document is part of the configuration and is fixed for the
/// lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout", alias = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,
    /// Largest accepted request body in bytes.
    ///
    /// Environment variable: `MAX_BODY_BYTES`
    #[serde(default = "default_max_body_bytes", alias = "MAX_BODY_BYTES")]
    pub max_body_bytes: usize,

    // Intake
    /// Name of the table leads are appended to.
    ///
    /// Environment variable: `TABLE_NAME`
    #[serde(default = "default_table_name", alias = "TABLE_NAME")]
    pub table_name: String,
    /// Serialize intake requests inside this process.
    ///
    /// Off by default, which keeps the unguarded check-then-append behavior.
    ///
    /// Environment variable: `SERIALIZE_INTAKE`
    #[serde(default, alias = "SERIALIZE_INTAKE")]
    pub serialize_intake: bool,

    // Store
    /// Backend selection.
    ///
    /// Environment variable: `STORE_BACKEND`
    #[serde(default = "default_store_backend", alias = "STORE_BACKEND")]
    pub store_backend: StoreBackend,

    // Sheets
    /// Spreadsheet id for the sheets backend.
    ///
    /// Environment variable: `SPREADSHEET_ID`
    #[serde(default, alias = "SPREADSHEET_ID")]
    pub spreadsheet_id: String,
    /// Sheets API root.
    ///
    /// Environment variable: `SHEETS_API_BASE`
    #[serde(default = "default_sheets_api_base", alias = "SHEETS_API_BASE")]
    pub sheets_api_base: String,
    /// OAuth bearer token for the Sheets API.
    ///
    /// Environment variable: `SHEETS_ACCESS_TOKEN`
    #[serde(default, alias = "SHEETS_ACCESS_TOKEN", skip_serializing)]
    pub sheets_access_token: String,
    /// Sheets API request timeout in seconds.
    ///
    /// Environment variable: `SHEETS_TIMEOUT_SECONDS`
    #[serde(default = "default_sheets_timeout", alias = "SHEETS_TIMEOUT_SECONDS")]
    pub sheets_timeout_seconds: u64,

    // Database
    /// PostgreSQL connection URL for the postgres backend.
    ///
    /// Environment variable: `DATABASE_URL`
    #[serde(default = "default_database_url", alias = "DATABASE_URL")]
    pub database_url: String,
    /// Maximum number of database connections in the pool.
    ///
    /// Environment variable: `DATABASE_MAX_CONNECTIONS`
    #[serde(default = "default_max_connections", alias = "DATABASE_MAX_CONNECTIONS")]
    pub database_max_connections: u32,

    // CSV
    /// Directory holding table files for the csv backend.
    ///
    /// Environment variable: `CSV_DIRECTORY`
    #[serde(default = "default_csv_directory", alias = "CSV_DIRECTORY")]
    pub csv_directory: String,

    // Logging
    /// Log level configuration.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, config file, and environment variable
    /// overrides.
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(""));

        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Convert to the sheets backend configuration.
    pub fn to_sheets_config(&self) -> SheetsConfig {
        SheetsConfig {
            api_base: self.sheets_api_base.clone(),
            spreadsheet_id: self.spreadsheet_id.clone(),
            access_token: self.sheets_access_token.clone(),
            timeout: Duration::from_secs(self.sheets_timeout_seconds),
            ..SheetsConfig::default()
        }
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Parse server socket address from host and port configuration.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Get database URL with password masked for logging.
    pub fn database_url_masked(&self) -> String {
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let mut masked = self.database_url.clone();
                masked.replace_range(colon_pos + 1..at_pos, "***");
                return masked;
            }
        }
        self.database_url.clone()
    }

    /// Human-readable description of the bound document for startup logs.
    pub fn document_description(&self) -> String {
        match self.store_backend {
            StoreBackend::Memory => "in-memory document".to_string(),
            StoreBackend::Sheets => format!("spreadsheet {}", self.spreadsheet_id),
            StoreBackend::Postgres => format!("database {}", self.database_url_masked()),
            StoreBackend::Csv => format!("csv directory {}", self.csv_directory),
        }
    }

    /// Warning to log at startup when accepted leads will not survive a
    /// restart.
    pub fn durability_warning(&self) -> Option<&'static str> {
        match self.store_backend {
            StoreBackend::Memory => Some(
                "Memory store selected: leads are acknowledged but lost on restart; \
                 set STORE_BACKEND to sheets, postgres or csv to keep them",
            ),
            StoreBackend::Sheets | StoreBackend::Postgres | StoreBackend::Csv => None,
        }
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.request_timeout == 0 {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if self.max_body_bytes == 0 {
            anyhow::bail!("max_body_bytes must be greater than 0");
        }

        if self.table_name.trim().is_empty() {
            anyhow::bail!("table_name must not be empty");
        }

        match self.store_backend {
            StoreBackend::Memory => {},
            StoreBackend::Sheets => {
                if self.spreadsheet_id.trim().is_empty() {
                    anyhow::bail!("spreadsheet_id is required for the sheets backend");
                }
                if self.sheets_access_token.trim().is_empty() {
                    anyhow::bail!("sheets_access_token is required for the sheets backend");
                }
            },
            StoreBackend::Postgres => {
                if self.database_url.trim().is_empty() {
                    anyhow::bail!("database_url is required for the postgres backend");
                }
                if self.database_max_connections == 0 {
                    anyhow::bail!("database max_connections must be greater than 0");
                }
            },
            StoreBackend::Csv => {
                if self.csv_directory.trim().is_empty() {
                    anyhow::bail!("csv_directory is required for the csv backend");
                }
            },
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            table_name: default_table_name(),
            serialize_intake: false,
            store_backend: default_store_backend(),
            spreadsheet_id: String::new(),
            sheets_api_base: default_sheets_api_base(),
            sheets_access_token: String::new(),
            sheets_timeout_seconds: default_sheets_timeout(),
            database_url: default_database_url(),
            database_max_connections: default_max_connections(),
            csv_directory: default_csv_directory(),
            rust_log: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Memory
}

fn default_sheets_api_base() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_sheets_timeout() -> u64 {
    10
}

fn default_database_url() -> String {
    "postgresql://localhost/leadsheet".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_csv_directory() -> String {
    "data".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
