//! Gateway Configuration
//!
//! One immutable [`GatewayConfig`] is assembled from the environment at
//! startup and handed to components by explicit parameter; there is no
//! global mutable configuration. All variables use the `PGCRUD_` prefix
//! with sensible defaults for local development.

use crate::error::ConfigError;

// ============================================================================
// CORS
// ============================================================================

/// CORS origin policy: boolean toggle or explicit origin list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    /// Allow any origin (default)
    Any,
    /// CORS disabled entirely
    Disabled,
    /// Allow only the listed origins
    List(Vec<String>),
}

impl CorsOrigins {
    /// Parse the `PGCRUD_CORS_ORIGINS` value: `*`/`true` allow all,
    /// `false` disables, anything else is a comma-separated origin list.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "*" | "true" => CorsOrigins::Any,
            "false" => CorsOrigins::Disabled,
            list => CorsOrigins::List(
                list.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect(),
            ),
        }
    }
}

// ============================================================================
// GATEWAY CONFIGURATION
// ============================================================================

/// Complete gateway configuration record.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Writable database URL (primary pool, also used for introspection)
    pub database_url: String,

    /// Optional read-only replica URL; list/read queries prefer it
    pub read_database_url: Option<String>,

    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Namespaces to include (empty = all user namespaces)
    pub include_schemas: Vec<String>,

    /// Namespaces to exclude
    pub exclude_schemas: Vec<String>,

    /// Tables to exclude, as full `namespace.table` identifiers
    pub exclude_tables: Vec<String>,

    /// Page size applied when the caller supplies none
    pub default_page_size: i64,

    /// Hard cap on `pageSize`
    pub max_page_size: i64,

    /// Hard cap on bulk-insert row count
    pub max_bulk_rows: usize,

    /// Request body size cap in bytes
    pub max_body_bytes: usize,

    /// Whether the documentation shell is served
    pub docs_enabled: bool,

    /// Master secret for credential derivation
    pub master_secret: Option<String>,

    /// Whether credentials are required
    pub auth_enabled: bool,

    /// CORS policy
    pub cors_origins: CorsOrigins,

    /// Whether native DB error detail/constraint are exposed in responses
    pub expose_db_errors: bool,

    /// Per-pool connection cap
    pub pool_size: usize,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("database_url", &"[REDACTED]")
            .field("read_database_url", &self.read_database_url.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("include_schemas", &self.include_schemas)
            .field("exclude_schemas", &self.exclude_schemas)
            .field("exclude_tables", &self.exclude_tables)
            .field("default_page_size", &self.default_page_size)
            .field("max_page_size", &self.max_page_size)
            .field("max_bulk_rows", &self.max_bulk_rows)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("docs_enabled", &self.docs_enabled)
            .field("master_secret", &self.master_secret.as_ref().map(|_| "[REDACTED]"))
            .field("auth_enabled", &self.auth_enabled)
            .field("cors_origins", &self.cors_origins)
            .field("expose_db_errors", &self.expose_db_errors)
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://postgres@localhost:5432/postgres".to_string(),
            read_database_url: None,
            host: "0.0.0.0".to_string(),
            port: 3000,
            include_schemas: Vec::new(),
            exclude_schemas: Vec::new(),
            exclude_tables: Vec::new(),
            default_page_size: 25,
            max_page_size: 200,
            max_bulk_rows: 1000,
            max_body_bytes: 1024 * 1024,
            docs_enabled: true,
            master_secret: None,
            auth_enabled: false,
            cors_origins: CorsOrigins::Any,
            expose_db_errors: false,
            pool_size: 16,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `PGCRUD_DATABASE_URL` (fallback `DATABASE_URL`): primary database URL (required)
    /// - `PGCRUD_READ_DATABASE_URL`: optional read replica URL
    /// - `PGCRUD_HOST`: bind host (default: 0.0.0.0)
    /// - `PGCRUD_PORT` (fallback `PORT`): bind port (default: 3000)
    /// - `PGCRUD_INCLUDE_SCHEMAS` / `PGCRUD_EXCLUDE_SCHEMAS`: comma-separated namespace filters
    /// - `PGCRUD_EXCLUDE_TABLES`: comma-separated `schema.table` identifiers
    /// - `PGCRUD_DEFAULT_PAGE_SIZE` / `PGCRUD_MAX_PAGE_SIZE`: pagination (defaults: 25 / 200)
    /// - `PGCRUD_MAX_BULK_ROWS`: bulk insert cap (default: 1000)
    /// - `PGCRUD_MAX_BODY_BYTES`: request body cap (default: 1 MiB)
    /// - `PGCRUD_DOCS_ENABLED`: serve the documentation shell (default: true)
    /// - `PGCRUD_MASTER_SECRET`: credential master secret
    /// - `PGCRUD_AUTH_ENABLED`: require credentials (default: false)
    /// - `PGCRUD_CORS_ORIGINS`: `*`, `false`, or an origin list (default: `*`)
    /// - `PGCRUD_EXPOSE_DB_ERRORS`: include native error detail (default: false)
    /// - `PGCRUD_POOL_SIZE`: per-pool connection cap (default: 16)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url = std::env::var("PGCRUD_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map(|url| strip_jdbc_prefix(&url))
            .map_err(|_| ConfigError::MissingRequired {
                field: "PGCRUD_DATABASE_URL".to_string(),
            })?;

        let config = Self {
            database_url,
            read_database_url: std::env::var("PGCRUD_READ_DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .map(|url| strip_jdbc_prefix(&url)),
            host: env_string("PGCRUD_HOST", &defaults.host),
            port: std::env::var("PGCRUD_PORT")
                .or_else(|_| std::env::var("PORT"))
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            include_schemas: env_list("PGCRUD_INCLUDE_SCHEMAS"),
            exclude_schemas: env_list("PGCRUD_EXCLUDE_SCHEMAS"),
            exclude_tables: env_list("PGCRUD_EXCLUDE_TABLES"),
            default_page_size: env_parse("PGCRUD_DEFAULT_PAGE_SIZE", defaults.default_page_size),
            max_page_size: env_parse("PGCRUD_MAX_PAGE_SIZE", defaults.max_page_size),
            max_bulk_rows: env_parse("PGCRUD_MAX_BULK_ROWS", defaults.max_bulk_rows),
            max_body_bytes: env_parse("PGCRUD_MAX_BODY_BYTES", defaults.max_body_bytes),
            docs_enabled: env_parse("PGCRUD_DOCS_ENABLED", defaults.docs_enabled),
            master_secret: std::env::var("PGCRUD_MASTER_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            auth_enabled: env_parse("PGCRUD_AUTH_ENABLED", defaults.auth_enabled),
            cors_origins: std::env::var("PGCRUD_CORS_ORIGINS")
                .ok()
                .map(|raw| CorsOrigins::parse(&raw))
                .unwrap_or(defaults.cors_origins),
            expose_db_errors: env_parse("PGCRUD_EXPOSE_DB_ERRORS", defaults.expose_db_errors),
            pool_size: env_parse("PGCRUD_POOL_SIZE", defaults.pool_size),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    ///
    /// # Errors
    /// - auth enabled without a master secret
    /// - non-positive pagination bounds or pool size
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth_enabled && self.master_secret.is_none() {
            return Err(ConfigError::MissingRequired {
                field: "PGCRUD_MASTER_SECRET".to_string(),
            });
        }
        if self.default_page_size < 1 {
            return Err(ConfigError::InvalidValue {
                field: "PGCRUD_DEFAULT_PAGE_SIZE".to_string(),
                value: self.default_page_size.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_page_size < self.default_page_size {
            return Err(ConfigError::InvalidValue {
                field: "PGCRUD_MAX_PAGE_SIZE".to_string(),
                value: self.max_page_size.to_string(),
                reason: "must be at least the default page size".to_string(),
            });
        }
        if self.pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "PGCRUD_POOL_SIZE".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Strip the `jdbc:` wrapper some deployment tooling prepends to URLs.
pub fn strip_jdbc_prefix(url: &str) -> String {
    url.strip_prefix("jdbc:").unwrap_or(url).to_string()
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|s| {
            s.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================================
// TESTS
// ============================================================================
