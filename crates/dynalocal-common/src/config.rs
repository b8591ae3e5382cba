//! ---
//! dl_section: "01-configuration"
//! dl_subsection: "module"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Configuration sources, documents, and the resolved configuration."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable overriding the configuration file location.
pub const ENV_CONFIG_PATH: &str = "DYNALOCAL_CONFIG";
/// File name looked up in the current working directory when no override is set.
pub const DEFAULT_CONFIG_FILE: &str = "dynalocal.toml";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_HOSTNAME: &str = "localhost";
/// Launch flag making every client share one database file regardless of region or key.
pub const SHARED_DB_FLAG: &str = "-sharedDb";

fn default_options() -> Vec<String> {
    vec![SHARED_DB_FLAG.to_owned()]
}

/// Errors raised while resolving a [`ConfigSource`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration not found at {}: {source}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed configuration from {origin}: {reason}")]
    Shape { origin: String, reason: String },
}

impl ConfigError {
    fn shape(origin: &str, reason: impl Into<String>) -> Self {
        ConfigError::Shape {
            origin: origin.to_owned(),
            reason: reason.into(),
        }
    }
}

/// A single table the test suite needs, expressed as a DynamoDB `CreateTable` input.
///
/// Only the name is interpreted here; the remaining parameters (`KeySchema`,
/// `AttributeDefinitions`, `BillingMode`, indexes, ...) are kept in declaration
/// order and validated when the `CreateTable` request is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    #[serde(rename = "TableName")]
    pub table_name: String,
    #[serde(flatten)]
    pub parameters: IndexMap<String, serde_json::Value>,
}

impl TableDefinition {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            parameters: IndexMap::new(),
        }
    }

    /// Attach an engine-specific creation parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Convenience for the common single-string-hash-key, on-demand table.
    pub fn with_hash_key(self, attribute: &str) -> Self {
        self.with_parameter(
            "KeySchema",
            serde_json::json!([{ "AttributeName": attribute, "KeyType": "HASH" }]),
        )
        .with_parameter(
            "AttributeDefinitions",
            serde_json::json!([{ "AttributeName": attribute, "AttributeType": "S" }]),
        )
        .with_parameter("BillingMode", serde_json::json!("PAY_PER_REQUEST"))
    }

    pub fn name(&self) -> &str {
        &self.table_name
    }
}

/// Overrides merged over the baked-in local client settings.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOverrides {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    #[serde(alias = "accessKeyId")]
    pub access_key_id: Option<String>,
    #[serde(alias = "secretAccessKey")]
    pub secret_access_key: Option<String>,
    #[serde(rename = "request_timeout_ms", alias = "requestTimeoutMs")]
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub request_timeout: Option<Duration>,
}

/// Overrides for locating or installing the emulator distribution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    #[serde(alias = "installPath")]
    pub install_path: Option<PathBuf>,
    #[serde(alias = "downloadUrl")]
    pub download_url: Option<String>,
    #[serde(alias = "javaPath")]
    pub java_path: Option<PathBuf>,
    #[serde(alias = "javaOpts")]
    pub java_opts: Vec<String>,
    pub verbose: bool,
}

/// Raw configuration as authored by the user, before defaults are applied.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub tables: Option<Vec<TableDefinition>>,
    #[serde(default, alias = "clientConfig")]
    pub client_config: Option<ClientOverrides>,
    #[serde(default, alias = "installerConfig")]
    pub installer_config: Option<InstallerConfig>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default, rename = "settle_delay_ms", alias = "settleDelayMs")]
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub settle_delay: Option<Duration>,
}

impl ConfigDocument {
    pub fn with_tables(tables: impl IntoIterator<Item = TableDefinition>) -> Self {
        Self {
            tables: Some(tables.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }
}

/// Effective configuration for one setup invocation.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Configuration {
    pub tables: Vec<TableDefinition>,
    pub client_config: Option<ClientOverrides>,
    pub installer_config: Option<InstallerConfig>,
    pub port: u16,
    pub hostname: String,
    pub options: Vec<String>,
    #[serde(rename = "settle_delay_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub settle_delay: Duration,
}

impl Configuration {
    /// Apply defaults to a raw document and validate its structural invariants.
    pub fn from_document(document: ConfigDocument, origin: &str) -> Result<Self, ConfigError> {
        let Some(tables) = document.tables else {
            return Err(ConfigError::shape(origin, "missing required field `tables`"));
        };

        let mut seen = HashSet::new();
        for table in &tables {
            if table.table_name.trim().is_empty() {
                return Err(ConfigError::shape(origin, "table definitions require a non-empty `TableName`"));
            }
            if !seen.insert(table.table_name.as_str()) {
                warn!(table = %table.table_name, %origin, "table declared more than once");
            }
        }

        let port = document.port.unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(ConfigError::shape(origin, "`port` must be non-zero"));
        }

        Ok(Self {
            tables,
            client_config: document.client_config,
            installer_config: document.installer_config,
            port,
            hostname: document
                .hostname
                .unwrap_or_else(|| DEFAULT_HOSTNAME.to_owned()),
            options: document.options.unwrap_or_else(default_options),
            settle_delay: document.settle_delay.unwrap_or(Duration::ZERO),
        })
    }

    /// Endpoint URL derived from `hostname` and `port`.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.hostname, self.port)
    }
}

/// Zero-argument producer evaluated once per setup.
pub type ConfigProducer =
    Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<ConfigDocument>> + Send + Sync>;

/// Where the configuration comes from.
#[derive(Clone)]
pub enum ConfigSource {
    /// A file on disk. `None` honours `DYNALOCAL_CONFIG`, then `./dynalocal.toml`.
    File(Option<PathBuf>),
    Static(ConfigDocument),
    Producer(ConfigProducer),
}

impl Default for ConfigSource {
    fn default() -> Self {
        ConfigSource::File(None)
    }
}

impl fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => f.debug_tuple("File").field(path).finish(),
            ConfigSource::Static(document) => f.debug_tuple("Static").field(document).finish(),
            ConfigSource::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

impl ConfigSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        ConfigSource::File(Some(path.into()))
    }

    /// Wrap a synchronous producer.
    pub fn producer<F>(producer: F) -> Self
    where
        F: Fn() -> anyhow::Result<ConfigDocument> + Send + Sync + 'static,
    {
        ConfigSource::Producer(Arc::new(move || {
            Box::pin(futures::future::ready(producer()))
        }))
    }

    /// Wrap an asynchronous producer.
    pub fn async_producer<F, Fut>(producer: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ConfigDocument>> + Send + 'static,
    {
        ConfigSource::Producer(Arc::new(move || Box::pin(producer())))
    }

    /// Evaluate the source and resolve it into a [`Configuration`].
    pub async fn load(&self) -> Result<Configuration, ConfigError> {
        match self {
            ConfigSource::File(path) => {
                let path = resolve_config_path(path.as_deref());
                debug!(config_path = %path.display(), "loading configuration");
                let document = read_document(&path).await?;
                Configuration::from_document(document, &path.display().to_string())
            }
            ConfigSource::Static(document) => {
                Configuration::from_document(document.clone(), "static configuration")
            }
            ConfigSource::Producer(producer) => {
                debug!("evaluating configuration producer");
                let document = producer().await.map_err(|err| {
                    ConfigError::shape("configuration producer", format!("{err:#}"))
                })?;
                Configuration::from_document(document, "configuration producer")
            }
        }
    }
}

/// Resolve the effective configuration path: explicit path, `DYNALOCAL_CONFIG`, then the
/// default file in the current working directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        if !env_path.trim().is_empty() {
            return PathBuf::from(env_path);
        }
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(DEFAULT_CONFIG_FILE),
        Err(_) => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Toml,
    Yaml,
    Json,
}

impl FileFormat {
    fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        }
    }
}

async fn read_document(path: &Path) -> Result<ConfigDocument, ConfigError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;
    let origin = path.display().to_string();
    parse_document(&contents, FileFormat::from_path(path), &origin)
}

fn parse_document(
    contents: &str,
    format: FileFormat,
    origin: &str,
) -> Result<ConfigDocument, ConfigError> {
    fn describe<E: fmt::Display>(err: serde_path_to_error::Error<E>) -> String {
        let path = err.path().to_string();
        if path == "." {
            err.into_inner().to_string()
        } else {
            format!("{} (at `{}`)", err.into_inner(), path)
        }
    }

    let parsed = match format {
        FileFormat::Toml => {
            serde_path_to_error::deserialize(toml::Deserializer::new(contents)).map_err(describe)
        }
        FileFormat::Yaml => {
            serde_path_to_error::deserialize(serde_yaml::Deserializer::from_str(contents))
                .map_err(describe)
        }
        FileFormat::Json => {
            let mut de = serde_json::Deserializer::from_str(contents);
            serde_path_to_error::deserialize(&mut de).map_err(describe)
        }
    };
    parsed.map_err(|reason| ConfigError::shape(origin, reason))
}
