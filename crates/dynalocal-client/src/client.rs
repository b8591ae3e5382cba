//! ---
//! dl_section: "02-database-client"
//! dl_subsection: "module"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "SDK-backed table operations against the local emulator."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::config::retry::RetryConfig;
use aws_sdk_dynamodb::config::timeout::TimeoutConfig;
use aws_sdk_dynamodb::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_dynamodb::Config;
use dynalocal_common::{ClientOverrides, Configuration, TableDefinition};
use tracing::{debug, trace};
use url::Url;

use crate::definition::create_table_request;
use crate::error::ClientError;

/// Region baked into every local client unless overridden.
pub const DEFAULT_REGION: &str = "local-env";
/// Access key id used against the emulator; never valid against a real endpoint.
pub const FAKE_ACCESS_KEY_ID: &str = "fakeMyKeyId";
/// Secret paired with [`FAKE_ACCESS_KEY_ID`].
pub const FAKE_SECRET_ACCESS_KEY: &str = "fakeSecretAccessKey";

const CREDENTIALS_PROVIDER: &str = "dynalocal";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Table operations needed to reconcile and provision a test environment.
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Names of every table currently present.
    async fn list_table_names(&self) -> Result<Vec<String>, ClientError>;
    /// Create a table from its full definition.
    async fn create_table(&self, definition: &TableDefinition) -> Result<(), ClientError>;
    /// Delete a table by name.
    async fn delete_table(&self, table_name: &str) -> Result<(), ClientError>;
}

/// Connection settings for [`DynamoClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Plain-HTTP endpoint of the emulator.
    pub endpoint: Url,
    /// Region used in the signature scope.
    pub region: String,
    /// Static credentials used for signing.
    pub credentials: Credentials,
    /// Upper bound on a single operation.
    pub request_timeout: Duration,
}

fn static_credentials(access_key_id: &str, secret_access_key: &str) -> Credentials {
    Credentials::new(access_key_id, secret_access_key, None, None, CREDENTIALS_PROVIDER)
}

impl ClientSettings {
    /// Settings for an emulator on `hostname:port` with the fake local credentials.
    pub fn local(hostname: &str, port: u16) -> Result<Self, ClientError> {
        Ok(Self {
            endpoint: parse_endpoint(&format!("http://{hostname}:{port}"))?,
            region: DEFAULT_REGION.to_owned(),
            credentials: static_credentials(FAKE_ACCESS_KEY_ID, FAKE_SECRET_ACCESS_KEY),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Apply user overrides on top of the local defaults.
    pub fn with_overrides(mut self, overrides: &ClientOverrides) -> Result<Self, ClientError> {
        if let Some(endpoint) = &overrides.endpoint {
            self.endpoint = parse_endpoint(endpoint)?;
        }
        if let Some(region) = &overrides.region {
            self.region = region.clone();
        }
        if overrides.access_key_id.is_some() || overrides.secret_access_key.is_some() {
            let access_key_id = overrides
                .access_key_id
                .as_deref()
                .unwrap_or(self.credentials.access_key_id());
            let secret = overrides
                .secret_access_key
                .as_deref()
                .unwrap_or(self.credentials.secret_access_key());
            self.credentials = static_credentials(access_key_id, secret);
        }
        if let Some(timeout) = overrides.request_timeout {
            self.request_timeout = timeout;
        }
        Ok(self)
    }

    /// Settings derived from a resolved configuration.
    pub fn for_configuration(config: &Configuration) -> Result<Self, ClientError> {
        let settings = Self::local(&config.hostname, config.port)?;
        match &config.client_config {
            Some(overrides) => settings.with_overrides(overrides),
            None => Ok(settings),
        }
    }

    fn sdk_config(&self) -> Config {
        Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(self.endpoint.as_str().trim_end_matches('/'))
            .region(Region::new(self.region.clone()))
            .credentials_provider(self.credentials.clone())
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(CONNECT_TIMEOUT)
                    .operation_timeout(self.request_timeout)
                    .build(),
            )
            .build()
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, ClientError> {
    let invalid = |reason: String| ClientError::InvalidEndpoint {
        endpoint: raw.to_owned(),
        reason,
    };
    let url = Url::parse(raw).map_err(|err| invalid(err.to_string()))?;
    if url.host_str().is_none() {
        return Err(invalid("endpoint has no host".to_owned()));
    }
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme `{}`", url.scheme())));
    }
    Ok(url)
}

/// DynamoDB client bound to one emulator endpoint.
///
/// Retries are disabled: a refused connection has to surface immediately so
/// setup can fall back to launching an emulator.
#[derive(Debug, Clone)]
pub struct DynamoClient {
    inner: aws_sdk_dynamodb::Client,
    settings: ClientSettings,
}

impl DynamoClient {
    /// Build a client from explicit settings.
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
        let inner = aws_sdk_dynamodb::Client::from_conf(settings.sdk_config());
        Ok(Self { inner, settings })
    }

    /// Build a client for the emulator described by `config`.
    pub fn from_configuration(config: &Configuration) -> Result<Self, ClientError> {
        Self::new(ClientSettings::for_configuration(config)?)
    }

    /// Endpoint this client talks to.
    pub fn endpoint(&self) -> &Url {
        &self.settings.endpoint
    }

    /// Region used for request signing.
    pub fn region(&self) -> &str {
        &self.settings.region
    }

    /// Underlying SDK client, for operations beyond table management.
    pub fn sdk(&self) -> &aws_sdk_dynamodb::Client {
        &self.inner
    }
}

#[async_trait]
impl TableClient for DynamoClient {
    async fn list_table_names(&self) -> Result<Vec<String>, ClientError> {
        trace!(endpoint = %self.settings.endpoint, "listing tables");
        // The paginator stops on a repeated cursor instead of looping.
        let names: Vec<String> = self
            .inner
            .list_tables()
            .into_paginator()
            .items()
            .send()
            .try_collect()
            .await
            .map_err(|err| ClientError::from_sdk("ListTables", err))?;
        debug!(count = names.len(), "listed tables");
        Ok(names)
    }

    async fn create_table(&self, definition: &TableDefinition) -> Result<(), ClientError> {
        create_table_request(self.inner.create_table(), definition)?
            .send()
            .await
            .map_err(|err| ClientError::from_sdk("CreateTable", err))?;
        debug!(table = %definition.table_name, "table created");
        Ok(())
    }

    async fn delete_table(&self, table_name: &str) -> Result<(), ClientError> {
        self.inner
            .delete_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(|err| ClientError::from_sdk("DeleteTable", err))?;
        debug!(table = %table_name, "table deleted");
        Ok(())
    }
}
