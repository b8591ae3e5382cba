//! ---
//! dl_section: "05-test-harness"
//! dl_subsection: "01-bootstrap"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Fake emulator and launcher for exercising setup without a JVM."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
//! Test doubles for the emulator side of a setup run.
//!
//! [`FakeEmulator`] serves the subset of the DynamoDB JSON protocol that setup
//! uses (`ListTables`, `CreateTable`, `DeleteTable`) from memory, and
//! [`FakeLauncher`] starts one on the requested port in place of a JVM.
#![warn(missing_docs)]

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use dynalocal_common::InstallerConfig;
use dynalocal_emulator::{EmulatorHandle, LaunchError, Launcher};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const CONTENT_TYPE: &str = "application/x-amz-json-1.0";
const ERROR_PREFIX: &str = "com.amazonaws.dynamodb.v20120810#";

/// Reserve a currently unused loopback port.
pub fn free_port() -> io::Result<u16> {
    let listener = StdTcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

#[derive(Debug, Default)]
struct EmulatorState {
    tables: Mutex<BTreeMap<String, Value>>,
    failing_deletes: Mutex<HashSet<String>>,
    page_size: Mutex<Option<usize>>,
    reject_with: Mutex<Option<String>>,
    stuck_cursor: AtomicBool,
    requests: AtomicUsize,
    creates: AtomicUsize,
}

#[derive(Debug)]
struct EmulatorInner {
    address: SocketAddr,
    state: Arc<EmulatorState>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// In-memory DynamoDB endpoint. Cloning yields another handle to the same server.
#[derive(Debug, Clone)]
pub struct FakeEmulator {
    inner: Arc<EmulatorInner>,
}

impl FakeEmulator {
    /// Serve on an ephemeral loopback port.
    pub async fn spawn() -> io::Result<Self> {
        Self::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await
    }

    /// Serve on a specific address.
    pub async fn bind(address: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        let address = listener.local_addr()?;
        let state = Arc::new(EmulatorState::default());
        let router = Router::new()
            .route("/", post(dispatch))
            .with_state(state.clone());

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        });
        let task = tokio::spawn(async move {
            if let Err(err) = server.await {
                warn!(error = %err, "fake emulator exited with error");
            }
        });
        debug!(%address, "fake emulator listening");

        Ok(Self {
            inner: Arc::new(EmulatorInner {
                address,
                state,
                shutdown,
                task: Mutex::new(Some(task)),
            }),
        })
    }

    /// Bound socket address.
    pub fn address(&self) -> SocketAddr {
        self.inner.address
    }

    /// Bound port.
    pub fn port(&self) -> u16 {
        self.inner.address.port()
    }

    /// Names of the tables currently held.
    pub fn table_names(&self) -> BTreeSet<String> {
        self.inner.state.tables.lock().keys().cloned().collect()
    }

    /// Definition a table was created with, if present.
    pub fn table(&self, name: &str) -> Option<Value> {
        self.inner.state.tables.lock().get(name).cloned()
    }

    /// Insert a table directly, as if left behind by an earlier run.
    pub fn seed_table(&self, name: &str) {
        self.inner
            .state
            .tables
            .lock()
            .insert(name.to_owned(), json!({ "TableName": name }));
    }

    /// Make every `DeleteTable` for `name` fail with an internal error.
    pub fn fail_deletes_for(&self, name: &str) {
        self.inner.state.failing_deletes.lock().insert(name.to_owned());
    }

    /// Return at most `size` names per `ListTables` page.
    pub fn set_page_size(&self, size: usize) {
        *self.inner.state.page_size.lock() = Some(size.max(1));
    }

    /// Report the first table as `LastEvaluatedTableName` on every page, like
    /// a server whose cursor never advances.
    pub fn repeat_cursor(&self) {
        self.inner.state.stuck_cursor.store(true, Ordering::SeqCst);
    }

    /// Answer every request with a client error carrying `code`, like a
    /// listener that is up but refuses these credentials.
    pub fn reject_all_with(&self, code: &str) {
        *self.inner.state.reject_with.lock() = Some(code.to_owned());
    }

    /// Number of requests served so far.
    pub fn request_count(&self) -> usize {
        self.inner.state.requests.load(Ordering::SeqCst)
    }

    /// Number of successful `CreateTable` calls.
    pub fn create_count(&self) -> usize {
        self.inner.state.creates.load(Ordering::SeqCst)
    }

    /// Stop serving and wait for the server task.
    pub async fn shutdown(&self) {
        let _ = self.inner.shutdown.send(true);
        let task = self.inner.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "fake emulator join error");
            }
        }
    }
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, [(header::CONTENT_TYPE, CONTENT_TYPE)], body.to_string()).into_response()
}

fn error(status: StatusCode, code: &str, message: &str) -> Response {
    reply(
        status,
        json!({ "__type": format!("{ERROR_PREFIX}{code}"), "message": message }),
    )
}

async fn dispatch(
    State(state): State<Arc<EmulatorState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);

    if let Some(code) = state.reject_with.lock().clone() {
        return error(StatusCode::BAD_REQUEST, &code, "request rejected");
    }

    if !headers.contains_key(header::AUTHORIZATION) {
        return error(
            StatusCode::BAD_REQUEST,
            "MissingAuthenticationToken",
            "Request must contain a valid AWS access key id",
        );
    }
    let Some(target) = headers
        .get("x-amz-target")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("DynamoDB_20120810."))
    else {
        return error(StatusCode::BAD_REQUEST, "UnknownOperationException", "missing target");
    };
    let Ok(request) = serde_json::from_slice::<Value>(&body) else {
        return error(StatusCode::BAD_REQUEST, "SerializationException", "invalid JSON body");
    };
    let table_name = request
        .get("TableName")
        .and_then(Value::as_str)
        .map(str::to_owned);

    match target {
        "ListTables" => list_tables(&state, &request),
        "CreateTable" => match table_name {
            Some(name) => create_table(&state, name, request),
            None => error(StatusCode::BAD_REQUEST, "ValidationException", "TableName is required"),
        },
        "DeleteTable" => match table_name {
            Some(name) => delete_table(&state, &name),
            None => error(StatusCode::BAD_REQUEST, "ValidationException", "TableName is required"),
        },
        other => error(
            StatusCode::BAD_REQUEST,
            "UnknownOperationException",
            &format!("unsupported operation {other}"),
        ),
    }
}

fn list_tables(state: &EmulatorState, request: &Value) -> Response {
    let start = request
        .get("ExclusiveStartTableName")
        .and_then(Value::as_str);
    let tables = state.tables.lock();
    let remaining: Vec<&String> = tables
        .keys()
        .filter(|name| start.map_or(true, |start| name.as_str() > start))
        .collect();
    let page_size = state.page_size.lock().unwrap_or(usize::MAX);

    let page: Vec<&String> = remaining.iter().take(page_size).copied().collect();
    let mut body = json!({ "TableNames": page });
    if state.stuck_cursor.load(Ordering::SeqCst) {
        if let Some(first) = tables.keys().next() {
            body["LastEvaluatedTableName"] = json!(first);
        }
    } else if remaining.len() > page.len() {
        if let Some(last) = page.last() {
            body["LastEvaluatedTableName"] = json!(last);
        }
    }
    reply(StatusCode::OK, body)
}

fn create_table(state: &EmulatorState, name: String, definition: Value) -> Response {
    let mut tables = state.tables.lock();
    if tables.contains_key(&name) {
        return error(
            StatusCode::BAD_REQUEST,
            "ResourceInUseException",
            "Cannot create preexisting table",
        );
    }
    tables.insert(name.clone(), definition);
    state.creates.fetch_add(1, Ordering::SeqCst);
    reply(
        StatusCode::OK,
        json!({ "TableDescription": { "TableName": name, "TableStatus": "ACTIVE" } }),
    )
}

fn delete_table(state: &EmulatorState, name: &str) -> Response {
    if state.failing_deletes.lock().contains(name) {
        return error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "InternalServerError",
            "injected delete failure",
        );
    }
    match state.tables.lock().remove(name) {
        Some(_) => reply(
            StatusCode::OK,
            json!({ "TableDescription": { "TableName": name, "TableStatus": "DELETING" } }),
        ),
        None => error(
            StatusCode::BAD_REQUEST,
            "ResourceNotFoundException",
            "Cannot do operations on a non-existent table",
        ),
    }
}

/// [`Launcher`] that starts a [`FakeEmulator`] on the requested loopback port.
#[derive(Debug, Default)]
pub struct FakeLauncher {
    launches: AtomicUsize,
    emulators: Mutex<Vec<FakeEmulator>>,
    installer: Mutex<Option<InstallerConfig>>,
}

impl FakeLauncher {
    /// Create a launcher that has not launched anything yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times [`Launcher::launch`] was invoked.
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Most recently launched emulator.
    pub fn emulator(&self) -> Option<FakeEmulator> {
        self.emulators.lock().last().cloned()
    }

    /// Installer overrides received through [`Launcher::configure_installer`].
    pub fn installer(&self) -> Option<InstallerConfig> {
        self.installer.lock().clone()
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    fn configure_installer(&self, overrides: &InstallerConfig) {
        *self.installer.lock() = Some(overrides.clone());
    }

    async fn launch(&self, port: u16, options: &[String]) -> Result<EmulatorHandle, LaunchError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let emulator = FakeEmulator::bind(SocketAddr::from(([127, 0, 0, 1], port)))
            .await
            .map_err(|source| LaunchError::Spawn {
                program: "fake-emulator".to_owned(),
                source,
            })?;
        self.emulators.lock().push(emulator);
        Ok(EmulatorHandle::new(
            port,
            None,
            format!("fake-emulator -port {port} {}", options.join(" ")),
        ))
    }
}
