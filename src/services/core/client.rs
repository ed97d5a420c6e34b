use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use tokio::time::Instant;

use thiserror::Error;
use tokio::sync::RwLock;
use tonic::transport::{Channel, ClientTlsConfig};
use tonic::Code;
use tracing::{debug, info, warn};

use crate::services::core::proto::{QueryAllChainConfigsRequest, QueryFacade};
use crate::services::metrics;

const DEFAULT_GRPC_PORT: u16 = 9090;
const DIAL_TIMEOUT: Duration = Duration::from_secs(5);
/// Timeout for the minimal liveness query issued by the maintenance loop.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Error messages that identify a transport-level failure when the status
/// code alone is not conclusive.
const CONNECTION_ERROR_MARKERS: [&str; 6] = [
    "connection refused",
    "connection reset",
    "no connection",
    "transport closing",
    "unavailable",
    "deadline exceeded",
];

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("no healthy connections available")]
    NoHealthyConnections,
    #[error("query failed: {0}")]
    Status(#[from] tonic::Status),
    #[error("{0} not found")]
    NotFound(String),
    #[error("no gas prices available")]
    NoGasPrices,
    #[error("decode error: {0}")]
    Decode(String),
    #[error("failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// Transport-shaped errors are handled by failover and are not charged
    /// to the retry budget.
    pub fn is_connection_error(&self) -> bool {
        match self {
            CoreError::Connection(_) => true,
            CoreError::Status(status) => {
                matches!(status.code(), Code::Unavailable | Code::DeadlineExceeded)
                    || message_is_connection_shaped(status.message())
            }
            _ => false,
        }
    }
}

fn message_is_connection_shaped(message: &str) -> bool {
    let message = message.to_lowercase();
    CONNECTION_ERROR_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

#[derive(Debug, Clone)]
pub struct CoreClientConfig {
    pub grpc_urls: Vec<String>,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub health_check_interval: Duration,
    pub unhealthy_cooldown: Duration,
}

impl Default for CoreClientConfig {
    fn default() -> Self {
        Self {
            grpc_urls: Vec::new(),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
            health_check_interval: Duration::from_secs(30),
            unhealthy_cooldown: Duration::from_secs(10),
        }
    }
}

impl CoreClientConfig {
    pub fn with_urls(urls: Vec<String>) -> Self {
        Self {
            grpc_urls: urls,
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct Connection {
    url: String,
    /// `None` while a dial is pending recovery.
    channel: RwLock<Option<Channel>>,
    healthy: AtomicBool,
    last_check: StdRwLock<Instant>,
}

impl Connection {
    fn stamp_checked(&self) {
        *self.last_check.write().unwrap() = Instant::now();
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }
}

/// A healthy connection handed to a query closure by the retry driver.
pub struct ConnectionHandle {
    pub url: String,
    pub channel: Channel,
}

impl ConnectionHandle {
    pub fn facade(&self) -> QueryFacade {
        QueryFacade::new(self.channel.clone())
    }
}

#[derive(Debug)]
struct ClientInner {
    connections: Vec<Connection>,
    current: AtomicUsize,
    config: CoreClientConfig,
}

/// Fan-out client over the home chain's validator gRPC surface.
///
/// Dials every configured URL at construction; a failed dial keeps the slot
/// with a nil handle, eligible for background recovery. Queries run through
/// [`CoreClient::execute_with_retry`], which fails over on transport errors
/// and retries remote errors with capped exponential backoff.
#[derive(Clone, Debug)]
pub struct CoreClient {
    inner: Arc<ClientInner>,
}

impl CoreClient {
    pub async fn new(config: CoreClientConfig) -> Result<Self, CoreError> {
        if config.grpc_urls.is_empty() {
            return Err(CoreError::Config("no gRPC URLs configured".to_string()));
        }

        let mut connections = Vec::with_capacity(config.grpc_urls.len());
        for raw in &config.grpc_urls {
            let url = normalize_url(raw)?;
            let (channel, healthy) = match dial(&url).await {
                Ok(channel) => (Some(channel), true),
                Err(e) => {
                    warn!(
                        url = %url,
                        error = %e,
                        "initial dial failed, connection left for recovery"
                    );
                    (None, false)
                }
            };
            connections.push(Connection {
                url,
                channel: RwLock::new(channel),
                healthy: AtomicBool::new(healthy),
                last_check: StdRwLock::new(Instant::now()),
            });
        }

        if !connections.iter().any(|c| c.is_healthy()) {
            warn!("no healthy home-chain connections at startup, recovery will keep trying");
        }

        let inner = Arc::new(ClientInner {
            connections,
            current: AtomicUsize::new(0),
            config,
        });
        inner.ensure_current_healthy();
        spawn_maintenance(&inner);

        Ok(Self { inner })
    }

    pub fn config(&self) -> &CoreClientConfig {
        &self.inner.config
    }

    /// (url, healthy) per connection, in configuration order.
    pub fn connection_health(&self) -> Vec<(String, bool)> {
        self.inner
            .connections
            .iter()
            .map(|c| (c.url.clone(), c.is_healthy()))
            .collect()
    }

    /// Re-probe unhealthy connections right now, ignoring the cooldown.
    pub async fn recover_now(&self) {
        self.inner.recover_unhealthy().await;
    }

    /// Single execution driver for every query.
    ///
    /// Transport-shaped failures mark the connection unhealthy, advance to
    /// the next healthy one, trigger immediate recovery and are not charged
    /// to the retry budget. Everything else consumes one attempt and sleeps
    /// a doubling backoff (capped at 30 s) before the next try. Dropping the
    /// returned future (for example via `tokio::time::timeout`) cancels any
    /// in-flight sleep immediately.
    pub async fn execute_with_retry<T, F, Fut>(&self, op: &str, f: F) -> Result<T, CoreError>
    where
        F: Fn(ConnectionHandle) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut attempts: u32 = 0;
        let mut failovers: usize = 0;
        let mut backoff = self.inner.config.retry_backoff;
        let mut last_err = CoreError::NoHealthyConnections;

        loop {
            let picked = match self.inner.current_connection().await {
                Some(picked) => Some(picked),
                None => {
                    self.inner.recover_unhealthy().await;
                    self.inner.current_connection().await
                }
            };

            match picked {
                Some((idx, handle)) => {
                    let url = handle.url.clone();
                    match f(handle).await {
                        Ok(value) => {
                            metrics::record_core_query(op, "success");
                            return Ok(value);
                        }
                        Err(e)
                            if e.is_connection_error()
                                && failovers < self.inner.connections.len() =>
                        {
                            failovers += 1;
                            warn!(
                                op,
                                endpoint = %url,
                                error = %e,
                                "connection failure, failing over"
                            );
                            self.inner.mark_unhealthy(idx);
                            self.inner.ensure_current_healthy();
                            self.inner.recover_unhealthy().await;
                            last_err = e;
                            continue;
                        }
                        Err(e) => last_err = e,
                    }
                }
                None => last_err = CoreError::NoHealthyConnections,
            }

            attempts += 1;
            failovers = 0;
            metrics::record_core_query(op, "failure");
            if attempts > self.inner.config.max_retries {
                return Err(CoreError::RetriesExhausted {
                    attempts,
                    source: Box::new(last_err),
                });
            }

            metrics::record_core_retry(op);
            debug!(
                op,
                attempt = attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %last_err,
                "query failed, retrying after backoff"
            );
            tokio::time::sleep(backoff).await;
            backoff = std::cmp::min(backoff * 2, MAX_RETRY_BACKOFF);
        }
    }
}

impl ClientInner {
    /// The currently preferred healthy connection, rotating forward past
    /// unhealthy slots. `None` when nothing is usable.
    async fn current_connection(&self) -> Option<(usize, ConnectionHandle)> {
        let n = self.connections.len();
        let start = self.current.load(Ordering::Acquire);
        for offset in 0..n {
            let idx = (start + offset) % n;
            let conn = &self.connections[idx];
            if !conn.is_healthy() {
                continue;
            }
            if let Some(channel) = conn.channel.read().await.clone() {
                if offset != 0 {
                    self.current.store(idx, Ordering::Release);
                }
                return Some((
                    idx,
                    ConnectionHandle {
                        url: conn.url.clone(),
                        channel,
                    },
                ));
            }
        }
        None
    }

    fn mark_unhealthy(&self, idx: usize) {
        if let Some(conn) = self.connections.get(idx) {
            conn.healthy.store(false, Ordering::Release);
            conn.stamp_checked();
        }
    }

    /// Keep the preferred index on a healthy connection whenever one exists;
    /// otherwise leave it untouched.
    fn ensure_current_healthy(&self) {
        let current = self.current.load(Ordering::Acquire);
        if self
            .connections
            .get(current)
            .map(|c| c.is_healthy())
            .unwrap_or(false)
        {
            return;
        }
        if let Some(idx) = self.connections.iter().position(|c| c.is_healthy()) {
            self.current.store(idx, Ordering::Release);
        }
    }

    /// Periodic sweep over all connections: nil handles are re-dialled,
    /// live ones are probed with the minimal registry query. Unhealthy
    /// connections inside the cooldown window are skipped.
    async fn maintenance_sweep(&self) {
        for conn in &self.connections {
            if !conn.is_healthy() {
                let last = *conn.last_check.read().unwrap();
                if last.elapsed() < self.config.unhealthy_cooldown {
                    continue;
                }
            }
            self.probe_connection(conn).await;
        }
        self.ensure_current_healthy();
    }

    /// Immediate recovery pass over unhealthy connections, cooldown ignored.
    async fn recover_unhealthy(&self) {
        for conn in &self.connections {
            if conn.is_healthy() {
                continue;
            }
            self.probe_connection(conn).await;
        }
        self.ensure_current_healthy();
    }

    async fn probe_connection(&self, conn: &Connection) {
        let existing = conn.channel.read().await.clone();
        let channel = match existing {
            Some(channel) => channel,
            None => match dial(&conn.url).await {
                Ok(channel) => {
                    info!(url = %conn.url, "re-dialled home-chain connection");
                    *conn.channel.write().await = Some(channel.clone());
                    channel
                }
                Err(e) => {
                    debug!(url = %conn.url, error = %e, "re-dial failed");
                    conn.healthy.store(false, Ordering::Release);
                    conn.stamp_checked();
                    return;
                }
            },
        };

        let mut facade = QueryFacade::new(channel);
        let healthy = tokio::time::timeout(
            PROBE_TIMEOUT,
            facade.all_chain_configs(QueryAllChainConfigsRequest {}),
        )
        .await
        .map(|result| result.is_ok())
        .unwrap_or(false);

        let was = conn.healthy.swap(healthy, Ordering::AcqRel);
        if was != healthy {
            info!(url = %conn.url, healthy, "home-chain connection health changed");
        }
        conn.stamp_checked();
    }
}

/// The ticker holds only a weak reference; it winds down once the last
/// client handle is dropped.
fn spawn_maintenance(inner: &Arc<ClientInner>) {
    let weak = Arc::downgrade(inner);
    let interval = inner.config.health_check_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The connections were just dialed; skip the immediate first tick.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            inner.maintenance_sweep().await;
        }
    });
}

/// Apply the default scheme and port: bare hosts are assumed insecure
/// (`http`), and port 9090 is appended when none is given.
fn normalize_url(raw: &str) -> Result<String, CoreError> {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let uri: http::Uri = with_scheme
        .parse()
        .map_err(|e| CoreError::Config(format!("invalid gRPC URL {raw}: {e}")))?;

    if uri.port().is_some() {
        return Ok(with_scheme);
    }
    let scheme = uri.scheme_str().unwrap_or("http");
    let host = uri
        .host()
        .ok_or_else(|| CoreError::Config(format!("invalid gRPC URL {raw}: missing host")))?;
    Ok(format!("{scheme}://{host}:{DEFAULT_GRPC_PORT}"))
}

async fn dial(url: &str) -> Result<Channel, CoreError> {
    let mut endpoint = Channel::from_shared(url.to_string())
        .map_err(|e| CoreError::Config(format!("invalid gRPC URL {url}: {e}")))?
        .connect_timeout(DIAL_TIMEOUT);

    if url.starts_with("https://") {
        endpoint = endpoint
            .tls_config(ClientTlsConfig::new().with_webpki_roots())
            .map_err(|e| CoreError::Connection(format!("tls setup for {url}: {e}")))?;
    }

    endpoint
        .connect()
        .await
        .map_err(|e| CoreError::Connection(format!("dial {url}: {e}")))
}
