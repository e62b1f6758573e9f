//! HTTP Telemetry Store - Firebase-Style REST Integration
//!
//! ## Overview
//!
//! Implements the core [`TelemetryStore`] trait against REST backends that
//! expose collections as JSON documents: `GET <collection>.json` returns a
//! keyed object of records, `POST` appends under a generated key, `DELETE`
//! drops the collection. Firebase Realtime Database is the reference
//! dialect, but anything wire-compatible works.
//!
//! ## Implementation Choices
//!
//! Kept deliberately simple and blocking:
//! - `ureq` for the client, no async runtime
//! - JSON only
//! - Automatic retries with exponential backoff for transport errors,
//!   5xx responses, and rate limiting
//! - 401/403 map to [`StoreError::PermissionDenied`] and are not retried
//!
//! Server-side ordering is requested with `orderBy="timestamp"` and
//! `limitToLast`, but the response is a JSON object whose member order
//! carries no meaning; the pipeline's merge sorts what it admits, so no
//! client-side sort happens here.
//!
//! ## Example Usage
//!
//! ```no_run
//! use accelmon_connectors::http::{HttpStore, HttpConfig};
//! use accelmon_core::TelemetryStore;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpConfig::new("https://example-db.firebaseio.com")
//!     .bearer_token("id-token")
//!     .timeout_secs(10);
//!
//! let store = HttpStore::new(config)?;
//! let records = store.query(20)?;
//! # Ok(())
//! # }
//! ```
//!
//! [`TelemetryStore`]: accelmon_core::TelemetryStore
//! [`StoreError::PermissionDenied`]: accelmon_core::StoreError::PermissionDenied

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine as _;
use thiserror::Error;

use accelmon_core::reading::RawRecord;
use accelmon_core::store::{StoreError, StoreResult, TelemetryStore};

use crate::ConnectionStats;

/// HTTP-specific errors.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network or request error.
    #[error("Request failed: {0}")]
    Request(String),

    /// Server returned an error status.
    #[error("Server error {status}: {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Response body, best effort.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<HttpError> for StoreError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::ServerError { status: 401 | 403, message } => {
                StoreError::PermissionDenied(message)
            }
            HttpError::Serialization(msg) => StoreError::Malformed(msg),
            other => StoreError::Transport(other.to_string()),
        }
    }
}

/// Authentication methods.
#[derive(Clone)]
pub enum AuthMethod {
    /// No authentication.
    None,
    /// Bearer token.
    Bearer(String),
    /// Basic authentication.
    Basic {
        /// Account name.
        username: String,
        /// Account secret.
        password: String,
    },
    /// API key in a custom header.
    ApiKey {
        /// Header name.
        header: String,
        /// Header value.
        value: String,
    },
}

/// HTTP store configuration.
#[derive(Clone)]
pub struct HttpConfig {
    /// Base URL of the database.
    pub base_url: String,
    /// Collection path under the base URL, without the `.json` suffix.
    pub collection: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Authentication method.
    pub auth: AuthMethod,
    /// Custom headers.
    pub headers: HashMap<String, String>,
    /// Retry attempts after the first failure.
    pub max_retries: u32,
    /// User agent string.
    pub user_agent: String,
}

impl HttpConfig {
    /// Create a new configuration with a base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            collection: "readings".into(),
            timeout: Duration::from_secs(30),
            auth: AuthMethod::None,
            headers: HashMap::new(),
            max_retries: 3,
            user_agent: format!("AccelMon/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set bearer token authentication.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = AuthMethod::Bearer(token.into());
        self
    }

    /// Set basic authentication.
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Set API key authentication.
    pub fn api_key(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth = AuthMethod::ApiKey {
            header: header.into(),
            value: value.into(),
        };
        self
    }

    /// Set request timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Set retry attempts after the first failure.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the collection path (default `readings`).
    pub fn collection(mut self, path: impl Into<String>) -> Self {
        self.collection = path.into();
        self
    }

    /// Add a custom header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Telemetry store over a Firebase-style REST backend.
pub struct HttpStore {
    config: HttpConfig,
    agent: ureq::Agent,
    stats: Mutex<ConnectionStats>,
}

impl HttpStore {
    /// Create a new store, validating the configuration.
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(HttpError::Config(
                "Base URL must start with http:// or https://".into(),
            ));
        }
        if config.collection.is_empty() {
            return Err(HttpError::Config("Collection path must not be empty".into()));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();

        Ok(Self {
            config,
            agent,
            stats: Mutex::new(ConnectionStats::default()),
        })
    }

    /// Connection statistics since construction.
    pub fn stats(&self) -> ConnectionStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/{}.json",
            self.config.base_url.trim_end_matches('/'),
            self.config.collection
        )
    }

    /// Apply auth and headers to a request.
    fn build_request(&self, mut request: ureq::Request) -> ureq::Request {
        match &self.config.auth {
            AuthMethod::None => {}
            AuthMethod::Bearer(token) => {
                request = request.set("Authorization", &format!("Bearer {}", token));
            }
            AuthMethod::Basic { username, password } => {
                let credentials = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                request = request.set("Authorization", &format!("Basic {}", credentials));
            }
            AuthMethod::ApiKey { header, value } => {
                request = request.set(header, value);
            }
        }

        for (name, value) in &self.config.headers {
            request = request.set(name, value);
        }

        request
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
    }

    /// Execute with retry and backoff; retries transport errors, 5xx, and 429.
    fn execute_with_retry(
        &self,
        request: ureq::Request,
        body: Option<&str>,
    ) -> Result<String, HttpError> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(100 * (1 << attempt));
                log::debug!("retrying request after {:?} (attempt {attempt})", delay);
                std::thread::sleep(delay);
                self.stats.lock().unwrap_or_else(|e| e.into_inner()).retries += 1;
            }

            let response = match body {
                Some(json) => request.clone().send_string(json),
                None => request.clone().call(),
            };

            match response {
                Ok(resp) => {
                    {
                        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
                        stats.requests_ok += 1;
                        stats.bytes_sent += body.map(str::len).unwrap_or(0) as u64;
                    }
                    return resp
                        .into_string()
                        .map_err(|e| HttpError::Request(e.to_string()));
                }
                Err(ureq::Error::Status(code, resp)) => {
                    let message = resp.into_string().unwrap_or_default();
                    let error = HttpError::ServerError { status: code, message };
                    if code >= 500 || code == 429 {
                        last_error = Some(error);
                        continue;
                    }
                    self.record_failure(&error);
                    return Err(error);
                }
                Err(ureq::Error::Transport(e)) => {
                    last_error = Some(HttpError::Request(e.to_string()));
                    continue;
                }
            }
        }

        let error = last_error.unwrap_or_else(|| HttpError::Request("Unknown error".into()));
        self.record_failure(&error);
        Err(error)
    }

    fn record_failure(&self, error: &HttpError) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.requests_failed += 1;
        stats.last_error = Some(error.to_string());
    }

    fn fetch_records(&self, limit: usize) -> Result<Vec<RawRecord>, HttpError> {
        let request = self
            .agent
            .get(&self.collection_url())
            .query("orderBy", "\"timestamp\"")
            .query("limitToLast", &limit.to_string());
        let request = self.build_request(request);

        let text = self.execute_with_retry(request, None)?;

        // An empty collection comes back as the literal `null`.
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| HttpError::Serialization(e.to_string()))?;
        let serde_json::Value::Object(map) = value else {
            return Ok(Vec::new());
        };

        let mut records = Vec::with_capacity(map.len());
        for (key, entry) in map {
            match serde_json::from_value::<RawRecord>(entry) {
                Ok(mut record) => {
                    // The backend key wins over any embedded id.
                    record.id = Some(key);
                    records.push(record);
                }
                Err(e) => {
                    // One corrupt entry must not poison the batch.
                    log::warn!("skipping malformed record {key}: {e}");
                }
            }
        }
        Ok(records)
    }
}

impl TelemetryStore for HttpStore {
    fn query(&self, limit: usize) -> StoreResult<Vec<RawRecord>> {
        Ok(self.fetch_records(limit)?)
    }

    fn append(&self, record: &RawRecord) -> StoreResult<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        let request = self.build_request(self.agent.post(&self.collection_url()));
        self.execute_with_retry(request, Some(&json))
            .map_err(StoreError::from)?;
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        let request = self.build_request(self.agent.delete(&self.collection_url()));
        self.execute_with_retry(request, None)
            .map_err(StoreError::from)?;
        Ok(())
    }

    // watch() stays Unsupported: this dialect's streaming endpoint is
    // server-sent events, which the blocking client has no business holding
    // open. Poll mode covers it.
}
