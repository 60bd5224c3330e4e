//! HTTP adapter for the external OR-Tools routing service.

use std::env;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;

use crate::error::TransportError;
use crate::traits::SolverTransport;

/// Default user agent for solver requests.
pub const DEFAULT_USER_AGENT: &str = concat!("vrp-dispatch/", env!("CARGO_PKG_VERSION"));

/// Route optimization is compute-heavy; the solver may hold the submission
/// open while it validates and queues the job.
const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 180;

/// Polling runs inside the caller's own request cycle.
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 10;

const DEFAULT_METADATA_TTL_SECS: u64 = 3600;

/// Endpoint layout exposed by the solver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SolverApi {
    /// `/ortools/optimize` and `/ortools/status/{job_id}`.
    #[default]
    Standard,
    /// `/ortools/optimize-async` and `/ortools/job-status/{job_id}`.
    Async,
}

impl SolverApi {
    pub const fn submit_path(&self) -> &'static str {
        match self {
            Self::Standard => "/ortools/optimize",
            Self::Async => "/ortools/optimize-async",
        }
    }

    pub fn status_path(&self, job_id: &str) -> String {
        match self {
            Self::Standard => format!("/ortools/status/{job_id}"),
            Self::Async => format!("/ortools/job-status/{job_id}"),
        }
    }

    pub const fn health_path(&self) -> &'static str {
        "/health"
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(Self::Standard),
            "async" => Some(Self::Async),
            _ => None,
        }
    }
}

/// Bounded retry for transport failures. The default makes a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub const fn fixed(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Timeouts, connection failures and 5xx responses may succeed on a
    /// second try; 4xx and undecodable bodies will not.
    pub fn is_retryable(error: &TransportError) -> bool {
        match error {
            TransportError::Timeout { .. } | TransportError::Network { .. } => true,
            TransportError::Status { status, .. } => *status >= 500,
            TransportError::Decode { .. } | TransportError::Encode { .. } => false,
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or
    /// the attempts run out.
    pub fn run<T, F>(&self, mut operation: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Result<T, TransportError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation() {
                Err(err) if attempt < attempts && Self::is_retryable(&err) => {
                    tracing::warn!(attempt, max_attempts = attempts, error = %err, "retrying solver request");
                    if !self.backoff.is_zero() {
                        std::thread::sleep(self.backoff);
                    }
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// Solver connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub base_url: String,
    pub api: SolverApi,
    pub submit_timeout: Duration,
    pub poll_timeout: Duration,
    pub metadata_ttl: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            api: SolverApi::Standard,
            submit_timeout: Duration::from_secs(DEFAULT_SUBMIT_TIMEOUT_SECS),
            poll_timeout: Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS),
            metadata_ttl: Duration::from_secs(DEFAULT_METADATA_TTL_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryPolicy::none(),
        }
    }
}

impl SolverConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Defaults overlaid with `VRP_SOLVER_URL`, `VRP_SOLVER_API`,
    /// `VRP_SOLVER_SUBMIT_TIMEOUT_SECS` and `VRP_SOLVER_POLL_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("VRP_SOLVER_URL") {
            config.base_url = url;
        }
        if let Some(raw) = lookup("VRP_SOLVER_API") {
            match SolverApi::parse(&raw) {
                Some(api) => config.api = api,
                None => tracing::warn!(value = %raw, "ignoring unknown VRP_SOLVER_API"),
            }
        }
        if let Some(secs) = secs_from(&lookup, "VRP_SOLVER_SUBMIT_TIMEOUT_SECS") {
            config.submit_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = secs_from(&lookup, "VRP_SOLVER_POLL_TIMEOUT_SECS") {
            config.poll_timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_api(mut self, api: SolverApi) -> Self {
        self.api = api;
        self
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_metadata_ttl(mut self, ttl: Duration) -> Self {
        self.metadata_ttl = ttl;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

fn secs_from(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(secs) => Some(secs),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable timeout");
            None
        }
    }
}

/// Blocking JSON client for the solver.
#[derive(Debug, Clone)]
pub struct HttpSolverClient {
    base_url: String,
    client: Client,
}

impl HttpSolverClient {
    pub fn new(config: &SolverConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(&config.user_agent).build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn execute(&self, request: RequestBuilder, url: &str, timeout: Duration) -> Result<Value, TransportError> {
        let response = request
            .timeout(timeout)
            .send()
            .map_err(|err| convert_reqwest_error(&err, url, timeout))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| convert_reqwest_error(&err, url, timeout))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|err| TransportError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })
    }
}

fn convert_reqwest_error(error: &reqwest::Error, url: &str, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout {
            url: url.to_string(),
            timeout_secs: timeout.as_secs(),
        };
    }

    if let Some(status) = error.status() {
        return TransportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: error.to_string(),
        };
    }

    TransportError::Network {
        url: url.to_string(),
        message: error.to_string(),
    }
}

impl SolverTransport for HttpSolverClient {
    fn post_json(&self, path: &str, body: &Value, timeout: Duration) -> Result<Value, TransportError> {
        let url = self.url(path);
        tracing::debug!(%url, timeout_secs = timeout.as_secs(), "POST to solver");
        self.execute(self.client.post(&url).json(body), &url, timeout)
    }

    fn get_json(&self, path: &str, timeout: Duration) -> Result<Value, TransportError> {
        let url = self.url(path);
        tracing::debug!(%url, timeout_secs = timeout.as_secs(), "GET from solver");
        self.execute(self.client.get(&url), &url, timeout)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = SolverConfig::default();
        assert_eq!(config.base_url, "http://localhost:5000");
        assert_eq!(config.submit_timeout, Duration::from_secs(180));
        assert_eq!(config.poll_timeout, Duration::from_secs(10));
        assert_eq!(config.metadata_ttl, Duration::from_secs(3600));
        assert_eq!(config.retry, RetryPolicy::none());
    }

    #[test]
    fn test_config_builder_pattern() {
        let config = SolverConfig::new("http://solver.example.com")
            .with_api(SolverApi::Async)
            .with_poll_timeout(Duration::from_secs(3))
            .with_user_agent("dispatch-test/1.0");

        assert_eq!(config.base_url, "http://solver.example.com");
        assert_eq!(config.api, SolverApi::Async);
        assert_eq!(config.poll_timeout, Duration::from_secs(3));
        assert_eq!(config.user_agent, "dispatch-test/1.0");
    }

    #[test]
    fn test_config_from_lookup() {
        let vars = HashMap::from([
            ("VRP_SOLVER_URL", "http://ortools:5000"),
            ("VRP_SOLVER_API", "ASYNC"),
            ("VRP_SOLVER_SUBMIT_TIMEOUT_SECS", "240"),
            ("VRP_SOLVER_POLL_TIMEOUT_SECS", "soon"),
        ]);
        let config = SolverConfig::from_lookup(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(config.base_url, "http://ortools:5000");
        assert_eq!(config.api, SolverApi::Async);
        assert_eq!(config.submit_timeout, Duration::from_secs(240));
        assert_eq!(config.poll_timeout, Duration::from_secs(10), "bad value keeps default");
    }

    #[test]
    fn test_api_paths() {
        assert_eq!(SolverApi::Standard.submit_path(), "/ortools/optimize");
        assert_eq!(SolverApi::Standard.status_path("abc"), "/ortools/status/abc");
        assert_eq!(SolverApi::Async.submit_path(), "/ortools/optimize-async");
        assert_eq!(SolverApi::Async.status_path("abc"), "/ortools/job-status/abc");
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = HttpSolverClient::new(&SolverConfig::new("http://solver.example.com/")).unwrap();
        assert_eq!(
            client.url("/ortools/optimize"),
            "http://solver.example.com/ortools/optimize"
        );
    }

    #[test]
    fn test_retry_none_makes_one_attempt() {
        let calls = Cell::new(0);
        let result: Result<(), _> = RetryPolicy::none().run(|| {
            calls.set(calls.get() + 1);
            Err(TransportError::Network {
                url: "http://solver".to_string(),
                message: "refused".to_string(),
            })
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_retry_fixed_recovers() {
        let calls = Cell::new(0);
        let result = RetryPolicy::fixed(3, Duration::ZERO).run(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(TransportError::Timeout {
                    url: "http://solver".to_string(),
                    timeout_secs: 10,
                })
            } else {
                Ok(42)
            }
        });

        assert_eq!(result, Ok(42));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_retry_skips_client_errors() {
        let calls = Cell::new(0);
        let result: Result<(), _> = RetryPolicy::fixed(5, Duration::ZERO).run(|| {
            calls.set(calls.get() + 1);
            Err(TransportError::Status {
                url: "http://solver".to_string(),
                status: 404,
                body: "Job not found".to_string(),
            })
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
