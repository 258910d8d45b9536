//! Delivery Client - HTTP POST with bounded retries
//!
//! Pushes one JSON payload to one destination. Network-level failures are
//! retried with a fixed delay; a non-success HTTP status ends the delivery
//! immediately unless [`DeliveryPolicy::retry_on_status`] is set.

use crate::error::TransportError;
use crate::reading::DeliveryResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

pub const USER_AGENT: &str = "BioHarness-Vitals-Simulator/1.0";
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Statuses accepted as a successful delivery.
pub const SUCCESS_STATUSES: [u16; 3] = [200, 201, 202];

/// Raw outcome of one POST that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// One blocking POST of a JSON body.
pub trait Transport: Send + Sync {
    fn post_json(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}

// ============================================================================
// reqwest transport
// ============================================================================

/// Blocking reqwest client. Construct it outside any async runtime.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .map_err(|e| classify(e, url, timeout))?;

        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        Ok(TransportResponse { status, body })
    }
}

fn classify(error: reqwest::Error, url: &str, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else if error.is_connect() {
        TransportError::Connect(url.to_string())
    } else {
        TransportError::Request(error.to_string())
    }
}

// ============================================================================
// Retry policy and stats
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPolicy {
    /// Fixed pause between attempts (not after the last).
    pub retry_delay: Duration,
    /// Treat a non-success HTTP status like a network failure and retry it.
    pub retry_on_status: bool,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            retry_on_status: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct DeliveryStats {
    pub sent: AtomicU64,
    pub failed: AtomicU64,
    pub retried: AtomicU64,
}

/// Plain copy of [`DeliveryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStatsSnapshot {
    pub sent: u64,
    pub failed: u64,
    pub retried: u64,
}

impl DeliveryStats {
    pub fn snapshot(&self) -> DeliveryStatsSnapshot {
        DeliveryStatsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Sends payloads through a [`Transport`] with bounded retries.
#[derive(Clone)]
pub struct DeliveryClient {
    transport: Arc<dyn Transport>,
    policy: DeliveryPolicy,
    stats: Arc<DeliveryStats>,
}

impl DeliveryClient {
    pub fn new(transport: Arc<dyn Transport>, policy: DeliveryPolicy) -> Self {
        Self {
            transport,
            policy,
            stats: Arc::new(DeliveryStats::default()),
        }
    }

    pub fn policy(&self) -> &DeliveryPolicy {
        &self.policy
    }

    pub fn stats(&self) -> &DeliveryStats {
        &self.stats
    }

    /// Deliver `payload` to `url`, making at most `max_attempts` attempts.
    ///
    /// Returns exactly one result, whatever the number of attempts.
    pub fn send(
        &self,
        destination: &str,
        url: &str,
        payload: &Value,
        timeout: Duration,
        max_attempts: u32,
    ) -> DeliveryResult {
        let max_attempts = max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.transport.post_json(url, payload, timeout) {
                Ok(response) if SUCCESS_STATUSES.contains(&response.status) => {
                    self.stats.sent.fetch_add(1, Ordering::Relaxed);
                    debug!(destination, attempt, status = response.status, "Delivered payload");
                    return DeliveryResult::delivered(destination, response.status, attempt);
                }
                Ok(response) => {
                    let error = format!("HTTP {}: {}", response.status, response.body);
                    warn!(
                        destination,
                        attempt,
                        status = response.status,
                        "Destination returned error"
                    );
                    if !self.policy.retry_on_status {
                        self.stats.failed.fetch_add(1, Ordering::Relaxed);
                        return DeliveryResult::failed(
                            destination,
                            error,
                            Some(response.status),
                            attempt,
                        );
                    }
                    last_error = error;
                }
                Err(e) => {
                    warn!(destination, attempt, error = %e, "Delivery attempt failed");
                    last_error = e.to_string();
                }
            }

            if attempt < max_attempts {
                self.stats.retried.fetch_add(1, Ordering::Relaxed);
                std::thread::sleep(self.policy.retry_delay);
            }
        }

        self.stats.failed.fetch_add(1, Ordering::Relaxed);
        DeliveryResult::failed(
            destination,
            format!("Failed after {max_attempts} attempts. Last error: {last_error}"),
            None,
            max_attempts,
        )
    }
}

/// Scripted in-memory transport for tests.
#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// One scripted outcome.
    #[derive(Debug, Clone)]
    pub enum Scripted {
        Status(u16),
        Timeout,
        Refused,
    }

    /// Replays scripted outcomes per URL and records every request.
    /// A URL with an exhausted script answers 200.
    #[derive(Default)]
    pub struct ScriptedTransport {
        scripts: Mutex<Vec<(String, VecDeque<Scripted>)>>,
        requests: Mutex<Vec<(String, Value)>>,
        latency: Duration,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_latency(latency: Duration) -> Self {
            Self {
                latency,
                ..Self::default()
            }
        }

        pub fn script(&self, url: &str, outcomes: impl IntoIterator<Item = Scripted>) {
            let mut scripts = self.scripts.lock().unwrap();
            scripts.push((url.to_string(), outcomes.into_iter().collect()));
        }

        pub fn requests(&self) -> Vec<(String, Value)> {
            self.requests.lock().unwrap().clone()
        }

        pub fn requests_to(&self, url: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|(u, _)| u == url)
                .count()
        }
    }

    impl Transport for ScriptedTransport {
        fn post_json(
            &self,
            url: &str,
            body: &Value,
            timeout: Duration,
        ) -> Result<TransportResponse, TransportError> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), body.clone()));
            if !self.latency.is_zero() {
                std::thread::sleep(self.latency);
            }

            let next = {
                let mut scripts = self.scripts.lock().unwrap();
                scripts
                    .iter_mut()
                    .find(|(u, _)| u == url)
                    .and_then(|(_, queue)| queue.pop_front())
            };

            match next.unwrap_or(Scripted::Status(200)) {
                Scripted::Status(status) => Ok(TransportResponse {
                    status,
                    body: format!("status {status}"),
                }),
                Scripted::Timeout => Err(TransportError::Timeout(timeout)),
                Scripted::Refused => Err(TransportError::Connect(url.to_string())),
            }
        }
    }
}
