//! Broadcaster - fan a reading out to every enabled destination
//!
//! Each destination is delivered independently through the shared
//! [`DeliveryClient`]. Deliveries run concurrently on scoped threads; results
//! come back in destination order.

use crate::delivery::DeliveryClient;
use crate::error::{SinkError, ValidationError};
use crate::payload::{PayloadFormat, connectivity_test_payload};
use crate::reading::{DeliveryResult, Reading};
use crate::sink::Sink;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

/// The two downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    RuleEngine,
    UserInterface,
}

impl DestinationKind {
    pub const ALL: [DestinationKind; 2] =
        [DestinationKind::RuleEngine, DestinationKind::UserInterface];

    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::RuleEngine => "rule_engine",
            DestinationKind::UserInterface => "user_interface",
        }
    }

    /// Name used in delivery results and logs.
    pub fn display_name(&self) -> &'static str {
        match self {
            DestinationKind::RuleEngine => "Rule Engine",
            DestinationKind::UserInterface => "User Interface",
        }
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rule_engine" => Ok(DestinationKind::RuleEngine),
            "user_interface" | "ui" => Ok(DestinationKind::UserInterface),
            other => Err(ValidationError::UnknownDestination(other.to_string())),
        }
    }
}

/// A configured delivery target, mutable at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub kind: DestinationKind,
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub format: PayloadFormat,
}

impl Destination {
    pub fn new(kind: DestinationKind, url: impl Into<String>) -> Self {
        let format = match kind {
            DestinationKind::RuleEngine => PayloadFormat::RuleEngine,
            DestinationKind::UserInterface => PayloadFormat::Generic,
        };
        Self {
            kind,
            name: kind.display_name().to_string(),
            url: url.into(),
            enabled: true,
            timeout_secs: 5,
            max_attempts: 3,
            format,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Reject anything that is not an absolute http(s) URL.
pub fn validate_url(url: &str) -> Result<(), ValidationError> {
    if url.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "url" });
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ValidationError::InvalidField {
            field: "url",
            reason: format!("'{url}' is not an http(s) URL"),
        });
    }
    Ok(())
}

/// `base` + `path` with exactly one slash between them.
pub fn join_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

/// Called once per delivery result (metrics hooks and the like).
pub type ResultObserver = Arc<dyn Fn(&DeliveryResult) + Send + Sync>;

pub struct Broadcaster {
    client: DeliveryClient,
    destinations: Mutex<Vec<Destination>>,
    observer: Option<ResultObserver>,
}

impl Broadcaster {
    pub fn new(client: DeliveryClient, destinations: Vec<Destination>) -> Self {
        Self {
            client,
            destinations: Mutex::new(destinations),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: ResultObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn client(&self) -> &DeliveryClient {
        &self.client
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Destination>> {
        self.destinations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn destinations(&self) -> Vec<Destination> {
        self.lock().clone()
    }

    pub fn destination(&self, kind: DestinationKind) -> Option<Destination> {
        self.lock().iter().find(|d| d.kind == kind).cloned()
    }

    fn update(
        &self,
        kind: DestinationKind,
        apply: impl FnOnce(&mut Destination),
    ) -> Result<Destination, ValidationError> {
        let mut destinations = self.lock();
        let destination = destinations
            .iter_mut()
            .find(|d| d.kind == kind)
            .ok_or_else(|| ValidationError::UnknownDestination(kind.to_string()))?;
        apply(destination);
        Ok(destination.clone())
    }

    pub fn set_url(
        &self,
        kind: DestinationKind,
        url: &str,
    ) -> Result<Destination, ValidationError> {
        validate_url(url)?;
        let updated = self.update(kind, |d| d.url = url.to_string())?;
        info!(destination = %kind, url, "Destination URL updated");
        Ok(updated)
    }

    pub fn set_enabled(
        &self,
        kind: DestinationKind,
        enabled: bool,
    ) -> Result<Destination, ValidationError> {
        let updated = self.update(kind, |d| d.enabled = enabled)?;
        info!(destination = %kind, enabled, "Destination toggled");
        Ok(updated)
    }

    pub fn set_rule_engine_endpoint(
        &self,
        base_url: &str,
        path: &str,
    ) -> Result<Destination, ValidationError> {
        self.set_url(DestinationKind::RuleEngine, &join_endpoint(base_url, path))
    }

    /// Deliver `reading` to every enabled destination.
    pub fn dispatch(&self, reading: &Reading) -> Vec<DeliveryResult> {
        let targets: Vec<(Destination, Value)> = self
            .destinations()
            .into_iter()
            .filter(|d| d.enabled)
            .map(|d| {
                let body = d.format.render(reading);
                (d, body)
            })
            .collect();

        self.deliver_all(&targets, None)
    }

    /// Probe every destination once, enabled or not.
    pub fn connectivity_test(&self) -> Vec<DeliveryResult> {
        let body = connectivity_test_payload();
        let targets: Vec<(Destination, Value)> = self
            .destinations()
            .into_iter()
            .map(|d| (d, body.clone()))
            .collect();

        self.deliver_all(&targets, Some(1))
    }

    fn deliver_all(
        &self,
        targets: &[(Destination, Value)],
        attempts: Option<u32>,
    ) -> Vec<DeliveryResult> {
        let deliver = |(destination, body): &(Destination, Value)| {
            let result = self.client.send(
                &destination.name,
                &destination.url,
                body,
                destination.timeout(),
                attempts.unwrap_or(destination.max_attempts),
            );
            if let Some(observer) = &self.observer {
                observer(&result);
            }
            result
        };

        if targets.len() <= 1 {
            return targets.iter().map(deliver).collect();
        }

        std::thread::scope(|scope| {
            let handles: Vec<_> = targets
                .iter()
                .map(|target| (target, scope.spawn(move || deliver(target))))
                .collect();

            handles
                .into_iter()
                .map(|(target, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        DeliveryResult::failed(&target.0.name, "delivery thread panicked", None, 0)
                    })
                })
                .collect()
        })
    }
}

impl Sink for Broadcaster {
    fn name(&self) -> &str {
        "broadcaster"
    }

    fn accept(&self, reading: &Reading) -> Result<(), SinkError> {
        for result in self.dispatch(reading) {
            if result.success {
                info!(
                    destination = %result.destination,
                    sequence = reading.sequence(),
                    status = result.status_code,
                    attempts = result.attempts,
                    "Delivered reading"
                );
            } else {
                warn!(
                    destination = %result.destination,
                    sequence = reading.sequence(),
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "Delivery failed"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryPolicy;
    use crate::delivery::testing::{Scripted, ScriptedTransport};
    use crate::reading::VitalValues;
    use crate::vitals::ConditionMode;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    const RULES: &str = "http://rules.test/api/vitals/stream";
    const UI: &str = "http://ui.test/api/vitals/update";

    fn broadcaster(transport: Arc<ScriptedTransport>) -> Broadcaster {
        let client = DeliveryClient::new(
            transport,
            DeliveryPolicy {
                retry_delay: Duration::ZERO,
                retry_on_status: false,
            },
        );
        Broadcaster::new(
            client,
            vec![
                Destination::new(DestinationKind::RuleEngine, RULES),
                Destination::new(DestinationKind::UserInterface, UI).with_timeout(3),
            ],
        )
    }

    fn reading() -> Reading {
        Reading::new(
            1,
            Utc::now(),
            VitalValues::default(),
            ConditionMode::Normal,
            "BioHarness_Sim_001",
            "patient_001",
        )
    }

    #[test]
    fn test_dispatch_keeps_destination_order() {
        let transport = Arc::new(ScriptedTransport::new());
        let results = broadcaster(transport.clone()).dispatch(&reading());

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].destination, "Rule Engine");
        assert_eq!(results[1].destination, "User Interface");
        assert!(results.iter().all(|r| r.success));

        let requests = transport.requests();
        let rules_body = &requests.iter().find(|(u, _)| u == RULES).unwrap().1;
        let ui_body = &requests.iter().find(|(u, _)| u == UI).unwrap().1;
        assert!(rules_body.get("readings").is_some());
        assert!(ui_body.get("vitals").is_some());
    }

    #[test]
    fn test_failure_is_isolated_per_destination() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(RULES, [Scripted::Status(500)]);
        let results = broadcaster(transport).dispatch(&reading());

        assert!(!results[0].success);
        assert_eq!(results[0].status_code, Some(500));
        assert!(results[1].success);
    }

    #[test]
    fn test_disabled_destination_is_skipped() {
        let transport = Arc::new(ScriptedTransport::new());
        let broadcaster = broadcaster(transport.clone());
        broadcaster
            .set_enabled(DestinationKind::RuleEngine, false)
            .unwrap();

        let results = broadcaster.dispatch(&reading());

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].destination, "User Interface");
        assert_eq!(transport.requests_to(RULES), 0);
    }

    #[test]
    fn test_destinations_deliver_concurrently() {
        let transport = Arc::new(ScriptedTransport::with_latency(Duration::from_millis(150)));
        let broadcaster = broadcaster(transport);

        let started = Instant::now();
        let results = broadcaster.dispatch(&reading());

        assert_eq!(results.len(), 2);
        assert!(started.elapsed() < Duration::from_millis(290));
    }

    #[test]
    fn test_url_change_applies_to_next_dispatch() {
        let transport = Arc::new(ScriptedTransport::new());
        let broadcaster = broadcaster(transport.clone());

        broadcaster
            .set_rule_engine_endpoint("http://other.test:3000/", "/api/vitals/stream")
            .unwrap();
        broadcaster.dispatch(&reading());

        assert_eq!(transport.requests_to("http://other.test:3000/api/vitals/stream"), 1);
        assert_eq!(transport.requests_to(RULES), 0);
    }

    #[test]
    fn test_invalid_url_rejected() {
        let broadcaster = broadcaster(Arc::new(ScriptedTransport::new()));
        assert!(broadcaster.set_url(DestinationKind::UserInterface, "").is_err());
        assert!(
            broadcaster
                .set_url(DestinationKind::UserInterface, "ftp://ui.test")
                .is_err()
        );
        assert_eq!(
            broadcaster.destination(DestinationKind::UserInterface).unwrap().url,
            UI
        );
    }

    #[test]
    fn test_connectivity_test_probes_disabled_destinations_once() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(UI, [Scripted::Refused, Scripted::Status(200)]);
        let broadcaster = broadcaster(transport.clone());
        broadcaster
            .set_enabled(DestinationKind::RuleEngine, false)
            .unwrap();

        let results = broadcaster.connectivity_test();

        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert_eq!(results[1].attempts, 1);
        assert_eq!(transport.requests_to(UI), 1);
        let body = &transport.requests()[0].1;
        assert_eq!(body["test"], true);
    }

    #[test]
    fn test_observer_sees_every_result() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let broadcaster = broadcaster(Arc::new(ScriptedTransport::new())).with_observer(Arc::new(
            move |_: &DeliveryResult| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        ));

        broadcaster.accept(&reading()).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_destination_kind_parsing() {
        assert_eq!(
            "rule_engine".parse::<DestinationKind>().unwrap(),
            DestinationKind::RuleEngine
        );
        assert_eq!(
            "user_interface".parse::<DestinationKind>().unwrap(),
            DestinationKind::UserInterface
        );
        assert!("pager".parse::<DestinationKind>().is_err());
        assert_eq!(join_endpoint("http://a/", "b"), "http://a/b");
    }
}
