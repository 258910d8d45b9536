//! HTTP Control API
//!
//! Framework-agnostic handlers for controlling the simulator at runtime:
//! - read or generate vitals
//! - change mode, interval, identifiers and custom ranges
//! - start/stop the generation loop
//! - reconfigure and probe the delivery destinations
//!
//! Each `handle_*` function may block (engine locks, HTTP delivery); the axum
//! adapter in [`crate::server`] runs them on the blocking pool.

use crate::metrics::{self, MetricsSink};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use vitals_core::config::SimulatorConfig;
use vitals_core::delivery::DeliveryStatsSnapshot;
use vitals_core::engine::EngineStatsSnapshot;
use vitals_core::payload::generic_payload;
use vitals_core::{
    Broadcaster, ConditionMode, DeliveryClient, DeliveryResult, Destination, DestinationKind,
    EngineSnapshot, LoggingSink, SimulationEngine, Transport, ValidationError, VitalRange,
    VitalType, all_range_tables,
};

pub const SERVICE_NAME: &str = "BioHarness Vitals Simulator";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything the handlers operate on. The engine and broadcaster are
/// internally synchronised, so the state itself needs no outer lock.
pub struct AppState {
    pub engine: SimulationEngine,
    pub broadcaster: Arc<Broadcaster>,
    pub config: SimulatorConfig,
    started_at: Instant,
}

impl AppState {
    /// Wire the engine to its sinks: log line, metrics, then delivery.
    pub fn new(
        config: SimulatorConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ValidationError> {
        let client = DeliveryClient::new(transport, config.delivery_policy());
        let broadcaster = Arc::new(
            Broadcaster::new(client, config.destinations())
                .with_observer(Arc::new(metrics::record_delivery)),
        );

        let engine = SimulationEngine::new(config.engine_options())?;
        engine.add_sink(Arc::new(LoggingSink));
        engine.add_sink(Arc::new(MetricsSink));
        engine.add_sink(broadcaster.clone());

        Ok(Self {
            engine,
            broadcaster,
            config,
            started_at: Instant::now(),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Thread-safe handle to the simulator state
pub type SharedState = Arc<AppState>;

pub fn create_shared_state(
    config: SimulatorConfig,
    transport: Arc<dyn Transport>,
) -> Result<SharedState, ValidationError> {
    AppState::new(config, transport).map(Arc::new)
}

// ============================================================================
// API Request/Response Types
// ============================================================================

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
    /// HTTP status the adapter answers with.
    #[serde(skip)]
    pub status: u16,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: now_iso(),
            status: 200,
        }
    }

    pub fn error(msg: &str) -> Self {
        Self::failure(400, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::failure(404, msg)
    }

    pub fn internal(msg: &str) -> Self {
        Self::failure(500, msg)
    }

    fn failure(status: u16, msg: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.to_string()),
            timestamp: now_iso(),
            status,
        }
    }
}

impl<T> From<ValidationError> for ApiResponse<T> {
    fn from(err: ValidationError) -> Self {
        Self::error(&err.to_string())
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
    pub simulation_running: bool,
}

/// Latest or freshly generated vitals in the generic wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalsResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vital_signs: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationResponse {
    pub simulation: EngineSnapshot,
    pub destinations: Vec<Destination>,
    pub retry_delay_secs: u64,
    pub retry_on_status: bool,
    pub engine_stats: EngineStatsSnapshot,
    pub delivery_stats: DeliveryStatsSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationStatus {
    pub is_running: bool,
    pub current_mode: ConditionMode,
    pub interval_seconds: u64,
    pub patient_id: String,
    pub device_id: String,
    pub readings_generated: u64,
}

impl SimulationStatus {
    pub fn from_engine(engine: &SimulationEngine) -> Self {
        let snapshot = engine.snapshot();
        Self {
            is_running: snapshot.running,
            current_mode: snapshot.mode,
            interval_seconds: snapshot.interval_secs,
            patient_id: snapshot.patient_id,
            device_id: snapshot.device_id,
            readings_generated: snapshot.readings_generated,
        }
    }
}

/// Outcome of start/stop. `status` is `success`, `already_running` or
/// `not_running`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleResponse {
    pub status: String,
    pub message: String,
    pub is_running: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeRequest {
    pub mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalRequest {
    pub interval_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRequest {
    pub patient_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRequest {
    pub device_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomRangeRequest {
    pub vital_type: String,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomRangeResponse {
    pub vital_type: VitalType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<VitalRange>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DestinationUpdate {
    pub url: Option<String>,
    pub enabled: Option<bool>,
}

/// Results keyed by destination (`rule_engine`, `user_interface`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub connectivity_tests: BTreeMap<String, DeliveryResult>,
    pub tested_at: DateTime<Utc>,
}

// ============================================================================
// API Handler Functions (for integration with any HTTP framework)
// ============================================================================

/// Handle GET /api/health
pub fn handle_health(state: &SharedState) -> ApiResponse<HealthStatus> {
    ApiResponse::success(HealthStatus {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: SERVICE_VERSION.to_string(),
        uptime_secs: state.uptime_secs(),
        simulation_running: state.engine.is_running(),
    })
}

/// Handle GET /api/vitals/current
pub fn handle_current_vitals(state: &SharedState) -> ApiResponse<VitalsResponse> {
    let response = match state.engine.latest() {
        Some(reading) => VitalsResponse {
            status: "success".to_string(),
            vital_signs: Some(generic_payload(&reading)),
            message: None,
        },
        None => VitalsResponse {
            status: "no_data".to_string(),
            vital_signs: None,
            message: Some("No vital signs have been generated yet".to_string()),
        },
    };
    ApiResponse::success(response)
}

/// Handle GET /api/vitals/single - runs a full cycle, deliveries included
pub fn handle_single_vitals(state: &SharedState) -> ApiResponse<VitalsResponse> {
    let reading = state.engine.generate_once();
    ApiResponse::success(VitalsResponse {
        status: "success".to_string(),
        vital_signs: Some(generic_payload(&reading)),
        message: None,
    })
}

/// Handle GET /api/vitals/ranges
pub fn handle_ranges() -> ApiResponse<BTreeMap<&'static str, BTreeMap<VitalType, VitalRange>>> {
    ApiResponse::success(all_range_tables())
}

/// Handle GET /api/simulator/config
pub fn handle_get_config(state: &SharedState) -> ApiResponse<ConfigurationResponse> {
    let client = state.broadcaster.client();
    ApiResponse::success(ConfigurationResponse {
        simulation: state.engine.snapshot(),
        destinations: state.broadcaster.destinations(),
        retry_delay_secs: client.policy().retry_delay.as_secs(),
        retry_on_status: client.policy().retry_on_status,
        engine_stats: state.engine.stats(),
        delivery_stats: client.stats().snapshot(),
    })
}

/// Handle GET /api/simulator/status
pub fn handle_get_status(state: &SharedState) -> ApiResponse<SimulationStatus> {
    ApiResponse::success(SimulationStatus::from_engine(&state.engine))
}

/// Handle POST /api/simulator/mode
pub fn handle_set_mode(state: &SharedState, request: ModeRequest) -> ApiResponse<SimulationStatus> {
    let mode: ConditionMode = match request.mode.parse() {
        Ok(mode) => mode,
        Err(e) => {
            let valid: Vec<&str> = ConditionMode::ALL.iter().map(|m| m.as_str()).collect();
            return ApiResponse::error(&format!("{e}. Valid modes: {}", valid.join(", ")));
        }
    };
    state.engine.set_mode(mode);
    ApiResponse::success(SimulationStatus::from_engine(&state.engine))
}

/// Handle POST /api/simulator/interval
pub fn handle_set_interval(
    state: &SharedState,
    request: IntervalRequest,
) -> ApiResponse<SimulationStatus> {
    let seconds = match u64::try_from(request.interval_seconds) {
        Ok(seconds) => seconds,
        Err(_) => {
            return ApiResponse::error(&format!(
                "interval must be a positive integer (got {})",
                request.interval_seconds
            ));
        }
    };
    match state.engine.set_interval(seconds) {
        Ok(()) => ApiResponse::success(SimulationStatus::from_engine(&state.engine)),
        Err(e) => e.into(),
    }
}

/// Handle POST /api/simulator/start
pub fn handle_start(state: &SharedState) -> ApiResponse<LifecycleResponse> {
    let started = state.engine.start();
    let running = state.engine.is_running();
    metrics::set_running(running);

    let (status, message) = match (started, running) {
        (true, _) => ("success", "Continuous vital signs simulation started"),
        (false, true) => ("already_running", "Simulation is already running"),
        (false, false) => return ApiResponse::internal("Failed to start the generation loop"),
    };
    ApiResponse::success(LifecycleResponse {
        status: status.to_string(),
        message: message.to_string(),
        is_running: running,
    })
}

/// Handle POST /api/simulator/stop
pub fn handle_stop(state: &SharedState) -> ApiResponse<LifecycleResponse> {
    let stopped = state.engine.stop();
    metrics::set_running(false);

    let (status, message) = if stopped {
        ("success", "Continuous vital signs simulation stopped")
    } else {
        ("not_running", "Simulation was not running")
    };
    ApiResponse::success(LifecycleResponse {
        status: status.to_string(),
        message: message.to_string(),
        is_running: false,
    })
}

/// Handle POST /api/simulator/patient
pub fn handle_set_patient(
    state: &SharedState,
    request: PatientRequest,
) -> ApiResponse<SimulationStatus> {
    match state.engine.set_patient_id(&request.patient_id) {
        Ok(()) => ApiResponse::success(SimulationStatus::from_engine(&state.engine)),
        Err(e) => e.into(),
    }
}

/// Handle POST /api/simulator/device
pub fn handle_set_device(
    state: &SharedState,
    request: DeviceRequest,
) -> ApiResponse<SimulationStatus> {
    match state.engine.set_device_id(&request.device_id) {
        Ok(()) => ApiResponse::success(SimulationStatus::from_engine(&state.engine)),
        Err(e) => e.into(),
    }
}

fn parse_vital(name: &str) -> Result<VitalType, String> {
    name.parse::<VitalType>().map_err(|e| {
        let valid: Vec<&str> = VitalType::ALL.iter().map(|v| v.as_str()).collect();
        format!("{e}. Valid types: {}", valid.join(", "))
    })
}

/// Handle POST /api/vitals/custom-range
pub fn handle_set_custom_range(
    state: &SharedState,
    request: CustomRangeRequest,
) -> ApiResponse<CustomRangeResponse> {
    let vital = match parse_vital(&request.vital_type) {
        Ok(vital) => vital,
        Err(msg) => return ApiResponse::error(&msg),
    };
    let (Some(min), Some(max)) = (request.min_value, request.max_value) else {
        return ApiResponse::error("Both min_value and max_value are required");
    };

    match state.engine.set_override(vital, min, max) {
        Ok(range) => ApiResponse::success(CustomRangeResponse {
            vital_type: vital,
            range: Some(range),
            message: format!("Custom range set for {vital}"),
        }),
        Err(e) => e.into(),
    }
}

/// Handle DELETE /api/vitals/custom-range/{vital}
pub fn handle_clear_custom_range(
    state: &SharedState,
    vital_type: &str,
) -> ApiResponse<CustomRangeResponse> {
    let vital = match parse_vital(vital_type) {
        Ok(vital) => vital,
        Err(msg) => return ApiResponse::error(&msg),
    };

    if state.engine.clear_override(vital) {
        ApiResponse::success(CustomRangeResponse {
            vital_type: vital,
            range: None,
            message: format!("Custom range removed for {vital}"),
        })
    } else {
        ApiResponse::not_found(&format!("No custom range was set for {vital}"))
    }
}

/// Handle POST /api/destinations/{destination}
pub fn handle_update_destination(
    state: &SharedState,
    destination: &str,
    update: DestinationUpdate,
) -> ApiResponse<Destination> {
    let kind: DestinationKind = match destination.parse() {
        Ok(kind) => kind,
        Err(e) => return ApiResponse::not_found(&e.to_string()),
    };
    if update.url.is_none() && update.enabled.is_none() {
        return ApiResponse::error("Provide at least one of url or enabled");
    }

    if let Some(url) = &update.url {
        if let Err(e) = state.broadcaster.set_url(kind, url) {
            return e.into();
        }
    }
    if let Some(enabled) = update.enabled {
        if let Err(e) = state.broadcaster.set_enabled(kind, enabled) {
            return e.into();
        }
    }

    match state.broadcaster.destination(kind) {
        Some(destination) => ApiResponse::success(destination),
        None => ApiResponse::not_found(&format!("destination '{kind}' is not configured")),
    }
}

/// Handle POST /api/connectivity/test
pub fn handle_connectivity_test(state: &SharedState) -> ApiResponse<ConnectivityReport> {
    let destinations = state.broadcaster.destinations();
    let results = state.broadcaster.connectivity_test();

    let connectivity_tests = destinations
        .into_iter()
        .zip(results)
        .map(|(destination, result)| (destination.kind.as_str().to_string(), result))
        .collect();

    ApiResponse::success(ConnectivityReport {
        connectivity_tests,
        tested_at: Utc::now(),
    })
}

// ============================================================================
// API Documentation
// ============================================================================

/// API routes definition for documentation/integration
pub fn get_api_routes() -> Vec<(&'static str, &'static str, &'static str)> {
    vec![
        ("GET", "/api/health", "Service health"),
        ("GET", "/api/vitals/current", "Most recent reading"),
        ("GET", "/api/vitals/single", "Generate and deliver one reading"),
        ("GET", "/api/vitals/ranges", "Static range tables"),
        ("GET", "/api/simulator/config", "Engine and destination configuration"),
        ("GET", "/api/simulator/status", "Running flag, mode, interval"),
        ("POST", "/api/simulator/mode", "Set mode {mode}"),
        ("POST", "/api/simulator/interval", "Set interval {interval_seconds}"),
        ("POST", "/api/simulator/start", "Start continuous simulation"),
        ("POST", "/api/simulator/stop", "Stop continuous simulation"),
        ("POST", "/api/simulator/patient", "Set patient {patient_id}"),
        ("POST", "/api/simulator/device", "Set device {device_id}"),
        ("POST", "/api/vitals/custom-range", "Set custom range"),
        ("DELETE", "/api/vitals/custom-range/{vital}", "Remove custom range"),
        ("POST", "/api/destinations/{name}", "Update destination {url, enabled}"),
        ("POST", "/api/connectivity/test", "Probe every destination"),
        ("GET", "/metrics", "Prometheus metrics"),
    ]
}
