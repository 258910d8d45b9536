//! Simulation Engine
//!
//! Drives the generation cycle, on a timer or on demand, and fans each new
//! reading out to the registered sinks.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    SimulationEngine                      │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐  │
//! │  │    State     │   │  Generator   │   │    Sinks     │  │
//! │  │  (mutex)     │──▶│  (per vital) │──▶│  (RwLock,    │  │
//! │  │ mode/ids/... │   │              │   │   copied)    │  │
//! │  └──────────────┘   └──────────────┘   └──────────────┘  │
//! │          ▲                                     │         │
//! │          │        vitals-generator thread      ▼         │
//! │          └──── running flag + epoch ──── Broadcaster ... │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The state mutex is held only while sampling and storing the reading.
//! Sinks run after it is released, so a slow delivery never blocks the
//! setters or `latest()`.

use crate::error::{SinkError, ValidationError};
use crate::generator::ValueGenerator;
use crate::reading::{Reading, VitalValues};
use crate::sink::{Sink, SinkId};
use crate::vitals::{ConditionMode, VitalRange, VitalType};
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const MIN_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_PATIENT_ID: &str = "patient_001";
pub const DEFAULT_DEVICE_ID: &str = "BioHarness_Sim_001";

/// Pause after a generation cycle that failed as a whole.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(1);

const WORKER_THREAD_NAME: &str = "vitals-generator";

/// Engine liveness state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Running,
}

/// Construction options
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub mode: ConditionMode,
    pub interval_secs: u64,
    pub patient_id: String,
    pub device_id: String,
    /// Attach sampled quality score and signal strength to every reading.
    pub quality_indicators: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            mode: ConditionMode::Normal,
            interval_secs: DEFAULT_INTERVAL_SECS,
            patient_id: DEFAULT_PATIENT_ID.to_string(),
            device_id: DEFAULT_DEVICE_ID.to_string(),
            quality_indicators: false,
        }
    }
}

/// Mutable engine state, guarded by one mutex.
struct State {
    mode: ConditionMode,
    interval_secs: u64,
    patient_id: String,
    device_id: String,
    quality_indicators: bool,
    generator: ValueGenerator,
    latest: Option<Reading>,
    readings_generated: u64,
}

/// Read-only copy of the engine state.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub state: EngineState,
    pub running: bool,
    pub mode: ConditionMode,
    pub interval_secs: u64,
    pub patient_id: String,
    pub device_id: String,
    pub custom_ranges: BTreeMap<VitalType, VitalRange>,
    pub latest: Option<Reading>,
    pub readings_generated: u64,
}

/// Engine statistics
#[derive(Debug, Default)]
pub struct EngineStats {
    pub cycles: AtomicU64,
    pub cycle_failures: AtomicU64,
    pub sink_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStatsSnapshot {
    pub cycles: u64,
    pub cycle_failures: u64,
    pub sink_failures: u64,
}

impl EngineStats {
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            cycle_failures: self.cycle_failures.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}

struct Inner {
    state: Mutex<State>,
    running: AtomicBool,
    /// Bumped on every start; a worker exits once its epoch is stale.
    epoch: AtomicU64,
    sinks: RwLock<Vec<(SinkId, Arc<dyn Sink>)>>,
    next_sink_id: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
    stats: EngineStats,
    /// Multiplier applied to every sleep of the worker loop.
    time_scale: f64,
}

/// Cheap to clone; clones share the same engine.
#[derive(Clone)]
pub struct SimulationEngine {
    inner: Arc<Inner>,
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::build(EngineOptions::default(), 1.0)
    }
}

impl SimulationEngine {
    /// Create an idle engine.
    ///
    /// Rejects an interval below [`MIN_INTERVAL_SECS`] and blank identifiers
    /// with the same errors as the matching setters.
    pub fn new(options: EngineOptions) -> Result<Self, ValidationError> {
        Self::validated(options, 1.0)
    }

    /// Like [`SimulationEngine::new`], with every worker sleep multiplied by
    /// `time_scale` so test suites can run many ticks quickly.
    #[cfg(any(test, feature = "testing"))]
    pub fn with_time_scale(
        options: EngineOptions,
        time_scale: f64,
    ) -> Result<Self, ValidationError> {
        Self::validated(options, time_scale)
    }

    fn validated(mut options: EngineOptions, time_scale: f64) -> Result<Self, ValidationError> {
        if options.interval_secs < MIN_INTERVAL_SECS {
            return Err(ValidationError::IntervalTooShort {
                got: options.interval_secs,
                min: MIN_INTERVAL_SECS,
            });
        }
        options.patient_id = non_empty(&options.patient_id, "patient_id")?.to_string();
        options.device_id = non_empty(&options.device_id, "device_id")?.to_string();
        Ok(Self::build(options, time_scale))
    }

    fn build(options: EngineOptions, time_scale: f64) -> Self {
        let state = State {
            mode: options.mode,
            interval_secs: options.interval_secs,
            patient_id: options.patient_id,
            device_id: options.device_id,
            quality_indicators: options.quality_indicators,
            generator: ValueGenerator::new(),
            latest: None,
            readings_generated: 0,
        };

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                running: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                sinks: RwLock::new(Vec::new()),
                next_sink_id: AtomicU64::new(1),
                worker: Mutex::new(None),
                stats: EngineStats::default(),
                time_scale: if time_scale.is_finite() && time_scale > 0.0 {
                    time_scale
                } else {
                    1.0
                },
            }),
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    pub fn set_mode(&self, mode: ConditionMode) {
        let previous = std::mem::replace(&mut self.inner.state().mode, mode);
        info!(from = %previous, to = %mode, "Simulation mode changed");
    }

    /// Takes effect on the next tick; a sleep already in progress completes.
    pub fn set_interval(&self, seconds: u64) -> Result<(), ValidationError> {
        if seconds < MIN_INTERVAL_SECS {
            return Err(ValidationError::IntervalTooShort {
                got: seconds,
                min: MIN_INTERVAL_SECS,
            });
        }
        self.inner.state().interval_secs = seconds;
        info!(interval_secs = seconds, "Generation interval changed");
        Ok(())
    }

    pub fn set_patient_id(&self, patient_id: &str) -> Result<(), ValidationError> {
        let patient_id = non_empty(patient_id, "patient_id")?;
        self.inner.state().patient_id = patient_id.to_string();
        info!(patient_id, "Patient ID changed");
        Ok(())
    }

    pub fn set_device_id(&self, device_id: &str) -> Result<(), ValidationError> {
        let device_id = non_empty(device_id, "device_id")?;
        self.inner.state().device_id = device_id.to_string();
        info!(device_id, "Device ID changed");
        Ok(())
    }

    pub fn set_override(
        &self,
        vital: VitalType,
        min: f64,
        max: f64,
    ) -> Result<VitalRange, ValidationError> {
        let range = self.inner.state().generator.set_override(vital, min, max)?;
        info!(vital = %vital, min, max, "Custom range set");
        Ok(range)
    }

    pub fn clear_override(&self, vital: VitalType) -> bool {
        let cleared = self.inner.state().generator.clear_override(vital);
        if cleared {
            info!(vital = %vital, "Custom range cleared");
        }
        cleared
    }

    pub fn clear_overrides(&self) {
        self.inner.state().generator.clear_overrides();
        info!("All custom ranges cleared");
    }

    // ========================================================================
    // Generation
    // ========================================================================

    /// Run one generation cycle and notify every sink.
    pub fn generate_once(&self) -> Reading {
        self.inner.generate_once()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Idle → Running. Returns false if already running or the worker could
    /// not be spawned.
    pub fn start(&self) -> bool {
        // Starts are serialized on the worker slot. The epoch moves before the
        // running flag so a stale worker never sees its own epoch as current.
        let mut worker = self.inner.worker();
        if self.inner.running.load(Ordering::SeqCst) {
            return false;
        }
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.running.store(true, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);

        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || inner.run_loop(epoch));

        match spawned {
            Ok(handle) => {
                // A previous worker may still be finishing its sleep; it exits
                // on its own once it sees the new epoch.
                *worker = Some(handle);
                drop(worker);
                let snapshot = self.snapshot();
                info!(
                    mode = %snapshot.mode,
                    interval_secs = snapshot.interval_secs,
                    patient_id = %snapshot.patient_id,
                    "Simulation started"
                );
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to spawn generation thread");
                self.inner.running.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// Running → Idle. Cooperative: the worker notices at its next iteration.
    pub fn stop(&self) -> bool {
        let was_running = self.inner.running.swap(false, Ordering::SeqCst);
        if was_running {
            info!("Simulation stopped");
        }
        was_running
    }

    /// Stop and wait for the current worker to exit.
    pub fn shutdown(&self) {
        self.stop();
        let handle = self.inner.worker().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Generation thread exited with a panic");
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn latest(&self) -> Option<Reading> {
        self.inner.state().latest.clone()
    }

    pub fn mode(&self) -> ConditionMode {
        self.inner.state().mode
    }

    pub fn interval_secs(&self) -> u64 {
        self.inner.state().interval_secs
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let running = self.is_running();
        let state = self.inner.state();
        EngineSnapshot {
            state: if running { EngineState::Running } else { EngineState::Idle },
            running,
            mode: state.mode,
            interval_secs: state.interval_secs,
            patient_id: state.patient_id.clone(),
            device_id: state.device_id.clone(),
            custom_ranges: state.generator.overrides(),
            latest: state.latest.clone(),
            readings_generated: state.readings_generated,
        }
    }

    pub fn stats(&self) -> EngineStatsSnapshot {
        self.inner.stats.snapshot()
    }

    // ========================================================================
    // Sinks
    // ========================================================================

    pub fn add_sink(&self, sink: Arc<dyn Sink>) -> SinkId {
        let id = SinkId(self.inner.next_sink_id.fetch_add(1, Ordering::Relaxed));
        debug!(sink = sink.name(), id = id.0, "Sink registered");
        self.inner
            .sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, sink));
        id
    }

    pub fn remove_sink(&self, id: SinkId) -> bool {
        let mut sinks = self.inner.sinks.write().unwrap_or_else(PoisonError::into_inner);
        let before = sinks.len();
        sinks.retain(|(sink_id, _)| *sink_id != id);
        sinks.len() != before
    }

    pub fn sink_count(&self) -> usize {
        self.inner.sinks.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn scaled(&self, duration: Duration) -> Duration {
        duration.mul_f64(self.time_scale)
    }

    fn generate_once(&self) -> Reading {
        let reading = {
            let mut state = self.state();
            let mode = state.mode;
            let vitals = VitalValues::from_fn(|vital| state.generator.sample(vital, mode));
            let sequence = state.readings_generated + 1;

            let mut reading = Reading::new(
                sequence,
                Utc::now(),
                vitals,
                mode,
                state.device_id.clone(),
                state.patient_id.clone(),
            );
            if state.quality_indicators {
                let (score, strength) = sample_quality(&mut rand::rng());
                reading = reading.with_quality(score, strength);
            }

            state.readings_generated = sequence;
            state.latest = Some(reading.clone());
            reading
        };

        self.stats.cycles.fetch_add(1, Ordering::Relaxed);
        self.notify(&reading);
        reading
    }

    fn notify(&self, reading: &Reading) {
        let sinks: Vec<Arc<dyn Sink>> = self
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, sink)| Arc::clone(sink))
            .collect();

        for sink in sinks {
            let outcome = catch_unwind(AssertUnwindSafe(|| sink.accept(reading)))
                .unwrap_or_else(|panic| {
                    Err(SinkError::Panicked {
                        sink: sink.name().to_string(),
                        message: panic_message(panic.as_ref()),
                    })
                });

            if let Err(e) = outcome {
                self.stats.sink_failures.fetch_add(1, Ordering::Relaxed);
                warn!(sink = sink.name(), sequence = reading.sequence(), error = %e, "Sink failed");
            }
        }
    }

    fn run_loop(&self, epoch: u64) {
        debug!(epoch, "Generation loop started");

        while self.is_current(epoch) {
            let pause = match catch_unwind(AssertUnwindSafe(|| self.generate_once())) {
                Ok(_) => Duration::from_secs(self.state().interval_secs),
                Err(panic) => {
                    self.stats.cycle_failures.fetch_add(1, Ordering::Relaxed);
                    error!(error = %panic_message(panic.as_ref()), "Generation cycle failed");
                    ERROR_BACKOFF
                }
            };
            thread::sleep(self.scaled(pause));
        }

        debug!(epoch, "Generation loop exited");
    }
}

fn non_empty<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyField { field })
    } else {
        Ok(trimmed)
    }
}

/// Quality score in [0.90, 1.00] (two decimals) and signal strength in [85, 100].
fn sample_quality<R: Rng + ?Sized>(rng: &mut R) -> (f64, u8) {
    let score = (rng.random_range(0.90..=1.0_f64) * 100.0).round() / 100.0;
    (score, rng.random_range(85..=100))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn scaled_engine(interval_secs: u64) -> SimulationEngine {
        let options = EngineOptions {
            interval_secs,
            ..EngineOptions::default()
        };
        SimulationEngine::with_time_scale(options, 0.01).unwrap()
    }

    fn fast_engine() -> SimulationEngine {
        scaled_engine(1)
    }

    fn wait_until(timeout: Duration, check: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        check()
    }

    #[test]
    fn test_initial_state() {
        let engine = SimulationEngine::default();
        let snapshot = engine.snapshot();

        assert_eq!(snapshot.state, EngineState::Idle);
        assert_eq!(snapshot.mode, ConditionMode::Normal);
        assert_eq!(snapshot.interval_secs, 10);
        assert_eq!(snapshot.patient_id, "patient_001");
        assert_eq!(snapshot.device_id, "BioHarness_Sim_001");
        assert!(snapshot.latest.is_none());
        assert!(engine.latest().is_none());
    }

    #[test]
    fn test_generate_once_stores_latest() {
        let engine = SimulationEngine::default();
        engine.set_mode(ConditionMode::Emergency);
        engine.set_patient_id("patient_042").unwrap();

        let first = engine.generate_once();
        let second = engine.generate_once();

        assert_eq!(first.sequence(), 1);
        assert_eq!(second.sequence(), 2);
        assert_eq!(second.mode(), ConditionMode::Emergency);
        assert_eq!(second.patient_id(), "patient_042");
        assert_eq!(engine.latest(), Some(second));
        assert_eq!(engine.snapshot().readings_generated, 2);
    }

    #[test]
    fn test_interval_validation() {
        let engine = SimulationEngine::default();
        assert_eq!(
            engine.set_interval(0),
            Err(ValidationError::IntervalTooShort { got: 0, min: 1 })
        );
        assert_eq!(engine.interval_secs(), 10);
        engine.set_interval(1).unwrap();
        assert_eq!(engine.interval_secs(), 1);
    }

    #[test]
    fn test_empty_identifiers_rejected() {
        let engine = SimulationEngine::default();
        assert!(engine.set_patient_id("  ").is_err());
        assert!(engine.set_device_id("").is_err());
        assert_eq!(engine.snapshot().patient_id, DEFAULT_PATIENT_ID);
    }

    #[test]
    fn test_override_applies_to_generation() {
        let engine = SimulationEngine::default();
        engine.set_override(VitalType::HeartRate, 120.0, 125.0).unwrap();

        for _ in 0..50 {
            let v = engine.generate_once().value(VitalType::HeartRate);
            assert!((120.0..=125.0).contains(&v));
        }
        assert!(engine.clear_override(VitalType::HeartRate));
        assert!(!engine.clear_override(VitalType::HeartRate));
        assert!(engine.snapshot().custom_ranges.is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_options() {
        let short = EngineOptions {
            interval_secs: 0,
            ..EngineOptions::default()
        };
        assert_eq!(
            SimulationEngine::new(short).err(),
            Some(ValidationError::IntervalTooShort { got: 0, min: 1 })
        );

        let blank = EngineOptions {
            device_id: " ".to_string(),
            ..EngineOptions::default()
        };
        assert!(matches!(
            SimulationEngine::new(blank),
            Err(ValidationError::EmptyField { field: "device_id" })
        ));

        let engine = SimulationEngine::new(EngineOptions {
            interval_secs: 1,
            patient_id: " patient_007 ".to_string(),
            ..EngineOptions::default()
        })
        .unwrap();
        assert_eq!(engine.interval_secs(), 1);
        assert_eq!(engine.snapshot().patient_id, "patient_007");
    }

    #[test]
    fn test_start_stop_transitions() {
        let engine = fast_engine();

        assert!(!engine.stop());
        assert!(engine.start());
        assert!(!engine.start());
        assert!(engine.is_running());
        assert!(engine.stop());
        assert!(!engine.stop());
        engine.shutdown();
    }

    #[test]
    fn test_running_loop_generates_readings() {
        let engine = fast_engine();
        let (sink, rx) = ChannelSink::new("test", 64);
        engine.add_sink(Arc::new(sink));

        engine.start();
        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        engine.shutdown();

        assert!(second.sequence() > first.sequence());
    }

    #[test]
    fn test_restart_does_not_leave_two_loops() {
        let engine = scaled_engine(5);

        engine.start();
        assert!(wait_until(Duration::from_secs(1), || engine.stats().cycles >= 1));
        engine.stop();
        engine.start();
        thread::sleep(Duration::from_millis(330));
        engine.shutdown();

        // One loop ticking every 50ms over ~330ms, plus the first loop's single cycle.
        let cycles = engine.stats().cycles;
        assert!(cycles <= 10, "cycles {cycles}");
    }

    #[test]
    fn test_stale_epoch_never_current_during_restart() {
        let engine = scaled_engine(5);
        let observed_stale = Arc::new(AtomicBool::new(false));

        for _ in 0..200 {
            engine.start();
            let old_epoch = engine.inner.epoch.load(Ordering::SeqCst);
            engine.stop();

            let done = Arc::new(AtomicBool::new(false));
            let watcher = {
                let inner = Arc::clone(&engine.inner);
                let done = Arc::clone(&done);
                let observed_stale = Arc::clone(&observed_stale);
                thread::spawn(move || {
                    while !done.load(Ordering::SeqCst) {
                        if inner.is_current(old_epoch) {
                            observed_stale.store(true, Ordering::SeqCst);
                        }
                    }
                })
            };

            engine.start();
            done.store(true, Ordering::SeqCst);
            watcher.join().unwrap();
            engine.stop();
        }
        engine.shutdown();

        assert!(!observed_stale.load(Ordering::SeqCst));
    }

    #[test]
    fn test_interval_change_waits_for_current_sleep() {
        let engine = scaled_engine(20);

        engine.start();
        assert!(wait_until(Duration::from_secs(1), || engine.stats().cycles >= 1));
        engine.set_interval(1).unwrap();

        // The in-flight 200ms sleep is not cut short.
        thread::sleep(Duration::from_millis(100));
        assert_eq!(engine.stats().cycles, 1);

        // After it ends, ticks come every 10ms.
        assert!(wait_until(Duration::from_secs(2), || engine.stats().cycles >= 6));
        engine.shutdown();
    }

    #[test]
    fn test_failing_and_panicking_sinks_are_isolated() {
        let engine = SimulationEngine::default();
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = delivered.clone();

        engine.add_sink(Arc::new(|_: &Reading| -> Result<(), SinkError> {
            Err(SinkError::failed("broken", "down"))
        }));
        engine.add_sink(Arc::new(|_: &Reading| -> Result<(), SinkError> { panic!("boom") }));
        engine.add_sink(Arc::new(move |_: &Reading| -> Result<(), SinkError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        engine.generate_once();
        engine.generate_once();

        assert_eq!(delivered.load(Ordering::SeqCst), 2);
        assert_eq!(engine.stats().sink_failures, 4);
        assert_eq!(engine.sink_count(), 3);
    }

    #[test]
    fn test_remove_sink() {
        let engine = SimulationEngine::default();
        let (sink, rx) = ChannelSink::new("removable", 8);
        let id = engine.add_sink(Arc::new(sink));

        engine.generate_once();
        assert!(engine.remove_sink(id));
        assert!(!engine.remove_sink(id));
        engine.generate_once();

        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_quality_indicators_flag() {
        let engine = SimulationEngine::new(EngineOptions {
            quality_indicators: true,
            ..EngineOptions::default()
        })
        .unwrap();
        let reading = engine.generate_once();

        let score = reading.quality_score().unwrap();
        let strength = reading.signal_strength().unwrap();
        assert!((0.90..=1.0).contains(&score));
        assert!((85..=100).contains(&strength));
        assert!(SimulationEngine::default().generate_once().quality_score().is_none());
    }

    #[test]
    fn test_concurrent_generation_keeps_sequence_unique() {
        let engine = SimulationEngine::default();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                thread::spawn(move || {
                    (0..25)
                        .map(|_| engine.generate_once().sequence())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut sequences: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        sequences.sort_unstable();
        sequences.dedup();
        assert_eq!(sequences.len(), 100);
        assert_eq!(sequences.last(), Some(&100));
    }
}
