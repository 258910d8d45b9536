//! # vitals-core - Wearable Vital-Signs Simulation Pipeline
//!
//! Synthetic physiological readings generated on a timer and pushed to
//! downstream consumers over HTTP with bounded retries.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                           vitals-core                              │
//! │                                                                    │
//! │   timer tick / on demand                                           │
//! │            │                                                       │
//! │            ▼                                                       │
//! │   ┌──────────────────┐   ┌────────────────┐                        │
//! │   │ SimulationEngine │──▶│ ValueGenerator │  (per vital type)      │
//! │   │  state + latest  │   └────────────────┘                        │
//! │   └──────────────────┘                                             │
//! │            │ Reading                                               │
//! │            ▼                                                       │
//! │   ┌──────────────────────────────────────────────┐                 │
//! │   │ Sinks: LoggingSink, ChannelSink, Broadcaster │                 │
//! │   └──────────────────────────────────────────────┘                 │
//! │                               │                                    │
//! │               ┌───────────────┴───────────────┐                    │
//! │               ▼                               ▼                    │
//! │      DeliveryClient (rule engine)    DeliveryClient (UI)           │
//! │               │  POST + retries               │                    │
//! └───────────────┼───────────────────────────────┼────────────────────┘
//!                 ▼                               ▼
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vitals_core::{
//!     Broadcaster, ConditionMode, DeliveryClient, HttpTransport, SimulationEngine,
//!     SimulatorConfig,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SimulatorConfig::default();
//! let client = DeliveryClient::new(Arc::new(HttpTransport::new()?), config.delivery_policy());
//! let engine = SimulationEngine::new(config.engine_options())?;
//! engine.add_sink(Arc::new(Broadcaster::new(client, config.destinations())));
//!
//! engine.set_mode(ConditionMode::Abnormal);
//! let reading = engine.generate_once();
//! println!("{}", reading.vitals().heart_rate);
//!
//! engine.start();
//! # Ok(())
//! # }
//! ```

pub mod error;

// Data model and static range tables
pub mod reading;
pub mod vitals;

// Sampling
pub mod generator;

// Generation loop and fan-out
pub mod engine;
pub mod sink;

// Delivery
pub mod broadcaster;
pub mod delivery;
pub mod payload;

pub mod config;

pub use broadcaster::{Broadcaster, Destination, DestinationKind};
pub use config::SimulatorConfig;
pub use delivery::{DeliveryClient, DeliveryPolicy, HttpTransport, Transport, TransportResponse};
pub use engine::{EngineOptions, EngineSnapshot, EngineState, SimulationEngine};
pub use error::{ConfigError, SinkError, TransportError, ValidationError};
pub use generator::ValueGenerator;
pub use payload::PayloadFormat;
pub use reading::{DeliveryResult, Reading, VitalValues};
pub use sink::{ChannelSink, LoggingSink, Sink, SinkId};
pub use vitals::{ConditionMode, VitalRange, VitalType, all_range_tables, range_table};
