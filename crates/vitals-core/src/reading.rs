//! Reading and delivery result types.

use crate::vitals::{ConditionMode, VitalType};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One value per vital type, indexed by [`VitalType::index`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VitalValues {
    pub heart_rate: f64,
    pub bp_systolic: f64,
    pub bp_diastolic: f64,
    pub spo2: f64,
    pub temperature: f64,
    pub respiratory_rate: f64,
}

impl VitalValues {
    /// Build from a per-type sampling function, called once per vital in
    /// [`VitalType::ALL`] order.
    pub fn from_fn(mut sample: impl FnMut(VitalType) -> f64) -> Self {
        Self {
            heart_rate: sample(VitalType::HeartRate),
            bp_systolic: sample(VitalType::BpSystolic),
            bp_diastolic: sample(VitalType::BpDiastolic),
            spo2: sample(VitalType::Spo2),
            temperature: sample(VitalType::Temperature),
            respiratory_rate: sample(VitalType::RespiratoryRate),
        }
    }

    pub fn get(&self, vital: VitalType) -> f64 {
        match vital {
            VitalType::HeartRate => self.heart_rate,
            VitalType::BpSystolic => self.bp_systolic,
            VitalType::BpDiastolic => self.bp_diastolic,
            VitalType::Spo2 => self.spo2,
            VitalType::Temperature => self.temperature,
            VitalType::RespiratoryRate => self.respiratory_rate,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (VitalType, f64)> + '_ {
        VitalType::ALL.into_iter().map(|v| (v, self.get(v)))
    }
}

/// Immutable snapshot produced by one generation cycle.
///
/// Fields are private; a reading cannot be changed after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    sequence: u64,
    timestamp: DateTime<Utc>,
    vitals: VitalValues,
    mode: ConditionMode,
    device_id: String,
    patient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signal_strength: Option<u8>,
}

impl Reading {
    pub fn new(
        sequence: u64,
        timestamp: DateTime<Utc>,
        vitals: VitalValues,
        mode: ConditionMode,
        device_id: impl Into<String>,
        patient_id: impl Into<String>,
    ) -> Self {
        Self {
            sequence,
            timestamp,
            vitals,
            mode,
            device_id: device_id.into(),
            patient_id: patient_id.into(),
            quality_score: None,
            signal_strength: None,
        }
    }

    /// Attach quality indicators. Consumes the reading before it is published.
    pub fn with_quality(mut self, quality_score: f64, signal_strength: u8) -> Self {
        self.quality_score = Some(quality_score);
        self.signal_strength = Some(signal_strength);
        self
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// ISO-8601 timestamp with a `Z` suffix.
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn vitals(&self) -> &VitalValues {
        &self.vitals
    }

    pub fn value(&self, vital: VitalType) -> f64 {
        self.vitals.get(vital)
    }

    pub fn mode(&self) -> ConditionMode {
        self.mode
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn quality_score(&self) -> Option<f64> {
        self.quality_score
    }

    pub fn signal_strength(&self) -> Option<u8> {
        self.signal_strength
    }
}

/// Outcome of delivering one reading (or test payload) to one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub destination: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

impl DeliveryResult {
    pub fn delivered(destination: impl Into<String>, status_code: u16, attempts: u32) -> Self {
        Self {
            destination: destination.into(),
            success: true,
            error: None,
            status_code: Some(status_code),
            attempts,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(
        destination: impl Into<String>,
        error: impl Into<String>,
        status_code: Option<u16>,
        attempts: u32,
    ) -> Self {
        Self {
            destination: destination.into(),
            success: false,
            error: Some(error.into()),
            status_code,
            attempts,
            timestamp: Utc::now(),
        }
    }
}
