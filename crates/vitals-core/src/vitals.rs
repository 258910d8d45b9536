//! Vital sign types, condition modes and the static range tables.
//!
//! Everything here is plain data: closed enumerations used as map keys and
//! three fixed `(min, max)` tables, one per [`ConditionMode`].

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Vital types
// ============================================================================

/// The six physiological signals produced per reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalType {
    HeartRate,
    BpSystolic,
    BpDiastolic,
    Spo2,
    Temperature,
    RespiratoryRate,
}

impl VitalType {
    /// All vital types in reading order.
    pub const ALL: [VitalType; 6] = [
        VitalType::HeartRate,
        VitalType::BpSystolic,
        VitalType::BpDiastolic,
        VitalType::Spo2,
        VitalType::Temperature,
        VitalType::RespiratoryRate,
    ];

    /// Wire name (`heart_rate`, `bp_systolic`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            VitalType::HeartRate => "heart_rate",
            VitalType::BpSystolic => "bp_systolic",
            VitalType::BpDiastolic => "bp_diastolic",
            VitalType::Spo2 => "spo2",
            VitalType::Temperature => "temperature",
            VitalType::RespiratoryRate => "respiratory_rate",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VitalType::HeartRate => "Heart Rate",
            VitalType::BpSystolic => "Blood Pressure (Systolic)",
            VitalType::BpDiastolic => "Blood Pressure (Diastolic)",
            VitalType::Spo2 => "Oxygen Saturation",
            VitalType::Temperature => "Body Temperature",
            VitalType::RespiratoryRate => "Respiratory Rate",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            VitalType::HeartRate => "bpm",
            VitalType::BpSystolic | VitalType::BpDiastolic => "mmHg",
            VitalType::Spo2 => "%",
            VitalType::Temperature => "°C",
            VitalType::RespiratoryRate => "breaths/min",
        }
    }

    /// Position in [`VitalType::ALL`] and in every static table.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether the value is reported as a whole number on the wire.
    pub fn is_integral(&self) -> bool {
        !matches!(self, VitalType::Temperature)
    }
}

impl fmt::Display for VitalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VitalType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VitalType::ALL
            .into_iter()
            .find(|v| v.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnknownVitalType(s.to_string()))
    }
}

// ============================================================================
// Condition modes
// ============================================================================

/// Patient condition profile selecting the range table and sampling strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionMode {
    #[default]
    Normal,
    Abnormal,
    Emergency,
}

impl ConditionMode {
    pub const ALL: [ConditionMode; 3] = [
        ConditionMode::Normal,
        ConditionMode::Abnormal,
        ConditionMode::Emergency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionMode::Normal => "normal",
            ConditionMode::Abnormal => "abnormal",
            ConditionMode::Emergency => "emergency",
        }
    }

    /// Long-form profile name used by the ranges report.
    pub fn profile_name(&self) -> &'static str {
        match self {
            ConditionMode::Normal => "normal_healthy_patient",
            ConditionMode::Abnormal => "abnormal_condition_patient",
            ConditionMode::Emergency => "emergency_critical_patient",
        }
    }
}

impl fmt::Display for ConditionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(ConditionMode::Normal),
            "abnormal" => Ok(ConditionMode::Abnormal),
            "emergency" => Ok(ConditionMode::Emergency),
            _ => Err(ValidationError::UnknownMode(s.to_string())),
        }
    }
}

// ============================================================================
// Ranges
// ============================================================================

/// Closed interval `[min, max]` with `min < max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(f64, f64)", into = "(f64, f64)")]
pub struct VitalRange {
    min: f64,
    max: f64,
}

impl VitalRange {
    /// Validated constructor.
    pub fn new(min: f64, max: f64) -> Result<Self, ValidationError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(ValidationError::NonFiniteRange);
        }
        if min >= max {
            return Err(ValidationError::InvertedRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// For the static tables, whose bounds are known to be ordered.
    const fn fixed(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Overlap of two ranges, if it has a positive width.
    pub fn intersect(&self, other: &VitalRange) -> Option<VitalRange> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min < max).then_some(VitalRange { min, max })
    }

    /// Lower band covering `fraction` of the width.
    pub fn lower_band(&self, fraction: f64) -> VitalRange {
        VitalRange {
            min: self.min,
            max: self.min + self.width() * fraction,
        }
    }

    /// Upper band covering `fraction` of the width.
    pub fn upper_band(&self, fraction: f64) -> VitalRange {
        VitalRange {
            min: self.max - self.width() * fraction,
            max: self.max,
        }
    }
}

impl TryFrom<(f64, f64)> for VitalRange {
    type Error = ValidationError;

    fn try_from((min, max): (f64, f64)) -> Result<Self, Self::Error> {
        VitalRange::new(min, max)
    }
}

impl From<VitalRange> for (f64, f64) {
    fn from(range: VitalRange) -> Self {
        (range.min, range.max)
    }
}

/// One static table: a range per vital type, in [`VitalType::ALL`] order.
pub type RangeTable = [(VitalType, VitalRange); 6];

pub const NORMAL_RANGES: RangeTable = [
    (VitalType::HeartRate, VitalRange::fixed(60.0, 100.0)),
    (VitalType::BpSystolic, VitalRange::fixed(90.0, 140.0)),
    (VitalType::BpDiastolic, VitalRange::fixed(60.0, 90.0)),
    (VitalType::Spo2, VitalRange::fixed(95.0, 100.0)),
    (VitalType::Temperature, VitalRange::fixed(36.1, 37.2)),
    (VitalType::RespiratoryRate, VitalRange::fixed(12.0, 20.0)),
];

pub const ABNORMAL_RANGES: RangeTable = [
    (VitalType::HeartRate, VitalRange::fixed(40.0, 180.0)),
    (VitalType::BpSystolic, VitalRange::fixed(70.0, 200.0)),
    (VitalType::BpDiastolic, VitalRange::fixed(40.0, 120.0)),
    (VitalType::Spo2, VitalRange::fixed(85.0, 94.0)),
    (VitalType::Temperature, VitalRange::fixed(35.0, 40.0)),
    (VitalType::RespiratoryRate, VitalRange::fixed(8.0, 30.0)),
];

pub const EMERGENCY_RANGES: RangeTable = [
    (VitalType::HeartRate, VitalRange::fixed(30.0, 220.0)),
    (VitalType::BpSystolic, VitalRange::fixed(60.0, 250.0)),
    (VitalType::BpDiastolic, VitalRange::fixed(30.0, 150.0)),
    (VitalType::Spo2, VitalRange::fixed(70.0, 84.0)),
    (VitalType::Temperature, VitalRange::fixed(32.0, 42.0)),
    (VitalType::RespiratoryRate, VitalRange::fixed(5.0, 40.0)),
];

/// Static table for a mode.
pub fn range_table(mode: ConditionMode) -> &'static RangeTable {
    match mode {
        ConditionMode::Normal => &NORMAL_RANGES,
        ConditionMode::Abnormal => &ABNORMAL_RANGES,
        ConditionMode::Emergency => &EMERGENCY_RANGES,
    }
}

/// Static range for one vital type in one mode.
pub fn static_range(vital: VitalType, mode: ConditionMode) -> VitalRange {
    range_table(mode)[vital.index()].1
}

/// Read-only view of all three tables keyed by profile name, for reporting.
pub fn all_range_tables() -> BTreeMap<&'static str, BTreeMap<VitalType, VitalRange>> {
    ConditionMode::ALL
        .into_iter()
        .map(|mode| {
            let table = range_table(mode).iter().copied().collect();
            (mode.profile_name(), table)
        })
        .collect()
}
