//! Stochastic vital value generator.
//!
//! Maps `(vital type, condition mode)` to a plausible value using
//! piecewise-uniform sampling:
//!
//! | mode      | main branch                                  | fallback branch            |
//! |-----------|----------------------------------------------|----------------------------|
//! | normal    | midpoint ± 15% of the width (always)         | -                          |
//! | abnormal  | 70%: uniform over the normal table           | 30%: outer quartile        |
//! | emergency | 75%: outer 30% band of the active range      | 25%: uniform over abnormal |
//!
//! The active range is the custom override for the vital type if one is set,
//! otherwise the static table for the mode. When an override is set it also
//! bounds the reference table used by the abnormal/emergency fallback, so
//! every sample stays inside the override.

use crate::error::ValidationError;
use crate::vitals::{ConditionMode, VitalRange, VitalType, static_range};
use rand::Rng;
use std::collections::BTreeMap;

/// Fraction of the width on each side of the midpoint sampled in normal mode.
pub const NORMAL_SPREAD: f64 = 0.15;
/// Probability of an outer-quartile spike in abnormal mode.
pub const ABNORMAL_SPIKE_PROBABILITY: f64 = 0.3;
/// Width of the abnormal spike band as a fraction of the active range.
pub const ABNORMAL_SPIKE_BAND: f64 = 0.25;
/// Probability of a critical value in emergency mode.
pub const EMERGENCY_CRITICAL_PROBABILITY: f64 = 0.75;
/// Width of the emergency critical band as a fraction of the active range.
pub const EMERGENCY_CRITICAL_BAND: f64 = 0.3;

/// Generator holding the custom-range override table.
#[derive(Debug, Clone, Default)]
pub struct ValueGenerator {
    overrides: BTreeMap<VitalType, VitalRange>,
}

impl ValueGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a custom range for one vital type.
    ///
    /// Rejects `min >= max`, non-finite bounds and ranges that hold no
    /// one-decimal value, without touching the existing table.
    pub fn set_override(
        &mut self,
        vital: VitalType,
        min: f64,
        max: f64,
    ) -> Result<VitalRange, ValidationError> {
        let range = VitalRange::new(min, max)?;
        if tenth_bounds(&range).is_none() {
            return Err(ValidationError::InvalidField {
                field: "range",
                reason: format!("no one-decimal value lies within [{min}, {max}]"),
            });
        }
        self.overrides.insert(vital, range);
        Ok(range)
    }

    /// Remove the override for `vital`. Returns whether one existed.
    pub fn clear_override(&mut self, vital: VitalType) -> bool {
        self.overrides.remove(&vital).is_some()
    }

    pub fn clear_overrides(&mut self) {
        self.overrides.clear();
    }

    pub fn override_for(&self, vital: VitalType) -> Option<VitalRange> {
        self.overrides.get(&vital).copied()
    }

    /// Copy of the override table.
    pub fn overrides(&self) -> BTreeMap<VitalType, VitalRange> {
        self.overrides.clone()
    }

    /// Range sampling is based on: override first, then the mode table.
    pub fn active_range(&self, vital: VitalType, mode: ConditionMode) -> VitalRange {
        self.override_for(vital)
            .unwrap_or_else(|| static_range(vital, mode))
    }

    /// Sample one value from the process-wide RNG.
    pub fn sample(&self, vital: VitalType, mode: ConditionMode) -> f64 {
        self.sample_with(&mut rand::rng(), vital, mode)
    }

    /// Sample one value from the given RNG.
    pub fn sample_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        vital: VitalType,
        mode: ConditionMode,
    ) -> f64 {
        let active = self.active_range(vital, mode);

        let raw = match mode {
            ConditionMode::Normal => {
                let spread = active.width() * NORMAL_SPREAD;
                let center = active.midpoint();
                uniform(rng, center - spread, center + spread).clamp(active.min(), active.max())
            }
            ConditionMode::Abnormal => {
                if rng.random_bool(ABNORMAL_SPIKE_PROBABILITY) {
                    sample_outer_band(rng, &active, ABNORMAL_SPIKE_BAND)
                } else {
                    let reference = self.reference_range(vital, ConditionMode::Normal);
                    uniform(rng, reference.min(), reference.max())
                }
            }
            ConditionMode::Emergency => {
                if rng.random_bool(EMERGENCY_CRITICAL_PROBABILITY) {
                    sample_outer_band(rng, &active, EMERGENCY_CRITICAL_BAND)
                } else {
                    let reference = self.reference_range(vital, ConditionMode::Abnormal);
                    uniform(rng, reference.min(), reference.max())
                }
            }
        };

        let value = round_tenth(raw);
        match self.override_for(vital).as_ref().and_then(tenth_bounds) {
            Some((low, high)) => value.clamp(low, high),
            None => value,
        }
    }

    /// Static table used by the fallback branch, narrowed to the override.
    fn reference_range(&self, vital: VitalType, table: ConditionMode) -> VitalRange {
        let reference = static_range(vital, table);
        match self.override_for(vital) {
            Some(custom) => reference.intersect(&custom).unwrap_or(custom),
            None => reference,
        }
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    if low >= high {
        return low;
    }
    rng.random_range(low..=high)
}

fn sample_outer_band<R: Rng + ?Sized>(rng: &mut R, range: &VitalRange, fraction: f64) -> f64 {
    let band = if rng.random_bool(0.5) {
        range.lower_band(fraction)
    } else {
        range.upper_band(fraction)
    };
    uniform(rng, band.min(), band.max())
}

/// Round to one decimal place.
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Smallest and largest one-decimal values inside `range`, if any.
fn tenth_bounds(range: &VitalRange) -> Option<(f64, f64)> {
    // The epsilon keeps bounds like 36.1 (361.00000000000006 tenths) in place.
    const EPSILON: f64 = 1e-9;
    let low = ((range.min() * 10.0) - EPSILON).ceil() / 10.0;
    let high = ((range.max() * 10.0) + EPSILON).floor() / 10.0;
    (low <= high).then_some((low, high))
}
