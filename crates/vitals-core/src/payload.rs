//! Wire payloads sent to destinations.
//!
//! Two shapes: the generic snake_case body consumed by the UI and the
//! camelCase rule-engine body with urgency and data-quality enrichment.

use crate::reading::Reading;
use crate::vitals::{ConditionMode, VitalType};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

pub const SUBMISSION_SOURCE: &str = "BioHarness_Vitals_Simulator";
pub const DATA_SOURCE: &str = "BioHarness_Simulator";

/// Defaults reported when a reading carries no quality indicators.
pub const DEFAULT_SIGNAL_STRENGTH: u8 = 100;
pub const DEFAULT_MEASUREMENT_CONFIDENCE: f64 = 0.95;
pub const DATA_COMPLETENESS: u8 = 100;

/// Which body a destination receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    #[default]
    Generic,
    RuleEngine,
}

impl PayloadFormat {
    pub fn render(&self, reading: &Reading) -> Value {
        match self {
            PayloadFormat::Generic => generic_payload(reading),
            PayloadFormat::RuleEngine => rule_engine_payload(reading),
        }
    }
}

/// Wire representation of one vital value: integral vitals are truncated to
/// whole numbers, temperature keeps its decimal.
pub fn wire_value(vital: VitalType, value: f64) -> Value {
    if vital.is_integral() {
        Value::from(value.trunc() as i64)
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}

// ============================================================================
// Generic payload
// ============================================================================

/// `{timestamp, vitals: {...}, metadata: {...}}`
pub fn generic_payload(reading: &Reading) -> Value {
    let vitals: serde_json::Map<String, Value> = reading
        .vitals()
        .iter()
        .map(|(vital, value)| (vital.as_str().to_string(), wire_value(vital, value)))
        .collect();

    serde_json::json!({
        "timestamp": reading.timestamp_iso(),
        "vitals": vitals,
        "metadata": {
            "device_id": reading.device_id(),
            "patient_id": reading.patient_id(),
            "mode": reading.mode().as_str(),
            "quality_score": reading.quality_score(),
            "signal_strength": reading.signal_strength(),
        }
    })
}

// ============================================================================
// Rule-engine payload
// ============================================================================

/// Fixed thresholds beyond which a reading needs immediate processing.
pub mod critical {
    pub const HEART_RATE_LOW: f64 = 40.0;
    pub const HEART_RATE_HIGH: f64 = 150.0;
    pub const SYSTOLIC_LOW: f64 = 70.0;
    pub const SYSTOLIC_HIGH: f64 = 180.0;
    pub const SPO2_LOW: f64 = 85.0;
    pub const TEMPERATURE_LOW: f64 = 35.0;
    pub const TEMPERATURE_HIGH: f64 = 40.0;
    pub const RESPIRATORY_RATE_LOW: f64 = 8.0;
    pub const RESPIRATORY_RATE_HIGH: f64 = 30.0;
}

/// Evaluated on the values as they appear on the wire.
pub fn requires_immediate_processing(reading: &Reading) -> bool {
    let wire = |vital: VitalType| {
        let v = reading.value(vital);
        if vital.is_integral() { v.trunc() } else { v }
    };

    let heart_rate = wire(VitalType::HeartRate);
    let systolic = wire(VitalType::BpSystolic);
    let spo2 = wire(VitalType::Spo2);
    let temperature = wire(VitalType::Temperature);
    let respiratory_rate = wire(VitalType::RespiratoryRate);

    heart_rate < critical::HEART_RATE_LOW
        || heart_rate > critical::HEART_RATE_HIGH
        || systolic < critical::SYSTOLIC_LOW
        || systolic > critical::SYSTOLIC_HIGH
        || spo2 < critical::SPO2_LOW
        || temperature < critical::TEMPERATURE_LOW
        || temperature > critical::TEMPERATURE_HIGH
        || respiratory_rate < critical::RESPIRATORY_RATE_LOW
        || respiratory_rate > critical::RESPIRATORY_RATE_HIGH
        || reading.mode() == ConditionMode::Emergency
}

/// Rule-engine body: camelCase readings plus submission metadata.
pub fn rule_engine_payload(reading: &Reading) -> Value {
    let v = |vital| wire_value(vital, reading.value(vital));

    serde_json::json!({
        "deviceId": reading.device_id(),
        "patientId": reading.patient_id(),
        "timestamp": reading.timestamp_iso(),
        "readings": {
            "heartRate": v(VitalType::HeartRate),
            "bloodPressure": {
                "systolic": v(VitalType::BpSystolic),
                "diastolic": v(VitalType::BpDiastolic),
            },
            "oxygenSaturation": v(VitalType::Spo2),
            "bodyTemperature": v(VitalType::Temperature),
            "respiratoryRate": v(VitalType::RespiratoryRate),
        },
        "metadata": {
            "simulationMode": reading.mode().as_str(),
            "generatedAt": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            "dataSource": DATA_SOURCE,
        },
        "submission_source": SUBMISSION_SOURCE,
        "requires_immediate_processing": requires_immediate_processing(reading),
        "data_quality_indicators": {
            "signal_strength": reading.signal_strength().unwrap_or(DEFAULT_SIGNAL_STRENGTH),
            "data_completeness": DATA_COMPLETENESS,
            "measurement_confidence":
                reading.quality_score().unwrap_or(DEFAULT_MEASUREMENT_CONFIDENCE),
        }
    })
}

/// Body of a connectivity probe.
pub fn connectivity_test_payload() -> Value {
    serde_json::json!({
        "test": true,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        "message": "Connectivity test from BioHarness Simulator",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::VitalValues;

    fn reading(mode: ConditionMode, values: VitalValues) -> Reading {
        Reading::new(3, Utc::now(), values, mode, "BioHarness_Sim_001", "patient_001")
    }

    fn calm() -> VitalValues {
        VitalValues {
            heart_rate: 72.4,
            bp_systolic: 118.9,
            bp_diastolic: 77.0,
            spo2: 98.2,
            temperature: 36.7,
            respiratory_rate: 15.5,
        }
    }

    #[test]
    fn test_generic_payload_shape() {
        let body = generic_payload(&reading(ConditionMode::Normal, calm()));

        assert_eq!(body["vitals"]["heart_rate"], 72);
        assert_eq!(body["vitals"]["bp_systolic"], 118);
        assert_eq!(body["vitals"]["temperature"], 36.7);
        assert_eq!(body["metadata"]["mode"], "normal");
        assert_eq!(body["metadata"]["patient_id"], "patient_001");
        assert!(body["metadata"]["quality_score"].is_null());
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_rule_engine_payload_shape() {
        let body = rule_engine_payload(&reading(ConditionMode::Normal, calm()));

        assert_eq!(body["deviceId"], "BioHarness_Sim_001");
        assert_eq!(body["readings"]["bloodPressure"]["diastolic"], 77);
        assert_eq!(body["readings"]["oxygenSaturation"], 98);
        assert_eq!(body["metadata"]["simulationMode"], "normal");
        assert_eq!(body["submission_source"], SUBMISSION_SOURCE);
        assert_eq!(body["requires_immediate_processing"], false);
        assert_eq!(body["data_quality_indicators"]["signal_strength"], 100);
        assert_eq!(body["data_quality_indicators"]["measurement_confidence"], 0.95);
    }

    #[test]
    fn test_each_threshold_flags_urgency() {
        let cases: [(fn(&mut VitalValues), &str); 9] = [
            (|v| v.heart_rate = 39.0, "bradycardia"),
            (|v| v.heart_rate = 151.0, "tachycardia"),
            (|v| v.bp_systolic = 69.0, "hypotension"),
            (|v| v.bp_systolic = 181.0, "hypertension"),
            (|v| v.spo2 = 84.0, "hypoxia"),
            (|v| v.temperature = 34.9, "hypothermia"),
            (|v| v.temperature = 40.1, "hyperpyrexia"),
            (|v| v.respiratory_rate = 7.0, "bradypnea"),
            (|v| v.respiratory_rate = 31.0, "tachypnea"),
        ];

        for (mutate, label) in cases {
            let mut values = calm();
            mutate(&mut values);
            assert!(
                requires_immediate_processing(&reading(ConditionMode::Normal, values)),
                "{label} should be urgent"
            );
        }
    }

    #[test]
    fn test_emergency_mode_is_always_urgent() {
        assert!(requires_immediate_processing(&reading(
            ConditionMode::Emergency,
            calm()
        )));
        assert!(!requires_immediate_processing(&reading(
            ConditionMode::Abnormal,
            calm()
        )));
    }

    #[test]
    fn test_threshold_uses_truncated_wire_value() {
        let mut values = calm();
        values.heart_rate = 150.6;
        assert!(!requires_immediate_processing(&reading(
            ConditionMode::Normal,
            values
        )));
    }

    #[test]
    fn test_format_dispatch() {
        let r = reading(ConditionMode::Normal, calm());
        assert!(PayloadFormat::Generic.render(&r).get("vitals").is_some());
        assert!(PayloadFormat::RuleEngine.render(&r).get("readings").is_some());
    }
}
