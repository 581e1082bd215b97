//! Wire form of an incoming prescription record.
//!
//! Records arrive as JSON or YAML from upstream systems (for example an
//! EDIFACT translator). The structs here accept that shape leniently: every
//! field is optional at the serde layer so that presence checks happen in the
//! mapper, where a missing field is reported by its path as
//! [`RxError::MissingField`]. Only shape errors (a list where a string was
//! expected, say) fail deserialisation.

use crate::{RxError, RxResult};
use serde::{Deserialize, Serialize};

/// A numeric value that upstream systems send either as a number or a string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    /// Parse as a finite, non-negative decimal; `path` names the field in the error.
    pub fn as_f64(&self, path: &str) -> RxResult<f64> {
        let invalid = || {
            RxError::InvalidInput(format!("{path}: expected a non-negative number, got {self}"))
        };
        let value = match self {
            NumberOrText::Number(n) => *n,
            NumberOrText::Text(s) => s.trim().parse::<f64>().map_err(|_| invalid())?,
        };
        if value.is_finite() && value >= 0.0 {
            Ok(value)
        } else {
            Err(invalid())
        }
    }

    /// Parse as a whole, non-negative count.
    pub fn as_u32(&self, path: &str) -> RxResult<u32> {
        let invalid =
            || RxError::InvalidInput(format!("{path}: expected a whole number, got {self}"));
        match self {
            NumberOrText::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n <= u32::MAX as f64 => {
                Ok(*n as u32)
            }
            NumberOrText::Number(_) => Err(invalid()),
            NumberOrText::Text(s) => s.trim().parse::<u32>().map_err(|_| invalid()),
        }
    }
}

impl std::fmt::Display for NumberOrText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumberOrText::Number(n) => write!(f, "{n}"),
            NumberOrText::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// A diagnosis as a bare code, a `[code, description]` pair or a map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiagnosisRecord {
    Code(String),
    Pair(String, String),
    Coded {
        code: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient_id: Option<String>,
    pub name: Option<String>,
    /// `YYYYMMDD`
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub weight_kg: Option<NumberOrText>,
    pub height_cm: Option<NumberOrText>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub diagnoses: Vec<DiagnosisRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub qualification: Option<String>,
    pub specialty: Option<String>,
    pub contact: Option<String>,
    pub address: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PharmacyRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub contact: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InsuranceRecord {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub medication_code: Option<String>,
    pub medication_name: Option<String>,
    pub form: Option<String>,
    pub strength: Option<String>,
    pub quantity: Option<NumberOrText>,
    /// Falls back to `form` when absent.
    pub unit: Option<String>,
    pub dosage_instruction: Option<String>,
    pub route: Option<String>,
    pub duration_days: Option<NumberOrText>,
    pub refills: Option<NumberOrText>,
    pub special_instructions: Option<String>,
    pub substitution_allowed: Option<bool>,
    /// Falls back to `QD` when absent.
    pub frequency: Option<String>,
    /// `YYYYMMDD` or `YYYYMMDDHHMMSS`
    pub start_datetime: Option<String>,
    pub end_datetime: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionRecord {
    /// Upstream interchange reference. Carried for logging only.
    pub message_ref: Option<String>,
    pub prescription_id: Option<String>,
    /// `YYYYMMDD`
    pub prescription_date: Option<String>,
    #[serde(default)]
    pub urgent: bool,
    pub validity_days: Option<NumberOrText>,
    pub payment_type: Option<String>,
    pub insurance_info: Option<InsuranceRecord>,
    pub dispense_as_written: Option<bool>,
    /// Envelope-level substitution flag; `false` means dispense as written.
    pub substitution_allowed: Option<bool>,
    pub clinical_notes: Option<String>,
    pub prescribing_doctor: Option<ProviderRecord>,
    pub patient: Option<PatientRecord>,
    pub pharmacy: Option<PharmacyRecord>,
    #[serde(default)]
    pub items: Vec<ItemRecord>,
}

impl PrescriptionRecord {
    /// Parse a record from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`RxError::Translation`] naming the offending path when the
    /// JSON does not have the expected shape.
    pub fn from_json(json_text: &str) -> RxResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);
        serde_path_to_error::deserialize(&mut deserializer)
            .map_err(|err| schema_mismatch(err.path().to_string(), err.into_inner()))
    }

    /// Parse a record from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`RxError::Translation`] naming the offending path when the
    /// YAML does not have the expected shape.
    pub fn from_yaml(yaml_text: &str) -> RxResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        serde_path_to_error::deserialize(deserializer)
            .map_err(|err| schema_mismatch(err.path().to_string(), err.into_inner()))
    }
}

fn schema_mismatch(path: String, source: impl std::fmt::Display) -> RxError {
    let path = if path.is_empty() || path == "." {
        "<root>".to_string()
    } else {
        path
    };
    RxError::Translation(format!("record schema mismatch at {path}: {source}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_accept_strings() {
        assert_eq!(NumberOrText::Text("85.5".into()).as_f64("w").expect("num"), 85.5);
        assert_eq!(NumberOrText::Number(30.0).as_u32("d").expect("num"), 30);
        assert_eq!(NumberOrText::Text(" 3 ".into()).as_u32("r").expect("num"), 3);
    }

    #[test]
    fn bad_numbers_name_the_field() {
        let err = NumberOrText::Text("lots".into())
            .as_f64("items[0].quantity")
            .expect_err("not a number");
        match err {
            RxError::InvalidInput(msg) => assert!(msg.contains("items[0].quantity")),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
        assert!(NumberOrText::Number(2.5).as_u32("refills").is_err());
        assert!(NumberOrText::Number(-1.0).as_u32("refills").is_err());
    }

    #[test]
    fn amounts_must_be_finite_and_non_negative() {
        for text in ["NaN", "inf", "-infinity", "-5"] {
            let err = NumberOrText::Text(text.into())
                .as_f64("patient.weight_kg")
                .expect_err("rejected amount");
            match err {
                RxError::InvalidInput(msg) => assert!(msg.starts_with("patient.weight_kg:")),
                other => panic!("expected InvalidInput, got {other:?}"),
            }
        }
        assert!(NumberOrText::Number(-1.0).as_f64("items[0].quantity").is_err());
        assert!(NumberOrText::Number(f64::NAN).as_f64("items[0].quantity").is_err());
        assert_eq!(NumberOrText::Text(" 85.5 ".into()).as_f64("w").expect("weight"), 85.5);
        assert_eq!(NumberOrText::Number(0.0).as_f64("q").expect("zero"), 0.0);
    }

    #[test]
    fn diagnoses_accept_three_shapes() {
        let json = r#"{"patient": {"diagnoses": [
            "I10",
            ["E11.9", "Type 2 diabetes"],
            {"code": "J45", "description": "Asthma"}
        ]}}"#;
        let record = PrescriptionRecord::from_json(json).expect("valid record");
        let diagnoses = record.patient.expect("patient").diagnoses;
        assert_eq!(diagnoses[0], DiagnosisRecord::Code("I10".into()));
        assert_eq!(
            diagnoses[1],
            DiagnosisRecord::Pair("E11.9".into(), "Type 2 diabetes".into())
        );
        assert_eq!(
            diagnoses[2],
            DiagnosisRecord::Coded {
                code: Some("J45".into()),
                description: Some("Asthma".into()),
            }
        );
    }

    #[test]
    fn yaml_records_parse() {
        let yaml = r#"
prescription_id: RX1
prescription_date: "20241210"
urgent: true
items:
  - medication_code: C09AA01
    medication_name: Lisinopril
    quantity: "30"
"#;
        let record = PrescriptionRecord::from_yaml(yaml).expect("valid record");
        assert_eq!(record.prescription_id.as_deref(), Some("RX1"));
        assert!(record.urgent);
        assert_eq!(
            record.items[0].quantity,
            Some(NumberOrText::Text("30".into()))
        );
    }

    #[test]
    fn shape_errors_report_the_path() {
        let err = PrescriptionRecord::from_json(r#"{"patient": {"allergies": "Penicillin"}}"#)
            .expect_err("allergies must be a list");
        match err {
            RxError::Translation(msg) => assert!(msg.contains("patient.allergies")),
            other => panic!("expected Translation, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_a_translation_error() {
        let err = PrescriptionRecord::from_json("{not json").expect_err("malformed");
        assert!(matches!(err, RxError::Translation(_)));
    }
}
