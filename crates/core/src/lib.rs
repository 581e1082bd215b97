//! # RX Core
//!
//! Prescription conversion for the HL7 message builder.
//!
//! This crate turns an incoming prescription record (JSON or YAML) into a
//! complete HL7 v2 message and summarises replies from the receiving system:
//! - [`record`]: lenient wire form of the incoming record
//! - [`mapper`]: presence checks and the fixed segment order
//! - [`PrescriptionService`]: shared entry point used by the CLI and REST server
//!
//! **No transport concerns**: HTTP servers and the command line live in the
//! binaries; nothing here reads environment variables.

pub mod error;
pub mod mapper;
pub mod record;

pub use error::{RxError, RxResult};
pub use mapper::{build_message, map_record, BuiltMessage, MappedPrescription};
pub use record::PrescriptionRecord;

use hl7::{Clock, Hl7Config, MessageVariant, ResponseSummary, SystemClock};
use std::path::Path;
use std::sync::Arc;

/// Load message configuration from an optional YAML file.
///
/// With no path the defaults are used. This is intended to be called once at
/// startup; the result is then shared by every conversion.
pub fn load_config(path: Option<&Path>) -> RxResult<Hl7Config> {
    let Some(path) = path else {
        return Ok(Hl7Config::default());
    };

    let text = std::fs::read_to_string(path).map_err(RxError::FileRead)?;
    let config = Hl7Config::from_yaml(&text)?;
    tracing::info!(
        path = %path.display(),
        variant = %config.message_type,
        "loaded HL7 configuration"
    );
    Ok(config)
}

/// Input formats accepted by [`PrescriptionService::convert_text`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordFormat {
    Json,
    Yaml,
}

impl RecordFormat {
    /// Guess the format from a file extension; anything but `.yaml`/`.yml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                RecordFormat::Yaml
            }
            _ => RecordFormat::Json,
        }
    }
}

/// Converts prescription records with a fixed configuration and clock.
#[derive(Clone)]
pub struct PrescriptionService {
    config: Arc<Hl7Config>,
    clock: Arc<dyn Clock>,
}

impl PrescriptionService {
    /// Creates a service using the system clock.
    pub fn new(config: Hl7Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Hl7Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Arc::new(config),
            clock,
        }
    }

    pub fn config(&self) -> &Hl7Config {
        &self.config
    }

    /// Converts a parsed record using the configured message variant.
    pub fn convert(&self, record: &PrescriptionRecord) -> RxResult<BuiltMessage> {
        let mapped = map_record(record)?;
        build_message(&mapped, &self.config, self.clock.as_ref())
    }

    /// Converts a parsed record, overriding the configured message variant.
    pub fn convert_as(
        &self,
        record: &PrescriptionRecord,
        variant: MessageVariant,
    ) -> RxResult<BuiltMessage> {
        let mapped = map_record(record)?;
        let config = self.config.with_variant(variant);
        build_message(&mapped, &config, self.clock.as_ref())
    }

    /// Parses and converts a record held as text.
    pub fn convert_text(&self, text: &str, format: RecordFormat) -> RxResult<BuiltMessage> {
        let record = match format {
            RecordFormat::Json => PrescriptionRecord::from_json(text)?,
            RecordFormat::Yaml => PrescriptionRecord::from_yaml(text)?,
        };
        self.convert(&record)
    }

    /// Summarises a reply (typically an ACK) from the receiving system.
    pub fn read_acknowledgment(&self, reply: &str) -> ResponseSummary {
        let summary = hl7::read_response(reply);
        tracing::debug!(
            status = summary.status.as_str(),
            segments = summary.segments.len(),
            "read acknowledgment"
        );
        summary
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::PrescriptionRecord;

    /// A complete single-item prescription.
    pub const DEMO_RECORD: &str = r#"{
        "message_ref": "MED0001",
        "prescription_id": "RX2025-0509-001",
        "prescription_date": "20241210",
        "urgent": false,
        "validity_days": 30,
        "payment_type": "INSURANCE",
        "insurance_info": {"id": "INS123456789", "name": "HealthCare Plus"},
        "dispense_as_written": false,
        "clinical_notes": "Patient has history of mild hypertension. Monitor blood pressure during treatment.",
        "prescribing_doctor": {
            "id": "DOC987654321",
            "name": "Dr. Jane Smith",
            "qualification": "MD",
            "specialty": "Internal Medicine",
            "contact": "+1-555-123-4567",
            "address": "123 Medical Center, Suite 100"
        },
        "patient": {
            "patient_id": "PAT123456789",
            "name": "John Doe",
            "date_of_birth": "19800515",
            "gender": "M",
            "weight_kg": "85.5",
            "height_cm": "180.0",
            "allergies": ["Penicillin", "Sulfa drugs"],
            "diagnoses": ["I10", "E11.9"]
        },
        "pharmacy": {
            "id": "PHARM12345",
            "name": "City Pharmacy",
            "address": "456 Main Street",
            "contact": "+1-555-987-6543"
        },
        "items": [{
            "medication_code": "C09AA01",
            "medication_name": "Lisinopril",
            "form": "TAB",
            "strength": "10 mg",
            "quantity": "30",
            "unit": "TAB",
            "dosage_instruction": "Take 1 tablet once daily in the morning",
            "route": "PO",
            "duration_days": 30,
            "refills": 3,
            "special_instructions": "Take with food if stomach upset occurs",
            "substitution_allowed": true
        }]
    }"#;

    pub fn demo_record() -> PrescriptionRecord {
        PrescriptionRecord::from_json(DEMO_RECORD).expect("demo record parses")
    }
}
