//! Prescription record to HL7 message.
//!
//! Mapping happens in two steps. [`map_record`] validates a
//! [`PrescriptionRecord`] and produces the HL7 value types; every required
//! field is checked here, so a missing field fails before any segment exists.
//! [`build_message`] then drives the [`MessageBuilder`] in a fixed order:
//!
//! MSH, PID (+OBX), PV1, ORC, DG1*, AL1*, NTE?, then RXE+RXR (+RXD) per item.

use crate::record::{
    DiagnosisRecord, ItemRecord, NumberOrText, PatientRecord, PharmacyRecord,
    PrescriptionRecord, ProviderRecord,
};
use crate::{RxError, RxResult};
use chrono::{NaiveDate, NaiveDateTime};
use hl7::{
    BatchEnvelope, Clock, Diagnosis, DispenseDetails, GiveDetails, Hl7Config, InsuranceInfo,
    MedicationItem, MessageBuilder, OrderControl, PatientInfo, PharmacyInfo,
    PrescribingProvider, PrescriptionInfo, SEGMENT_DELIMITER,
};
use rx_types::NonEmptyText;
use serde::Serialize;

/// Patient class written to PV1-2; prescriptions are outpatient orders.
const OUTPATIENT: &str = "O";

/// Frequency used when an item does not state one.
const DEFAULT_FREQUENCY: &str = "QD";

/// Source of the clinical-notes NTE (placer).
const NOTE_SOURCE: &str = "P";

/// ORC-7 component carrying the order priority.
const PRIORITY_COMPONENT: usize = 6;

/// Priority code for urgent prescriptions (HL7 table 0027, stat).
const URGENT_PRIORITY: &str = "S";

/// A validated prescription, ready to be written as HL7.
#[derive(Clone, Debug, PartialEq)]
pub struct MappedPrescription {
    pub patient: PatientInfo,
    pub provider: PrescribingProvider,
    pub pharmacy: PharmacyInfo,
    pub medications: Vec<MedicationItem>,
    pub prescription: PrescriptionInfo,
}

/// A rendered message and what it contains.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuiltMessage {
    pub message: String,
    pub control_id: String,
    /// Segment codes in order, including any batch envelope.
    pub segments: Vec<String>,
}

fn required(value: Option<&String>, path: &str) -> RxResult<NonEmptyText> {
    NonEmptyText::optional(value).ok_or_else(|| RxError::MissingField(path.to_string()))
}

fn required_section<'r, T>(value: Option<&'r T>, path: &str) -> RxResult<&'r T> {
    value.ok_or_else(|| RxError::MissingField(path.to_string()))
}

fn optional_text(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn parse_date(value: &str, path: &str) -> RxResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y%m%d").map_err(|_| {
        RxError::InvalidInput(format!("{path}: expected a YYYYMMDD date, got {value:?}"))
    })
}

fn parse_datetime(value: &str, path: &str) -> RxResult<NaiveDateTime> {
    let value = value.trim();
    if value.len() == 8 {
        return parse_date(value, path)
            .map(|date| date.and_time(chrono::NaiveTime::MIN));
    }
    NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%S").map_err(|_| {
        RxError::InvalidInput(format!(
            "{path}: expected a YYYYMMDD or YYYYMMDDHHMMSS timestamp, got {value:?}"
        ))
    })
}

fn optional_amount(value: Option<&NumberOrText>, path: &str) -> RxResult<Option<f64>> {
    value.map(|v| v.as_f64(path)).transpose()
}

fn optional_count(value: Option<&NumberOrText>, path: &str) -> RxResult<Option<u32>> {
    value.map(|v| v.as_u32(path)).transpose()
}

fn map_diagnosis(record: &DiagnosisRecord, path: &str) -> RxResult<Diagnosis> {
    let (code, description) = match record {
        DiagnosisRecord::Code(code) => (Some(code), None),
        DiagnosisRecord::Pair(code, description) => (Some(code), Some(description)),
        DiagnosisRecord::Coded { code, description } => (code.as_ref(), description.as_ref()),
    };
    let code = required(code, &format!("{path}.code"))?;
    Ok(match optional_text(description) {
        Some(description) => Diagnosis::with_description(code, description),
        None => Diagnosis::new(code),
    })
}

fn map_patient(record: &PatientRecord) -> RxResult<PatientInfo> {
    let date_of_birth = required(record.date_of_birth.as_ref(), "patient.date_of_birth")?;

    let diagnoses = record
        .diagnoses
        .iter()
        .enumerate()
        .map(|(i, d)| map_diagnosis(d, &format!("patient.diagnoses[{i}]")))
        .collect::<RxResult<Vec<_>>>()?;

    Ok(PatientInfo {
        patient_id: required(record.patient_id.as_ref(), "patient.patient_id")?,
        name: required(record.name.as_ref(), "patient.name")?,
        date_of_birth: parse_date(date_of_birth.as_str(), "patient.date_of_birth")?,
        gender: required(record.gender.as_ref(), "patient.gender")?.into_string(),
        weight_kg: optional_amount(record.weight_kg.as_ref(), "patient.weight_kg")?,
        height_cm: optional_amount(record.height_cm.as_ref(), "patient.height_cm")?,
        allergies: record
            .allergies
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(str::to_owned)
            .collect(),
        diagnoses,
    })
}

fn map_provider(record: &ProviderRecord) -> RxResult<PrescribingProvider> {
    Ok(PrescribingProvider {
        id: required(record.id.as_ref(), "prescribing_doctor.id")?,
        name: required(record.name.as_ref(), "prescribing_doctor.name")?,
        qualification: optional_text(record.qualification.as_ref()),
        specialty: optional_text(record.specialty.as_ref()),
        contact: optional_text(record.contact.as_ref()),
        address: optional_text(record.address.as_ref()),
    })
}

fn map_pharmacy(record: &PharmacyRecord) -> RxResult<PharmacyInfo> {
    Ok(PharmacyInfo {
        id: required(record.id.as_ref(), "pharmacy.id")?,
        name: required(record.name.as_ref(), "pharmacy.name")?,
        address: optional_text(record.address.as_ref()),
        contact: optional_text(record.contact.as_ref()),
    })
}

fn map_item(record: &ItemRecord, index: usize) -> RxResult<MedicationItem> {
    let path = |field: &str| format!("items[{index}].{field}");

    let form = required(record.form.as_ref(), &path("form"))?.into_string();
    let quantity = record
        .quantity
        .as_ref()
        .ok_or_else(|| RxError::MissingField(path("quantity")))?
        .as_f64(&path("quantity"))?;
    let unit = optional_text(record.unit.as_ref()).unwrap_or_else(|| form.clone());

    Ok(MedicationItem {
        medication_code: required(record.medication_code.as_ref(), &path("medication_code"))?,
        medication_name: required(record.medication_name.as_ref(), &path("medication_name"))?,
        strength: required(record.strength.as_ref(), &path("strength"))?.into_string(),
        quantity,
        unit,
        dosage_instruction: required(
            record.dosage_instruction.as_ref(),
            &path("dosage_instruction"),
        )?
        .into_string(),
        route: required(record.route.as_ref(), &path("route"))?.into_string(),
        duration_days: optional_count(record.duration_days.as_ref(), &path("duration_days"))?,
        refills: optional_count(record.refills.as_ref(), &path("refills"))?,
        special_instructions: optional_text(record.special_instructions.as_ref()),
        substitution_allowed: record.substitution_allowed.unwrap_or(true),
        frequency: Some(
            optional_text(record.frequency.as_ref())
                .unwrap_or_else(|| DEFAULT_FREQUENCY.to_string()),
        ),
        start_datetime: record
            .start_datetime
            .as_deref()
            .map(|s| parse_datetime(s, &path("start_datetime")))
            .transpose()?,
        end_datetime: record
            .end_datetime
            .as_deref()
            .map(|s| parse_datetime(s, &path("end_datetime")))
            .transpose()?,
        form,
    })
}

/// Validate a record and convert it to HL7 value types.
///
/// # Errors
///
/// - [`RxError::MissingField`] with the dotted path of the first required
///   field that is absent or blank
/// - [`RxError::InvalidInput`] for dates and numbers that do not parse
pub fn map_record(record: &PrescriptionRecord) -> RxResult<MappedPrescription> {
    let prescription_id = required(record.prescription_id.as_ref(), "prescription_id")?;
    let prescription_date = parse_date(
        required(record.prescription_date.as_ref(), "prescription_date")?.as_str(),
        "prescription_date",
    )?;

    let patient = map_patient(required_section(record.patient.as_ref(), "patient")?)?;
    let provider = map_provider(required_section(
        record.prescribing_doctor.as_ref(),
        "prescribing_doctor",
    )?)?;
    let pharmacy = map_pharmacy(required_section(record.pharmacy.as_ref(), "pharmacy")?)?;

    if record.items.is_empty() {
        return Err(RxError::MissingField("items".into()));
    }
    let medications = record
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| map_item(item, i))
        .collect::<RxResult<Vec<_>>>()?;

    let dispense_as_written = record
        .dispense_as_written
        .unwrap_or(false)
        || record.substitution_allowed == Some(false);

    let prescription = PrescriptionInfo {
        prescription_id,
        prescription_date,
        urgent: record.urgent,
        validity_days: optional_count(record.validity_days.as_ref(), "validity_days")?,
        payment_type: optional_text(record.payment_type.as_ref()),
        insurance: record.insurance_info.as_ref().map(|ins| InsuranceInfo {
            id: optional_text(ins.id.as_ref()),
            name: optional_text(ins.name.as_ref()),
        }),
        clinical_notes: optional_text(record.clinical_notes.as_ref()),
        dispense_as_written,
    };

    tracing::debug!(
        prescription_id = %prescription.prescription_id,
        message_ref = record.message_ref.as_deref().unwrap_or(""),
        items = medications.len(),
        "mapped prescription record"
    );

    Ok(MappedPrescription {
        patient,
        provider,
        pharmacy,
        medications,
        prescription,
    })
}

fn urgent_timing() -> Vec<String> {
    let mut timing = vec![String::new(); PRIORITY_COMPONENT];
    timing[PRIORITY_COMPONENT - 1] = URGENT_PRIORITY.to_string();
    timing
}

/// Write a mapped prescription as an HL7 message for the configured variant.
///
/// When the configuration asks for file or batch headers the message is
/// wrapped in them.
///
/// # Errors
///
/// Returns [`RxError::Hl7`] if a segment cannot be assembled.
pub fn build_message(
    mapped: &MappedPrescription,
    config: &Hl7Config,
    clock: &dyn Clock,
) -> RxResult<BuiltMessage> {
    let prescription = &mapped.prescription;
    let mut builder = MessageBuilder::with_clock(config, clock);

    if config.include_msh {
        builder.add_header()?;
    }
    builder.add_patient_identification(&mapped.patient)?;
    builder.add_visit(OUTPATIENT)?;

    let order = OrderControl {
        placer_order_number: prescription.prescription_id.as_str().to_string(),
        timing_quantity: if prescription.urgent {
            urgent_timing()
        } else {
            Vec::new()
        },
        transaction_at: Some(prescription.prescription_date.and_time(chrono::NaiveTime::MIN)),
        ordering_provider: Some(&mapped.provider),
        ..OrderControl::default()
    };
    builder.add_common_order(&order)?;

    builder.add_diagnoses(&mapped.patient.diagnoses)?;
    builder.add_allergies(mapped.patient.allergies.as_slice())?;

    if let Some(notes) = prescription.clinical_notes.as_deref() {
        builder.add_note(notes, 1, NOTE_SOURCE)?;
    }

    let give = GiveDetails::default();
    for (index, medication) in mapped.medications.iter().enumerate() {
        let medication = if prescription.dispense_as_written && medication.substitution_allowed {
            std::borrow::Cow::Owned(MedicationItem {
                substitution_allowed: false,
                ..medication.clone()
            })
        } else {
            std::borrow::Cow::Borrowed(medication)
        };

        builder.add_pharmacy_order(&medication, &give)?;
        if config.message_type.includes_dispense() {
            let dispense = DispenseDetails {
                dispense_number: u32::try_from(index + 1).map_err(|_| {
                    RxError::InvalidInput("too many medication items".into())
                })?,
                ..DispenseDetails::default()
            };
            builder.add_dispense(&medication, &dispense)?;
        }
    }

    let control_id = builder.control_id().to_string();
    let mut message = builder.build()?;

    let envelope = BatchEnvelope::with_encoding(config, clock, builder.encoding());
    if envelope.is_enabled() {
        message = envelope.wrap(std::slice::from_ref(&message))?;
    }

    let segments = message
        .split(SEGMENT_DELIMITER)
        .filter(|line| !line.is_empty())
        .map(|line| line.chars().take(3).collect())
        .collect::<Vec<String>>();

    tracing::info!(
        control_id = %control_id,
        variant = %config.message_type,
        segments = segments.len(),
        "built prescription message"
    );

    Ok(BuiltMessage {
        message,
        control_id,
        segments,
    })
}
