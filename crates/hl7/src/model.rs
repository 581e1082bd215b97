//! Domain value objects consumed by the message builder.
//!
//! These are already validated: required identifiers are [`NonEmptyText`] and
//! dates are parsed. Turning an external record into these values (and
//! reporting missing fields) is the job of the prescription mapper.

use chrono::{NaiveDate, NaiveDateTime};
use rx_types::NonEmptyText;

#[derive(Clone, Debug, PartialEq)]
pub struct PatientInfo {
    pub patient_id: NonEmptyText,
    /// Free-text name, "Given Middle Family".
    pub name: NonEmptyText,
    pub date_of_birth: NaiveDate,
    /// Administrative sex code (HL7 table 0001).
    pub gender: String,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub allergies: Vec<String>,
    pub diagnoses: Vec<Diagnosis>,
}

/// An ICD-10 coded diagnosis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnosis {
    pub code: NonEmptyText,
    pub description: Option<String>,
}

impl Diagnosis {
    pub fn new(code: NonEmptyText) -> Self {
        Self {
            code,
            description: None,
        }
    }

    pub fn with_description(code: NonEmptyText, description: impl Into<String>) -> Self {
        Self {
            code,
            description: Some(description.into()),
        }
    }

    /// Description to render, repeating the code when none was supplied.
    pub fn display_text(&self) -> &str {
        self.description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(self.code.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrescribingProvider {
    pub id: NonEmptyText,
    pub name: NonEmptyText,
    pub qualification: Option<String>,
    pub specialty: Option<String>,
    pub contact: Option<String>,
    pub address: Option<String>,
}

impl PrescribingProvider {
    pub fn new(id: NonEmptyText, name: NonEmptyText) -> Self {
        Self {
            id,
            name,
            qualification: None,
            specialty: None,
            contact: None,
            address: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PharmacyInfo {
    pub id: NonEmptyText,
    pub name: NonEmptyText,
    pub address: Option<String>,
    pub contact: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MedicationItem {
    pub medication_code: NonEmptyText,
    pub medication_name: NonEmptyText,
    /// Dosage form code (see `CodeTable::MedicationForm`).
    pub form: String,
    pub strength: String,
    pub quantity: f64,
    pub unit: String,
    pub dosage_instruction: String,
    /// Route code (HL7 table 0162).
    pub route: String,
    pub duration_days: Option<u32>,
    pub refills: Option<u32>,
    pub special_instructions: Option<String>,
    pub substitution_allowed: bool,
    pub frequency: Option<String>,
    pub start_datetime: Option<NaiveDateTime>,
    pub end_datetime: Option<NaiveDateTime>,
}

impl MedicationItem {
    /// A medication with only its identity set; remaining fields are blank.
    pub fn new(medication_code: NonEmptyText, medication_name: NonEmptyText) -> Self {
        Self {
            medication_code,
            medication_name,
            form: String::new(),
            strength: String::new(),
            quantity: 0.0,
            unit: String::new(),
            dosage_instruction: String::new(),
            route: String::new(),
            duration_days: None,
            refills: None,
            special_instructions: None,
            substitution_allowed: true,
            frequency: None,
            start_datetime: None,
            end_datetime: None,
        }
    }

    /// Administration text: the dosage instruction, with special instructions appended.
    pub fn administration_instructions(&self) -> String {
        match self.special_instructions.as_deref().filter(|s| !s.is_empty()) {
            Some(special) if self.dosage_instruction.is_empty() => special.to_string(),
            Some(special) => format!("{}; {}", self.dosage_instruction, special),
            None => self.dosage_instruction.clone(),
        }
    }

    /// `G` when generic substitution is allowed, `N` otherwise.
    pub fn substitution_code(&self) -> &'static str {
        if self.substitution_allowed {
            "G"
        } else {
            "N"
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsuranceInfo {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// The prescription envelope around the medication items.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrescriptionInfo {
    pub prescription_id: NonEmptyText,
    pub prescription_date: NaiveDate,
    pub urgent: bool,
    pub validity_days: Option<u32>,
    pub payment_type: Option<String>,
    pub insurance: Option<InsuranceInfo>,
    pub clinical_notes: Option<String>,
    pub dispense_as_written: bool,
}

/// Render a numeric amount without a trailing `.0` for whole numbers.
pub fn format_amount(value: f64) -> String {
    format!("{value}")
}
