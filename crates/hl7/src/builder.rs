//! Message assembly.
//!
//! [`MessageBuilder`] appends segments in the order its methods are called and
//! renders them with [`MessageBuilder::build`]. Each `add_*` method owns the
//! positional layout of its segment type; callers never address fields
//! directly.
//!
//! Segments are only ever appended. The one exception is the MSH header, which
//! `build` inserts at the front if the configuration asks for one and none was
//! added explicitly.

use crate::clock::{format_date, format_timestamp, Clock, SystemClock};
use crate::config::Hl7Config;
use crate::encoding::EncodingProfile;
use crate::model::{
    format_amount, Diagnosis, MedicationItem, PatientInfo, PrescribingProvider,
};
use crate::segment::Segment;
use crate::tables::{describe, CodeTable};
use crate::{Hl7Result, SEGMENT_DELIMITER};
use chrono::NaiveDateTime;

const MSH_FIELDS: usize = 20;
const PID_FIELDS: usize = 30;
const OBX_FIELDS: usize = 16;
const PV1_FIELDS: usize = 50;
const ORC_FIELDS: usize = 16;
const RXE_FIELDS: usize = 30;
const RXR_FIELDS: usize = 6;
const RXD_FIELDS: usize = 38;
const DG1_FIELDS: usize = 21;
const AL1_FIELDS: usize = 6;

/// Prefix of generated control ids.
const CONTROL_ID_PREFIX: &str = "MSG";

/// Coding system used for diagnoses (ICD-10).
const DIAGNOSIS_CODING_SYSTEM: &str = "I10";

/// Route table identifier written after the route description.
const ROUTE_TABLE_ID: &str = "HL70162";

/// Body measurements carried in OBX segments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Measurement {
    Weight,
    Height,
}

impl Measurement {
    /// LOINC code, display name and coding system.
    const fn identifier(self) -> [&'static str; 3] {
        match self {
            Measurement::Weight => ["3141-9", "Body weight Measured", "LN"],
            Measurement::Height => ["8302-2", "Body height", "LN"],
        }
    }

    const fn unit(self) -> &'static str {
        match self {
            Measurement::Weight => "kg",
            Measurement::Height => "cm",
        }
    }
}

/// Fields of an ORC (common order) segment.
#[derive(Clone, Debug)]
pub struct OrderControl<'p> {
    pub order_control: String,
    pub placer_order_number: String,
    pub filler_order_number: String,
    pub order_status: String,
    pub response_flag: Option<String>,
    /// Components of ORC-7 (timing/quantity); empty leaves the field blank.
    pub timing_quantity: Vec<String>,
    pub parent_order: Option<String>,
    /// Transaction time; the clock is used when absent.
    pub transaction_at: Option<NaiveDateTime>,
    pub entered_by: Option<&'p PrescribingProvider>,
    pub verified_by: Option<&'p PrescribingProvider>,
    pub ordering_provider: Option<&'p PrescribingProvider>,
}

impl Default for OrderControl<'_> {
    fn default() -> Self {
        Self {
            order_control: "NW".into(),
            placer_order_number: String::new(),
            filler_order_number: String::new(),
            order_status: "SC".into(),
            response_flag: None,
            timing_quantity: Vec::new(),
            parent_order: None,
            transaction_at: None,
            entered_by: None,
            verified_by: None,
            ordering_provider: None,
        }
    }
}

/// RXE give fields (RXE-22 to RXE-26).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GiveDetails {
    pub give_per: Option<String>,
    pub give_rate: Option<String>,
    pub give_units: Option<String>,
    pub give_strength: Option<String>,
    pub give_strength_units: Option<String>,
}

impl Default for GiveDetails {
    fn default() -> Self {
        Self {
            give_per: Some("DOSE".into()),
            give_rate: None,
            give_units: None,
            give_strength: None,
            give_strength_units: None,
        }
    }
}

/// RXD fields that are not taken from the medication item.
#[derive(Clone, Debug, PartialEq)]
pub struct DispenseDetails {
    pub dispense_number: u32,
    /// Overrides the medication's quantity when set.
    pub quantity_dispensed: Option<f64>,
    /// Fill time; the clock is used when absent.
    pub fill_at: Option<NaiveDateTime>,
}

impl Default for DispenseDetails {
    fn default() -> Self {
        Self {
            dispense_number: 1,
            quantity_dispensed: None,
            fill_at: None,
        }
    }
}

/// Split a free-text name into XPN components: `family^given[^middle...]`.
///
/// The first whitespace-separated token is taken as the given name and the last
/// as the family name; tokens in between become further components. A single
/// token is returned unchanged. This is a heuristic: prefixes, suffixes and
/// multi-word family names are not recognised.
pub fn name_components(name: &str) -> Vec<&str> {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    match tokens.as_slice() {
        [given, middle @ .., family] => {
            let mut components = Vec::with_capacity(tokens.len());
            components.push(*family);
            components.push(*given);
            components.extend_from_slice(middle);
            components
        }
        _ => vec![name.trim()],
    }
}

/// Control id derived from the clock: `MSG` followed by the timestamp to the millisecond.
pub fn generate_control_id(now: &NaiveDateTime) -> String {
    let mut stamp = now.format("%Y%m%d%H%M%S%6f").to_string();
    stamp.truncate(stamp.len().saturating_sub(3));
    format!("{CONTROL_ID_PREFIX}{stamp}")
}

/// Accumulates the segments of one message.
///
/// A builder belongs to a single build. The configuration and clock are
/// borrowed and only read.
pub struct MessageBuilder<'a> {
    config: &'a Hl7Config,
    clock: &'a dyn Clock,
    encoding: EncodingProfile,
    control_id: String,
    segments: Vec<Segment>,
}

impl<'a> MessageBuilder<'a> {
    /// Builder using the system clock and the default encoding characters.
    pub fn new(config: &'a Hl7Config) -> Self {
        Self::with_clock(config, &SystemClock)
    }

    pub fn with_clock(config: &'a Hl7Config, clock: &'a dyn Clock) -> Self {
        Self::with_encoding(config, clock, EncodingProfile::default())
    }

    pub fn with_encoding(
        config: &'a Hl7Config,
        clock: &'a dyn Clock,
        encoding: EncodingProfile,
    ) -> Self {
        let control_id = config
            .message_control_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| generate_control_id(&clock.now()));

        Self {
            config,
            clock,
            encoding,
            control_id,
            segments: Vec::new(),
        }
    }

    pub fn control_id(&self) -> &str {
        &self.control_id
    }

    pub fn encoding(&self) -> EncodingProfile {
        self.encoding
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn new_segment(&self, id: &str) -> Segment {
        Segment::with_policy(id, self.encoding, self.config.field_policy())
    }

    fn push(&mut self, segment: Segment) {
        tracing::debug!(segment = segment.id(), fields = segment.len(), "appended segment");
        self.segments.push(segment);
    }

    fn count(&self, id: &str) -> usize {
        self.segments.iter().filter(|s| s.id() == id).count()
    }

    fn has(&self, id: &str) -> bool {
        self.segments.iter().any(|s| s.id() == id)
    }

    fn now_stamp(&self) -> String {
        format_timestamp(&self.clock.now())
    }

    fn header_segment(&self) -> Hl7Result<Segment> {
        let cfg = self.config;
        let mut msh = self.new_segment("MSH");
        msh.set_raw(2, self.encoding.encoding_characters())?;
        msh.set_field(3, cfg.sending_application.as_str())?;
        msh.set_field(4, cfg.sending_facility.as_str())?;
        msh.set_field(5, cfg.receiving_application.as_str())?;
        msh.set_field(6, cfg.receiving_facility.as_str())?;
        msh.set_field(7, self.now_stamp().as_str())?;

        // The message type is a composite; write its parts as components.
        let type_parts: Vec<&str> = cfg.message_type.code().split('^').collect();
        msh.set_components(9, &type_parts)?;

        msh.set_field(10, self.control_id.as_str())?;
        msh.set_field(11, cfg.processing_id.as_str())?;
        msh.set_field(12, cfg.version.as_str())?;
        msh.set_field(15, "AL")?;
        msh.set_field(16, "AL")?;
        msh.set_field(17, cfg.country_code.as_str())?;
        msh.set_field(18, cfg.charset.as_str())?;
        msh.pad_to(MSH_FIELDS);
        Ok(msh)
    }

    /// Append the MSH header segment.
    pub fn add_header(&mut self) -> Hl7Result<()> {
        let msh = self.header_segment()?;
        self.push(msh);
        Ok(())
    }

    /// Append PID, followed by OBX weight and height segments when known.
    pub fn add_patient_identification(&mut self, patient: &PatientInfo) -> Hl7Result<()> {
        let mut pid = self.new_segment("PID");
        pid.set_field(1, "1")?;
        pid.set_components(
            3,
            &[
                patient.patient_id.as_str(),
                "",
                self.config.sending_facility.as_str(),
                "MR",
            ],
        )?;
        pid.set_components(5, &name_components(patient.name.as_str()))?;
        pid.set_field(7, format_date(&patient.date_of_birth).as_str())?;
        pid.set_field(8, patient.gender.as_str())?;
        pid.pad_to(PID_FIELDS);
        self.push(pid);

        if let Some(weight) = patient.weight_kg {
            self.add_observation(Measurement::Weight, weight)?;
        }
        if let Some(height) = patient.height_cm {
            self.add_observation(Measurement::Height, height)?;
        }
        Ok(())
    }

    fn add_observation(&mut self, measurement: Measurement, value: f64) -> Hl7Result<()> {
        let set_id = self.count("OBX") + 1;

        let mut obx = self.new_segment("OBX");
        obx.set_field(1, set_id.to_string().as_str())?;
        obx.set_field(2, "NM")?;
        obx.set_components(3, &measurement.identifier())?;
        obx.set_field(5, format_amount(value).as_str())?;
        obx.set_field(6, measurement.unit())?;
        obx.set_field(11, "F")?;
        obx.set_field(14, self.now_stamp().as_str())?;
        obx.pad_to(OBX_FIELDS);
        self.push(obx);
        Ok(())
    }

    /// Append PV1 with the given patient class (HL7 table 0004).
    pub fn add_visit(&mut self, patient_class: &str) -> Hl7Result<()> {
        let mut pv1 = self.new_segment("PV1");
        pv1.set_field(1, "1")?;
        pv1.set_field(2, patient_class)?;
        pv1.pad_to(PV1_FIELDS);
        self.push(pv1);
        Ok(())
    }

    /// Append ORC.
    pub fn add_common_order(&mut self, order: &OrderControl<'_>) -> Hl7Result<()> {
        let mut orc = self.new_segment("ORC");
        orc.set_field(1, order.order_control.as_str())?;
        orc.set_field(2, order.placer_order_number.as_str())?;
        orc.set_field(3, order.filler_order_number.as_str())?;
        orc.set_field(5, order.order_status.as_str())?;
        orc.set_field(6, order.response_flag.as_deref())?;

        if !order.timing_quantity.is_empty() {
            let parts: Vec<&str> = order.timing_quantity.iter().map(String::as_str).collect();
            orc.set_components(7, &parts)?;
        }

        orc.set_field(8, order.parent_order.as_deref())?;
        let transaction_at = order.transaction_at.unwrap_or_else(|| self.clock.now());
        orc.set_field(9, format_timestamp(&transaction_at).as_str())?;

        let providers = [
            (10, order.entered_by),
            (11, order.verified_by),
            (12, order.ordering_provider),
        ];
        for (position, provider) in providers {
            if let Some(provider) = provider {
                orc.set_components(position, &[provider.name.as_str(), provider.id.as_str()])?;
            }
        }

        orc.pad_to(ORC_FIELDS);
        self.push(orc);
        Ok(())
    }

    /// Append RXE for `medication` and the RXR route segment that must follow it.
    pub fn add_pharmacy_order(
        &mut self,
        medication: &MedicationItem,
        give: &GiveDetails,
    ) -> Hl7Result<()> {
        let mut rxe = self.new_segment("RXE");

        let mut timing: Vec<String> = Vec::new();
        if let Some(frequency) = medication.frequency.as_deref().filter(|f| !f.is_empty()) {
            timing.push(frequency.to_string());
        }
        if let Some(start) = &medication.start_datetime {
            timing.push(format_timestamp(start));
        }
        if let Some(days) = medication.duration_days.filter(|d| *d > 0) {
            timing.push(format!("{days}D"));
        }
        let timing: Vec<&str> = timing.iter().map(String::as_str).collect();
        rxe.set_components(1, &timing)?;

        let quantity = format_amount(medication.quantity);
        rxe.set_components(2, &medication_identifier(medication))?;
        rxe.set_field(3, quantity.as_str())?;
        rxe.set_field(5, medication.unit.as_str())?;
        rxe.set_field(6, describe(CodeTable::MedicationForm, &medication.form))?;
        rxe.set_field(7, medication.administration_instructions().as_str())?;
        rxe.set_field(9, medication.substitution_code())?;
        rxe.set_field(10, quantity.as_str())?;
        rxe.set_field(11, medication.unit.as_str())?;
        rxe.set_field(12, medication.refills.unwrap_or(0).to_string().as_str())?;
        rxe.pad_to(21);
        rxe.set_field(22, give.give_per.as_deref())?;
        rxe.set_field(23, give.give_rate.as_deref())?;
        rxe.set_field(24, give.give_units.as_deref())?;
        rxe.set_field(25, give.give_strength.as_deref())?;
        rxe.set_field(26, give.give_strength_units.as_deref())?;
        rxe.pad_to(RXE_FIELDS);
        self.push(rxe);

        self.add_route(&medication.route, None)
    }

    /// Append RXR for a route code and optional administration site.
    pub fn add_route(&mut self, route: &str, site: Option<&str>) -> Hl7Result<()> {
        let mut rxr = self.new_segment("RXR");
        rxr.set_components(1, &[route, describe(CodeTable::Route, route), ROUTE_TABLE_ID])?;
        rxr.set_field(2, site)?;
        rxr.pad_to(RXR_FIELDS);
        self.push(rxr);
        Ok(())
    }

    /// Append RXD for one dispense of `medication`.
    pub fn add_dispense(
        &mut self,
        medication: &MedicationItem,
        details: &DispenseDetails,
    ) -> Hl7Result<()> {
        let mut rxd = self.new_segment("RXD");
        rxd.set_field(1, details.dispense_number.to_string().as_str())?;
        rxd.set_components(2, &medication_identifier(medication))?;
        let fill_at = details.fill_at.unwrap_or_else(|| self.clock.now());
        rxd.set_field(3, format_timestamp(&fill_at).as_str())?;
        let quantity = details.quantity_dispensed.unwrap_or(medication.quantity);
        rxd.set_field(4, format_amount(quantity).as_str())?;
        rxd.set_field(5, medication.unit.as_str())?;
        rxd.set_field(6, describe(CodeTable::MedicationForm, &medication.form))?;
        rxd.set_field(8, medication.refills.unwrap_or(0).to_string().as_str())?;
        rxd.set_field(11, medication.substitution_code())?;
        rxd.set_field(16, medication.strength.as_str())?;
        rxd.pad_to(RXD_FIELDS);
        self.push(rxd);
        Ok(())
    }

    /// Append one DG1 per diagnosis, numbered from 1.
    pub fn add_diagnoses(&mut self, diagnoses: &[Diagnosis]) -> Hl7Result<()> {
        for (index, diagnosis) in diagnoses.iter().enumerate() {
            let mut dg1 = self.new_segment("DG1");
            dg1.set_field(1, (index + 1).to_string().as_str())?;
            dg1.set_field(2, DIAGNOSIS_CODING_SYSTEM)?;
            dg1.set_components(
                3,
                &[
                    diagnosis.code.as_str(),
                    diagnosis.display_text(),
                    DIAGNOSIS_CODING_SYSTEM,
                ],
            )?;
            dg1.set_field(5, self.now_stamp().as_str())?;
            // Working diagnosis.
            dg1.set_field(6, "W")?;
            dg1.pad_to(DG1_FIELDS);
            self.push(dg1);
        }
        Ok(())
    }

    /// Append one AL1 per drug allergy, numbered from 1.
    pub fn add_allergies<S: AsRef<str>>(&mut self, allergies: &[S]) -> Hl7Result<()> {
        for (index, allergy) in allergies.iter().enumerate() {
            let mut al1 = self.new_segment("AL1");
            al1.add_field(1, (index + 1).to_string().as_str())?;
            al1.add_field(2, "DA")?;
            al1.add_field(3, allergy.as_ref())?;
            al1.pad_to(AL1_FIELDS);
            self.push(al1);
        }
        Ok(())
    }

    /// Append an NTE note.
    pub fn add_note(&mut self, comment: &str, set_id: u32, source: &str) -> Hl7Result<()> {
        let mut nte = self.new_segment("NTE");
        nte.add_field(1, set_id.to_string().as_str())?;
        nte.add_field(2, source)?;
        nte.add_field(3, comment)?;
        self.push(nte);
        Ok(())
    }

    /// Render the message.
    ///
    /// If the configuration requests a header and none has been added, one is
    /// inserted at the front first. Calling `build` again without appending
    /// returns the same text.
    pub fn build(&mut self) -> Hl7Result<String> {
        if self.config.include_msh && !self.has("MSH") {
            let msh = self.header_segment()?;
            tracing::debug!(control_id = %self.control_id, "inserted missing MSH header");
            self.segments.insert(0, msh);
        }

        Ok(self
            .segments
            .iter()
            .map(Segment::serialize)
            .collect::<Vec<_>>()
            .join(SEGMENT_DELIMITER))
    }
}

fn medication_identifier(medication: &MedicationItem) -> [&str; 3] {
    [
        medication.medication_code.as_str(),
        medication.medication_name.as_str(),
        "NDC",
    ]
}
