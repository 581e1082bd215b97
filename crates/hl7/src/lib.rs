//! # HL7
//!
//! Building blocks for pipe-delimited HL7 v2 messages:
//! - [`EncodingProfile`]: delimiter set and the escape/unescape rules
//! - [`Segment`]: positional fields with backfill and escaping
//! - [`MessageBuilder`]: fixed layouts for the segments of a prescription order
//! - [`BatchEnvelope`]: optional FHS/BHS wrapping of complete messages
//! - [`read_response`]: a minimal reader for acknowledgment replies
//!
//! **No record mapping**: turning an input prescription record into the value
//! types in [`model`] belongs in `rx-core`.

pub mod ack;
pub mod batch;
pub mod builder;
pub mod clock;
pub mod config;
pub mod encoding;
pub mod model;
pub mod segment;
pub mod tables;
pub mod variant;

pub use ack::{read_response, AckStatus, Acknowledgment, ResponseSummary};
pub use batch::BatchEnvelope;
pub use builder::{
    generate_control_id, name_components, DispenseDetails, GiveDetails, MessageBuilder,
    OrderControl,
};
pub use clock::{format_date, format_timestamp, Clock, FixedClock, SystemClock};
pub use config::{EscapePolicy, Hl7Config};
pub use encoding::EncodingProfile;
pub use model::{
    Diagnosis, InsuranceInfo, MedicationItem, PatientInfo, PharmacyInfo, PrescribingProvider,
    PrescriptionInfo,
};
pub use segment::{FieldPolicy, Segment};
pub use tables::{describe, lookup, CodeTable};
pub use variant::MessageVariant;

/// Separator between segments. No delimiter follows the last segment.
pub const SEGMENT_DELIMITER: &str = "\r";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Hl7Error {
    #[error("invalid position: field {field}, component {component:?}")]
    InvalidPosition {
        field: usize,
        component: Option<usize>,
    },
    #[error("field {segment}-{field} is {length} characters, over the limit of {max}")]
    FieldTooLong {
        segment: String,
        field: usize,
        length: usize,
        max: usize,
    },
    #[error("invalid encoding characters: {0}")]
    InvalidEncoding(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Hl7Result<T> = std::result::Result<T, Hl7Error>;
