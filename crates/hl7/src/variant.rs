//! Message variants: the `MSH-9` message type / trigger event pair.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported message structures.
///
/// Configuration accepts either the short tag (`RDE`) or the full structural
/// code (`RDE^O11`). Any other value is kept verbatim in [`MessageVariant::Other`]
/// and written to MSH-9 as given; a wrong value is only noticed by the receiver.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageVariant {
    /// `ORM^O01` general order.
    Order,
    /// `ORU^R01` observation result.
    Observation,
    /// `ADT^A01` admission.
    Admission,
    /// `RDE^O11` pharmacy encoded order, the dispense-oriented variant.
    #[default]
    PharmacyEncodedOrder,
    Other(String),
}

impl MessageVariant {
    /// Resolve a configuration tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "ORM" | "ORM^O01" => MessageVariant::Order,
            "ORU" | "ORU^R01" => MessageVariant::Observation,
            "ADT" | "ADT^A01" => MessageVariant::Admission,
            "RDE" | "RDE^O11" => MessageVariant::PharmacyEncodedOrder,
            _ => {
                tracing::warn!(tag, "unrecognised message variant, passing through verbatim");
                MessageVariant::Other(tag.to_string())
            }
        }
    }

    /// The structural code written to MSH-9, with `^` between its parts.
    pub fn code(&self) -> &str {
        match self {
            MessageVariant::Order => "ORM^O01",
            MessageVariant::Observation => "ORU^R01",
            MessageVariant::Admission => "ADT^A01",
            MessageVariant::PharmacyEncodedOrder => "RDE^O11",
            MessageVariant::Other(code) => code,
        }
    }

    /// Whether each medication also gets a dispense (RXD) segment.
    pub fn includes_dispense(&self) -> bool {
        matches!(self, MessageVariant::PharmacyEncodedOrder)
    }
}

impl fmt::Display for MessageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl From<String> for MessageVariant {
    fn from(tag: String) -> Self {
        MessageVariant::from_tag(&tag)
    }
}

impl From<MessageVariant> for String {
    fn from(variant: MessageVariant) -> Self {
        variant.code().to_string()
    }
}
