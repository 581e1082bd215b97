//! Minimal reader for replies from the receiving system.
//!
//! Only a handful of fields are extracted: the reply's message type and
//! control id (MSH-9, MSH-10), the MSA acknowledgment, and the list of segment
//! codes in order. This is not a general HL7 parser; fields are split on the
//! default `|` separator.

use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    /// `AA`
    Accepted,
    /// `AE`
    Error,
    /// `AR`
    Rejected,
    #[default]
    Unknown,
}

impl AckStatus {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "AA" => AckStatus::Accepted,
            "AE" => AckStatus::Error,
            "AR" => AckStatus::Rejected,
            _ => AckStatus::Unknown,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            AckStatus::Accepted => "accepted",
            AckStatus::Error => "error",
            AckStatus::Rejected => "rejected",
            AckStatus::Unknown => "unknown",
        }
    }
}

/// Contents of an MSA segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Acknowledgment {
    /// MSA-1
    pub code: String,
    /// MSA-2, the control id of the message being acknowledged.
    pub control_id: String,
    /// MSA-3
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResponseSummary {
    pub message_type: Option<String>,
    pub message_control_id: Option<String>,
    pub acknowledgment: Option<Acknowledgment>,
    pub status: AckStatus,
    /// Segment codes in message order, duplicates included.
    pub segments: Vec<String>,
}

/// Summarise a reply message.
///
/// Segments are separated by `\r`; a trailing `\n` on each line is tolerated.
pub fn read_response(text: &str) -> ResponseSummary {
    let mut summary = ResponseSummary::default();

    for line in text.split('\r').map(|l| l.trim_matches('\n')) {
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split('|').collect();
        match parts[0] {
            "MSH" => {
                summary.message_type = parts.get(8).map(|s| s.to_string());
                summary.message_control_id = parts.get(9).map(|s| s.to_string());
            }
            "MSA" => {
                if let Some(code) = parts.get(1) {
                    summary.status = AckStatus::from_code(code);
                    summary.acknowledgment = Some(Acknowledgment {
                        code: code.to_string(),
                        control_id: parts.get(2).unwrap_or(&"").to_string(),
                        message: parts.get(3).unwrap_or(&"").to_string(),
                    });
                }
            }
            _ => {}
        }

        summary.segments.push(line.chars().take(3).collect());
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACK: &str = "MSH|^~\\&|PHARMACY_SYSTEM|PHARMACY|PRESCRIPTION_SYSTEM|HEALTHCARE_PROVIDER|20241210143016||ACK^O11|ACK0001|P|2.5\rMSA|AA|MSG20241210143015123|Message accepted";

    #[test]
    fn reads_accepted_ack() {
        let summary = read_response(ACK);
        assert_eq!(summary.message_type.as_deref(), Some("ACK^O11"));
        assert_eq!(summary.message_control_id.as_deref(), Some("ACK0001"));
        assert_eq!(summary.status, AckStatus::Accepted);
        let ack = summary.acknowledgment.expect("msa present");
        assert_eq!(ack.code, "AA");
        assert_eq!(ack.control_id, "MSG20241210143015123");
        assert_eq!(ack.message, "Message accepted");
        assert_eq!(summary.segments, vec!["MSH", "MSA"]);
    }

    #[test]
    fn classifies_ack_codes() {
        assert_eq!(read_response("MSA|AE|X").status, AckStatus::Error);
        assert_eq!(read_response("MSA|AR|X").status, AckStatus::Rejected);
        assert_eq!(read_response("MSA|CA|X").status, AckStatus::Unknown);
        assert_eq!(read_response("MSA").status, AckStatus::Unknown);
    }

    #[test]
    fn missing_msa_is_unknown() {
        let summary = read_response("MSH|^~\\&|A|B\rERR|1");
        assert_eq!(summary.status, AckStatus::Unknown);
        assert!(summary.acknowledgment.is_none());
        assert_eq!(summary.message_type, None);
    }

    #[test]
    fn segment_inventory_keeps_order_and_duplicates() {
        let summary = read_response("MSH|^~\\&\r\nNTE|1\r\nNTE|2\r\nMSA|AA|1\r\n");
        assert_eq!(summary.segments, vec!["MSH", "NTE", "NTE", "MSA"]);
    }

    #[test]
    fn status_names() {
        assert_eq!(AckStatus::Accepted.as_str(), "accepted");
        assert_eq!(AckStatus::default().as_str(), "unknown");
    }
}
