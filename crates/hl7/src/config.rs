//! Message configuration.
//!
//! Configuration is resolved once (from defaults, a YAML file or a caller) and
//! then shared read-only by every build. Nothing in this crate reads
//! environment variables; binaries resolve those at startup.

use crate::segment::FieldPolicy;
use crate::variant::MessageVariant;
use crate::{Hl7Error, Hl7Result};
use serde::{Deserialize, Serialize};

/// Whether structural characters inside values are escaped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscapePolicy {
    /// Replace structural characters with `\X\` sequences.
    #[default]
    Structural,
    /// Store values verbatim. Only safe when inputs are known to be clean.
    None,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Hl7Config {
    pub version: String,
    pub message_type: MessageVariant,
    pub sending_application: String,
    pub sending_facility: String,
    pub receiving_application: String,
    pub receiving_facility: String,
    pub charset: String,
    pub country_code: String,
    pub processing_id: String,
    /// Explicit MSH-10 value; generated from the clock when absent.
    pub message_control_id: Option<String>,
    pub include_msh: bool,
    pub include_bhs: bool,
    pub include_fhs: bool,
    /// Maximum characters per stored field after escaping; `0` means unlimited.
    /// A longer field fails the build with `Hl7Error::FieldTooLong`.
    pub max_field_length: usize,
    pub escape_policy: EscapePolicy,
}

impl Default for Hl7Config {
    fn default() -> Self {
        Self {
            version: "2.5".into(),
            message_type: MessageVariant::PharmacyEncodedOrder,
            sending_application: "PRESCRIPTION_SYSTEM".into(),
            sending_facility: "HEALTHCARE_PROVIDER".into(),
            receiving_application: "PHARMACY_SYSTEM".into(),
            receiving_facility: "PHARMACY".into(),
            charset: "UTF-8".into(),
            country_code: "USA".into(),
            processing_id: "P".into(),
            message_control_id: None,
            include_msh: true,
            include_bhs: false,
            include_fhs: false,
            max_field_length: 0,
            escape_policy: EscapePolicy::Structural,
        }
    }
}

impl Hl7Config {
    /// Parse a configuration from YAML text. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Hl7Error::InvalidConfig`] naming the offending key path when
    /// the YAML does not match the configuration schema.
    pub fn from_yaml(yaml_text: &str) -> Hl7Result<Self> {
        if yaml_text.trim().is_empty() {
            return Ok(Self::default());
        }

        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        serde_path_to_error::deserialize::<_, Hl7Config>(deserializer).map_err(|err| {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>".to_string()
            } else {
                path
            };
            Hl7Error::InvalidConfig(format!("config schema mismatch at {path}: {source}"))
        })
    }

    /// Field policy derived from the escape and length flags.
    pub fn field_policy(&self) -> FieldPolicy {
        FieldPolicy {
            escape: self.escape_policy,
            max_length: (self.max_field_length > 0).then_some(self.max_field_length),
        }
    }

    /// Copy of this configuration with a different message variant.
    pub fn with_variant(&self, variant: MessageVariant) -> Self {
        Self {
            message_type: variant,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pharmacy_order() {
        let cfg = Hl7Config::default();
        assert_eq!(cfg.version, "2.5");
        assert_eq!(cfg.message_type.code(), "RDE^O11");
        assert!(cfg.include_msh);
        assert!(!cfg.include_bhs);
        assert_eq!(cfg.max_field_length, 0);
        assert_eq!(cfg.field_policy().max_length, None);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = Hl7Config::from_yaml(
            r#"message_type: ORM
sending_application: EDIFACT_CONVERTER
escape_policy: none
max_field_length: 64
"#,
        )
        .expect("valid config");

        assert_eq!(cfg.message_type, MessageVariant::Order);
        assert_eq!(cfg.sending_application, "EDIFACT_CONVERTER");
        assert_eq!(cfg.receiving_facility, "PHARMACY");
        assert_eq!(cfg.escape_policy, EscapePolicy::None);
        assert_eq!(cfg.field_policy().max_length, Some(64));
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(Hl7Config::from_yaml("  \n").expect("empty"), Hl7Config::default());
    }

    #[test]
    fn unknown_keys_are_rejected_with_path() {
        let err = Hl7Config::from_yaml("include_msh: true\nbogus_flag: 1\n")
            .expect_err("unknown key");
        match err {
            Hl7Error::InvalidConfig(msg) => assert!(msg.contains("bogus_flag")),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn wrong_types_report_the_key() {
        let err = Hl7Config::from_yaml("max_field_length: lots\n").expect_err("wrong type");
        match err {
            Hl7Error::InvalidConfig(msg) => assert!(msg.contains("max_field_length")),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }
}
