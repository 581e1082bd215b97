//! File and batch envelopes (FHS/BHS ... BTS/FTS).
//!
//! When configured, complete messages are wrapped as
//!
//! ```text
//! FHS
//! BHS
//! <message>...
//! BTS|<message count>
//! FTS|<batch count>
//! ```
//!
//! Either envelope may be used on its own.

use crate::clock::{format_timestamp, Clock};
use crate::config::Hl7Config;
use crate::encoding::EncodingProfile;
use crate::segment::Segment;
use crate::{Hl7Result, SEGMENT_DELIMITER};

pub struct BatchEnvelope<'a> {
    config: &'a Hl7Config,
    clock: &'a dyn Clock,
    encoding: EncodingProfile,
}

impl<'a> BatchEnvelope<'a> {
    pub fn new(config: &'a Hl7Config, clock: &'a dyn Clock) -> Self {
        Self::with_encoding(config, clock, EncodingProfile::default())
    }

    /// Envelope whose header segments use the same delimiters as the wrapped messages.
    pub fn with_encoding(
        config: &'a Hl7Config,
        clock: &'a dyn Clock,
        encoding: EncodingProfile,
    ) -> Self {
        Self {
            config,
            clock,
            encoding,
        }
    }

    /// Whether the configuration asks for any envelope at all.
    pub fn is_enabled(&self) -> bool {
        self.config.include_fhs || self.config.include_bhs
    }

    fn header(&self, id: &str, stamp: &str) -> Hl7Result<Segment> {
        let cfg = self.config;
        let mut seg = Segment::with_policy(id, self.encoding, cfg.field_policy());
        seg.set_raw(2, self.encoding.encoding_characters())?;
        seg.set_field(3, cfg.sending_application.as_str())?;
        seg.set_field(4, cfg.sending_facility.as_str())?;
        seg.set_field(5, cfg.receiving_application.as_str())?;
        seg.set_field(6, cfg.receiving_facility.as_str())?;
        seg.set_field(7, stamp)?;
        Ok(seg)
    }

    fn trailer(&self, id: &str, count: usize) -> Hl7Result<Segment> {
        let mut seg = Segment::with_policy(id, self.encoding, self.config.field_policy());
        seg.set_field(1, count.to_string().as_str())?;
        Ok(seg)
    }

    /// Wrap already-built messages in the configured envelopes.
    pub fn wrap(&self, messages: &[String]) -> Hl7Result<String> {
        let stamp = format_timestamp(&self.clock.now());
        let mut lines: Vec<String> = Vec::with_capacity(messages.len() + 4);

        if self.config.include_fhs {
            lines.push(self.header("FHS", &stamp)?.serialize());
        }
        if self.config.include_bhs {
            lines.push(self.header("BHS", &stamp)?.serialize());
        }
        lines.extend(messages.iter().cloned());
        if self.config.include_bhs {
            lines.push(self.trailer("BTS", messages.len())?.serialize());
        }
        if self.config.include_fhs {
            // Without a batch header each message counts on its own.
            let batches = if self.config.include_bhs { 1 } else { messages.len() };
            lines.push(self.trailer("FTS", batches)?.serialize());
        }

        tracing::debug!(messages = messages.len(), "wrapped messages in batch envelope");
        Ok(lines.join(SEGMENT_DELIMITER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::NaiveDate;

    fn clock() -> FixedClock {
        FixedClock(
            NaiveDate::from_ymd_opt(2024, 12, 10)
                .and_then(|d| d.and_hms_opt(14, 30, 15))
                .expect("valid datetime"),
        )
    }

    #[test]
    fn no_envelope_by_default() {
        let cfg = Hl7Config::default();
        let clock = clock();
        let envelope = BatchEnvelope::new(&cfg, &clock);
        assert!(!envelope.is_enabled());
        let out = envelope.wrap(&["MSH|a".to_string()]).expect("wrap");
        assert_eq!(out, "MSH|a");
    }

    #[test]
    fn file_and_batch_envelopes() {
        let cfg = Hl7Config {
            include_fhs: true,
            include_bhs: true,
            ..Hl7Config::default()
        };
        let clock = clock();
        let out = BatchEnvelope::new(&cfg, &clock)
            .wrap(&["MSH|one".to_string(), "MSH|two".to_string()])
            .expect("wrap");
        let lines: Vec<&str> = out.split('\r').collect();

        assert_eq!(
            lines[0],
            "FHS|^~\\&|PRESCRIPTION_SYSTEM|HEALTHCARE_PROVIDER|PHARMACY_SYSTEM|PHARMACY|20241210143015"
        );
        assert!(lines[1].starts_with("BHS|^~\\&|"));
        assert_eq!(&lines[2..4], &["MSH|one", "MSH|two"]);
        assert_eq!(lines[4], "BTS|2");
        assert_eq!(lines[5], "FTS|1");
    }

    #[test]
    fn file_envelope_alone_counts_messages() {
        let cfg = Hl7Config {
            include_fhs: true,
            ..Hl7Config::default()
        };
        let clock = clock();
        let out = BatchEnvelope::new(&cfg, &clock)
            .wrap(&["MSH|one".to_string()])
            .expect("wrap");
        assert!(out.ends_with("\rMSH|one\rFTS|1"));
        assert!(!out.contains("BHS"));
    }

    #[test]
    fn envelope_follows_message_encoding() {
        let cfg = Hl7Config {
            include_fhs: true,
            include_bhs: true,
            ..Hl7Config::default()
        };
        let clock = clock();
        let encoding = EncodingProfile::new('#', '$', '*', '!', '@').expect("distinct characters");
        let out = BatchEnvelope::with_encoding(&cfg, &clock, encoding)
            .wrap(&["MSH#$*!@#one".to_string()])
            .expect("wrap");
        let lines: Vec<&str> = out.split('\r').collect();

        assert!(lines[0].starts_with("FHS#$*!@#PRESCRIPTION_SYSTEM#"));
        assert!(lines[1].starts_with("BHS#$*!@#PRESCRIPTION_SYSTEM#"));
        assert_eq!(lines[3], "BTS#1");
        assert_eq!(lines[4], "FTS#1");
    }
}
