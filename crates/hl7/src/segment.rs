//! A single HL7 segment: a type code followed by 1-indexed, sparse fields.
//!
//! Field storage is private. All writes go through setters that keep the
//! backfill invariant: after any write at position `N`, every position below
//! `N` holds a value (possibly empty), so serialisation never shifts columns.

use crate::config::EscapePolicy;
use crate::encoding::EncodingProfile;
use crate::{Hl7Error, Hl7Result};
use std::fmt;

/// Segment codes whose first field is the field separator itself.
const HEADER_SEGMENTS: [&str; 3] = ["MSH", "FHS", "BHS"];

/// How scalar values are treated as they are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldPolicy {
    pub escape: EscapePolicy,
    /// Maximum characters of a stored field, measured after escaping and
    /// joining components; `None` means unlimited. Longer fields are rejected.
    pub max_length: Option<usize>,
}

impl Default for FieldPolicy {
    fn default() -> Self {
        Self {
            escape: EscapePolicy::Structural,
            max_length: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    id: String,
    encoding: EncodingProfile,
    policy: FieldPolicy,
    fields: Vec<String>,
}

impl Segment {
    /// Create an empty segment.
    ///
    /// Header segments (`MSH`, `FHS`, `BHS`) start with field 1 holding the
    /// field separator, following the HL7 convention that the separator is
    /// the first field of those segments.
    pub fn new(id: impl Into<String>, encoding: EncodingProfile) -> Self {
        Self::with_policy(id, encoding, FieldPolicy::default())
    }

    pub fn with_policy(id: impl Into<String>, encoding: EncodingProfile, policy: FieldPolicy) -> Self {
        let id = id.into();
        let fields = if HEADER_SEGMENTS.contains(&id.as_str()) {
            vec![encoding.field().to_string()]
        } else {
            Vec::new()
        };

        Self {
            id,
            encoding,
            policy,
            fields,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_header(&self) -> bool {
        HEADER_SEGMENTS.contains(&self.id.as_str())
    }

    /// Number of field slots currently held.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The stored (escaped) value at `position`, if that slot exists.
    pub fn field(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|i| self.fields.get(i))
            .map(String::as_str)
    }

    /// The stored (escaped) component of a field, if it exists.
    pub fn component(&self, field: usize, component: usize) -> Option<&str> {
        let value = self.field(field)?;
        value.split(self.encoding.component()).nth(component.checked_sub(1)?)
    }

    /// Assign field `position`, overwriting in place or backfilling with empties.
    ///
    /// # Errors
    ///
    /// - [`Hl7Error::InvalidPosition`] if `position` is zero, or is 1 on a
    ///   header segment where that slot holds the field separator
    /// - [`Hl7Error::FieldTooLong`] if the stored value exceeds the policy limit
    pub fn set_field<'v>(&mut self, position: usize, value: impl Into<Option<&'v str>>) -> Hl7Result<()> {
        self.check_writable(position, None)?;
        let stored = self.encode(value.into());
        self.store(position, stored)
    }

    /// Append a value as field `position` when writing strictly left to right.
    ///
    /// Gaps up to `position - 1` are backfilled; the value is then pushed, even
    /// if the segment already holds `position` or more slots.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Segment::set_field`].
    pub fn add_field<'v>(&mut self, position: usize, value: impl Into<Option<&'v str>>) -> Hl7Result<()> {
        self.check_writable(position, None)?;
        let stored = self.encode(value.into());
        self.check_length(self.fields.len().max(position - 1) + 1, &stored)?;
        self.backfill(position - 1);
        self.fields.push(stored);
        Ok(())
    }

    /// Assign one component inside a field.
    ///
    /// The field's current value is split on the component separator, gaps are
    /// backfilled with empty components, the target component is replaced by
    /// the escaped value and the components are joined again.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Segment::set_field`], with the length limit applied
    /// to the whole rejoined field.
    pub fn set_component<'v>(
        &mut self,
        field: usize,
        component: usize,
        value: impl Into<Option<&'v str>>,
    ) -> Hl7Result<()> {
        self.check_writable(field, Some(component))?;
        let stored = self.encode(value.into());
        let separator = self.encoding.component();

        let current = self.field(field).unwrap_or_default();
        let mut components: Vec<String> = if current.is_empty() {
            Vec::new()
        } else {
            current.split(separator).map(str::to_owned).collect()
        };
        if components.len() < component {
            components.resize(component, String::new());
        }
        components[component - 1] = stored;

        self.store(field, components.join(&separator.to_string()))
    }

    /// Write a whole composite field, escaping each component on its own.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Segment::set_field`], with the length limit applied
    /// to the whole composite.
    pub fn set_components(&mut self, position: usize, values: &[&str]) -> Hl7Result<()> {
        self.check_writable(position, None)?;
        let separator = self.encoding.component().to_string();
        let joined = values
            .iter()
            .map(|v| self.encode(Some(*v)))
            .collect::<Vec<_>>()
            .join(&separator);
        self.store(position, joined)
    }

    /// Blank every unassigned slot up to and including `position`.
    ///
    /// Strict readers expect some segments to carry a fixed number of columns
    /// even when the trailing ones are empty.
    pub fn pad_to(&mut self, position: usize) {
        self.backfill(position);
    }

    /// Store a value verbatim, bypassing escaping.
    ///
    /// Only used for MSH-2 style fields whose content is the encoding
    /// characters themselves.
    pub(crate) fn set_raw(&mut self, position: usize, value: String) -> Hl7Result<()> {
        self.check_writable(position, None)?;
        self.store(position, value)
    }

    /// Render the segment as one line without the segment delimiter.
    pub fn serialize(&self) -> String {
        let separator = self.encoding.field().to_string();
        if self.is_header() {
            // Field 1 is the separator itself, so it is written once, not joined.
            let rest = self.fields.get(1..).unwrap_or_default().join(&separator);
            format!("{}{}{}", self.id, separator, rest)
        } else {
            format!("{}{}{}", self.id, separator, self.fields.join(&separator))
        }
    }

    fn backfill(&mut self, position: usize) {
        if self.fields.len() < position {
            self.fields.resize(position, String::new());
        }
    }

    fn store(&mut self, position: usize, value: String) -> Hl7Result<()> {
        self.check_length(position, &value)?;
        if self.fields.len() < position {
            self.backfill(position - 1);
            self.fields.push(value);
        } else {
            self.fields[position - 1] = value;
        }
        Ok(())
    }

    fn check_writable(&self, field: usize, component: Option<usize>) -> Hl7Result<()> {
        check_position(field, component)?;
        // Field 1 of a header segment is the separator itself.
        if field == 1 && self.is_header() {
            return Err(Hl7Error::InvalidPosition { field, component });
        }
        Ok(())
    }

    fn check_length(&self, position: usize, stored: &str) -> Hl7Result<()> {
        let Some(max) = self.policy.max_length.filter(|m| *m > 0) else {
            return Ok(());
        };
        let length = stored.chars().count();
        if length > max {
            tracing::warn!(
                segment = %self.id,
                field = position,
                length,
                max_length = max,
                "field value exceeds maximum length"
            );
            return Err(Hl7Error::FieldTooLong {
                segment: self.id.clone(),
                field: position,
                length,
                max,
            });
        }
        Ok(())
    }

    fn encode(&self, value: Option<&str>) -> String {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return String::new();
        };

        match self.policy.escape {
            EscapePolicy::Structural => self.encoding.escape(value).into_owned(),
            EscapePolicy::None => value.to_owned(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

fn check_position(field: usize, component: Option<usize>) -> Hl7Result<()> {
    if field < 1 || component.is_some_and(|c| c < 1) {
        return Err(Hl7Error::InvalidPosition { field, component });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(id: &str) -> Segment {
        Segment::new(id, EncodingProfile::default())
    }

    #[test]
    fn set_field_backfills_lower_positions() {
        for position in 1..=12 {
            let mut seg = segment("ZZZ");
            seg.set_field(position, "x").expect("valid position");
            let line = seg.serialize();
            let slots: Vec<&str> = line.split('|').skip(1).collect();
            assert_eq!(slots.len(), position);
            assert!(slots[..position - 1].iter().all(|s| s.is_empty()));
            assert_eq!(slots[position - 1], "x");
        }
    }

    #[test]
    fn set_field_overwrites_in_place() {
        let mut seg = segment("NTE");
        seg.set_field(3, "first").expect("valid");
        seg.set_field(1, "1").expect("valid");
        seg.set_field(3, "second").expect("valid");
        assert_eq!(seg.serialize(), "NTE|1||second");
    }

    #[test]
    fn zero_position_is_rejected() {
        let mut seg = segment("PID");
        let err = seg.set_field(0, "x").expect_err("zero position");
        assert!(matches!(err, Hl7Error::InvalidPosition { field: 0, component: None }));

        let err = seg.set_component(2, 0, "x").expect_err("zero component");
        assert!(matches!(
            err,
            Hl7Error::InvalidPosition {
                field: 2,
                component: Some(0)
            }
        ));

        let err = seg.add_field(0, "x").expect_err("zero position");
        assert!(matches!(err, Hl7Error::InvalidPosition { .. }));
    }

    #[test]
    fn absent_value_stores_empty() {
        let mut seg = segment("RXR");
        seg.set_field(2, None::<&str>).expect("valid");
        assert_eq!(seg.len(), 2);
        assert_eq!(seg.serialize(), "RXR||");
    }

    #[test]
    fn values_are_escaped_on_insert() {
        let mut seg = segment("NTE");
        seg.set_field(1, "a|b^c").expect("valid");
        assert_eq!(seg.field(1), Some("a\\F\\b\\S\\c"));
        // Reading does not escape again.
        assert_eq!(seg.serialize(), "NTE|a\\F\\b\\S\\c");
    }

    #[test]
    fn add_field_appends_after_backfill() {
        let mut seg = segment("AL1");
        seg.add_field(1, "1").expect("valid");
        seg.add_field(2, "DA").expect("valid");
        seg.add_field(4, "Penicillin").expect("valid");
        assert_eq!(seg.serialize(), "AL1|1|DA||Penicillin");

        // Appends even when the position already exists.
        seg.add_field(2, "extra").expect("valid");
        assert_eq!(seg.len(), 5);
    }

    #[test]
    fn set_component_backfills_components() {
        let mut seg = segment("PID");
        seg.set_component(3, 1, "PAT1").expect("valid");
        seg.set_component(3, 4, "MR").expect("valid");
        assert_eq!(seg.field(3), Some("PAT1^^^MR"));
        seg.set_component(3, 3, "HOSP&1").expect("valid");
        assert_eq!(seg.field(3), Some("PAT1^^HOSP\\T\\1^MR"));
        assert_eq!(seg.component(3, 3), Some("HOSP\\T\\1"));
        assert_eq!(seg.serialize(), "PID|||PAT1^^HOSP\\T\\1^MR");
    }

    #[test]
    fn set_components_escapes_each_component() {
        let mut seg = segment("RXE");
        seg.set_components(2, &["C09AA01", "Lisinopril^10", "NDC"])
            .expect("valid");
        assert_eq!(seg.field(2), Some("C09AA01^Lisinopril\\S\\10^NDC"));
        assert_eq!(seg.component(2, 3), Some("NDC"));
    }

    #[test]
    fn header_segments_carry_separator_as_first_field() {
        let mut msh = segment("MSH");
        msh.set_raw(2, EncodingProfile::default().encoding_characters())
            .expect("valid");
        msh.set_field(3, "APP").expect("valid");
        assert_eq!(msh.field(1), Some("|"));
        assert_eq!(msh.serialize(), "MSH|^~\\&|APP");
    }

    #[test]
    fn pad_to_blanks_trailing_columns() {
        let mut seg = segment("PV1");
        seg.set_field(1, "1").expect("valid");
        seg.set_field(2, "O").expect("valid");
        seg.pad_to(5);
        assert_eq!(seg.serialize(), "PV1|1|O|||");
        seg.pad_to(3);
        assert_eq!(seg.len(), 5);
    }

    fn limited(max: usize) -> Segment {
        let policy = FieldPolicy {
            escape: EscapePolicy::Structural,
            max_length: Some(max),
        };
        Segment::with_policy("NTE", EncodingProfile::default(), policy)
    }

    #[test]
    fn length_limit_applies_to_escaped_value() {
        let mut seg = limited(6);
        seg.set_field(1, "ab|d").expect("escaped length is 6");
        assert_eq!(seg.field(1), Some("ab\\F\\d"));

        let err = seg.set_field(2, "ab|de").expect_err("escaped length is 7");
        assert_eq!(
            err,
            Hl7Error::FieldTooLong {
                segment: "NTE".into(),
                field: 2,
                length: 7,
                max: 6,
            }
        );
        // Nothing is stored when the value is rejected.
        assert_eq!(seg.len(), 1);
    }

    #[test]
    fn length_limit_rejects_rather_than_truncates() {
        let mut seg = limited(10);
        let err = seg.set_field(3, "Take 20 mg twice").expect_err("too long");
        assert!(matches!(err, Hl7Error::FieldTooLong { field: 3, length: 16, max: 10, .. }));

        let pipes = "|".repeat(5);
        let err = seg.add_field(1, pipes.as_str()).expect_err("escapes to 15 chars");
        assert!(matches!(err, Hl7Error::FieldTooLong { length: 15, .. }));
    }

    #[test]
    fn length_limit_covers_whole_composite() {
        let mut seg = limited(8);
        seg.set_components(2, &["abc", "def"]).expect("7 chars");
        let err = seg
            .set_components(2, &["abc", "def", "g"])
            .expect_err("9 chars");
        assert!(matches!(err, Hl7Error::FieldTooLong { field: 2, length: 9, .. }));

        let err = seg.set_component(2, 3, "g").expect_err("9 chars");
        assert!(matches!(err, Hl7Error::FieldTooLong { field: 2, .. }));
        assert_eq!(seg.field(2), Some("abc^def"));
    }

    #[test]
    fn header_separator_slot_is_not_writable() {
        let mut msh = segment("MSH");
        let err = msh.set_field(1, "X").expect_err("separator slot");
        assert!(matches!(err, Hl7Error::InvalidPosition { field: 1, component: None }));
        assert!(msh.add_field(1, "X").is_err());
        assert!(msh.set_component(1, 1, "X").is_err());
        assert!(msh.set_components(1, &["X"]).is_err());
        assert_eq!(msh.field(1), Some("|"));

        let mut bhs = segment("BHS");
        assert!(bhs.set_field(1, "X").is_err());
        // Ordinary segments accept field 1.
        assert!(segment("NTE").set_field(1, "X").is_ok());
    }

    #[test]
    fn escape_policy_none_stores_verbatim() {
        let policy = FieldPolicy {
            escape: EscapePolicy::None,
            max_length: None,
        };
        let mut seg = Segment::with_policy("NTE", EncodingProfile::default(), policy);
        seg.set_field(1, "a&b").expect("valid");
        assert_eq!(seg.field(1), Some("a&b"));
    }
}
