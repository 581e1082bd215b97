//! Encoding characters and the HL7 escape transform.
//!
//! Every HL7 v2 message declares five structural characters. The field separator
//! is MSH-1 itself; the remaining four are written, in a fixed order, into MSH-2
//! so a reader knows how to split the rest of the message.
//!
//! Data values containing any of these characters must be escaped as `\X\`
//! where `X` is one of:
//!
//! | Character     | Code |
//! |---------------|------|
//! | field         | `F`  |
//! | component     | `S`  |
//! | repetition    | `R`  |
//! | escape        | `E`  |
//! | subcomponent  | `T`  |
//!
//! The transform is a single left-to-right pass over the input. Each input
//! character is inspected once, so the escape characters introduced by the
//! transform are never themselves re-escaped.

use crate::{Hl7Error, Hl7Result};
use std::borrow::Cow;

/// The five structural characters used by one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodingProfile {
    field: char,
    component: char,
    repetition: char,
    escape: char,
    subcomponent: char,
}

impl Default for EncodingProfile {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

impl EncodingProfile {
    /// Create a profile from explicit characters.
    ///
    /// # Errors
    ///
    /// Returns [`Hl7Error::InvalidEncoding`] if any two characters are equal.
    /// Nothing else is checked: choosing characters that also appear in
    /// segment codes is a caller error that is not detected here.
    pub fn new(
        field: char,
        component: char,
        repetition: char,
        escape: char,
        subcomponent: char,
    ) -> Hl7Result<Self> {
        let chars = [field, component, repetition, escape, subcomponent];
        for (i, a) in chars.iter().enumerate() {
            if chars[i + 1..].contains(a) {
                return Err(Hl7Error::InvalidEncoding(format!(
                    "separator '{a}' is used more than once"
                )));
            }
        }

        Ok(Self {
            field,
            component,
            repetition,
            escape,
            subcomponent,
        })
    }

    pub fn field(&self) -> char {
        self.field
    }

    pub fn component(&self) -> char {
        self.component
    }

    pub fn repetition(&self) -> char {
        self.repetition
    }

    pub fn escape_char(&self) -> char {
        self.escape
    }

    pub fn subcomponent(&self) -> char {
        self.subcomponent
    }

    /// The MSH-2 value: component, repetition, escape and subcomponent characters.
    pub fn encoding_characters(&self) -> String {
        [self.component, self.repetition, self.escape, self.subcomponent]
            .iter()
            .collect()
    }

    fn code_for(&self, c: char) -> Option<char> {
        match c {
            c if c == self.escape => Some('E'),
            c if c == self.field => Some('F'),
            c if c == self.component => Some('S'),
            c if c == self.repetition => Some('R'),
            c if c == self.subcomponent => Some('T'),
            _ => None,
        }
    }

    fn char_for(&self, code: char) -> Option<char> {
        match code {
            'E' => Some(self.escape),
            'F' => Some(self.field),
            'S' => Some(self.component),
            'R' => Some(self.repetition),
            'T' => Some(self.subcomponent),
            _ => None,
        }
    }

    /// Escape every structural character in `value`.
    ///
    /// Values without structural characters are returned borrowed and unchanged.
    pub fn escape<'v>(&self, value: &'v str) -> Cow<'v, str> {
        if !value.chars().any(|c| self.code_for(c).is_some()) {
            return Cow::Borrowed(value);
        }

        let mut out = String::with_capacity(value.len() + 8);
        for c in value.chars() {
            match self.code_for(c) {
                Some(code) => {
                    out.push(self.escape);
                    out.push(code);
                    out.push(self.escape);
                }
                None => out.push(c),
            }
        }
        Cow::Owned(out)
    }

    /// Reverse [`EncodingProfile::escape`].
    ///
    /// Only the five structural sequences are decoded. Any other escape
    /// sequence (for example `\H\` highlighting) is left as written.
    pub fn unescape<'v>(&self, value: &'v str) -> Cow<'v, str> {
        if !value.contains(self.escape) {
            return Cow::Borrowed(value);
        }

        let chars: Vec<char> = value.chars().collect();
        let mut out = String::with_capacity(value.len());
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == self.escape && i + 2 < chars.len() && chars[i + 2] == self.escape {
                if let Some(original) = self.char_for(chars[i + 1]) {
                    out.push(original);
                    i += 3;
                    continue;
                }
            }
            out.push(chars[i]);
            i += 1;
        }
        Cow::Owned(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_encoding_characters() {
        let enc = EncodingProfile::default();
        assert_eq!(enc.field(), '|');
        assert_eq!(enc.encoding_characters(), "^~\\&");
    }

    #[test]
    fn rejects_duplicate_separators() {
        let err = EncodingProfile::new('|', '^', '^', '\\', '&').expect_err("duplicates");
        match err {
            Hl7Error::InvalidEncoding(msg) => assert!(msg.contains('^')),
            other => panic!("expected InvalidEncoding, got {other:?}"),
        }
    }

    #[test]
    fn escapes_each_structural_character() {
        let enc = EncodingProfile::default();
        assert_eq!(enc.escape("a|b"), "a\\F\\b");
        assert_eq!(enc.escape("a^b"), "a\\S\\b");
        assert_eq!(enc.escape("a~b"), "a\\R\\b");
        assert_eq!(enc.escape("a\\b"), "a\\E\\b");
        assert_eq!(enc.escape("a&b"), "a\\T\\b");
    }

    #[test]
    fn literal_escape_is_not_double_encoded() {
        let enc = EncodingProfile::default();
        // The backslashes introduced for '|' must not turn into \E\.
        assert_eq!(enc.escape("\\|"), "\\E\\\\F\\");
    }

    #[test]
    fn plain_values_are_borrowed() {
        let enc = EncodingProfile::default();
        assert!(matches!(enc.escape("Lisinopril 10 mg"), Cow::Borrowed(_)));
        assert_eq!(enc.escape(""), "");
    }

    #[test]
    fn unescape_reverses_escape() {
        let enc = EncodingProfile::default();
        let inputs = [
            "Take 1 | 2 tablets",
            "A^B~C&D\\E",
            "\\F\\ already looks escaped",
            "trailing \\",
            "Penicillin & sulfa",
        ];
        for input in inputs {
            let escaped = enc.escape(input);
            assert_eq!(enc.unescape(&escaped), input, "round trip of {input:?}");
        }
    }

    #[test]
    fn unescape_leaves_unknown_sequences() {
        let enc = EncodingProfile::default();
        assert_eq!(enc.unescape("\\H\\bold\\N\\"), "\\H\\bold\\N\\");
    }

    #[test]
    fn custom_profile_uses_its_own_escape() {
        let enc = EncodingProfile::new('#', '$', '*', '!', '@').expect("distinct");
        assert_eq!(enc.encoding_characters(), "$*!@");
        assert_eq!(enc.escape("a#b!c"), "a!F!b!E!c");
        assert_eq!(enc.escape("a|b"), "a|b");
    }
}
