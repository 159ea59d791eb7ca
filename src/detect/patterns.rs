use std::borrow::Cow;

use regex::Regex;

use crate::error::{CloakError, Result};
use crate::mask;
use crate::pii::PiiType;

/// Local part, `@`, domain with an alphabetic TLD of two or more letters.
pub const EMAIL_PATTERN: &str = r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b";

/// Optional 1-3 digit international prefix (optionally `+`), a 3-digit area
/// group (optionally parenthesized), then 3 + 4 digits. Separators are a
/// single space or hyphen.
pub const PHONE_PATTERN: &str =
    r"\b(?:\+?[0-9]{1,3}[\s-]?)?(?:\(?[0-9]{3}\)?[\s-]?)[0-9]{3}[\s-]?[0-9]{4}\b";

/// Exactly 11 consecutive digits. No checksum validation.
pub const NATIONAL_ID_PATTERN: &str = r"\b[0-9]{11}\b";

/// Dotted quad, each octet 0-255.
pub const IPV4_PATTERN: &str = r"\b(?:(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])\b";

/// One row of the detection table: a PII class, the regex that finds it in
/// free text, and the masker applied to each match.
pub struct PiiPattern {
    pii_type: PiiType,
    regex: Regex,
    masker: fn(&str) -> String,
}

impl std::fmt::Debug for PiiPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiiPattern")
            .field("pii_type", &self.pii_type)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

impl PiiPattern {
    pub fn new(pii_type: PiiType, pattern: &str, masker: fn(&str) -> String) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| CloakError::InvalidPattern {
            reason: format!("{pii_type}: {e}"),
        })?;
        Ok(Self {
            pii_type,
            regex,
            masker,
        })
    }

    pub fn pii_type(&self) -> PiiType {
        self.pii_type
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }

    /// Apply this row's masker to a single value.
    pub fn mask_value(&self, value: &str) -> String {
        (self.masker)(value)
    }

    /// Replace every match with the output of `transform`.
    pub fn replace_all<'t, F>(&self, input: &'t str, mut transform: F) -> Cow<'t, str>
    where
        F: FnMut(&str) -> String,
    {
        self.regex
            .replace_all(input, |caps: &regex::Captures| transform(&caps[0]))
    }

    /// Split `input` into alternating clear and masked pieces. Masked pieces
    /// already hold the masker output.
    pub(crate) fn split_masked(&self, input: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut last = 0;
        for m in self.regex.find_iter(input) {
            if m.start() > last {
                segments.push(Segment::Clear(input[last..m.start()].to_string()));
            }
            segments.push(Segment::Masked(self.mask_value(m.as_str())));
            last = m.end();
        }
        if last < input.len() {
            segments.push(Segment::Clear(input[last..].to_string()));
        }
        segments
    }
}

/// A slice of free text during the masking pass. Masked slices are never
/// offered to later patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Clear(String),
    Masked(String),
}

impl Segment {
    pub(crate) fn as_str(&self) -> &str {
        match self {
            Segment::Clear(s) | Segment::Masked(s) => s,
        }
    }
}

/// The built-in table, in free-text pass order: Email, Phone, NationalId, IP.
pub fn default_patterns() -> Result<Vec<PiiPattern>> {
    Ok(vec![
        PiiPattern::new(PiiType::Email, EMAIL_PATTERN, mask::mask_email)?,
        PiiPattern::new(PiiType::Phone, PHONE_PATTERN, mask::mask_phone)?,
        PiiPattern::new(PiiType::NationalId, NATIONAL_ID_PATTERN, mask::mask_tckn)?,
        PiiPattern::new(PiiType::IpAddress, IPV4_PATTERN, mask::mask_ip)?,
    ])
}
