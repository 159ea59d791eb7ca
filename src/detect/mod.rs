pub mod patterns;

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::RegexSet;

use crate::error::{CloakError, Result};
use crate::pii::PiiType;

pub use patterns::PiiPattern;
use patterns::Segment;

/// Process-wide scanner built from the default table. Immutable after first use.
pub static DEFAULT_SCANNER: LazyLock<FreeTextScanner> = LazyLock::new(|| {
    FreeTextScanner::new(patterns::default_patterns().expect("default PII patterns should compile"))
        .expect("default PII patterns should compile")
});

/// Content-based PII detection over free text.
///
/// Holds an ordered table of [`PiiPattern`] rows. A `RegexSet` over the same
/// patterns answers "which classes are present" in one pass; the individual
/// regexes are only run for classes the set reports.
pub struct FreeTextScanner {
    regex_set: RegexSet,
    patterns: Vec<PiiPattern>,
}

impl FreeTextScanner {
    pub fn new(patterns: Vec<PiiPattern>) -> Result<Self> {
        let regex_set = RegexSet::new(patterns.iter().map(|p| p.as_str())).map_err(|e| {
            CloakError::InvalidPattern {
                reason: format!("invalid regex set: {e}"),
            }
        })?;
        Ok(Self {
            regex_set,
            patterns,
        })
    }

    pub fn patterns(&self) -> &[PiiPattern] {
        &self.patterns
    }

    pub fn pattern(&self, pii_type: PiiType) -> Option<&PiiPattern> {
        self.patterns.iter().find(|p| p.pii_type() == pii_type)
    }

    pub fn contains(&self, pii_type: PiiType, input: &str) -> bool {
        self.pattern(pii_type).is_some_and(|p| p.is_match(input))
    }

    /// Every class with at least one match in `input`. Overlapping matches
    /// across classes are all reported.
    pub fn detect_types(&self, input: &str) -> BTreeSet<PiiType> {
        self.regex_set
            .matches(input)
            .into_iter()
            .map(|idx| self.patterns[idx].pii_type())
            .collect()
    }

    /// Run every pattern over `input` in table order, masking each match.
    ///
    /// Text produced by an earlier pattern's masker is set aside and never
    /// re-scanned by a later pattern.
    pub fn mask(&self, input: &str) -> String {
        let matching: Vec<usize> = self.regex_set.matches(input).into_iter().collect();
        if matching.is_empty() {
            return input.to_string();
        }

        let mut segments = vec![Segment::Clear(input.to_string())];
        for idx in matching {
            let pattern = &self.patterns[idx];
            segments = segments
                .into_iter()
                .flat_map(|segment| match segment {
                    Segment::Clear(text) => pattern.split_masked(&text),
                    masked => vec![masked],
                })
                .collect();
        }

        segments.iter().map(Segment::as_str).collect()
    }
}

pub fn contains_email(input: &str) -> bool {
    DEFAULT_SCANNER.contains(PiiType::Email, input)
}

pub fn contains_phone(input: &str) -> bool {
    DEFAULT_SCANNER.contains(PiiType::Phone, input)
}

pub fn contains_national_id(input: &str) -> bool {
    DEFAULT_SCANNER.contains(PiiType::NationalId, input)
}

pub fn contains_ipv4(input: &str) -> bool {
    DEFAULT_SCANNER.contains(PiiType::IpAddress, input)
}

/// Replace every match of `pii_type`'s pattern with `transform(match)`.
/// `Location` has no text pattern; the input comes back unchanged.
pub fn replace_all<F>(pii_type: PiiType, input: &str, transform: F) -> String
where
    F: FnMut(&str) -> String,
{
    match DEFAULT_SCANNER.pattern(pii_type) {
        Some(pattern) => pattern.replace_all(input, transform).into_owned(),
        None => input.to_string(),
    }
}

/// The free-text masking pass with the default table.
pub fn mask_free_text(input: &str) -> String {
    DEFAULT_SCANNER.mask(input)
}

pub fn detect_types(input: &str) -> BTreeSet<PiiType> {
    DEFAULT_SCANNER.detect_types(input)
}
