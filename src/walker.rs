//! Structure-aware JSON masking.
//!
//! Leaves are classified in two stages. The key stage looks at the name of the
//! property that holds the leaf and, on an exact (case-insensitive) hit,
//! replaces the whole value. Everything else goes through the content stage,
//! which scans the string for embedded PII wherever it sits in the document.
//!
//! The content stage runs on unlabeled strings too, so an 11-digit order
//! number anywhere in a payload is masked as a national id. That breadth is
//! kept on purpose for compatibility with existing consumers.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::detect::{FreeTextScanner, DEFAULT_SCANNER};
use crate::error::Result;
use crate::mask;
use crate::pii::PiiType;

/// A key-stage rule: property names that mark a leaf as one PII class.
#[derive(Debug)]
pub struct KeyRule {
    pub pii_type: PiiType,
    pub keys: &'static [&'static str],
    pub masker: fn(&str) -> String,
}

impl KeyRule {
    fn matches(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k.eq_ignore_ascii_case(key))
    }
}

/// Key-stage table, checked in order; first hit wins.
pub static KEY_RULES: &[KeyRule] = &[
    KeyRule {
        pii_type: PiiType::Email,
        keys: &["email", "emailAddress", "mail"],
        masker: mask::mask_email,
    },
    KeyRule {
        pii_type: PiiType::Phone,
        keys: &["phone", "phoneNumber", "mobile", "msisdn"],
        masker: mask::mask_phone,
    },
    KeyRule {
        pii_type: PiiType::NationalId,
        keys: &["tckn", "tc", "turkishId", "nationalId"],
        masker: mask::mask_tckn,
    },
    KeyRule {
        pii_type: PiiType::IpAddress,
        keys: &["ip", "ipAddress", "clientIp"],
        masker: mask::mask_ip,
    },
];

/// Property names that are known to carry prose.
pub const FREE_TEXT_KEYS: &[&str] = &["notes", "note", "comment", "description", "message"];

const LOCATION_KEY: &str = "location";

/// Outcome of the key stage for one string leaf.
#[derive(Debug, Clone, Copy)]
pub enum LeafClass {
    /// Whole-value replacement by the rule's masker.
    Keyed(&'static KeyRule),
    /// Parent key names a prose field.
    FreeText,
    /// No parent key, or one outside every table.
    Unlabeled,
}

pub fn classify_key(parent_key: Option<&str>) -> LeafClass {
    let Some(key) = parent_key.filter(|k| !k.trim().is_empty()) else {
        return LeafClass::Unlabeled;
    };
    if let Some(rule) = KEY_RULES.iter().find(|r| r.matches(key)) {
        return LeafClass::Keyed(rule);
    }
    if FREE_TEXT_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key)) {
        return LeafClass::FreeText;
    }
    LeafClass::Unlabeled
}

/// What one walk changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskingReport {
    pub masked_count: usize,
    pub pii_types_found: BTreeSet<PiiType>,
    pub masked_fields: Vec<String>,
}

impl MaskingReport {
    pub fn is_empty(&self) -> bool {
        self.masked_count == 0
    }

    fn record<I>(&mut self, path: String, types: I)
    where
        I: IntoIterator<Item = PiiType>,
    {
        self.masked_count += 1;
        self.pii_types_found.extend(types);
        self.masked_fields.push(path);
    }
}

/// Walks a JSON tree and masks PII-bearing leaves in place.
pub struct JsonMasker<'s> {
    scanner: &'s FreeTextScanner,
}

impl Default for JsonMasker<'static> {
    fn default() -> Self {
        Self::new(&DEFAULT_SCANNER)
    }
}

impl<'s> JsonMasker<'s> {
    pub fn new(scanner: &'s FreeTextScanner) -> Self {
        Self { scanner }
    }

    /// Parse, mask and re-serialize to compact JSON.
    ///
    /// A parse failure is the only error; callers decide what to do with the
    /// original text.
    pub fn mask_json(&self, json: &str) -> Result<(String, MaskingReport)> {
        let mut root: Value = serde_json::from_str(json)?;
        let report = self.mask_value(&mut root);
        let masked = serde_json::to_string(&root)?;
        Ok((masked, report))
    }

    /// Mask `root` in place. The report lives only for this call.
    pub fn mask_value(&self, root: &mut Value) -> MaskingReport {
        let mut report = MaskingReport::default();
        self.walk(root, None, "$", &mut report);
        report
    }

    fn walk(
        &self,
        node: &mut Value,
        parent_key: Option<&str>,
        path: &str,
        report: &mut MaskingReport,
    ) {
        match node {
            Value::Object(map) => {
                for (key, child) in map.iter_mut() {
                    let child_path = format!("{path}.{key}");
                    if key.eq_ignore_ascii_case(LOCATION_KEY) {
                        if let Value::Object(coords) = &mut *child {
                            if coords.contains_key("lat") && coords.contains_key("lon") {
                                if round_location(coords) {
                                    report.record(child_path, [PiiType::Location]);
                                }
                                continue;
                            }
                        }
                    }
                    self.walk(child, Some(key.as_str()), &child_path, report);
                }
            }
            Value::Array(items) => {
                for (idx, item) in items.iter_mut().enumerate() {
                    self.walk(item, parent_key, &format!("{path}[{idx}]"), report);
                }
            }
            Value::String(text) => self.mask_leaf(text, parent_key, path, report),
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }

    fn mask_leaf(
        &self,
        text: &mut String,
        parent_key: Option<&str>,
        path: &str,
        report: &mut MaskingReport,
    ) {
        match classify_key(parent_key) {
            LeafClass::Keyed(rule) => {
                *text = (rule.masker)(text);
                report.record(path.to_string(), [rule.pii_type]);
            }
            LeafClass::FreeText | LeafClass::Unlabeled => {
                let masked = self.scanner.mask(text);
                if masked != *text {
                    let found = self.scanner.detect_types(text);
                    *text = masked;
                    report.record(path.to_string(), found);
                }
            }
        }
    }
}

/// Round `lat` and `lon` in place. Returns whether at least one component was
/// numeric; non-numeric components are left as they are.
fn round_location(coords: &mut Map<String, Value>) -> bool {
    let mut rounded_any = false;
    for component in ["lat", "lon"] {
        let Some(value) = coords.get_mut(component) else {
            continue;
        };
        match value {
            Value::Number(n) => {
                rounded_any = true;
                // integers already have no fractional digits
                if !n.is_f64() {
                    continue;
                }
                if let Some(rounded) = n
                    .as_f64()
                    .map(mask::round_location_component)
                    .and_then(Number::from_f64)
                {
                    *n = rounded;
                }
            }
            Value::String(s) => {
                if let Some(rounded) = mask::try_round_location_str(s) {
                    *s = rounded;
                    rounded_any = true;
                }
            }
            _ => {}
        }
    }
    rounded_any
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mask(value: Value) -> (Value, MaskingReport) {
        let mut value = value;
        let report = JsonMasker::default().mask_value(&mut value);
        (value, report)
    }

    #[test]
    fn test_keyed_email_case_insensitive() {
        let (out, report) = mask(json!({"EmailAddress": "jane@example.com"}));
        assert_eq!(out["EmailAddress"], "ja***@example.com");
        assert_eq!(report.masked_count, 1);
        assert_eq!(report.masked_fields, vec!["$.EmailAddress"]);
    }

    #[test]
    fn test_keyed_rule_counts_once_even_without_change() {
        let (out, report) = mask(json!({"ip": "not an ip"}));
        assert_eq!(out["ip"], "***.***.***.***");
        assert_eq!(report.masked_count, 1);
        assert!(report.pii_types_found.contains(&PiiType::IpAddress));
    }

    #[test]
    fn test_array_inherits_parent_key() {
        let (out, report) = mask(json!({"phone": ["555 123 4567", "555 987 6543"]}));
        assert_eq!(out["phone"][0], "***-***-4567");
        assert_eq!(out["phone"][1], "***-***-6543");
        assert_eq!(report.masked_fields, vec!["$.phone[0]", "$.phone[1]"]);
    }

    #[test]
    fn test_unlabeled_string_scanned() {
        let (out, report) = mask(json!({"items": [{"sku": "A1", "contact": "x@example.org"}]}));
        assert_eq!(out["items"][0]["sku"], "A1");
        assert_eq!(out["items"][0]["contact"], "***");
        assert_eq!(report.masked_fields, vec!["$.items[0].contact"]);
    }

    #[test]
    fn test_location_rounded_not_recursed() {
        let (out, report) = mask(json!({"location": {"lat": 41.015137, "lon": "28.979530", "note": "a@b.co"}}));
        assert_eq!(out["location"]["lat"], json!(41.02));
        assert_eq!(out["location"]["lon"], "28.98");
        assert_eq!(out["location"]["note"], "a@b.co");
        assert_eq!(report.masked_count, 1);
        assert_eq!(report.masked_fields, vec!["$.location"]);
    }

    #[test]
    fn test_location_non_numeric_not_counted() {
        let (out, report) = mask(json!({"Location": {"lat": "north", "lon": null}}));
        assert_eq!(out["Location"]["lat"], "north");
        assert!(report.is_empty());
        assert!(report.pii_types_found.is_empty());
    }

    #[test]
    fn test_location_without_both_keys_is_walked() {
        let (out, report) = mask(json!({"location": {"lat": 41.5, "city": "10.0.0.1"}}));
        assert_eq!(out["location"]["lat"], json!(41.5));
        assert_eq!(out["location"]["city"], "10.***.***.1");
        assert_eq!(report.masked_fields, vec!["$.location.city"]);
    }

    #[test]
    fn test_non_string_leaves_untouched() {
        let input = json!({"email": 42, "phone": null, "ip": true, "count": 10000000146u64});
        let (out, report) = mask(input.clone());
        assert_eq!(out, input);
        assert!(report.is_empty());
    }

    #[test]
    fn test_mask_json_preserves_key_order() {
        let (masked, report) = JsonMasker::default()
            .mask_json(r#"{"z":1,"a":"plain","m":{"y":[1,2],"b":false}}"#)
            .unwrap();
        assert_eq!(masked, r#"{"z":1,"a":"plain","m":{"y":[1,2],"b":false}}"#);
        assert!(report.is_empty());
    }

    #[test]
    fn test_mask_json_rejects_malformed() {
        assert!(JsonMasker::default().mask_json("{not json").is_err());
    }

    #[test]
    fn test_classify_key() {
        assert!(matches!(classify_key(Some("MSISDN")), LeafClass::Keyed(r) if r.pii_type == PiiType::Phone));
        assert!(matches!(classify_key(Some("Comment")), LeafClass::FreeText));
        assert!(matches!(classify_key(Some("title")), LeafClass::Unlabeled));
        assert!(matches!(classify_key(Some("  ")), LeafClass::Unlabeled));
        assert!(matches!(classify_key(None), LeafClass::Unlabeled));
    }
}
