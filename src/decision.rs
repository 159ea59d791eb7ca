use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::pii::PiiType;
use crate::walker::MaskingReport;

/// Per-request outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    /// Body forwarded as-is.
    Allow,
    /// At least one value was redacted.
    Mask,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Allow => write!(f, "Allow"),
            Decision::Mask => write!(f, "Mask"),
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "allow" => Ok(Decision::Allow),
            "mask" => Ok(Decision::Mask),
            _ => Err(format!("unknown decision: {s}")),
        }
    }
}

/// Who made the request, as established by the authentication layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject_user_id: String,
    pub role: String,
}

impl Identity {
    pub fn new(subject_user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            subject_user_id: subject_user_id.into(),
            role: role.into(),
        }
    }
}

/// Method and path of the inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestInfo {
    pub method: String,
    pub endpoint: String,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// Snapshot of one request's masking outcome. Built once by the pipeline,
/// handed to the audit sink, never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    pub id: Uuid,

    pub timestamp_utc: DateTime<Utc>,

    #[serde(default)]
    pub subject_user_id: String,

    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub method: String,

    #[serde(default)]
    pub endpoint: String,

    pub decision: Decision,

    #[serde(default)]
    pub masked_count: usize,

    /// External spellings: Email, Phone, TCKN, IP, Location.
    #[serde(default, deserialize_with = "lenient_pii_types")]
    pub pii_types_found: Vec<PiiType>,

    #[serde(default, deserialize_with = "lenient_strings")]
    pub masked_fields: Vec<String>,

    #[serde(default)]
    pub status_code: u16,
}

impl DecisionRecord {
    /// Record for a request whose body was not masked.
    pub fn allow(identity: &Identity, request: &RequestInfo, status_code: u16) -> Self {
        Self::build(identity, request, Decision::Allow, MaskingReport::default(), status_code)
    }

    /// Record for a masking-eligible request. The decision follows the report:
    /// `Mask` iff something was masked.
    pub fn from_report(
        identity: &Identity,
        request: &RequestInfo,
        report: MaskingReport,
        status_code: u16,
    ) -> Self {
        let decision = if report.masked_count > 0 {
            Decision::Mask
        } else {
            Decision::Allow
        };
        Self::build(identity, request, decision, report, status_code)
    }

    fn build(
        identity: &Identity,
        request: &RequestInfo,
        decision: Decision,
        report: MaskingReport,
        status_code: u16,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp_utc: Utc::now(),
            subject_user_id: identity.subject_user_id.clone(),
            role: identity.role.clone(),
            method: request.method.clone(),
            endpoint: request.endpoint.clone(),
            decision,
            masked_count: report.masked_count,
            pii_types_found: report.pii_types_found.into_iter().collect(),
            masked_fields: dedup_case_insensitive(report.masked_fields),
            status_code,
        }
    }
}

fn dedup_case_insensitive(fields: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    fields
        .into_iter()
        .filter(|f| seen.insert(f.to_lowercase()))
        .collect()
}

/// Accepts a JSON array of strings, or a string holding one (the shape older
/// stores persisted). Anything else reads as an empty list.
fn lenient_strings<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(string_list(raw))
}

fn lenient_pii_types<'de, D>(deserializer: D) -> std::result::Result<Vec<PiiType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let mut types: Vec<PiiType> = string_list(raw)
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();
    types.sort();
    types.dedup();
    Ok(types)
}

fn string_list(raw: serde_json::Value) -> Vec<String> {
    match raw {
        serde_json::Value::Array(items) => {
            let strings: Option<Vec<String>> = items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => Some(s),
                    _ => None,
                })
                .collect();
            strings.unwrap_or_default()
        }
        serde_json::Value::String(encoded) => serde_json::from_str(&encoded)
            .map(string_list)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn identity() -> Identity {
        Identity::new("user-1", "Analyst")
    }

    fn request() -> RequestInfo {
        RequestInfo::new("GET", "/api/customers/1")
    }

    #[test]
    fn test_allow_record_is_empty() {
        let record = DecisionRecord::allow(&identity(), &request(), 200);
        assert_eq!(record.decision, Decision::Allow);
        assert_eq!(record.masked_count, 0);
        assert!(record.pii_types_found.is_empty());
        assert!(record.masked_fields.is_empty());
    }

    #[test]
    fn test_report_without_masking_is_allow() {
        let record =
            DecisionRecord::from_report(&identity(), &request(), MaskingReport::default(), 200);
        assert_eq!(record.decision, Decision::Allow);
    }

    #[test]
    fn test_wire_shape() {
        let report = MaskingReport {
            masked_count: 2,
            pii_types_found: BTreeSet::from([PiiType::NationalId, PiiType::Email]),
            masked_fields: vec!["$.tckn".into(), "$.email".into()],
        };
        let record = DecisionRecord::from_report(&identity(), &request(), report, 200);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["decision"], "Mask");
        assert_eq!(json["maskedCount"], 2);
        assert_eq!(json["piiTypesFound"], serde_json::json!(["Email", "TCKN"]));
        assert_eq!(json["maskedFields"], serde_json::json!(["$.tckn", "$.email"]));
        assert_eq!(json["subjectUserId"], "user-1");
        assert_eq!(json["statusCode"], 200);
        assert!(json["timestampUtc"].as_str().unwrap().ends_with('Z'));
        assert!(json["id"].is_string());
    }

    #[test]
    fn test_masked_fields_deduped_case_insensitive() {
        let report = MaskingReport {
            masked_count: 2,
            pii_types_found: BTreeSet::from([PiiType::Email]),
            masked_fields: vec!["$.Email".into(), "$.email".into()],
        };
        let record = DecisionRecord::from_report(&identity(), &request(), report, 200);
        assert_eq!(record.masked_fields, vec!["$.Email"]);
        assert_eq!(record.masked_count, 2);
    }

    #[test]
    fn test_lenient_lists() {
        let id = Uuid::new_v4();
        let raw = format!(
            r#"{{"id":"{id}","timestampUtc":"2026-01-01T00:00:00Z","decision":"Mask",
                "piiTypesFound":"[\"Email\",\"IP\"]","maskedFields":{{"oops":1}}}}"#
        );
        let record: DecisionRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(record.pii_types_found, vec![PiiType::Email, PiiType::IpAddress]);
        assert!(record.masked_fields.is_empty());
        assert_eq!(record.status_code, 0);
    }

    #[test]
    fn test_lenient_list_with_non_string_items() {
        let id = Uuid::new_v4();
        let raw = format!(
            r#"{{"id":"{id}","timestampUtc":"2026-01-01T00:00:00Z","decision":"Allow",
                "piiTypesFound":[1,2],"maskedFields":"not json"}}"#
        );
        let record: DecisionRecord = serde_json::from_str(&raw).unwrap();
        assert!(record.pii_types_found.is_empty());
        assert!(record.masked_fields.is_empty());
    }
}
