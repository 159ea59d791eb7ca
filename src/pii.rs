use serde::{Deserialize, Serialize};

/// The closed set of PII classes the gateway recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PiiType {
    Email,
    Phone,
    #[serde(rename = "TCKN", alias = "NationalId")]
    NationalId,
    #[serde(rename = "IP", alias = "IPAddress")]
    IpAddress,
    Location,
}

impl PiiType {
    pub const ALL: [PiiType; 5] = [
        PiiType::Email,
        PiiType::Phone,
        PiiType::NationalId,
        PiiType::IpAddress,
        PiiType::Location,
    ];

    /// Name used in decision records and anything downstream of them.
    pub fn external_name(&self) -> &'static str {
        match self {
            PiiType::Email => "Email",
            PiiType::Phone => "Phone",
            PiiType::NationalId => "TCKN",
            PiiType::IpAddress => "IP",
            PiiType::Location => "Location",
        }
    }
}

impl std::fmt::Display for PiiType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.external_name())
    }
}

impl std::str::FromStr for PiiType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(PiiType::Email),
            "phone" => Ok(PiiType::Phone),
            "tckn" | "nationalid" => Ok(PiiType::NationalId),
            "ip" | "ipaddress" => Ok(PiiType::IpAddress),
            "location" => Ok(PiiType::Location),
            _ => Err(format!("unknown pii type: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_names() {
        assert_eq!(PiiType::NationalId.to_string(), "TCKN");
        assert_eq!(PiiType::IpAddress.to_string(), "IP");
        assert_eq!(
            serde_json::to_string(&PiiType::NationalId).unwrap(),
            "\"TCKN\""
        );
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("tckn".parse::<PiiType>().unwrap(), PiiType::NationalId);
        assert_eq!("EMAIL".parse::<PiiType>().unwrap(), PiiType::Email);
        assert_eq!("IpAddress".parse::<PiiType>().unwrap(), PiiType::IpAddress);
        assert!("ssn".parse::<PiiType>().is_err());
    }
}
