use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Live data categories shown on the map.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    Distress,
    HelpRequest,
    HelpOffer,
    Traffic,
    Hazard,
    AiForecast,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::Distress,
        Domain::HelpRequest,
        Domain::HelpOffer,
        Domain::Traffic,
        Domain::Hazard,
        Domain::AiForecast,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Domain::Distress => "distress",
            Domain::HelpRequest => "help-request",
            Domain::HelpOffer => "help-offer",
            Domain::Traffic => "traffic",
            Domain::Hazard => "hazard",
            Domain::AiForecast => "ai-forecast",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDomainError(pub String);

impl std::fmt::Display for ParseDomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown domain: {:?}", self.0)
    }
}

impl std::error::Error for ParseDomainError {}

impl FromStr for Domain {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('_', "-");
        Domain::ALL
            .into_iter()
            .find(|d| d.as_str() == needle)
            .ok_or_else(|| ParseDomainError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::Domain;

    #[test]
    fn parses_names_leniently() {
        assert_eq!("distress".parse::<Domain>(), Ok(Domain::Distress));
        assert_eq!("Help_Request".parse::<Domain>(), Ok(Domain::HelpRequest));
        assert_eq!(" ai-forecast ".parse::<Domain>(), Ok(Domain::AiForecast));
        assert!("weather".parse::<Domain>().is_err());
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&Domain::HelpOffer).unwrap();
        assert_eq!(json, "\"help-offer\"");
        let back: Domain = serde_json::from_str("\"ai-forecast\"").unwrap();
        assert_eq!(back, Domain::AiForecast);
    }
}
