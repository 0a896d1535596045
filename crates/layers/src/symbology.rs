//! Static lookup tables that turn domain + urgency into draw priority,
//! color, glyph and size.

use foundation::domain::Domain;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Urgency (requests, reports) or severity (hazards, disruptions).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Critical,
    High,
    Medium,
    Low,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Critical, Level::High, Level::Medium, Level::Low];

    /// Case-insensitive; any other word is not a level.
    pub fn parse(raw: &str) -> Option<Level> {
        Level::ALL
            .into_iter()
            .find(|level| raw.trim().eq_ignore_ascii_case(level.as_str()))
    }

    /// `urgency` wins over `severity` when both are present.
    pub fn from_properties(properties: &Map<String, Value>) -> Option<Level> {
        ["urgency", "severity"]
            .iter()
            .filter_map(|key| properties.get(*key).and_then(Value::as_str))
            .find_map(Level::parse)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Critical => "critical",
            Level::High => "high",
            Level::Medium => "medium",
            Level::Low => "low",
        }
    }

    pub const fn color(self) -> &'static str {
        match self {
            Level::Critical => "#dc2626",
            Level::High => "#ea580c",
            Level::Medium => "#f59e0b",
            Level::Low => "#16a34a",
        }
    }

    pub const fn size_multiplier(self) -> f64 {
        match self {
            Level::Critical => 1.3,
            Level::High => 1.15,
            Level::Medium | Level::Low => 1.0,
        }
    }

    /// How far the level lifts a feature above its domain's base priority.
    pub const fn priority_boost(self) -> u8 {
        match self {
            Level::Critical => 2,
            Level::High => 1,
            Level::Medium | Level::Low => 0,
        }
    }
}

/// Base draw priority per domain; 0 is the most important.
pub const fn domain_priority(domain: Domain) -> u8 {
    match domain {
        Domain::Distress => 1,
        Domain::Hazard => 2,
        Domain::HelpRequest => 3,
        Domain::Traffic => 4,
        Domain::HelpOffer => 5,
        Domain::AiForecast => 6,
    }
}

pub const fn domain_color(domain: Domain) -> &'static str {
    match domain {
        Domain::Distress => "#b91c1c",
        Domain::Hazard => "#a16207",
        Domain::HelpRequest => "#2563eb",
        Domain::Traffic => "#7c3aed",
        Domain::HelpOffer => "#059669",
        Domain::AiForecast => "#0891b2",
    }
}

pub const fn domain_symbol(domain: Domain) -> &'static str {
    match domain {
        Domain::Distress => "sos",
        Domain::Hazard => "warning",
        Domain::HelpRequest => "hand-raised",
        Domain::Traffic => "road-closure",
        Domain::HelpOffer => "heart",
        Domain::AiForecast => "forecast",
    }
}

pub fn feature_priority(domain: Domain, level: Option<Level>) -> u8 {
    let boost = level.map_or(0, Level::priority_boost);
    domain_priority(domain).saturating_sub(boost)
}

pub fn feature_color(domain: Domain, level: Option<Level>) -> &'static str {
    level.map_or(domain_color(domain), Level::color)
}

pub fn size_multiplier(level: Option<Level>) -> f64 {
    level.map_or(1.0, Level::size_multiplier)
}

#[cfg(test)]
mod tests {
    use super::{Level, feature_color, feature_priority, size_multiplier};
    use foundation::domain::Domain;
    use serde_json::json;

    #[test]
    fn urgency_shifts_priority_and_floors_at_zero() {
        assert_eq!(feature_priority(Domain::Distress, Some(Level::Critical)), 0);
        assert_eq!(feature_priority(Domain::Distress, Some(Level::High)), 0);
        assert_eq!(feature_priority(Domain::HelpRequest, Some(Level::Critical)), 1);
        assert_eq!(feature_priority(Domain::HelpRequest, Some(Level::High)), 2);
        assert_eq!(feature_priority(Domain::HelpRequest, Some(Level::Low)), 3);
        assert_eq!(feature_priority(Domain::AiForecast, None), 6);
    }

    #[test]
    fn level_color_takes_precedence_over_domain_color() {
        assert_eq!(feature_color(Domain::HelpOffer, Some(Level::Critical)), "#dc2626");
        assert_eq!(feature_color(Domain::HelpOffer, None), "#059669");
        assert_eq!(size_multiplier(Some(Level::High)), 1.15);
        assert_eq!(size_multiplier(None), 1.0);
    }

    #[test]
    fn level_is_read_from_urgency_then_severity() {
        let props = json!({"urgency": "HIGH", "severity": "critical"});
        let props = props.as_object().unwrap();
        assert_eq!(Level::from_properties(props), Some(Level::High));

        let props = json!({"urgency": "unknown", "severity": "High"});
        assert_eq!(Level::from_properties(props.as_object().unwrap()), Some(Level::High));

        let props = json!({"severity": "severe"});
        assert_eq!(Level::from_properties(props.as_object().unwrap()), None);

        let props = json!({"status": "open"});
        assert_eq!(Level::from_properties(props.as_object().unwrap()), None);
    }
}
