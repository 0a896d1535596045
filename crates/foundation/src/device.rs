use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Network effective connection type as reported by the host environment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
}

impl ConnectionType {
    pub fn is_slow(self) -> bool {
        matches!(self, ConnectionType::Slow2g | ConnectionType::TwoG)
    }
}

impl FromStr for ConnectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => Ok(ConnectionType::Slow2g),
            "2g" => Ok(ConnectionType::TwoG),
            "3g" => Ok(ConnectionType::ThreeG),
            "4g" => Ok(ConnectionType::FourG),
            other => Err(format!("unknown connection type: {other:?}")),
        }
    }
}

pub const NARROW_VIEWPORT_PX: u32 = 768;
pub const LOW_MEMORY_GB: f32 = 4.0;

/// Device capabilities sampled once per session and passed to whatever
/// needs to adapt to them.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub viewport_width: u32,
    /// `None` when the host does not report memory.
    pub device_memory_gb: Option<f32>,
    pub connection: Option<ConnectionType>,
}

impl DeviceProfile {
    pub fn new(viewport_width: u32) -> Self {
        Self {
            viewport_width,
            device_memory_gb: None,
            connection: None,
        }
    }

    pub fn with_memory_gb(mut self, gb: f32) -> Self {
        self.device_memory_gb = Some(gb);
        self
    }

    pub fn with_connection(mut self, connection: ConnectionType) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Narrow viewport, little memory or a slow link.
    ///
    /// Unreported memory or connection never counts as constrained.
    pub fn is_constrained(&self) -> bool {
        self.viewport_width < NARROW_VIEWPORT_PX
            || self.device_memory_gb.is_some_and(|gb| gb < LOW_MEMORY_GB)
            || self.connection.is_some_and(ConnectionType::is_slow)
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::new(1280)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConnectionType, DeviceProfile};

    #[test]
    fn any_single_constraint_is_enough() {
        assert!(!DeviceProfile::new(1280).is_constrained());
        assert!(DeviceProfile::new(400).is_constrained());
        assert!(DeviceProfile::new(1280).with_memory_gb(2.0).is_constrained());
        assert!(!DeviceProfile::new(1280).with_memory_gb(8.0).is_constrained());
        assert!(
            DeviceProfile::new(1280)
                .with_connection(ConnectionType::Slow2g)
                .is_constrained()
        );
        assert!(
            !DeviceProfile::new(1280)
                .with_connection(ConnectionType::ThreeG)
                .is_constrained()
        );
    }

    #[test]
    fn connection_names_round_trip_through_serde() {
        let v: ConnectionType = serde_json::from_str("\"slow-2g\"").unwrap();
        assert_eq!(v, ConnectionType::Slow2g);
        assert_eq!(serde_json::to_string(&ConnectionType::TwoG).unwrap(), "\"2g\"");
        assert_eq!("4G".parse::<ConnectionType>(), Ok(ConnectionType::FourG));
    }
}
