//! Point-clustering parameters chosen from the device profile and the domain.

use std::collections::BTreeMap;

use foundation::device::DeviceProfile;
use foundation::domain::Domain;
use serde::{Deserialize, Serialize};

/// Options handed to the clustering index.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    pub radius: u32,
    pub max_zoom: u8,
    pub min_zoom: u8,
    pub min_points: u32,
    pub extent: u32,
    pub node_size: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterProfile {
    /// Bigger clusters that stay merged longer.
    Performance,
    Detail,
}

impl ClusterProfile {
    pub fn for_device(device: &DeviceProfile) -> Self {
        if device.is_constrained() {
            ClusterProfile::Performance
        } else {
            ClusterProfile::Detail
        }
    }

    pub const fn baseline(self) -> ClusterConfig {
        let (radius, max_zoom, min_points) = match self {
            ClusterProfile::Performance => (80, 14, 3),
            ClusterProfile::Detail => (50, 17, 2),
        };
        ClusterConfig {
            radius,
            max_zoom,
            min_zoom: 0,
            min_points,
            extent: 512,
            node_size: 64,
        }
    }
}

#[derive(Debug, Copy, Clone, Default)]
struct Override {
    radius: Option<u32>,
    max_zoom: Option<u8>,
    min_points: Option<u32>,
}

impl Override {
    fn apply(self, base: ClusterConfig) -> ClusterConfig {
        ClusterConfig {
            radius: self.radius.unwrap_or(base.radius),
            max_zoom: self.max_zoom.unwrap_or(base.max_zoom),
            min_points: self.min_points.unwrap_or(base.min_points),
            ..base
        }
    }
}

/// Distress breaks apart soonest; forecasts stay merged the longest.
fn domain_override(domain: Domain) -> Override {
    match domain {
        Domain::Distress => Override {
            radius: Some(40),
            max_zoom: Some(15),
            min_points: Some(2),
        },
        Domain::HelpRequest | Domain::HelpOffer => Override {
            radius: Some(60),
            max_zoom: Some(16),
            min_points: None,
        },
        Domain::Traffic => Override {
            radius: Some(45),
            max_zoom: Some(15),
            min_points: None,
        },
        Domain::AiForecast => Override {
            radius: Some(90),
            max_zoom: Some(12),
            min_points: Some(4),
        },
        Domain::Hazard => Override::default(),
    }
}

/// Resolves cluster options. Nothing is cached: every call recomputes from
/// the current device profile.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AdaptiveClusterPlanner {
    device: DeviceProfile,
}

impl AdaptiveClusterPlanner {
    pub fn new(device: DeviceProfile) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &DeviceProfile {
        &self.device
    }

    pub fn set_device(&mut self, device: DeviceProfile) {
        self.device = device;
    }

    pub fn profile(&self) -> ClusterProfile {
        ClusterProfile::for_device(&self.device)
    }

    pub fn cluster_config(&self, domain: Domain) -> ClusterConfig {
        domain_override(domain).apply(self.profile().baseline())
    }

    pub fn cluster_configs(&self) -> BTreeMap<Domain, ClusterConfig> {
        Domain::ALL
            .into_iter()
            .map(|d| (d, self.cluster_config(d)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{AdaptiveClusterPlanner, ClusterProfile};
    use foundation::device::{ConnectionType, DeviceProfile};
    use foundation::domain::Domain;
    use pretty_assertions::assert_eq;

    #[test]
    fn distress_override_beats_performance_baseline() {
        let planner = AdaptiveClusterPlanner::new(DeviceProfile::new(400).with_memory_gb(2.0));
        assert_eq!(planner.profile(), ClusterProfile::Performance);

        let c = planner.cluster_config(Domain::Distress);
        assert_eq!((c.radius, c.max_zoom, c.min_points), (40, 15, 2));
        assert_eq!((c.min_zoom, c.extent, c.node_size), (0, 512, 64));
    }

    #[test]
    fn domains_without_overrides_use_the_baseline() {
        let slow = AdaptiveClusterPlanner::new(
            DeviceProfile::new(1440).with_connection(ConnectionType::TwoG),
        );
        let c = slow.cluster_config(Domain::Hazard);
        assert_eq!((c.radius, c.max_zoom, c.min_points), (80, 14, 3));

        let desktop = AdaptiveClusterPlanner::new(DeviceProfile::new(1440).with_memory_gb(16.0));
        let c = desktop.cluster_config(Domain::Hazard);
        assert_eq!((c.radius, c.max_zoom, c.min_points), (50, 17, 2));

        let c = desktop.cluster_config(Domain::HelpOffer);
        assert_eq!((c.radius, c.max_zoom, c.min_points), (60, 16, 2));
    }

    #[test]
    fn output_follows_the_current_device() {
        let mut planner = AdaptiveClusterPlanner::new(DeviceProfile::new(1440));
        let first = planner.cluster_configs();
        assert_eq!(first, planner.cluster_configs());

        planner.set_device(DeviceProfile::new(600));
        assert_eq!(planner.profile(), ClusterProfile::Performance);
        assert_eq!(planner.cluster_config(Domain::Traffic).min_points, 3);
    }

    #[test]
    fn serializes_with_index_option_names() {
        let planner = AdaptiveClusterPlanner::new(DeviceProfile::default());
        let json = serde_json::to_value(planner.cluster_config(Domain::AiForecast)).unwrap();
        assert_eq!(json["maxZoom"], 12);
        assert_eq!(json["minPoints"], 4);
        assert_eq!(json["nodeSize"], 64);
    }
}
