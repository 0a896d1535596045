use std::collections::BTreeMap;

use foundation::bounds::BoundingBox;
use foundation::device::DeviceProfile;
use foundation::domain::Domain;
use layers::cluster::{ClusterConfig, ClusterProfile};
use layers::order::OrderValidation;
use runtime::scheduler::SchedulerConfig;
use serde::Serialize;
use streaming::cache::CacheStats;
use streaming::regions::LoadPlan;
use streaming::viewport::{FetchOutcome, ViewportQuery};

use crate::render::RenderOutcome;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub viewport: BoundingBox,
    pub zoom: f64,
    pub device: DeviceProfile,
    pub scheduler: SchedulerSummary,
    pub cluster_profile: ClusterProfile,
    pub cluster_configs: BTreeMap<Domain, ClusterConfig>,
    pub load_plan: LoadPlan,
    pub domains: Vec<DomainSummary>,
    pub consolidated: ConsolidatedSummary,
    pub draw_order: Vec<String>,
    pub order: OrderValidation,
    pub cache: CacheStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSummary {
    pub idle_timeout_ms: u64,
    pub batch_delay_ms: u64,
    pub max_batch_size: usize,
}

impl From<SchedulerConfig> for SchedulerSummary {
    fn from(config: SchedulerConfig) -> Self {
        Self {
            idle_timeout_ms: config.idle_timeout.as_millis() as u64,
            batch_delay_ms: config.batch_delay.as_millis() as u64,
            max_batch_size: config.max_batch_size,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSummary {
    pub domain: Domain,
    pub url: String,
    pub features: usize,
    pub outcome: Option<FetchOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DomainSummary {
    pub fn new(domain: Domain, url: String, query: &ViewportQuery) -> Self {
        Self {
            domain,
            url,
            features: query.data.len(),
            outcome: query.last_outcome,
            error: query.error.clone(),
        }
    }
}

#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedSummary {
    pub total: usize,
    pub points: usize,
    pub polygons: usize,
    pub batches: usize,
    pub by_domain: BTreeMap<Domain, usize>,
}

impl From<&RenderOutcome> for ConsolidatedSummary {
    fn from(outcome: &RenderOutcome) -> Self {
        let c = &outcome.consolidated;
        let mut by_domain = BTreeMap::new();
        for f in &c.features {
            *by_domain.entry(f.domain).or_insert(0) += 1;
        }
        Self {
            total: c.len(),
            points: c.points.len(),
            polygons: c.polygons.len(),
            batches: outcome.batches,
            by_domain,
        }
    }
}
