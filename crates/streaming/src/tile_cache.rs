use std::sync::Arc;
use std::time::Duration;

use foundation::domain::Domain;
use foundation::geometry::Feature;
use foundation::time::Clock;

use crate::cache::ResponseCache;
use crate::regions::REGIONS;

pub const REGION_TILE_TTL: Duration = Duration::from_secs(5 * 60);

/// Per (domain, region) feature cache with a fixed TTL.
///
/// Independent of the URL-keyed response cache; sized so that every
/// domain/region pair fits without eviction.
#[derive(Debug)]
pub struct RegionTileCache {
    inner: ResponseCache<Arc<Vec<Feature>>>,
}

impl RegionTileCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: ResponseCache::with_max_entries(clock, REGIONS.len() * Domain::ALL.len()),
        }
    }

    fn key(domain: Domain, region_id: &str) -> String {
        format!("{domain}:{region_id}")
    }

    pub fn get(&self, domain: Domain, region_id: &str) -> Option<Arc<Vec<Feature>>> {
        self.inner.get(&Self::key(domain, region_id))
    }

    pub fn set(&self, domain: Domain, region_id: &str, features: Arc<Vec<Feature>>) {
        self.inner
            .set(Self::key(domain, region_id), features, REGION_TILE_TTL);
    }

    /// Drops one region's tiles for every domain.
    pub fn invalidate_region(&self, region_id: &str) -> usize {
        Domain::ALL
            .iter()
            .filter(|d| self.inner.invalidate(&Self::key(**d, region_id)))
            .count()
    }

    pub fn invalidate_domain(&self, domain: Domain) -> usize {
        self.inner.invalidate_pattern(&format!("{domain}:"))
    }

    /// Regions from `region_ids` with no live tile for `domain`, in input order.
    pub fn missing<'a>(&self, domain: Domain, region_ids: &[&'a str]) -> Vec<&'a str> {
        region_ids
            .iter()
            .copied()
            .filter(|id| self.get(domain, id).is_none())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
