use std::collections::BTreeMap;
use std::time::Duration;

use foundation::bounds::BoundingBox;
use foundation::domain::Domain;

pub const DEFAULT_PAGE_LIMIT: u32 = 500;

/// How one data domain is requested from the REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainConfig {
    pub domain: Domain,
    /// Endpoint path relative to the API base, with a leading `/`.
    pub path: &'static str,
    /// Lifetime of responses in the shared response cache.
    pub ttl: Duration,
    /// Auto-refresh interval; `None` disables polling.
    pub refresh_interval: Option<Duration>,
    pub limit: u32,
    /// Extra filter parameters. Kept sorted so URLs are stable cache keys.
    pub params: BTreeMap<String, String>,
}

impl DomainConfig {
    pub fn for_domain(domain: Domain) -> Self {
        let (path, ttl_secs, refresh_secs) = match domain {
            Domain::Distress => ("/distress/reports", 30, Some(30)),
            Domain::HelpRequest => ("/help/requests", 60, None),
            Domain::HelpOffer => ("/help/offers", 60, None),
            Domain::Traffic => ("/traffic/disruptions", 45, Some(60)),
            Domain::Hazard => ("/hazards/zones", 60, None),
            Domain::AiForecast => ("/forecasts", 120, None),
        };
        Self {
            domain,
            path,
            ttl: Duration::from_secs(ttl_secs),
            refresh_interval: refresh_secs.map(Duration::from_secs),
            limit: DEFAULT_PAGE_LIMIT,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Full request URL for `bbox`; doubles as the response cache key.
    pub fn url_for(&self, base_url: &str, bbox: &BoundingBox) -> String {
        let mut url = format!(
            "{}{}?bbox={}&limit={}",
            base_url.trim_end_matches('/'),
            self.path,
            bbox.to_query_value(),
            self.limit
        );
        for (k, v) in &self.params {
            url.push('&');
            url.push_str(k);
            url.push('=');
            url.push_str(v);
        }
        url
    }
}
