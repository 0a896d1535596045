use std::time::Duration;

use clap::Parser;
use foundation::bounds::BoundingBox;
use foundation::device::{ConnectionType, DeviceProfile};
use foundation::domain::Domain;
use streaming::cache::DEFAULT_MAX_ENTRIES;
use streaming::request::DomainConfig;
use streaming::viewport::ViewportOptions;

#[derive(Parser, Debug)]
#[command(
    name = "relief-probe",
    version,
    about = "Run the viewport pipeline once against a relief-data API and print a JSON report"
)]
pub struct Args {
    /// Base URL of the REST API (endpoint paths are appended)
    #[arg(long, env = "RELIEF_API_BASE", default_value = "http://localhost:3000/api")]
    pub api_base: String,

    /// Viewport: minLon,minLat,maxLon,maxLat
    #[arg(long, env = "RELIEF_BBOX", default_value = "106.6,-6.4,107.0,-6.0")]
    pub bbox: BoundingBox,

    #[arg(long, env = "RELIEF_ZOOM", default_value_t = 10.0)]
    pub zoom: f64,

    /// Comma-separated domains to fetch
    #[arg(
        long,
        env = "RELIEF_DOMAINS",
        value_delimiter = ',',
        default_value = "distress,help-request,help-offer,traffic,hazard,ai-forecast"
    )]
    pub domains: Vec<Domain>,

    /// Domains fetched but hidden from the map
    #[arg(long, value_delimiter = ',')]
    pub hide: Vec<Domain>,

    #[arg(long, env = "RELIEF_VIEWPORT_WIDTH", default_value_t = 1280)]
    pub viewport_width: u32,

    #[arg(long, env = "RELIEF_DEVICE_MEMORY_GB")]
    pub device_memory_gb: Option<f32>,

    /// Effective connection type: slow-2g, 2g, 3g or 4g
    #[arg(long, env = "RELIEF_NETWORK")]
    pub network: Option<ConnectionType>,

    #[arg(long, env = "RELIEF_CACHE_ENTRIES", default_value_t = DEFAULT_MAX_ENTRIES)]
    pub cache_entries: usize,

    #[arg(long, env = "RELIEF_DEBOUNCE_MS", default_value_t = 300)]
    pub debounce_ms: u64,

    /// Pretty-print the report
    #[arg(long)]
    pub pretty: bool,
}

impl Args {
    pub fn device_profile(&self) -> DeviceProfile {
        DeviceProfile {
            viewport_width: self.viewport_width,
            device_memory_gb: self.device_memory_gb,
            connection: self.network,
        }
    }

    pub fn viewport_options(&self) -> ViewportOptions {
        ViewportOptions {
            debounce: Duration::from_millis(self.debounce_ms),
            ..ViewportOptions::default()
        }
    }

    /// The URL a fetcher sends (and caches under) for this viewport: the
    /// bbox expanded by the fetch expansion factor.
    pub fn request_url(&self, config: &DomainConfig) -> String {
        let expanded = self.bbox.expand(self.viewport_options().expansion_factor);
        config.url_for(&self.api_base, &expanded)
    }
}
