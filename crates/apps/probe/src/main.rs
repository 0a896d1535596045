mod args;
mod render;
mod summary;

use std::sync::Arc;

use clap::Parser;
use foundation::time::{Clock, SystemClock};
use layers::cluster::AdaptiveClusterPlanner;
use layers::visibility::LayerVisibility;
use runtime::scheduler::SchedulerConfig;
use streaming::cache::FeatureCache;
use streaming::regions::load_strategy;
use streaming::request::DomainConfig;
use streaming::source::HttpFeatureSource;
use streaming::viewport::{FetchContext, ViewportFetcher};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::args::Args;
use crate::summary::{ConsolidatedSummary, DomainSummary, Report};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let device = args.device_profile();
    let planner = AdaptiveClusterPlanner::new(device);
    let scheduler = SchedulerConfig::for_device(&device);
    let load_plan = load_strategy(&args.bbox, args.zoom);
    info!(
        bbox = %args.bbox.to_query_value(),
        zoom = args.zoom,
        profile = ?planner.profile(),
        immediate = ?load_plan.immediate,
        "probing viewport"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let cache = Arc::new(FeatureCache::with_max_entries(clock, args.cache_entries));
    let ctx = FetchContext::new(
        args.api_base.clone(),
        Arc::new(HttpFeatureSource::new()),
        Arc::clone(&cache),
    );

    let fetchers: Vec<ViewportFetcher> = args
        .domains
        .iter()
        .map(|d| {
            ViewportFetcher::new(
                ctx.clone(),
                DomainConfig::for_domain(*d),
                args.viewport_options(),
            )
        })
        .collect();
    for fetcher in &fetchers {
        fetcher.request(args.bbox)?;
    }

    let mut domains = Vec::with_capacity(fetchers.len());
    let mut inputs = Vec::with_capacity(fetchers.len());
    for fetcher in &fetchers {
        let query = fetcher.settled().await;
        fetcher.shutdown();

        let config = fetcher.config();
        let url = args.request_url(config);
        if let Some(err) = &query.error {
            warn!(domain = %config.domain, %url, "fetch failed: {err}");
        } else {
            info!(domain = %config.domain, features = query.data.len(), "fetched");
        }
        domains.push(DomainSummary::new(config.domain, url, &query));
        inputs.push((config.domain, Arc::clone(&query.data)));
    }

    let mut visibility = LayerVisibility::new();
    for domain in &args.hide {
        visibility.set_layer_visibility(*domain, false);
    }
    let outcome = render::render(scheduler, inputs, visibility)?;
    if !outcome.validation.valid {
        warn!(issues = ?outcome.validation.issues, "layer order violations");
    }

    let report = Report {
        viewport: args.bbox,
        zoom: args.zoom,
        device,
        scheduler: scheduler.into(),
        cluster_profile: planner.profile(),
        cluster_configs: planner.cluster_configs(),
        load_plan,
        domains,
        consolidated: ConsolidatedSummary::from(&outcome),
        draw_order: outcome.draw_order.clone(),
        order: outcome.validation.clone(),
        cache: cache.stats(),
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}
