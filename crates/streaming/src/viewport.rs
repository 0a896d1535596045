//! Viewport-bound fetching for one data domain.
//!
//! A [`ViewportFetcher`] turns a stream of viewport changes into as few
//! network calls as possible:
//! - changes inside the debounce window collapse to the last one;
//! - a viewport that still fits inside the last fetched (expanded) area is
//!   served from memory;
//! - every real request goes through the shared [`FeatureCache`];
//! - a newer request aborts the one in flight, and a superseded response can
//!   never overwrite newer state.

use std::sync::Arc;
use std::time::Duration;

use foundation::bounds::{BoundingBox, BoundsError};
use foundation::geometry::Feature;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::FeatureCache;
use crate::request::DomainConfig;
use crate::source::{FeatureSource, FetchError};

/// Collaborators shared by every domain fetcher.
#[derive(Clone)]
pub struct FetchContext {
    pub base_url: String,
    pub source: Arc<dyn FeatureSource>,
    pub cache: Arc<FeatureCache>,
}

impl FetchContext {
    pub fn new(
        base_url: impl Into<String>,
        source: Arc<dyn FeatureSource>,
        cache: Arc<FeatureCache>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            source,
            cache,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewportOptions {
    pub debounce: Duration,
    /// Symmetric growth of the requested bbox about its center.
    pub expansion_factor: f64,
}

impl Default for ViewportOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            expansion_factor: 1.3,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPhase {
    Idle,
    Debouncing,
    Fetching,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchOutcome {
    /// The viewport fit inside the last fetched area.
    Reused,
    CacheHit,
    Fetched,
    Failed,
}

/// Hook-style view of a fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportQuery {
    /// Last successful result; kept when a later fetch fails.
    pub data: Arc<Vec<Feature>>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub phase: FetchPhase,
    pub last_outcome: Option<FetchOutcome>,
}

impl Default for ViewportQuery {
    fn default() -> Self {
        Self {
            data: Arc::new(Vec::new()),
            is_loading: false,
            error: None,
            phase: FetchPhase::Idle,
            last_outcome: None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Mode {
    Viewport,
    Refetch,
    ForceRefresh,
}

#[derive(Debug)]
struct ActiveFetch {
    generation: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct State {
    last_expanded: Option<BoundingBox>,
    last_requested: Option<BoundingBox>,
    debounce: Option<(u64, CancellationToken)>,
    debounce_seq: u64,
    active: Option<ActiveFetch>,
    generation: u64,
    refresh_started: bool,
}

impl State {
    fn phase(&self) -> FetchPhase {
        if self.active.is_some() {
            FetchPhase::Fetching
        } else if self.debounce.is_some() {
            FetchPhase::Debouncing
        } else {
            FetchPhase::Idle
        }
    }
}

struct Shared {
    ctx: FetchContext,
    config: DomainConfig,
    options: ViewportOptions,
    state: Mutex<State>,
    tx: watch::Sender<ViewportQuery>,
    shutdown: CancellationToken,
}

impl Shared {
    fn publish(&self, st: &State, outcome: Option<FetchOutcome>) {
        self.tx.send_modify(|q| {
            q.phase = st.phase();
            q.is_loading = st.active.is_some();
            if outcome.is_some() {
                q.last_outcome = outcome;
            }
        });
    }

    async fn run(&self, bbox: BoundingBox, mode: Mode) {
        let domain = self.config.domain;
        let expanded = bbox.expand(self.options.expansion_factor);

        let (generation, token) = {
            let mut st = self.state.lock();
            let reuse = mode == Mode::Viewport
                && st.last_expanded.is_some_and(|prev| prev.contains(&bbox));

            if let Some(active) = st.active.take() {
                active.token.cancel();
                debug!(%domain, generation = active.generation, "aborting superseded fetch");
            }

            if reuse {
                debug!(%domain, "viewport inside last fetched area, reusing data");
                self.publish(&st, Some(FetchOutcome::Reused));
                return;
            }

            st.generation += 1;
            let token = self.shutdown.child_token();
            st.active = Some(ActiveFetch {
                generation: st.generation,
                token: token.clone(),
            });
            self.publish(&st, None);
            (st.generation, token)
        };

        let url = self.config.url_for(&self.ctx.base_url, &expanded);

        if mode != Mode::ForceRefresh
            && let Some(data) = self.ctx.cache.get(&url)
        {
            debug!(%domain, %url, "response cache hit");
            self.complete(generation, expanded, Ok(data), FetchOutcome::CacheHit);
            return;
        }

        debug!(%domain, %url, ?mode, "fetching");
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(%domain, generation, "fetch aborted");
                return;
            }
            r = self.ctx.source.fetch(&url) => r,
        };

        match result {
            Ok(features) => {
                let data = Arc::new(features);
                self.ctx.cache.set(url, Arc::clone(&data), self.config.ttl);
                self.complete(generation, expanded, Ok(data), FetchOutcome::Fetched);
            }
            Err(err) => {
                warn!(%domain, error = %err, "fetch failed");
                self.complete(generation, expanded, Err(err), FetchOutcome::Failed);
            }
        }
    }

    fn complete(
        &self,
        generation: u64,
        expanded: BoundingBox,
        result: Result<Arc<Vec<Feature>>, FetchError>,
        outcome: FetchOutcome,
    ) {
        let mut st = self.state.lock();
        match &st.active {
            Some(active) if active.generation == generation && !active.token.is_cancelled() => {}
            _ => {
                debug!(domain = %self.config.domain, generation, "discarding stale response");
                return;
            }
        }
        st.active = None;
        if result.is_ok() {
            st.last_expanded = Some(expanded);
        }

        let phase = st.phase();
        self.tx.send_modify(|q| {
            match result {
                Ok(data) => {
                    q.data = data;
                    q.error = None;
                }
                Err(err) => q.error = Some(err.to_string()),
            }
            q.phase = phase;
            q.is_loading = false;
            q.last_outcome = Some(outcome);
        });
    }
}

/// Debounced, bbox-aware fetch controller for one domain.
///
/// Must be driven from within a tokio runtime. Dropping the fetcher cancels
/// its debounce timer, in-flight fetch and auto-refresh.
pub struct ViewportFetcher {
    shared: Arc<Shared>,
}

impl ViewportFetcher {
    pub fn new(ctx: FetchContext, config: DomainConfig, options: ViewportOptions) -> Self {
        let (tx, _rx) = watch::channel(ViewportQuery::default());
        Self {
            shared: Arc::new(Shared {
                ctx,
                config,
                options,
                state: Mutex::new(State::default()),
                tx,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &DomainConfig {
        &self.shared.config
    }

    /// Records a viewport change. The fetch decision is made once the
    /// debounce window closes without a newer change.
    pub fn request(&self, bbox: BoundingBox) -> Result<(), BoundsError> {
        bbox.validate()?;
        let shared = &self.shared;
        if shared.shutdown.is_cancelled() {
            debug!(domain = %shared.config.domain, "request after shutdown ignored");
            return Ok(());
        }

        let token = shared.shutdown.child_token();
        let seq = {
            let mut st = shared.state.lock();
            st.debounce_seq += 1;
            let seq = st.debounce_seq;
            if let Some((_, prev)) = st.debounce.replace((seq, token.clone())) {
                prev.cancel();
                debug!(domain = %shared.config.domain, "debounce collapsed");
            }
            st.last_requested = Some(bbox);
            shared.publish(&st, None);
            seq
        };

        let task = Arc::clone(shared);
        let delay = shared.options.debounce;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            {
                let mut st = task.state.lock();
                match &st.debounce {
                    Some((current, _)) if *current == seq => st.debounce = None,
                    _ => return,
                }
            }
            task.run(bbox, Mode::Viewport).await;
        });

        self.start_auto_refresh();
        Ok(())
    }

    /// Re-requests the last viewport, skipping the containment check. The
    /// response cache still applies.
    pub async fn refetch(&self) {
        if let Some(bbox) = self.take_last_requested() {
            self.shared.run(bbox, Mode::Refetch).await;
        }
    }

    /// Like [`ViewportFetcher::refetch`] but always goes to the network.
    pub async fn force_refresh(&self) {
        if let Some(bbox) = self.take_last_requested() {
            self.shared.run(bbox, Mode::ForceRefresh).await;
        }
    }

    fn take_last_requested(&self) -> Option<BoundingBox> {
        if self.shared.shutdown.is_cancelled() {
            return None;
        }
        let mut st = self.shared.state.lock();
        if let Some((_, pending)) = st.debounce.take() {
            pending.cancel();
        }
        st.last_requested
    }

    pub fn snapshot(&self) -> ViewportQuery {
        self.shared.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewportQuery> {
        self.shared.tx.subscribe()
    }

    /// Resolves once no debounce or fetch is pending.
    pub async fn settled(&self) -> ViewportQuery {
        let mut rx = self.shared.tx.subscribe();
        match rx.wait_for(|q| q.phase == FetchPhase::Idle).await {
            Ok(q) => q.clone(),
            Err(_) => self.snapshot(),
        }
    }

    pub fn shutdown(&self) {
        let shared = &self.shared;
        if shared.shutdown.is_cancelled() {
            return;
        }
        shared.shutdown.cancel();
        let mut st = shared.state.lock();
        st.debounce = None;
        st.active = None;
        shared.publish(&st, None);
        debug!(domain = %shared.config.domain, "fetcher shut down");
    }

    fn start_auto_refresh(&self) {
        let Some(period) = self.shared.config.refresh_interval else {
            return;
        };
        {
            let mut st = self.shared.state.lock();
            if st.refresh_started {
                return;
            }
            st.refresh_started = true;
        }

        let weak = Arc::downgrade(&self.shared);
        let token = self.shared.shutdown.child_token();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                let last = shared.state.lock().last_requested;
                if let Some(bbox) = last {
                    debug!(domain = %shared.config.domain, "auto-refresh");
                    shared.run(bbox, Mode::Refetch).await;
                }
            }
        });
    }
}

impl Drop for ViewportFetcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::{FetchContext, FetchOutcome, FetchPhase, ViewportFetcher, ViewportOptions};
    use crate::cache::FeatureCache;
    use crate::request::DomainConfig;
    use crate::source::{BoxFuture, FeatureSource, FetchError};
    use foundation::bounds::{BoundingBox, BoundsError};
    use foundation::domain::Domain;
    use foundation::geometry::{Feature, Geometry};
    use foundation::time::ManualClock;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    type Reply = (Duration, Result<Vec<Feature>, FetchError>);

    /// Replies from a script, then with `fallback` after 50ms.
    struct ScriptedSource {
        calls: Mutex<Vec<String>>,
        script: Mutex<VecDeque<Reply>>,
        fallback: Vec<Feature>,
    }

    impl ScriptedSource {
        fn new(fallback: Vec<Feature>) -> Arc<Self> {
            Self::scripted(fallback, Vec::new())
        }

        fn scripted(fallback: Vec<Feature>, script: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                script: Mutex::new(script.into()),
                fallback,
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl FeatureSource for ScriptedSource {
        fn fetch(&self, url: &str) -> BoxFuture<'_, Result<Vec<Feature>, FetchError>> {
            self.calls.lock().push(url.to_string());
            let next = self.script.lock().pop_front();
            let (delay, reply) =
                next.unwrap_or_else(|| (Duration::from_millis(50), Ok(self.fallback.clone())));
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                reply
            })
        }
    }

    fn points(n: usize) -> Vec<Feature> {
        (0..n)
            .map(|i| Feature::new(Geometry::Point([106.8, -6.2])).with_id(i as u64))
            .collect()
    }

    fn fetcher(
        source: Arc<ScriptedSource>,
        domain: Domain,
    ) -> (Arc<ManualClock>, Arc<FeatureCache>, ViewportFetcher) {
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(FeatureCache::new(clock.clone()));
        let ctx = FetchContext::new("https://api.test", source, Arc::clone(&cache));
        let f = ViewportFetcher::new(
            ctx,
            DomainConfig::for_domain(domain),
            ViewportOptions::default(),
        );
        (clock, cache, f)
    }

    fn jakarta() -> BoundingBox {
        BoundingBox::new(106.6, -6.4, 107.0, -6.0)
    }

    fn shrink(b: BoundingBox, by: f64) -> BoundingBox {
        b.expand(1.0 - by)
    }

    fn far_away() -> BoundingBox {
        BoundingBox::new(124.0, 1.0, 125.0, 2.0)
    }

    #[tokio::test(start_paused = true)]
    async fn shrunk_viewport_is_served_from_memory() {
        let source = ScriptedSource::new(points(3));
        let (_clock, _cache, f) = fetcher(source.clone(), Domain::HelpRequest);

        f.request(jakarta()).unwrap();
        let q = f.settled().await;
        assert_eq!(q.data.len(), 3);
        assert_eq!(q.last_outcome, Some(FetchOutcome::Fetched));
        assert_eq!(source.calls().len(), 1);
        assert!(source.calls()[0].contains("/help/requests?bbox="));

        f.request(shrink(jakarta(), 0.1)).unwrap();
        let q = f.settled().await;
        assert_eq!(source.calls().len(), 1);
        assert_eq!(q.data.len(), 3);
        assert_eq!(q.last_outcome, Some(FetchOutcome::Reused));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_changes_fetches_once_with_the_final_bbox() {
        let source = ScriptedSource::new(points(1));
        let (_clock, _cache, f) = fetcher(source.clone(), Domain::HelpOffer);

        let last = BoundingBox::new(110.0, -8.0, 111.0, -7.0);
        f.request(jakarta()).unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;
        f.request(far_away()).unwrap();
        assert_eq!(f.snapshot().phase, FetchPhase::Debouncing);
        tokio::time::advance(Duration::from_millis(250)).await;
        f.request(last).unwrap();
        f.settled().await;

        let calls = source.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains(&last.expand(1.3).to_query_value()));
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_fetch_never_overwrites_newer_state() {
        let source = ScriptedSource::scripted(
            Vec::new(),
            vec![
                (Duration::from_millis(500), Ok(points(1))),
                (Duration::from_millis(10), Ok(points(2))),
            ],
        );
        let (_clock, _cache, f) = fetcher(source.clone(), Domain::Hazard);

        f.request(jakarta()).unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(f.snapshot().phase, FetchPhase::Fetching);

        f.request(far_away()).unwrap();
        let q = f.settled().await;
        assert_eq!(q.data.len(), 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        let q = f.snapshot();
        assert_eq!(q.data.len(), 2);
        assert_eq!(q.error, None);
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_sets_error_and_keeps_last_data() {
        let source = ScriptedSource::scripted(
            Vec::new(),
            vec![
                (Duration::from_millis(20), Ok(points(3))),
                (Duration::from_millis(20), Err(FetchError::Status(503))),
            ],
        );
        let (_clock, _cache, f) = fetcher(source.clone(), Domain::Traffic);

        f.request(jakarta()).unwrap();
        f.settled().await;
        f.request(far_away()).unwrap();
        let q = f.settled().await;

        assert_eq!(q.error.as_deref(), Some("HTTP error: 503"));
        assert_eq!(q.data.len(), 3);
        assert_eq!(q.last_outcome, Some(FetchOutcome::Failed));
        assert!(!q.is_loading);

        // The failed area was never recorded as fetched.
        f.request(jakarta()).unwrap();
        let q = f.settled().await;
        assert_eq!(q.last_outcome, Some(FetchOutcome::Reused));
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refetch_honors_the_response_cache_and_force_refresh_does_not() {
        let source = ScriptedSource::new(points(2));
        let (_clock, cache, f) = fetcher(source.clone(), Domain::HelpRequest);

        f.request(jakarta()).unwrap();
        f.settled().await;
        assert_eq!(cache.len(), 1);

        f.refetch().await;
        assert_eq!(f.snapshot().last_outcome, Some(FetchOutcome::CacheHit));
        assert_eq!(source.calls().len(), 1);

        f.force_refresh().await;
        assert_eq!(f.snapshot().last_outcome, Some(FetchOutcome::Fetched));
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_work() {
        let source = ScriptedSource::scripted(
            Vec::new(),
            vec![(Duration::from_millis(500), Ok(points(4)))],
        );
        let (_clock, _cache, f) = fetcher(source.clone(), Domain::HelpOffer);

        f.request(jakarta()).unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        f.shutdown();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let q = f.snapshot();
        assert!(q.data.is_empty());
        assert_eq!(q.phase, FetchPhase::Idle);
        assert_eq!(q.last_outcome, None);

        f.request(far_away()).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_auto_refresh() {
        let source = ScriptedSource::new(points(1));
        let (clock, _cache, f) = fetcher(source.clone(), Domain::Distress);

        f.request(jakarta()).unwrap();
        f.settled().await;
        f.shutdown();

        clock.advance(Duration::from_secs(120));
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(31)).await;
        }
        assert_eq!(source.calls().len(), 1);
        assert_eq!(f.snapshot().last_outcome, Some(FetchOutcome::Fetched));
    }

    #[tokio::test(start_paused = true)]
    async fn auto_refresh_reruns_the_last_viewport() {
        let source = ScriptedSource::new(points(1));
        let (clock, _cache, f) = fetcher(source.clone(), Domain::Distress);

        f.request(jakarta()).unwrap();
        f.settled().await;
        assert_eq!(source.calls().len(), 1);

        // First tick at 30s: response still cached.
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(f.snapshot().last_outcome, Some(FetchOutcome::CacheHit));
        assert_eq!(source.calls().len(), 1);

        // Second tick at 60s: cache entry expired.
        clock.advance(Duration::from_secs(31));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls().len(), 2);
        assert_eq!(f.snapshot().last_outcome, Some(FetchOutcome::Fetched));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_bbox_is_rejected_up_front() {
        let source = ScriptedSource::new(Vec::new());
        let (_clock, _cache, f) = fetcher(source.clone(), Domain::Hazard);

        let err = f.request(BoundingBox::new(107.0, -6.0, 106.0, -7.0)).unwrap_err();
        assert!(matches!(err, BoundsError::Inverted { .. }));
        assert_eq!(f.snapshot().phase, FetchPhase::Idle);
    }
}
