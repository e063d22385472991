//! Per-region price/latency sampling and read-through queries
//!
//! The feed keeps one near-real-time [`Observation`] per configured region in
//! the [`ObservationStore`]. Sampling runs as a background task on a fixed
//! interval against a shutdown signal; reads fall back to a documented
//! default observation for any region whose entry is missing, lapsed, or
//! fails to decode.
//!
//! ## Synthetic generation
//!
//! When the feed is the value source (no upstream market data is wired in),
//! each tick draws, per region:
//!
//! - base price uniform in `[0.04, 0.06)` $/hr
//! - base latency uniform in `[20, 80)` ms
//! - with probability 0.15, a sharp discount (price × 0.3) modelling an
//!   arbitrage opportunity
//! - independently, with probability 0.10, elevated latency in `[150, 300)` ms
//!
//! The two perturbations are independent Bernoulli events per region per
//! tick, so opportunities stay rare and uncorrelated across regions.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::region::{RegionMapping, RegionRegistry};
use crate::store::ObservationStore;

/// Fallback price ($/hr) when no live observation is available
pub const DEFAULT_PRICE: f64 = 0.05;

/// Fallback latency (ms) when no live observation is available
pub const DEFAULT_LATENCY_MS: u32 = 50;

/// Default interval between sampling passes
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(3);

/// Default observation TTL
///
/// Strictly longer than the sampling interval so a single missed tick does
/// not force readers onto the fallback.
pub const DEFAULT_OBSERVATION_TTL: Duration = Duration::from_secs(10);

const BASE_PRICE_MIN: f64 = 0.04;
const BASE_PRICE_MAX: f64 = 0.06;
const BASE_LATENCY_MIN: u32 = 20;
const BASE_LATENCY_MAX: u32 = 80;
const DISCOUNT_PROBABILITY: f64 = 0.15;
const DISCOUNT_FACTOR: f64 = 0.3;
const LATENCY_SPIKE_PROBABILITY: f64 = 0.1;
const SPIKE_LATENCY_MIN: u32 = 150;
const SPIKE_LATENCY_MAX: u32 = 300;

/// A timestamped price/latency sample for one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Region the sample belongs to
    pub region: String,

    /// Cluster context backing the region at sampling time
    #[serde(rename = "contextId")]
    pub context_id: String,

    /// Cost per unit time ($/hr), non-negative
    pub price: f64,

    /// Observed latency in milliseconds
    #[serde(rename = "latency")]
    pub latency_ms: u32,

    /// When the sample was taken
    #[serde(rename = "sampledAt")]
    pub sampled_at: DateTime<Utc>,
}

impl Observation {
    /// The documented fallback observation for a region
    ///
    /// Returned by [`PriceFeed::observations`] whenever the stored entry is
    /// missing, lapsed, or undecodable.
    pub fn fallback(region: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            context_id: context_id.into(),
            price: DEFAULT_PRICE,
            latency_ms: DEFAULT_LATENCY_MS,
            sampled_at: Utc::now(),
        }
    }
}

/// Maintains a near-real-time observation per configured region
pub struct PriceFeed {
    registry: Arc<RegionRegistry>,
    store: Arc<dyn ObservationStore>,
    sample_interval: Duration,
    observation_ttl: Duration,
}

impl PriceFeed {
    /// Create a feed with default sampling interval and TTL
    pub fn new(registry: Arc<RegionRegistry>, store: Arc<dyn ObservationStore>) -> Self {
        Self {
            registry,
            store,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            observation_ttl: DEFAULT_OBSERVATION_TTL,
        }
    }

    /// Override sampling interval and observation TTL
    ///
    /// The TTL should stay strictly longer than the interval; the feed does
    /// not enforce this, but a shorter TTL makes every missed tick visible
    /// to readers as a fallback.
    pub fn with_intervals(mut self, sample_interval: Duration, observation_ttl: Duration) -> Self {
        self.sample_interval = sample_interval;
        self.observation_ttl = observation_ttl;
        self
    }

    fn storage_key(region: &str) -> String {
        format!("price:{region}")
    }

    fn synthesize(&self, mapping: &RegionMapping) -> Observation {
        let mut rng = rand::thread_rng();

        let mut price = rng.gen_range(BASE_PRICE_MIN..BASE_PRICE_MAX);
        let mut latency_ms = rng.gen_range(BASE_LATENCY_MIN..BASE_LATENCY_MAX);

        // Rare sharp price drop: the arbitrage opportunity the evaluator
        // exists to catch
        if rng.gen_bool(DISCOUNT_PROBABILITY) {
            price *= DISCOUNT_FACTOR;
        }

        // Elevated latency, independent of the price event
        if rng.gen_bool(LATENCY_SPIKE_PROBABILITY) {
            latency_ms = rng.gen_range(SPIKE_LATENCY_MIN..SPIKE_LATENCY_MAX);
        }

        Observation {
            region: mapping.region.clone(),
            context_id: mapping.context_id.clone(),
            price,
            latency_ms,
            sampled_at: Utc::now(),
        }
    }

    /// Take one sampling pass over every configured region
    ///
    /// Writes are fire-and-forget: an individual store failure is logged and
    /// skipped so one region cannot stall the rest of the pass.
    pub async fn sample_once(&self) -> Result<()> {
        for mapping in self.registry.mappings() {
            let observation = self.synthesize(mapping);
            let payload = serde_json::to_vec(&observation)?;

            if let Err(e) = self
                .store
                .set(&Self::storage_key(&mapping.region), payload, self.observation_ttl)
                .await
            {
                warn!(
                    region = %mapping.region,
                    error = %e,
                    "Failed to persist observation"
                );
            }
        }
        Ok(())
    }

    /// Run the sampling loop until the shutdown signal turns true
    ///
    /// Performs one synchronous population pass before the first interval
    /// elapses, so the very first read after startup is never a fallback
    /// (unless the store write itself fails).
    pub async fn run_sampling(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.sample_interval.as_secs(),
            ttl_secs = self.observation_ttl.as_secs(),
            regions = self.registry.mappings().len(),
            "Starting price sampling"
        );

        if let Err(e) = self.sample_once().await {
            warn!(error = %e, "Initial sampling pass failed");
        }

        let mut ticker = tokio::time::interval(self.sample_interval);
        // Consume the immediate first tick; the initial pass above covers it
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sample_once().await {
                        warn!(error = %e, "Sampling pass failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Price sampling shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn read_region(&self, mapping: &RegionMapping) -> Result<Observation> {
        // A store infrastructure error propagates and fails the whole call;
        // everything below it degrades to the per-region fallback.
        let raw = self.store.get(&Self::storage_key(&mapping.region)).await?;

        let observation = match raw {
            Some(bytes) => match serde_json::from_slice::<Observation>(&bytes) {
                Ok(observation) => observation,
                Err(e) => {
                    warn!(
                        region = %mapping.region,
                        error = %e,
                        "Stored observation failed to decode, using fallback"
                    );
                    Observation::fallback(&mapping.region, &mapping.context_id)
                }
            },
            None => {
                debug!(region = %mapping.region, "No live observation, using fallback");
                Observation::fallback(&mapping.region, &mapping.context_id)
            }
        };

        Ok(observation)
    }

    /// Current observation for every configured region, in configuration
    /// order
    pub async fn observations(&self) -> Result<Vec<Observation>> {
        let reads = self
            .registry
            .mappings()
            .iter()
            .map(|mapping| self.read_region(mapping));

        futures::future::try_join_all(reads).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestratorError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    struct FailingStore;

    #[async_trait]
    impl ObservationStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(OrchestratorError::store("connection refused"))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
            Err(OrchestratorError::store("connection refused"))
        }
    }

    fn feed_with(store: Arc<dyn ObservationStore>) -> PriceFeed {
        PriceFeed::new(Arc::new(RegionRegistry::default()), store)
    }

    #[tokio::test]
    async fn test_empty_store_yields_fallbacks_for_all_regions() {
        let feed = feed_with(Arc::new(MemoryStore::new()));

        let observations = feed.observations().await.unwrap();

        assert_eq!(observations.len(), 5);
        for obs in &observations {
            assert_eq!(obs.price, DEFAULT_PRICE);
            assert_eq!(obs.latency_ms, DEFAULT_LATENCY_MS);
        }
        // Configuration order is preserved
        assert_eq!(observations[0].region, "US-East");
        assert_eq!(observations[4].region, "AP-Northeast");
    }

    #[tokio::test]
    async fn test_first_read_after_sample_is_never_fallback() {
        let store = Arc::new(MemoryStore::new());
        let feed = feed_with(store.clone());

        feed.sample_once().await.unwrap();

        // Every region has a live entry after the first pass
        for mapping in RegionRegistry::default().mappings() {
            let key = PriceFeed::storage_key(&mapping.region);
            assert!(store.get(&key).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_undecodable_entry_falls_back_for_that_region_only() {
        let store = Arc::new(MemoryStore::new());
        let feed = feed_with(store.clone());
        feed.sample_once().await.unwrap();

        store
            .set(
                "price:US-East",
                b"not json".to_vec(),
                Duration::from_secs(10),
            )
            .await
            .unwrap();

        let observations = feed.observations().await.unwrap();
        let us_east = observations.iter().find(|o| o.region == "US-East").unwrap();
        assert_eq!(us_east.price, DEFAULT_PRICE);
        assert_eq!(us_east.latency_ms, DEFAULT_LATENCY_MS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lapsed_entry_falls_back() {
        let store = Arc::new(MemoryStore::new());
        let feed = feed_with(store.clone());
        feed.sample_once().await.unwrap();

        tokio::time::advance(DEFAULT_OBSERVATION_TTL + Duration::from_secs(1)).await;

        let observations = feed.observations().await.unwrap();
        for obs in &observations {
            assert_eq!(obs.price, DEFAULT_PRICE);
        }
    }

    #[tokio::test]
    async fn test_store_infrastructure_failure_fails_whole_call() {
        let feed = feed_with(Arc::new(FailingStore));

        let result = feed.observations().await;
        assert!(matches!(result, Err(OrchestratorError::Store(_))));
    }

    #[tokio::test]
    async fn test_sampling_survives_store_write_failures() {
        let feed = feed_with(Arc::new(FailingStore));

        // Write failures are logged and skipped, not surfaced
        assert!(feed.sample_once().await.is_ok());
    }

    #[test]
    fn test_synthetic_values_stay_in_documented_ranges() {
        let registry = RegionRegistry::default();
        let feed = PriceFeed::new(
            Arc::new(registry.clone()),
            Arc::new(MemoryStore::new()),
        );
        let mapping = &registry.mappings()[0];

        for _ in 0..1000 {
            let obs = feed.synthesize(mapping);
            // Discounted floor: 0.04 * 0.3
            assert!(obs.price >= BASE_PRICE_MIN * DISCOUNT_FACTOR);
            assert!(obs.price < BASE_PRICE_MAX);
            assert!(obs.latency_ms >= BASE_LATENCY_MIN);
            assert!(obs.latency_ms < SPIKE_LATENCY_MAX);
        }
    }

    #[tokio::test]
    async fn test_observation_roundtrips_through_store() {
        let store = Arc::new(MemoryStore::new());
        let feed = feed_with(store.clone());
        feed.sample_once().await.unwrap();

        let observations = feed.observations().await.unwrap();
        let us_east = observations.iter().find(|o| o.region == "US-East").unwrap();
        assert_eq!(us_east.context_id, "ctx-us-east");
    }
}
