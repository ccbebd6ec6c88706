//! Scheduled alerts.
//!
//! Subscribers toggle between enabled and disabled. A single timer wakes
//! on a fixed interval, reads the shared snapshot through the cache (no
//! forced refresh), and fans the rendered alert out to every enabled
//! subscriber concurrently.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::Result;
use dashmap::DashMap;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::cache::SnapshotCache;
use crate::report;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    Enabled,
    Disabled,
}

/// Per-subscriber alert state. Unknown subscribers count as disabled.
#[derive(Debug, Clone, Default)]
pub struct SubscriberRegistry {
    states: Arc<DashMap<String, AlertState>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&self, subscriber: &str) {
        self.states.insert(subscriber.to_string(), AlertState::Enabled);
    }

    pub fn disable(&self, subscriber: &str) {
        self.states.insert(subscriber.to_string(), AlertState::Disabled);
    }

    pub fn state(&self, subscriber: &str) -> AlertState {
        self.states
            .get(subscriber)
            .map(|s| *s)
            .unwrap_or(AlertState::Disabled)
    }

    /// Enabled subscribers, sorted for stable delivery order in logs.
    pub fn enabled_subscribers(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .states
            .iter()
            .filter(|e| *e.value() == AlertState::Enabled)
            .map(|e| e.key().clone())
            .collect();
        out.sort();
        out
    }
}

/// Delivery channel for rendered alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, subscriber: &str, message: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct AlertScheduler {
    cache: Arc<SnapshotCache>,
    registry: SubscriberRegistry,
    sink: Arc<dyn AlertSink>,
    interval: Duration,
    first_delay: Duration,
}

impl AlertScheduler {
    pub fn new(
        cache: Arc<SnapshotCache>,
        registry: SubscriberRegistry,
        sink: Arc<dyn AlertSink>,
        interval: Duration,
        first_delay: Duration,
    ) -> Self {
        Self {
            cache,
            registry,
            sink,
            interval,
            first_delay,
        }
    }

    /// One alert round. A failed delivery is logged and counted; it never
    /// stops delivery to the remaining subscribers.
    pub async fn run_tick(&self) -> Result<TickReport> {
        let subscribers = self.registry.enabled_subscribers();
        if subscribers.is_empty() {
            return Ok(TickReport::default());
        }

        let snapshot = self.cache.get_or_refresh(false).await?;
        let message = report::alert(&snapshot);

        let results = join_all(subscribers.iter().map(|sub| {
            let message = message.as_str();
            async move { (sub, self.sink.deliver(sub, message).await) }
        }))
        .await;

        let mut tick = TickReport::default();
        for (sub, result) in results {
            match result {
                Ok(()) => tick.delivered += 1,
                Err(e) => {
                    warn!("Alert delivery to {} failed: {}", sub, e);
                    tick.failed += 1;
                }
            }
        }
        Ok(tick)
    }

    /// Tick forever: first after `first_delay`, then every `interval`.
    pub async fn run(self) {
        let start = Instant::now() + self.first_delay;
        let period = self.interval.max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Alert scheduler started (first in {}s, every {}s)",
            self.first_delay.as_secs(),
            self.interval.as_secs()
        );

        loop {
            ticker.tick().await;
            match self.run_tick().await {
                Ok(tick) if tick.delivered + tick.failed > 0 => info!(
                    "Alert tick: delivered={} failed={}",
                    tick.delivered, tick.failed
                ),
                Ok(_) => {}
                Err(e) => warn!("Alert tick skipped, no snapshot: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{cache_over, gold_silver_feed};
    use common::Error;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<(String, String)>>,
        reject: Vec<String>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn deliver(&self, subscriber: &str, message: &str) -> Result<()> {
            if self.reject.iter().any(|r| r == subscriber) {
                return Err(Error::Delivery {
                    subscriber: subscriber.to_string(),
                    message: "chat not found".into(),
                });
            }
            self.delivered
                .lock()
                .unwrap()
                .push((subscriber.to_string(), message.to_string()));
            Ok(())
        }
    }

    fn scheduler(
        cache: Arc<SnapshotCache>,
        registry: SubscriberRegistry,
        sink: Arc<RecordingSink>,
    ) -> AlertScheduler {
        AlertScheduler::new(
            cache,
            registry,
            sink,
            Duration::from_secs(3600),
            Duration::from_secs(10),
        )
    }

    #[test]
    fn test_registry_state_machine() {
        let registry = SubscriberRegistry::new();
        assert_eq!(registry.state("42"), AlertState::Disabled);
        registry.enable("42");
        assert_eq!(registry.state("42"), AlertState::Enabled);
        registry.enable("42");
        assert_eq!(registry.enabled_subscribers(), vec!["42".to_string()]);
        registry.disable("42");
        assert_eq!(registry.state("42"), AlertState::Disabled);
        assert!(registry.enabled_subscribers().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_block_others() {
        let feed = gold_silver_feed();
        let cache = cache_over(&feed, Duration::from_secs(60));
        let registry = SubscriberRegistry::new();
        for sub in ["a", "b", "c"] {
            registry.enable(sub);
        }
        let sink = Arc::new(RecordingSink {
            reject: vec!["b".into()],
            ..Default::default()
        });

        let tick = scheduler(cache, registry, sink.clone()).run_tick().await.unwrap();

        assert_eq!(tick, TickReport { delivered: 2, failed: 1 });
        let delivered = sink.delivered.lock().unwrap();
        let subs: Vec<&str> = delivered.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(subs, vec!["a", "c"]);
        assert!(delivered[0].1.contains("Scheduled market alert"));
    }

    #[tokio::test]
    async fn test_tick_reads_through_cache() {
        let feed = gold_silver_feed();
        let cache = cache_over(&feed, Duration::from_secs(60));
        cache.get_or_refresh(false).await.unwrap();

        let registry = SubscriberRegistry::new();
        registry.enable("a");
        registry.enable("b");
        registry.disable("b");
        let sink = Arc::new(RecordingSink::default());

        let tick = scheduler(cache, registry, sink).run_tick().await.unwrap();

        assert_eq!(tick.delivered, 1);
        assert_eq!(feed.calls(), 2);
    }

    #[tokio::test]
    async fn test_no_subscribers_skips_fetch() {
        let feed = gold_silver_feed();
        let cache = cache_over(&feed, Duration::from_secs(60));
        let sink = Arc::new(RecordingSink::default());

        let tick = scheduler(cache, SubscriberRegistry::new(), sink)
            .run_tick()
            .await
            .unwrap();

        assert_eq!(tick, TickReport::default());
        assert_eq!(feed.calls(), 0);
    }
}
