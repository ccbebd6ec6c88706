//! Command surface shared by chat handlers and the dashboard.
//!
//! Each reply reads one snapshot from the cache, so every figure in a
//! reply comes from the same refresh cycle.

use std::sync::Arc;
use std::time::Duration;

use common::{MonitorConfig, Result};
use tracing::{error, info};

use crate::alerts::{AlertState, SubscriberRegistry};
use crate::cache::SnapshotCache;
use crate::report;
use crate::snapshot::MarketSnapshot;

#[derive(Clone)]
pub struct MarketCommands {
    cache: Arc<SnapshotCache>,
    registry: SubscriberRegistry,
    headline: Vec<String>,
    alert_interval: Duration,
}

impl MarketCommands {
    pub fn new(
        cache: Arc<SnapshotCache>,
        registry: SubscriberRegistry,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            cache,
            registry,
            headline: config
                .instruments
                .iter()
                .filter(|i| i.headline)
                .map(|i| i.id.clone())
                .collect(),
            alert_interval: Duration::from_secs(config.alert_interval_secs),
        }
    }

    /// Shared accessor for any caller that renders its own view.
    pub async fn snapshot(&self) -> Result<Arc<MarketSnapshot>> {
        self.cache.get_or_refresh(false).await
    }

    async fn reply_with(
        &self,
        command: &str,
        render: impl FnOnce(&MarketSnapshot) -> String,
    ) -> String {
        match self.snapshot().await {
            Ok(snapshot) => render(&snapshot),
            Err(e) => {
                error!("{} failed: {}", command, e);
                format!("❌ Error: {}", e)
            }
        }
    }

    pub async fn risk(&self) -> String {
        self.reply_with("risk", report::risk).await
    }

    pub async fn market(&self) -> String {
        self.reply_with("market", report::market).await
    }

    pub async fn pairs(&self) -> String {
        self.reply_with("pairs", report::pairs).await
    }

    pub async fn summary(&self) -> String {
        let headline = &self.headline;
        self.reply_with("summary", |s| report::summary(s, headline)).await
    }

    /// Force a refresh and report the resulting fetch time.
    pub async fn refresh(&self) -> String {
        let before = self.cache.peek().await;
        match self.cache.get_or_refresh(true).await {
            Ok(snapshot) => {
                let when = snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC");
                if before.is_some_and(|b| Arc::ptr_eq(&b, &snapshot)) {
                    format!("⚠️ Refresh failed; still serving data fetched at {}", when)
                } else {
                    format!(
                        "🔄 Data refreshed at {} ({}/{} instruments)",
                        when,
                        snapshot.available_count(),
                        snapshot.instruments.len()
                    )
                }
            }
            Err(e) => {
                error!("refresh failed: {}", e);
                format!("❌ Error: {}", e)
            }
        }
    }

    pub fn alert_on(&self, subscriber: &str) -> String {
        self.registry.enable(subscriber);
        info!("Alerts enabled for {}", subscriber);
        format!(
            "✅ Scheduled alerts on.\nInterval: {} min",
            self.alert_interval.as_secs() / 60
        )
    }

    pub fn alert_off(&self, subscriber: &str) -> String {
        self.registry.disable(subscriber);
        info!("Alerts disabled for {}", subscriber);
        "⛔ Scheduled alerts off.".to_string()
    }

    pub fn alert_status(&self, subscriber: &str) -> String {
        match self.registry.state(subscriber) {
            AlertState::Enabled => format!(
                "⏰ Scheduled alerts are ON.\nInterval: {}s ({} min)",
                self.alert_interval.as_secs(),
                self.alert_interval.as_secs() / 60
            ),
            AlertState::Disabled => "⏰ Scheduled alerts are OFF.".to_string(),
        }
    }
}
