//! Market-monitor: market analytics polling process.
//!
//! Single-binary Tokio application that:
//! 1. Fetches a basket of instruments from the chart feed
//! 2. Caches one consistent snapshot under a TTL
//! 3. Scores composite risk and pair spread signals
//! 4. Delivers scheduled alerts to enabled subscribers

mod config;
mod journal;

use std::{sync::Arc, time::Duration};

use clap::{Parser, ValueEnum};
use serde_json::json;
use tracing::{error, info};

use analytics::{
    AlertScheduler, MarketCommands, SnapshotAssembler, SnapshotCache, SubscriberRegistry,
};
use common::MonitorConfig;
use journal::{now_iso, resolve_alerts_dir, AlertJournal};
use market_feed::{InstrumentFetcher, YahooChartClient};

/// Market analytics monitor
#[derive(Parser)]
#[command(name = "market-monitor", about = "Market risk and pair signal monitor")]
struct Cli {
    /// Print one report and exit.
    #[arg(long, value_enum)]
    report: Option<ReportKind>,

    /// Print the current snapshot as JSON and exit.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportKind {
    Risk,
    Market,
    Pairs,
    Summary,
}

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

fn build_cache(cfg: &MonitorConfig) -> common::Result<Arc<SnapshotCache>> {
    let feed = YahooChartClient::new(&cfg.feed)?;
    let fetcher = InstrumentFetcher::new(
        Arc::new(feed),
        Duration::from_secs(cfg.feed.timeout_secs),
        cfg.window_len,
    );
    let assembler = SnapshotAssembler::new(fetcher, cfg);
    Ok(Arc::new(SnapshotCache::new(
        assembler,
        Duration::from_secs(cfg.cache_ttl_secs),
    )))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "market_monitor=info,market_feed=info,analytics=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let cache = match build_cache(&cfg) {
        Ok(c) => c,
        Err(e) => {
            error!("Feed client initialization failed: {}", e);
            std::process::exit(1);
        }
    };
    let registry = SubscriberRegistry::new();
    for sub in &cfg.alert_subscribers {
        registry.enable(sub);
    }
    let commands = MarketCommands::new(cache.clone(), registry.clone(), &cfg);

    // ── One-shot modes ───────────────────────────────────────────────
    if cli.json {
        match commands.snapshot().await {
            Ok(snapshot) => match serde_json::to_string_pretty(&*snapshot) {
                Ok(body) => println!("{}", body),
                Err(e) => {
                    error!("Snapshot serialization failed: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                error!("Snapshot unavailable: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if let Some(kind) = cli.report {
        let text = match kind {
            ReportKind::Risk => commands.risk().await,
            ReportKind::Market => commands.market().await,
            ReportKind::Pairs => commands.pairs().await,
            ReportKind::Summary => commands.summary().await,
        };
        println!("{}", text);
        return;
    }

    // ── Polling mode ─────────────────────────────────────────────────
    info!("📈 Market Monitor starting up...");
    info!(
        "Instruments: {:?}",
        cfg.instruments.iter().map(|i| &i.id).collect::<Vec<_>>()
    );
    info!(
        "Cache TTL={}s, alerts every {}s (first after {}s), feed timeout={}s",
        cfg.cache_ttl_secs,
        cfg.alert_interval_secs,
        cfg.alert_first_delay_secs,
        cfg.feed.timeout_secs
    );

    let journal = match AlertJournal::open(resolve_alerts_dir()) {
        Ok(j) => Arc::new(j),
        Err(e) => {
            error!("Failed to initialize alert journal: {}", e);
            std::process::exit(1);
        }
    };
    info!("Alert journal path: {}", journal.dir().display());
    journal
        .write_event(json!({
            "ts": now_iso(),
            "kind": "monitor_start",
            "instruments": cfg.instruments.iter().map(|i| i.id.clone()).collect::<Vec<_>>(),
            "pairs": cfg.pairs.iter().map(|p| p.name.clone()).collect::<Vec<_>>(),
            "subscribers": registry.enabled_subscribers(),
            "cache_ttl_secs": cfg.cache_ttl_secs,
            "alert_interval_secs": cfg.alert_interval_secs
        }))
        .await;

    // Warm the cache so the first alert and heartbeat have data.
    if let Err(e) = cache.get_or_refresh(false).await {
        error!("Initial refresh failed: {}", e);
    }

    let scheduler = AlertScheduler::new(
        cache.clone(),
        registry.clone(),
        journal.clone(),
        Duration::from_secs(cfg.alert_interval_secs),
        Duration::from_secs(cfg.alert_first_delay_secs),
    );
    let alert_handle = tokio::spawn(scheduler.run());

    let hb_cache = cache.clone();
    let hb_registry = registry.clone();
    let hb_journal = journal.clone();
    let heartbeat_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let subscribers = hb_registry.enabled_subscribers().len();
            let Some(snapshot) = hb_cache.peek().await else {
                info!("HEARTBEAT: no snapshot yet, subscribers={}", subscribers);
                continue;
            };
            info!(
                "HEARTBEAT: fetched_at={} available={}/{} risk={:.1} subscribers={}",
                snapshot.fetched_at,
                snapshot.available_count(),
                snapshot.instruments.len(),
                snapshot.risk.value,
                subscribers
            );
            hb_journal
                .write_event(json!({
                    "ts": now_iso(),
                    "kind": "heartbeat",
                    "fetched_at": snapshot.fetched_at.to_rfc3339(),
                    "available": snapshot.available_count(),
                    "instruments": snapshot.instruments.len(),
                    "risk_score": snapshot.risk.value,
                    "risk_band": snapshot.risk.band.label(),
                    "subscribers": subscribers
                }))
                .await;
        }
    });

    // ── Wait for shutdown ────────────────────────────────────────────
    info!("🚀 Market Monitor is running. Press Ctrl+C to stop.");

    let shutdown_reason = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            "ctrl_c"
        }
        r = alert_handle => {
            error!("Alert task exited: {:?}", r);
            "alert_task_exit"
        }
        r = heartbeat_handle => {
            error!("Heartbeat task exited: {:?}", r);
            "heartbeat_task_exit"
        }
    };

    journal
        .write_event(json!({
            "ts": now_iso(),
            "kind": "monitor_shutdown",
            "reason": shutdown_reason
        }))
        .await;

    info!("Market Monitor shut down.");
}
