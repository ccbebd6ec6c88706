//! JSONL alert journal with daily file rotation.
//!
//! Serves as the process's `AlertSink`: every scheduled alert becomes one
//! line in `alerts-YYYY-MM-DD.jsonl`. Lifecycle events share the file.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use analytics::AlertSink;
use common::{Error, Result};

const MONITOR_ALERT_DIR: &str = "market-monitor";

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn resolve_repo_root() -> Option<PathBuf> {
    let mut cursor = std::env::current_dir().ok()?;
    loop {
        if cursor.join(".git").is_dir() {
            return Some(cursor);
        }
        if !cursor.pop() {
            return None;
        }
    }
}

pub fn resolve_alerts_dir() -> PathBuf {
    if let Ok(raw) = std::env::var("ALERTS_DIR") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed).join(MONITOR_ALERT_DIR);
        }
    }

    if let Some(root) = resolve_repo_root() {
        return root.join("ALERTS").join(MONITOR_ALERT_DIR);
    }

    PathBuf::from("ALERTS").join(MONITOR_ALERT_DIR)
}

struct JournalFile {
    dir: PathBuf,
    day_key: String,
    file: File,
}

impl JournalFile {
    fn open_day_file(dir: &Path, day_key: &str) -> std::io::Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(format!("alerts-{}.jsonl", day_key)))
    }

    fn rotate_if_needed(&mut self) -> std::io::Result<()> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        if today != self.day_key {
            self.file = Self::open_day_file(&self.dir, &today)?;
            self.day_key = today;
        }
        Ok(())
    }

    fn append(&mut self, event: &serde_json::Value) -> std::io::Result<()> {
        self.rotate_if_needed()?;
        let line = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
        writeln!(self.file, "{}", line)?;
        self.file.flush()
    }
}

pub struct AlertJournal {
    dir: PathBuf,
    inner: Mutex<JournalFile>,
}

impl AlertJournal {
    pub fn open(dir: PathBuf) -> std::io::Result<Self> {
        create_dir_all(&dir)?;
        let day_key = Utc::now().format("%Y-%m-%d").to_string();
        let file = JournalFile::open_day_file(&dir, &day_key)?;
        Ok(Self {
            dir: dir.clone(),
            inner: Mutex::new(JournalFile { dir, day_key, file }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append a lifecycle event. Write failures are logged, not raised.
    pub async fn write_event(&self, event: serde_json::Value) {
        if let Err(e) = self.inner.lock().await.append(&event) {
            warn!("Alert journal write failed: {}", e);
        }
    }
}

#[async_trait]
impl AlertSink for AlertJournal {
    async fn deliver(&self, subscriber: &str, message: &str) -> Result<()> {
        let event = json!({
            "ts": now_iso(),
            "kind": "alert",
            "subscriber": subscriber,
            "message": message,
        });
        self.inner
            .lock()
            .await
            .append(&event)
            .map_err(|e| Error::Delivery {
                subscriber: subscriber.to_string(),
                message: e.to_string(),
            })?;
        info!("Alert journaled for {}", subscriber);
        Ok(())
    }
}
