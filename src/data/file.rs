//! Flat-file store
//!
//! `trades.csv` and `signals.csv` are append-only; `positions.json` and
//! `settings.json` are rewritten through a temp file and rename so a
//! concurrent reader never sees a torn write. File I/O runs on the blocking
//! pool while the per-file lock is held.

use super::{Outcome, Persistence, SettingUpdate, SignalRecord, StoreError, TradeRecord};
use crate::config::ExecutionMode;
use crate::position::Position;
use async_trait::async_trait;
use csv::{ReaderBuilder, WriterBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

const TRADES_FILE: &str = "trades.csv";
const SIGNALS_FILE: &str = "signals.csv";
const POSITIONS_FILE: &str = "positions.json";
const SETTINGS_FILE: &str = "settings.json";

/// CSV/JSON store rooted at a data directory
pub struct FileStore {
    dir: PathBuf,
    trades: Mutex<()>,
    signals: Mutex<()>,
    positions: Mutex<()>,
    settings: Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) the store at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "Opened file store");
        Ok(Self {
            dir,
            trades: Mutex::new(()),
            signals: Mutex::new(()),
            positions: Mutex::new(()),
            settings: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Every position, keyed by mode name
    pub async fn positions(&self) -> Result<BTreeMap<String, Position>, StoreError> {
        let _guard = self.positions.lock().await;
        let path = self.path(POSITIONS_FILE);
        blocking(move || read_json(&path)).await
    }
}

/// Run file I/O on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Worker(e.to_string()))?
}

#[async_trait]
impl Persistence for FileStore {
    async fn append_trade(&self, record: TradeRecord) -> Result<(), StoreError> {
        let _guard = self.trades.lock().await;
        let path = self.path(TRADES_FILE);
        blocking(move || append_csv(&path, &record)).await
    }

    async fn recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>, StoreError> {
        let _guard = self.trades.lock().await;
        let path = self.path(TRADES_FILE);
        let trades: Vec<TradeRecord> = blocking(move || read_csv(&path)).await?;
        Ok(trades.into_iter().rev().take(limit).collect())
    }

    async fn pending_outcomes(&self) -> Result<Vec<TradeRecord>, StoreError> {
        let _guard = self.trades.lock().await;
        let path = self.path(TRADES_FILE);
        let trades: Vec<TradeRecord> = blocking(move || read_csv(&path)).await?;
        Ok(trades
            .into_iter()
            .filter(|t| t.outcome.is_pending() && !t.market_id.is_empty())
            .collect())
    }

    async fn set_outcome(&self, trade_id: Uuid, outcome: Outcome) -> Result<bool, StoreError> {
        let _guard = self.trades.lock().await;
        let path = self.path(TRADES_FILE);
        blocking(move || {
            let mut trades: Vec<TradeRecord> = read_csv(&path)?;
            let Some(trade) = trades
                .iter_mut()
                .find(|t| t.id == trade_id && t.outcome.is_pending())
            else {
                return Ok(false);
            };
            trade.outcome = outcome;
            write_csv_atomic(&path, &trades)?;
            Ok(true)
        })
        .await
    }

    async fn load_position(&self, mode: ExecutionMode) -> Result<Option<Position>, StoreError> {
        let _guard = self.positions.lock().await;
        let path = self.path(POSITIONS_FILE);
        let mut positions: BTreeMap<String, Position> = blocking(move || read_json(&path)).await?;
        Ok(positions.remove(mode.as_str()))
    }

    async fn save_position(&self, mode: ExecutionMode, position: &Position) -> Result<(), StoreError> {
        let _guard = self.positions.lock().await;
        let path = self.path(POSITIONS_FILE);
        let position = position.clone();
        blocking(move || {
            let mut positions: BTreeMap<String, Position> = read_json(&path)?;
            positions.insert(mode.as_str().to_string(), position);
            write_json_atomic(&path, &positions)
        })
        .await
    }

    async fn clear_position(&self, mode: ExecutionMode) -> Result<(), StoreError> {
        let _guard = self.positions.lock().await;
        let path = self.path(POSITIONS_FILE);
        blocking(move || {
            let mut positions: BTreeMap<String, Position> = read_json(&path)?;
            if positions.remove(mode.as_str()).is_some() {
                write_json_atomic(&path, &positions)?;
            }
            Ok(())
        })
        .await
    }

    async fn setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.settings.lock().await;
        let path = self.path(SETTINGS_FILE);
        let mut settings: BTreeMap<String, String> = blocking(move || read_json(&path)).await?;
        Ok(settings.remove(key))
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let value = value.to_string();
        self.update_setting(key, Box::new(move |_| Ok(value))).await?;
        Ok(())
    }

    async fn update_setting(&self, key: &str, update: SettingUpdate) -> Result<String, StoreError> {
        let _guard = self.settings.lock().await;
        let path = self.path(SETTINGS_FILE);
        let key = key.to_string();
        blocking(move || {
            let mut settings: BTreeMap<String, String> = read_json(&path)?;
            let value = update(settings.get(&key).cloned())?;
            settings.insert(key, value.clone());
            write_json_atomic(&path, &settings)?;
            Ok(value)
        })
        .await
    }

    async fn append_signal(&self, record: SignalRecord) -> Result<(), StoreError> {
        let _guard = self.signals.lock().await;
        let path = self.path(SIGNALS_FILE);
        blocking(move || append_csv(&path, &record)).await
    }
}

/// Append one row, writing the header only into an empty file
fn append_csv<T: Serialize>(path: &Path, record: &T) -> Result<(), StoreError> {
    let file_has_data = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = WriterBuilder::new()
        .has_headers(!file_has_data)
        .from_writer(file);
    writer.serialize(record)?;
    writer.flush()?;
    Ok(())
}

/// All rows of a CSV file; a missing file is empty
fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

fn write_csv_atomic<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), StoreError> {
    let tmp = temp_path(path);
    {
        let mut writer = WriterBuilder::new().has_headers(true).from_path(&tmp)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Parsed JSON file; missing or empty files yield the default
fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    match fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Ok(T::default()),
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let tmp = temp_path(path);
    fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
