//! JSON ledger per user, one file each: `<dir>/<user>.json`.
//!
//! Every ledger operation is a read-modify-write of the whole file under one
//! lock, run on tokio's blocking pool. Writes go to a temp file that is then
//! renamed over the ledger, so a crash never leaves a half-written ledger
//! behind. Audit entries only ever grow, so they live apart from the ledger in
//! an append-only `<dir>/<user>.log.jsonl`, one entry per line.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use signaldesk_core::domain::{
    EvaluationScore, RealTrade, ScoreId, Signal, SimulatedTrade, UserId,
};

use super::{RecordStore, StoreError, SystemLogEntry, UserLedger, WatchlistEntry};
use crate::config::PipelineSettings;

pub struct JsonFileStore {
    inner: Arc<Inner>,
}

struct Inner {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            inner: Arc::new(Inner {
                dir,
                lock: Mutex::new(()),
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Ledger file for `user`. Characters outside `[A-Za-z0-9_-]` become `_`.
    pub fn ledger_path(&self, user: &UserId) -> PathBuf {
        self.inner.ledger_path(user)
    }

    /// Append-only audit log for `user`.
    pub fn log_path(&self, user: &UserId) -> PathBuf {
        self.inner.log_path(user)
    }

    /// Non-ledger state kept in the store directory: `<dir>/.<name>.json`.
    /// Ledger names never start with `.`, so the two never collide.
    pub fn sidecar_path(&self, name: &str) -> PathBuf {
        self.inner.dir.join(format!(".{name}.json"))
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Inner) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let _guard = inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
            f(&inner)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {e}")))?
    }

    async fn read<T, F>(&self, user: &UserId, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(UserLedger) -> T + Send + 'static,
        T: Send + 'static,
    {
        let user = user.clone();
        self.blocking(move |inner| Ok(f(inner.load(&inner.ledger_path(&user))?)))
            .await
    }

    async fn modify<T, F>(&self, user: &UserId, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut UserLedger) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let user = user.clone();
        self.blocking(move |inner| {
            let path = inner.ledger_path(&user);
            let mut ledger = inner.load(&path)?;
            let out = f(&mut ledger)?;
            inner.persist(&path, &ledger)?;
            Ok(out)
        })
        .await
    }
}

impl Inner {
    fn file_stem(user: &UserId) -> String {
        let safe: String = user
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        if safe.is_empty() {
            "_".to_string()
        } else {
            safe
        }
    }

    fn ledger_path(&self, user: &UserId) -> PathBuf {
        self.dir.join(format!("{}.json", Self::file_stem(user)))
    }

    fn log_path(&self, user: &UserId) -> PathBuf {
        self.dir.join(format!("{}.log.jsonl", Self::file_stem(user)))
    }

    fn load(&self, path: &Path) -> Result<UserLedger, StoreError> {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(UserLedger::default()),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn persist(&self, path: &Path, ledger: &UserLedger) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(ledger).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)
    }

    fn append_log(&self, user: &UserId, entry: &SystemLogEntry) -> Result<(), StoreError> {
        let path = self.log_path(user);
        let mut line = serde_json::to_string(entry).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;
        line.push('\n');
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).map_err(io_err)
    }

    fn read_logs(&self, user: &UserId) -> Result<Vec<SystemLogEntry>, StoreError> {
        let path = self.log_path(user);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|source| StoreError::Corrupt {
                    path: path.clone(),
                    source,
                })
            })
            .collect()
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn save_signal(&self, user: &UserId, signal: &Signal) -> Result<(), StoreError> {
        let signal = signal.clone();
        self.modify(user, move |l| {
            l.save_signal(&signal);
            Ok(())
        })
        .await
    }

    async fn signals(&self, user: &UserId) -> Result<Vec<Signal>, StoreError> {
        self.read(user, |l| l.signals).await
    }

    async fn save_score(&self, user: &UserId, score: &EvaluationScore) -> Result<(), StoreError> {
        let score = score.clone();
        self.modify(user, move |l| {
            l.save_score(&score);
            Ok(())
        })
        .await
    }

    async fn scores(&self, user: &UserId) -> Result<Vec<EvaluationScore>, StoreError> {
        self.read(user, |l| l.scores).await
    }

    async fn mark_score_delivered(&self, user: &UserId, id: ScoreId) -> Result<bool, StoreError> {
        self.modify(user, move |l| l.mark_score_delivered(id)).await
    }

    async fn save_simulated_trade(
        &self,
        user: &UserId,
        trade: &SimulatedTrade,
    ) -> Result<(), StoreError> {
        let trade = trade.clone();
        self.modify(user, move |l| {
            l.save_simulated_trade(&trade);
            Ok(())
        })
        .await
    }

    async fn update_simulated_trade(
        &self,
        user: &UserId,
        trade: &SimulatedTrade,
    ) -> Result<(), StoreError> {
        let trade = trade.clone();
        self.modify(user, move |l| l.update_simulated_trade(&trade)).await
    }

    async fn simulated_trades(&self, user: &UserId) -> Result<Vec<SimulatedTrade>, StoreError> {
        self.read(user, |l| l.simulated_trades).await
    }

    async fn save_real_trade(&self, user: &UserId, trade: &RealTrade) -> Result<(), StoreError> {
        let trade = trade.clone();
        self.modify(user, move |l| {
            l.save_real_trade(&trade);
            Ok(())
        })
        .await
    }

    async fn real_trades(&self, user: &UserId) -> Result<Vec<RealTrade>, StoreError> {
        self.read(user, |l| l.real_trades).await
    }

    async fn watchlist(&self, user: &UserId) -> Result<Vec<WatchlistEntry>, StoreError> {
        self.read(user, |l| l.watchlist).await
    }

    async fn add_to_watchlist(
        &self,
        user: &UserId,
        entry: &WatchlistEntry,
    ) -> Result<bool, StoreError> {
        let entry = entry.clone();
        self.modify(user, move |l| Ok(l.add_to_watchlist(&entry))).await
    }

    async fn remove_from_watchlist(&self, user: &UserId, symbol: &str) -> Result<bool, StoreError> {
        let symbol = symbol.to_string();
        self.modify(user, move |l| Ok(l.remove_from_watchlist(&symbol)))
            .await
    }

    async fn settings(&self, user: &UserId) -> Result<Option<PipelineSettings>, StoreError> {
        self.read(user, |l| l.settings).await
    }

    async fn save_settings(
        &self,
        user: &UserId,
        settings: &PipelineSettings,
    ) -> Result<(), StoreError> {
        let settings = settings.clone();
        self.modify(user, move |l| {
            l.settings = Some(settings);
            Ok(())
        })
        .await
    }

    async fn save_log(&self, user: &UserId, entry: &SystemLogEntry) -> Result<(), StoreError> {
        let user = user.clone();
        let entry = entry.clone();
        self.blocking(move |inner| inner.append_log(&user, &entry))
            .await
    }

    async fn logs(&self, user: &UserId) -> Result<Vec<SystemLogEntry>, StoreError> {
        let user = user.clone();
        self.blocking(move |inner| {
            // ledgers written before the split may still carry entries
            let mut logs = inner.load(&inner.ledger_path(&user))?.logs;
            logs.extend(inner.read_logs(&user)?);
            Ok(logs)
        })
        .await
    }
}
