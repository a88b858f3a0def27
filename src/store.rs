//! Thin record store.
//!
//! Records are write-once: [`RecordStore::save`] refuses an id that is
//! already stored, so a re-run of an upload always lands as a new record.
//! Reads are by id or "most recent first".

use crate::error::IngestError;
use crate::output::EnrichmentRecord;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

pub trait RecordStore: Send + Sync {
    /// Persist a new record.
    fn save<'a>(&'a self, record: &'a EnrichmentRecord) -> BoxFuture<'a, Result<(), IngestError>>;

    /// Fetch one record by id.
    fn get(&self, id: Uuid) -> BoxFuture<'_, Result<EnrichmentRecord, IngestError>>;

    /// Up to `limit` records, newest first.
    fn recent(&self, limit: usize) -> BoxFuture<'_, Result<Vec<EnrichmentRecord>, IngestError>>;
}

fn newest_first(records: &mut [EnrichmentRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

// ── In memory ────────────────────────────────────────────────────────────

/// Process-local store, mostly for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Uuid, EnrichmentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, EnrichmentRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RecordStore for MemoryStore {
    fn save<'a>(&'a self, record: &'a EnrichmentRecord) -> BoxFuture<'a, Result<(), IngestError>> {
        Box::pin(async move {
            let mut records = self.lock();
            if records.contains_key(&record.id) {
                return Err(IngestError::StoreFailed {
                    path: PathBuf::from(":memory:"),
                    detail: format!("record {} already exists", record.id),
                });
            }
            records.insert(record.id, record.clone());
            Ok(())
        })
    }

    fn get(&self, id: Uuid) -> BoxFuture<'_, Result<EnrichmentRecord, IngestError>> {
        Box::pin(async move {
            self.lock()
                .get(&id)
                .cloned()
                .ok_or_else(|| IngestError::RecordNotFound { id: id.to_string() })
        })
    }

    fn recent(&self, limit: usize) -> BoxFuture<'_, Result<Vec<EnrichmentRecord>, IngestError>> {
        Box::pin(async move {
            let mut all: Vec<EnrichmentRecord> = self.lock().values().cloned().collect();
            newest_first(&mut all);
            all.truncate(limit);
            Ok(all)
        })
    }
}

// ── JSON directory ───────────────────────────────────────────────────────

/// One `<id>.json` file per record in a directory.
///
/// Writes go to `<id>.json.tmp` first and are renamed into place, so a
/// reader never sees a half-written record.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, IngestError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| IngestError::StoreFailed {
            path: dir.clone(),
            detail: e.to_string(),
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn store_err(path: &Path, e: impl std::fmt::Display) -> IngestError {
        IngestError::StoreFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        }
    }

    async fn read_record(path: &Path) -> Result<EnrichmentRecord, IngestError> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Self::store_err(path, e))?;
        serde_json::from_str(&json).map_err(|e| Self::store_err(path, e))
    }
}

impl RecordStore for JsonDirStore {
    fn save<'a>(&'a self, record: &'a EnrichmentRecord) -> BoxFuture<'a, Result<(), IngestError>> {
        Box::pin(async move {
            let path = self.record_path(record.id);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(Self::store_err(
                    &path,
                    format!("record {} already exists", record.id),
                ));
            }

            let json =
                serde_json::to_string_pretty(record).map_err(|e| Self::store_err(&path, e))?;
            let tmp_path = path.with_extension("json.tmp");
            tokio::fs::write(&tmp_path, json)
                .await
                .map_err(|e| Self::store_err(&tmp_path, e))?;
            tokio::fs::rename(&tmp_path, &path)
                .await
                .map_err(|e| Self::store_err(&path, e))?;

            debug!("Saved record {} to {}", record.id, path.display());
            Ok(())
        })
    }

    fn get(&self, id: Uuid) -> BoxFuture<'_, Result<EnrichmentRecord, IngestError>> {
        Box::pin(async move {
            let path = self.record_path(id);
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(IngestError::RecordNotFound { id: id.to_string() });
            }
            Self::read_record(&path).await
        })
    }

    fn recent(&self, limit: usize) -> BoxFuture<'_, Result<Vec<EnrichmentRecord>, IngestError>> {
        Box::pin(async move {
            let mut entries = tokio::fs::read_dir(&self.dir)
                .await
                .map_err(|e| Self::store_err(&self.dir, e))?;

            let mut records = Vec::new();
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Self::store_err(&self.dir, e))?
            {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match Self::read_record(&path).await {
                    Ok(r) => records.push(r),
                    Err(e) => warn!("Skipping unreadable record: {e}"),
                }
            }

            newest_first(&mut records);
            records.truncate(limit);
            Ok(records)
        })
    }
}
