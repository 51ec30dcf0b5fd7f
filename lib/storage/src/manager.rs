use crate::snapshot::{checksum, decode, encode, SnapshotDescription, SnapshotManager};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use dishx_core::{CanonicalEntity, Error, Result, RunReport};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ENTITIES_FILE: &str = "entities.json.gz";
const CHECKSUM_FILE: &str = "entities.json.gz.sha256";
const REPORTS_DIR: &str = "reports";
const LAST_REPORT_FILE: &str = "last_run.json";

fn storage_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Storage(e.to_string())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| f.write_all(bytes))
        .map_err(storage_err)
}

/// Persistent store of canonical entities, keyed by entity id.
///
/// Entities live in memory behind a lock and are written as one
/// gzip-compressed JSON file plus a SHA-256 checksum sidecar. Both files
/// are replaced atomically, so a crash mid-save leaves the previous state
/// readable.
pub struct EntityStore {
    entities: RwLock<BTreeMap<String, CanonicalEntity>>,
    data_dir: PathBuf,
    snapshots: SnapshotManager,
}

impl EntityStore {
    /// Open (or create) the store under `data_dir`, loading whatever was
    /// saved last.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;

        let snapshots = SnapshotManager::new(data_dir.join("snapshots")).map_err(storage_err)?;
        let entities = Self::load(&data_dir)?;
        if !entities.is_empty() {
            info!(entities = entities.len(), path = %data_dir.display(), "entity store loaded");
        }

        Ok(Self {
            entities: RwLock::new(entities),
            data_dir,
            snapshots,
        })
    }

    fn load(data_dir: &Path) -> Result<BTreeMap<String, CanonicalEntity>> {
        let path = data_dir.join(ENTITIES_FILE);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let bytes = fs::read(&path)?;
        let checksum_path = data_dir.join(CHECKSUM_FILE);
        if checksum_path.exists() {
            let expected = fs::read_to_string(&checksum_path)?;
            let actual = checksum(&bytes);
            if expected.trim() != actual {
                return Err(Error::Storage(format!(
                    "Checksum mismatch for {}: expected {}, got {}",
                    path.display(),
                    expected.trim(),
                    actual
                )));
            }
        }

        let entities: Vec<CanonicalEntity> = decode(&bytes).map_err(storage_err)?;
        Ok(entities.into_iter().map(|e| (e.id.clone(), e)).collect())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn get(&self, id: &str) -> Option<CanonicalEntity> {
        self.entities.read().get(id).cloned()
    }

    /// All entities, ordered by id
    pub fn list(&self) -> Vec<CanonicalEntity> {
        self.entities.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    /// Insert or replace entities by id
    pub fn upsert_all(&self, entities: Vec<CanonicalEntity>) {
        let mut map = self.entities.write();
        for entity in entities {
            map.insert(entity.id.clone(), entity);
        }
    }

    /// Drop entities by id; returns how many were present.
    pub fn remove_all(&self, ids: &[String]) -> usize {
        let mut map = self.entities.write();
        ids.iter().filter(|id| map.remove(id.as_str()).is_some()).count()
    }

    /// Write the current entity set to disk
    pub fn save(&self) -> Result<()> {
        let entities = self.list();
        let bytes = encode(&entities).map_err(storage_err)?;

        write_atomic(&self.data_dir.join(ENTITIES_FILE), &bytes)?;
        write_atomic(&self.data_dir.join(CHECKSUM_FILE), checksum(&bytes).as_bytes())?;

        debug!(entities = entities.len(), bytes = bytes.len(), "entity store saved");
        Ok(())
    }

    /// Persist a run report as `reports/<run_id>.json` and as the last run
    pub fn save_report(&self, report: &RunReport) -> Result<PathBuf> {
        let reports_dir = self.data_dir.join(REPORTS_DIR);
        fs::create_dir_all(&reports_dir)?;

        let json = serde_json::to_vec_pretty(report)?;
        let path = reports_dir.join(format!("{}.json", report.run_id));
        write_atomic(&path, &json)?;
        write_atomic(&reports_dir.join(LAST_REPORT_FILE), &json)?;
        Ok(path)
    }

    pub fn last_report(&self) -> Result<Option<RunReport>> {
        let path = self.data_dir.join(REPORTS_DIR).join(LAST_REPORT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub fn create_snapshot(&self) -> Result<SnapshotDescription> {
        self.snapshots.create_snapshot(self.list()).map_err(storage_err)
    }

    pub fn list_snapshots(&self) -> Result<Vec<SnapshotDescription>> {
        self.snapshots.list_snapshots().map_err(storage_err)
    }

    /// Replace the in-memory entity set with a snapshot's content.
    /// Call [`save`](Self::save) to make the restore durable.
    pub fn restore_snapshot(&self, snapshot_name: &str) -> Result<usize> {
        let data = self.snapshots.load_snapshot(snapshot_name).map_err(storage_err)?;
        let count = data.entities.len();
        *self.entities.write() = data.entities.into_iter().map(|e| (e.id.clone(), e)).collect();
        info!(snapshot = snapshot_name, entities = count, "snapshot restored");
        Ok(count)
    }

    /// Remove a snapshot file; `false` if there was none by that name.
    pub fn delete_snapshot(&self, snapshot_name: &str) -> Result<bool> {
        self.snapshots.delete_snapshot(snapshot_name).map_err(storage_err)
    }
}
