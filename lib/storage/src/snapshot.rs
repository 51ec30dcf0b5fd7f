// Point-in-time snapshots of the canonical entity set
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use dishx_core::CanonicalEntity;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

const SNAPSHOT_EXTENSION: &str = "snapshot";

/// Snapshot description for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDescription {
    pub name: String,
    pub creation_time: Option<String>,
    pub size: u64,
    pub entities: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Snapshot payload - every entity plus when it was taken
#[derive(Debug, Serialize, Deserialize)]
pub struct EntitySnapshotData {
    pub created_at: DateTime<Utc>,
    pub entities: Vec<CanonicalEntity>,
}

/// Gzip-compressed JSON encoding shared by the store file and snapshots.
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let json_data = serde_json::to_vec(value)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json_data)?;
    Ok(encoder.finish()?)
}

pub(crate) fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    let mut decoder = GzDecoder::new(bytes);
    let mut json_data = Vec::new();
    decoder.read_to_end(&mut json_data)?;
    Ok(serde_json::from_slice(&json_data)?)
}

pub(crate) fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub struct SnapshotManager {
    snapshot_dir: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_dir: P) -> Result<Self> {
        let snapshot_dir = snapshot_dir.as_ref().to_path_buf();
        fs::create_dir_all(&snapshot_dir)?;
        Ok(Self { snapshot_dir })
    }

    /// Generate snapshot filename with timestamp
    fn generate_snapshot_name(now: DateTime<Utc>) -> String {
        format!("entities-{}.{}", now.format("%Y-%m-%d-%H-%M-%S-%3f"), SNAPSHOT_EXTENSION)
    }

    fn describe(path: &Path, entities: Option<usize>) -> Result<SnapshotDescription> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("Invalid snapshot path: {}", path.display()))?
            .to_string();
        let metadata = fs::metadata(path)?;
        let file_data = fs::read(path)?;

        let creation_time = metadata
            .modified()
            .ok()
            .map(DateTime::<Utc>::from)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string());

        Ok(SnapshotDescription {
            name,
            creation_time,
            size: metadata.len(),
            entities,
            checksum: Some(checksum(&file_data)),
        })
    }

    /// Write a snapshot of `entities`
    pub fn create_snapshot(&self, entities: Vec<CanonicalEntity>) -> Result<SnapshotDescription> {
        let data = EntitySnapshotData {
            created_at: Utc::now(),
            entities,
        };
        let snapshot_path = self.snapshot_dir.join(Self::generate_snapshot_name(data.created_at));
        let count = data.entities.len();

        let bytes = encode(&data)?;
        let mut file = File::create(&snapshot_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;

        Self::describe(&snapshot_path, Some(count))
    }

    /// List all snapshots, newest first
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotDescription>> {
        if !self.snapshot_dir.exists() {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&self.snapshot_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some(SNAPSHOT_EXTENSION) {
                snapshots.push(Self::describe(&path, None)?);
            }
        }

        // Sort by name (which includes timestamp)
        snapshots.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(snapshots)
    }

    /// Load a snapshot by name
    pub fn load_snapshot(&self, snapshot_name: &str) -> Result<EntitySnapshotData> {
        let snapshot_path = self.snapshot_path(snapshot_name)?;
        if !snapshot_path.exists() {
            return Err(anyhow!("Snapshot '{}' not found", snapshot_name));
        }

        let mut bytes = Vec::new();
        BufReader::new(File::open(&snapshot_path)?).read_to_end(&mut bytes)?;
        decode(&bytes)
    }

    /// Delete a snapshot
    pub fn delete_snapshot(&self, snapshot_name: &str) -> Result<bool> {
        let snapshot_path = self.snapshot_path(snapshot_name)?;
        if snapshot_path.exists() {
            fs::remove_file(&snapshot_path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Snapshot names are plain file names; anything with a path separator
    /// is rejected.
    fn snapshot_path(&self, snapshot_name: &str) -> Result<PathBuf> {
        if snapshot_name.contains(['/', '\\']) || snapshot_name.starts_with('.') {
            return Err(anyhow!("Invalid snapshot name '{}'", snapshot_name));
        }
        Ok(self.snapshot_dir.join(snapshot_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dishx_core::SourceId;

    #[test]
    fn test_create_list_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SnapshotManager::new(dir.path().join("snapshots")).unwrap();

        let entity = CanonicalEntity::new("rst_1", "Lilia", SourceId::Google, Utc::now());
        let description = manager.create_snapshot(vec![entity.clone()]).unwrap();
        assert_eq!(description.entities, Some(1));
        assert!(description.checksum.is_some());

        let listed = manager.list_snapshots().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, description.name);

        let data = manager.load_snapshot(&description.name).unwrap();
        assert_eq!(data.entities, vec![entity]);

        assert!(manager.delete_snapshot(&description.name).unwrap());
        assert!(manager.list_snapshots().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SnapshotManager::new(dir.path()).unwrap();
        assert!(manager.load_snapshot("../entities.json.gz").is_err());
    }
}
