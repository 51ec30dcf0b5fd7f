use dishx_core::{MatchCluster, SourceId};
use sha2::{Digest, Sha256};

/// Prefix of every canonical entity id.
pub const ID_PREFIX: &str = "rst_";

/// Hex characters of the digest kept in the id.
const ID_HEX_LEN: usize = 16;

/// Deterministic id derived from one source record.
///
/// The same record always yields the same id, so re-running ingestion on
/// unchanged input updates entities in place instead of duplicating them.
pub fn stable_id(source: SourceId, source_record_id: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(format!("{source}:{source_record_id}").as_bytes()));
    format!("{ID_PREFIX}{}", &digest[..ID_HEX_LEN])
}

/// Id of the entity a cluster fuses into, keyed on its most trusted member.
pub fn cluster_id(cluster: &MatchCluster) -> Option<String> {
    cluster
        .members
        .iter()
        .min_by(|a, b| {
            a.source()
                .cmp(&b.source())
                .then_with(|| a.raw.source_record_id.cmp(&b.raw.source_record_id))
        })
        .map(|primary| stable_id(primary.source(), &primary.raw.source_record_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_id_shape() {
        let id = stable_id(SourceId::Google, "ChIJ123");
        assert!(id.starts_with("rst_"));
        assert_eq!(id.len(), 4 + 16);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_stable_id_is_deterministic() {
        assert_eq!(stable_id(SourceId::Osm, "node/1"), stable_id(SourceId::Osm, "node/1"));
        assert_ne!(stable_id(SourceId::Osm, "node/1"), stable_id(SourceId::Resy, "node/1"));
    }
}
