use crate::normalized::NormalizedRecord;
use crate::record::SourceId;

/// A group of records believed to describe the same restaurant.
///
/// `members` holds at most one record per source, sorted by source priority.
/// `duplicates` holds same-source records absorbed as internal duplicates of
/// a member; they belong to the cluster for partition purposes but do not
/// take part in field resolution.
#[derive(Debug, Clone)]
pub struct MatchCluster {
    pub members: Vec<NormalizedRecord>,
    pub duplicates: Vec<NormalizedRecord>,
    pub confidence: f32,
}

impl MatchCluster {
    pub fn singleton(record: NormalizedRecord) -> Self {
        Self {
            members: vec![record],
            duplicates: Vec::new(),
            confidence: 1.0,
        }
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    /// The most trusted member; clusters are never empty.
    pub fn primary(&self) -> Option<&NormalizedRecord> {
        self.members.first()
    }

    pub fn sources(&self) -> Vec<SourceId> {
        self.members.iter().map(|m| m.source()).collect()
    }

    pub fn member(&self, source: SourceId) -> Option<&NormalizedRecord> {
        self.members.iter().find(|m| m.source() == source)
    }

    /// Every record key in the cluster, members first.
    pub fn record_keys(&self) -> Vec<String> {
        self.members
            .iter()
            .chain(self.duplicates.iter())
            .map(|r| r.key())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.len() + self.duplicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
