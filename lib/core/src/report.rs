//! Structured run report
//!
//! Non-fatal problems never abort a run. Each component pushes a
//! [`RunIssue`] into the report held by the run context, and the report is
//! returned (and persisted) once the run finishes.

use crate::entity::Field;
use crate::normalized::ParseField;
use crate::record::SourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Two sources disagreeing on a field inside one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub entity_id: String,
    pub field: Field,
    pub source1: SourceId,
    pub value1: String,
    pub source2: SourceId,
    pub value2: String,
    /// Normalized Levenshtein similarity of the two values
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunIssue {
    /// A field could not be parsed; the raw value was kept.
    ParseFailure {
        record: String,
        field: ParseField,
        raw: String,
    },
    /// A gray-zone pair resolved by the greedy tie-break.
    MatchAmbiguity {
        left: String,
        right: String,
        score: f32,
        merged: bool,
    },
    /// The embedding call for an entity failed or timed out.
    ExternalServiceFailure {
        entity_id: String,
        provider: String,
        message: String,
    },
    /// A source that should be internally deduplicated was not.
    InvariantViolation {
        source: SourceId,
        kept: String,
        discarded: String,
        message: String,
    },
    FieldConflict(ConflictReport),
}

impl RunIssue {
    pub fn kind(&self) -> &'static str {
        match self {
            RunIssue::ParseFailure { .. } => "parse_failure",
            RunIssue::MatchAmbiguity { .. } => "match_ambiguity",
            RunIssue::ExternalServiceFailure { .. } => "external_service_failure",
            RunIssue::InvariantViolation { .. } => "invariant_violation",
            RunIssue::FieldConflict(_) => "field_conflict",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub raw_records: usize,
    pub clusters: usize,
    pub multi_source_clusters: usize,
    pub entities: usize,
    pub embedded: usize,
    pub embedding_skipped: usize,
    pub embedding_failures: usize,
    /// Stored entities folded into a fresh entity under a new id
    #[serde(default)]
    pub superseded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub counts: RunCounts,
    pub issues: Vec<RunIssue>,
}

impl RunReport {
    pub fn new(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: None,
            counts: RunCounts::default(),
            issues: Vec::new(),
        }
    }

    pub fn issues_of(&self, kind: &str) -> impl Iterator<Item = &RunIssue> {
        let kind = kind.to_string();
        self.issues.iter().filter(move |i| i.kind() == kind)
    }

    pub fn count_of(&self, kind: &str) -> usize {
        self.issues_of(kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_serialization_is_tagged() {
        let issue = RunIssue::MatchAmbiguity {
            left: "google:a".into(),
            right: "resy:b".into(),
            score: 0.7,
            merged: true,
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["kind"], "match_ambiguity");
        assert_eq!(json["merged"], true);
    }

    #[test]
    fn test_count_of() {
        let mut report = RunReport::new(Uuid::new_v4(), Utc::now());
        report.issues.push(RunIssue::ParseFailure {
            record: "osm:1".into(),
            field: ParseField::Phone,
            raw: "12".into(),
        });
        report.issues.push(RunIssue::ExternalServiceFailure {
            entity_id: "rst_1".into(),
            provider: "stub".into(),
            message: "timeout".into(),
        });
        assert_eq!(report.count_of("parse_failure"), 1);
        assert_eq!(report.count_of("external_service_failure"), 1);
        assert_eq!(report.count_of("field_conflict"), 0);
    }
}
