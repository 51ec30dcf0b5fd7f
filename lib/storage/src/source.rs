//! Source collaborators
//!
//! A [`SourceCollector`] produces the raw records of one source. The
//! bundled [`JsonFileSource`] reads the output of an offline scrape:
//! `<dir>/<source>.json` holding an array of records, or
//! `<dir>/<source>.jsonl` holding one record per line.

use dishx_core::{Error, RawRecord, Result, RunContext, RunIssue, SourceId};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub trait SourceCollector: Send + Sync {
    fn source_id(&self) -> SourceId;

    /// Every record this source currently offers.
    fn collect(&self) -> Result<Vec<RawRecord>>;
}

#[derive(Debug, Clone)]
pub struct JsonFileSource {
    source: SourceId,
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(source: SourceId, path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            path: path.into(),
        }
    }

    /// One collector per source file present in `dir`.
    pub fn discover<P: AsRef<Path>>(dir: P) -> Vec<JsonFileSource> {
        let dir = dir.as_ref();
        SourceId::ALL
            .iter()
            .filter_map(|&source| {
                ["json", "jsonl"]
                    .iter()
                    .map(|ext| dir.join(format!("{source}.{ext}")))
                    .find(|p| p.is_file())
                    .map(|path| JsonFileSource::new(source, path))
            })
            .collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn source_err(&self, message: impl Into<String>) -> Error {
        Error::Source {
            source_id: self.source.to_string(),
            message: message.into(),
        }
    }

    fn parse(&self, text: &str) -> Result<Vec<RawRecord>> {
        let is_lines = self.path.extension().and_then(|e| e.to_str()) == Some("jsonl");
        if !is_lines {
            return serde_json::from_str(text).map_err(|e| self.source_err(format!("{}: {e}", self.path.display())));
        }

        let mut records = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(line)
                .map_err(|e| self.source_err(format!("{}:{}: {e}", self.path.display(), line_no + 1)))?;
            records.push(record);
        }
        Ok(records)
    }
}

impl SourceCollector for JsonFileSource {
    fn source_id(&self) -> SourceId {
        self.source
    }

    fn collect(&self) -> Result<Vec<RawRecord>> {
        let text = fs::read_to_string(&self.path)?;
        let records = self.parse(&text)?;

        let (kept, foreign): (Vec<RawRecord>, Vec<RawRecord>) =
            records.into_iter().partition(|r| r.source_id == self.source);
        if !foreign.is_empty() {
            warn!(
                source = %self.source,
                skipped = foreign.len(),
                "records tagged with another source were skipped"
            );
        }
        Ok(kept)
    }
}

/// Gather records from every collector.
///
/// A failing collector is reported and skipped; the other sources still
/// contribute. Only the total absence of records is an error.
pub fn collect_all(ctx: &RunContext, collectors: &[Box<dyn SourceCollector>]) -> Result<Vec<RawRecord>> {
    let mut records = Vec::new();
    for collector in collectors {
        match collector.collect() {
            Ok(batch) => {
                info!(source = %collector.source_id(), records = batch.len(), "source collected");
                records.extend(batch);
            }
            Err(e) => {
                warn!(source = %collector.source_id(), error = %e, "source collection failed");
                ctx.record(RunIssue::ExternalServiceFailure {
                    entity_id: format!("source:{}", collector.source_id()),
                    provider: collector.source_id().to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    if records.is_empty() {
        return Err(Error::NoInput);
    }
    ctx.update_counts(|counts| counts.raw_records = records.len());
    Ok(records)
}
