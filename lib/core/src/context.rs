use crate::report::{RunIssue, RunReport};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Run-scoped state passed explicitly through every component.
///
/// Holds the run id, the run's reference timestamp and the report
/// accumulator. Nothing here is global, so parallel test runs do not
/// interfere with each other.
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    now: DateTime<Utc>,
    report: Mutex<RunReport>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::with_clock(Utc::now())
    }

    /// Context whose timestamps are pinned to `now`.
    pub fn with_clock(now: DateTime<Utc>) -> Self {
        let run_id = Uuid::new_v4();
        Self {
            run_id,
            now,
            report: Mutex::new(RunReport::new(run_id, now)),
        }
    }

    #[inline]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    #[inline]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn record(&self, issue: RunIssue) {
        debug!(run_id = %self.run_id, kind = issue.kind(), "run issue recorded");
        self.report.lock().issues.push(issue);
    }

    pub fn record_all<I: IntoIterator<Item = RunIssue>>(&self, issues: I) {
        self.report.lock().issues.extend(issues);
    }

    /// Mutate the counters of the report in place.
    pub fn update_counts<F: FnOnce(&mut crate::report::RunCounts)>(&self, f: F) {
        f(&mut self.report.lock().counts);
    }

    /// Copy of the report as it stands.
    pub fn report(&self) -> RunReport {
        self.report.lock().clone()
    }

    /// Close the report and hand it out.
    pub fn finish(&self) -> RunReport {
        let mut report = self.report.lock();
        report.finished_at = Some(Utc::now());
        report.clone()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalized::ParseField;

    #[test]
    fn test_contexts_are_isolated() {
        let a = RunContext::new();
        let b = RunContext::new();
        a.record(RunIssue::ParseFailure {
            record: "google:1".into(),
            field: ParseField::Address,
            raw: "somewhere".into(),
        });
        assert_eq!(a.report().issues.len(), 1);
        assert!(b.report().issues.is_empty());
        assert_ne!(a.run_id(), b.run_id());
    }

    #[test]
    fn test_finish_sets_timestamp() {
        let ctx = RunContext::new();
        ctx.update_counts(|c| c.raw_records = 3);
        let report = ctx.finish();
        assert!(report.finished_at.is_some());
        assert_eq!(report.counts.raw_records, 3);
    }
}
