//! Aggregated batch report.

use bridge_traits::EntityKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::item::{ItemOutcome, ItemStatus};

/// Created/reused/failed totals for one run, plus every item outcome.
///
/// Always produced once the snapshot has been fetched, even when every item
/// failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub kind: EntityKind,
    pub created: usize,
    pub reused: usize,
    pub failed: usize,
    /// One human-readable line per failed item, in `local_index` order
    pub failures: Vec<String>,
    /// Outcomes sorted by `local_index`
    pub outcomes: Vec<ItemOutcome>,
    /// Set when the run stopped dispatching early
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    /// Fold settled outcomes into a report.
    pub fn aggregate(
        run_id: Uuid,
        kind: EntityKind,
        mut outcomes: Vec<ItemOutcome>,
        cancelled: bool,
        started_at: DateTime<Utc>,
    ) -> Self {
        outcomes.sort_by_key(|o| o.local_index);

        let mut created = 0;
        let mut reused = 0;
        let mut failures = Vec::new();
        for outcome in &outcomes {
            match outcome.status {
                ItemStatus::Created => created += 1,
                ItemStatus::Reused => reused += 1,
                ItemStatus::Failed => failures.push(format!(
                    "#{} '{}': {}",
                    outcome.local_index, outcome.name, outcome.message
                )),
            }
        }

        Self {
            run_id,
            kind,
            created,
            reused,
            failed: failures.len(),
            failures,
            outcomes,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Report for a plan with no items.
    pub fn empty(run_id: Uuid, kind: EntityKind) -> Self {
        Self::aggregate(run_id, kind, Vec::new(), false, Utc::now())
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.created + self.reused
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }

    pub fn outcome(&self, local_index: usize) -> Option<&ItemOutcome> {
        self.outcomes
            .binary_search_by_key(&local_index, |o| o.local_index)
            .ok()
            .map(|i| &self.outcomes[i])
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} reused, {} failed",
            self.created, self.reused, self.failed
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{FailureCause, WorkItem};
    use bridge_traits::RemoteId;

    #[test]
    fn test_aggregate_counts_and_sorts() {
        let outcomes = vec![
            ItemOutcome::failed(&WorkItem::new(2, "Hats"), FailureCause::Remote, "HTTP 400"),
            ItemOutcome::created(&WorkItem::new(0, "Shoes"), RemoteId(1), "ok"),
            ItemOutcome::reused(&WorkItem::new(1, "Boots"), RemoteId(2), "ok"),
        ];

        let report = BatchReport::aggregate(
            Uuid::new_v4(),
            EntityKind::Category,
            outcomes,
            false,
            Utc::now(),
        );

        assert_eq!((report.created, report.reused, report.failed), (1, 1, 1));
        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failures, vec!["#2 'Hats': HTTP 400".to_string()]);
        assert_eq!(report.outcome(1).map(|o| o.status), Some(ItemStatus::Reused));
        assert!(report.outcome(7).is_none());
        assert_eq!(report.to_string(), "1 created, 1 reused, 1 failed");
        assert!(!report.is_complete_success());
    }

    #[test]
    fn test_all_failed_report_is_still_produced() {
        let outcomes = (0..3)
            .map(|i| ItemOutcome::failed(&WorkItem::new(i, "X"), FailureCause::Timeout, "timed out"))
            .collect();

        let report =
            BatchReport::aggregate(Uuid::new_v4(), EntityKind::Product, outcomes, true, Utc::now());

        assert_eq!(report.succeeded(), 0);
        assert_eq!(report.failed, 3);
        assert_eq!(report.to_string(), "0 created, 0 reused, 3 failed (cancelled)");
    }

    #[test]
    fn test_empty_report() {
        let report = BatchReport::empty(Uuid::new_v4(), EntityKind::Category);
        assert_eq!(report.total(), 0);
        assert!(report.is_complete_success());
        assert!(report.finished_at >= report.started_at);
    }
}
