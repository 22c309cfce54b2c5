//! Run outcomes.

use std::{collections::BTreeMap, time::Duration};

use serde::Serialize;
use yansi::Paint;

/// How a suite settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SuiteStatus {
    /// The suite emitted its END frame.
    Passed,
    /// The suite settled through an ERROR frame or never produced an END.
    Failed,
    /// The suite was still queued when a bail cancellation cleared it.
    Cancelled,
}

/// Per-test tallies accumulated from a suite's frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SuiteTally {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub todo: usize,
}

impl SuiteTally {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.todo
    }
}

/// The settled state of one suite.
#[derive(Clone, Debug, Serialize)]
pub struct SuiteOutcome {
    pub suite_id: String,
    /// Suite path relative to the project root.
    pub rel_path: String,
    pub status: SuiteStatus,
    pub tally: SuiteTally,
    /// Description of the failure, for failed and cancelled suites.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The aggregated result of one `execute_suites` call.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunOutcome {
    /// Outcomes keyed by relative suite path.
    pub suites: BTreeMap<String, SuiteOutcome>,
    /// Wall-clock duration of the whole run.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// The shuffle seed used, when randomizing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl RunOutcome {
    /// Iterator over suites that completed cleanly.
    pub fn passed(&self) -> impl Iterator<Item = &SuiteOutcome> {
        self.suites
            .values()
            .filter(|suite| suite.status == SuiteStatus::Passed)
    }

    /// Iterator over suites that settled with an error.
    pub fn failed(&self) -> impl Iterator<Item = &SuiteOutcome> {
        self.suites
            .values()
            .filter(|suite| suite.status == SuiteStatus::Failed)
    }

    /// Iterator over suites cancelled by bail.
    pub fn cancelled(&self) -> impl Iterator<Item = &SuiteOutcome> {
        self.suites
            .values()
            .filter(|suite| suite.status == SuiteStatus::Cancelled)
    }

    /// Whether every executed suite passed and none were cancelled.
    pub fn is_success(&self) -> bool {
        self.failed().next().is_none() && self.cancelled().next().is_none()
    }

    /// Test tallies summed over all suites.
    pub fn tally(&self) -> SuiteTally {
        self.suites
            .values()
            .fold(SuiteTally::default(), |mut acc, suite| {
                acc.passed += suite.tally.passed;
                acc.failed += suite.tally.failed;
                acc.skipped += suite.tally.skipped;
                acc.todo += suite.tally.todo;
                acc
            })
    }

    /// Formats the aggregated summary of the run (for printing).
    pub fn summary(&self) -> String {
        let suites = self.suites.len();
        let label = if suites == 1 { "suite" } else { "suites" };
        let tally = self.tally();
        let cancelled = self.cancelled().count();
        let cancelled_note = if cancelled > 0 {
            format!(", {cancelled} cancelled")
        } else {
            String::new()
        };
        format!(
            "Ran {suites} test {label} in {:.2?}: {} tests passed, {} failed, {} skipped, {} todo{cancelled_note}",
            self.duration,
            tally.passed.green(),
            tally.failed.red(),
            tally.skipped.yellow(),
            tally.todo,
        )
    }
}
