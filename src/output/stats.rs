//! Statistics over delivered navigation results
//!
//! Tallies what came out of the sink during a run so the CLI can print a
//! summary once the scheduler has drained.

use crate::crawler::{NavigationOutcome, NavigationResult};
use crate::engine::NavigationErrorKind;
use std::collections::BTreeMap;
use std::time::Duration;

/// Run statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStatistics {
    /// Total number of results received
    pub total: u64,

    /// Pages that navigated successfully
    pub loaded: u64,

    /// Stub requests
    pub skipped: u64,

    /// Navigations that failed
    pub failed: u64,

    /// Failures by where they happened
    pub failures_by_kind: BTreeMap<NavigationErrorKind, u64>,

    /// HTTP status histogram for loaded pages
    pub statuses: BTreeMap<u16, u64>,

    /// Wall-clock time of the run, if measured
    pub elapsed: Option<Duration>,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one delivered result
    pub fn record<P>(&mut self, result: &NavigationResult<P>) {
        self.total += 1;

        match &result.outcome {
            NavigationOutcome::Loaded => self.loaded += 1,
            NavigationOutcome::Skipped => self.skipped += 1,
            NavigationOutcome::Failed(error) => {
                self.failed += 1;
                *self.failures_by_kind.entry(error.kind()).or_insert(0) += 1;
            }
        }
    }

    /// Counts the HTTP status of a loaded page
    pub fn record_status(&mut self, status: u16) {
        *self.statuses.entry(status).or_insert(0) += 1;
    }

    /// Share of non-stub results that loaded, in percent
    pub fn success_rate(&self) -> f64 {
        let attempted = self.loaded + self.failed;
        if attempted == 0 {
            0.0
        } else {
            (self.loaded as f64 / attempted as f64) * 100.0
        }
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Run Statistics ===\n");

    println!("Overview:");
    println!("  Results received: {}", stats.total);
    println!("  Loaded: {}", stats.loaded);
    println!("  Skipped (stub): {}", stats.skipped);
    println!("  Failed: {}", stats.failed);
    if let Some(elapsed) = stats.elapsed {
        println!("  Elapsed: {:.2}s", elapsed.as_secs_f64());
    }
    println!();

    if !stats.statuses.is_empty() {
        println!("HTTP Status Codes:");
        for (status, count) in &stats.statuses {
            println!("  {}: {}", status, count);
        }
        println!();
    }

    if !stats.failures_by_kind.is_empty() {
        println!("Failure Summary:");
        let mut failure_counts: Vec<_> = stats.failures_by_kind.iter().collect();
        failure_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (kind, count) in failure_counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} navigations loaded)",
        stats.success_rate(),
        stats.loaded,
        stats.loaded + stats.failed
    );
}
