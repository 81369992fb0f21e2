//! Result aggregation and the final report

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

use shared::{CaseId, CaseResult, Outcome, TestBinary};

type Bucket = BTreeMap<TestBinary, Vec<CaseId>>;

/// Non-OK outcomes of a whole run, grouped by kind then binary
#[derive(Debug, Default)]
pub struct ResultAggregator {
    failed: Bucket,
    crashed: Bucket,
    timed_out: Bucket,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// OK outcomes are not retained
    pub fn record(&mut self, binary: &TestBinary, result: CaseResult) {
        let bucket = match result.outcome {
            Outcome::Ok => return,
            Outcome::Fail => &mut self.failed,
            Outcome::Crash => &mut self.crashed,
            Outcome::Timeout => &mut self.timed_out,
        };
        bucket.entry(binary.clone()).or_default().push(result.case);
    }

    pub fn record_all(&mut self, binary: &TestBinary, results: impl IntoIterator<Item = CaseResult>) {
        for result in results {
            self.record(binary, result);
        }
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        match outcome {
            Outcome::Ok => 0,
            Outcome::Fail => Self::entries(&self.failed),
            Outcome::Crash => Self::entries(&self.crashed),
            Outcome::Timeout => Self::entries(&self.timed_out),
        }
    }

    /// Cases recorded for `binary` with `outcome`, in the order they ran
    pub fn cases(&self, binary: &TestBinary, outcome: Outcome) -> &[CaseId] {
        let bucket = match outcome {
            Outcome::Ok => return &[],
            Outcome::Fail => &self.failed,
            Outcome::Crash => &self.crashed,
            Outcome::Timeout => &self.timed_out,
        };
        bucket.get(binary).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.crashed.is_empty() && self.timed_out.is_empty()
    }

    /// Failures plus timeouts; crashes are reported but not counted
    pub fn exit_status(&self) -> usize {
        self.count(Outcome::Fail) + self.count(Outcome::Timeout)
    }

    /// Grouped report; binary paths are shown relative to `base_dir` when under it
    pub fn render(&self, base_dir: Option<&Path>) -> String {
        let mut report = String::new();
        for (title, bucket) in [
            ("Unexpected failures", &self.failed),
            ("Unexpected crashes", &self.crashed),
            ("Unexpected timeouts", &self.timed_out),
        ] {
            if bucket.is_empty() {
                continue;
            }
            let _ = writeln!(report, "\n{} ({})", title, Self::entries(bucket));
            for (binary, cases) in bucket {
                let _ = writeln!(report, "    {}", binary.display_relative_to(base_dir));
                for case in cases {
                    let _ = writeln!(report, "        {case}");
                }
            }
        }
        report
    }

    fn entries(bucket: &Bucket) -> usize {
        bucket.values().map(Vec::len).sum()
    }
}
