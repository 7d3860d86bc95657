use junit_report::{Duration, ReportBuilder, TestCaseBuilder, TestSuiteBuilder};
use std::path::Path;

use crate::error::{SimError, SimResult};
use crate::runner::TestOutcome;

pub(crate) fn write_junit_xml(path: &Path, suite: &str, outcomes: &[TestOutcome]) -> SimResult<()> {
    let mut test_cases = Vec::new();

    for t in outcomes {
        let tc = match &t.result {
            Ok(_) => TestCaseBuilder::success(&t.name, Duration::seconds_f64(t.time_secs)),
            Err(e) => TestCaseBuilder::failure(
                &t.name,
                Duration::seconds_f64(t.time_secs),
                "failure",
                &e.to_string(),
            ),
        }
        .build();
        test_cases.push(tc);
    }

    let test_suite = TestSuiteBuilder::new(suite)
        .add_testcases(test_cases)
        .build();
    let report = ReportBuilder::new().add_testsuite(test_suite).build();
    let file = std::fs::File::create(path)?;
    report
        .write_xml(file)
        .map_err(|e| SimError::Report(format!("{:?}", e)))
}
