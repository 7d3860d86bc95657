//! Runs named tests one after another, each in a fresh simulation with a fresh model,
//! then prints a summary table and writes a JUnit report.

use futures::future::{FutureExt, LocalBoxFuture};
use num_format::{Locale, ToFormattedString};
use once_cell::unsync::OnceCell;
use prettytable::{Cell, Row, Table};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time;

use crate::dut::Dut;
use crate::error::SimResult;
use crate::junit;
use crate::sim::{Sim, SimConfig};

pub type TestFn = Box<dyn Fn(Sim) -> LocalBoxFuture<'static, SimResult<String>>>;
type DutFactory = Box<dyn Fn() -> Box<dyn Dut>>;

#[derive(Debug)]
pub struct TestOutcome {
    pub name: String,
    pub result: SimResult<String>,
    /// Wall-clock seconds.
    pub time_secs: f64,
    pub sim_time_ns: f64,
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct Runner {
    suite: String,
    config: SimConfig,
    dut: DutFactory,
    tests: Vec<(String, TestFn)>,
    junit_path: Option<PathBuf>,
    started: OnceCell<time::Instant>,
}

impl Runner {
    /// `dut` is called once per test.
    pub fn new<D, F>(suite: &str, dut: F) -> Self
    where
        D: Dut + 'static,
        F: Fn() -> D + 'static,
    {
        Runner {
            suite: suite.to_string(),
            config: SimConfig::default().deadline(1, "ms"),
            dut: Box::new(move || Box::new(dut()) as Box<dyn Dut>),
            tests: Vec::new(),
            junit_path: Some(PathBuf::from("results.xml")),
            started: OnceCell::new(),
        }
    }

    pub fn config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// `None` skips the report.
    pub fn junit(mut self, path: Option<&Path>) -> Self {
        self.junit_path = path.map(Path::to_path_buf);
        self
    }

    pub fn test<F, Fut>(mut self, name: &str, body: F) -> Self
    where
        F: Fn(Sim) -> Fut + 'static,
        Fut: Future<Output = SimResult<String>> + 'static,
    {
        self.tests
            .push((name.to_string(), Box::new(move |sim| body(sim).boxed_local())));
        self
    }

    pub fn run(&self) -> SimResult<Vec<TestOutcome>> {
        let started = *self.started.get_or_init(time::Instant::now);
        let mut outcomes = Vec::with_capacity(self.tests.len());

        for (name, body) in &self.tests {
            log::info!("TEST {} started", name);
            let sim = Sim::with_dut(self.config.clone(), (self.dut)())?;
            let time_start = time::Instant::now();
            let result = sim.block_on(body(sim.clone()));
            let outcome = TestOutcome {
                name: name.clone(),
                time_secs: time_start.elapsed().as_secs_f64(),
                sim_time_ns: sim.time_in("ns")?,
                result,
            };
            match &outcome.result {
                Ok(msg) => sim.log(&format!("TEST {} passed: {}", name, msg)),
                Err(e) => log::error!("TEST {} failed: {}", name, e),
            }
            outcomes.push(outcome);
        }

        log::info!("{}", summary(&outcomes));
        let real = started.elapsed().as_secs_f64();
        let total_ns: f64 = outcomes.iter().map(|o| o.sim_time_ns).sum();
        log::info!(
            "TOTAL: {} ns simulated in {:.3} s ({:.3} ns/s)",
            (total_ns as u64).to_formatted_string(&Locale::en),
            real,
            total_ns / real
        );

        if let Some(path) = &self.junit_path {
            junit::write_junit_xml(path, &self.suite, &outcomes)?;
        }
        Ok(outcomes)
    }
}

pub fn summary(outcomes: &[TestOutcome]) -> Table {
    let mut table = Table::new();
    table.set_titles(Row::new(vec![
        Cell::new("test"),
        Cell::new("result"),
        Cell::new("time [s]"),
        Cell::new("sim time [ns]"),
        Cell::new("speed [ns/s]"),
    ]));
    for o in outcomes {
        table.add_row(Row::new(vec![
            Cell::new(&o.name),
            Cell::new(if o.passed() { "passed" } else { "failed" }),
            Cell::new(&format!("{:.3}", o.time_secs)),
            Cell::new(&(o.sim_time_ns as u64).to_formatted_string(&Locale::en)),
            Cell::new(&format!("{:.3}", o.sim_time_ns / o.time_secs)),
        ]));
    }
    table
}

pub fn all_passed(outcomes: &[TestOutcome]) -> bool {
    outcomes.iter().all(TestOutcome::passed)
}
