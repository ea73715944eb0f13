//! Benchmark driver and reports.
//!
//! [`BenchmarkRunner`] plays the part of an external benchmark harness:
//! global setup, a number of timed iterations, then global teardown, which
//! runs on every path including a failed setup.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::deadline::Deadline;
use crate::error::BenchmarkError;
use crate::flow::WorkloadFlow;
use crate::orchestrator::{ActorBenchmark, RunSummary, SetupSummary, TeardownSummary};
use crate::suite::BenchmarkSuite;

/// Deadline applied to Setup and Teardown unless overridden.
pub const DEFAULT_LIFECYCLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadlines and iteration count for a benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    /// Deadline for Setup.
    pub setup_timeout: Duration,
    /// Deadline for each iteration.
    pub iteration_timeout: Duration,
    /// Deadline for Teardown.
    pub teardown_timeout: Duration,
    /// Measured iterations per configuration.
    pub iterations: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            setup_timeout: DEFAULT_LIFECYCLE_TIMEOUT,
            iteration_timeout: DEFAULT_LIFECYCLE_TIMEOUT,
            teardown_timeout: DEFAULT_LIFECYCLE_TIMEOUT,
            iterations: 1,
        }
    }
}

impl RunSettings {
    /// Set the Setup deadline.
    pub fn with_setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }

    /// Set the per-iteration deadline.
    pub fn with_iteration_timeout(mut self, timeout: Duration) -> Self {
        self.iteration_timeout = timeout;
        self
    }

    /// Set the Teardown deadline.
    pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout = timeout;
        self
    }

    /// Set the number of measured iterations.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }
}

/// How a benchmark ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    /// Setup, every iteration and Teardown succeeded.
    Passed,
    /// A non-timeout failure.
    Failed(String),
    /// A deadline expired.
    TimedOut(String),
}

impl Outcome {
    fn from_error(err: &BenchmarkError) -> Self {
        if err.is_timeout() {
            Outcome::TimedOut(err.to_string())
        } else {
            Outcome::Failed(err.to_string())
        }
    }

    /// Whether the benchmark passed.
    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }
}

/// Result of running one configuration.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    /// Configuration name.
    pub name: String,
    /// Workload shape, if Setup succeeded.
    pub setup: Option<SetupSummary>,
    /// Successful iterations.
    pub iterations: Vec<RunSummary>,
    /// Teardown result, if Teardown succeeded.
    pub teardown: Option<TeardownSummary>,
    /// Overall outcome.
    pub outcome: Outcome,
}

impl BenchmarkReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            setup: None,
            iterations: Vec::new(),
            teardown: None,
            outcome: Outcome::Passed,
        }
    }

    /// Mean wall time of the successful iterations.
    pub fn mean_iteration_time(&self) -> Option<Duration> {
        let count = u32::try_from(self.iterations.len()).ok().filter(|n| *n > 0)?;
        let total: Duration = self.iterations.iter().map(|run| run.elapsed).sum();
        Some(total / count)
    }

    /// Render the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Benchmark: {} ===", self.name)?;
        match &self.setup {
            Some(setup) => writeln!(
                f,
                "Entities: {} x {} messages on {} instance(s)",
                setup.entity_count, setup.messages_per_entity, setup.instances
            )?,
            None => writeln!(f, "Setup did not complete")?,
        }
        for run in &self.iterations {
            writeln!(
                f,
                "Iteration {}: {} messages in {:?}",
                run.iteration, run.messages, run.elapsed
            )?;
        }
        if let Some(mean) = self.mean_iteration_time() {
            writeln!(f, "Mean Iteration Time: {:?}", mean)?;
        }
        if let Some(teardown) = &self.teardown {
            for failure in &teardown.failures {
                writeln!(f, "Stop failure on {}: {}", failure.host, failure.reason)?;
            }
        }
        match &self.outcome {
            Outcome::Passed => writeln!(f, "✅ PASSED"),
            Outcome::Failed(reason) => writeln!(f, "❌ FAILED - {}", reason),
            Outcome::TimedOut(reason) => writeln!(f, "⏱️ TIMED OUT - {}", reason),
        }
    }
}

/// Runs benchmarks the way an external benchmark harness would.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkRunner {
    settings: RunSettings,
}

impl BenchmarkRunner {
    /// Runner using `settings`.
    pub fn new(settings: RunSettings) -> Self {
        Self { settings }
    }

    /// The runner's settings.
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run every configuration of `suite`, one after another.
    pub async fn run_suite<F: WorkloadFlow>(
        &self,
        suite: &BenchmarkSuite<F>,
    ) -> Vec<BenchmarkReport> {
        let mut reports = Vec::with_capacity(suite.len());
        for bench in suite.create_benchmarks() {
            reports.push(self.run_benchmark(bench).await);
        }
        reports
    }

    /// Setup, iterate, and always tear down `bench`.
    pub async fn run_benchmark<F: WorkloadFlow>(
        &self,
        mut bench: ActorBenchmark<F>,
    ) -> BenchmarkReport {
        let mut report = BenchmarkReport::new(bench.config().name());

        match bench.setup(&Deadline::after(self.settings.setup_timeout)).await {
            Ok(setup) => {
                report.setup = Some(setup);
                for _ in 0..self.settings.iterations {
                    let deadline = Deadline::after(self.settings.iteration_timeout);
                    match bench.run(&deadline).await {
                        Ok(run) => report.iterations.push(run),
                        Err(e) => {
                            report.outcome = Outcome::from_error(&e);
                            break;
                        }
                    }
                }
            }
            Err(e) => report.outcome = Outcome::from_error(&e),
        }

        match bench
            .teardown(&Deadline::after(self.settings.teardown_timeout))
            .await
        {
            Ok(teardown) => report.teardown = Some(teardown),
            Err(e) => {
                if report.outcome.is_passed() {
                    report.outcome = Outcome::Failed(e.to_string());
                } else {
                    tracing::warn!(
                        benchmark = %report.name,
                        error = %e,
                        "teardown failed after an earlier failure"
                    );
                }
            }
        }

        tracing::info!(benchmark = %report.name, outcome = ?report.outcome, "benchmark finished");
        report
    }
}
