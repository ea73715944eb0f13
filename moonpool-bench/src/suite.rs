//! Benchmark suite: one orchestrator per configuration.

use std::rc::Rc;

use crate::completion::CompletionBarrier;
use crate::config::BenchmarkConfig;
use crate::flow::WorkloadFlow;
use crate::orchestrator::ActorBenchmark;
use crate::topology::TopologyConfigurator;

type BarrierFactory = Rc<dyn Fn() -> Rc<dyn CompletionBarrier>>;

/// A workload run under several configurations.
///
/// Without explicit configurations the suite runs the default one.
pub struct BenchmarkSuite<F: WorkloadFlow> {
    configurations: Vec<BenchmarkConfig>,
    topology: TopologyConfigurator<F::Worker>,
    flow: Rc<F>,
    barrier: Option<BarrierFactory>,
}

impl<F: WorkloadFlow> BenchmarkSuite<F> {
    /// Suite running `flow` against `topology` under the default configuration.
    pub fn new(topology: TopologyConfigurator<F::Worker>, flow: F) -> Self {
        Self {
            configurations: vec![BenchmarkConfig::default()],
            topology,
            flow: Rc::new(flow),
            barrier: None,
        }
    }

    /// Replace the configurations. An empty list keeps the default one.
    pub fn with_configurations(mut self, configurations: Vec<BenchmarkConfig>) -> Self {
        self.configurations = if configurations.is_empty() {
            vec![BenchmarkConfig::default()]
        } else {
            configurations
        };
        self
    }

    /// Give every benchmark a fresh barrier from `factory`.
    pub fn with_completion_barrier<B>(mut self, factory: B) -> Self
    where
        B: Fn() -> Rc<dyn CompletionBarrier> + 'static,
    {
        self.barrier = Some(Rc::new(factory));
        self
    }

    /// Configurations, in order.
    pub fn configurations(&self) -> &[BenchmarkConfig] {
        &self.configurations
    }

    /// Number of benchmarks the suite expands to.
    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    /// Always `false`: a suite has at least the default configuration.
    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    /// One independent orchestrator per configuration, in order. Each gets
    /// its own router counters.
    pub fn create_benchmarks(&self) -> Vec<ActorBenchmark<F>> {
        self.configurations
            .iter()
            .map(|config| {
                let bench = ActorBenchmark::from_parts(
                    config.clone(),
                    self.topology.with_fresh_stats(),
                    self.flow.clone(),
                );
                match &self.barrier {
                    Some(factory) => bench.with_completion_barrier(factory()),
                    None => bench,
                }
            })
            .collect()
    }
}
