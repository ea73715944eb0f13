//! Benchmark orchestrator: Setup, Run and Teardown of one configuration.
//!
//! ```text
//! Created ──setup()──► Configuring ──► Ready ──run()──► Running ──► Completed
//!                           │                              │  ▲          │
//!                           ▼                              ▼  └──run()───┘
//!                         Failed                         Failed
//!
//! any state ──teardown()──► TornDown
//! ```
//!
//! Setup starts every host concurrently, runs the post-start hook, resolves
//! the head reference on the first host, validates the entity set and arms
//! the completion barrier. Run fans one flow out per entity and fails as a
//! whole if any of them fails. Teardown stops every host concurrently,
//! records stop failures without propagating them, then always runs the
//! post-stop hook.

use std::rc::Rc;
use std::time::Duration;

use futures::future::{join_all, try_join_all};
use serde::Serialize;
use tokio::time::Instant;

use crate::completion::{CompletionBarrier, FlowCompletion};
use crate::config::BenchmarkConfig;
use crate::deadline::Deadline;
use crate::error::{BenchmarkError, ConfigError, RunError, StartupError, TeardownError};
use crate::flow::WorkloadFlow;
use crate::router::RouterSnapshot;
use crate::runtime::{Host, WorkerRef};
use crate::topology::TopologyConfigurator;

/// Upper bound on waiting for the head reference during Setup.
pub const HEAD_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Orchestrator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BenchmarkState {
    /// Not set up yet.
    Created,
    /// Setup in progress.
    Configuring,
    /// Set up, ready to run.
    Ready,
    /// An iteration is in progress.
    Running,
    /// The last iteration succeeded.
    Completed,
    /// Setup or an iteration failed; only Teardown remains.
    Failed,
    /// Torn down.
    TornDown,
}

/// Shape of the workload, returned by Setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SetupSummary {
    /// Number of entity identifiers.
    pub entity_count: usize,
    /// Messages sent to each entity per iteration.
    pub messages_per_entity: usize,
    /// Hosts started.
    pub instances: usize,
}

impl From<SetupSummary> for (usize, usize) {
    fn from(summary: SetupSummary) -> Self {
        (summary.entity_count, summary.messages_per_entity)
    }
}

/// Result of one successful iteration.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// 1-based iteration number.
    pub iteration: usize,
    /// Flows executed, one per entity.
    pub flows: usize,
    /// Messages sent across all flows.
    pub messages: usize,
    /// Wall time of the iteration.
    pub elapsed: Duration,
    /// Router counters after the iteration.
    pub router: RouterSnapshot,
}

/// A host that did not stop cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopFailure {
    /// Host name.
    pub host: String,
    /// Why stopping failed.
    pub reason: String,
}

/// Outcome of Teardown.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeardownSummary {
    /// Hosts stopped cleanly.
    pub stopped: usize,
    /// Hosts that failed to stop.
    pub failures: Vec<StopFailure>,
}

impl TeardownSummary {
    /// Whether every host stopped cleanly.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sequences Setup, Run and Teardown for one configuration.
pub struct ActorBenchmark<F: WorkloadFlow> {
    config: BenchmarkConfig,
    topology: TopologyConfigurator<F::Worker>,
    flow: Rc<F>,
    barrier: Rc<dyn CompletionBarrier>,
    state: BenchmarkState,
    hosts: Vec<Host>,
    head: Option<WorkerRef<F::Worker>>,
    entity_ids: Vec<String>,
    iterations: usize,
}

impl<F: WorkloadFlow> ActorBenchmark<F> {
    /// Benchmark of `flow` against `topology` under `config`.
    pub fn new(
        config: BenchmarkConfig,
        topology: TopologyConfigurator<F::Worker>,
        flow: F,
    ) -> Self {
        Self::from_parts(config, topology, Rc::new(flow))
    }

    pub(crate) fn from_parts(
        config: BenchmarkConfig,
        topology: TopologyConfigurator<F::Worker>,
        flow: Rc<F>,
    ) -> Self {
        Self {
            config,
            topology,
            flow,
            barrier: Rc::new(FlowCompletion),
            state: BenchmarkState::Created,
            hosts: Vec::new(),
            head: None,
            entity_ids: Vec::new(),
            iterations: 0,
        }
    }

    /// Use `barrier` instead of waiting on the flows alone.
    pub fn with_completion_barrier(mut self, barrier: Rc<dyn CompletionBarrier>) -> Self {
        self.barrier = barrier;
        self
    }

    /// The configuration under test.
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> BenchmarkState {
        self.state
    }

    /// Hosts built by Setup and not yet torn down.
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    /// Head reference used by every flow, once Setup resolved it.
    pub fn head(&self) -> Option<&WorkerRef<F::Worker>> {
        self.head.as_ref()
    }

    /// Entity identifiers enumerated by Setup.
    pub fn entity_ids(&self) -> &[String] {
        &self.entity_ids
    }

    /// The topology's shared router counters.
    pub fn router_stats(&self) -> RouterSnapshot {
        self.topology.router_stats().snapshot()
    }

    /// Build and start the hosts and prepare the workload.
    ///
    /// Returns the workload shape. On failure the benchmark is `Failed` and
    /// any hosts that were built stay reachable for [`teardown`](Self::teardown).
    #[tracing::instrument(skip_all, fields(benchmark = %self.config.name()))]
    pub async fn setup(&mut self, deadline: &Deadline) -> Result<SetupSummary, BenchmarkError> {
        if self.state != BenchmarkState::Created {
            return Err(BenchmarkError::InvalidState {
                operation: "set up",
                state: self.state,
            });
        }
        self.state = BenchmarkState::Configuring;

        match self.configure(deadline).await {
            Ok(summary) => {
                self.state = BenchmarkState::Ready;
                tracing::info!(
                    entities = summary.entity_count,
                    messages_per_entity = summary.messages_per_entity,
                    instances = summary.instances,
                    "benchmark ready"
                );
                Ok(summary)
            }
            Err(e) => {
                self.state = BenchmarkState::Failed;
                tracing::error!(error = %e, "setup failed");
                Err(e)
            }
        }
    }

    async fn configure(&mut self, deadline: &Deadline) -> Result<SetupSummary, BenchmarkError> {
        deadline
            .run(self.config.run_pre_start(deadline.clone()))
            .await
            .map_err(StartupError::Deadline)?
            .map_err(|source| StartupError::Hook {
                hook: "pre_start",
                source,
            })?;

        self.hosts = (0..self.config.instance_count())
            .map(|index| self.topology.build_host(&self.config, index))
            .collect();
        let starts = self.hosts.iter().map(|host| host.start(deadline));
        deadline
            .run(try_join_all(starts))
            .await
            .map_err(StartupError::Deadline)?
            .map_err(StartupError::Host)?;
        tracing::debug!(instances = self.hosts.len(), "hosts started");

        deadline
            .run(self.config.run_post_start(self.hosts.clone(), deadline.clone()))
            .await
            .map_err(StartupError::Deadline)?
            .map_err(|source| StartupError::Hook {
                hook: "post_start",
                source,
            })?;

        let first = self.hosts.first().ok_or(ConfigError::NoInstances)?;
        let window = deadline.limited_to(HEAD_RESOLVE_TIMEOUT);
        let head = self
            .topology
            .resolve_head(first, &window)
            .await
            .map_err(StartupError::HeadUnresolved)?;

        let entity_ids = self.topology.entity_ids(&self.config);
        if entity_ids.is_empty() {
            return Err(ConfigError::NoEntities.into());
        }
        if let Some(position) = entity_ids.iter().position(|id| id.is_empty()) {
            return Err(ConfigError::EmptyEntityId(position).into());
        }
        let messages_per_entity = self.flow.total_messages();
        if messages_per_entity == 0 {
            return Err(ConfigError::NoMessages.into());
        }

        self.barrier
            .arm(entity_ids.len(), deadline)
            .await
            .map_err(StartupError::Barrier)?;

        let summary = SetupSummary {
            entity_count: entity_ids.len(),
            messages_per_entity,
            instances: self.hosts.len(),
        };
        self.head = Some(head);
        self.entity_ids = entity_ids;
        Ok(summary)
    }

    /// Run one iteration: every entity's flow, concurrently.
    #[tracing::instrument(skip_all, fields(benchmark = %self.config.name()))]
    pub async fn run(&mut self, deadline: &Deadline) -> Result<RunSummary, BenchmarkError> {
        let head = match (self.state, &self.head) {
            (BenchmarkState::Ready | BenchmarkState::Completed, Some(head)) => head.clone(),
            (state, _) => {
                return Err(BenchmarkError::InvalidState {
                    operation: "run",
                    state,
                })
            }
        };
        self.state = BenchmarkState::Running;

        let started = Instant::now();
        match self.execute(&head, deadline).await {
            Ok(()) => {
                self.state = BenchmarkState::Completed;
                self.iterations += 1;
                let summary = RunSummary {
                    iteration: self.iterations,
                    flows: self.entity_ids.len(),
                    messages: self.entity_ids.len() * self.flow.total_messages(),
                    elapsed: started.elapsed(),
                    router: self.router_stats(),
                };
                tracing::info!(
                    iteration = summary.iteration,
                    flows = summary.flows,
                    elapsed = ?summary.elapsed,
                    "iteration completed"
                );
                Ok(summary)
            }
            Err(e) => {
                self.state = BenchmarkState::Failed;
                tracing::error!(error = %e, "iteration failed");
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        head: &WorkerRef<F::Worker>,
        deadline: &Deadline,
    ) -> Result<(), BenchmarkError> {
        deadline.check().map_err(RunError::Deadline)?;

        let flow = &self.flow;
        let flows = self.entity_ids.iter().map(|entity_id| async move {
            flow.execute(head, entity_id, deadline)
                .await
                .map_err(|source| RunError::Flow {
                    entity_id: entity_id.clone(),
                    source,
                })
        });
        deadline
            .run(try_join_all(flows))
            .await
            .map_err(RunError::Deadline)??;

        self.barrier
            .wait(deadline)
            .await
            .map_err(RunError::Completion)?;
        Ok(())
    }

    /// Stop every host and run the post-stop hook.
    ///
    /// Allowed from any state. Hosts that fail to stop are reported in the
    /// summary and logged; the post-stop hook runs exactly once per call
    /// regardless, and only its own failure makes Teardown fail.
    #[tracing::instrument(skip_all, fields(benchmark = %self.config.name()))]
    pub async fn teardown(
        &mut self,
        deadline: &Deadline,
    ) -> Result<TeardownSummary, BenchmarkError> {
        let hosts = std::mem::take(&mut self.hosts);
        self.head = None;
        self.state = BenchmarkState::TornDown;

        let stops = hosts.iter().map(|host| async move {
            host.stop(deadline)
                .await
                .map_err(|e| StopFailure {
                    host: host.name().to_string(),
                    reason: e.to_string(),
                })
        });

        let mut summary = TeardownSummary::default();
        for result in join_all(stops).await {
            match result {
                Ok(()) => summary.stopped += 1,
                Err(failure) => {
                    tracing::warn!(
                        host = %failure.host,
                        reason = %failure.reason,
                        "host failed to stop"
                    );
                    summary.failures.push(failure);
                }
            }
        }

        let hook = deadline
            .run(self.config.run_post_stop(deadline.clone()))
            .await;
        tracing::info!(
            stopped = summary.stopped,
            failures = summary.failures.len(),
            "benchmark torn down"
        );
        hook.map_err(TeardownError::PostStopTimeout)?
            .map_err(TeardownError::PostStopHook)?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use async_trait::async_trait;
    use futures::FutureExt;
    use tokio::task::LocalSet;

    use super::*;
    use crate::deadline::DeadlineExceeded;
    use crate::error::{ActorError, HostError};
    use crate::flow::RoundTripFlow;
    use crate::router::{HashCodeMessageExtractor, MessageExtractor};
    use crate::runtime::{ActorContext, ReplyTo, Worker};

    struct Counter(u32);

    #[async_trait(?Send)]
    impl Worker for Counter {
        type Message = String;
        type Reply = u32;

        async fn receive(
            &mut self,
            _ctx: &ActorContext,
            _message: String,
            sender: ReplyTo<u32>,
        ) -> Result<(), ActorError> {
            self.0 += 1;
            sender.reply(self.0);
            Ok(())
        }
    }

    fn topology(entities: usize) -> TopologyConfigurator<Counter> {
        TopologyConfigurator::entity_router(
            |_: &BenchmarkConfig| {
                Rc::new(HashCodeMessageExtractor::new(10, |m: &String| Some(m.clone())))
                    as Rc<dyn MessageExtractor<String>>
            },
            |_: &str| Counter(0),
            move |_: &BenchmarkConfig| (0..entities).map(|i| format!("e-{i}")).collect(),
        )
    }

    fn flow(total: usize) -> RoundTripFlow<Counter> {
        RoundTripFlow::new(total, |id: &str| id.to_string())
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        LocalSet::new()
            .run_until(async {
                let mut bench =
                    ActorBenchmark::new(BenchmarkConfig::default(), topology(4), flow(3));
                assert_eq!(bench.state(), BenchmarkState::Created);

                let summary = bench.setup(&deadline()).await.expect("setup");
                assert_eq!(<(usize, usize)>::from(summary), (4, 3));
                assert_eq!(bench.state(), BenchmarkState::Ready);
                assert_eq!(bench.hosts().len(), 1);

                let first = bench.run(&deadline()).await.expect("run");
                assert_eq!(first.iteration, 1);
                assert_eq!(first.messages, 12);
                let second = bench.run(&deadline()).await.expect("run again");
                assert_eq!(second.iteration, 2);
                assert_eq!(second.router.workers_created, 4);
                assert_eq!(bench.state(), BenchmarkState::Completed);

                let teardown = bench.teardown(&deadline()).await.expect("teardown");
                assert!(teardown.is_clean());
                assert_eq!(teardown.stopped, 1);
                assert_eq!(bench.state(), BenchmarkState::TornDown);
                assert!(bench.hosts().is_empty());
            })
            .await;
    }

    #[tokio::test]
    async fn test_invalid_transitions_are_rejected() {
        LocalSet::new()
            .run_until(async {
                let mut bench =
                    ActorBenchmark::new(BenchmarkConfig::default(), topology(1), flow(1));
                assert!(matches!(
                    bench.run(&deadline()).await,
                    Err(BenchmarkError::InvalidState {
                        operation: "run",
                        state: BenchmarkState::Created
                    })
                ));

                bench.setup(&deadline()).await.expect("setup");
                assert!(matches!(
                    bench.setup(&deadline()).await,
                    Err(BenchmarkError::InvalidState { .. })
                ));
                bench.teardown(&deadline()).await.expect("teardown");
            })
            .await;
    }

    #[tokio::test]
    async fn test_zero_messages_is_configuration_error() {
        LocalSet::new()
            .run_until(async {
                let mut bench =
                    ActorBenchmark::new(BenchmarkConfig::default(), topology(2), flow(0));
                let err = bench.setup(&deadline()).await.expect_err("no messages");
                assert!(matches!(
                    err,
                    BenchmarkError::Configuration(ConfigError::NoMessages)
                ));
                assert_eq!(bench.state(), BenchmarkState::Failed);
                bench.teardown(&deadline()).await.expect("teardown");
            })
            .await;
    }

    #[tokio::test]
    async fn test_empty_entity_id_is_configuration_error() {
        LocalSet::new()
            .run_until(async {
                let topology = TopologyConfigurator::entity_router(
                    |_: &BenchmarkConfig| {
                        Rc::new(HashCodeMessageExtractor::new(10, |m: &String| Some(m.clone())))
                            as Rc<dyn MessageExtractor<String>>
                    },
                    |_: &str| Counter(0),
                    |_: &BenchmarkConfig| vec!["ok".to_string(), String::new()],
                );
                let mut bench = ActorBenchmark::new(BenchmarkConfig::default(), topology, flow(2));
                let err = bench.setup(&deadline()).await.expect_err("empty id");
                assert!(matches!(
                    err,
                    BenchmarkError::Configuration(ConfigError::EmptyEntityId(1))
                ));
                bench.teardown(&deadline()).await.expect("teardown");
            })
            .await;
    }

    #[tokio::test]
    async fn test_failed_pre_start_hook_is_startup_error() {
        LocalSet::new()
            .run_until(async {
                let post_stops = Rc::new(Cell::new(0));
                let seen = post_stops.clone();
                let config = BenchmarkConfig::builder("hooks")
                    .pre_start(|_| {
                        futures::future::ready(Err(crate::error::HookError::new("no disk")))
                            .boxed_local()
                    })
                    .post_stop(move |_| {
                        seen.set(seen.get() + 1);
                        futures::future::ready(Ok(())).boxed_local()
                    })
                    .build()
                    .expect("config");

                let mut bench = ActorBenchmark::new(config, topology(1), flow(1));
                let err = bench.setup(&deadline()).await.expect_err("hook fails");
                assert!(matches!(
                    err,
                    BenchmarkError::Startup(StartupError::Hook {
                        hook: "pre_start",
                        ..
                    })
                ));
                assert!(bench.hosts().is_empty());

                bench.teardown(&deadline()).await.expect("teardown");
                bench.teardown(&deadline()).await.expect("teardown again");
                assert_eq!(post_stops.get(), 2);
            })
            .await;
    }

    #[tokio::test]
    async fn test_host_start_failure_keeps_hosts_for_teardown() {
        LocalSet::new()
            .run_until(async {
                let topology = TopologyConfigurator::<Counter>::custom(
                    |_: &BenchmarkConfig, host: &Host| {
                        if host.index() == 1 {
                            return Err(HostError::NotRunning("dependency".to_string()));
                        }
                        Ok(())
                    },
                    |_: &BenchmarkConfig| vec!["e-0".to_string()],
                );
                let config = BenchmarkConfig::builder("three")
                    .instances(3)
                    .build()
                    .expect("config");

                let mut bench = ActorBenchmark::new(config, topology, flow(1));
                let err = bench.setup(&deadline()).await.expect_err("host 1 fails");
                assert!(matches!(
                    err,
                    BenchmarkError::Startup(StartupError::Host(HostError::StartFailed { .. }))
                ));
                assert_eq!(bench.hosts().len(), 3);

                let summary = bench.teardown(&deadline()).await.expect("teardown");
                assert_eq!(summary.stopped, 3);
            })
            .await;
    }

    struct StalledFlow;

    #[async_trait(?Send)]
    impl WorkloadFlow for StalledFlow {
        type Worker = Counter;

        fn total_messages(&self) -> usize {
            1
        }

        async fn execute(
            &self,
            _root: &WorkerRef<Counter>,
            _entity_id: &str,
            _deadline: &Deadline,
        ) -> Result<(), ActorError> {
            futures::future::pending::<Result<(), ActorError>>().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_start_hook_is_bounded_by_deadline() {
        LocalSet::new()
            .run_until(async {
                let config = BenchmarkConfig::builder("stalled pre_start")
                    .pre_start(|_| futures::future::pending().boxed_local())
                    .build()
                    .expect("config");

                let mut bench = ActorBenchmark::new(config, topology(1), flow(1));
                let err = bench
                    .setup(&Deadline::after(Duration::from_millis(100)))
                    .await
                    .expect_err("hook never finishes");
                assert!(matches!(
                    err,
                    BenchmarkError::Startup(StartupError::Deadline(DeadlineExceeded::Elapsed))
                ));
                assert!(err.is_timeout());
                assert_eq!(bench.state(), BenchmarkState::Failed);
                bench.teardown(&deadline()).await.expect("teardown");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_flow_is_bounded_by_deadline() {
        LocalSet::new()
            .run_until(async {
                let mut bench =
                    ActorBenchmark::new(BenchmarkConfig::default(), topology(3), StalledFlow);
                bench.setup(&deadline()).await.expect("setup");

                let err = bench
                    .run(&Deadline::after(Duration::from_millis(100)))
                    .await
                    .expect_err("flows never finish");
                assert!(matches!(
                    err,
                    BenchmarkError::Runtime(RunError::Deadline(DeadlineExceeded::Elapsed))
                ));
                assert_eq!(bench.state(), BenchmarkState::Failed);
                bench.teardown(&deadline()).await.expect("teardown");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_stop_hook_is_bounded_by_deadline() {
        LocalSet::new()
            .run_until(async {
                let calls = Rc::new(Cell::new(0));
                let seen = calls.clone();
                let config = BenchmarkConfig::builder("stalled post_stop")
                    .post_stop(move |_| {
                        seen.set(seen.get() + 1);
                        futures::future::pending().boxed_local()
                    })
                    .build()
                    .expect("config");

                let mut bench = ActorBenchmark::new(config, topology(1), flow(1));
                bench.setup(&deadline()).await.expect("setup");

                let err = bench
                    .teardown(&Deadline::after(Duration::from_millis(100)))
                    .await
                    .expect_err("hook never finishes");
                assert!(matches!(
                    err,
                    BenchmarkError::Teardown(TeardownError::PostStopTimeout(
                        DeadlineExceeded::Elapsed
                    ))
                ));
                assert!(err.is_timeout());
                assert_eq!(calls.get(), 1);
                assert_eq!(bench.state(), BenchmarkState::TornDown);
            })
            .await;
    }
}
