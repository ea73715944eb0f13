//! # Moonpool Bench
//!
//! Load experiments against an in-process actor runtime.
//!
//! A benchmark stands up one or more runtime instances ([`Host`]s), routes
//! every entity's messages to a lazily created per-entity worker through an
//! [`EntityRouter`], drives one fixed [`WorkloadFlow`] per entity
//! concurrently, and reports how long the workload took to drain.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  BenchmarkRunner  →  BenchmarkSuite  →  ActorBenchmark × N  │
//! │     setup / run × iterations / teardown per configuration   │
//! ├──────────────────────────┬──────────────────────────────────┤
//! │  TopologyConfigurator    │  WorkloadFlow + CompletionBarrier│
//! │  • builds hosts          │  • N-1 tells + 1 ask per entity  │
//! │  • wires EntityRouter    │  • flow results or countdown     │
//! ├──────────────────────────┴──────────────────────────────────┤
//! │  runtime: Host, Worker, ActorRef, ReplyTo, ActorRegistry    │
//! │  cluster: shard ownership across hosts                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything is single-threaded and `Rc`-based: drive it from inside a
//! `tokio::task::LocalSet`.
//!
//! ## Quick Start
//!
//! ```ignore
//! use moonpool_bench::workloads::counting::{counting_flow, counting_topology};
//! use moonpool_bench::{BenchmarkRunner, BenchmarkSuite, RunSettings};
//!
//! let suite = BenchmarkSuite::new(counting_topology(100), counting_flow(10));
//! let reports = BenchmarkRunner::new(RunSettings::default())
//!     .run_suite(&suite)
//!     .await;
//! ```

#![deny(missing_docs)]

pub mod cluster;
pub mod completion;
pub mod config;
pub mod deadline;
pub mod driver;
pub mod error;
pub mod flow;
pub mod orchestrator;
pub mod router;
pub mod runtime;
pub mod suite;
pub mod topology;
pub mod workloads;

pub use cluster::Cluster;
pub use completion::{CompletionBarrier, CompletionSignal, CountdownBarrier, FlowCompletion};
pub use config::{BenchmarkConfig, BenchmarkConfigBuilder, HookFuture};
pub use deadline::{Deadline, DeadlineExceeded};
pub use driver::{BenchmarkReport, BenchmarkRunner, Outcome, RunSettings};
pub use error::{
    ActorError, BenchmarkError, ClusterError, CompletionError, ConfigError, HookError, HostError,
    RunError, StartupError, TeardownError,
};
pub use flow::{RoundTripFlow, WorkloadFlow};
pub use orchestrator::{
    ActorBenchmark, BenchmarkState, RunSummary, SetupSummary, StopFailure, TeardownSummary,
};
pub use router::{
    EntityRouter, HashCodeMessageExtractor, MessageExtractor, RouterSnapshot, RouterStats,
    WithEntityId,
};
pub use runtime::{
    ActorContext, ActorRef, ActorRegistry, Host, HostState, ReplyTo, Worker, WorkerRef,
};
pub use suite::BenchmarkSuite;
pub use topology::TopologyConfigurator;
