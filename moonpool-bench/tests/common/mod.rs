//! Shared workers, flows and topologies for the integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::rc::Rc;

use async_trait::async_trait;
use moonpool_bench::workloads::counting::{entity_ids, EntityMessage, EntityReply};
use moonpool_bench::{
    ActorContext, ActorError, BenchmarkConfig, CompletionSignal, Deadline, HashCodeMessageExtractor,
    MessageExtractor, ReplyTo, TopologyConfigurator, Worker, WorkerRef, WorkloadFlow,
};
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Run `future` inside a fresh `LocalSet`.
pub async fn local<F: Future>(future: F) -> F::Output {
    LocalSet::new().run_until(future).await
}

fn counting_extractor(config: &BenchmarkConfig) -> Rc<dyn MessageExtractor<EntityMessage>> {
    let shards = (config.instance_count() * 10) as u32;
    Rc::new(HashCodeMessageExtractor::<EntityMessage>::for_entities(shards))
}

/// Counts like the reference worker, but never answers asks for one entity.
pub struct SilentWorker {
    silent: bool,
    processed: u64,
    parked: Vec<ReplyTo<EntityReply>>,
}

#[async_trait(?Send)]
impl Worker for SilentWorker {
    type Message = EntityMessage;
    type Reply = EntityReply;

    async fn receive(
        &mut self,
        _ctx: &ActorContext,
        message: EntityMessage,
        sender: ReplyTo<EntityReply>,
    ) -> Result<(), ActorError> {
        self.processed += 1;
        if self.silent {
            // Keep the sender alive so the asker times out instead of
            // seeing a broken promise.
            self.parked.push(sender);
            return Ok(());
        }
        sender.reply(EntityReply {
            entity_id: message.entity_id,
            processed: self.processed,
        });
        Ok(())
    }
}

/// Counting topology whose worker for `silent` never replies.
pub fn silent_topology(
    entity_count: usize,
    silent: &'static str,
) -> TopologyConfigurator<SilentWorker> {
    TopologyConfigurator::entity_router(
        counting_extractor,
        move |entity_id: &str| SilentWorker {
            silent: entity_id == silent,
            processed: 0,
            parked: Vec::new(),
        },
        move |_: &BenchmarkConfig| entity_ids(entity_count),
    )
}

/// Worker whose handler never returns.
pub struct StuckWorker;

#[async_trait(?Send)]
impl Worker for StuckWorker {
    type Message = ();
    type Reply = ();

    async fn receive(
        &mut self,
        _ctx: &ActorContext,
        _message: (),
        _sender: ReplyTo<()>,
    ) -> Result<(), ActorError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// One host running a [`StuckWorker`] as its head.
pub fn stuck_topology() -> TopologyConfigurator<StuckWorker> {
    TopologyConfigurator::custom(
        |_: &BenchmarkConfig, host: &moonpool_bench::Host| {
            let stuck = host.spawn("stuck", StuckWorker)?;
            host.registry().register::<StuckWorker>(stuck);
            Ok(())
        },
        |_: &BenchmarkConfig| vec!["only".to_string()],
    )
}

/// Signals a completion barrier each time it has seen `total` more messages.
pub struct SentinelWorker {
    total: u64,
    processed: u64,
    signal: Option<CompletionSignal>,
}

#[async_trait(?Send)]
impl Worker for SentinelWorker {
    type Message = EntityMessage;
    type Reply = EntityReply;

    async fn receive(
        &mut self,
        _ctx: &ActorContext,
        _message: EntityMessage,
        _sender: ReplyTo<EntityReply>,
    ) -> Result<(), ActorError> {
        self.processed += 1;
        if self.processed % self.total == 0 {
            if let Some(signal) = &self.signal {
                signal.signal();
            }
        }
        Ok(())
    }
}

/// Sentinel topology; the worker for `mute`, if any, never signals.
pub fn sentinel_topology(
    entity_count: usize,
    total: u64,
    signal: CompletionSignal,
    mute: Option<&'static str>,
) -> TopologyConfigurator<SentinelWorker> {
    TopologyConfigurator::entity_router(
        counting_extractor,
        move |entity_id: &str| SentinelWorker {
            total,
            processed: 0,
            signal: (mute != Some(entity_id)).then(|| signal.clone()),
        },
        move |_: &BenchmarkConfig| entity_ids(entity_count),
    )
}

/// Fire-and-forget flow: `total` tells, completion reported by the workers.
pub struct TellOnlyFlow {
    pub total: usize,
}

#[async_trait(?Send)]
impl WorkloadFlow for TellOnlyFlow {
    type Worker = SentinelWorker;

    fn total_messages(&self) -> usize {
        self.total
    }

    async fn execute(
        &self,
        root: &WorkerRef<SentinelWorker>,
        entity_id: &str,
        deadline: &Deadline,
    ) -> Result<(), ActorError> {
        deadline.check()?;
        for _ in 0..self.total {
            root.tell(EntityMessage::new(entity_id))?;
        }
        Ok(())
    }
}
