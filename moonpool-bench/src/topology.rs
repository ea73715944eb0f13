//! Topology configurator: builds the hosts of a configuration and says which
//! entities to exercise.
//!
//! Each host is created with a bootstrap that spawns the head actor (usually
//! an [`EntityRouter`]) and registers it under the worker type under test.
//! The orchestrator resolves that registration once the host is up.

use std::any::type_name;
use std::fmt;
use std::rc::Rc;

use crate::config::BenchmarkConfig;
use crate::deadline::Deadline;
use crate::error::HostError;
use crate::router::{DropObserver, EntityRouter, MessageExtractor, RouterStats, WorkerFactory};
use crate::runtime::{Host, Worker, WorkerRef};

/// Name the head router is spawned under on every host.
pub const ROUTER_NAME: &str = "router";

type ExtractorFactory<M> = Rc<dyn Fn(&BenchmarkConfig) -> Rc<dyn MessageExtractor<M>>>;
type CustomWiring = Rc<dyn Fn(&BenchmarkConfig, &Host) -> Result<(), HostError>>;
type EntityIds = Rc<dyn Fn(&BenchmarkConfig) -> Vec<String>>;

enum Wiring<W: Worker> {
    EntityRouter {
        extractor: ExtractorFactory<W::Message>,
        factory: WorkerFactory<W>,
    },
    Custom(CustomWiring),
}

impl<W: Worker> Clone for Wiring<W> {
    fn clone(&self) -> Self {
        match self {
            Wiring::EntityRouter { extractor, factory } => Wiring::EntityRouter {
                extractor: extractor.clone(),
                factory: factory.clone(),
            },
            Wiring::Custom(wiring) => Wiring::Custom(wiring.clone()),
        }
    }
}

/// Builds hosts for worker type `W` and enumerates the entity identifiers.
pub struct TopologyConfigurator<W: Worker> {
    wiring: Wiring<W>,
    entity_ids: EntityIds,
    stats: RouterStats,
    on_unroutable: Option<DropObserver<W::Message>>,
}

impl<W: Worker> Clone for TopologyConfigurator<W> {
    fn clone(&self) -> Self {
        Self {
            wiring: self.wiring.clone(),
            entity_ids: self.entity_ids.clone(),
            stats: self.stats.clone(),
            on_unroutable: self.on_unroutable.clone(),
        }
    }
}

impl<W: Worker> fmt::Debug for TopologyConfigurator<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopologyConfigurator")
            .field("worker", &type_name::<W>())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<W: Worker> TopologyConfigurator<W> {
    /// Topology whose head is an [`EntityRouter`] on every host.
    ///
    /// `extractor` is built per configuration (so it can size its shards by
    /// instance count), `worker_factory` creates one worker per entity, and
    /// `entity_ids` lists the entities to exercise.
    pub fn entity_router<X, F, I>(extractor: X, worker_factory: F, entity_ids: I) -> Self
    where
        X: Fn(&BenchmarkConfig) -> Rc<dyn MessageExtractor<W::Message>> + 'static,
        F: Fn(&str) -> W + 'static,
        I: Fn(&BenchmarkConfig) -> Vec<String> + 'static,
    {
        Self {
            wiring: Wiring::EntityRouter {
                extractor: Rc::new(extractor),
                factory: Rc::new(worker_factory),
            },
            entity_ids: Rc::new(entity_ids),
            stats: RouterStats::new(),
            on_unroutable: None,
        }
    }

    /// Topology with caller-provided wiring.
    ///
    /// `wiring` runs as each host's bootstrap and is expected to register a
    /// [`WorkerRef<W>`] in the host's registry.
    pub fn custom<B, I>(wiring: B, entity_ids: I) -> Self
    where
        B: Fn(&BenchmarkConfig, &Host) -> Result<(), HostError> + 'static,
        I: Fn(&BenchmarkConfig) -> Vec<String> + 'static,
    {
        Self {
            wiring: Wiring::Custom(Rc::new(wiring)),
            entity_ids: Rc::new(entity_ids),
            stats: RouterStats::new(),
            on_unroutable: None,
        }
    }

    /// Pass every message the routers drop to `observer`.
    pub fn on_unroutable(mut self, observer: DropObserver<W::Message>) -> Self {
        self.on_unroutable = Some(observer);
        self
    }

    /// Counters shared by the routers of every host this topology builds.
    pub fn router_stats(&self) -> &RouterStats {
        &self.stats
    }

    /// Same wiring with its own zeroed router counters.
    pub(crate) fn with_fresh_stats(&self) -> Self {
        Self {
            stats: RouterStats::new(),
            ..self.clone()
        }
    }

    /// Entities to exercise under `config`.
    pub fn entity_ids(&self, config: &BenchmarkConfig) -> Vec<String> {
        (self.entity_ids)(config)
    }

    /// Create host `index` of `config`, with its wiring as bootstrap.
    pub fn build_host(&self, config: &BenchmarkConfig, index: usize) -> Host {
        let config = config.clone();
        let wiring = self.wiring.clone();
        let stats = self.stats.clone();
        let on_unroutable = self.on_unroutable.clone();

        Host::with_bootstrap(config.host_name(index), index, move |host: &Host| match wiring {
            Wiring::EntityRouter { extractor, factory } => {
                let mut router = EntityRouter::new(extractor(&config), factory).with_stats(stats);
                if let Some(observer) = on_unroutable {
                    router = router.on_unroutable(observer);
                }
                let head = host.spawn(ROUTER_NAME, router)?;
                host.registry().register::<W>(head);
                Ok(())
            }
            Wiring::Custom(wiring) => wiring(&config, host),
        })
    }

    /// Wait for the head reference of `host` to be registered.
    pub async fn resolve_head(
        &self,
        host: &Host,
        deadline: &Deadline,
    ) -> Result<WorkerRef<W>, HostError> {
        host.registry()
            .resolve::<W>(deadline)
            .await
            .map_err(|source| HostError::Unresolved {
                host: host.name().to_string(),
                key: type_name::<W>(),
                source,
            })
    }
}
