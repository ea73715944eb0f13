//! Entity router properties: one worker per identifier, cluster-wide
//! ownership, and observable drops.

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use futures::future::join_all;
use moonpool_bench::workloads::counting::{counting_topology, CountingWorker, EntityMessage};
use moonpool_bench::{
    ActorError, BenchmarkConfig, Cluster, Deadline, EntityRouter, HashCodeMessageExtractor, Host,
    RouterStats,
};

use common::{init_tracing, local};

fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(10))
}

#[tokio::test]
async fn test_concurrent_first_contact_creates_one_worker() {
    init_tracing();
    local(async {
        let host = Host::new("BenchmarkSys-0", 0);
        host.start(&deadline()).await.expect("start");

        let stats = RouterStats::new();
        let router = EntityRouter::<CountingWorker>::new(
            Rc::new(HashCodeMessageExtractor::<EntityMessage>::for_entities(10)),
            Rc::new(|id: &str| CountingWorker::new(id)),
        )
        .with_stats(stats.clone());
        let root = host.spawn("router", router).expect("spawn");

        let timeout = deadline();
        for round in 0..5 {
            let entity_id = format!("fresh-{round}");
            let asks = (0..100).map(|_| root.ask(EntityMessage::new(entity_id.clone()), &timeout));
            let replies = join_all(asks).await;

            let mut processed: Vec<u64> = replies
                .into_iter()
                .map(|reply| {
                    let reply = reply.expect("reply");
                    assert_eq!(reply.entity_id, entity_id);
                    reply.processed
                })
                .collect();
            processed.sort_unstable();
            assert_eq!(processed, (1..=100).collect::<Vec<u64>>());
        }

        assert_eq!(stats.workers_created(), 5);
        assert_eq!(stats.routed(), 500);
        host.stop(&deadline()).await.expect("stop");
    })
    .await;
}

#[tokio::test]
async fn test_cluster_has_one_worker_per_entity_whatever_the_entry_host() {
    init_tracing();
    local(async {
        let config = BenchmarkConfig::builder("Clustered (3 nodes)")
            .instances(3)
            .instance_name("ClusterSys")
            .build()
            .expect("config");
        let topology = counting_topology(30);

        let hosts: Vec<Host> = (0..3).map(|i| topology.build_host(&config, i)).collect();
        for host in &hosts {
            host.start(&deadline()).await.expect("start");
        }
        Cluster::join_seed_nodes(&hosts, &deadline())
            .await
            .expect("join");

        let ids = topology.entity_ids(&config);
        for (round, host) in hosts.iter().enumerate() {
            let head = topology.resolve_head(host, &deadline()).await.expect("head");
            for id in &ids {
                let reply = head
                    .ask(EntityMessage::new(id.clone()), &deadline())
                    .await
                    .expect("reply");
                assert_eq!(&reply.entity_id, id);
                assert_eq!(reply.processed, round as u64 + 1);
            }
        }

        let stats = topology.router_stats();
        assert_eq!(stats.workers_created(), 30);
        assert_eq!(stats.routed(), 90);
        assert!(stats.forwarded() > 0);

        for host in &hosts {
            host.stop(&deadline()).await.expect("stop");
        }
    })
    .await;
}

#[tokio::test]
async fn test_unroutable_messages_are_counted_and_observed() {
    local(async {
        let dropped = Rc::new(RefCell::new(Vec::new()));
        let sink = dropped.clone();
        let topology = counting_topology(1).on_unroutable(Rc::new(move |message: &EntityMessage| {
            sink.borrow_mut().push(message.clone());
        }));

        let config = BenchmarkConfig::default();
        let host = topology.build_host(&config, 0);
        host.start(&deadline()).await.expect("start");
        let head = topology.resolve_head(&host, &deadline()).await.expect("head");

        head.tell(EntityMessage::new("")).expect("tell");
        let reply = head.ask(EntityMessage::new(""), &deadline()).await;
        assert!(matches!(reply, Err(ActorError::BrokenPromise)));

        let reply = head
            .ask(EntityMessage::new("actor-0"), &deadline())
            .await
            .expect("routable");
        assert_eq!(reply.processed, 1);

        let stats = topology.router_stats();
        assert_eq!(stats.dropped(), 2);
        assert_eq!(stats.routed(), 1);
        assert_eq!(stats.workers_created(), 1);
        assert_eq!(dropped.borrow().len(), 2);

        host.stop(&deadline()).await.expect("stop");
    })
    .await;
}
