//! Cluster membership across the hosts of one configuration.
//!
//! A clustered configuration's post-start hook joins every host into one
//! [`Cluster`]. Members are ordered by host index; shard `s` is owned by
//! member `s % member_count`. Membership holds hosts weakly, and a host
//! leaves when it stops.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::deadline::Deadline;
use crate::error::ClusterError;
use crate::runtime::{Host, WeakHost};

#[derive(Default)]
struct ClusterInner {
    members: RefCell<BTreeMap<usize, WeakHost>>,
}

/// Shared membership of a set of hosts.
#[derive(Clone)]
pub struct Cluster {
    inner: Rc<ClusterInner>,
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.members().iter().map(|h| h.name().to_string()).collect();
        f.debug_struct("Cluster").field("members", &names).finish()
    }
}

impl Cluster {
    /// Join every host in `hosts` into one cluster.
    ///
    /// All hosts must be running and not yet members of a cluster; nothing
    /// is joined if any of them is not.
    pub async fn join_seed_nodes(
        hosts: &[Host],
        deadline: &Deadline,
    ) -> Result<Self, ClusterError> {
        if hosts.is_empty() {
            return Err(ClusterError::NoSeedNodes);
        }
        deadline.check()?;

        for host in hosts {
            if !host.is_running() {
                return Err(ClusterError::NotRunning(host.name().to_string()));
            }
            if host.cluster().is_some() {
                return Err(ClusterError::AlreadyMember(host.name().to_string()));
            }
        }

        let cluster = Self {
            inner: Rc::new(ClusterInner::default()),
        };
        for host in hosts {
            cluster
                .inner
                .members
                .borrow_mut()
                .insert(host.index(), host.downgrade());
            host.join_cluster(cluster.clone())?;
        }

        // Let routers observe the membership before traffic arrives.
        deadline.run(tokio::task::yield_now()).await?;

        tracing::info!(members = hosts.len(), "cluster formed");
        Ok(cluster)
    }

    /// Live members ordered by host index.
    pub fn members(&self) -> Vec<Host> {
        self.inner
            .members
            .borrow()
            .values()
            .filter_map(WeakHost::upgrade)
            .collect()
    }

    /// Number of live members.
    pub fn len(&self) -> usize {
        self.members().len()
    }

    /// Whether every member has left.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The member owning `shard`.
    pub fn owner_of(&self, shard: u32) -> Option<Host> {
        let members = self.members();
        if members.is_empty() {
            return None;
        }
        let slot = shard as usize % members.len();
        members.into_iter().nth(slot)
    }

    pub(crate) fn leave(&self, index: usize) {
        if self.inner.members.borrow_mut().remove(&index).is_some() {
            tracing::debug!(index, "host left the cluster");
        }
    }
}
