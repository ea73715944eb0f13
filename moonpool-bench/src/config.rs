//! Benchmark configuration.
//!
//! A [`BenchmarkConfig`] describes one experiment variant: its name, how many
//! runtime instances to start, what to call them, and the lifecycle hooks
//! run around them. Hooks are plain closures returning boxed local futures;
//! unset hooks are no-ops.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = BenchmarkConfig::builder("Clustered (3 nodes)")
//!     .instances(3)
//!     .instance_name("ClusterSys")
//!     .clustered()
//!     .build()?;
//! ```

use std::fmt;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};

use crate::cluster::Cluster;
use crate::deadline::Deadline;
use crate::error::{ConfigError, HookError};
use crate::runtime::Host;

/// Future returned by a lifecycle hook.
pub type HookFuture = LocalBoxFuture<'static, Result<(), HookError>>;

/// Hook run before the hosts are built, or after they are stopped.
pub type LifecycleHook = Rc<dyn Fn(Deadline) -> HookFuture>;

/// Hook run once every host has started, with all of them.
pub type HostsHook = Rc<dyn Fn(Vec<Host>, Deadline) -> HookFuture>;

/// Name of the configuration used when none is given.
pub const DEFAULT_CONFIG_NAME: &str = "Default";

/// Runtime instance name used when none is given.
pub const DEFAULT_INSTANCE_NAME: &str = "BenchmarkSys";

/// One experiment variant. Immutable; clones share the hooks.
#[derive(Clone)]
pub struct BenchmarkConfig {
    name: String,
    instance_count: usize,
    instance_name: String,
    pre_start: LifecycleHook,
    post_start: HostsHook,
    post_stop: LifecycleHook,
}

impl fmt::Debug for BenchmarkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BenchmarkConfig")
            .field("name", &self.name)
            .field("instance_count", &self.instance_count)
            .field("instance_name", &self.instance_name)
            .finish_non_exhaustive()
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_CONFIG_NAME.to_string(),
            instance_count: 1,
            instance_name: DEFAULT_INSTANCE_NAME.to_string(),
            pre_start: noop_hook(),
            post_start: noop_hosts_hook(),
            post_stop: noop_hook(),
        }
    }
}

impl BenchmarkConfig {
    /// Start building a configuration called `name`.
    pub fn builder(name: impl Into<String>) -> BenchmarkConfigBuilder {
        BenchmarkConfigBuilder {
            config: Self {
                name: name.into(),
                ..Self::default()
            },
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of runtime instances to start.
    pub fn instance_count(&self) -> usize {
        self.instance_count
    }

    /// Base name of the runtime instances.
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Name of the host at `index`.
    pub fn host_name(&self, index: usize) -> String {
        format!("{}-{}", self.instance_name, index)
    }

    pub(crate) async fn run_pre_start(&self, deadline: Deadline) -> Result<(), HookError> {
        (self.pre_start)(deadline).await
    }

    pub(crate) async fn run_post_start(
        &self,
        hosts: Vec<Host>,
        deadline: Deadline,
    ) -> Result<(), HookError> {
        (self.post_start)(hosts, deadline).await
    }

    pub(crate) async fn run_post_stop(&self, deadline: Deadline) -> Result<(), HookError> {
        (self.post_stop)(deadline).await
    }
}

/// Builder for [`BenchmarkConfig`].
pub struct BenchmarkConfigBuilder {
    config: BenchmarkConfig,
}

impl BenchmarkConfigBuilder {
    /// Number of runtime instances (default 1).
    pub fn instances(mut self, count: usize) -> Self {
        self.config.instance_count = count;
        self
    }

    /// Base name of the runtime instances.
    pub fn instance_name(mut self, name: impl Into<String>) -> Self {
        self.config.instance_name = name.into();
        self
    }

    /// Hook run before any host is built.
    pub fn pre_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(Deadline) -> HookFuture + 'static,
    {
        self.config.pre_start = Rc::new(hook);
        self
    }

    /// Hook run once all hosts are up.
    pub fn post_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(Vec<Host>, Deadline) -> HookFuture + 'static,
    {
        self.config.post_start = Rc::new(hook);
        self
    }

    /// Hook run after the hosts are stopped, whatever the stop outcome.
    pub fn post_stop<F>(mut self, hook: F) -> Self
    where
        F: Fn(Deadline) -> HookFuture + 'static,
    {
        self.config.post_stop = Rc::new(hook);
        self
    }

    /// Join all hosts into one cluster after they start.
    pub fn clustered(self) -> Self {
        self.post_start(|hosts, deadline| {
            async move {
                Cluster::join_seed_nodes(&hosts, &deadline).await?;
                Ok::<(), HookError>(())
            }
            .boxed_local()
        })
    }

    /// Validate and build.
    pub fn build(self) -> Result<BenchmarkConfig, ConfigError> {
        let config = self.config;
        if config.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if config.instance_name.trim().is_empty() {
            return Err(ConfigError::EmptyInstanceName);
        }
        if config.instance_count == 0 {
            return Err(ConfigError::NoInstances);
        }
        Ok(config)
    }
}

fn noop_hook() -> LifecycleHook {
    Rc::new(|_: Deadline| -> HookFuture { futures::future::ready(Ok(())).boxed_local() })
}

fn noop_hosts_hook() -> HostsHook {
    Rc::new(|_: Vec<Host>, _: Deadline| -> HookFuture {
        futures::future::ready(Ok(())).boxed_local()
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.name(), "Default");
        assert_eq!(config.instance_count(), 1);
        assert_eq!(config.host_name(0), "BenchmarkSys-0");
    }

    #[test]
    fn test_builder_validates() {
        assert_eq!(
            BenchmarkConfig::builder("").build().err(),
            Some(ConfigError::EmptyName)
        );
        assert_eq!(
            BenchmarkConfig::builder("x").instances(0).build().err(),
            Some(ConfigError::NoInstances)
        );
        assert_eq!(
            BenchmarkConfig::builder("x").instance_name(" ").build().err(),
            Some(ConfigError::EmptyInstanceName)
        );

        let config = BenchmarkConfig::builder("Clustered (3 nodes)")
            .instances(3)
            .instance_name("ClusterSys")
            .build()
            .expect("valid");
        assert_eq!(config.host_name(2), "ClusterSys-2");
    }

    #[tokio::test]
    async fn test_hooks_default_to_noops() {
        let config = BenchmarkConfig::default();
        let deadline = Deadline::after(Duration::from_secs(1));
        config.run_pre_start(deadline.clone()).await.expect("pre");
        config
            .run_post_start(Vec::new(), deadline.clone())
            .await
            .expect("post start");
        config.run_post_stop(deadline).await.expect("post stop");
    }

    #[tokio::test]
    async fn test_custom_hook_runs() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let config = BenchmarkConfig::builder("hooked")
            .post_stop(move |_| {
                seen.set(seen.get() + 1);
                futures::future::ready(Err(HookError::new("boom"))).boxed_local()
            })
            .build()
            .expect("valid");

        let err = config
            .run_post_stop(Deadline::after(Duration::from_secs(1)))
            .await
            .expect_err("hook fails");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(calls.get(), 1);
    }
}
