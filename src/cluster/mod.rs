//! Cluster start/stop orchestration.
//!
//! [`ClusterLifecycle::start`] either returns a [`RunningCluster`] in which
//! every node is `Ready`, or leaves nothing running. [`ClusterLifecycle::shutdown`]
//! is best-effort and never fails. [`ClusterLifecycle::scoped`] pairs the two
//! around a body so teardown happens on every exit path, panics included.


use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::ClusterTopology;
use crate::Error;
use crate::NodeHandle;
use crate::ProvisionConfig;
use crate::Provisioner;
use crate::Result;
use crate::TopologyError;

/// Every node of a started topology, all `Ready` when handed out
pub struct RunningCluster {
    nodes: Vec<NodeHandle>,
}

impl RunningCluster {
    /// Looks a node up by name.
    ///
    /// # Errors
    /// [`TopologyError::UnknownNode`] if no node has that name
    pub fn node(
        &self,
        name: &str,
    ) -> Result<&NodeHandle> {
        self.nodes
            .iter()
            .find(|n| n.name() == name)
            .ok_or_else(|| TopologyError::UnknownNode(name.to_string()).into())
    }

    pub fn nodes(&self) -> &[NodeHandle] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Drop for RunningCluster {
    fn drop(&mut self) {
        let leaked: Vec<&str> =
            self.nodes.iter().filter(|n| n.is_ready()).map(|n| n.name()).collect();
        if !leaked.is_empty() {
            error!(?leaked, "running cluster dropped without shutdown; nodes left running");
        }
    }
}

/// Stop failures collected during [`ClusterLifecycle::shutdown`]
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub stopped: Vec<String>,
    pub failures: Vec<(String, Error)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ClusterLifecycle {
    provisioner: Arc<dyn Provisioner>,
    config: ProvisionConfig,
}

impl ClusterLifecycle {
    pub fn new(
        provisioner: Arc<dyn Provisioner>,
        config: ProvisionConfig,
    ) -> Self {
        Self {
            provisioner,
            config,
        }
    }

    /// Starts every node of `topology` concurrently.
    ///
    /// # Errors
    /// [`Error::ClusterStart`] wrapping the first failure in topology order. By
    /// then every node that did come up has been stopped and the provisioner torn
    /// down.
    pub async fn start(
        &self,
        topology: &ClusterTopology,
    ) -> Result<RunningCluster> {
        info!(nodes = topology.len(), "starting cluster");
        if let Err(e) = self.provisioner.setup(topology).await {
            self.release_provisioner().await;
            return Err(Error::ClusterStart {
                node: "<setup>".to_string(),
                source: Box::new(e),
            });
        }

        let mut nodes: Vec<NodeHandle> = topology
            .nodes()
            .iter()
            .map(|spec| NodeHandle::new(spec.clone(), self.provisioner.clone(), &self.config))
            .collect();

        let results = join_all(nodes.iter_mut().map(|node| node.start())).await;

        let first_failure = nodes
            .iter()
            .zip(results)
            .find_map(|(node, result)| result.err().map(|e| (node.name().to_string(), e)));

        match first_failure {
            None => {
                info!(nodes = nodes.len(), "cluster ready");
                Ok(RunningCluster { nodes })
            }
            Some((node, e)) => {
                error!(%node, "cluster start failed, rolling back: {}", e);
                let report = self.stop_all(&mut nodes).await;
                log_failures(&report);
                self.release_provisioner().await;
                Err(Error::ClusterStart {
                    node,
                    source: Box::new(e),
                })
            }
        }
    }

    /// Stops every node; individual failures are logged and collected, never raised.
    pub async fn shutdown(
        &self,
        mut cluster: RunningCluster,
    ) -> ShutdownReport {
        info!(nodes = cluster.len(), "shutting down cluster");
        let mut nodes = std::mem::take(&mut cluster.nodes);
        let report = self.stop_all(&mut nodes).await;
        log_failures(&report);
        self.release_provisioner().await;
        report
    }

    /// Starts the cluster, runs `body`, and shuts down whatever `body` did.
    ///
    /// A panic inside `body` is resumed after teardown. The returned future may
    /// only borrow the cluster; anything else it needs must be moved in.
    ///
    /// # Example
    /// ```rust,ignore
    /// let report = lifecycle
    ///     .scoped(&topology, move |cluster| {
    ///         Box::pin(async move { scenario.run(cluster).await })
    ///     })
    ///     .await?;
    /// ```
    pub async fn scoped<F, T>(
        &self,
        topology: &ClusterTopology,
        body: F,
    ) -> Result<T>
    where
        F: for<'c> FnOnce(&'c RunningCluster) -> BoxFuture<'c, Result<T>>,
    {
        let cluster = self.start(topology).await?;
        let outcome = AssertUnwindSafe(body(&cluster)).catch_unwind().await;
        let report = self.shutdown(cluster).await;
        if !report.is_clean() {
            warn!(failures = report.failures.len(), "teardown was not clean");
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn stop_all(
        &self,
        nodes: &mut [NodeHandle],
    ) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        for node in nodes.iter_mut() {
            let was_running = node.is_ready();
            match node.stop().await {
                Ok(()) if was_running => report.stopped.push(node.name().to_string()),
                Ok(()) => {}
                Err(e) => report.failures.push((node.name().to_string(), e)),
            }
        }
        report
    }

    async fn release_provisioner(&self) {
        if let Err(e) = self.provisioner.teardown().await {
            warn!("provisioner teardown failed: {}", e);
        }
    }
}

fn log_failures(report: &ShutdownReport) {
    for (node, e) in &report.failures {
        warn!(%node, "failed to stop node: {}", e);
    }
}
