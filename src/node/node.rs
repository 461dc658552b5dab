//! One addressable member of a test cluster.
//!
//! ## Key Responsibilities
//! - Boots the node through its [`Provisioner`] with the configured version
//! - Waits, bounded, until the node answers the readiness probe
//! - Gates queries on the `Ready` state
//! - Terminates the node at most once, whatever happened before
//!
//! ## Example Usage
//! ```rust,ignore
//! let mut node = NodeHandle::new(spec, provisioner, &config.provision);
//! node.start().await?;
//! let result = node.query("select 1").await?;
//! node.stop().await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::NodeState;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::BackoffPolicy;
use crate::Endpoint;
use crate::NodeSpec;
use crate::ProvisionConfig;
use crate::ProvisionError;
use crate::Provisioner;
use crate::QueryClient;
use crate::QueryError;
use crate::QueryResult;
use crate::Result;
use crate::VersionTag;

pub struct NodeHandle {
    spec: NodeSpec,
    state: NodeState,
    provisioner: Arc<dyn Provisioner>,
    client: Option<Arc<dyn QueryClient>>,
    endpoint: Option<Endpoint>,
    startup_timeout: Duration,
    readiness: BackoffPolicy,
}

impl NodeHandle {
    pub fn new(
        spec: NodeSpec,
        provisioner: Arc<dyn Provisioner>,
        config: &ProvisionConfig,
    ) -> Self {
        Self {
            spec,
            state: NodeState::Created,
            provisioner,
            client: None,
            endpoint: None,
            startup_timeout: config.startup_timeout(),
            readiness: config.readiness,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn version(&self) -> &VersionTag {
        &self.spec.version
    }

    pub fn spec(&self) -> &NodeSpec {
        &self.spec
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        self.endpoint
    }

    pub fn is_ready(&self) -> bool {
        self.state == NodeState::Ready
    }

    /// Provisions the node and waits until it accepts queries.
    ///
    /// On failure the node is terminated best-effort and left `Stopped`.
    ///
    /// # Errors
    /// - [`ProvisionError::InvalidState`] unless the node is still `Created`
    /// - [`ProvisionError::NotReady`] if the readiness probe does not pass within the
    ///   startup timeout
    /// - Any launch error reported by the provisioner
    pub async fn start(&mut self) -> Result<()> {
        if self.state != NodeState::Created {
            return Err(ProvisionError::InvalidState {
                node: self.spec.name.clone(),
                state: self.state,
            }
            .into());
        }

        self.state = NodeState::Starting;
        info!(node = %self.spec.name, version = %self.spec.version, "starting node");

        match self.boot().await {
            Ok(()) => {
                self.state = NodeState::Ready;
                info!(node = %self.spec.name, endpoint = ?self.endpoint, "node ready");
                Ok(())
            }
            Err(e) => {
                warn!(node = %self.spec.name, "node failed to start: {}", e);
                if let Err(stop_err) = self.provisioner.terminate(&self.spec.name).await {
                    warn!(node = %self.spec.name, "cleanup after failed start: {}", stop_err);
                }
                self.client = None;
                self.state = NodeState::Stopped;
                Err(e)
            }
        }
    }

    async fn boot(&mut self) -> Result<()> {
        let endpoint = self.provisioner.launch(&self.spec).await?;
        self.endpoint = Some(endpoint);

        let client = self.provisioner.connect(&self.spec, &endpoint)?;
        let probe = client.clone();
        let readiness = task_with_timeout_and_exponential_backoff(
            &self.spec.name,
            move || {
                let probe = probe.clone();
                async move { probe.ping().await }
            },
            self.readiness,
        );

        match timeout(self.startup_timeout, readiness).await {
            Ok(Ok(())) => {
                self.client = Some(client);
                Ok(())
            }
            Ok(Err(e)) => Err(ProvisionError::NotReady {
                node: self.spec.name.clone(),
                timeout: self.startup_timeout,
                reason: e.to_string(),
            }
            .into()),
            Err(_) => Err(ProvisionError::NotReady {
                node: self.spec.name.clone(),
                timeout: self.startup_timeout,
                reason: "readiness probe never succeeded".to_string(),
            }
            .into()),
        }
    }

    /// Runs one statement on this node.
    ///
    /// # Errors
    /// - [`QueryError::NodeNotReady`] unless the node is `Ready`
    /// - Whatever the query client reports (server rejection, transport, timeout)
    pub async fn query(
        &self,
        statement: &str,
    ) -> Result<QueryResult> {
        let client = match (&self.client, self.state) {
            (Some(client), NodeState::Ready) => client,
            _ => {
                return Err(QueryError::NodeNotReady {
                    node: self.spec.name.clone(),
                    state: self.state,
                }
                .into())
            }
        };

        debug!(node = %self.spec.name, %statement, "query");
        client.execute(statement).await
    }

    /// Terminates the node. A node that never started, or was already stopped, is left alone.
    ///
    /// The node is `Stopped` afterwards even if the provisioner reports an error.
    pub async fn stop(&mut self) -> Result<()> {
        if matches!(self.state, NodeState::Created | NodeState::Stopped) {
            return Ok(());
        }

        self.state = NodeState::Stopping;
        info!(node = %self.spec.name, "stopping node");
        let result = self.provisioner.terminate(&self.spec.name).await;

        self.client = None;
        self.state = NodeState::Stopped;
        result
    }
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("name", &self.spec.name)
            .field("version", &self.spec.version)
            .field("state", &self.state)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
