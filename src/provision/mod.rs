//! Provisioning seam: bringing node processes up and down.
//!
//! The harness never manages server processes itself. A [`Provisioner`]
//! launches a node for a [`NodeSpec`], hands back the endpoint its query
//! interface listens on, and terminates it again. [`DockerProvisioner`] does
//! this with containers on a private network so nodes can address each other
//! by name.

mod docker;
pub use docker::*;


use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::ClusterTopology;
use crate::Endpoint;
use crate::NodeSpec;
use crate::QueryClient;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Provisioner: Send + Sync + 'static {
    /// Prepares shared resources for a topology (network, coordination service).
    ///
    /// Called once before any node is launched.
    async fn setup(
        &self,
        topology: &ClusterTopology,
    ) -> Result<()>;

    /// Boots the node described by `spec` and returns where its query interface listens.
    ///
    /// # Errors
    /// - [`crate::ProvisionError::ImageNotFound`] if the version's image is unavailable
    /// - [`crate::ProvisionError::CommandFailed`] if the runtime refuses to start it
    async fn launch(
        &self,
        spec: &NodeSpec,
    ) -> Result<Endpoint>;

    /// Builds the query client used for readiness probing and statements.
    fn connect(
        &self,
        spec: &NodeSpec,
        endpoint: &Endpoint,
    ) -> Result<Arc<dyn QueryClient>>;

    /// Stops and removes the node. Terminating an unknown node succeeds.
    async fn terminate(
        &self,
        name: &str,
    ) -> Result<()>;

    /// Releases whatever `setup` created. Best-effort.
    async fn teardown(&self) -> Result<()>;
}
