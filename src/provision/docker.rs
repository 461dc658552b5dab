use std::collections::HashMap;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::Provisioner;
use crate::ClusterTopology;
use crate::Endpoint;
use crate::HttpQueryClient;
use crate::NodeSpec;
use crate::ProvisionConfig;
use crate::ProvisionError;
use crate::QueryClient;
use crate::QueryConfig;
use crate::Result;
use crate::VersionTag;

/// Network alias of the shared coordination container
pub const COORDINATION_HOST: &str = "coordination";
const COORDINATION_PORT: u16 = 2181;
const SERVER_CONFIG_DIR: &str = "/etc/clickhouse-server/config.d";
const RUN_ID_ALPHABET: [char; 36] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Runs every node as a container on a per-run private network
///
/// Container and network names carry a random run id, so concurrent runs and
/// leftovers from crashed runs never collide.
pub struct DockerProvisioner {
    config: ProvisionConfig,
    query_timeout: Duration,
    run_id: String,
    coordination: Mutex<Option<String>>,
    /// Generated `config.d` files, kept alive while their container runs
    pub(crate) config_dirs: Mutex<HashMap<String, TempDir>>,
}

impl DockerProvisioner {
    pub fn new(
        config: ProvisionConfig,
        query: &QueryConfig,
    ) -> Self {
        let run_id = format!(
            "{}-{}",
            config.name_prefix,
            nanoid::nanoid!(8, &RUN_ID_ALPHABET)
        );
        Self {
            config,
            query_timeout: query.timeout(),
            run_id,
            coordination: Mutex::new(None),
            config_dirs: Mutex::new(HashMap::new()),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn network_name(&self) -> &str {
        &self.run_id
    }

    pub(crate) fn container_name(
        &self,
        node: &str,
    ) -> String {
        format!("{}-{}", self.run_id, node)
    }

    /// `image:tag` for the node's version, honouring a per-node image override.
    pub(crate) fn image_ref(
        &self,
        spec: &NodeSpec,
    ) -> String {
        let image = spec.image.as_deref().unwrap_or(&self.config.image);
        match &spec.version {
            VersionTag::Current => format!("{}:{}", image, self.config.current_tag),
            VersionTag::Pinned(tag) => format!("{image}:{tag}"),
        }
    }

    async fn runtime(
        &self,
        args: &[String],
    ) -> Result<String> {
        debug!(bin = %self.config.runtime_bin, ?args, "container runtime call");
        let output = Command::new(&self.config.runtime_bin).args(args).output().await?;

        if !output.status.success() {
            return Err(ProvisionError::CommandFailed {
                command: format!("{} {}", self.config.runtime_bin, args.join(" ")),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Uses the local image when present, otherwise pulls it.
    async fn ensure_image(
        &self,
        image: &str,
    ) -> Result<()> {
        if self.runtime(&args(["image", "inspect", "--format", "{{.Id}}", image])).await.is_ok() {
            return Ok(());
        }

        info!(%image, "pulling image");
        match self.runtime(&args(["pull", image])).await {
            Ok(_) => Ok(()),
            Err(e) => Err(ProvisionError::ImageNotFound {
                image: image.to_string(),
                reason: e.to_string(),
            }
            .into()),
        }
    }

    fn write_coordination_config(
        &self,
        node: &str,
    ) -> Result<String> {
        let dir = tempfile::Builder::new().prefix(&self.container_name(node)).tempdir()?;
        let path = dir.path().join("coordination.xml");
        std::fs::write(&path, coordination_config())?;

        let mount = format!("{}:{}/coordination.xml:ro", path.display(), SERVER_CONFIG_DIR);
        self.config_dirs.lock().insert(node.to_string(), dir);
        Ok(mount)
    }

    async fn remove_container(
        &self,
        container: &str,
    ) -> Result<()> {
        match self.runtime(&args(["rm", "-f", "-v", container])).await {
            Ok(_) => Ok(()),
            Err(e) if is_missing(&e) => {
                debug!(%container, "container already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Provisioner for DockerProvisioner {
    async fn setup(
        &self,
        topology: &ClusterTopology,
    ) -> Result<()> {
        info!(network = %self.network_name(), nodes = topology.len(), "creating cluster network");
        self.runtime(&args(["network", "create", self.network_name()])).await?;

        if topology.needs_coordination() {
            let image = self.config.coordination_image.clone();
            self.ensure_image(&image).await?;

            let container = self.container_name(COORDINATION_HOST);
            self.runtime(&args([
                "run",
                "-d",
                "--name",
                container.as_str(),
                "--network",
                self.network_name(),
                "--network-alias",
                COORDINATION_HOST,
                image.as_str(),
            ]))
            .await?;
            info!(%container, "coordination service started");
            *self.coordination.lock() = Some(container);
        }

        Ok(())
    }

    async fn launch(
        &self,
        spec: &NodeSpec,
    ) -> Result<Endpoint> {
        let image = self.image_ref(spec);
        self.ensure_image(&image).await?;

        let container = self.container_name(&spec.name);
        let publish = format!("127.0.0.1::{}", self.config.http_port);
        let mut run = args([
            "run",
            "-d",
            "--name",
            container.as_str(),
            "--hostname",
            spec.name.as_str(),
            "--network",
            self.network_name(),
            "--network-alias",
            spec.name.as_str(),
            "-p",
            publish.as_str(),
            "--ulimit",
            "nofile=262144:262144",
        ]);
        for var in &self.config.env {
            run.extend(args(["-e", var.as_str()]));
        }
        if spec.uses_coordination {
            let mount = self.write_coordination_config(&spec.name)?;
            run.extend(args(["-v", mount.as_str()]));
        }
        run.push(image.clone());

        info!(node = %spec.name, %image, %container, "launching node");
        self.runtime(&run).await?;

        let port = format!("{}/tcp", self.config.http_port);
        let mapping = self.runtime(&args(["port", container.as_str(), port.as_str()])).await?;
        let endpoint = parse_port_mapping(&spec.name, &mapping)?;
        debug!(node = %spec.name, %endpoint, "node published");
        Ok(endpoint)
    }

    fn connect(
        &self,
        spec: &NodeSpec,
        endpoint: &Endpoint,
    ) -> Result<Arc<dyn QueryClient>> {
        let client = HttpQueryClient::new(&spec.name, endpoint, &spec.settings, self.query_timeout)?;
        Ok(Arc::new(client))
    }

    async fn terminate(
        &self,
        name: &str,
    ) -> Result<()> {
        let container = self.container_name(name);
        let result = self.remove_container(&container).await;
        self.config_dirs.lock().remove(name);
        result
    }

    async fn teardown(&self) -> Result<()> {
        let mut first_error = None;

        let coordination = self.coordination.lock().take();
        if let Some(container) = coordination {
            if let Err(e) = self.remove_container(&container).await {
                warn!(%container, "failed to remove coordination service: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match self.runtime(&args(["network", "rm", self.network_name()])).await {
            Ok(_) => {}
            Err(e) if is_missing(&e) => {}
            Err(e) => {
                warn!(network = %self.network_name(), "failed to remove network: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn args<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn is_missing(e: &crate::Error) -> bool {
    match e {
        crate::Error::Provision(ProvisionError::CommandFailed { stderr, .. }) => {
            let stderr = stderr.to_ascii_lowercase();
            stderr.contains("no such") || stderr.contains("not found")
        }
        _ => false,
    }
}

/// Parses `docker port` output such as `127.0.0.1:49153` (possibly several lines).
pub(crate) fn parse_port_mapping(
    node: &str,
    raw: &str,
) -> Result<Endpoint> {
    let invalid = || ProvisionError::InvalidEndpoint {
        node: node.to_string(),
        raw: raw.to_string(),
    };

    let addr: SocketAddr = raw
        .lines()
        .map(str::trim)
        .find_map(|line| line.parse::<SocketAddr>().ok())
        .ok_or_else(invalid)?;

    if addr.port() == 0 {
        return Err(invalid().into());
    }

    // A wildcard bind is reachable through loopback
    let addr = if addr.ip().is_unspecified() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
    } else {
        addr
    };
    Ok(Endpoint::new(addr))
}

/// Server `config.d` fragment pointing at the shared coordination container.
pub(crate) fn coordination_config() -> String {
    format!(
        r#"<clickhouse>
    <zookeeper>
        <node>
            <host>{COORDINATION_HOST}</host>
            <port>{COORDINATION_PORT}</port>
        </node>
        <session_timeout_ms>15000</session_timeout_ms>
    </zookeeper>
</clickhouse>
"#
    )
}
