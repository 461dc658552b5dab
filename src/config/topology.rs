use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::ClusterTopology;
use crate::Error;
use crate::NodeSpec;
use crate::Result;
use crate::VersionTag;

/// Declarative node list, turned into a [`ClusterTopology`] by [`TopologyConfig::build`]
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TopologyConfig {
    #[serde(default = "default_nodes")]
    pub nodes: Vec<NodeSpec>,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
        }
    }
}

impl TopologyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "topology.nodes must contain at least one node".into(),
            )));
        }
        self.build().map(|_| ())
    }

    /// Registers every configured node in order, rejecting duplicate or invalid names.
    pub fn build(&self) -> Result<ClusterTopology> {
        let mut topology = ClusterTopology::new();
        for spec in &self.nodes {
            let node =
                topology.add_node(&spec.name, spec.version.clone(), spec.uses_coordination)?;
            node.image = spec.image.clone();
            node.settings = spec.settings.clone();
        }
        Ok(topology)
    }
}

/// Two nodes pinned to the oldest supported release plus one current node.
fn default_nodes() -> Vec<NodeSpec> {
    let old = VersionTag::Pinned(MIN_TESTED_VERSION.to_string());
    vec![
        NodeSpec::new("node1", old.clone(), false).with_setting("allow_experimental_analyzer", "0"),
        NodeSpec::new("node2", old, false).with_setting("allow_experimental_analyzer", "0"),
        NodeSpec::new("node3", VersionTag::Current, false)
            .with_setting("allow_experimental_analyzer", "0"),
    ]
}

/// Oldest server release the current build must stay compatible with
pub const MIN_TESTED_VERSION: &str = "23.3";
