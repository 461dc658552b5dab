//! Cluster topology declaration.
//!
//! Pure data: which nodes exist, which software version each one runs, and
//! whether it registers with the coordination service. Nothing here touches
//! the container runtime.


use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::TopologyError;
use crate::COORDINATION_HOST;

const CURRENT: &str = "current";

/// Software build a node runs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionTag {
    /// Build under development
    Current,
    /// Released build identified by its image tag
    Pinned(String),
}

impl VersionTag {
    pub fn is_current(&self) -> bool {
        matches!(self, VersionTag::Current)
    }
}

impl fmt::Display for VersionTag {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            VersionTag::Current => f.write_str(CURRENT),
            VersionTag::Pinned(tag) => f.write_str(tag),
        }
    }
}

impl FromStr for VersionTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tag = s.trim();
        if tag.is_empty() {
            return Err(Error::Config(config::ConfigError::Message(
                "version tag cannot be empty".into(),
            )));
        }
        if tag.eq_ignore_ascii_case(CURRENT) {
            Ok(VersionTag::Current)
        } else {
            Ok(VersionTag::Pinned(tag.to_string()))
        }
    }
}

impl TryFrom<String> for VersionTag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<VersionTag> for String {
    fn from(tag: VersionTag) -> Self {
        tag.to_string()
    }
}

/// Declaration of one cluster member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique within the topology; also the host name other nodes use
    pub name: String,

    pub version: VersionTag,

    /// Register with the shared coordination service
    #[serde(default)]
    pub uses_coordination: bool,

    /// Overrides the provisioner's default image
    #[serde(default)]
    pub image: Option<String>,

    /// Server settings sent with every query to this node
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl NodeSpec {
    pub fn new(
        name: impl Into<String>,
        version: VersionTag,
        uses_coordination: bool,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            uses_coordination,
            image: None,
            settings: BTreeMap::new(),
        }
    }

    pub fn with_setting(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

/// Ordered set of node declarations with unique names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterTopology {
    nodes: Vec<NodeSpec>,
}

impl ClusterTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node and hands it back for further customisation.
    ///
    /// # Errors
    /// - [`TopologyError::DuplicateName`] if `name` is already registered
    /// - [`TopologyError::InvalidName`] if `name` cannot serve as a host name
    pub fn add_node(
        &mut self,
        name: &str,
        version: VersionTag,
        uses_coordination: bool,
    ) -> Result<&mut NodeSpec> {
        validate_name(name)?;
        if self.node(name).is_some() {
            return Err(TopologyError::DuplicateName(name.to_string()).into());
        }

        self.nodes.push(NodeSpec::new(name, version, uses_coordination));
        let idx = self.nodes.len() - 1;
        Ok(&mut self.nodes[idx])
    }

    pub fn node(
        &self,
        name: &str,
    ) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    /// True when at least one node registers with the coordination service
    pub fn needs_coordination(&self) -> bool {
        self.nodes.iter().any(|n| n.uses_coordination)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Node names double as DNS aliases on the cluster network.
fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name cannot be empty")
    } else if name.len() > 63 {
        Some("name longer than 63 characters")
    } else if name == COORDINATION_HOST {
        Some("name is reserved for the coordination service")
    } else if name.starts_with('-') || name.ends_with('-') {
        Some("name cannot start or end with '-'")
    } else if !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        Some("only lowercase letters, digits and '-' are allowed")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(TopologyError::InvalidName {
            name: name.to_string(),
            reason,
        }
        .into()),
        None => Ok(()),
    }
}
