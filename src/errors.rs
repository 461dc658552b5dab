//! Compatibility Harness Error Hierarchy
//!
//! Errors are grouped by the seam that produced them: provisioning (container
//! runtime), querying (server HTTP interface), topology declaration, and the
//! scenario itself. Teardown paths never raise these; they log and move on.

use std::time::Duration;

use config::ConfigError;

use crate::NodeState;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Node could not be brought up
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// Statement rejected or transport failure
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A bounded wait expired (readiness or query response)
    #[error("{operation} on node {node} timed out after {duration:?}")]
    Timeout {
        node: String,
        operation: &'static str,
        duration: Duration,
    },

    /// Cluster start aborted; every started node has already been stopped
    #[error("cluster start failed at node {node}: {source}")]
    ClusterStart {
        node: String,
        #[source]
        source: Box<Error>,
    },

    /// Schema setup rejected by one participating node
    #[error("schema setup rejected by node {node} for `{statement}`: {source}")]
    Schema {
        node: String,
        statement: String,
        #[source]
        source: Box<Error>,
    },

    /// Distributed result differs from the expected text
    #[error(transparent)]
    Assertion(#[from] AssertionFailure),

    /// Invalid topology declaration or lookup
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Unrecoverable failures requiring the run to stop
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Image could neither be found locally nor pulled
    #[error("image {image} not found: {reason}")]
    ImageNotFound { image: String, reason: String },

    /// Container runtime command exited with a failure status
    #[error("`{command}` failed with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    /// Readiness probe never succeeded within the startup timeout
    #[error("node {node} not ready within {timeout:?}: {reason}")]
    NotReady {
        node: String,
        timeout: Duration,
        reason: String,
    },

    #[error("node {node} cannot start from state {state:?}")]
    InvalidState { node: String, state: NodeState },

    /// Runtime reported a port mapping we cannot parse
    #[error("invalid endpoint for node {node}: {raw}")]
    InvalidEndpoint { node: String, raw: String },
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Server answered with a failure status
    #[error("node {node} rejected `{statement}` (status {status}, code {code:?}): {message}")]
    Server {
        node: String,
        statement: String,
        status: u16,
        code: Option<i32>,
        message: String,
    },

    /// Request never produced a response
    #[error("transport failure talking to node {node}: {source}")]
    Transport {
        node: String,
        #[source]
        source: reqwest::Error,
    },

    /// Queries are only accepted while the node is Ready
    #[error("node {node} is {state:?}, queries require Ready")]
    NodeNotReady { node: String, state: NodeState },
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("node name {0} already present in topology")]
    DuplicateName(String),

    #[error("invalid node name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("node {0} is not part of the cluster")]
    UnknownNode(String),
}

/// Expected vs actual output of the distributed query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "result mismatch on node {node} for `{statement}`: first difference at line {line}: \
     expected {expected_line:?}, got {actual_line:?}"
)]
pub struct AssertionFailure {
    pub node: String,
    pub statement: String,
    pub expected: String,
    pub actual: String,
    pub line: usize,
    pub expected_line: Option<String>,
    pub actual_line: Option<String>,
}

impl AssertionFailure {
    /// Builds the failure, locating the first line where the texts diverge.
    pub fn new(
        node: impl Into<String>,
        statement: impl Into<String>,
        expected: String,
        actual: String,
    ) -> Self {
        let mut expected_lines = expected.split_inclusive('\n');
        let mut actual_lines = actual.split_inclusive('\n');
        let mut line = 0;
        let (expected_line, actual_line) = loop {
            match (expected_lines.next(), actual_lines.next()) {
                (Some(e), Some(a)) if e == a => line += 1,
                (e, a) => break (e.map(str::to_string), a.map(str::to_string)),
            }
        };

        Self {
            node: node.into(),
            statement: statement.into(),
            expected,
            actual,
            line,
            expected_line,
            actual_line,
        }
    }
}

impl Error {
    /// Node most closely associated with this error, when there is one.
    pub fn node(&self) -> Option<&str> {
        match self {
            Error::Provision(ProvisionError::NotReady { node, .. })
            | Error::Provision(ProvisionError::InvalidState { node, .. })
            | Error::Provision(ProvisionError::InvalidEndpoint { node, .. })
            | Error::Query(QueryError::Server { node, .. })
            | Error::Query(QueryError::Transport { node, .. })
            | Error::Query(QueryError::NodeNotReady { node, .. })
            | Error::Timeout { node, .. }
            | Error::ClusterStart { node, .. }
            | Error::Schema { node, .. } => Some(node),
            Error::Assertion(failure) => Some(&failure.node),
            _ => None,
        }
    }
}
