//! Query seam: SQL text in, tab-separated text out.
//!
//! - [`QueryClient`] - what a started node must offer the harness
//! - [`HttpQueryClient`] - implementation over the server's HTTP interface
//! - [`QueryResult`] - raw output plus status, never reinterpreted
//!
//! # Basic Usage
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::time::Duration;
//! use compat_harness::{Endpoint, HttpQueryClient, QueryClient};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let endpoint = Endpoint::new("127.0.0.1:8123".parse().unwrap());
//!     let client = HttpQueryClient::new("node1", &endpoint, &BTreeMap::new(), Duration::from_secs(5))
//!         .unwrap();
//!
//!     client.ping().await.unwrap();
//!     let result = client.execute("select 1").await.unwrap();
//!     assert_eq!(result.output, "1\n");
//! }
//! ```

mod http;
mod result;

pub use http::*;
pub use result::*;


use std::fmt;
use std::net::SocketAddr;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Result;

/// Address at which a started node's query interface is reachable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub addr: SocketAddr,
}

impl Endpoint {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait QueryClient: Send + Sync + 'static {
    /// Sends one statement and waits for the complete response.
    ///
    /// # Errors
    /// - [`crate::QueryError::Server`] when the server rejects the statement
    /// - [`crate::QueryError::Transport`] when no response could be obtained
    /// - [`crate::Error::Timeout`] when the response misses the query deadline
    async fn execute(
        &self,
        statement: &str,
    ) -> Result<QueryResult>;

    /// Readiness probe; succeeds once the server accepts queries.
    async fn ping(&self) -> Result<()>;
}
