use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use tracing::trace;

use super::Endpoint;
use super::QueryClient;
use super::QueryResult;
use crate::Error;
use crate::QueryError;
use crate::Result;

/// Header carrying the numeric server exception code on failed queries
const EXCEPTION_CODE_HEADER: &str = "X-ClickHouse-Exception-Code";
/// Body returned by `/ping` once the server accepts queries
const PING_OK: &str = "Ok.";

/// Talks to one node through its HTTP query interface
///
/// Statements are POSTed as the request body; node settings travel as URL
/// query parameters so every statement runs with them.
#[derive(Debug, Clone)]
pub struct HttpQueryClient {
    node: String,
    base_url: String,
    settings: Vec<(String, String)>,
    timeout: Duration,
    http: reqwest::Client,
}

impl HttpQueryClient {
    pub fn new(
        node: &str,
        endpoint: &Endpoint,
        settings: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            QueryError::Transport {
                node: node.to_string(),
                source: e,
            }
        })?;

        Ok(Self {
            node: node.to_string(),
            base_url: endpoint.base_url(),
            settings: settings.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            timeout,
            http,
        })
    }

    fn transport_error(
        &self,
        operation: &'static str,
        e: reqwest::Error,
    ) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                node: self.node.clone(),
                operation,
                duration: self.timeout,
            }
        } else {
            QueryError::Transport {
                node: self.node.clone(),
                source: e,
            }
            .into()
        }
    }
}

#[async_trait]
impl QueryClient for HttpQueryClient {
    async fn execute(
        &self,
        statement: &str,
    ) -> Result<QueryResult> {
        trace!(node = %self.node, %statement, "sending statement");

        let response = self
            .http
            .post(&self.base_url)
            .query(&self.settings)
            .body(statement.to_string())
            .send()
            .await
            .map_err(|e| self.transport_error("query", e))?;

        let status = response.status();
        let code = response
            .headers()
            .get(EXCEPTION_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i32>().ok());
        let body = response.text().await.map_err(|e| self.transport_error("query", e))?;

        if !status.is_success() {
            debug!(node = %self.node, status = status.as_u16(), ?code, "statement rejected");
            return Err(QueryError::Server {
                node: self.node.clone(),
                statement: statement.to_string(),
                status: status.as_u16(),
                code,
                message: body.trim().to_string(),
            }
            .into());
        }

        Ok(QueryResult::new(body, status.as_u16()))
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}ping", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error("ping", e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error("ping", e))?;
        if status.is_success() && body.trim() == PING_OK {
            Ok(())
        } else {
            Err(QueryError::Server {
                node: self.node.clone(),
                statement: "GET /ping".to_string(),
                status: status.as_u16(),
                code: None,
                message: body.trim().to_string(),
            }
            .into())
        }
    }
}
