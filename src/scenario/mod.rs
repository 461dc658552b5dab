//! Mixed-version distributed aggregation check.
//!
//! Every data node gets the same single-column `String` table with a
//! different number of rows; the coordinator then groups across all of them
//! through `remote()`. Small and large inputs take different aggregation paths
//! on the data nodes, and the coordinator has to merge the partial states
//! produced by older builds. The merged text must match exactly.


use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::AssertionFailure;
use crate::Error;
use crate::Result;
use crate::RunningCluster;
use crate::ScenarioConfig;

/// Outcome of a passing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub coordinator: String,
    pub data_nodes: Vec<String>,
    pub rows: usize,
    pub output: String,
}

pub struct CompatibilityScenario {
    config: ScenarioConfig,
}

impl CompatibilityScenario {
    /// # Errors
    /// Configuration errors from [`ScenarioConfig::validate`]
    pub fn new(config: ScenarioConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn create_statement(&self) -> String {
        format!(
            "create table {} (s String) engine = MergeTree order by s",
            self.config.table
        )
    }

    pub fn insert_statement(
        &self,
        rows: u64,
    ) -> String {
        format!(
            "insert into {} select number from numbers({})",
            self.config.table, rows
        )
    }

    pub fn distributed_statement(&self) -> String {
        let hosts: Vec<&str> = self.config.loads.iter().map(|l| l.node.as_str()).collect();
        format!(
            "select s, count() from remote('{}', {}, {}) group by s order by toUInt64(s) limit {}",
            hosts.join(","),
            self.config.database,
            self.config.table,
            self.config.limit
        )
    }

    pub fn drop_statement(&self) -> String {
        format!("drop table {}", self.config.table)
    }

    /// `"{i}\t{count}\n"` for every key below the limit, ascending.
    ///
    /// Every data node holds the whole key range, so each key is counted once
    /// per data node.
    pub fn expected_output(&self) -> String {
        let count = self.config.loads.len();
        (0..self.config.limit).map(|key| format!("{key}\t{count}\n")).collect()
    }

    /// Runs schema setup, data load, distributed query and assertion, then drops
    /// the table wherever it was created, whatever the outcome.
    ///
    /// # Errors
    /// The first failing step: [`Error::Schema`], a query error, or
    /// [`Error::Assertion`]. Cleanup failures are only logged.
    pub async fn run(
        &self,
        cluster: &RunningCluster,
    ) -> Result<ScenarioReport> {
        self.check_participants(cluster)?;

        let mut created = Vec::new();
        let result = self.execute(cluster, &mut created).await;
        self.cleanup(cluster, &created).await;

        match &result {
            Ok(report) => info!(rows = report.rows, coordinator = %report.coordinator, "scenario passed"),
            Err(e) => warn!("scenario failed: {}", e),
        }
        result
    }

    fn check_participants(
        &self,
        cluster: &RunningCluster,
    ) -> Result<()> {
        cluster.node(&self.config.coordinator)?;
        for load in &self.config.loads {
            cluster.node(&load.node)?;
        }
        Ok(())
    }

    async fn execute<'a>(
        &'a self,
        cluster: &RunningCluster,
        created: &mut Vec<&'a str>,
    ) -> Result<ScenarioReport> {
        // 1. Identical schema everywhere
        let create = self.create_statement();
        for load in &self.config.loads {
            let node = cluster.node(&load.node)?;
            node.query(&create).await.map_err(|e| Error::Schema {
                node: load.node.clone(),
                statement: create.clone(),
                source: Box::new(e),
            })?;
            created.push(load.node.as_str());
        }
        debug!(nodes = created.len(), table = %self.config.table, "schema ready");

        // 2. Asymmetric volumes
        for load in &self.config.loads {
            let insert = self.insert_statement(load.rows);
            cluster.node(&load.node)?.query(&insert).await?;
            info!(node = %load.node, rows = load.rows, "data loaded");
        }

        // 3. Fan out from the coordinator
        let statement = self.distributed_statement();
        let coordinator = cluster.node(&self.config.coordinator)?;
        let result = coordinator.query(&statement).await?;
        debug!(node = %self.config.coordinator, output = %result.output, "distributed result");

        // 4. Exact text comparison
        let expected = self.expected_output();
        if result.output != expected {
            return Err(AssertionFailure::new(
                self.config.coordinator.clone(),
                statement,
                expected,
                result.output,
            )
            .into());
        }

        Ok(ScenarioReport {
            coordinator: self.config.coordinator.clone(),
            data_nodes: created.iter().map(|n| n.to_string()).collect(),
            rows: result.row_count(),
            output: result.output,
        })
    }

    async fn cleanup(
        &self,
        cluster: &RunningCluster,
        created: &[&str],
    ) {
        let drop = self.drop_statement();
        for name in created {
            let outcome = match cluster.node(name) {
                Ok(node) => node.query(&drop).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                warn!(node = %name, table = %self.config.table, "cleanup failed: {}", e);
            }
        }
    }
}
