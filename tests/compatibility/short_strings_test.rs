use std::sync::Arc;

use compat_harness::ClusterLifecycle;
use compat_harness::CompatibilityScenario;
use compat_harness::DataLoad;
use compat_harness::Error;
use compat_harness::HarnessConfig;
use compat_harness::ScenarioConfig;

use crate::common::fast_provision_config;
use crate::common::FakeProvisioner;
use crate::common::Fleet;

/// Case 1: default topology, 50 rows on node1 and 1,000,000 on node2, merged on node3
#[tokio::test]
async fn test_short_strings_aggregation_case1() -> Result<(), Error> {
    crate::enable_logger();

    let config = HarnessConfig::default().validate()?;
    let topology = config.topology.build()?;
    let scenario = CompatibilityScenario::new(config.scenario)?;

    let fleet = Arc::new(Fleet::default());
    let provisioner = Arc::new(FakeProvisioner::new(fleet.clone()));
    let lifecycle = ClusterLifecycle::new(provisioner.clone(), fast_provision_config());

    let report = lifecycle
        .scoped(&topology, move |cluster| {
            Box::pin(async move { scenario.run(cluster).await })
        })
        .await?;

    let expected: String = (0..50).map(|i| format!("{i}\t2\n")).collect();
    assert_eq!(report.output, expected);
    assert_eq!(report.rows, 50);
    assert_eq!(report.coordinator, "node3");

    // Tables dropped, every node stopped, nothing left running
    assert_eq!(fleet.table_count(), 0);
    for node in ["node1", "node2", "node3"] {
        assert_eq!(provisioner.stop_count(node), 1);
    }
    assert_eq!(provisioner.running(), 0);
    assert_eq!(
        fleet.settings_seen_by("node1").get("allow_experimental_analyzer").map(String::as_str),
        Some("0")
    );
    Ok(())
}

/// Case 2: a third data node and a smaller limit
#[tokio::test]
async fn test_short_strings_aggregation_case2() -> Result<(), Error> {
    crate::enable_logger();

    let mut config = HarnessConfig::default();
    let mut extra = config.topology.nodes[0].clone();
    extra.name = "node4".to_string();
    config.topology.nodes.push(extra);
    config.scenario = ScenarioConfig {
        limit: 10,
        loads: vec![
            DataLoad::new("node1", 10),
            DataLoad::new("node2", 100_000),
            DataLoad::new("node4", 25),
        ],
        ..Default::default()
    };
    let config = config.validate()?;
    let topology = config.topology.build()?;
    let scenario = CompatibilityScenario::new(config.scenario)?;

    let fleet = Arc::new(Fleet::default());
    let lifecycle =
        ClusterLifecycle::new(Arc::new(FakeProvisioner::new(fleet.clone())), fast_provision_config());

    let report = lifecycle
        .scoped(&topology, move |cluster| {
            Box::pin(async move { scenario.run(cluster).await })
        })
        .await?;

    let expected: String = (0..10).map(|i| format!("{i}\t3\n")).collect();
    assert_eq!(report.output, expected);
    assert_eq!(report.data_nodes, vec!["node1", "node2", "node4"]);
    Ok(())
}

/// Case 3: the scenario runs twice against the same cluster with the same result
#[tokio::test]
async fn test_short_strings_rerun_case3() -> Result<(), Error> {
    crate::enable_logger();

    let config = HarnessConfig::default();
    let topology = config.topology.build()?;
    let scenario = CompatibilityScenario::new(config.scenario)?;

    let fleet = Arc::new(Fleet::default());
    let lifecycle =
        ClusterLifecycle::new(Arc::new(FakeProvisioner::new(fleet.clone())), fast_provision_config());

    let (first, second) = lifecycle
        .scoped(&topology, move |cluster| {
            Box::pin(async move {
                let first = scenario.run(cluster).await?;
                let second = scenario.run(cluster).await?;
                Ok((first, second))
            })
        })
        .await?;

    assert_eq!(first, second);
    assert_eq!(fleet.table_count(), 0);
    Ok(())
}
