//! Runs the real check against containers. Needs a container runtime and
//! network access to pull images:
//!
//! `cargo test --test integration_test docker_cluster -- --ignored`
use std::sync::Arc;

use compat_harness::ClusterLifecycle;
use compat_harness::CompatibilityScenario;
use compat_harness::DockerProvisioner;
use compat_harness::Error;
use compat_harness::HarnessConfig;

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_short_strings_against_real_servers() -> Result<(), Error> {
    crate::enable_logger();

    let config = HarnessConfig::new()?.validate()?;
    let topology = config.topology.build()?;
    let scenario = CompatibilityScenario::new(config.scenario.clone())?;
    let expected = scenario.expected_output();

    let provisioner = DockerProvisioner::new(config.provision.clone(), &config.query);
    let lifecycle = ClusterLifecycle::new(Arc::new(provisioner), config.provision);

    let report = lifecycle
        .scoped(&topology, move |cluster| {
            Box::pin(async move { scenario.run(cluster).await })
        })
        .await?;

    assert_eq!(report.output, expected);
    Ok(())
}
