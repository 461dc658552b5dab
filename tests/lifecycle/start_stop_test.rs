use std::sync::atomic::Ordering;
use std::sync::Arc;

use compat_harness::ClusterLifecycle;
use compat_harness::ClusterTopology;
use compat_harness::Error;
use compat_harness::NodeState;
use compat_harness::ProvisionError;
use compat_harness::VersionTag;

use crate::common::fast_provision_config;
use crate::common::Behaviour;
use crate::common::FakeProvisioner;
use crate::common::Fleet;

fn three_nodes() -> ClusterTopology {
    let mut topology = ClusterTopology::new();
    topology.add_node("node1", VersionTag::Pinned("23.3".into()), false).unwrap();
    topology.add_node("node2", VersionTag::Pinned("23.3".into()), false).unwrap();
    topology.add_node("node3", VersionTag::Current, false).unwrap();
    topology
}

#[tokio::test]
async fn test_cluster_start_and_shutdown() {
    crate::enable_logger();

    let provisioner = Arc::new(FakeProvisioner::new(Arc::new(Fleet::default())));
    let lifecycle = ClusterLifecycle::new(provisioner.clone(), fast_provision_config());

    let cluster = lifecycle.start(&three_nodes()).await.unwrap();
    assert_eq!(provisioner.running(), 3);
    for node in cluster.nodes() {
        assert_eq!(node.state(), NodeState::Ready);
        let result = node.query("select 1").await.unwrap();
        assert_eq!(result.output, "1\n");
    }

    let report = lifecycle.shutdown(cluster).await;
    assert!(report.is_clean());
    assert_eq!(provisioner.running(), 0);
    assert_eq!(provisioner.teardowns.load(Ordering::SeqCst), 1);
}

/// A node whose ping never passes fails the start; the other two are rolled back.
#[tokio::test]
async fn test_cluster_start_rolls_back_when_node_never_ready() {
    crate::enable_logger();

    let provisioner = Arc::new(FakeProvisioner::new(Arc::new(Fleet::default())).with_behaviour(
        "node3",
        Behaviour {
            never_ready: true,
            ..Default::default()
        },
    ));
    let lifecycle = ClusterLifecycle::new(provisioner.clone(), fast_provision_config());

    let result = lifecycle.start(&three_nodes()).await;

    match result {
        Err(Error::ClusterStart { node, source }) => {
            assert_eq!(node, "node3");
            assert!(matches!(*source, Error::Provision(ProvisionError::NotReady { .. })));
        }
        Err(e) => panic!("unexpected error: {e:?}"),
        Ok(_) => panic!("cluster should not start"),
    }
    assert_eq!(provisioner.running(), 0);
    for node in ["node1", "node2", "node3"] {
        assert_eq!(provisioner.stop_count(node), 1);
    }
}

#[tokio::test]
async fn test_cluster_start_fails_on_missing_image() {
    crate::enable_logger();

    let provisioner =
        Arc::new(FakeProvisioner::new(Arc::new(Fleet::default())).without_image("node1"));
    let lifecycle = ClusterLifecycle::new(provisioner.clone(), fast_provision_config());

    let result: Result<(), Error> = lifecycle
        .scoped(&three_nodes(), |_cluster| Box::pin(async { Ok(()) }))
        .await;

    assert!(matches!(
        result,
        Err(Error::ClusterStart { ref node, ref source })
            if node == "node1"
                && matches!(**source, Error::Provision(ProvisionError::ImageNotFound { .. }))
    ));
    assert_eq!(provisioner.running(), 0);
}
