use std::collections::HashMap;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::Endpoint;
use crate::Error;
use crate::MockProvisioner;
use crate::MockQueryClient;
use crate::ProvisionError;
use crate::QueryClient;
use crate::QueryResult;
use crate::Result;

/// What the mocks saw
#[derive(Default)]
pub struct Recorder {
    pub setups: AtomicUsize,
    pub teardowns: AtomicUsize,
    pub launches: Mutex<Vec<String>>,
    pub stops: Mutex<HashMap<String, usize>>,
    /// `(node, statement)` in issue order
    pub statements: Mutex<Vec<(String, String)>>,
}

impl Recorder {
    pub fn stop_count(
        &self,
        node: &str,
    ) -> usize {
        self.stops.lock().get(node).copied().unwrap_or(0)
    }

    pub fn statements_for(
        &self,
        node: &str,
    ) -> Vec<String> {
        self.statements
            .lock()
            .iter()
            .filter(|(n, _)| n == node)
            .map(|(_, s)| s.clone())
            .collect()
    }
}

/// Query client that is ready immediately and answers statements with `answer`.
pub fn scripted_client<F>(
    node: &str,
    recorder: Arc<Recorder>,
    answer: F,
) -> MockQueryClient
where
    F: Fn(&str) -> Result<QueryResult> + Send + Sync + 'static,
{
    let mut client = MockQueryClient::new();
    client.expect_ping().returning(|| Ok(()));

    let node = node.to_string();
    client.expect_execute().returning(move |statement| {
        recorder.statements.lock().push((node.clone(), statement.to_string()));
        answer(statement)
    });
    client
}

/// Ready client accepting every statement with empty output.
pub fn ready_client(
    node: &str,
    recorder: Arc<Recorder>,
) -> MockQueryClient {
    scripted_client(node, recorder, |_| Ok(QueryResult::new("", 200)))
}

/// Client whose readiness probe never passes.
pub fn never_ready_client() -> MockQueryClient {
    let mut client = MockQueryClient::new();
    client
        .expect_ping()
        .returning(|| Err(Error::Fatal("connection refused".to_string())));
    client.expect_execute().never();
    client
}

/// Builds a [`MockProvisioner`] serving a fixed set of nodes.
pub struct MockClusterBuilder {
    clients: HashMap<String, Arc<dyn QueryClient>>,
    failing_launch: HashSet<String>,
    failing_stop: HashSet<String>,
    failing_setup: bool,
    recorder: Arc<Recorder>,
}

impl MockClusterBuilder {
    pub fn new(recorder: Arc<Recorder>) -> Self {
        Self {
            clients: HashMap::new(),
            failing_launch: HashSet::new(),
            failing_stop: HashSet::new(),
            failing_setup: false,
            recorder,
        }
    }

    pub fn node(
        mut self,
        name: &str,
        client: MockQueryClient,
    ) -> Self {
        self.clients.insert(name.to_string(), Arc::new(client));
        self
    }

    pub fn fail_launch(
        mut self,
        name: &str,
    ) -> Self {
        self.failing_launch.insert(name.to_string());
        self
    }

    pub fn fail_stop(
        mut self,
        name: &str,
    ) -> Self {
        self.failing_stop.insert(name.to_string());
        self
    }

    pub fn fail_setup(mut self) -> Self {
        self.failing_setup = true;
        self
    }

    pub fn build(self) -> MockProvisioner {
        let mut provisioner = MockProvisioner::new();

        let recorder = self.recorder.clone();
        let failing_setup = self.failing_setup;
        provisioner.expect_setup().returning(move |_| {
            recorder.setups.fetch_add(1, Ordering::SeqCst);
            if failing_setup {
                return Err(Error::Fatal("network create failed".to_string()));
            }
            Ok(())
        });

        let recorder = self.recorder.clone();
        let failing_launch = self.failing_launch;
        let ports: HashMap<String, u16> = self
            .clients
            .keys()
            .enumerate()
            .map(|(i, name)| (name.clone(), 30100 + i as u16))
            .collect();
        provisioner.expect_launch().returning(move |spec| {
            recorder.launches.lock().push(spec.name.clone());
            if failing_launch.contains(&spec.name) {
                return Err(ProvisionError::ImageNotFound {
                    image: format!("test/server:{}", spec.version),
                    reason: "manifest unknown".to_string(),
                }
                .into());
            }
            let port = ports.get(&spec.name).copied().unwrap_or(30099);
            Ok(Endpoint::new(SocketAddr::from((Ipv4Addr::LOCALHOST, port))))
        });

        let clients = self.clients;
        provisioner.expect_connect().returning(move |spec, _| {
            clients
                .get(&spec.name)
                .cloned()
                .ok_or_else(|| Error::Fatal(format!("no client scripted for {}", spec.name)))
        });

        let recorder = self.recorder.clone();
        let failing_stop = self.failing_stop;
        provisioner.expect_terminate().returning(move |name| {
            *recorder.stops.lock().entry(name.to_string()).or_insert(0) += 1;
            if failing_stop.contains(name) {
                return Err(ProvisionError::CommandFailed {
                    command: format!("docker rm -f {name}"),
                    status: 1,
                    stderr: "daemon unavailable".to_string(),
                }
                .into());
            }
            Ok(())
        });

        let recorder = self.recorder;
        provisioner.expect_teardown().returning(move || {
            recorder.teardowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        provisioner
    }
}
