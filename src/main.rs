use std::sync::Arc;

use compat_harness::ClusterLifecycle;
use compat_harness::CompatibilityScenario;
use compat_harness::DockerProvisioner;
use compat_harness::Error;
use compat_harness::HarnessConfig;
use compat_harness::LogConfig;
use compat_harness::Result;
use compat_harness::ScenarioReport;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = HarnessConfig::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(&settings.log)?;

    match run(settings).await {
        Ok(report) => {
            info!(
                coordinator = %report.coordinator,
                data_nodes = ?report.data_nodes,
                rows = report.rows,
                "compatibility check passed"
            );
            println!(
                "OK: {} rows merged on {} from {:?}",
                report.rows, report.coordinator, report.data_nodes
            );
            Ok(())
        }
        Err(e) => {
            error!("compatibility check failed: {}", e);
            if let Error::Assertion(failure) = &e {
                eprintln!("expected:\n{}\nactual:\n{}", failure.expected, failure.actual);
            }
            Err(e)
        }
    }
}

async fn run(settings: HarnessConfig) -> Result<ScenarioReport> {
    let topology = settings.topology.build()?;
    let scenario = CompatibilityScenario::new(settings.scenario)?;

    let provisioner = DockerProvisioner::new(settings.provision.clone(), &settings.query);
    info!(run_id = provisioner.run_id(), nodes = topology.len(), "starting compatibility run");
    let lifecycle = ClusterLifecycle::new(Arc::new(provisioner), settings.provision);

    lifecycle
        .scoped(&topology, move |cluster| {
            Box::pin(async move {
                tokio::select! {
                    result = scenario.run(cluster) => result,
                    _ = tokio::signal::ctrl_c() => {
                        info!("Ctrl+C detected.");
                        Err(Error::Fatal("interrupted".to_string()))
                    }
                }
            })
        })
        .await
}

/// Logs to stderr, or to `<log_dir>/compat-harness.log` when a directory is configured.
///
/// `RUST_LOG` wins over the configured filter.
fn init_observability(log: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));

    match &log.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file = tracing_appender::rolling::never(dir, "compat-harness.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(filter());
            tracing_subscriber::registry().with(layer).init();
            Ok(Some(guard))
        }
        None => {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter());
            tracing_subscriber::registry().with(layer).init();
            Ok(None)
        }
    }
}
