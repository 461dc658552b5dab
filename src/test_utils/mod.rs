//! Shared fixtures for unit tests: a scriptable provisioner and query clients
//! built on the [mockall] mocks of [`crate::Provisioner`] and
//! [`crate::QueryClient`].
//!
//! No container runtime and no network is involved. Every launch, stop and
//! statement is recorded in a [`Recorder`] so tests can assert on teardown
//! counts and statement order.
mod mock_builder;

pub use mock_builder::*;

use crate::BackoffPolicy;
use crate::ProvisionConfig;

/// Readiness settings small enough for unit tests
pub fn fast_provision_config() -> ProvisionConfig {
    ProvisionConfig {
        startup_timeout_ms: 300,
        readiness: BackoffPolicy {
            max_retries: 0,
            timeout_ms: 50,
            base_delay_ms: 5,
            max_delay_ms: 20,
        },
        ..Default::default()
    }
}
