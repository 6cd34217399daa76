//! Poll-and-launch control loop.
//!
//! Each iteration fetches the availability catalog, picks the first region
//! with capacity for the configured instance type and launches one
//! instance there. Failures are logged, published as `HealthState::Error`
//! and retried after the error wait; they never end the loop. The first
//! successful launch ends it for good.
//!
//! ```text
//! Polling ──no capacity──▶ sleep(check_interval) ──▶ Polling
//!    │ capacity
//!    ▼
//! Launching ──ok──▶ Terminated
//!    │ failure (also from Polling)
//!    ▼
//! Errored ──sleep(error_wait)──▶ Polling
//! ```

use std::time::Duration;
use tokio::sync::watch;

use crate::client::{CapacityApi, LaunchRequest, LaunchResult};
use crate::config::LauncherConfig;
use crate::error::LauncherError;
use crate::health::{HealthPublisher, HealthState};

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Polling,
    Launching,
    Errored,
    Terminated,
}

/// Outcome of one iteration.
enum Step {
    NoCapacity,
    Failed {
        action: &'static str,
        error: LauncherError,
    },
    Launched(LaunchResult),
}

/// Drives a `CapacityApi` until one instance has been launched.
pub struct Launcher<C: CapacityApi> {
    api: C,
    instance_type: String,
    ssh_key: String,
    check_interval: Duration,
    error_wait: Duration,
    health: HealthPublisher,
    phase: Phase,
}

impl<C: CapacityApi> Launcher<C> {
    pub fn new(api: C, config: &LauncherConfig, health: HealthPublisher) -> Self {
        Self {
            api,
            instance_type: config.instance_type.clone(),
            ssh_key: config.ssh_key.clone(),
            check_interval: config.check_interval,
            error_wait: config.error_wait,
            health,
            phase: Phase::Polling,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn api(&self) -> &C {
        &self.api
    }

    /// Run until an instance is launched or `shutdown` fires.
    ///
    /// Returns the launch result, or `None` when stopped by shutdown. Only
    /// a sent value counts as shutdown; dropping every sender leaves the
    /// loop running. Once the loop has terminated, further calls return
    /// `None` without touching the provider.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<()>) -> Option<LaunchResult> {
        if self.phase == Phase::Terminated {
            log::warn!("Launcher already terminated, not polling again");
            return None;
        }

        log::info!(
            "Waiting for capacity: instance type {}, SSH key {}",
            self.instance_type,
            self.ssh_key
        );
        self.health.publish(HealthState::Running);

        loop {
            log::info!("========================================");

            let wait = match self.poll_once().await {
                Step::Launched(result) => {
                    self.phase = Phase::Terminated;
                    log::info!("Instance launch result: {}", result);
                    self.health.publish(HealthState::InstanceLaunched(result.clone()));
                    return Some(result);
                }
                Step::NoCapacity => {
                    log::info!(
                        "No available regions found for {}. Checking again in {} seconds.",
                        self.instance_type,
                        self.check_interval.as_secs()
                    );
                    self.health.publish(HealthState::Running);
                    self.check_interval
                }
                Step::Failed { action, error } => {
                    self.phase = Phase::Errored;
                    log::error!(
                        "Error {} ({}): {}. Retrying in {} seconds.",
                        action,
                        error.class(),
                        error,
                        self.error_wait.as_secs()
                    );
                    self.health.publish(HealthState::Error(error.to_string()));
                    self.error_wait
                }
            };

            tokio::select! {
                Ok(()) = shutdown.changed() => {
                    log::info!("Shutdown requested, launcher stopping");
                    return None;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// One Polling (and possibly Launching) pass.
    async fn poll_once(&mut self) -> Step {
        self.phase = Phase::Polling;
        log::info!(
            "Checking availability for instance type {}...",
            self.instance_type
        );

        let catalog = match self.api.fetch_availability().await {
            Ok(catalog) => catalog,
            Err(error) => {
                return Step::Failed {
                    action: "fetching instance types",
                    error,
                }
            }
        };

        let Some(region) = catalog.first_region(&self.instance_type) else {
            return Step::NoCapacity;
        };
        log::info!(
            "Instance type {} is available in region: {}",
            self.instance_type,
            region
        );

        self.phase = Phase::Launching;
        let request = LaunchRequest::new(region, &self.instance_type, &self.ssh_key);
        log::info!(
            "Launching instance {} in region {} with SSH key {}...",
            request.instance_type_name,
            request.region_name,
            self.ssh_key
        );

        match self.api.launch(&request).await {
            Ok(result) => Step::Launched(result),
            Err(error) => Step::Failed {
                action: "launching instance",
                error,
            },
        }
    }
}
