//! Instance launcher
//!
//! Polls the Lambda Cloud instance-types endpoint until the configured
//! instance type has capacity in some region, launches exactly one instance
//! there, and stops. Progress is published as a `HealthState` that can be
//! served on `GET /health`.
//!
//! # Architecture
//!
//! ```text
//! main
//!   ├── Launcher (control loop task)
//!   │   ├── CapacityApi::fetch_availability() → AvailabilityCatalog
//!   │   ├── CapacityApi::launch(LaunchRequest) → LaunchResult
//!   │   └── HealthPublisher::publish(HealthState)
//!   └── health server (optional)
//!       └── GET /health → HealthView::current()
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod launcher;
pub mod logging;
pub mod server;

pub use client::{
    AvailabilityCatalog, CapacityApi, LambdaClient, LaunchRequest, LaunchResult, Region,
};
pub use config::{ConfigError, LauncherConfig};
pub use error::{ErrorClass, LauncherError};
pub use health::{health_channel, HealthPublisher, HealthState, HealthView};
pub use launcher::{Launcher, Phase};
pub use server::{health_router, run_health_server};
