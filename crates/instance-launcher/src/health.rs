//! Process-wide launcher status.
//!
//! The control loop is the only writer (`HealthPublisher`); the status
//! server and anything else that wants to observe progress hold a
//! `HealthView`. Both sides share a `tokio::sync::watch` channel, so a
//! reader always gets a complete snapshot of the last published state.

use serde::{Serialize, Serializer};
use tokio::sync::watch;

use crate::client::LaunchResult;

/// Observable launcher state.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthState {
    /// Process is up, loop not yet started.
    Starting,
    /// Loop is polling.
    Running,
    /// Last fetch or launch failed; the loop will retry.
    Error(String),
    /// An instance was launched; the loop has stopped.
    InstanceLaunched(LaunchResult),
}

impl HealthState {
    /// Value of the `status` field on the wire.
    pub fn status(&self) -> &'static str {
        match self {
            HealthState::Starting => "starting",
            HealthState::Running => "running",
            HealthState::Error(_) => "error",
            HealthState::InstanceLaunched(_) => "instance launched",
        }
    }

    pub fn is_launched(&self) -> bool {
        matches!(self, HealthState::InstanceLaunched(_))
    }
}

/// Wire format: `{"status": ..., "result"?: ..., "error"?: ...}`.
#[derive(Serialize)]
struct HealthBody<'a> {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a LaunchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for HealthState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = HealthBody {
            status: self.status(),
            result: match self {
                HealthState::InstanceLaunched(result) => Some(result),
                _ => None,
            },
            error: match self {
                HealthState::Error(message) => Some(message.as_str()),
                _ => None,
            },
        };
        body.serialize(serializer)
    }
}

/// Create a publisher/view pair starting in `HealthState::Starting`.
pub fn health_channel() -> (HealthPublisher, HealthView) {
    let (tx, rx) = watch::channel(HealthState::Starting);
    (HealthPublisher { tx }, HealthView { rx })
}

/// Write side, owned by the control loop.
#[derive(Debug)]
pub struct HealthPublisher {
    tx: watch::Sender<HealthState>,
}

impl HealthPublisher {
    /// Replace the current state. Works with or without live readers.
    pub fn publish(&self, state: HealthState) {
        log::debug!("Health -> {}", state.status());
        self.tx.send_replace(state);
    }

    /// A new read handle on the same state.
    pub fn view(&self) -> HealthView {
        HealthView {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side, cheap to clone.
#[derive(Debug, Clone)]
pub struct HealthView {
    rx: watch::Receiver<HealthState>,
}

impl HealthView {
    /// Snapshot of the latest published state.
    pub fn current(&self) -> HealthState {
        self.rx.borrow().clone()
    }

    /// Wait until the state satisfies `f`, returning that state.
    ///
    /// Returns `None` if the publisher is dropped first.
    pub async fn wait_for(&mut self, f: impl FnMut(&HealthState) -> bool) -> Option<HealthState> {
        let state = self.rx.wait_for(f).await.ok()?;
        Some(state.clone())
    }
}
