//! External device notification
//!
//! A confirmation bumps a running counter and hands its decimal string to a
//! worker thread that owns the [`NotificationPort`]. The debouncer never waits
//! on the port: jobs are queued with `try_send`, and send failures are logged
//! and dropped without retry.

use crate::config::NotificationConfig;
use crossbeam_channel::{bounded, Sender, TrySendError};
use std::thread::JoinHandle;

/// Queue depth between the debouncer and the notification worker
const NOTIFY_QUEUE_DEPTH: usize = 16;

/// Errors a notification port can report
#[derive(Debug, Clone, thiserror::Error)]
pub enum NotifyError {
    /// The device could not be reached
    #[error("Device {address} unavailable: {reason}")]
    DeviceUnavailable { address: String, reason: String },

    /// The device exposes nothing that accepts writes
    #[error("No write characteristic found")]
    NoWritableCharacteristic,
}

/// Outbound link to the external device
///
/// Implementations may block; they run on the notification worker thread.
pub trait NotificationPort: Send {
    /// Deliver one payload to the device
    fn send(&mut self, payload: &str) -> Result<(), NotifyError>;
}

/// Dry-run port that only logs the payload
pub struct LogNotificationPort {
    device_address: String,
}

impl LogNotificationPort {
    /// Creates a port addressed to `device_address`
    pub fn new(device_address: impl Into<String>) -> Self {
        Self {
            device_address: device_address.into(),
        }
    }
}

/// Returns whether `address` looks like `AA:BB:CC:DD:EE:FF`
fn is_device_address(address: &str) -> bool {
    let parts: Vec<&str> = address.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

impl NotificationPort for LogNotificationPort {
    fn send(&mut self, payload: &str) -> Result<(), NotifyError> {
        if !is_device_address(&self.device_address) {
            return Err(NotifyError::DeviceUnavailable {
                address: self.device_address.clone(),
                reason: "malformed device address".to_string(),
            });
        }
        tracing::info!(
            device = %self.device_address,
            payload,
            "Notification sent (dry run)"
        );
        Ok(())
    }
}

/// Fire-and-forget notifier with a strictly increasing counter
pub struct Notifier {
    value: u64,
    increment: u64,
    sender: Option<Sender<String>>,
    worker: Option<JoinHandle<()>>,
}

impl Notifier {
    /// Spawn the worker thread that owns `port`
    pub fn spawn<P>(port: P, initial_value: u64, increment: u64) -> std::io::Result<Self>
    where
        P: NotificationPort + 'static,
    {
        let (sender, receiver) = bounded::<String>(NOTIFY_QUEUE_DEPTH);
        let mut port = port;

        let worker = std::thread::Builder::new()
            .name("notifier".to_string())
            .spawn(move || {
                for payload in receiver {
                    match port.send(&payload) {
                        Ok(()) => tracing::info!("Notification delivered: {}", payload),
                        Err(e) => tracing::warn!("Notification {} failed: {}", payload, e),
                    }
                }
                tracing::debug!("Notification worker exiting");
            })?;

        Ok(Self {
            value: initial_value,
            increment: increment.max(1),
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Spawn with the configured counter start and step
    pub fn from_config<P>(port: P, config: &NotificationConfig) -> std::io::Result<Self>
    where
        P: NotificationPort + 'static,
    {
        Self::spawn(port, config.initial_value, config.increment)
    }

    /// Current counter value
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Send the current value without advancing the counter
    pub fn announce(&self) {
        tracing::info!("Announcing initial notification value {}", self.value);
        self.dispatch(self.value);
    }

    /// Advance the counter and queue its new value; returns the value
    pub fn notify(&mut self) -> u64 {
        self.value = self.value.saturating_add(self.increment);
        tracing::info!("Notification value: {}", self.value);
        self.dispatch(self.value);
        self.value
    }

    fn dispatch(&self, value: u64) {
        let Some(sender) = &self.sender else {
            tracing::warn!("Notifier already shut down, dropping {}", value);
            return;
        };

        match sender.try_send(value.to_string()) {
            Ok(()) => {}
            Err(TrySendError::Full(payload)) => {
                tracing::warn!("Notification queue full, dropping {}", payload)
            }
            Err(TrySendError::Disconnected(payload)) => {
                tracing::warn!("Notification worker gone, dropping {}", payload)
            }
        }
    }

    /// Deliver queued notifications and stop the worker
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Notification worker panicked");
            }
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.shutdown();
    }
}
