//! Control path: status monitoring and provisioning.

pub mod monitor;
pub mod provision;

pub use monitor::{LinkStatusMonitor, MonitorStats};
pub use provision::{Credentials, ProvisioningSequencer};
