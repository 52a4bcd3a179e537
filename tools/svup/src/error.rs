use std::{process::ExitStatus, time::Duration};

use thiserror::Error;

/// Failures of a bring up which an operator can act on, as opposed to transport or I/O errors
/// which are propagated as they are.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Datacenter '{0}' does not exist in vCenter, create it before running svup")]
    DatacenterNotFound(String),
    #[error(
        "ESX base image '{0}' is not in the vSphere Lifecycle Manager depot, sync or import it before running svup"
    )]
    BaseImageNotFound(String),
    #[error("{kind} '{name}' does not exist in vCenter")]
    NotFound { kind: &'static str, name: String },
    #[error("Timed out after {} minutes waiting for {what}", .timeout.as_secs() / 60)]
    Timeout { what: String, timeout: Duration },
    #[error("{what} failed: {detail}")]
    Failed { what: String, detail: String },
    #[error("{name} exited with {status}: {stderr}")]
    Subprocess {
        name: &'static str,
        status: ExitStatus,
        stderr: String,
    },
}

impl ProvisionError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        ProvisionError::NotFound {
            kind,
            name: name.into(),
        }
    }
}
