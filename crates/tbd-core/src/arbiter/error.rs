//! Error types for server arbitration

use thiserror::Error;

use crate::flash::FlashError;
use crate::server::ServerError;

use super::InstanceId;

/// Errors that can occur while acquiring or rebinding the shared resources
#[derive(Debug, Error)]
pub enum ArbiterError {
    /// Flash emulation could not be initialized for the first instance
    #[error("Flash emulation failed to start: {0}")]
    Flash(#[from] FlashError),

    /// The configuration server could not be started for the first instance
    #[error("Configuration server failed to start: {0}")]
    Server(#[from] ServerError),

    /// The instance was never acquired or has already been released
    #[error("Unknown module instance {0}")]
    UnknownInstance(InstanceId),
}

/// Result type for arbiter operations
pub type ArbiterResult<T> = Result<T, ArbiterError>;
