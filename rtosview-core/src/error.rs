//! Error types for RTOS awareness.
//!
//! Every failure surfaced by a backend is an [`RtosError`]. Callers that only
//! care about the broad category can match on [`RtosError::kind`].

use std::collections::TryReserveError;

/// Convenience alias used throughout the crate.
pub type RtosResult<T> = Result<T, RtosError>;

/// Broad failure category of an [`RtosError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A remote memory access failed or returned unusable data.
    TargetRead,
    /// No binding or stacking strategy exists for the target model.
    UnsupportedTarget,
    /// Host-side allocation failed while building a result.
    AllocationFailure,
    /// A symbol the backend needs was never resolved.
    MissingSymbol,
}

#[derive(Debug, thiserror::Error)]
pub enum RtosError {
    #[error("failed to read {len} byte(s) at {address:#010x}: {reason}")]
    TargetRead { address: u64, len: usize, reason: String },

    #[error("failed to read register {register}: {reason}")]
    RegisterRead { register: String, reason: String },

    #[error("malformed {what}: {detail}")]
    Malformed { what: &'static str, detail: String },

    #[error("target model \"{model}\" is not supported by the {rtos} backend")]
    UnsupportedTarget { model: String, rtos: &'static str },

    #[error("failed to allocate room for {count} {what}")]
    Allocation {
        what: &'static str,
        count: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("symbol `{0}` is not resolved")]
    MissingSymbol(&'static str),
}

impl RtosError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TargetRead { .. } | Self::RegisterRead { .. } | Self::Malformed { .. } => {
                ErrorKind::TargetRead
            }
            Self::UnsupportedTarget { .. } => ErrorKind::UnsupportedTarget,
            Self::Allocation { .. } => ErrorKind::AllocationFailure,
            Self::MissingSymbol(_) => ErrorKind::MissingSymbol,
        }
    }

    /// Build a read error from any transport error.
    pub fn read(address: u64, len: usize, reason: impl std::fmt::Display) -> Self {
        Self::TargetRead { address, len, reason: reason.to_string() }
    }

    /// Build a register read error, naming the register.
    pub fn register(register: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::RegisterRead { register: register.into(), reason: reason.to_string() }
    }

    pub(crate) fn malformed(what: &'static str, detail: impl Into<String>) -> Self {
        Self::Malformed { what, detail: detail.into() }
    }
}
