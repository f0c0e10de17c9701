use serde::Serialize;
use thiserror::Error;

/// Contract violations surfaced to the caller of a scan session.
///
/// Per-candidate probe failures never show up here; they are folded into
/// [`crate::types::ProbeOutcome`] by the probers themselves.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("a scan is already running on this session")]
    AlreadyScanning,

    #[error("scan worker failed: {reason}")]
    WorkerFailed { reason: String },
}

/// Why a candidate was abandoned.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The address has no extractable host.
    AddressUnparseable,
    /// The host did not answer the liveness check or the port refused us.
    NetworkUnreachable,
    /// The transport opened but no frame was decoded.
    StreamUnconfirmed,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::AddressUnparseable => write!(f, "address unparseable"),
            FailureKind::NetworkUnreachable => write!(f, "network unreachable"),
            FailureKind::StreamUnconfirmed => write!(f, "stream unconfirmed"),
        }
    }
}
