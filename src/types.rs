use serde::Serialize;

use crate::error::FailureKind;

/// Result of running the probe stages against one candidate.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "outcome", content = "address", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// No host could be derived from the address.
    Unparseable,
    Unreachable,
    PortClosed,
    StreamInvalid,
    /// All stages passed. Carries the candidate address as configured.
    Confirmed(String),
}

impl ProbeOutcome {
    /// The failure category, or `None` for a confirmed candidate.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ProbeOutcome::Unparseable => Some(FailureKind::AddressUnparseable),
            ProbeOutcome::Unreachable | ProbeOutcome::PortClosed => {
                Some(FailureKind::NetworkUnreachable)
            }
            ProbeOutcome::StreamInvalid => Some(FailureKind::StreamUnconfirmed),
            ProbeOutcome::Confirmed(_) => None,
        }
    }
}

/// Probe stage names reported to the progress sink.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parse,
    Reachability,
    Port,
    Stream,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Parse => "parse",
            Stage::Reachability => "reachability",
            Stage::Port => "port",
            Stage::Stream => "stream",
        };
        f.pad(name)
    }
}

/// One finished stage for one candidate.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StageProgress {
    /// Zero-based position of the candidate in the list.
    pub index: usize,
    pub total: usize,
    pub address: String,
    pub stage: Stage,
    pub passed: bool,
}

/// Terminal result of a scan run.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "result", content = "address", rename_all = "snake_case")]
pub enum ScanOutcome {
    Found(String),
    NotFound,
    Cancelled,
}

impl ScanOutcome {
    /// The address to hand to the player, if any.
    pub fn confirmed(&self) -> Option<&str> {
        match self {
            ScanOutcome::Found(addr) => Some(addr),
            _ => None,
        }
    }
}

/// Events delivered from the scan worker to the presentation side.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ScanEvent {
    Started { total: usize },
    Progress(StageProgress),
    Finished(ScanOutcome),
}

/// One candidate that was examined during a run.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CandidateAttempt {
    pub address: String,
    pub outcome: ProbeOutcome,
}

/// Summary of a completed run, suitable for writing out as JSON.
#[derive(Serialize, Debug, Clone)]
pub struct ScanReport {
    pub outcome: ScanOutcome,
    pub total: usize,
    pub attempts: Vec<CandidateAttempt>,
    pub started_at: String,
    pub finished_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kinds_cover_every_rejection() {
        assert_eq!(
            ProbeOutcome::Unparseable.failure_kind(),
            Some(FailureKind::AddressUnparseable)
        );
        assert_eq!(
            ProbeOutcome::PortClosed.failure_kind(),
            Some(FailureKind::NetworkUnreachable)
        );
        assert_eq!(
            ProbeOutcome::StreamInvalid.failure_kind(),
            Some(FailureKind::StreamUnconfirmed)
        );
        assert_eq!(ProbeOutcome::Confirmed("rtsp://a/s".into()).failure_kind(), None);
    }

    #[test]
    fn events_serialize_with_tags() {
        let ev = ScanEvent::Finished(ScanOutcome::Found("rtsp://10.0.0.9:554/s".into()));
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "finished");
        assert_eq!(json["data"]["result"], "found");
        assert_eq!(json["data"]["address"], "rtsp://10.0.0.9:554/s");

        let ev = ScanEvent::Progress(StageProgress {
            index: 0,
            total: 2,
            address: "rtsp://10.0.0.5:554/s".into(),
            stage: Stage::Reachability,
            passed: false,
        });
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["data"]["stage"], "reachability");
    }
}
