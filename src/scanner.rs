use crate::candidates::Candidate;
use crate::port::{PortProbe, TcpConnectProbe};
use crate::reachability::{IcmpProbe, ReachabilityProbe};
use crate::types::{
    CandidateAttempt, ProbeOutcome, ScanEvent, ScanOutcome, ScanReport, Stage, StageProgress,
};
use crate::validator::{FfmpegValidator, StreamValidator};
use ::time::{format_description::well_known, OffsetDateTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Per-stage time bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    pub reachability_timeout: Duration,
    pub connect_timeout: Duration,
    pub stream_timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            reachability_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(1),
            stream_timeout: Duration::from_secs(2),
        }
    }
}

/// The three probers a scan drives, in stage order.
#[derive(Clone)]
pub struct Probes {
    pub reachability: Arc<dyn ReachabilityProbe>,
    pub port: Arc<dyn PortProbe>,
    pub stream: Arc<dyn StreamValidator>,
}

impl Default for Probes {
    fn default() -> Self {
        Self {
            reachability: Arc::new(IcmpProbe),
            port: Arc::new(TcpConnectProbe),
            stream: Arc::new(FfmpegValidator::default()),
        }
    }
}

/// Consumer of scan events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ScanEvent);
}

impl ProgressSink for mpsc::UnboundedSender<ScanEvent> {
    fn emit(&self, event: ScanEvent) {
        // A receiver that went away just stops listening; the scan carries on.
        let _ = self.send(event);
    }
}

impl<F> ProgressSink for F
where
    F: Fn(ScanEvent) + Send + Sync,
{
    fn emit(&self, event: ScanEvent) {
        self(event)
    }
}

/// Lifecycle of one scan run. A run is created already scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanPhase {
    Scanning,
    Found,
    Exhausted,
    Cancelled,
}

struct ScanState {
    phase: ScanPhase,
    index: usize,
    attempts: Vec<CandidateAttempt>,
    result: Option<String>,
}

impl ScanState {
    fn new() -> Self {
        Self {
            phase: ScanPhase::Scanning,
            index: 0,
            attempts: Vec::new(),
            result: None,
        }
    }

    fn record(&mut self, candidate: &Candidate, outcome: ProbeOutcome) {
        if let ProbeOutcome::Confirmed(addr) = &outcome {
            self.result = Some(addr.clone());
            self.phase = ScanPhase::Found;
        }
        self.attempts.push(CandidateAttempt {
            address: candidate.address().to_string(),
            outcome,
        });
    }

    fn outcome(&self) -> ScanOutcome {
        match (self.phase, &self.result) {
            (ScanPhase::Found, Some(addr)) => ScanOutcome::Found(addr.clone()),
            (ScanPhase::Cancelled, _) => ScanOutcome::Cancelled,
            _ => ScanOutcome::NotFound,
        }
    }
}

/// Walks the candidate list in order, running reachability, port and stream
/// checks per candidate and stopping at the first confirmed stream.
#[derive(Clone, Default)]
pub struct Scanner {
    probes: Probes,
    config: ScanConfig,
}

impl Scanner {
    pub fn new(probes: Probes, config: ScanConfig) -> Self {
        Self { probes, config }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run one scan to completion or cancellation.
    ///
    /// - Emits `Started` first, one `Progress` per finished stage, and exactly one
    ///   `Finished` last.
    /// - Cancellation is observed before each candidate, between stages and after
    ///   each candidate. An in-flight probe is not interrupted; its own timeout
    ///   bounds how long cancellation takes.
    /// - Exhausting the list is a normal outcome (`NotFound`), not an error.
    pub async fn run(
        &self,
        candidates: &[Candidate],
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> ScanReport {
        let started_at = now_rfc3339();
        let total = candidates.len();
        let mut state = ScanState::new();

        tracing::info!("scanning {total} candidate(s)");
        sink.emit(ScanEvent::Started { total });

        for (index, candidate) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                state.phase = ScanPhase::Cancelled;
                break;
            }
            state.index = index;

            let Some(outcome) = self.probe_candidate(index, total, candidate, cancel, sink).await
            else {
                state.phase = ScanPhase::Cancelled;
                break;
            };
            tracing::debug!("[{}/{total}] {candidate}: {outcome:?}", index + 1);
            state.record(candidate, outcome);

            if cancel.is_cancelled() {
                state.phase = ScanPhase::Cancelled;
                break;
            }
            if state.phase == ScanPhase::Found {
                break;
            }
        }

        if state.phase == ScanPhase::Scanning {
            state.phase = ScanPhase::Exhausted;
        }

        let outcome = state.outcome();
        match &outcome {
            ScanOutcome::Found(addr) => tracing::info!("stream confirmed at {addr}"),
            ScanOutcome::NotFound => tracing::info!("no stream found among {total} candidate(s)"),
            ScanOutcome::Cancelled => tracing::info!(
                "scan cancelled at candidate {} of {total}",
                state.index + 1
            ),
        }
        sink.emit(ScanEvent::Finished(outcome.clone()));

        ScanReport {
            outcome,
            total,
            attempts: state.attempts,
            started_at,
            finished_at: now_rfc3339(),
        }
    }

    /// Run the stage sequence for one candidate. `None` means cancellation was
    /// observed between stages.
    async fn probe_candidate(
        &self,
        index: usize,
        total: usize,
        candidate: &Candidate,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Option<ProbeOutcome> {
        let report = |stage: Stage, passed: bool| {
            sink.emit(ScanEvent::Progress(StageProgress {
                index,
                total,
                address: candidate.address().to_string(),
                stage,
                passed,
            }));
        };

        let Some((host, port)) = candidate.target() else {
            report(Stage::Parse, false);
            return Some(ProbeOutcome::Unparseable);
        };

        let reachable = self
            .probes
            .reachability
            .probe(host, self.config.reachability_timeout)
            .await;
        report(Stage::Reachability, reachable);
        if !reachable {
            return Some(ProbeOutcome::Unreachable);
        }
        if cancel.is_cancelled() {
            return None;
        }

        let open = self
            .probes
            .port
            .probe(host, port, self.config.connect_timeout)
            .await;
        report(Stage::Port, open);
        if !open {
            return Some(ProbeOutcome::PortClosed);
        }
        if cancel.is_cancelled() {
            return None;
        }

        let live = self
            .probes
            .stream
            .validate(candidate.address(), self.config.stream_timeout)
            .await;
        report(Stage::Stream, live);
        if !live {
            return Some(ProbeOutcome::StreamInvalid);
        }
        Some(ProbeOutcome::Confirmed(candidate.address().to_string()))
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
