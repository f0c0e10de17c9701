#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stream_autoconnect::port::PortProbe;
use stream_autoconnect::reachability::ReachabilityProbe;
use stream_autoconnect::scanner::{Probes, ScanConfig, Scanner};
use stream_autoconnect::types::{ScanEvent, Stage};
use stream_autoconnect::validator::StreamValidator;
use tokio_util::sync::CancellationToken;

/// Scripted network: everything is up unless listed otherwise. Records every probe call.
#[derive(Default)]
pub struct FakeNet {
    pub down_hosts: HashSet<String>,
    pub closed_hosts: HashSet<String>,
    pub live_streams: HashSet<String>,
    pub stage_delay: Option<Duration>,
    pub cancel_during_reachability: Option<CancellationToken>,
    pub cancel_during_stream: Option<CancellationToken>,
    pub calls: Mutex<Vec<(Stage, String)>>,
}

impl FakeNet {
    pub fn live(addrs: &[&str]) -> Self {
        Self {
            live_streams: addrs.iter().map(|a| a.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(Stage, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, stage: Stage) -> usize {
        self.calls().iter().filter(|(s, _)| *s == stage).count()
    }

    async fn pause(&self) {
        if let Some(d) = self.stage_delay {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl ReachabilityProbe for FakeNet {
    async fn probe(&self, host: &str, _timeout: Duration) -> bool {
        self.calls
            .lock()
            .unwrap()
            .push((Stage::Reachability, host.to_string()));
        self.pause().await;
        if let Some(token) = &self.cancel_during_reachability {
            token.cancel();
        }
        !self.down_hosts.contains(host)
    }
}

#[async_trait]
impl PortProbe for FakeNet {
    async fn probe(&self, host: &str, port: u16, _timeout: Duration) -> bool {
        self.calls
            .lock()
            .unwrap()
            .push((Stage::Port, format!("{host}:{port}")));
        self.pause().await;
        !self.closed_hosts.contains(host)
    }
}

#[async_trait]
impl StreamValidator for FakeNet {
    async fn validate(&self, address: &str, _timeout: Duration) -> bool {
        self.calls
            .lock()
            .unwrap()
            .push((Stage::Stream, address.to_string()));
        self.pause().await;
        if let Some(token) = &self.cancel_during_stream {
            token.cancel();
        }
        self.live_streams.contains(address)
    }
}

pub fn scanner_for(net: &Arc<FakeNet>) -> Scanner {
    Scanner::new(
        Probes {
            reachability: net.clone(),
            port: net.clone(),
            stream: net.clone(),
        },
        ScanConfig::default(),
    )
}

pub fn event_sink() -> (
    Arc<Mutex<Vec<ScanEvent>>>,
    impl Fn(ScanEvent) + Send + Sync,
) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let out = events.clone();
    (events, move |ev| out.lock().unwrap().push(ev))
}
