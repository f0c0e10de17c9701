//! Stream validation: open a candidate with the decode backend and require
//! one decoded video frame before calling it live.
//!
//! An endpoint that accepts TCP connections can still be a stale or wedged
//! service. Decoding a frame is the only check that rules that out.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time;

/// Protocol-level open-and-decode check.
#[async_trait]
pub trait StreamValidator: Send + Sync {
    /// Returns `true` iff the stream opens and yields a non-empty decoded frame
    /// within `timeout`. Backend errors are reported as `false`.
    async fn validate(&self, address: &str, timeout: Duration) -> bool;
}

/// How the RTSP session carries media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtspTransport {
    /// RTP interleaved on the control connection. Survives NAT and lossy tethers.
    Tcp,
    Udp,
}

impl RtspTransport {
    fn as_str(self) -> &'static str {
        match self {
            RtspTransport::Tcp => "tcp",
            RtspTransport::Udp => "udp",
        }
    }
}

/// A candidate address tuned for validation only.
///
/// The tuning lives next to the address instead of inside it, so the caller's
/// address is never rewritten and the player receives it untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunedSource<'a> {
    address: &'a str,
    transport: RtspTransport,
    open_timeout: Duration,
}

impl<'a> TunedSource<'a> {
    pub fn new(address: &'a str, open_timeout: Duration) -> Self {
        Self {
            address,
            transport: RtspTransport::Tcp,
            open_timeout,
        }
    }

    pub fn with_transport(mut self, transport: RtspTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn address(&self) -> &'a str {
        self.address
    }

    fn scheme(&self) -> String {
        self.address
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .unwrap_or_default()
    }

    fn is_rtsp(&self) -> bool {
        matches!(self.scheme().as_str(), "rtsp" | "rtsps")
    }

    /// Name of the I/O timeout option understood by the input protocol.
    ///
    /// `-timeout` is a socket timeout only for RTSP and HTTP; RTMP reads it as a
    /// listen timeout and switches to listen mode, so everything else gets the
    /// protocol-generic `-rw_timeout`.
    fn timeout_option(&self) -> &'static str {
        match self.scheme().as_str() {
            "rtsp" | "rtsps" | "http" | "https" => "-timeout",
            _ => "-rw_timeout",
        }
    }

    /// Decoder input options followed by `-i <address>`.
    pub fn input_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.is_rtsp() {
            args.push("-rtsp_transport".to_string());
            args.push(self.transport.as_str().to_string());
        }
        // Microseconds for both options.
        args.push(self.timeout_option().to_string());
        args.push(self.open_timeout.as_micros().to_string());
        args.push("-i".to_string());
        args.push(self.address.to_string());
        args
    }
}

/// Validates streams by asking `ffmpeg` for exactly one raw video frame on stdout.
#[derive(Debug, Clone)]
pub struct FfmpegValidator {
    ffmpeg: PathBuf,
    transport: RtspTransport,
}

impl Default for FfmpegValidator {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegValidator {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            transport: RtspTransport::Tcp,
        }
    }

    pub fn with_transport(mut self, transport: RtspTransport) -> Self {
        self.transport = transport;
        self
    }

    fn command(&self, source: &TunedSource<'_>) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-hide_banner")
            .arg("-nostdin")
            .arg("-loglevel")
            .arg("error")
            .args(source.input_args())
            .arg("-an")
            .arg("-frames:v")
            .arg("1")
            .arg("-f")
            .arg("rawvideo")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the future on timeout must not leave ffmpeg running.
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl StreamValidator for FfmpegValidator {
    async fn validate(&self, address: &str, timeout: Duration) -> bool {
        let source = TunedSource::new(address, timeout).with_transport(self.transport);
        let mut cmd = self.command(&source);

        let output = match time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(
                    "could not run decoder {}: {e}",
                    self.ffmpeg.display()
                );
                return false;
            }
            Err(_) => {
                tracing::debug!("no frame from {address} within {timeout:?}");
                return false;
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(
                "decoder exited with {} for {address}: {}",
                output.status,
                stderr.trim()
            );
            return false;
        }
        if output.stdout.is_empty() {
            tracing::debug!("decoder produced an empty frame for {address}");
            return false;
        }

        tracing::debug!("decoded {} byte frame from {address}", output.stdout.len());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuned_source_forces_tcp_and_timeout() {
        let addr = "rtsp://admin:pw@10.0.0.9:554/s";
        let src = TunedSource::new(addr, Duration::from_secs(2));
        let args = src.input_args();
        assert_eq!(
            args,
            vec!["-rtsp_transport", "tcp", "-timeout", "2000000", "-i", addr]
        );
        assert_eq!(src.address(), addr);
    }

    #[test]
    fn non_rtsp_sources_skip_transport_flag() {
        let src = TunedSource::new("http://cam.local/mjpeg", Duration::from_millis(1500));
        let args = src.input_args();
        assert!(!args.iter().any(|a| a == "-rtsp_transport"));
        assert!(args.contains(&"1500000".to_string()));
    }

    #[test]
    fn udp_transport_can_be_selected() {
        let src = TunedSource::new("RTSP://cam/s", Duration::from_secs(1))
            .with_transport(RtspTransport::Udp);
        assert_eq!(&src.input_args()[..2], &["-rtsp_transport", "udp"]);
    }

    #[test]
    fn rtmp_sources_use_rw_timeout() {
        let addr = "rtmp://10.0.0.9/live";
        let src = TunedSource::new(addr, Duration::from_secs(2));
        assert_eq!(
            src.input_args(),
            vec!["-rw_timeout", "2000000", "-i", addr]
        );
    }

    #[tokio::test]
    async fn decoder_exit_failure_is_a_failed_validation() {
        let v = FfmpegValidator::new("/bin/false");
        assert!(
            !v.validate("rtsp://127.0.0.1:1/s", Duration::from_secs(1))
                .await
        );
    }

    #[tokio::test]
    async fn decoder_success_without_frame_is_a_failed_validation() {
        // Exits 0 and writes nothing to stdout.
        let v = FfmpegValidator::new("/bin/true");
        assert!(
            !v.validate("rtsp://127.0.0.1:1/s", Duration::from_secs(1))
                .await
        );
    }

    #[tokio::test]
    async fn missing_decoder_is_a_failed_validation() {
        let v = FfmpegValidator::new("/nonexistent/ffmpeg-for-tests");
        assert!(
            !v.validate("rtsp://127.0.0.1:1/s", Duration::from_secs(1))
                .await
        );
    }
}
