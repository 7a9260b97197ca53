//! Spawns the external transcoder and streams its stdout: the encoder
//! is treated as opaque, driven only by input file/offset and output
//! format/bitrate.

use std::path::Path;
use std::time::Duration;

use axum::body::{Body, Bytes};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;

use super::choice::TranscodeSpec;

/// What to transcode and from where.
pub struct InputParameters<'a> {
    pub file_path: &'a Path,
    pub duration_ms: u64,
    /// Timestamp, in milliseconds, to start decoding from; `> 0`
    /// disables range support on the response, since a seek into the
    /// encoder's output no longer lines up with byte offsets in the file.
    pub offset_ms: u64,
}

fn build_command(transcoder_path: &Path, input: &InputParameters<'_>, spec: &TranscodeSpec) -> Command {
    let mut command = Command::new(transcoder_path);
    command.kill_on_drop(true);

    if input.offset_ms > 0 {
        command.arg("-ss").arg(format!("{:.3}", input.offset_ms as f64 / 1000.0));
    }
    command.arg("-i").arg(input.file_path);

    if spec.strip_metadata {
        command.arg("-map_metadata").arg("-1");
    }

    let codec = match spec.format {
        super::choice::OutputFormat::Mp3 => "libmp3lame",
        super::choice::OutputFormat::OggOpus | super::choice::OutputFormat::MatroskaOpus => "libopus",
        super::choice::OutputFormat::OggVorbis | super::choice::OutputFormat::WebmVorbis => "libvorbis",
    };
    let container = match spec.format {
        super::choice::OutputFormat::Mp3 => "mp3",
        super::choice::OutputFormat::OggOpus | super::choice::OutputFormat::OggVorbis => "ogg",
        super::choice::OutputFormat::MatroskaOpus => "matroska",
        super::choice::OutputFormat::WebmVorbis => "webm",
    };

    command
        .arg("-map").arg("0:a")
        .arg("-c:a").arg(codec)
        .arg("-b:a").arg(spec.bitrate.to_string())
        .arg("-f").arg(container)
        .arg("-vn")
        .arg("pipe:1")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null());

    command
}

/// Estimated `Content-Length` for a transcode: `bitrate / 8 * duration`,
/// an estimate rather than a guarantee since container overhead and
/// VBR variance aren't accounted for.
pub fn estimate_content_length(spec: &TranscodeSpec, duration_ms: u64) -> u64 {
    (spec.bitrate as u64 / 8) * (duration_ms / 1000)
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to spawn transcoder: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Spawns the transcoder and returns its stdout as a `Body`. The child
/// is killed if the body is dropped before being fully read
/// (`kill_on_drop`), and a reader that goes quiet for longer than
/// `inactivity_timeout` ends the stream rather than hanging forever.
pub fn spawn(
    transcoder_path: &Path,
    input: &InputParameters<'_>,
    spec: &TranscodeSpec,
    inactivity_timeout: Duration,
) -> Result<Body, Error> {
    let mut child: Child = build_command(transcoder_path, input, spec).spawn()?;
    let mut stdout = child.stdout.take().expect("piped stdout");

    let (tx, rx) = tokio::sync::mpsc::channel::<std::io::Result<Bytes>>(4);
    tokio::spawn(async move {
        let _child_guard = child;
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            match timeout(inactivity_timeout, stdout.read(&mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
                Err(_elapsed) => break,
            }
        }
    });

    Ok(Body::from_stream(ReceiverStream::new(rx)))
}
