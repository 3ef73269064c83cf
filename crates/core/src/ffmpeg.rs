//! FFmpeg command builder for the two conversion kinds.
//!
//! Turns a validated [`JobRequest`] into an [`Invocation`] (program plus
//! argument vector) and makes sure the job's output directory exists.
//! Output paths supplied by callers are confined under the configured base
//! directory; see [`sanitize_output_path`].

use std::net::IpAddr;
use std::path::{Component, Path, PathBuf};

use crate::error::CoreError;
use crate::params::{non_blank, JobRequest, SegmentRemuxParams, StreamIngestParams};

/// Default program name for the external tool.
pub const DEFAULT_FFMPEG_BIN: &str = "ffmpeg";

/// SRT receive options appended after the optional passphrase/stream id.
const SRT_TRANSPORT_OPTIONS: &str = "recvbuf=100000000&latency=4000&maxbw=8000000\
&reconnect=1&reconnect_delay=500&reconnect_max_delay=10000";

/// AES key length used whenever a passphrase is supplied.
const SRT_PBKEYLEN: u32 = 16;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where the builder writes and which binary it invokes.
#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    /// Program name or path of the ffmpeg binary.
    pub program: String,
    /// Every job's output directory lives under this path.
    pub output_base: PathBuf,
}

impl FfmpegConfig {
    pub fn new(program: impl Into<String>, output_base: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            output_base: output_base.into(),
        }
    }
}

/// An external-tool invocation: program name plus ordered arguments.
///
/// Immutable once built and free of job identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Render the invocation as a single shell-like line for logging.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Output of [`build`]: the invocation and the directory it writes into.
#[derive(Debug, Clone)]
pub struct PreparedCommand {
    pub invocation: Invocation,
    pub output_dir: PathBuf,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Validate `request`, create its output directory, and build the invocation.
///
/// Fails with [`CoreError::Validation`] before touching the filesystem when
/// the parameters are malformed, and with [`CoreError::Io`] when the output
/// directory cannot be created.
pub async fn build(
    request: &JobRequest,
    config: &FfmpegConfig,
) -> Result<PreparedCommand, CoreError> {
    request.validate()?;

    let prepared = match request {
        JobRequest::StreamIngest(p) => {
            let output_dir = resolve_output_dir(&config.output_base, &p.output_path);
            let args = srt_to_hls_args(&build_srt_url(p), &output_dir, &p.hls_name);
            PreparedCommand {
                invocation: Invocation::new(&config.program, args),
                output_dir,
            }
        }
        JobRequest::SegmentRemux(p) => {
            let output_dir = resolve_output_dir(&config.output_base, &p.output_path);
            let args = hls_to_mp4_args(p, &output_dir);
            PreparedCommand {
                invocation: Invocation::new(&config.program, args),
                output_dir,
            }
        }
    };

    tokio::fs::create_dir_all(&prepared.output_dir).await?;
    Ok(prepared)
}

/// Lexically normalise a caller-supplied relative path.
///
/// Root and prefix components are dropped so absolute input is treated as
/// relative, `.` is dropped, and `..` only pops segments the caller itself
/// supplied. A `..` with nothing left to pop is discarded, so the result
/// never climbs above its starting point.
pub fn sanitize_output_path(input: &str) -> PathBuf {
    let mut clean = PathBuf::new();
    for component in Path::new(input).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::ParentDir => {
                clean.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    clean
}

/// Join a sanitised caller path onto the configured base directory.
pub fn resolve_output_dir(base: &Path, output_path: &str) -> PathBuf {
    base.join(sanitize_output_path(output_path))
}

/// Build the SRT caller URL for a stream-ingest job.
///
/// The passphrase and stream id are included only when present and
/// non-blank, percent-encoded. IPv6 hosts are bracketed.
pub fn build_srt_url(params: &StreamIngestParams) -> String {
    let mut url = format!(
        "srt://{}:{}?mode=caller",
        srt_host(&params.srt_address),
        params.srt_port
    );

    if let Some(passphrase) = non_blank(params.passphrase.as_deref()) {
        url.push_str(&format!(
            "&passphrase={}&pbkeylen={SRT_PBKEYLEN}",
            urlencoding::encode(passphrase)
        ));
    }

    if let Some(stream_id) = non_blank(params.stream_id.as_deref()) {
        url.push_str(&format!("&streamid={}", urlencoding::encode(stream_id)));
    }

    url.push('&');
    url.push_str(SRT_TRANSPORT_OPTIONS);
    url
}

fn srt_host(address: &str) -> String {
    match address.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => format!("[{v6}]"),
        _ => address.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Argument templates
// ---------------------------------------------------------------------------

/// Arguments for SRT ingest to an HLS playlist with 6-second segments.
fn srt_to_hls_args(srt_url: &str, output_dir: &Path, hls_name: &str) -> Vec<String> {
    let segment_pattern = output_dir.join(format!("{hls_name}_segment_%03d.ts"));
    let playlist = output_dir.join(format!("{hls_name}.m3u8"));

    let mut args: Vec<String> = [
        "-nostdin",
        "-fflags",
        "+genpts+discardcorrupt+igndts+flush_packets",
        "-err_detect",
        "ignore_err",
        "-rw_timeout",
        "15000000",
        "-analyzeduration",
        "10M",
        "-probesize",
        "50M",
        "-i",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    args.push(srt_url.to_string());
    args.extend(
        [
            "-map",
            "0:v:0",
            "-map",
            "0:a",
            "-c:v",
            "libx264",
            "-preset",
            "medium",
            "-crf",
            "20",
            "-r",
            "50",
            "-g",
            "300",
            "-keyint_min",
            "300",
            "-sc_threshold",
            "0",
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "aac",
            "-ac",
            "2",
            "-b:a",
            "128k",
            "-dn",
            "-f",
            "hls",
            "-hls_time",
            "6",
            "-hls_list_size",
            "0",
            "-hls_flags",
            "independent_segments+append_list",
            "-hls_segment_filename",
        ]
        .map(String::from),
    );
    args.push(segment_pattern.to_string_lossy().into_owned());
    args.extend(["-movflags", "+faststart", "-y"].map(String::from));
    args.push(playlist.to_string_lossy().into_owned());
    args
}

/// Arguments for remuxing an HLS playlist into a fragmented MP4.
fn hls_to_mp4_args(params: &SegmentRemuxParams, output_dir: &Path) -> Vec<String> {
    let mp4_path = output_dir.join(format!("{}.mp4", params.mp4_name));

    let mut args: Vec<String> = [
        "-fflags",
        "+genpts+discardcorrupt",
        "-reconnect",
        "1",
        "-reconnect_streamed",
        "1",
        "-reconnect_delay_max",
        "2",
        "-i",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    args.push(params.hls_input_url.clone());
    args.extend(
        [
            "-map",
            "0:v:0",
            "-map",
            "0:a:0",
            "-c:v",
            "copy",
            "-c:a",
            "aac",
            "-b:a",
            "128k",
            "-profile:a",
            "aac_low",
            "-bsf:a",
            "aac_adtstoasc",
            "-movflags",
            "+faststart+frag_keyframe+empty_moov",
            "-y",
        ]
        .map(String::from),
    );
    args.push(mp4_path.to_string_lossy().into_owned());
    args
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
