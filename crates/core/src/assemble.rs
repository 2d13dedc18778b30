//! Frame-sequence to video assembly via the external ffmpeg binary.
//!
//! Staged frames are named by [`frame_filename`] so the encoder input
//! pattern lines up without a rename pass. Assembly shells out through
//! `tokio::process`; probing the result uses `ffprobe` and is
//! informational only.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Error type for ffmpeg/ffprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("no frames to assemble in {0}")]
    NoFrames(PathBuf),

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("video file not found: {0}")]
    VideoNotFound(String),
}

/// Frame filename pattern handed to the encoder.
pub const FRAME_PATTERN: &str = "%05d.png";

/// Default H.264 constant-rate-factor quality.
pub const DEFAULT_CRF: u8 = 23;

/// Zero-padded frame filename for staging index `index` (zero-based).
pub fn frame_filename(index: usize) -> String {
    format!("{index:05}.png")
}

/// Encoder arguments for one assembly run.
///
/// H.264 in yuv420p for broad player compatibility, constant-rate-factor
/// quality, and `-loop 1` for seamless looping playback.
pub fn encode_args(frames_dir: &Path, output_path: &Path, fps: u32, crf: u8) -> Vec<String> {
    let input_pattern = frames_dir.join(FRAME_PATTERN);
    vec![
        "-y".to_string(),
        "-framerate".to_string(),
        fps.to_string(),
        "-i".to_string(),
        input_pattern.to_string_lossy().to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-crf".to_string(),
        crf.to_string(),
        "-preset".to_string(),
        "medium".to_string(),
        "-loop".to_string(),
        "1".to_string(),
        output_path.to_string_lossy().to_string(),
    ]
}

/// Assemble the staged frame sequence in `frames_dir` into an H.264 video.
///
/// Fails without invoking the encoder when the directory holds no PNG
/// frames. The output's parent directory is created as needed.
pub async fn assemble_video(
    frames_dir: &Path,
    output_path: &Path,
    fps: u32,
    crf: u8,
) -> Result<(), AssembleError> {
    let frames = count_png_frames(frames_dir).await?;
    if frames == 0 {
        return Err(AssembleError::NoFrames(frames_dir.to_path_buf()));
    }

    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let output = tokio::process::Command::new("ffmpeg")
        .args(encode_args(frames_dir, output_path, fps, crf))
        .output()
        .await
        .map_err(AssembleError::NotFound)?;

    if !output.status.success() {
        return Err(AssembleError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(())
}

async fn count_png_frames(dir: &Path) -> Result<usize, std::io::Error> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        if entry.path().extension().is_some_and(|ext| ext == "png") {
            count += 1;
        }
    }
    Ok(count)
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    /// e.g. "30/1" or "24000/1001"
    pub r_frame_rate: Option<String>,
    pub duration: Option<String>,
    pub nb_frames: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Probing
// ---------------------------------------------------------------------------

/// Run `ffprobe` on a video file and return the parsed JSON output.
pub async fn probe_video(path: &Path) -> Result<FfprobeOutput, AssembleError> {
    if !path.exists() {
        return Err(AssembleError::VideoNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await
        .map_err(AssembleError::NotFound)?;

    if !output.status.success() {
        return Err(AssembleError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| AssembleError::ParseError(format!("{e}: {stdout}")))
}

fn first_video_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// Parse the video duration in seconds from ffprobe output.
pub fn parse_duration(probe: &FfprobeOutput) -> f64 {
    if let Some(d) = &probe.format.duration {
        if let Ok(secs) = d.parse::<f64>() {
            return secs;
        }
    }
    if let Some(stream) = first_video_stream(probe) {
        if let Some(d) = &stream.duration {
            if let Ok(secs) = d.parse::<f64>() {
                return secs;
            }
        }
    }
    0.0
}

/// Parse the video framerate from ffprobe output.
///
/// The `r_frame_rate` field is a fraction like `"30/1"` or `"24000/1001"`.
pub fn parse_framerate(probe: &FfprobeOutput) -> f64 {
    first_video_stream(probe)
        .and_then(|s| s.r_frame_rate.as_deref())
        .map(parse_fraction)
        .unwrap_or(0.0)
}

fn parse_fraction(s: &str) -> f64 {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() == 2 {
        let num = parts[0].parse::<f64>().unwrap_or(0.0);
        let den = parts[1].parse::<f64>().unwrap_or(1.0);
        if den > 0.0 {
            return num / den;
        }
    }
    s.parse::<f64>().unwrap_or(0.0)
}

/// Count total frames from ffprobe output, estimating from duration and
/// framerate when `nb_frames` is absent.
pub fn parse_total_frames(probe: &FfprobeOutput) -> i64 {
    if let Some(stream) = first_video_stream(probe) {
        if let Some(nb) = &stream.nb_frames {
            if let Ok(n) = nb.parse::<i64>() {
                return n;
            }
        }
    }
    let duration = parse_duration(probe);
    let fps = parse_framerate(probe);
    if duration > 0.0 && fps > 0.0 {
        return (duration * fps).round() as i64;
    }
    0
}
