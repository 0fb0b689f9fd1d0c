//! FFprobe-backed media probing.
//!
//! Shells out to `ffprobe -v error -print_format json -show_format
//! -show_streams` and keeps the two facts the planner needs: the duration
//! and the frame size of the first video stream.

use std::path::Path;

use serde::Deserialize;

use crate::command::ToolCommand;

/// What the planner needs to know about a media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSummary {
    /// Container duration in seconds, if reported.
    pub duration: Option<f64>,
    /// Width of the first video stream.
    pub width: Option<u32>,
    /// Height of the first video stream.
    pub height: Option<u32>,
}

impl MediaSummary {
    /// Orientation label used by content-source queries.
    pub fn orientation(&self) -> &'static str {
        match (self.width, self.height) {
            (Some(w), Some(h)) if h > w => "portrait",
            (Some(w), Some(h)) if h == w => "square",
            _ => "landscape",
        }
    }
}

/// Probe a media file with the given ffprobe binary.
pub async fn probe_media(ffprobe: &Path, path: &Path) -> cf_core::Result<MediaSummary> {
    let mut cmd = ToolCommand::new(ffprobe.to_path_buf());
    cmd.args([
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ]);
    cmd.arg(path.to_string_lossy().into_owned());

    let output = cmd.execute().await?;
    parse_ffprobe_json(&output.stdout)
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

fn parse_ffprobe_json(json: &str) -> cf_core::Result<MediaSummary> {
    let ff: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| cf_core::Error::tool("ffprobe", format!("JSON parse error: {e}")))?;

    let duration = ff
        .format
        .duration
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0);

    let video = ff
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    Ok(MediaSummary {
        duration,
        width: video.and_then(|s| s.width),
        height: video.and_then(|s| s.height),
    })
}
