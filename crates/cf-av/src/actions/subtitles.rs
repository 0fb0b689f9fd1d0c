//! Burned-in subtitles from an SRT sidecar.

use std::fmt::Write as _;
use std::path::Path;

use super::filter_args;

/// One subtitle cue, times in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

fn srt_timestamp(secs: f64) -> String {
    let secs = secs.max(0.0);
    let whole = secs.trunc() as u64;
    let millis = ((secs.fract() * 1000.0) as u64).min(999);
    format!(
        "{:02}:{:02}:{:02},{:03}",
        whole / 3600,
        (whole % 3600) / 60,
        whole % 60,
        millis
    )
}

/// Render cues as SRT. Cues with blank text are skipped but keep their
/// sequence number.
pub fn format_srt(cues: &[Cue]) -> String {
    let mut blocks = Vec::new();
    for (i, cue) in cues.iter().enumerate() {
        let text = cue.text.trim();
        if text.is_empty() {
            continue;
        }
        let mut block = String::new();
        let _ = write!(
            block,
            "{}\n{} --> {}\n{}\n",
            i + 1,
            srt_timestamp(cue.start),
            srt_timestamp(cue.end),
            text
        );
        blocks.push(block);
    }
    blocks.join("\n")
}

/// Write cues to `path` as UTF-8 SRT.
pub fn write_srt(cues: &[Cue], path: &Path) -> std::io::Result<()> {
    std::fs::write(path, format_srt(cues))
}

/// Escape a path for the `subtitles='...'` filter option.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

/// Burn the SRT file at `srt` into the video.
pub fn subtitles_args(input: &Path, srt: &Path, output: &Path) -> Vec<String> {
    filter_args(
        input,
        format!("subtitles='{}'", escape_filter_path(srt)),
        output,
    )
}
