//! Transcript contract consumed by the slot planner.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use cf_core::parse_timestamp;

/// One timestamped stretch of speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Full text plus ordered segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        let text = segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self { text, segments }
    }

    /// Parse a transcript document: `{text, segments}` or a bare segment
    /// array. Segment times may be timestamp strings; segments without a
    /// usable start are skipped and the rest are sorted by start.
    pub fn from_json(json: &str) -> cf_core::Result<Self> {
        let doc: Value = serde_json::from_str(json)
            .map_err(|e| cf_core::Error::Validation(format!("transcript is not valid JSON: {e}")))?;

        let (text, raw_segments) = match &doc {
            Value::Array(items) => (None, items.as_slice()),
            Value::Object(obj) => (
                obj.get("text").and_then(Value::as_str),
                obj.get("segments")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default(),
            ),
            _ => {
                return Err(cf_core::Error::Validation(
                    "transcript must be an object or a segment array".into(),
                ))
            }
        };

        let mut segments: Vec<TranscriptSegment> = raw_segments
            .iter()
            .filter_map(|seg| {
                let start = parse_timestamp(seg.get("start")?)?;
                let end = seg
                    .get("end")
                    .and_then(parse_timestamp)
                    .filter(|e| *e >= start)
                    .unwrap_or(start);
                let text = seg.get("text").and_then(Value::as_str).unwrap_or("").to_string();
                Some(TranscriptSegment { start, end, text })
            })
            .collect();
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut transcript = Self::new(segments);
        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            transcript.text = text.to_string();
        }
        Ok(transcript)
    }

    /// Read and parse a transcript file.
    pub fn load(path: &Path) -> cf_core::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Segment end times, which mark sentence boundaries.
    pub fn boundaries(&self) -> Vec<f64> {
        self.segments.iter().map(|s| s.end).collect()
    }

    /// Joined text of the segments lying within `[from, to]`, cut to
    /// `max_chars` characters.
    pub fn text_between(&self, from: f64, to: f64, max_chars: usize) -> String {
        let joined = self
            .segments
            .iter()
            .filter(|s| s.start >= from && s.end <= to)
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        joined.trim().chars().take(max_chars).collect()
    }

    /// Seconds of speech overlapping `[from, to]`.
    pub fn speech_within(&self, from: f64, to: f64) -> f64 {
        self.segments
            .iter()
            .map(|s| (s.end.min(to) - s.start.max(from)).max(0.0))
            .sum()
    }
}

/// Produces a transcript for a media file.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, media: &Path) -> cf_core::Result<Transcript>;
}

/// Reads a transcript stored next to the media as `<file>.transcript.json`.
#[derive(Debug, Clone, Default)]
pub struct SidecarTranscriber;

impl SidecarTranscriber {
    pub fn sidecar_path(media: &Path) -> PathBuf {
        let mut name = media.file_name().unwrap_or_default().to_os_string();
        name.push(".transcript.json");
        media.with_file_name(name)
    }
}

#[async_trait]
impl Transcriber for SidecarTranscriber {
    async fn transcribe(&self, media: &Path) -> cf_core::Result<Transcript> {
        let path = Self::sidecar_path(media);
        tracing::debug!("Reading transcript sidecar {}", path.display());
        Transcript::load(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_object_form_with_string_times() {
        let t = Transcript::from_json(
            r#"{"segments": [
                {"start": "0:05", "end": "0:08.5", "text": "Second"},
                {"start": 0, "end": 4, "text": "First"},
                {"end": 9, "text": "no start"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(t.segments.len(), 2);
        assert_eq!(t.segments[0].text, "First");
        assert_eq!(t.segments[1].end, 8.5);
        assert_eq!(t.text, "First Second");
        assert_eq!(t.boundaries(), vec![4.0, 8.5]);
    }

    #[test]
    fn parses_bare_array() {
        let t = Transcript::from_json(r#"[{"start": 1, "end": 2, "text": "a"}]"#).unwrap();
        assert_eq!(t.segments.len(), 1);
        assert!(Transcript::from_json("3").is_err());
    }

    #[test]
    fn text_window_is_truncated() {
        let t = Transcript::new(vec![
            TranscriptSegment { start: 0.0, end: 2.0, text: "alpha".into() },
            TranscriptSegment { start: 2.0, end: 4.0, text: "beta".into() },
            TranscriptSegment { start: 10.0, end: 12.0, text: "gamma".into() },
        ]);
        assert_eq!(t.text_between(0.0, 5.0, 300), "alpha beta");
        assert_eq!(t.text_between(0.0, 5.0, 7), "alpha b");
    }

    #[test]
    fn speech_overlap() {
        let t = Transcript::new(vec![
            TranscriptSegment { start: 0.0, end: 2.0, text: "alpha".into() },
            TranscriptSegment { start: 5.0, end: 9.0, text: "beta".into() },
        ]);
        assert_eq!(t.speech_within(1.0, 6.0), 2.0);
        assert_eq!(t.speech_within(10.0, 20.0), 0.0);
    }

    #[tokio::test]
    async fn sidecar_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("talk.mp4");
        std::fs::write(
            dir.path().join("talk.mp4.transcript.json"),
            r#"{"text": "hello", "segments": [{"start": 0, "end": 1, "text": "hello"}]}"#,
        )
        .unwrap();
        let t = SidecarTranscriber.transcribe(&media).await.unwrap();
        assert_eq!(t.text, "hello");
    }
}
