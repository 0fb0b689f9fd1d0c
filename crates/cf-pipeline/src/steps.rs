//! Translation of a typed operation plus resolved paths into one tool call.

use std::path::{Path, PathBuf};

use cf_av::actions::{self, Cue, DrawText};
use cf_av::{Invocation, Workspace};
use cf_core::{Error, Result};
use cf_plan::task::Coordinate;
use cf_plan::Operation;

use crate::registry::ArtifactRegistry;

/// What a transformation task turns into.
#[derive(Debug)]
pub(crate) enum Prepared {
    Run(Invocation),
    /// Nothing to do; the reason is reported and the chain is left as is.
    Skip(String),
}

/// Files a task operates on, already resolved against the registry.
pub(crate) struct StepFiles<'a> {
    /// Resolved inputs; the first is the primary input.
    pub inputs: &'a [PathBuf],
    /// The clip or image a compositing operation lays on top.
    pub attachment: Option<&'a Path>,
    /// Fresh path the tool writes.
    pub output: &'a Path,
}

/// Build the invocation for a transformation task.
///
/// Sidecar files (subtitle and concat lists) are created in `workspace` and
/// handed to `registry` so they are removed with the other transients.
pub(crate) fn prepare(
    op: &Operation,
    files: StepFiles<'_>,
    font: &Path,
    workspace: &Workspace,
    registry: &mut ArtifactRegistry,
) -> Result<Prepared> {
    let step = op.type_name().to_string();
    let output = files.output;

    let Some(primary) = files.inputs.first() else {
        return Ok(Prepared::Skip("no input clips".into()));
    };

    let (inputs, args) = match op {
        Operation::AddTextOverlay(p) => {
            if p.text.trim().is_empty() {
                return Ok(Prepared::Skip("text is empty".into()));
            }
            let x = p.x.as_ref().map(Coordinate::as_expr);
            let y = p.y.as_ref().map(Coordinate::as_expr);
            let spec = DrawText {
                text: &p.text,
                position: &p.position,
                font_size: p.font_size,
                font_color: &p.font_color,
                start_time: p.start_time,
                end_time: p.end_time,
                shadow: p.shadow,
                background: p.background.as_deref(),
                border_color: p.border_color.as_deref(),
                border_width: p.border_width,
                margin: p.margin,
                x: x.as_deref(),
                y: y.as_deref(),
            };
            (
                vec![primary.clone()],
                actions::text_overlay_args(primary, &spec, font, output),
            )
        }
        Operation::Trim(p) => (
            vec![primary.clone()],
            actions::trim_args(primary, p.start, p.end, output),
        ),
        Operation::Resize(p) => (
            vec![primary.clone()],
            actions::resize_args(primary, p.width, p.height, output),
        ),
        Operation::ChangeSpeed(p) => (
            vec![primary.clone()],
            actions::speed_args(primary, p.factor, output),
        ),
        Operation::AddSubtitles(p) => {
            if p.segments.is_empty() {
                return Ok(Prepared::Skip("no subtitle segments".into()));
            }
            let cues: Vec<Cue> = p
                .segments
                .iter()
                .map(|s| Cue {
                    start: s.start,
                    end: s.end_or_default(),
                    text: s.text.clone(),
                })
                .collect();
            let srt = workspace.transient_path("subtitles", "srt");
            registry.track(srt.clone());
            actions::write_srt(&cues, &srt)?;
            (
                vec![primary.clone()],
                actions::subtitles_args(primary, &srt, output),
            )
        }
        Operation::AddImageOverlay(p) => {
            let Some(image) = files.attachment else {
                return Ok(Prepared::Skip(format!("image '{}' not found", p.image)));
            };
            let window = p.start_time.map(|start| (start, p.end_time));
            (
                vec![primary.clone(), image.to_path_buf()],
                actions::image_overlay_args(primary, image, &p.position, p.opacity, window, output),
            )
        }
        Operation::AutoFrameFace(p) => (
            vec![primary.clone()],
            actions::crop_ratio_args(primary, p.target_ratio.width, p.target_ratio.height, output),
        ),
        Operation::ColorCorrection(p) => (
            vec![primary.clone()],
            actions::color_args(primary, p.brightness, p.contrast, p.saturation, output),
        ),
        Operation::Concat(_) => {
            let list = workspace.transient_path("concat", "txt");
            registry.track(list.clone());
            actions::write_concat_list(files.inputs, &list)?;
            (files.inputs.to_vec(), actions::concat_args(&list, output))
        }
        Operation::Zoompan(p) => (
            vec![primary.clone()],
            actions::zoompan_args(primary, p.zoom, p.duration, output),
        ),
        Operation::OverlayVideo(p) => {
            let Some(clip) = files.attachment else {
                return Ok(Prepared::Skip(format!("clip '{}' not found", p.clip)));
            };
            (
                vec![primary.clone(), clip.to_path_buf()],
                actions::video_overlay_args(primary, clip, p.start_time, p.end_time, output),
            )
        }
        Operation::FetchStockVideo(_)
        | Operation::FetchStockImage(_)
        | Operation::Unrecognized { .. } => {
            return Err(Error::Internal(format!(
                "{step} is not a transformation"
            )))
        }
    };

    Ok(Prepared::Run(Invocation {
        step,
        inputs,
        output: output.to_path_buf(),
        args,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_plan::task::{ConcatParams, SubtitleCue, SubtitlesParams, TrimParams};

    fn files<'a>(inputs: &'a [PathBuf], output: &'a Path) -> StepFiles<'a> {
        StepFiles {
            inputs,
            attachment: None,
            output,
        }
    }

    #[test]
    fn trim_reads_primary_input() {
        let ws = Workspace::new().unwrap();
        let mut reg = ArtifactRegistry::new(Path::new("/in.mp4"), []);
        let inputs = [PathBuf::from("/a.mp4")];
        let out = ws.transient_path("trim", "mp4");
        let op = Operation::Trim(TrimParams { start: 1.0, end: Some(2.0) });

        let Prepared::Run(inv) =
            prepare(&op, files(&inputs, &out), Path::new("f.ttf"), &ws, &mut reg).unwrap()
        else {
            panic!("expected invocation");
        };
        assert_eq!(inv.step, "trim");
        assert_eq!(inv.inputs, inputs);
        assert_eq!(inv.output, out);
        assert!(inv.args.contains(&"/a.mp4".to_string()));
    }

    #[test]
    fn concat_writes_list_sidecar() {
        let ws = Workspace::new().unwrap();
        let mut reg = ArtifactRegistry::new(Path::new("/in.mp4"), []);
        let inputs = [PathBuf::from("/a.mp4"), PathBuf::from("/b.mp4")];
        let out = ws.transient_path("concat", "mp4");
        let op = Operation::Concat(ConcatParams { clip_paths: vec![] });

        let Prepared::Run(inv) =
            prepare(&op, files(&inputs, &out), Path::new("f.ttf"), &ws, &mut reg).unwrap()
        else {
            panic!("expected invocation");
        };
        assert_eq!(inv.inputs.len(), 2);
        let sidecars: Vec<_> = std::fs::read_dir(ws.dir()).unwrap().collect();
        assert_eq!(sidecars.len(), 1);
        assert_eq!(reg.cleanup(&ws), 1);
        assert_eq!(std::fs::read_dir(ws.dir()).unwrap().count(), 0);
    }

    #[test]
    fn empty_subtitles_are_skipped() {
        let ws = Workspace::new().unwrap();
        let mut reg = ArtifactRegistry::new(Path::new("/in.mp4"), []);
        let inputs = [PathBuf::from("/a.mp4")];
        let out = ws.transient_path("x", "mp4");
        let op = Operation::AddSubtitles(SubtitlesParams { segments: vec![] });
        assert!(matches!(
            prepare(&op, files(&inputs, &out), Path::new("f"), &ws, &mut reg).unwrap(),
            Prepared::Skip(_)
        ));

        let op = Operation::AddSubtitles(SubtitlesParams {
            segments: vec![SubtitleCue { start: 0.0, end: None, text: "hi".into() }],
        });
        assert!(matches!(
            prepare(&op, files(&inputs, &out), Path::new("f"), &ws, &mut reg).unwrap(),
            Prepared::Run(_)
        ));
    }

    #[test]
    fn fetch_is_not_a_transformation() {
        let ws = Workspace::new().unwrap();
        let mut reg = ArtifactRegistry::new(Path::new("/in.mp4"), []);
        let inputs = [PathBuf::from("/a.mp4")];
        let out = ws.transient_path("x", "mp4");
        let op = Operation::from_parts("fetch_stock_image", serde_json::json!({"query": "q"})).unwrap();
        assert!(prepare(&op, files(&inputs, &out), Path::new("f"), &ws, &mut reg).is_err());
    }
}
