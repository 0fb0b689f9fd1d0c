//! Two-input compositing: still images and external clips over the main
//! video. Both keep the main input's audio untouched.

use std::path::Path;

use super::{enable_between, path_arg};

/// `x:y` overlay coordinates for a named anchor, 10px from the edges.
/// Unknown names fall back to bottom right.
pub fn overlay_position(position: &str) -> &'static str {
    match position {
        "top_left" => "10:10",
        "top_center" => "(main_w-overlay_w)/2:10",
        "top_right" => "main_w-overlay_w-10:10",
        "bottom_left" => "10:main_h-overlay_h-10",
        "bottom_center" => "(main_w-overlay_w)/2:main_h-overlay_h-10",
        "center" => "(main_w-overlay_w)/2:(main_h-overlay_h)/2",
        _ => "main_w-overlay_w-10:main_h-overlay_h-10",
    }
}

fn composite_args(main: &Path, extra_inputs: Vec<String>, graph: String, output: &Path) -> Vec<String> {
    let mut args = vec!["-y".to_string(), "-i".into(), path_arg(main)];
    args.extend(extra_inputs);
    args.extend([
        "-filter_complex".into(),
        graph,
        "-map".into(),
        "[v]".into(),
        "-map".into(),
        "0:a?".into(),
        "-c:a".into(),
        "copy".into(),
        path_arg(output),
    ]);
    args
}

/// Overlay a still image with the given opacity, optionally only inside
/// `[start, end]`.
pub fn image_overlay_args(
    main: &Path,
    image: &Path,
    position: &str,
    opacity: f64,
    window: Option<(f64, Option<f64>)>,
    output: &Path,
) -> Vec<String> {
    let enable = window
        .map(|(start, end)| format!(":{}", enable_between(start, end)))
        .unwrap_or_default();
    let graph = format!(
        "[1:v]format=rgba,colorchannelmixer=aa={opacity}[img];[0:v][img]overlay={}{enable}[v]",
        overlay_position(position)
    );
    composite_args(main, vec!["-i".into(), path_arg(image)], graph, output)
}

/// Show `clip` full-frame over the main video from `start` to `end`.
///
/// The clip is offset to begin at `start`, scaled to the main frame size,
/// and dropped once it runs out, so the main picture resumes underneath.
pub fn video_overlay_args(
    main: &Path,
    clip: &Path,
    start: f64,
    end: Option<f64>,
    output: &Path,
) -> Vec<String> {
    let graph = format!(
        "[1:v][0:v]scale2ref[ov][base];[base][ov]overlay=eof_action=pass:{}[v]",
        enable_between(start, end)
    );
    composite_args(
        main,
        vec![
            "-itsoffset".into(),
            start.to_string(),
            "-i".into(),
            path_arg(clip),
        ],
        graph,
        output,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_overlay_graph() {
        let args = image_overlay_args(
            Path::new("main.mp4"),
            Path::new("logo.png"),
            "top_left",
            0.8,
            Some((1.0, Some(3.0))),
            Path::new("out.mp4"),
        );
        assert_eq!(args[3..5], ["-i", "logo.png"]);
        assert!(args.contains(
            &"[1:v]format=rgba,colorchannelmixer=aa=0.8[img];[0:v][img]overlay=10:10:enable='between(t,1,3)'[v]"
                .to_string()
        ));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn image_overlay_without_window_is_always_on() {
        let args = image_overlay_args(
            Path::new("m"),
            Path::new("i"),
            "unknown",
            1.0,
            None,
            Path::new("o"),
        );
        assert!(args.contains(
            &"[1:v]format=rgba,colorchannelmixer=aa=1[img];[0:v][img]overlay=main_w-overlay_w-10:main_h-overlay_h-10[v]"
                .to_string()
        ));
    }

    #[test]
    fn video_overlay_offsets_clip_and_keeps_audio() {
        let args = video_overlay_args(
            Path::new("main.mp4"),
            Path::new("broll.mp4"),
            18.0,
            Some(22.5),
            Path::new("out.mp4"),
        );
        assert_eq!(args[3..7], ["-itsoffset", "18", "-i", "broll.mp4"]);
        assert!(args.contains(&"0:a?".to_string()));
        let graph = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(graph.contains("scale2ref"));
        assert!(graph.contains("enable='between(t,18,22.5)'"));
    }
}
