//! Single-input video transformations: trim, resize, speed, crop, color,
//! zoom-pan, and plain copy.

use std::path::Path;

use super::{filter_args, path_arg};

/// Lowest tempo a single `atempo` stage accepts.
const MIN_ATEMPO: f64 = 0.5;
/// Highest tempo a single `atempo` stage accepts.
const MAX_ATEMPO: f64 = 2.0;
/// Output frame rate assumed by zoompan's frame count.
const ZOOMPAN_FPS: f64 = 25.0;

/// Stream-copy cut with input seeking.
///
/// Seeking before `-i` keeps a start beyond the end of the file from
/// failing the whole run.
pub fn trim_args(input: &Path, start: f64, end: Option<f64>, output: &Path) -> Vec<String> {
    let mut args = vec!["-y".to_string(), "-ss".into(), start.to_string()];
    if let Some(end) = end {
        args.push("-to".into());
        args.push(end.to_string());
    }
    args.extend([
        "-i".into(),
        path_arg(input),
        "-c".into(),
        "copy".into(),
        path_arg(output),
    ]);
    args
}

/// Scale to `width`; the height follows the aspect ratio unless given.
pub fn resize_args(input: &Path, width: u32, height: Option<u32>, output: &Path) -> Vec<String> {
    let scale = match height {
        Some(h) => format!("scale={width}:{h}"),
        None => format!("scale={width}:-1"),
    };
    filter_args(input, scale, output)
}

/// Retime video by `factor`; audio tempo is clamped to what one `atempo`
/// stage supports.
pub fn speed_args(input: &Path, factor: f64, output: &Path) -> Vec<String> {
    let pts = 1.0 / factor;
    let tempo = factor.clamp(MIN_ATEMPO, MAX_ATEMPO);
    vec![
        "-y".into(),
        "-i".into(),
        path_arg(input),
        "-filter:v".into(),
        format!("setpts={pts}*PTS"),
        "-filter:a".into(),
        format!("atempo={tempo}"),
        path_arg(output),
    ]
}

/// Centre crop to `w:h` at full input height.
pub fn crop_ratio_args(input: &Path, ratio_w: u32, ratio_h: u32, output: &Path) -> Vec<String> {
    let crop = format!("crop=ih*{ratio_w}/{ratio_h}:ih:(iw-ih*{ratio_w}/{ratio_h})/2:0");
    filter_args(input, crop, output)
}

/// `eq` adjustments; zero values are omitted. Returns plain copy arguments
/// when every value is zero.
pub fn color_args(
    input: &Path,
    brightness: f64,
    contrast: f64,
    saturation: f64,
    output: &Path,
) -> Vec<String> {
    let mut eq = Vec::new();
    if brightness != 0.0 {
        eq.push(format!("brightness={brightness}"));
    }
    if contrast != 0.0 {
        eq.push(format!("contrast={contrast}"));
    }
    if saturation != 0.0 {
        eq.push(format!("saturation={}", 1.0 + saturation));
    }

    if eq.is_empty() {
        return copy_args(input, output);
    }
    filter_args(input, format!("eq={}", eq.join(":")), output)
}

/// Slow zoom in up to `zoom` over `duration` seconds, rendered at 1280x720.
pub fn zoompan_args(input: &Path, zoom: f64, duration: f64, output: &Path) -> Vec<String> {
    let frames = (duration * ZOOMPAN_FPS) as u64;
    let filter = format!("zoompan=z='min(zoom+0.0015,{zoom})':d={frames}:s=1280x720");
    filter_args(input, filter, output)
}

/// Remux all streams unchanged.
pub fn copy_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        path_arg(input),
        "-c".into(),
        "copy".into(),
        path_arg(output),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> &Path {
        Path::new(s)
    }

    #[test]
    fn trim_with_and_without_end() {
        assert_eq!(
            trim_args(p("in.mp4"), 15.0, Some(30.0), p("out.mp4")),
            ["-y", "-ss", "15", "-to", "30", "-i", "in.mp4", "-c", "copy", "out.mp4"]
        );
        assert_eq!(
            trim_args(p("in.mp4"), 2.5, None, p("out.mp4")),
            ["-y", "-ss", "2.5", "-i", "in.mp4", "-c", "copy", "out.mp4"]
        );
    }

    #[test]
    fn resize_keeps_aspect_by_default() {
        assert!(resize_args(p("a"), 1280, None, p("b")).contains(&"scale=1280:-1".to_string()));
        assert!(resize_args(p("a"), 720, Some(1280), p("b")).contains(&"scale=720:1280".to_string()));
    }

    #[test]
    fn speed_clamps_audio_tempo() {
        let fast = speed_args(p("a"), 4.0, p("b"));
        assert!(fast.contains(&"setpts=0.25*PTS".to_string()));
        assert!(fast.contains(&"atempo=2".to_string()));

        let slow = speed_args(p("a"), 0.25, p("b"));
        assert!(slow.contains(&"setpts=4*PTS".to_string()));
        assert!(slow.contains(&"atempo=0.5".to_string()));
    }

    #[test]
    fn vertical_crop_filter() {
        let args = crop_ratio_args(p("a"), 9, 16, p("b"));
        assert!(args.contains(&"crop=ih*9/16:ih:(iw-ih*9/16)/2:0".to_string()));
    }

    #[test]
    fn color_skips_zero_values() {
        let args = color_args(p("a"), 0.1, 0.0, 0.2, p("b"));
        assert!(args.contains(&"eq=brightness=0.1:saturation=1.2".to_string()));
    }

    #[test]
    fn neutral_color_is_copy() {
        assert_eq!(color_args(p("a"), 0.0, 0.0, 0.0, p("b")), copy_args(p("a"), p("b")));
    }

    #[test]
    fn zoompan_frame_count() {
        let args = zoompan_args(p("a"), 1.2, 2.0, p("b"));
        assert!(args.contains(&"zoompan=z='min(zoom+0.0015,1.2)':d=50:s=1280x720".to_string()));
    }
}
