//! ffmpeg argument builders for each editing operation.
//!
//! Every builder is pure: it takes resolved paths and typed parameters and
//! returns the full argument vector for one ffmpeg invocation. Nothing here
//! touches the filesystem except [`subtitles::write_srt`] and
//! [`concat::write_concat_list`], which write the sidecar files ffmpeg reads.

pub mod concat;
pub mod overlay;
pub mod subtitles;
pub mod text;
pub mod video;

use std::path::Path;

pub use concat::{concat_args, write_concat_list};
pub use overlay::{image_overlay_args, overlay_position, video_overlay_args};
pub use subtitles::{format_srt, subtitles_args, write_srt, Cue};
pub use text::{
    default_font, drawtext_filter, escape_drawtext, text_overlay_args, text_position, DrawText,
};
pub use video::{
    color_args, copy_args, crop_ratio_args, resize_args, speed_args, trim_args, zoompan_args,
};

/// Lossy string form of a path for use as a command-line argument.
pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// `enable='between(t,S,E)'`; an open end runs to the end of the stream.
pub(crate) fn enable_between(start: f64, end: Option<f64>) -> String {
    match end {
        Some(end) => format!("enable='between(t,{start},{end})'"),
        None => format!("enable='gte(t,{start})'"),
    }
}

/// `-y -i <input> -vf <filter> -c:a copy <output>`, the shape shared by all
/// single-input video filters.
pub(crate) fn filter_args(input: &Path, filter: String, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        path_arg(input),
        "-vf".into(),
        filter,
        "-c:a".into(),
        "copy".into(),
        path_arg(output),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_expressions() {
        assert_eq!(enable_between(2.0, Some(5.5)), "enable='between(t,2,5.5)'");
        assert_eq!(enable_between(3.5, None), "enable='gte(t,3.5)'");
    }
}
