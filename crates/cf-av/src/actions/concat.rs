//! Joining clips with the concat demuxer.

use std::path::{Path, PathBuf};

use super::path_arg;

/// Write a concat demuxer list naming `clips` in order.
///
/// Relative paths are made absolute so the list works from any directory.
pub fn write_concat_list(clips: &[PathBuf], list: &Path) -> std::io::Result<()> {
    let mut body = String::new();
    for clip in clips {
        let abs = if clip.is_absolute() {
            clip.clone()
        } else {
            std::env::current_dir()?.join(clip)
        };
        body.push_str(&format!(
            "file '{}'\n",
            abs.to_string_lossy().replace('\'', "'\\''")
        ));
    }
    std::fs::write(list, body)
}

/// Stream-copy join of the clips named in `list`.
pub fn concat_args(list: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        path_arg(list),
        "-c".into(),
        "copy".into(),
        path_arg(output),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_file_has_one_line_per_clip() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("it's.mp4");
        let list = dir.path().join("list.txt");
        write_concat_list(&[a.clone(), b.clone()], &list).unwrap();

        let body = std::fs::read_to_string(&list).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("file '{}'", a.display()));
        assert!(lines[1].ends_with("it'\\''s.mp4'"));
    }

    #[test]
    fn args_use_concat_demuxer() {
        let args = concat_args(Path::new("list.txt"), Path::new("out.mp4"));
        assert_eq!(
            args,
            ["-y", "-f", "concat", "-safe", "0", "-i", "list.txt", "-c", "copy", "out.mp4"]
        );
    }
}
