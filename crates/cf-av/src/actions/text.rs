//! Text overlays via the `drawtext` filter.

use std::path::{Path, PathBuf};

use super::{enable_between, filter_args};

/// Styling and placement for one text overlay.
#[derive(Debug, Clone)]
pub struct DrawText<'a> {
    pub text: &'a str,
    /// Named anchor, used when `x`/`y` are not both given.
    pub position: &'a str,
    pub font_size: u32,
    pub font_color: &'a str,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub shadow: bool,
    /// `dark`, `light`, `none`, or a literal `color@alpha`.
    pub background: Option<&'a str>,
    pub border_color: Option<&'a str>,
    pub border_width: u32,
    pub margin: u32,
    /// Pixels, an ffmpeg expression, or a percentage such as `"50%"`.
    pub x: Option<&'a str>,
    pub y: Option<&'a str>,
}

/// Platform font with Cyrillic coverage.
pub fn default_font() -> PathBuf {
    if cfg!(target_os = "macos") {
        let arial = Path::new("/System/Library/Fonts/Supplemental/Arial.ttf");
        if arial.exists() {
            return arial.to_path_buf();
        }
        return PathBuf::from("/System/Library/Fonts/Helvetica.ttc");
    }
    PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf")
}

/// Escape text for use inside a single-quoted drawtext option.
pub fn escape_drawtext(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ':' => out.push_str("\\:"),
            '\'' => out.push_str("\\'"),
            _ => out.push(c),
        }
    }
    out
}

/// `x=..:y=..` for a named anchor. Unknown names fall back to bottom centre.
pub fn text_position(position: &str, margin: u32) -> String {
    match position {
        "top_center" => format!("x=(w-text_w)/2:y={margin}"),
        "top_left" => format!("x={margin}:y={margin}"),
        "top_right" => format!("x=w-text_w-{margin}:y={margin}"),
        "bottom_left" => format!("x={margin}:y=h-th-{margin}"),
        "bottom_right" => format!("x=w-text_w-{margin}:y=h-th-{margin}"),
        "center" => "x=(w-text_w)/2:y=(h-text_h)/2".to_string(),
        _ => format!("x=(w-text_w)/2:y=h-th-{margin}"),
    }
}

fn coordinate(value: &str, dimension: &str) -> String {
    match value.strip_suffix('%').map(|p| p.trim().parse::<f64>()) {
        Some(Ok(pct)) => format!("({dimension}*{:.4})", pct / 100.0),
        _ => value.to_string(),
    }
}

/// Assemble the full `drawtext=...` filter.
pub fn drawtext_filter(spec: &DrawText<'_>, font: &Path) -> String {
    let position = match (spec.x, spec.y) {
        (Some(x), Some(y)) => format!("x={}:y={}", coordinate(x, "w"), coordinate(y, "h")),
        _ => text_position(spec.position, spec.margin),
    };

    let mut parts = vec![
        format!("drawtext=fontfile='{}'", font.display()),
        format!("text='{}'", escape_drawtext(spec.text)),
        format!("fontsize={}", spec.font_size),
        format!("fontcolor={}", spec.font_color),
        position,
    ];

    if spec.shadow {
        parts.extend(["shadowx=2", "shadowy=2", "shadowcolor=black@0.8"].map(String::from));
    }

    if let Some(color) = spec.border_color.filter(|_| spec.border_width > 0) {
        parts.push(format!("borderw={}", spec.border_width));
        parts.push(format!("bordercolor={color}"));
    }

    match spec.background {
        None | Some("none") | Some("") => {}
        Some(bg) => {
            let box_color = match bg {
                "dark" => "black@0.55",
                "light" => "white@0.55",
                other => other,
            };
            parts.push("box=1".into());
            parts.push(format!("boxcolor={box_color}"));
            parts.push("boxborderw=12".into());
        }
    }

    if let Some(start) = spec.start_time {
        parts.push(enable_between(start, spec.end_time));
    }

    parts.join(":")
}

/// Full argument vector for a text overlay.
pub fn text_overlay_args(input: &Path, spec: &DrawText<'_>, font: &Path, output: &Path) -> Vec<String> {
    filter_args(input, drawtext_filter(spec, font), output)
}
