//! The canonical task model.
//!
//! A plan is an ordered list of [`Task`]s. Each task carries one typed
//! [`Operation`], an optional name for its output, and an optional list of
//! named inputs. Parameters are validated once, when a task is built from
//! its wire shape; nothing downstream re-checks raw values.

use std::fmt;
use std::path::PathBuf;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// OperationKind
// ---------------------------------------------------------------------------

/// The closed set of editing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    AddTextOverlay,
    Trim,
    Resize,
    ChangeSpeed,
    AddSubtitles,
    AddImageOverlay,
    AutoFrameFace,
    ColorCorrection,
    Concat,
    Zoompan,
    FetchStockVideo,
    FetchStockImage,
    OverlayVideo,
}

/// Whether an operation's output becomes the default input of the next task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainEffect {
    /// The output replaces the `current` pointer.
    MainChain,
    /// The output is only registered by name for later reference.
    SideArtifact,
}

/// `(kind, wire name, descriptive alias)`.
const KIND_NAMES: &[(OperationKind, &str, &str)] = &[
    (OperationKind::AddTextOverlay, "add_text_overlay", "overlay-text"),
    (OperationKind::Trim, "trim", "time-trim"),
    (OperationKind::Resize, "resize", "resize"),
    (OperationKind::ChangeSpeed, "change_speed", "speed-change"),
    (OperationKind::AddSubtitles, "add_subtitles", "burn-subtitles"),
    (OperationKind::AddImageOverlay, "add_image_overlay", "image-overlay"),
    (OperationKind::AutoFrameFace, "auto_frame_face", "auto-crop-to-ratio"),
    (OperationKind::ColorCorrection, "color_correction", "color-adjust"),
    (OperationKind::Concat, "concat", "concatenate"),
    (OperationKind::Zoompan, "zoompan", "zoom-pan"),
    (OperationKind::FetchStockVideo, "fetch_stock_video", "fetch-external-video"),
    (OperationKind::FetchStockImage, "fetch_stock_image", "fetch-external-image"),
    (OperationKind::OverlayVideo, "overlay_video", "overlay-external-video"),
];

impl OperationKind {
    /// Resolve a wire name or descriptive alias, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        KIND_NAMES
            .iter()
            .find(|(_, wire, alias)| *wire == name || *alias == name)
            .map(|(kind, _, _)| *kind)
    }

    /// Name used in plan documents.
    pub fn wire_name(self) -> &'static str {
        KIND_NAMES
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .map(|(_, wire, _)| *wire)
            .unwrap_or("unknown")
    }

    /// Fetched media is registered for later reference but never becomes the
    /// main chain.
    pub fn chain_effect(self) -> ChainEffect {
        match self {
            Self::FetchStockVideo | Self::FetchStockImage => ChainEffect::SideArtifact,
            _ => ChainEffect::MainChain,
        }
    }

    /// Operations that pull media from the content source.
    pub fn is_fetch(self) -> bool {
        matches!(self, Self::FetchStockVideo | Self::FetchStockImage)
    }

    /// Operations that may be skipped when the media they insert was never
    /// found.
    pub fn is_optional_insert(self) -> bool {
        matches!(self, Self::OverlayVideo | Self::AddImageOverlay)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

// ---------------------------------------------------------------------------
// Parameter records
// ---------------------------------------------------------------------------

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let v = f64::deserialize(d)?;
    if v.is_finite() && v >= 0.0 && v <= f64::from(u32::MAX) {
        Ok(v.round() as u32)
    } else {
        Err(D::Error::custom(format!("expected a non-negative integer, got {v}")))
    }
}

fn lenient_opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    match Option::<f64>::deserialize(d)? {
        None => Ok(None),
        Some(v) if v.is_finite() && v >= 0.0 && v <= f64::from(u32::MAX) => Ok(Some(v.round() as u32)),
        Some(v) => Err(D::Error::custom(format!("expected a non-negative integer, got {v}"))),
    }
}

fn default_text_position() -> String {
    "bottom_center".into()
}
fn default_image_position() -> String {
    "bottom_right".into()
}
fn default_font_size() -> u32 {
    48
}
fn default_font_color() -> String {
    "white".into()
}
fn default_margin() -> u32 {
    50
}
fn default_width() -> u32 {
    1280
}
fn default_one() -> f64 {
    1.0
}
fn default_zoom() -> f64 {
    1.2
}
fn default_zoom_duration() -> f64 {
    2.0
}
fn default_duration_max() -> f64 {
    30.0
}
fn default_orientation() -> String {
    "landscape".into()
}

/// A drawtext coordinate: pixels, an ffmpeg expression, or `"NN%"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinate {
    Pixels(f64),
    Expr(String),
}

impl Coordinate {
    pub fn as_expr(&self) -> String {
        match self {
            Self::Pixels(v) => v.to_string(),
            Self::Expr(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlayParams {
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_text_position")]
    pub position: String,
    #[serde(default = "default_font_size", deserialize_with = "lenient_u32")]
    pub font_size: u32,
    #[serde(default = "default_font_color")]
    pub font_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub shadow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub border_width: u32,
    #[serde(default = "default_margin", deserialize_with = "lenient_u32")]
    pub margin: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimParams {
    #[serde(default)]
    pub start: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizeParams {
    #[serde(default = "default_width", deserialize_with = "lenient_u32")]
    pub width: u32,
    #[serde(
        default,
        deserialize_with = "lenient_opt_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedParams {
    #[serde(default = "default_one")]
    pub factor: f64,
}

/// One subtitle cue. A missing end means one second after the start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCue {
    #[serde(default)]
    pub start: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(default)]
    pub text: String,
}

impl SubtitleCue {
    pub fn end_or_default(&self) -> f64 {
        self.end.unwrap_or(self.start + 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitlesParams {
    #[serde(default)]
    pub segments: Vec<SubtitleCue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOverlayParams {
    /// Registry name of a fetched image, or a filesystem path.
    #[serde(alias = "image_path")]
    pub image: String,
    #[serde(default = "default_image_position")]
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    #[serde(default = "default_one")]
    pub opacity: f64,
}

/// A `W:H` aspect ratio such as `9:16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self {
            width: 9,
            height: 16,
        }
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let (w, h) = s
            .split_once(':')
            .ok_or_else(|| format!("aspect ratio '{s}' is not W:H"))?;
        let width: u32 = w.trim().parse().map_err(|_| format!("bad ratio width '{w}'"))?;
        let height: u32 = h.trim().parse().map_err(|_| format!("bad ratio height '{h}'"))?;
        if width == 0 || height == 0 {
            return Err(format!("aspect ratio '{s}' has a zero side"));
        }
        Ok(Self { width, height })
    }
}

impl From<AspectRatio> for String {
    fn from(r: AspectRatio) -> Self {
        format!("{}:{}", r.width, r.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoFrameParams {
    #[serde(default)]
    pub target_ratio: AspectRatio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorParams {
    #[serde(default)]
    pub brightness: f64,
    #[serde(default)]
    pub contrast: f64,
    #[serde(default)]
    pub saturation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcatParams {
    /// Only consulted when the task has no `inputs`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clip_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoompanParams {
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    #[serde(default = "default_zoom_duration")]
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchVideoParams {
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_queries: Vec<String>,
    #[serde(default = "default_duration_max")]
    pub duration_max: f64,
    #[serde(default = "default_orientation")]
    pub orientation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchImageParams {
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_queries: Vec<String>,
    #[serde(default = "default_orientation")]
    pub orientation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoOverlayParams {
    pub start_time: f64,
    /// Open end means the clip plays until it runs out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    /// Registry name of the fetched clip.
    pub clip: String,
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// One editing operation with its validated parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    AddTextOverlay(TextOverlayParams),
    Trim(TrimParams),
    Resize(ResizeParams),
    ChangeSpeed(SpeedParams),
    AddSubtitles(SubtitlesParams),
    AddImageOverlay(ImageOverlayParams),
    AutoFrameFace(AutoFrameParams),
    ColorCorrection(ColorParams),
    Concat(ConcatParams),
    Zoompan(ZoompanParams),
    FetchStockVideo(FetchVideoParams),
    FetchStockImage(FetchImageParams),
    OverlayVideo(VideoOverlayParams),
    /// A type name outside the known set, kept so execution can skip it.
    Unrecognized { kind: String, params: Value },
}

fn typed<T: DeserializeOwned>(params: Value) -> Result<T, String> {
    serde_json::from_value(params).map_err(|e| e.to_string())
}

fn check(ok: bool, message: impl FnOnce() -> String) -> Result<(), String> {
    if ok {
        Ok(())
    } else {
        Err(message())
    }
}

impl Operation {
    /// Build a typed operation from a type name and a parameter object.
    ///
    /// Unknown type names yield [`Operation::Unrecognized`]; known names with
    /// parameters that do not fit return the reason as `Err`.
    pub fn from_parts(type_name: &str, params: Value) -> Result<Self, String> {
        let params = match params {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        let Some(kind) = OperationKind::parse(type_name) else {
            return Ok(Self::Unrecognized {
                kind: type_name.to_string(),
                params,
            });
        };

        let op = match kind {
            OperationKind::AddTextOverlay => Self::AddTextOverlay(typed(params)?),
            OperationKind::Trim => Self::Trim(typed(params)?),
            OperationKind::Resize => Self::Resize(typed(params)?),
            OperationKind::ChangeSpeed => Self::ChangeSpeed(typed(params)?),
            OperationKind::AddSubtitles => Self::AddSubtitles(typed(params)?),
            OperationKind::AddImageOverlay => Self::AddImageOverlay(typed(params)?),
            OperationKind::AutoFrameFace => Self::AutoFrameFace(typed(params)?),
            OperationKind::ColorCorrection => Self::ColorCorrection(typed(params)?),
            OperationKind::Concat => Self::Concat(typed(params)?),
            OperationKind::Zoompan => Self::Zoompan(typed(params)?),
            OperationKind::FetchStockVideo => Self::FetchStockVideo(typed(params)?),
            OperationKind::FetchStockImage => Self::FetchStockImage(typed(params)?),
            OperationKind::OverlayVideo => Self::OverlayVideo(typed(params)?),
        };
        op.check()?;
        Ok(op)
    }

    fn check(&self) -> Result<(), String> {
        match self {
            Self::Trim(p) => check(p.start >= 0.0 && p.end.map_or(true, |e| e > p.start), || {
                format!("trim window {}..{:?} is empty or negative", p.start, p.end)
            }),
            Self::Resize(p) => check(p.width > 0 && p.height != Some(0), || {
                "resize dimensions must be positive".into()
            }),
            Self::ChangeSpeed(p) => check(p.factor.is_finite() && p.factor > 0.0, || {
                format!("speed factor {} must be positive", p.factor)
            }),
            Self::AddImageOverlay(p) => check(
                !p.image.trim().is_empty() && (0.0..=1.0).contains(&p.opacity),
                || "image overlay needs an image and an opacity in [0, 1]".into(),
            ),
            Self::Zoompan(p) => check(p.zoom >= 1.0 && p.duration > 0.0, || {
                "zoompan needs zoom >= 1 and a positive duration".into()
            }),
            Self::FetchStockVideo(p) => check(p.duration_max > 0.0, || {
                "duration_max must be positive".into()
            }),
            Self::OverlayVideo(p) => check(p.start_time >= 0.0 && !p.clip.trim().is_empty(), || {
                "overlay_video needs a non-negative start_time and a clip".into()
            }),
            _ => Ok(()),
        }
    }

    /// The known kind, or `None` for [`Operation::Unrecognized`].
    pub fn kind(&self) -> Option<OperationKind> {
        Some(match self {
            Self::AddTextOverlay(_) => OperationKind::AddTextOverlay,
            Self::Trim(_) => OperationKind::Trim,
            Self::Resize(_) => OperationKind::Resize,
            Self::ChangeSpeed(_) => OperationKind::ChangeSpeed,
            Self::AddSubtitles(_) => OperationKind::AddSubtitles,
            Self::AddImageOverlay(_) => OperationKind::AddImageOverlay,
            Self::AutoFrameFace(_) => OperationKind::AutoFrameFace,
            Self::ColorCorrection(_) => OperationKind::ColorCorrection,
            Self::Concat(_) => OperationKind::Concat,
            Self::Zoompan(_) => OperationKind::Zoompan,
            Self::FetchStockVideo(_) => OperationKind::FetchStockVideo,
            Self::FetchStockImage(_) => OperationKind::FetchStockImage,
            Self::OverlayVideo(_) => OperationKind::OverlayVideo,
            Self::Unrecognized { .. } => return None,
        })
    }

    /// Type name as written in plan documents.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Unrecognized { kind, .. } => kind,
            other => other.kind().map_or("unknown", OperationKind::wire_name),
        }
    }

    /// Parameters as a JSON object, defaults filled in.
    pub fn params_value(&self) -> Value {
        let value = match self {
            Self::AddTextOverlay(p) => serde_json::to_value(p),
            Self::Trim(p) => serde_json::to_value(p),
            Self::Resize(p) => serde_json::to_value(p),
            Self::ChangeSpeed(p) => serde_json::to_value(p),
            Self::AddSubtitles(p) => serde_json::to_value(p),
            Self::AddImageOverlay(p) => serde_json::to_value(p),
            Self::AutoFrameFace(p) => serde_json::to_value(p),
            Self::ColorCorrection(p) => serde_json::to_value(p),
            Self::Concat(p) => serde_json::to_value(p),
            Self::Zoompan(p) => serde_json::to_value(p),
            Self::FetchStockVideo(p) => serde_json::to_value(p),
            Self::FetchStockImage(p) => serde_json::to_value(p),
            Self::OverlayVideo(p) => serde_json::to_value(p),
            Self::Unrecognized { params, .. } => return params.clone(),
        };
        value.unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// JSON shape of one task: `{type, params, output_id?, inputs?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTask {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<String>>,
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireTask", into = "WireTask")]
pub struct Task {
    pub op: Operation,
    /// Name under which the output is registered.
    pub output_id: Option<String>,
    /// Named inputs; the first is the primary input. `None` means the
    /// current chain artifact.
    pub inputs: Option<Vec<String>>,
}

impl Task {
    pub fn new(op: Operation) -> Self {
        Self {
            op,
            output_id: None,
            inputs: None,
        }
    }

    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.output_id = Some(name.into());
        self
    }

    pub fn with_inputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn kind(&self) -> Option<OperationKind> {
        self.op.kind()
    }

    pub fn is_kind(&self, kind: OperationKind) -> bool {
        self.op.kind() == Some(kind)
    }

    /// Registry names this task reads: its `inputs`, plus the clip of a
    /// video overlay and the image of an image overlay.
    pub fn referenced_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .inputs
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();
        match &self.op {
            Operation::OverlayVideo(p) => names.push(&p.clip),
            Operation::AddImageOverlay(p) => names.push(&p.image),
            _ => {}
        }
        names
    }
}

impl TryFrom<WireTask> for Task {
    type Error = String;

    fn try_from(wire: WireTask) -> Result<Self, Self::Error> {
        Ok(Self {
            op: Operation::from_parts(&wire.kind, wire.params)?,
            output_id: wire.output_id.filter(|s| !s.is_empty()),
            inputs: wire.inputs.filter(|v| !v.is_empty()),
        })
    }
}

impl From<Task> for WireTask {
    fn from(task: Task) -> Self {
        Self {
            kind: task.op.type_name().to_string(),
            params: task.op.params_value(),
            output_id: task.output_id,
            inputs: task.inputs,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.op.type_name())?;
        if let Some(id) = &self.output_id {
            write!(f, " -> {id}")?;
        }
        if let Some(inputs) = &self.inputs {
            write!(f, " <- [{}]", inputs.join(", "))?;
        }
        Ok(())
    }
}
