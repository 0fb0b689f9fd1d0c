//! External content lookup for the fetch operations.
//!
//! A [`ContentSource`] turns a text query into a media file inside the run's
//! workspace, or reports that nothing matched. [`fetch_with_fallback`] walks
//! the primary query, the plan's alternatives, and a few shortened forms of
//! the primary query until one of them returns something.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use cf_av::probe::probe_media;
use cf_av::Workspace;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "webm", "m4v"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// What kind of media a fetch asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Video => VIDEO_EXTENSIONS,
            Self::Image => IMAGE_EXTENSIONS,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Self::Video => "stock_video",
            Self::Image => "stock_image",
        }
    }
}

/// One lookup against a content source.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRequest {
    pub query: String,
    pub kind: MediaKind,
    /// Longest acceptable clip, for video requests.
    pub max_duration: Option<f64>,
    /// `landscape`, `portrait` or `square`.
    pub orientation: String,
}

/// Something that can find media for a query.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Place a matching file inside `workspace` and return its path, or
    /// `Ok(None)` when nothing matches. Errors are treated as a miss for this
    /// query by [`fetch_with_fallback`].
    async fn fetch(
        &self,
        request: &ContentRequest,
        workspace: &Workspace,
    ) -> cf_core::Result<Option<PathBuf>>;
}

/// Queries to try, in order: the primary query, each distinct alternative,
/// then the first two long words of the primary query, then its first long
/// word. Duplicates and blanks are removed.
pub fn fallback_queries(primary: &str, alternatives: &[String]) -> Vec<String> {
    let primary = primary.trim();
    let mut candidates: Vec<String> = Vec::new();
    if !primary.is_empty() {
        candidates.push(primary.to_string());
    }
    for alt in alternatives {
        let alt = alt.trim();
        if !alt.is_empty() && alt != primary {
            candidates.push(alt.to_string());
        }
    }

    let words: Vec<&str> = primary.split_whitespace().filter(|w| w.len() > 3).collect();
    if words.len() > 2 {
        candidates.push(words[..2].join(" "));
    }
    if words.len() > 1 {
        candidates.push(words[0].to_string());
    }

    let mut seen = std::collections::HashSet::new();
    candidates.retain(|q| seen.insert(q.clone()));
    candidates
}

/// Try each fallback query against `source` until one yields a file.
///
/// Source errors are logged and the next query is tried. Returns `None`
/// when every query comes back empty.
pub async fn fetch_with_fallback(
    source: &dyn ContentSource,
    template: &ContentRequest,
    alternatives: &[String],
    workspace: &Workspace,
) -> Option<PathBuf> {
    let queries = fallback_queries(&template.query, alternatives);
    if queries.is_empty() {
        warn!("Fetch has no usable query");
        return None;
    }

    for query in &queries {
        let request = ContentRequest {
            query: query.clone(),
            ..template.clone()
        };
        match source.fetch(&request, workspace).await {
            Ok(Some(path)) => {
                info!("{} found '{query}': {}", source.name(), path.display());
                return Some(path);
            }
            Ok(None) => debug!("{} has nothing for '{query}'", source.name()),
            Err(e) => warn!("{} failed for '{query}': {e}", source.name()),
        }
    }

    warn!(
        "No content found for any of: {}",
        queries
            .iter()
            .map(|q| format!("'{q}'"))
            .collect::<Vec<_>>()
            .join(", ")
    );
    None
}

/// Source that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContent;

#[async_trait]
impl ContentSource for NoContent {
    fn name(&self) -> &str {
        "none"
    }

    async fn fetch(&self, _: &ContentRequest, _: &Workspace) -> cf_core::Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// Searches a local media library by file name.
///
/// Each file stem is split into lowercase words; files sharing more words
/// with the query rank higher, ties broken by path. With an ffprobe binary
/// set, candidates whose orientation or duration does not fit the request
/// are passed over. The chosen file is copied into the workspace so the run
/// owns it.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    ffprobe: Option<PathBuf>,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ffprobe: None,
        }
    }

    /// Check candidates against the request with this ffprobe binary.
    pub fn with_probe(mut self, ffprobe: PathBuf) -> Self {
        self.ffprobe = Some(ffprobe);
        self
    }

    /// Library files sharing a word with `query`, best first.
    pub fn candidates(&self, query: &str, kind: MediaKind) -> Vec<PathBuf> {
        let wanted = words(query);
        if wanted.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, PathBuf)> = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if !has_extension(path, kind.extensions()) {
                continue;
            }
            let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
            let have = words(&stem);
            let score = wanted.iter().filter(|w| have.contains(w)).count();
            if score > 0 {
                scored.push((score, path.to_path_buf()));
            }
        }
        scored.sort_by(|(sa, pa), (sb, pb)| sb.cmp(sa).then_with(|| pa.cmp(pb)));
        scored.into_iter().map(|(_, path)| path).collect()
    }

    /// Whether `path` fits the request's orientation and length. Files
    /// ffprobe cannot read are rejected.
    async fn fits(&self, ffprobe: &Path, path: &Path, request: &ContentRequest) -> bool {
        let summary = match probe_media(ffprobe, path).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Skipping unreadable library file {}: {e}", path.display());
                return false;
            }
        };
        if !request.orientation.is_empty() && summary.orientation() != request.orientation {
            debug!(
                "Skipping {}: {} instead of {}",
                path.display(),
                summary.orientation(),
                request.orientation
            );
            return false;
        }
        match (request.max_duration, summary.duration) {
            (Some(max), Some(d)) if d > max => {
                debug!("Skipping {}: {d:.1}s is longer than {max:.1}s", path.display());
                false
            }
            _ => true,
        }
    }
}

#[async_trait]
impl ContentSource for DirectorySource {
    fn name(&self) -> &str {
        "library"
    }

    async fn fetch(
        &self,
        request: &ContentRequest,
        workspace: &Workspace,
    ) -> cf_core::Result<Option<PathBuf>> {
        if !self.root.is_dir() {
            return Err(cf_core::Error::Validation(format!(
                "content library {} is not a directory",
                self.root.display()
            )));
        }
        let mut found = None;
        for candidate in self.candidates(&request.query, request.kind) {
            let accepted = match &self.ffprobe {
                Some(ffprobe) => self.fits(ffprobe, &candidate, request).await,
                None => true,
            };
            if accepted {
                found = Some(candidate);
                break;
            }
        }
        let Some(found) = found else {
            return Ok(None);
        };

        let ext = found
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_else(|| "bin".into());
        let prefix = format!("{}_{}", request.kind.prefix(), slug(&request.query));
        let dest = workspace.transient_path(&prefix, &ext);
        tokio::fs::copy(&found, &dest).await?;
        debug!("Copied {} to {}", found.display(), dest.display());
        Ok(Some(dest))
    }
}

fn words(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1)
        .map(str::to_lowercase)
        .collect()
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| allowed.contains(&e.to_ascii_lowercase().as_str()))
}

/// File-name-safe form of a query, at most 30 characters.
fn slug(query: &str) -> String {
    query
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .take(30)
        .collect()
}
