//! Named artifacts for one plan run.
//!
//! The registry maps output names to files, tracks the `current` chain
//! artifact, and owns every transient file the run creates so they can all
//! be removed when the run ends. It is created per run and is never shared.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use cf_av::Workspace;
use cf_plan::{ChainEffect, SOURCE};

/// Lifecycle of a produced file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// Declared by a task that has not run yet.
    Pending,
    /// Written and available for reference.
    Produced,
    /// Removed at the end of the run.
    Cleaned,
    /// Kept as the run's final output.
    Persisted,
}

#[derive(Debug)]
struct Transient {
    path: PathBuf,
    state: ArtifactState,
}

/// Name-to-artifact map owned by a single run.
#[derive(Debug)]
pub struct ArtifactRegistry {
    names: HashMap<String, PathBuf>,
    /// Published names in first-publication order, `source` excluded.
    order: Vec<String>,
    declared: HashSet<String>,
    blocked: HashSet<String>,
    current: PathBuf,
    transients: Vec<Transient>,
}

impl ArtifactRegistry {
    /// Seed a registry with `source` bound to the original input. `declared`
    /// lists every name the plan will publish.
    pub fn new(source: &Path, declared: impl IntoIterator<Item = String>) -> Self {
        let mut names = HashMap::new();
        names.insert(SOURCE.to_string(), source.to_path_buf());
        Self {
            names,
            order: Vec::new(),
            declared: declared.into_iter().collect(),
            blocked: HashSet::new(),
            current: source.to_path_buf(),
            transients: Vec::new(),
        }
    }

    /// The artifact most recently published under `name`.
    pub fn resolve(&self, name: &str) -> Option<&Path> {
        self.names.get(name).map(PathBuf::as_path)
    }

    /// Default input for tasks without `inputs`.
    pub fn current(&self) -> &Path {
        &self.current
    }

    /// State of a named artifact: `Pending` while declared but unpublished.
    pub fn state(&self, name: &str) -> Option<ArtifactState> {
        match self.names.get(name) {
            Some(path) => Some(
                self.transients
                    .iter()
                    .rev()
                    .find(|t| &t.path == path)
                    .map_or(ArtifactState::Produced, |t| t.state),
            ),
            None if self.declared.contains(name) => Some(ArtifactState::Pending),
            None => None,
        }
    }

    /// Whether a task in the plan publishes `name`.
    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains(name)
    }

    /// Names currently resolvable, `source` first.
    pub fn available(&self) -> Vec<String> {
        std::iter::once(SOURCE.to_string())
            .chain(self.order.iter().cloned())
            .collect()
    }

    /// Published names in order, without `source`.
    pub fn produced_names(&self) -> &[String] {
        &self.order
    }

    /// Record that `name` will never be produced because no content was found.
    pub fn block(&mut self, name: &str) {
        self.blocked.insert(name.to_string());
    }

    pub fn is_blocked(&self, name: &str) -> bool {
        self.blocked.contains(name)
    }

    /// Take ownership of a file created for this run. It is removed by
    /// [`ArtifactRegistry::cleanup`] unless persisted.
    pub fn track(&mut self, path: PathBuf) {
        if !self.transients.iter().any(|t| t.path == path) {
            self.transients.push(Transient {
                path,
                state: ArtifactState::Produced,
            });
        }
    }

    /// Publish a produced artifact under its task's name and advance the
    /// chain unless it is a side artifact.
    pub fn publish(&mut self, name: Option<&str>, path: &Path, effect: ChainEffect) {
        if let Some(name) = name {
            if self
                .names
                .insert(name.to_string(), path.to_path_buf())
                .is_none()
            {
                self.order.push(name.to_string());
            }
            self.blocked.remove(name);
        }
        if effect == ChainEffect::MainChain {
            self.current = path.to_path_buf();
        }
    }

    /// Mark the transient at `path` as the persisted output.
    pub fn persist(&mut self, path: &Path) {
        for t in self.transients.iter_mut().filter(|t| t.path == path) {
            t.state = ArtifactState::Persisted;
        }
    }

    /// Remove every owned file that was not persisted. Returns how many were
    /// cleaned. Failures to delete are logged, never raised.
    pub fn cleanup(&mut self, workspace: &Workspace) -> usize {
        let mut cleaned = 0;
        for t in self
            .transients
            .iter_mut()
            .filter(|t| t.state == ArtifactState::Produced)
        {
            match workspace.discard(&t.path) {
                Ok(()) => {
                    t.state = ArtifactState::Cleaned;
                    cleaned += 1;
                }
                Err(e) => tracing::warn!("Failed to remove {}: {e}", t.path.display()),
            }
        }
        tracing::debug!("Cleaned {cleaned} transient file(s)");
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_source() {
        let reg = ArtifactRegistry::new(Path::new("/in.mp4"), ["a".to_string()]);
        assert_eq!(reg.current(), Path::new("/in.mp4"));
        assert_eq!(reg.resolve("source"), Some(Path::new("/in.mp4")));
        assert_eq!(reg.state("a"), Some(ArtifactState::Pending));
        assert_eq!(reg.state("b"), None);
        assert_eq!(reg.available(), vec!["source".to_string()]);
    }

    #[test]
    fn side_artifacts_do_not_move_the_chain() {
        let mut reg = ArtifactRegistry::new(Path::new("/in.mp4"), []);
        reg.publish(Some("broll"), Path::new("/s/broll.mp4"), ChainEffect::SideArtifact);
        assert_eq!(reg.current(), Path::new("/in.mp4"));
        reg.publish(None, Path::new("/s/step.mp4"), ChainEffect::MainChain);
        assert_eq!(reg.current(), Path::new("/s/step.mp4"));
        assert_eq!(reg.produced_names(), ["broll".to_string()]);
    }

    #[test]
    fn republishing_rebinds_name() {
        let mut reg = ArtifactRegistry::new(Path::new("/in.mp4"), []);
        reg.publish(Some("x"), Path::new("/1.mp4"), ChainEffect::MainChain);
        reg.publish(Some("x"), Path::new("/2.mp4"), ChainEffect::MainChain);
        assert_eq!(reg.resolve("x"), Some(Path::new("/2.mp4")));
        assert_eq!(reg.produced_names().len(), 1);
    }

    #[test]
    fn cleanup_spares_persisted() {
        let ws = Workspace::new().unwrap();
        let a = ws.transient_path("a", "mp4");
        let b = ws.transient_path("b", "mp4");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        let mut reg = ArtifactRegistry::new(Path::new("/in.mp4"), ["x".to_string()]);
        reg.track(a.clone());
        reg.track(b.clone());
        reg.publish(Some("x"), &a, ChainEffect::MainChain);
        reg.persist(&b);

        assert_eq!(reg.cleanup(&ws), 1);
        assert!(!a.exists());
        assert!(b.exists());
        assert_eq!(reg.state("x"), Some(ArtifactState::Cleaned));
    }
}
