//! Insertion windows for supplementary media.
//!
//! [`SlotPlanner`] computes up to `max_inserts` non-overlapping windows in
//! `[avoid_first, duration - avoid_last]`, either purely from sentence
//! boundaries or by fixing up windows proposed by a [`SlotRanker`]. Every
//! returned slot satisfies the duration, range and gap rules in
//! [`InsertRules`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use cf_core::config::InsertRules;
use cf_core::{ceil_tenth, floor_tenth, round_tenth};

use crate::transcript::Transcript;

/// Context is gathered from this long before a slot starts.
const CONTEXT_LEAD: f64 = 3.0;
/// ...and this long after it ends.
const CONTEXT_TRAIL: f64 = 5.0;
const CONTEXT_MAX_CHARS: usize = 300;
const PROPOSAL_QUERY_CHARS: usize = 60;
const DERIVED_QUERY_CHARS: usize = 80;
const FALLBACK_QUERY: &str = "professional b-roll";

/// A validated insertion window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub context_text: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub alternative_queries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl Slot {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A window suggested by a ranking collaborator. Never trusted as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotProposal {
    pub start: f64,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub context_text: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub alternative_queries: Vec<String>,
}

impl SlotProposal {
    /// Parse proposals from collaborator JSON. Entries without a usable
    /// start time are skipped; a non-array document yields nothing.
    pub fn parse_list(doc: &Value) -> Vec<Self> {
        let Some(items) = doc.as_array() else {
            tracing::warn!("Slot proposals are not a list; ignoring");
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| {
                let mut item = item.as_object()?.clone();
                let start = cf_core::parse_timestamp(item.get("start")?)?;
                item.insert("start".into(), Value::from(start));
                let end = item.get("end").and_then(cf_core::parse_timestamp);
                item.insert("end".into(), end.map_or(Value::Null, Value::from));
                serde_json::from_value(Value::Object(item)).ok()
            })
            .collect()
    }
}

/// Suggests insertion moments from a transcript.
#[async_trait]
pub trait SlotRanker: Send + Sync {
    async fn propose(
        &self,
        transcript: &Transcript,
        duration: f64,
        rules: &InsertRules,
    ) -> cf_core::Result<Vec<SlotProposal>>;
}

/// Proposals recorded ahead of time, such as a ranking collaborator's saved
/// output. The transcript and rules are not consulted.
#[derive(Debug, Clone, Default)]
pub struct RecordedProposals(Vec<SlotProposal>);

impl RecordedProposals {
    pub fn new(proposals: Vec<SlotProposal>) -> Self {
        Self(proposals)
    }

    pub fn from_json(json: &str) -> cf_core::Result<Self> {
        let doc: Value = serde_json::from_str(json)
            .map_err(|e| cf_core::Error::Validation(format!("proposals are not valid JSON: {e}")))?;
        Ok(Self(SlotProposal::parse_list(&doc)))
    }

    pub fn load(path: &std::path::Path) -> cf_core::Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

#[async_trait]
impl SlotRanker for RecordedProposals {
    async fn propose(
        &self,
        _: &Transcript,
        _: f64,
        _: &InsertRules,
    ) -> cf_core::Result<Vec<SlotProposal>> {
        Ok(self.0.clone())
    }
}

/// Computes insertion windows under a fixed set of rules.
#[derive(Debug, Clone)]
pub struct SlotPlanner {
    rules: InsertRules,
}

impl SlotPlanner {
    pub fn new(rules: InsertRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &InsertRules {
        &self.rules
    }

    /// Latest allowed slot end, on the tenth grid.
    fn latest_end(&self, duration: f64) -> f64 {
        floor_tenth(duration - self.rules.avoid_last)
    }

    /// Earliest allowed slot start, on the tenth grid.
    fn earliest_start(&self) -> f64 {
        ceil_tenth(self.rules.avoid_first)
    }

    /// `end` moved onto the tenth grid and into the allowed duration range
    /// from `start`. Off-grid when the range is narrower than a tenth.
    fn fit_end(&self, start: f64, end: f64) -> f64 {
        let lo = ceil_tenth(start + self.rules.min_duration);
        let hi = floor_tenth(start + self.rules.max_duration);
        if lo > hi {
            return start + self.rules.clamp_duration(end - start);
        }
        round_tenth(end).clamp(lo, hi)
    }

    /// Deterministic windows snapped to sentence boundaries.
    ///
    /// The valid start range is split into `max_inserts` equal sections; each
    /// section contributes the boundary nearest its midpoint, or the midpoint
    /// itself when no boundary falls inside.
    pub fn plan_from_boundaries(&self, boundaries: &[f64], duration: f64) -> Vec<Slot> {
        let rules = &self.rules;
        let target = rules.target_duration();
        let latest_end = self.latest_end(duration);
        let valid_start = rules.avoid_first;
        let valid_end = latest_end - target;

        if rules.max_inserts == 0 || valid_end <= valid_start {
            tracing::debug!("No room for inserts in {duration:.1}s");
            return Vec::new();
        }

        let section_len = (valid_end - valid_start) / rules.max_inserts as f64;
        let mut slots: Vec<Slot> = Vec::with_capacity(rules.max_inserts);

        for i in 0..rules.max_inserts {
            let section_start = valid_start + i as f64 * section_len;
            let section_end = section_start + section_len;
            let mid = (section_start + section_end) / 2.0;

            let snap = boundaries
                .iter()
                .copied()
                .filter(|b| (section_start..=section_end).contains(b))
                .min_by(|a, b| (a - mid).abs().total_cmp(&(b - mid).abs()))
                .unwrap_or(mid);

            let mut start = round_tenth(snap).max(self.earliest_start());
            if let Some(prev) = slots.last() {
                start = start.max(ceil_tenth(prev.end + rules.min_gap));
            }
            let end = self.fit_end(start, start + target);
            if end > latest_end {
                continue;
            }

            slots.push(Slot {
                start,
                end,
                context_text: String::new(),
                query: String::new(),
                alternative_queries: Vec::new(),
                topic: None,
            });
        }

        slots
    }

    /// Deterministic windows for a transcript, with context text and a
    /// derived search query.
    pub fn plan(&self, transcript: &Transcript, duration: f64) -> Vec<Slot> {
        let mut slots = self.plan_from_boundaries(&transcript.boundaries(), duration);
        for slot in &mut slots {
            slot.context_text = transcript.text_between(
                slot.start - CONTEXT_LEAD,
                slot.end + CONTEXT_TRAIL,
                CONTEXT_MAX_CHARS,
            );
            slot.query = if slot.context_text.is_empty() {
                FALLBACK_QUERY.to_string()
            } else {
                slot.context_text.chars().take(DERIVED_QUERY_CHARS).collect()
            };
        }
        tracing::info!(
            "Insert slots (deterministic): {:?}",
            slots.iter().map(|s| (s.start, s.end)).collect::<Vec<_>>()
        );
        slots
    }

    /// Force proposed windows into the rules: sort by start, clamp into the
    /// valid range, clamp the duration, push later starts forward to keep the
    /// gap, drop what no longer fits, and keep at most `max_inserts`.
    pub fn fix_proposals(&self, mut proposals: Vec<SlotProposal>, duration: f64) -> Vec<Slot> {
        let rules = &self.rules;
        let target = rules.target_duration();
        let latest_end = self.latest_end(duration);
        proposals.retain(|p| p.start.is_finite());
        proposals.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut slots: Vec<Slot> = Vec::new();
        for proposal in proposals {
            if slots.len() == rules.max_inserts {
                break;
            }

            let mut start = ceil_tenth(proposal.start.max(self.earliest_start()));
            let proposed_end = proposal.end.unwrap_or(start + target).min(latest_end);
            let mut end = self.fit_end(start, proposed_end);

            if let Some(prev) = slots.last() {
                let earliest = ceil_tenth(prev.end + rules.min_gap);
                if start < earliest {
                    start = earliest;
                    end = self.fit_end(start, start + target);
                }
            }
            if end > latest_end {
                continue;
            }

            let query = [proposal.query.trim(), proposal.topic.as_deref().unwrap_or("").trim()]
                .into_iter()
                .find(|q| !q.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| {
                    proposal.context_text.trim().chars().take(PROPOSAL_QUERY_CHARS).collect()
                });

            slots.push(Slot {
                start,
                end,
                context_text: proposal.context_text,
                query,
                alternative_queries: proposal.alternative_queries,
                topic: proposal.topic,
            });
        }

        slots
    }

    /// Windows suggested by `ranker`, fixed up; falls back to
    /// [`SlotPlanner::plan`] when the ranker fails or nothing survives.
    ///
    /// With a non-empty transcript, a proposal needs at least
    /// `min_topic_sec` of speech around it; proposals over silence are
    /// dropped.
    pub async fn plan_with(
        &self,
        ranker: &dyn SlotRanker,
        transcript: &Transcript,
        duration: f64,
    ) -> Vec<Slot> {
        let mut proposals = match ranker.propose(transcript, duration, &self.rules).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Slot ranking failed ({e}); using deterministic slots");
                return self.plan(transcript, duration);
            }
        };

        if !transcript.segments.is_empty() {
            let target = self.rules.target_duration();
            proposals.retain(|p| {
                let end = p.end.unwrap_or(p.start + target);
                let speech = transcript.speech_within(p.start - CONTEXT_LEAD, end + CONTEXT_TRAIL);
                if speech < self.rules.min_topic_sec {
                    tracing::debug!("Dropping proposal at {:.1}s: only {speech:.1}s of speech", p.start);
                }
                speech >= self.rules.min_topic_sec
            });
        }

        let slots = self.fix_proposals(proposals, duration);
        if slots.is_empty() {
            tracing::warn!("No proposed slot survived the rules; using deterministic slots");
            return self.plan(transcript, duration);
        }

        tracing::info!(
            "Insert slots (ranked): {:?}",
            slots
                .iter()
                .map(|s| (s.start, s.end, s.topic.as_deref().unwrap_or("")))
                .collect::<Vec<_>>()
        );
        slots
    }
}
