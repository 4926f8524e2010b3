//! Heuristic backlog enrichment and proposals.
//!
//! Enrichment fills in estimates and priorities from keywords and the
//! number of acceptance criteria. The result is written as a proposal and
//! only reaches the backlog store when accepted.

use crate::error::{Result, StorylineError};
use crate::model::{Backlog, Epic, Priority, Story, StoryId};
use crate::tools::store::ArtifactStore;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Proposed backlog document.
pub const PROPOSED_BACKLOG_JSON: &str = "docs/proposals/proposed-backlog.json";

/// Human-readable summary of the proposed backlog.
pub const PROPOSED_BACKLOG_MD: &str = "docs/proposals/proposed-backlog.md";

const HEAVY_KEYWORDS: [&str; 5] = ["auth", "payment", "security", "integration", "migration"];

const MUST_KEYWORDS: [&str; 8] = [
    "must", "mvp", "core", "login", "signup", "sign up", "sign-in", "signin",
];

const COULD_KEYWORDS: [&str; 3] = ["optional", "nice to have", "could"];

/// Returns an enriched copy of `backlog`.
///
/// Status board fields are cleared in the copy.
pub fn enrich_backlog(backlog: &Backlog) -> Backlog {
    Backlog {
        epics: backlog
            .epics
            .iter()
            .map(|epic| Epic {
                id: epic.id,
                title: epic.title.clone(),
                description: epic.description.clone(),
                stories: epic.stories.iter().map(enrich_story).collect(),
            })
            .collect(),
    }
}

fn enrich_story(story: &Story) -> Story {
    let text = format!("{} {}", story.title, story.description).to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| text.contains(k));

    let base = story.estimate.unwrap_or(1.0);
    let floor = if mentions(&HEAVY_KEYWORDS) {
        3.0
    } else {
        match story.acceptance_criteria.len() {
            n if n >= 3 => 3.0,
            2 => 2.0,
            _ => 1.0,
        }
    };

    let priority = if mentions(&MUST_KEYWORDS) {
        Priority::Must
    } else if mentions(&COULD_KEYWORDS) {
        Priority::Could
    } else {
        story.priority
    };

    Story {
        estimate: Some(base.max(floor)),
        priority,
        phase: None,
        owner: None,
        next_owner: None,
        gate: None,
        ..story.clone()
    }
}

/// First story, in traversal order, that has no dependencies.
pub fn select_next_story(backlog: &Backlog) -> Option<&Story> {
    backlog.stories().find(|story| story.dependencies.is_empty())
}

/// Writes the proposal documents for an enriched backlog.
///
/// # Returns
///
/// The two paths written, JSON first.
pub fn write_proposals(store: &dyn ArtifactStore, enriched: &Backlog) -> Result<[PathBuf; 2]> {
    let json = PathBuf::from(PROPOSED_BACKLOG_JSON);
    let md = PathBuf::from(PROPOSED_BACKLOG_MD);
    store.write(&json, &enriched.to_json()?)?;
    store.write(&md, &render_proposals(enriched))?;
    Ok([json, md])
}

/// Reads the proposed backlog, if one has been generated.
///
/// # Errors
///
/// Returns `StorylineError::CorruptedBacklog` if the document does not
/// parse.
pub fn read_proposals(store: &dyn ArtifactStore) -> Result<Option<Backlog>> {
    let path = Path::new(PROPOSED_BACKLOG_JSON);
    if !store.exists(path) {
        return Ok(None);
    }
    let text = store.read_to_string(path)?;
    Backlog::from_json(&text)
        .map(Some)
        .map_err(|e| StorylineError::CorruptedBacklog {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Copies proposed estimates and priorities into `current`.
///
/// When `only_ids` is non-empty only those stories are touched. Stories
/// missing from the proposal are left alone.
///
/// # Returns
///
/// Ids of the updated stories, ascending.
pub fn accept_proposals(
    current: &mut Backlog,
    proposed: &Backlog,
    only_ids: &BTreeSet<StoryId>,
) -> Vec<StoryId> {
    let mut updated = Vec::new();
    for story in current.epics.iter_mut().flat_map(|epic| epic.stories.iter_mut()) {
        if !only_ids.is_empty() && !only_ids.contains(&story.id) {
            continue;
        }
        if let Some(proposal) = proposed.find_story(story.id) {
            story.estimate = proposal.estimate;
            story.priority = proposal.priority;
            updated.push(story.id);
        }
    }
    updated.sort_unstable();
    updated
}

/// Manual edits to the proposed backlog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Refinement {
    /// When non-empty, only these stories stay in the proposal.
    pub accept: BTreeSet<StoryId>,
    /// Stories dropped from the proposal.
    pub reject: BTreeSet<StoryId>,
    pub estimates: BTreeMap<StoryId, f64>,
    pub priorities: BTreeMap<StoryId, Priority>,
}

/// Applies `refinement` to a proposed backlog in place.
///
/// Rejections apply first, then estimate and priority overrides, then the
/// accept filter. Edits naming a story that is not in the proposal are
/// ignored. Epics left without stories are kept.
///
/// # Errors
///
/// Returns `StorylineError::InvalidEstimate` if an estimate is not a
/// positive finite number. Nothing is changed in that case.
pub fn refine_proposals(proposed: &mut Backlog, refinement: &Refinement) -> Result<()> {
    if let Some((&story_id, &value)) = refinement
        .estimates
        .iter()
        .find(|(_, value)| !value.is_finite() || **value <= 0.0)
    {
        return Err(StorylineError::InvalidEstimate { story_id, value });
    }

    for epic in &mut proposed.epics {
        epic.stories.retain(|story| !refinement.reject.contains(&story.id));
    }
    for (&id, &estimate) in &refinement.estimates {
        match proposed.find_story_mut(id) {
            Some(story) => story.estimate = Some(estimate),
            None => debug!(story_id = id, "Estimate for unknown story ignored"),
        }
    }
    for (&id, &priority) in &refinement.priorities {
        match proposed.find_story_mut(id) {
            Some(story) => story.priority = priority,
            None => debug!(story_id = id, "Priority for unknown story ignored"),
        }
    }
    if !refinement.accept.is_empty() {
        for epic in &mut proposed.epics {
            epic.stories.retain(|story| refinement.accept.contains(&story.id));
        }
    }
    Ok(())
}

fn render_proposals(backlog: &Backlog) -> String {
    let mut out = String::from("# Proposed Backlog (Enriched)\n");
    for epic in &backlog.epics {
        let _ = write!(out, "\n## {}. {}\n", epic.id, epic.title);
        for story in &epic.stories {
            let _ = writeln!(
                out,
                "- Story {}: {} (priority={}, pts={})",
                story.id,
                story.title,
                story.priority,
                story.points()
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::store_memory::MemoryArtifactStore;

    fn story(id: StoryId, title: &str, criteria: usize) -> Story {
        let mut story = Story::new(id, 1, title);
        story.acceptance_criteria = (0..criteria).map(|i| format!("c{i}")).collect();
        story
    }

    fn backlog(stories: Vec<Story>) -> Backlog {
        Backlog {
            epics: vec![Epic {
                id: 1,
                title: "Core".to_string(),
                description: String::new(),
                stories,
            }],
        }
    }

    #[test]
    fn test_estimate_heuristics() {
        let enriched = enrich_backlog(&backlog(vec![
            story(1, "Payment capture", 0),
            story(2, "Profile page", 3),
            story(3, "Avatar", 2),
            story(4, "Footer", 0),
        ]));
        let estimates: Vec<_> = enriched.stories().map(|s| s.estimate).collect();
        assert_eq!(estimates, vec![Some(3.0), Some(3.0), Some(2.0), Some(1.0)]);
    }

    #[test]
    fn test_existing_estimate_is_a_floor() {
        let mut big = story(1, "Footer", 0);
        big.estimate = Some(8.0);
        let enriched = enrich_backlog(&backlog(vec![big]));
        assert_eq!(enriched.stories().next().unwrap().estimate, Some(8.0));
    }

    #[test]
    fn test_priority_heuristics() {
        let mut pinned = story(3, "Footer", 0);
        pinned.priority = Priority::Could;
        let enriched = enrich_backlog(&backlog(vec![
            story(1, "User login", 0),
            story(2, "Optional dark mode", 0),
            pinned,
            story(4, "Footer links", 0),
        ]));
        let priorities: Vec<_> = enriched.stories().map(|s| s.priority).collect();
        assert_eq!(
            priorities,
            vec![Priority::Must, Priority::Could, Priority::Could, Priority::Should]
        );
    }

    #[test]
    fn test_enrich_clears_status_fields() {
        let mut tracked = story(1, "Footer", 0);
        tracked.owner = Some("dev".to_string());
        tracked.gate = Some("PASS".to_string());
        let enriched = enrich_backlog(&backlog(vec![tracked]));
        let story = enriched.stories().next().unwrap();
        assert!(story.owner.is_none());
        assert!(story.gate.is_none());
    }

    #[test]
    fn test_select_next_story_skips_dependent() {
        let mut first = story(1, "A", 0);
        first.dependencies.insert(2);
        let backlog = backlog(vec![first, story(2, "B", 0)]);
        assert_eq!(select_next_story(&backlog).map(|s| s.id), Some(2));
        assert!(select_next_story(&Backlog::default()).is_none());
    }

    #[test]
    fn test_accept_proposals_with_filter() {
        let mut current = backlog(vec![story(1, "Login", 0), story(2, "Footer", 2)]);
        let proposed = enrich_backlog(&current);

        let updated = accept_proposals(&mut current, &proposed, &BTreeSet::from([2]));

        assert_eq!(updated, vec![2]);
        assert_eq!(current.find_story(1).unwrap().priority, Priority::Should);
        assert_eq!(current.find_story(2).unwrap().estimate, Some(2.0));
    }

    #[test]
    fn test_proposals_round_trip() {
        let store = MemoryArtifactStore::new();
        let enriched = enrich_backlog(&backlog(vec![story(1, "Login", 0)]));
        write_proposals(&store, &enriched).unwrap();

        assert_eq!(read_proposals(&store).unwrap(), Some(enriched));
        let md = store.read_to_string(Path::new(PROPOSED_BACKLOG_MD)).unwrap();
        assert!(md.contains("- Story 1: Login (priority=must, pts=1)"));
    }

    #[test]
    fn test_refine_proposals_applies_edits() {
        let mut proposed = enrich_backlog(&backlog(vec![
            story(1, "Login", 0),
            story(2, "Footer", 0),
            story(3, "Avatar", 2),
        ]));
        let refinement = Refinement {
            reject: BTreeSet::from([2]),
            estimates: BTreeMap::from([(3, 5.0), (9, 1.0)]),
            priorities: BTreeMap::from([(1, Priority::Could)]),
            ..Refinement::default()
        };

        refine_proposals(&mut proposed, &refinement).unwrap();

        let ids: Vec<_> = proposed.stories().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(proposed.find_story(3).unwrap().estimate, Some(5.0));
        assert_eq!(proposed.find_story(1).unwrap().priority, Priority::Could);
    }

    #[test]
    fn test_refine_proposals_accept_keeps_only_listed() {
        let mut proposed = enrich_backlog(&backlog(vec![story(1, "Login", 0), story(2, "Footer", 0)]));
        let refinement = Refinement {
            accept: BTreeSet::from([2]),
            ..Refinement::default()
        };

        refine_proposals(&mut proposed, &refinement).unwrap();

        assert_eq!(proposed.stories().map(|s| s.id).collect::<Vec<_>>(), vec![2]);
        assert_eq!(proposed.epics.len(), 1);
    }

    #[test]
    fn test_refine_proposals_rejects_bad_estimate() {
        let before = enrich_backlog(&backlog(vec![story(1, "Login", 0), story(2, "Footer", 0)]));
        let mut proposed = before.clone();
        let refinement = Refinement {
            reject: BTreeSet::from([1]),
            estimates: BTreeMap::from([(2, 0.0)]),
            ..Refinement::default()
        };

        let result = refine_proposals(&mut proposed, &refinement);

        assert!(matches!(
            result,
            Err(StorylineError::InvalidEstimate { story_id: 2, .. })
        ));
        assert_eq!(proposed, before);
    }
}
