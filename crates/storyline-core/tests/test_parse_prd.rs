//! Integration tests for PRD parsing through the artifact store.

use std::path::Path;
use storyline_core::parser::{self, FALLBACK_EPIC_TITLE};
use storyline_core::{MemoryArtifactStore, Priority, StorylineError};

const PRD: &str = "\
# Acme Portal

Intro text that belongs to no epic.

## Accounts
People need accounts.

### Stories
- Register with email
- Sign in

### Acceptance Criteria
- Session lasts 30 days
- Failed attempts are rate limited

## Billing
### Acceptance Criteria
- Dropped because no story precedes it

### Stories
- Pay invoice by card
";

#[test]
fn test_parse_prd_file_builds_backlog() {
    let store = MemoryArtifactStore::with_files([("docs/PRD.md", PRD)]);

    let backlog = parser::parse_prd_file(&store, Path::new("docs/PRD.md")).unwrap();

    let titles: Vec<&str> = backlog.epics.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["# Acme Portal", "Accounts", "Billing"]);
    assert_eq!(backlog.epics[0].description, "Intro text that belongs to no epic.");
    assert_eq!(backlog.epics[1].description, "People need accounts.");

    let stories: Vec<_> = backlog.stories().collect();
    assert_eq!(stories.len(), 4);
    assert_eq!(
        stories.iter().map(|s| s.id).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
    assert_eq!(stories[0].title, "Intro text that belongs to no epic.");
    assert_eq!(stories[0].epic_id, 1);
    assert!(stories[1].acceptance_criteria.is_empty());
    assert_eq!(
        stories[2].acceptance_criteria,
        vec!["Session lasts 30 days", "Failed attempts are rate limited"]
    );
    assert_eq!(stories[3].title, "Pay invoice by card");
    assert_eq!(stories[3].epic_id, 3);
    assert!(stories[3].acceptance_criteria.is_empty());
    assert!(stories.iter().all(|s| s.priority == Priority::Should));
}

#[test]
fn test_blank_sections_do_not_consume_ids() {
    let backlog = parser::parse_prd("## \n\n## Billing\n### Stories\n- Pay invoice by card\n");

    assert_eq!(backlog.epics.len(), 1);
    assert_eq!(backlog.epics[0].id, 1);
    assert_eq!(backlog.epics[0].title, "Billing");
    assert_eq!(backlog.find_story(1).unwrap().title, "Pay invoice by card");
}

#[test]
fn test_parse_is_idempotent() {
    let first = parser::parse_prd(PRD);
    let second = parser::parse_prd(PRD);
    assert_eq!(first, second);
}

#[test]
fn test_prd_without_sections() {
    let backlog = parser::parse_prd("Just a paragraph about the product.\n");

    assert_eq!(backlog.epics.len(), 1);
    assert_eq!(backlog.epics[0].title, FALLBACK_EPIC_TITLE);
    assert_eq!(backlog.story_count(), 1);
}

#[test]
fn test_missing_prd_is_reported() {
    let store = MemoryArtifactStore::new();
    let err = parser::parse_prd_file(&store, Path::new("docs/PRD.md")).unwrap_err();
    assert!(matches!(err, StorylineError::PrdNotFound(_)));
}
