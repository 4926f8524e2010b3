//! PRD parser: markdown PRD text to a [`Backlog`].
//!
//! Structure is read from headings and bullets only:
//!
//! - every `## ` heading opens an epic, and non-blank text before the first
//!   one is an epic of its own;
//! - inside an epic, a heading whose text starts with `Stories` opens the
//!   stories block and one starting with `Acceptance` opens the acceptance
//!   block (any heading level, case-insensitive);
//! - `- ` bullets in the stories block are story titles, `- ` bullets in the
//!   acceptance block are criteria for the most recent story;
//! - all other lines outside both blocks form the epic description.
//!
//! Parsing never fails: any text yields a backlog with at least one epic
//! and one story per epic.

use crate::error::{Result, StorylineError};
use crate::model::{Backlog, Epic, EpicId, Story, StoryId};
use crate::tools::store::ArtifactStore;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

static EPIC_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^## +").expect("epic heading pattern is valid"));
static STORIES_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^#+ +Stories").expect("stories heading pattern is valid"));
static ACCEPTANCE_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^#+ +Acceptance").expect("acceptance heading pattern is valid")
});

/// Title used when the PRD has no `## ` headings at all.
pub const FALLBACK_EPIC_TITLE: &str = "Product";

/// Title used for a synthesized story when a section has no text.
pub const FALLBACK_STORY_TITLE: &str = "Initial Story";

const SYNTHESIZED_TITLE_CHARS: usize = 60;

/// Parses PRD text into a backlog.
///
/// Ids are assigned sequentially from 1, epics and stories each counting
/// separately, in document order.
pub fn parse_prd(text: &str) -> Backlog {
    let sections = split_sections(text);
    let mut next_story: StoryId = 1;
    let mut epics = Vec::with_capacity(sections.len());

    for (index, (title, body)) in sections.into_iter().enumerate() {
        let epic_id = index as EpicId + 1;
        let parsed = parse_section(body);

        let stories = parsed
            .stories
            .into_iter()
            .map(|(story_title, criteria)| {
                let mut story = Story::new(next_story, epic_id, story_title);
                story.acceptance_criteria = criteria;
                next_story += 1;
                story
            })
            .collect();

        epics.push(Epic {
            id: epic_id,
            title,
            description: parsed.description,
            stories,
        });
    }

    Backlog { epics }
}

/// Reads and parses a PRD document.
///
/// # Errors
///
/// Returns `StorylineError::PrdNotFound` if the document does not exist.
#[tracing::instrument(skip(store), fields(path = %path.display()))]
pub fn parse_prd_file(store: &dyn ArtifactStore, path: &Path) -> Result<Backlog> {
    if !store.exists(path) {
        return Err(StorylineError::PrdNotFound(path.to_path_buf()));
    }

    let text = store.read_to_string(path)?;
    let backlog = parse_prd(&text);
    info!(
        epics = backlog.epics.len(),
        stories = backlog.story_count(),
        "PRD parsed"
    );
    Ok(backlog)
}

/// Splits text into `(title, body)` pairs on `## ` headings.
///
/// Non-blank text before the first heading is a section of its own, titled
/// with its first non-blank line. Sections with no text are skipped. With no
/// usable section the whole text is a single [`FALLBACK_EPIC_TITLE`] section.
fn split_sections(text: &str) -> Vec<(String, &str)> {
    let starts: Vec<_> = EPIC_HEADING.find_iter(text).collect();
    if starts.is_empty() {
        return vec![(FALLBACK_EPIC_TITLE.to_string(), text)];
    }

    let preamble = text[..starts[0].start()].trim_start();
    let sections = starts.iter().enumerate().map(|(i, m)| {
        let end = starts.get(i + 1).map_or(text.len(), |next| next.start());
        &text[m.end()..end]
    });

    let parts: Vec<(String, &str)> = std::iter::once(preamble)
        .chain(sections)
        .filter(|part| {
            let blank = part.trim().is_empty();
            if blank {
                debug!("Skipping empty PRD section");
            }
            !blank
        })
        .map(|part| {
            let (heading, body) = part.split_once('\n').unwrap_or((part, ""));
            (heading.trim().to_string(), body)
        })
        .collect();

    if parts.is_empty() {
        return vec![(FALLBACK_EPIC_TITLE.to_string(), text)];
    }
    parts
}

#[derive(Debug, Default)]
struct ParsedSection {
    description: String,
    stories: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Description,
    Stories,
    Acceptance,
}

fn parse_section(body: &str) -> ParsedSection {
    let mut block = Block::Description;
    let mut description: Vec<&str> = Vec::new();
    let mut stories: Vec<(String, Vec<String>)> = Vec::new();
    let mut open: Option<String> = None;
    let mut criteria: Vec<String> = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim();

        if STORIES_HEADING.is_match(trimmed) {
            block = Block::Stories;
            continue;
        }
        if ACCEPTANCE_HEADING.is_match(trimmed) {
            block = Block::Acceptance;
            continue;
        }

        match (block, trimmed.strip_prefix("- ")) {
            (Block::Stories, Some(title)) => {
                if let Some(previous) = open.take() {
                    stories.push((previous, std::mem::take(&mut criteria)));
                }
                criteria.clear();
                open = Some(title.to_string());
            }
            (Block::Acceptance, Some(criterion)) => criteria.push(criterion.to_string()),
            (Block::Description, _) => description.push(line),
            _ => {}
        }
    }

    if let Some(last) = open {
        stories.push((last, criteria));
    }

    let description = description.join("\n").trim().to_string();

    if stories.is_empty() {
        stories.push((synthesized_title(&description), Vec::new()));
    }

    ParsedSection {
        description,
        stories,
    }
}

fn synthesized_title(description: &str) -> String {
    description
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.chars().take(SYNTHESIZED_TITLE_CHARS).collect())
        .unwrap_or_else(|| FALLBACK_STORY_TITLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use crate::tools::store_memory::MemoryArtifactStore;

    const PRD: &str = "\
## Accounts
Users manage their accounts.

### Stories
- Sign up
- Sign in

### Acceptance Criteria
- Password is checked

## Catalog
Browse products.

### Stories
- List products
";

    #[test]
    fn test_parse_epics_and_stories() {
        let backlog = parse_prd(PRD);

        assert_eq!(backlog.epics.len(), 2);
        assert_eq!(backlog.epics[0].title, "Accounts");
        assert_eq!(backlog.epics[0].description, "Users manage their accounts.");
        assert_eq!(backlog.epics[1].title, "Catalog");

        let titles: Vec<_> = backlog.stories().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Sign up", "Sign in", "List products"]);
        let ids: Vec<_> = backlog.stories().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(backlog.find_story(3).unwrap().epic_id, 2);
    }

    #[test]
    fn test_acceptance_attaches_to_latest_story() {
        let backlog = parse_prd(PRD);
        assert!(backlog.find_story(1).unwrap().acceptance_criteria.is_empty());
        assert_eq!(
            backlog.find_story(2).unwrap().acceptance_criteria,
            vec!["Password is checked"]
        );
    }

    #[test]
    fn test_acceptance_before_first_story_is_dropped() {
        let text = "## E\n### Acceptance\n- X\n### Stories\n- S\n";
        let backlog = parse_prd(text);

        assert_eq!(backlog.epics.len(), 1);
        let stories: Vec<_> = backlog.stories().collect();
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].title, "S");
        assert!(stories[0].acceptance_criteria.is_empty());
        assert_eq!(backlog.epics[0].description, "");
    }

    #[test]
    fn test_no_headings_single_product_epic() {
        let text = "A tool that does one thing well.\nMore words.";
        let backlog = parse_prd(text);

        assert_eq!(backlog.epics.len(), 1);
        assert_eq!(backlog.epics[0].title, FALLBACK_EPIC_TITLE);
        assert_eq!(backlog.story_count(), 1);
        assert_eq!(
            backlog.find_story(1).unwrap().title,
            "A tool that does one thing well."
        );
    }

    #[test]
    fn test_empty_text_yields_initial_story() {
        let backlog = parse_prd("");
        assert_eq!(backlog.epics.len(), 1);
        assert_eq!(backlog.find_story(1).unwrap().title, FALLBACK_STORY_TITLE);
    }

    #[test]
    fn test_synthesized_title_truncated() {
        let long = "x".repeat(100);
        let backlog = parse_prd(&format!("## Big\n\n{long}\n"));
        let story = backlog.find_story(1).unwrap();
        assert_eq!(story.title.chars().count(), 60);
        assert_eq!(backlog.epics[0].description, long);
    }

    #[test]
    fn test_section_without_body_gets_initial_story() {
        let backlog = parse_prd("## Lonely\n## Next\nSome text\n");
        assert_eq!(backlog.epics.len(), 2);
        assert_eq!(backlog.find_story(1).unwrap().title, FALLBACK_STORY_TITLE);
        assert_eq!(backlog.find_story(2).unwrap().title, "Some text");
    }

    #[test]
    fn test_preamble_becomes_first_epic() {
        let text = "# Shop PRD\nA storefront for small sellers.\n\n## Accounts\n### Stories\n- Sign in\n";
        let backlog = parse_prd(text);

        let titles: Vec<_> = backlog.epics.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["# Shop PRD", "Accounts"]);
        assert_eq!(backlog.epics[0].description, "A storefront for small sellers.");
        assert_eq!(
            backlog.find_story(1).unwrap().title,
            "A storefront for small sellers."
        );
        assert_eq!(backlog.find_story(2).unwrap().title, "Sign in");
        assert_eq!(backlog.find_story(2).unwrap().epic_id, 2);
    }

    #[test]
    fn test_blank_preamble_and_sections_are_skipped() {
        let backlog = parse_prd("\n\n## \n## B\n### Stories\n- S\n");

        let titles: Vec<_> = backlog.epics.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["B"]);
        assert_eq!(backlog.epics[0].id, 1);
        assert_eq!(backlog.find_story(1).unwrap().title, "S");
    }

    #[test]
    fn test_only_blank_sections_fall_back_to_product() {
        let backlog = parse_prd("## \n");
        assert_eq!(backlog.epics.len(), 1);
        assert_eq!(backlog.epics[0].title, FALLBACK_EPIC_TITLE);
        assert_eq!(backlog.story_count(), 1);
    }

    #[test]
    fn test_non_bullet_lines_in_blocks_are_ignored() {
        let text = "## E\n### Stories\nnarrative\n- A\n* not a bullet\n";
        let backlog = parse_prd(text);
        assert_eq!(backlog.story_count(), 1);
        assert_eq!(backlog.epics[0].description, "");
    }

    #[test]
    fn test_headings_are_case_insensitive() {
        // "user stories" does not start with "Stories", so it stays description.
        let text = "## E\n#### user stories\n- ignored\n";
        let backlog = parse_prd(text);
        assert!(backlog.epics[0].description.contains("- ignored"));

        let text = "## E\n### STORIES\n- A\n#### acceptance criteria\n- ok\n";
        let backlog = parse_prd(text);
        assert_eq!(backlog.find_story(1).unwrap().acceptance_criteria, vec!["ok"]);
    }

    #[test]
    fn test_parsed_story_defaults() {
        let backlog = parse_prd(PRD);
        for story in backlog.stories() {
            assert_eq!(story.priority, Priority::Should);
            assert!(story.dependencies.is_empty());
            assert!(story.risks.is_empty());
            assert_eq!(story.description, "");
            assert_eq!(story.estimate, None);
        }
    }

    #[test]
    fn test_parse_is_deterministic() {
        assert_eq!(parse_prd(PRD), parse_prd(PRD));
    }

    #[test]
    fn test_parse_prd_file_missing() {
        let store = MemoryArtifactStore::new();
        let result = parse_prd_file(&store, Path::new("docs/prd.md"));
        assert!(matches!(result, Err(StorylineError::PrdNotFound(_))));
    }

    #[test]
    fn test_parse_prd_file() {
        let store = MemoryArtifactStore::with_files([("docs/prd.md", PRD)]);
        let backlog = parse_prd_file(&store, Path::new("docs/prd.md")).unwrap();
        assert_eq!(backlog.story_count(), 3);
    }
}
