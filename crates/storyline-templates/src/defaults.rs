//! Templates embedded in the binary.

/// Embedded templates as `(file name, source)` pairs.
pub const EMBEDDED: &[(&str, &str)] = &[
    ("ux.j2", include_str!("../templates/ux.j2")),
    ("adr.j2", include_str!("../templates/adr.j2")),
    ("deep_plan.j2", include_str!("../templates/deep_plan.j2")),
    ("qa_plan.j2", include_str!("../templates/qa_plan.j2")),
    ("threat_model.j2", include_str!("../templates/threat_model.j2")),
    ("devops_plan.j2", include_str!("../templates/devops_plan.j2")),
    ("analytics_spec.j2", include_str!("../templates/analytics_spec.j2")),
    ("traceability.j2", include_str!("../templates/traceability.j2")),
    ("story_shard.j2", include_str!("../templates/story_shard.j2")),
    ("privacy_review.j2", include_str!("../templates/privacy_review.j2")),
    ("qa_design_review.j2", include_str!("../templates/qa_design_review.j2")),
    ("architecture_review.j2", include_str!("../templates/architecture_review.j2")),
    ("devops_runbook.j2", include_str!("../templates/devops_runbook.j2")),
    ("scaffold_readme.j2", include_str!("../templates/scaffold_readme.j2")),
];

/// Looks up an embedded template by file name (e.g. `"ux.j2"`).
pub fn lookup(file_name: &str) -> Option<&'static str> {
    EMBEDDED
        .iter()
        .find(|(name, _)| *name == file_name)
        .map(|(_, source)| *source)
}

/// Names of all embedded templates, without extension.
pub fn names() -> impl Iterator<Item = &'static str> {
    EMBEDDED
        .iter()
        .filter_map(|(name, _)| name.strip_suffix(".j2"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_and_unknown() {
        assert!(lookup("ux.j2").is_some());
        assert!(lookup("ux").is_none());
        assert!(lookup("missing.j2").is_none());
    }

    #[test]
    fn test_names_strip_extension() {
        let names: Vec<_> = names().collect();
        assert_eq!(names.len(), EMBEDDED.len());
        assert!(names.contains(&"story_shard"));
        assert!(names.iter().all(|n| !n.ends_with(".j2")));
    }
}
