//! Stage chain helpers.
//!
//! A module's chain is its enabled stages in ordinal order. These helpers
//! operate on the ordinal-sorted slice returned by the stage store.

use onestop_types::{ReviewStage, StageName};

/// The entry stage of a module's chain.
pub fn first_enabled(stages: &[ReviewStage]) -> Option<&ReviewStage> {
    stages.iter().find(|stage| stage.enabled)
}

/// Look up a stage by name, enabled or not.
pub fn find_stage<'a>(stages: &'a [ReviewStage], name: &StageName) -> Option<&'a ReviewStage> {
    stages.iter().find(|stage| &stage.name == name)
}

/// The next enabled stage strictly after `current`'s ordinal.
///
/// Returns `None` when `current` is unknown or nothing enabled follows it.
/// A disabled `current` still anchors the search; a stage disabled while a
/// review sits on it keeps its place in the chain.
pub fn next_enabled_after<'a>(
    stages: &'a [ReviewStage],
    current: &StageName,
) -> Option<&'a ReviewStage> {
    let anchor = find_stage(stages, current)?;
    stages
        .iter()
        .find(|stage| stage.enabled && stage.ordinal > anchor.ordinal)
}

/// Whether `current` closes the chain: no enabled stage follows it.
pub fn is_last_enabled(stages: &[ReviewStage], current: &StageName) -> bool {
    find_stage(stages, current).is_some() && next_enabled_after(stages, current).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<ReviewStage> {
        vec![
            ReviewStage::new("myskb", StageName::new("level1"), 1)
                .with_reviewers(vec!["one@mbmb.gov.my".to_string()]),
            ReviewStage::new("myskb", StageName::new("level2"), 2)
                .with_enabled(false)
                .with_reviewers(vec!["two@mbmb.gov.my".to_string()]),
            ReviewStage::new("myskb", StageName::new("final"), 3)
                .with_reviewers(vec!["final@mbmb.gov.my".to_string()]),
        ]
    }

    #[test]
    fn test_first_enabled_skips_nothing_at_the_front() {
        let stages = chain();
        assert_eq!(first_enabled(&stages).unwrap().name.as_str(), "level1");
    }

    #[test]
    fn test_advancement_skips_disabled_stages() {
        let stages = chain();
        let next = next_enabled_after(&stages, &StageName::new("level1")).unwrap();
        assert_eq!(next.name.as_str(), "final");
    }

    #[test]
    fn test_last_enabled_detection() {
        let stages = chain();
        assert!(!is_last_enabled(&stages, &StageName::new("level1")));
        assert!(is_last_enabled(&stages, &StageName::new("final")));
    }

    #[test]
    fn test_disabled_current_still_anchors() {
        let stages = chain();
        let next = next_enabled_after(&stages, &StageName::new("level2")).unwrap();
        assert_eq!(next.name.as_str(), "final");
    }

    #[test]
    fn test_unknown_stage_is_none() {
        let stages = chain();
        assert!(next_enabled_after(&stages, &StageName::new("ghost")).is_none());
        assert!(!is_last_enabled(&stages, &StageName::new("ghost")));
    }
}
