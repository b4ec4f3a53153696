use std::collections::HashMap;

use serde::Serialize;

use crate::model::beat::Beat;
use crate::model::card::{Card, CardKind, LoopPart};
use crate::model::project::Project;
use crate::ops::index::{BeatIndex, LoopIndex};

/// Structured result from `bb check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A broken tree-shape or referential invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckError {
    /// A chapter with no parent id
    OrphanChapter { card_id: String },
    /// A chapter whose parent id does not resolve to a scene
    BadParent { card_id: String, parent_id: String },
    /// A chapter missing from its parent's child list
    NotListedByParent { card_id: String, parent_id: String },
    /// A child list entry that is not a chapter of that scene
    StrayChild { scene_id: String, child_id: String },
    /// A chapter listed more than once across all child lists
    ChapterListedTwice { card_id: String, count: usize },
    /// A scene missing from the top-level order
    SceneNotInOrder { card_id: String },
    /// A top-level order entry that is not a scene, or appears twice
    BadOrderEntry { id: String },
    /// A card claims a part of a loop that does not exist
    UnknownLoop { card_id: String, loop_id: String },
}

/// A non-critical issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckWarning {
    /// More than one card claims the same beat
    DuplicateBeatClaim { beat: Beat, card_ids: Vec<String> },
    /// More than one card claims the same loop part
    DuplicateLoopClaim {
        loop_id: String,
        part: LoopPart,
        card_ids: Vec<String>,
    },
    /// A conflict subject that no longer exists
    DanglingCharacter { card_id: String, character_id: String },
    /// A location that no longer exists
    DanglingLocation { card_id: String, location_id: String },
    /// A card of the retired `beat` kind
    LegacyBeatCard { card_id: String },
    /// A card with a blank title
    EmptyTitle { card_id: String },
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate a project and return structured results.
///
/// Read-only; the project is never modified.
pub fn check_project(project: &Project) -> CheckResult {
    let mut result = CheckResult::default();

    check_order(project, &mut result);
    check_child_lists(project, &mut result);
    for card in project.cards.values() {
        check_card(project, card, &mut result);
    }
    check_claims(project, &mut result);

    result.valid = result.errors.is_empty();
    result
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

fn check_order(project: &Project, result: &mut CheckResult) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for id in &project.scene_order {
        let count = seen.entry(id.as_str()).or_default();
        *count += 1;
        if *count == 2 || project.scene(id).is_none() {
            result.errors.push(CheckError::BadOrderEntry { id: id.clone() });
        }
    }
    for card in project.cards.values().filter(|c| c.is_scene()) {
        if !seen.contains_key(card.id.as_str()) {
            result.errors.push(CheckError::SceneNotInOrder {
                card_id: card.id.clone(),
            });
        }
    }
}

fn check_child_lists(project: &Project, result: &mut CheckResult) {
    let mut listed: HashMap<&str, usize> = HashMap::new();
    for scene in project.cards.values().filter(|c| c.is_scene()) {
        for child_id in &scene.children {
            *listed.entry(child_id.as_str()).or_default() += 1;
            let belongs = project
                .chapter(child_id)
                .is_some_and(|c| c.parent.as_deref() == Some(scene.id.as_str()));
            if !belongs {
                result.errors.push(CheckError::StrayChild {
                    scene_id: scene.id.clone(),
                    child_id: child_id.clone(),
                });
            }
        }
    }
    let mut twice: Vec<_> = listed.into_iter().filter(|(_, n)| *n > 1).collect();
    twice.sort();
    for (card_id, count) in twice {
        result.errors.push(CheckError::ChapterListedTwice {
            card_id: card_id.to_string(),
            count,
        });
    }
}

fn check_card(project: &Project, card: &Card, result: &mut CheckResult) {
    let card_id = card.id.clone();

    match card.kind {
        CardKind::Chapter => match &card.parent {
            None => result.errors.push(CheckError::OrphanChapter { card_id: card_id.clone() }),
            Some(parent_id) => match project.scene(parent_id) {
                None => result.errors.push(CheckError::BadParent {
                    card_id: card_id.clone(),
                    parent_id: parent_id.clone(),
                }),
                Some(parent) if !parent.children.contains(&card.id) => {
                    result.errors.push(CheckError::NotListedByParent {
                        card_id: card_id.clone(),
                        parent_id: parent_id.clone(),
                    })
                }
                Some(_) => {}
            },
        },
        CardKind::Beat => result.warnings.push(CheckWarning::LegacyBeatCard {
            card_id: card_id.clone(),
        }),
        CardKind::Scene => {}
    }

    if card.title.trim().is_empty() {
        result.warnings.push(CheckWarning::EmptyTitle {
            card_id: card_id.clone(),
        });
    }

    for character_id in card.conflict_subjects() {
        if !project.characters.contains_key(character_id) {
            result.warnings.push(CheckWarning::DanglingCharacter {
                card_id: card_id.clone(),
                character_id: character_id.clone(),
            });
        }
    }
    if let Some(location_id) = &card.location
        && !project.locations.contains_key(location_id)
    {
        result.warnings.push(CheckWarning::DanglingLocation {
            card_id: card_id.clone(),
            location_id: location_id.clone(),
        });
    }

    for claim in &card.loops {
        if !project.loops.contains_key(&claim.loop_id) {
            result.errors.push(CheckError::UnknownLoop {
                card_id: card_id.clone(),
                loop_id: claim.loop_id.clone(),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

fn check_claims(project: &Project, result: &mut CheckResult) {
    let beats = BeatIndex::build(project);
    for (beat, cards) in beats.conflicts() {
        result.warnings.push(CheckWarning::DuplicateBeatClaim {
            beat: *beat,
            card_ids: cards.to_vec(),
        });
    }
    let loops = LoopIndex::build(project);
    for ((loop_id, part), cards) in loops.conflicts() {
        result.warnings.push(CheckWarning::DuplicateLoopClaim {
            loop_id: loop_id.clone(),
            part: *part,
            card_ids: cards.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::card::LoopClaim;
    use crate::model::ids::SequentialIds;
    use crate::ops::tree_ops::{add_child, add_scene};

    fn sample() -> Project {
        let mut p = Project::new("t");
        let mut ids = SequentialIds::new("t");
        let s1 = add_scene(&mut p, &mut ids, "One".into());
        add_scene(&mut p, &mut ids, "Two".into());
        add_child(&mut p, &mut ids, &s1, "a".into()).unwrap();
        add_child(&mut p, &mut ids, &s1, "b".into()).unwrap();
        p
    }

    #[test]
    fn test_clean_project_is_valid() {
        let result = check_project(&sample());
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_detects_chapter_listed_in_two_scenes() {
        let mut p = sample();
        p.card_mut("t-2").unwrap().children.push("t-3".into());
        let result = check_project(&p);
        assert!(!result.valid);
        assert!(result.errors.contains(&CheckError::StrayChild {
            scene_id: "t-2".into(),
            child_id: "t-3".into(),
        }));
        assert!(result.errors.contains(&CheckError::ChapterListedTwice {
            card_id: "t-3".into(),
            count: 2,
        }));
    }

    #[test]
    fn test_detects_orphan_and_unlisted_chapters() {
        let mut p = sample();
        p.card_mut("t-3").unwrap().parent = None;
        p.card_mut("t-1").unwrap().children.retain(|c| c != "t-4");
        let result = check_project(&p);
        assert!(result.errors.contains(&CheckError::OrphanChapter { card_id: "t-3".into() }));
        assert!(result.errors.contains(&CheckError::NotListedByParent {
            card_id: "t-4".into(),
            parent_id: "t-1".into(),
        }));
    }

    #[test]
    fn test_detects_order_problems() {
        let mut p = sample();
        p.scene_order = vec!["t-1".into(), "t-1".into(), "t-3".into()];
        let result = check_project(&p);
        assert!(result.errors.contains(&CheckError::BadOrderEntry { id: "t-1".into() }));
        assert!(result.errors.contains(&CheckError::BadOrderEntry { id: "t-3".into() }));
        assert!(result.errors.contains(&CheckError::SceneNotInOrder { card_id: "t-2".into() }));
    }

    #[test]
    fn test_claim_and_reference_warnings() {
        let mut p = sample();
        p.card_mut("t-1").unwrap().beats.push(Beat::Catalyst);
        p.card_mut("t-3").unwrap().beats.push(Beat::Catalyst);
        p.card_mut("t-3").unwrap().conflict = [Some("ghost".into()), None];
        p.card_mut("t-4").unwrap().location = Some("nowhere".into());
        p.card_mut("t-4").unwrap().loops.push(LoopClaim::new("gone", LoopPart::Bump));
        let result = check_project(&p);

        assert!(!result.valid);
        assert!(result.errors.contains(&CheckError::UnknownLoop {
            card_id: "t-4".into(),
            loop_id: "gone".into(),
        }));
        assert!(result.warnings.contains(&CheckWarning::DuplicateBeatClaim {
            beat: Beat::Catalyst,
            card_ids: vec!["t-1".into(), "t-3".into()],
        }));
        assert!(result.warnings.contains(&CheckWarning::DanglingCharacter {
            card_id: "t-3".into(),
            character_id: "ghost".into(),
        }));
        assert!(result.warnings.contains(&CheckWarning::DanglingLocation {
            card_id: "t-4".into(),
            location_id: "nowhere".into(),
        }));
    }

    #[test]
    fn test_json_shape() {
        let mut p = sample();
        p.card_mut("t-1").unwrap().title = " ".into();
        let json = serde_json::to_value(check_project(&p)).unwrap();
        assert_eq!(json["valid"], true);
        assert_eq!(json["warnings"][0]["type"], "empty_title");
        assert_eq!(json["warnings"][0]["card_id"], "t-1");
    }
}
