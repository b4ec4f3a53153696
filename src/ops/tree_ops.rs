use tracing::debug;

use crate::model::card::{Card, CardId, CardKind, CardPatch};
use crate::model::ids::IdGenerator;
use crate::model::project::Project;

/// Error type for tree operations. Every operation validates before it
/// mutates, so an error always means the project is unchanged.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("card not found: {0}")]
    NotFound(String),
    #[error("not a scene: {0}")]
    NotAScene(String),
    #[error("not a chapter: {0}")]
    NotAChapter(String),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Direction of an adjacent swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn parse_direction(s: &str) -> Option<Direction> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tree store
// ---------------------------------------------------------------------------

/// Append a new scene to the end of the top-level order. Returns its id.
pub fn add_scene(project: &mut Project, ids: &mut dyn IdGenerator, title: String) -> CardId {
    let id = fresh_id(project, ids);
    project
        .cards
        .insert(id.clone(), Card::new(id.clone(), CardKind::Scene, title));
    project.scene_order.push(id.clone());
    debug!(card = %id, "added scene");
    id
}

/// Add a chapter under the same scene as `after_chapter`.
///
/// The new chapter is appended to the end of the parent's children rather
/// than inserted directly after the reference chapter.
pub fn add_sibling_chapter(
    project: &mut Project,
    ids: &mut dyn IdGenerator,
    after_chapter: &str,
    title: String,
) -> Result<CardId, TreeError> {
    let chapter = require_chapter(project, after_chapter)?;
    let parent_id = chapter.parent.clone().ok_or_else(|| {
        TreeError::InvariantViolation(format!("chapter {} has no parent", after_chapter))
    })?;
    if project.scene(&parent_id).is_none() {
        return Err(TreeError::InvariantViolation(format!(
            "chapter {} points at missing scene {}",
            after_chapter, parent_id
        )));
    }
    Ok(attach_new_chapter(project, ids, &parent_id, title))
}

/// Append a new chapter to a scene's children.
pub fn add_child(
    project: &mut Project,
    ids: &mut dyn IdGenerator,
    scene_id: &str,
    title: String,
) -> Result<CardId, TreeError> {
    require_scene(project, scene_id)?;
    Ok(attach_new_chapter(project, ids, scene_id, title))
}

/// Shallow-merge `patch` into a card. Last write wins per field.
pub fn update_card(project: &mut Project, id: &str, patch: CardPatch) -> Result<(), TreeError> {
    let card = project
        .card_mut(id)
        .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
    if let Some(title) = patch.title {
        card.title = title;
    }
    if let Some(description) = patch.description {
        card.description = description;
    }
    if let Some(draft) = patch.draft {
        card.draft = draft;
    }
    if let Some(polarity) = patch.polarity {
        card.polarity = polarity;
    }
    if let Some(conflict) = patch.conflict {
        card.conflict = conflict;
    }
    if let Some(location) = patch.location {
        card.location = location;
    }
    debug!(card = %id, "updated card");
    Ok(())
}

/// Delete a card and everything beneath it, unlinking it from its parent
/// or from the top-level order. Returns the removed cards, root first.
pub fn delete_card(project: &mut Project, id: &str) -> Result<Vec<Card>, TreeError> {
    let root = project
        .card(id)
        .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
    let parent = root.parent.clone();

    let mut doomed = Vec::new();
    collect_subtree(project, id, &mut doomed);

    if let Some(parent_id) = parent
        && let Some(parent) = project.card_mut(&parent_id)
    {
        parent.children.retain(|c| c != id);
    }
    project.scene_order.retain(|s| s != id);

    let removed: Vec<Card> = doomed
        .iter()
        .filter_map(|d| project.cards.shift_remove(d))
        .collect();
    debug!(card = %id, removed = removed.len(), "deleted card subtree");
    Ok(removed)
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Swap the element at `index` with its neighbour in `direction`.
/// Returns false, leaving the list untouched, when the target falls
/// outside the list.
pub fn swap_adjacent<T>(list: &mut Vec<T>, index: usize, direction: Direction) -> bool {
    if index >= list.len() {
        return false;
    }
    let target = match direction {
        Direction::Up => match index.checked_sub(1) {
            Some(t) => t,
            None => return false,
        },
        Direction::Down => index + 1,
    };
    if target >= list.len() {
        return false;
    }
    let item = list.remove(index);
    list.insert(target, item);
    true
}

/// Move a scene one step within the top-level order.
pub fn move_scene(project: &mut Project, index: usize, direction: Direction) -> bool {
    let moved = swap_adjacent(&mut project.scene_order, index, direction);
    if moved {
        debug!(index, ?direction, "moved scene");
    }
    moved
}

/// Move a chapter one step within its scene's children.
pub fn move_chapter(
    project: &mut Project,
    parent_id: &str,
    index: usize,
    direction: Direction,
) -> Result<bool, TreeError> {
    require_scene(project, parent_id)?;
    let Some(parent) = project.card_mut(parent_id) else {
        return Err(TreeError::NotFound(parent_id.to_string()));
    };
    let moved = swap_adjacent(&mut parent.children, index, direction);
    if moved {
        debug!(scene = %parent_id, index, ?direction, "moved chapter");
    }
    Ok(moved)
}

// ---------------------------------------------------------------------------
// Reassignment
// ---------------------------------------------------------------------------

/// Move a chapter from one scene to the end of another scene's children.
/// Returns false when the two scenes are the same.
pub fn reassign_chapter(
    project: &mut Project,
    chapter_id: &str,
    old_parent: &str,
    new_parent: &str,
) -> Result<bool, TreeError> {
    if old_parent == new_parent {
        return Ok(false);
    }
    require_scene(project, old_parent)?;
    require_scene(project, new_parent)?;
    let chapter = require_chapter(project, chapter_id)?;
    if chapter.parent.as_deref() != Some(old_parent) {
        return Err(TreeError::InvariantViolation(format!(
            "chapter {} does not belong to scene {}",
            chapter_id, old_parent
        )));
    }
    let listed = project
        .card(old_parent)
        .is_some_and(|s| s.children.iter().any(|c| c == chapter_id));
    if !listed {
        return Err(TreeError::InvariantViolation(format!(
            "scene {} does not list chapter {}",
            old_parent, chapter_id
        )));
    }

    // All three ids validated above; the lookups below cannot miss.
    if let Some(old) = project.card_mut(old_parent) {
        old.children.retain(|c| c != chapter_id);
    }
    if let Some(new) = project.card_mut(new_parent) {
        new.children.push(chapter_id.to_string());
    }
    if let Some(chapter) = project.card_mut(chapter_id) {
        chapter.parent = Some(new_parent.to_string());
    }
    debug!(chapter = %chapter_id, from = %old_parent, to = %new_parent, "reassigned chapter");
    Ok(true)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve a card that must be a scene.
pub fn require_scene<'a>(project: &'a Project, id: &str) -> Result<&'a Card, TreeError> {
    match project.card(id) {
        Some(card) if card.is_scene() => Ok(card),
        Some(_) => Err(TreeError::NotAScene(id.to_string())),
        None => Err(TreeError::NotFound(id.to_string())),
    }
}

/// Resolve a card that must be a chapter.
pub fn require_chapter<'a>(project: &'a Project, id: &str) -> Result<&'a Card, TreeError> {
    match project.card(id) {
        Some(card) if card.is_chapter() => Ok(card),
        Some(_) => Err(TreeError::NotAChapter(id.to_string())),
        None => Err(TreeError::NotFound(id.to_string())),
    }
}

/// Index of a chapter within its parent's children
pub fn chapter_position(project: &Project, chapter_id: &str) -> Option<(CardId, usize)> {
    let parent_id = project.chapter(chapter_id)?.parent.clone()?;
    let idx = project
        .card(&parent_id)?
        .children
        .iter()
        .position(|c| c == chapter_id)?;
    Some((parent_id, idx))
}

/// Draw ids until one is not already in use.
pub(crate) fn fresh_id(project: &Project, ids: &mut dyn IdGenerator) -> String {
    loop {
        let id = ids.new_id();
        if !project.all_ids().any(|existing| existing == id) {
            return id;
        }
    }
}

fn attach_new_chapter(
    project: &mut Project,
    ids: &mut dyn IdGenerator,
    scene_id: &str,
    title: String,
) -> CardId {
    let id = fresh_id(project, ids);
    let mut chapter = Card::new(id.clone(), CardKind::Chapter, title);
    chapter.parent = Some(scene_id.to_string());
    project.cards.insert(id.clone(), chapter);
    if let Some(scene) = project.card_mut(scene_id) {
        scene.children.push(id.clone());
    }
    debug!(card = %id, scene = %scene_id, "added chapter");
    id
}

fn collect_subtree(project: &Project, id: &str, out: &mut Vec<CardId>) {
    if out.iter().any(|seen| seen == id) {
        return;
    }
    out.push(id.to_string());
    if let Some(card) = project.card(id) {
        for child in &card.children {
            collect_subtree(project, child, out);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
