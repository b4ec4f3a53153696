//! Character bible, location atlas, and setup/payoff loop registries.
//!
//! Cards refer to characters and locations weakly: deleting one leaves any
//! card references dangling, and readers skip what they cannot resolve.
//! Loops are different: deleting a loop sweeps every card claim on it.

use tracing::{debug, warn};

use crate::model::card::{CharacterId, LocationId, LoopId};
use crate::model::ids::IdGenerator;
use crate::model::project::Project;
use crate::model::registry::{Character, Location, SetupPayoff};
use crate::ops::claim_ops::sweep_loop_claims;
use crate::ops::tree_ops::{Direction, fresh_id, swap_adjacent};

/// Error type for registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("character not found: {0}")]
    CharacterNotFound(String),
    #[error("location not found: {0}")]
    LocationNotFound(String),
    #[error("loop not found: {0}")]
    LoopNotFound(String),
}

// ---------------------------------------------------------------------------
// Characters
// ---------------------------------------------------------------------------

pub fn add_character(
    project: &mut Project,
    ids: &mut dyn IdGenerator,
    name: String,
) -> CharacterId {
    let id = fresh_id(project, ids);
    project
        .characters
        .insert(id.clone(), Character::new(id.clone(), name));
    project.character_order.push(id.clone());
    debug!(character = %id, "added character");
    id
}

/// Apply `edit` to a character in place.
pub fn update_character(
    project: &mut Project,
    id: &str,
    edit: impl FnOnce(&mut Character),
) -> Result<(), RegistryError> {
    let character = project
        .characters
        .get_mut(id)
        .ok_or_else(|| RegistryError::CharacterNotFound(id.to_string()))?;
    edit(character);
    Ok(())
}

/// Remove a character. Cards that name it keep the dangling id.
pub fn delete_character(project: &mut Project, id: &str) -> Result<Character, RegistryError> {
    let removed = project
        .characters
        .shift_remove(id)
        .ok_or_else(|| RegistryError::CharacterNotFound(id.to_string()))?;
    project.character_order.retain(|c| c != id);
    debug!(character = %id, "deleted character");
    Ok(removed)
}

pub fn move_character(project: &mut Project, index: usize, direction: Direction) -> bool {
    swap_adjacent(&mut project.character_order, index, direction)
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

pub fn add_location(project: &mut Project, ids: &mut dyn IdGenerator, name: String) -> LocationId {
    let id = fresh_id(project, ids);
    project
        .locations
        .insert(id.clone(), Location::new(id.clone(), name));
    project.location_order.push(id.clone());
    debug!(location = %id, "added location");
    id
}

pub fn update_location(
    project: &mut Project,
    id: &str,
    edit: impl FnOnce(&mut Location),
) -> Result<(), RegistryError> {
    let location = project
        .locations
        .get_mut(id)
        .ok_or_else(|| RegistryError::LocationNotFound(id.to_string()))?;
    edit(location);
    Ok(())
}

/// Remove a location. Cards that name it keep the dangling id.
pub fn delete_location(project: &mut Project, id: &str) -> Result<Location, RegistryError> {
    let removed = project
        .locations
        .shift_remove(id)
        .ok_or_else(|| RegistryError::LocationNotFound(id.to_string()))?;
    project.location_order.retain(|l| l != id);
    debug!(location = %id, "deleted location");
    Ok(removed)
}

pub fn move_location(project: &mut Project, index: usize, direction: Direction) -> bool {
    swap_adjacent(&mut project.location_order, index, direction)
}

// ---------------------------------------------------------------------------
// Setup/payoff loops
// ---------------------------------------------------------------------------

pub fn add_loop(project: &mut Project, ids: &mut dyn IdGenerator, title: String) -> LoopId {
    let id = fresh_id(project, ids);
    project
        .loops
        .insert(id.clone(), SetupPayoff::new(id.clone(), title));
    project.loop_order.push(id.clone());
    debug!(loop_id = %id, "added loop");
    id
}

pub fn update_loop(
    project: &mut Project,
    id: &str,
    edit: impl FnOnce(&mut SetupPayoff),
) -> Result<(), RegistryError> {
    let entry = project
        .loops
        .get_mut(id)
        .ok_or_else(|| RegistryError::LoopNotFound(id.to_string()))?;
    edit(entry);
    Ok(())
}

/// Remove a loop and every card claim on it. Returns the number of claims
/// swept from cards.
pub fn delete_loop(project: &mut Project, id: &str) -> Result<usize, RegistryError> {
    if project.loops.shift_remove(id).is_none() {
        return Err(RegistryError::LoopNotFound(id.to_string()));
    }
    project.loop_order.retain(|l| l != id);
    let swept = sweep_loop_claims(project, id);
    if swept > 0 {
        warn!(loop_id = %id, swept, "removed card claims on deleted loop");
    }
    Ok(swept)
}

pub fn move_loop(project: &mut Project, index: usize, direction: Direction) -> bool {
    swap_adjacent(&mut project.loop_order, index, direction)
}
