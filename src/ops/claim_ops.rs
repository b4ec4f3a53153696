use tracing::debug;

use crate::model::beat::Beat;
use crate::model::card::{CardId, LoopClaim, LoopPart};
use crate::model::config::ClaimPolicy;
use crate::model::project::Project;

/// Error type for beat and loop claims
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("card not found: {0}")]
    CardNotFound(String),
    #[error("loop not found: {0}")]
    UnknownLoop(String),
    #[error("{what} is already claimed by {holder}")]
    AlreadyClaimed { what: String, holder: CardId },
}

// ---------------------------------------------------------------------------
// Beats
// ---------------------------------------------------------------------------

/// Give `beat` to `card_id`. Returns the ids of cards that lost the beat
/// (only ever non-empty under [`ClaimPolicy::Steal`]).
pub fn assign_beat(
    project: &mut Project,
    card_id: &str,
    beat: Beat,
    policy: ClaimPolicy,
) -> Result<Vec<CardId>, ClaimError> {
    let card = project
        .card(card_id)
        .ok_or_else(|| ClaimError::CardNotFound(card_id.to_string()))?;
    if card.claims_beat(beat) {
        return Ok(Vec::new());
    }

    let others: Vec<CardId> = project
        .cards
        .values()
        .filter(|c| c.id != card_id && c.claims_beat(beat))
        .map(|c| c.id.clone())
        .collect();

    let revoked = resolve_contest(&others, policy, || format!("beat {}", beat.label()))?;
    for other in &revoked {
        if let Some(c) = project.card_mut(other) {
            c.beats.retain(|b| *b != beat);
        }
    }
    if let Some(card) = project.card_mut(card_id) {
        card.beats.push(beat);
    }
    debug!(card = %card_id, beat = beat.key(), revoked = revoked.len(), "assigned beat");
    Ok(revoked)
}

/// Drop `beat` from a card. Returns whether the card held it.
pub fn unassign_beat(project: &mut Project, card_id: &str, beat: Beat) -> Result<bool, ClaimError> {
    let card = project
        .card_mut(card_id)
        .ok_or_else(|| ClaimError::CardNotFound(card_id.to_string()))?;
    let before = card.beats.len();
    card.beats.retain(|b| *b != beat);
    let changed = card.beats.len() != before;
    if changed {
        debug!(card = %card_id, beat = beat.key(), "unassigned beat");
    }
    Ok(changed)
}

// ---------------------------------------------------------------------------
// Loops
// ---------------------------------------------------------------------------

/// Give one part of a loop to `card_id`. A card never holds the same
/// `(loop, part)` twice; cross-card exclusivity follows `policy`.
pub fn assign_loop_part(
    project: &mut Project,
    card_id: &str,
    loop_id: &str,
    part: LoopPart,
    policy: ClaimPolicy,
) -> Result<Vec<CardId>, ClaimError> {
    if !project.loops.contains_key(loop_id) {
        return Err(ClaimError::UnknownLoop(loop_id.to_string()));
    }
    let card = project
        .card(card_id)
        .ok_or_else(|| ClaimError::CardNotFound(card_id.to_string()))?;
    if card.claims_loop_part(loop_id, part) {
        return Ok(Vec::new());
    }

    let others: Vec<CardId> = project
        .cards
        .values()
        .filter(|c| c.id != card_id && c.claims_loop_part(loop_id, part))
        .map(|c| c.id.clone())
        .collect();

    let revoked = resolve_contest(&others, policy, || format!("{} of loop {}", part, loop_id))?;
    for other in &revoked {
        if let Some(c) = project.card_mut(other) {
            c.loops.retain(|l| !(l.loop_id == loop_id && l.part == part));
        }
    }
    if let Some(card) = project.card_mut(card_id) {
        card.loops.push(LoopClaim::new(loop_id, part));
    }
    debug!(card = %card_id, loop_id, %part, revoked = revoked.len(), "assigned loop part");
    Ok(revoked)
}

/// Drop a loop part from a card. Returns whether the card held it.
pub fn unassign_loop_part(
    project: &mut Project,
    card_id: &str,
    loop_id: &str,
    part: LoopPart,
) -> Result<bool, ClaimError> {
    let card = project
        .card_mut(card_id)
        .ok_or_else(|| ClaimError::CardNotFound(card_id.to_string()))?;
    let before = card.loops.len();
    card.loops.retain(|l| !(l.loop_id == loop_id && l.part == part));
    let changed = card.loops.len() != before;
    if changed {
        debug!(card = %card_id, loop_id, %part, "unassigned loop part");
    }
    Ok(changed)
}

/// Remove every claim on `loop_id` from every card. Returns how many
/// claims were removed.
pub fn sweep_loop_claims(project: &mut Project, loop_id: &str) -> usize {
    let mut swept = 0;
    for card in project.cards.values_mut() {
        let before = card.loops.len();
        card.loops.retain(|l| l.loop_id != loop_id);
        swept += before - card.loops.len();
    }
    swept
}

/// Decide which existing claimants lose their claim, or refuse the claim.
fn resolve_contest(
    others: &[CardId],
    policy: ClaimPolicy,
    what: impl FnOnce() -> String,
) -> Result<Vec<CardId>, ClaimError> {
    match (policy, others.first()) {
        (_, None) | (ClaimPolicy::Shared, _) => Ok(Vec::new()),
        (ClaimPolicy::Exclusive, Some(holder)) => Err(ClaimError::AlreadyClaimed {
            what: what(),
            holder: holder.clone(),
        }),
        (ClaimPolicy::Steal, Some(_)) => Ok(others.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::SequentialIds;
    use crate::model::registry::SetupPayoff;
    use crate::ops::index::{BeatIndex, LoopIndex};
    use crate::ops::tree_ops::{add_child, add_scene};

    fn sample() -> Project {
        let mut p = Project::new("t");
        let mut ids = SequentialIds::new("t");
        let s1 = add_scene(&mut p, &mut ids, "One".into());
        add_scene(&mut p, &mut ids, "Two".into());
        add_child(&mut p, &mut ids, &s1, "a".into()).unwrap();
        p.loops
            .insert("gun".into(), SetupPayoff::new("gun".into(), "Chekhov".into()));
        p
    }

    #[test]
    fn test_assign_then_unassign_beat_leaves_it_unclaimed() {
        let mut p = sample();
        assign_beat(&mut p, "t-1", Beat::Catalyst, ClaimPolicy::Exclusive).unwrap();
        assert_eq!(BeatIndex::build(&p).holder(&Beat::Catalyst), Some("t-1"));
        assert!(unassign_beat(&mut p, "t-1", Beat::Catalyst).unwrap());
        assert_eq!(BeatIndex::build(&p).holder(&Beat::Catalyst), None);
        assert!(!unassign_beat(&mut p, "t-1", Beat::Catalyst).unwrap());
    }

    #[test]
    fn test_assign_beat_twice_is_idempotent() {
        let mut p = sample();
        assign_beat(&mut p, "t-1", Beat::Debate, ClaimPolicy::Exclusive).unwrap();
        assign_beat(&mut p, "t-1", Beat::Debate, ClaimPolicy::Exclusive).unwrap();
        assert_eq!(p.card("t-1").unwrap().beats, vec![Beat::Debate]);
    }

    #[test]
    fn test_exclusive_rejects_second_claimant() {
        let mut p = sample();
        assign_beat(&mut p, "t-1", Beat::Midpoint, ClaimPolicy::Exclusive).unwrap();
        let err = assign_beat(&mut p, "t-2", Beat::Midpoint, ClaimPolicy::Exclusive).unwrap_err();
        match err {
            ClaimError::AlreadyClaimed { holder, .. } => assert_eq!(holder, "t-1"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(p.card("t-2").unwrap().beats.is_empty());
    }

    #[test]
    fn test_steal_moves_the_claim() {
        let mut p = sample();
        assign_beat(&mut p, "t-1", Beat::Finale, ClaimPolicy::Exclusive).unwrap();
        let revoked = assign_beat(&mut p, "t-3", Beat::Finale, ClaimPolicy::Steal).unwrap();
        assert_eq!(revoked, vec!["t-1".to_string()]);
        assert!(p.card("t-1").unwrap().beats.is_empty());
        assert_eq!(BeatIndex::build(&p).holder(&Beat::Finale), Some("t-3"));
    }

    #[test]
    fn test_shared_allows_duplicate_claims() {
        let mut p = sample();
        assign_beat(&mut p, "t-1", Beat::Finale, ClaimPolicy::Shared).unwrap();
        assign_beat(&mut p, "t-2", Beat::Finale, ClaimPolicy::Shared).unwrap();
        let index = BeatIndex::build(&p);
        assert_eq!(index.conflicts().count(), 1);
        assert_eq!(index.holder(&Beat::Finale), Some("t-2"));
    }

    #[test]
    fn test_assign_beat_unknown_card() {
        let mut p = sample();
        assert!(matches!(
            assign_beat(&mut p, "zz", Beat::Finale, ClaimPolicy::Exclusive),
            Err(ClaimError::CardNotFound(_))
        ));
    }

    #[test]
    fn test_loop_part_unique_per_card() {
        let mut p = sample();
        assign_loop_part(&mut p, "t-3", "gun", LoopPart::Setup, ClaimPolicy::Exclusive).unwrap();
        assign_loop_part(&mut p, "t-3", "gun", LoopPart::Setup, ClaimPolicy::Exclusive).unwrap();
        assign_loop_part(&mut p, "t-3", "gun", LoopPart::Bump, ClaimPolicy::Exclusive).unwrap();
        assert_eq!(p.card("t-3").unwrap().loops.len(), 2);
    }

    #[test]
    fn test_loop_part_requires_known_loop() {
        let mut p = sample();
        assert!(matches!(
            assign_loop_part(&mut p, "t-3", "knife", LoopPart::Setup, ClaimPolicy::Exclusive),
            Err(ClaimError::UnknownLoop(_))
        ));
    }

    #[test]
    fn test_loop_part_exclusive_and_steal() {
        let mut p = sample();
        assign_loop_part(&mut p, "t-1", "gun", LoopPart::Payoff, ClaimPolicy::Exclusive).unwrap();
        assert!(
            assign_loop_part(&mut p, "t-2", "gun", LoopPart::Payoff, ClaimPolicy::Exclusive)
                .is_err()
        );
        assign_loop_part(&mut p, "t-2", "gun", LoopPart::Payoff, ClaimPolicy::Steal).unwrap();
        assert_eq!(
            LoopIndex::build(&p).holder_of("gun", LoopPart::Payoff),
            Some("t-2")
        );
        assert!(p.card("t-1").unwrap().loops.is_empty());
    }

    #[test]
    fn test_unassign_loop_part() {
        let mut p = sample();
        assign_loop_part(&mut p, "t-1", "gun", LoopPart::Setup, ClaimPolicy::Exclusive).unwrap();
        assert!(unassign_loop_part(&mut p, "t-1", "gun", LoopPart::Setup).unwrap());
        assert!(!unassign_loop_part(&mut p, "t-1", "gun", LoopPart::Setup).unwrap());
        assert!(LoopIndex::build(&p).is_empty());
    }

    #[test]
    fn test_sweep_loop_claims() {
        let mut p = sample();
        assign_loop_part(&mut p, "t-1", "gun", LoopPart::Setup, ClaimPolicy::Exclusive).unwrap();
        assign_loop_part(&mut p, "t-3", "gun", LoopPart::Payoff, ClaimPolicy::Exclusive).unwrap();
        assert_eq!(sweep_loop_claims(&mut p, "gun"), 2);
        assert!(p.cards.values().all(|c| c.loops.is_empty()));
    }
}
