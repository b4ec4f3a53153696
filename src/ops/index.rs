use std::collections::BTreeMap;

use crate::model::beat::Beat;
use crate::model::card::{CardId, LoopId, LoopPart};
use crate::model::project::Project;

/// Read-side projection of card claims, keyed by what is claimed.
///
/// Built by scanning every card's back-references in card insertion order.
/// When several cards claim the same key, all of them are kept and the last
/// one scanned is reported as the holder; `conflicts` lists such keys so the
/// ambiguity stays visible.
#[derive(Debug, Clone)]
pub struct ClaimIndex<K> {
    claimants: BTreeMap<K, Vec<CardId>>,
}

impl<K: Ord> Default for ClaimIndex<K> {
    fn default() -> Self {
        ClaimIndex {
            claimants: BTreeMap::new(),
        }
    }
}

impl<K: Ord> ClaimIndex<K> {
    fn record(&mut self, key: K, card: &str) {
        let cards = self.claimants.entry(key).or_default();
        if !cards.iter().any(|c| c == card) {
            cards.push(card.to_string());
        }
    }

    /// The card holding `key`, if any
    pub fn holder(&self, key: &K) -> Option<&str> {
        self.claimants
            .get(key)
            .and_then(|cards| cards.last())
            .map(|c| c.as_str())
    }

    /// Every card claiming `key`, in scan order
    pub fn claimants(&self, key: &K) -> &[CardId] {
        self.claimants
            .get(key)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Keys claimed by more than one card
    pub fn conflicts(&self) -> impl Iterator<Item = (&K, &[CardId])> {
        self.claimants
            .iter()
            .filter(|(_, cards)| cards.len() > 1)
            .map(|(k, cards)| (k, cards.as_slice()))
    }

    /// `(key, holder)` pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &str)> {
        self.claimants
            .iter()
            .filter_map(|(k, cards)| cards.last().map(|c| (k, c.as_str())))
    }

    pub fn len(&self) -> usize {
        self.claimants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimants.is_empty()
    }

    /// Whether any key is held by `card`
    pub fn mentions(&self, card: &str) -> bool {
        self.claimants.values().flatten().any(|c| c == card)
    }
}

/// Which card claims each of the fifteen beats
pub type BeatIndex = ClaimIndex<Beat>;

impl ClaimIndex<Beat> {
    pub fn build(project: &Project) -> Self {
        let mut index = ClaimIndex::default();
        for card in project.cards.values() {
            for beat in &card.beats {
                index.record(*beat, &card.id);
            }
        }
        index
    }

    /// Beats nobody has claimed yet, in story order
    pub fn unclaimed(&self) -> Vec<Beat> {
        Beat::ALL
            .iter()
            .copied()
            .filter(|b| self.holder(b).is_none())
            .collect()
    }
}

/// Which card claims each part of each setup/payoff loop
pub type LoopIndex = ClaimIndex<(LoopId, LoopPart)>;

impl ClaimIndex<(LoopId, LoopPart)> {
    pub fn build(project: &Project) -> Self {
        let mut index = ClaimIndex::default();
        for card in project.cards.values() {
            for claim in &card.loops {
                index.record((claim.loop_id.clone(), claim.part), &card.id);
            }
        }
        index
    }

    pub fn holder_of(&self, loop_id: &str, part: LoopPart) -> Option<&str> {
        self.holder(&(loop_id.to_string(), part))
    }

    /// Claim status of all three parts of one loop
    pub fn parts_of(&self, loop_id: &str) -> [(LoopPart, Option<&str>); 3] {
        LoopPart::ALL.map(|part| (part, self.holder_of(loop_id, part)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::card::{Card, CardKind, LoopClaim};

    fn card(id: &str) -> Card {
        Card::new(id.into(), CardKind::Scene, id.into())
    }

    #[test]
    fn test_beat_index_records_holders() {
        let mut p = Project::new("t");
        let mut a = card("a");
        a.beats = vec![Beat::Catalyst, Beat::OpeningImage];
        let mut b = card("b");
        b.beats = vec![Beat::Midpoint];
        p.cards.insert("a".into(), a);
        p.cards.insert("b".into(), b);

        let index = BeatIndex::build(&p);
        assert_eq!(index.holder(&Beat::Catalyst), Some("a"));
        assert_eq!(index.holder(&Beat::Midpoint), Some("b"));
        assert_eq!(index.holder(&Beat::Finale), None);
        assert_eq!(index.unclaimed().len(), 12);
        assert_eq!(index.conflicts().count(), 0);
        let keys: Vec<Beat> = index.iter().map(|(b, _)| *b).collect();
        assert_eq!(keys, vec![Beat::OpeningImage, Beat::Catalyst, Beat::Midpoint]);
    }

    #[test]
    fn test_duplicate_claim_last_scanned_wins_and_is_reported() {
        let mut p = Project::new("t");
        let mut a = card("a");
        a.beats = vec![Beat::Finale];
        let mut b = card("b");
        b.beats = vec![Beat::Finale];
        p.cards.insert("a".into(), a);
        p.cards.insert("b".into(), b);

        let index = BeatIndex::build(&p);
        assert_eq!(index.holder(&Beat::Finale), Some("b"));
        let conflicts: Vec<_> = index.conflicts().collect();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].1, &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_loop_index_parts() {
        let mut p = Project::new("t");
        let mut a = card("a");
        a.loops = vec![LoopClaim::new("gun", LoopPart::Setup)];
        let mut b = card("b");
        b.loops = vec![LoopClaim::new("gun", LoopPart::Payoff)];
        p.cards.insert("a".into(), a);
        p.cards.insert("b".into(), b);

        let index = LoopIndex::build(&p);
        assert_eq!(
            index.parts_of("gun"),
            [
                (LoopPart::Setup, Some("a")),
                (LoopPart::Bump, None),
                (LoopPart::Payoff, Some("b")),
            ]
        );
        assert!(index.mentions("b"));
        assert!(!index.mentions("c"));
    }
}
