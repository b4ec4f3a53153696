use serde::{Deserialize, Serialize};
use std::fmt;

use super::beat::Beat;

pub type CardId = String;
pub type CharacterId = String;
pub type LocationId = String;
pub type LoopId = String;

/// Position of a card in the narrative tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    /// Top-level unit, owns chapters
    #[serde(alias = "SCENE")]
    Scene,
    /// Second-level unit, always owned by one scene
    #[serde(alias = "CHAPTER")]
    Chapter,
    /// Legacy kind from older documents; never created
    #[serde(alias = "BEAT")]
    Beat,
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardKind::Scene => write!(f, "scene"),
            CardKind::Chapter => write!(f, "chapter"),
            CardKind::Beat => write!(f, "beat"),
        }
    }
}

/// Emotional charge of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    #[serde(alias = "POSITIVE")]
    Positive,
    #[serde(alias = "NEGATIVE")]
    Negative,
}

impl Polarity {
    /// The glyph shown next to a card title
    pub fn symbol(self) -> char {
        match self {
            Polarity::Positive => '+',
            Polarity::Negative => '-',
        }
    }

    pub fn parse_polarity(s: &str) -> Option<Polarity> {
        match s.to_ascii_lowercase().as_str() {
            "positive" | "+" => Some(Polarity::Positive),
            "negative" | "-" => Some(Polarity::Negative),
            _ => None,
        }
    }
}

/// One of the three claimable parts of a setup/payoff loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopPart {
    #[serde(alias = "SETUP")]
    Setup,
    /// Reminder of the setup somewhere in the middle
    #[serde(alias = "BUMP")]
    Bump,
    #[serde(alias = "PAYOFF")]
    Payoff,
}

impl LoopPart {
    pub const ALL: [LoopPart; 3] = [LoopPart::Setup, LoopPart::Bump, LoopPart::Payoff];

    pub fn parse_part(s: &str) -> Option<LoopPart> {
        match s.to_ascii_lowercase().as_str() {
            "setup" => Some(LoopPart::Setup),
            "bump" => Some(LoopPart::Bump),
            "payoff" => Some(LoopPart::Payoff),
            _ => None,
        }
    }
}

impl fmt::Display for LoopPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopPart::Setup => write!(f, "setup"),
            LoopPart::Bump => write!(f, "bump"),
            LoopPart::Payoff => write!(f, "payoff"),
        }
    }
}

/// A card's claim on one part of a loop
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoopClaim {
    #[serde(rename = "id")]
    pub loop_id: LoopId,
    pub part: LoopPart,
}

impl LoopClaim {
    pub fn new(loop_id: impl Into<LoopId>, part: LoopPart) -> Self {
        LoopClaim {
            loop_id: loop_id.into(),
            part,
        }
    }
}

/// A node in the narrative tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    #[serde(alias = "type")]
    pub kind: CardKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polarity: Option<Polarity>,
    /// The two characters whose opposition drives this card
    #[serde(default)]
    pub conflict: [Option<CharacterId>; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationId>,
    /// Ordered child ids (scenes only)
    #[serde(default)]
    pub children: Vec<CardId>,
    /// Owning scene (chapters only)
    #[serde(default, alias = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent: Option<CardId>,
    /// Beats this card claims
    #[serde(default, alias = "associatedBeats")]
    pub beats: Vec<Beat>,
    /// Loop parts this card claims
    #[serde(default, alias = "linkedSetupPayoffs")]
    pub loops: Vec<LoopClaim>,
}

impl Card {
    pub fn new(id: CardId, kind: CardKind, title: String) -> Self {
        Card {
            id,
            kind,
            title,
            description: String::new(),
            draft: None,
            polarity: None,
            conflict: [None, None],
            location: None,
            children: Vec::new(),
            parent: None,
            beats: Vec::new(),
            loops: Vec::new(),
        }
    }

    pub fn is_scene(&self) -> bool {
        self.kind == CardKind::Scene
    }

    pub fn is_chapter(&self) -> bool {
        self.kind == CardKind::Chapter
    }

    pub fn claims_beat(&self, beat: Beat) -> bool {
        self.beats.contains(&beat)
    }

    pub fn claims_loop_part(&self, loop_id: &str, part: LoopPart) -> bool {
        self.loops
            .iter()
            .any(|c| c.loop_id == loop_id && c.part == part)
    }

    /// Character ids referenced by this card, skipping empty slots
    pub fn conflict_subjects(&self) -> impl Iterator<Item = &CharacterId> {
        self.conflict.iter().flatten()
    }
}

/// A shallow field update for [`Card`]. `None` leaves a field alone; the
/// nested `Option` on clearable fields distinguishes "set" from "clear".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub draft: Option<Option<String>>,
    pub polarity: Option<Option<Polarity>>,
    pub conflict: Option<[Option<CharacterId>; 2]>,
    pub location: Option<Option<LocationId>>,
}

impl CardPatch {
    pub fn is_empty(&self) -> bool {
        *self == CardPatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_card_shape_deserializes() {
        let card: Card = serde_json::from_str(
            r#"{
                "id": "abc",
                "type": "CHAPTER",
                "title": "The heist",
                "parentId": "s1",
                "polarity": "NEGATIVE",
                "associatedBeats": ["Catalyst"],
                "linkedSetupPayoffs": [{"id": "gun", "part": "SETUP"}]
            }"#,
        )
        .unwrap();
        assert_eq!(card.kind, CardKind::Chapter);
        assert_eq!(card.parent.as_deref(), Some("s1"));
        assert_eq!(card.polarity, Some(Polarity::Negative));
        assert_eq!(card.beats, vec![Beat::Catalyst]);
        assert!(card.claims_loop_part("gun", LoopPart::Setup));
        assert!(card.children.is_empty());
        assert_eq!(card.description, "");
    }

    #[test]
    fn test_conflict_subjects_skips_empty_slots() {
        let mut card = Card::new("c".into(), CardKind::Scene, "t".into());
        card.conflict = [None, Some("villain".into())];
        let subjects: Vec<_> = card.conflict_subjects().collect();
        assert_eq!(subjects, vec!["villain"]);
    }

    #[test]
    fn test_parse_part_and_polarity() {
        assert_eq!(LoopPart::parse_part("Payoff"), Some(LoopPart::Payoff));
        assert_eq!(LoopPart::parse_part("reminder"), None);
        assert_eq!(Polarity::parse_polarity("+"), Some(Polarity::Positive));
        assert_eq!(Polarity::parse_polarity("NEGATIVE"), Some(Polarity::Negative));
    }
}
