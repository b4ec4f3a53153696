use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::card::{Card, CardId, CardKind, CharacterId, LocationId, LoopId};
use super::registry::{Character, Location, SetupPayoff};

/// A complete story: the card tree plus the registries cards point into.
///
/// Cards live in one insertion-ordered map; structure is carried by
/// `scene_order` and each scene's `children`. The registries keep an
/// explicit order list next to their maps so display order survives edits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub logline: String,
    #[serde(default)]
    pub cards: IndexMap<CardId, Card>,
    #[serde(default, alias = "columnOrder")]
    pub scene_order: Vec<CardId>,
    #[serde(default)]
    pub characters: IndexMap<CharacterId, Character>,
    #[serde(default)]
    pub character_order: Vec<CharacterId>,
    #[serde(default)]
    pub locations: IndexMap<LocationId, Location>,
    #[serde(default)]
    pub location_order: Vec<LocationId>,
    #[serde(default, alias = "setupPayoffs")]
    pub loops: IndexMap<LoopId, SetupPayoff>,
    #[serde(default)]
    pub loop_order: Vec<LoopId>,
}

impl Project {
    pub fn new(title: impl Into<String>) -> Self {
        Project {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn card(&self, id: &str) -> Option<&Card> {
        self.cards.get(id)
    }

    pub fn card_mut(&mut self, id: &str) -> Option<&mut Card> {
        self.cards.get_mut(id)
    }

    /// Look up a card only if it is a scene
    pub fn scene(&self, id: &str) -> Option<&Card> {
        self.cards.get(id).filter(|c| c.kind == CardKind::Scene)
    }

    /// Look up a card only if it is a chapter
    pub fn chapter(&self, id: &str) -> Option<&Card> {
        self.cards.get(id).filter(|c| c.kind == CardKind::Chapter)
    }

    /// Scenes in top-level order. Ids in the order list that no longer
    /// resolve are skipped.
    pub fn scenes(&self) -> impl Iterator<Item = &Card> {
        self.scene_order.iter().filter_map(|id| self.cards.get(id))
    }

    /// Children of a scene in order, skipping unresolvable ids.
    pub fn chapters_of<'a>(&'a self, scene: &'a Card) -> impl Iterator<Item = &'a Card> + 'a {
        scene.children.iter().filter_map(|id| self.cards.get(id))
    }

    /// Cards in reading order: each scene followed by its chapters.
    pub fn walk(&self) -> Vec<&Card> {
        let mut out = Vec::with_capacity(self.cards.len());
        for scene in self.scenes() {
            out.push(scene);
            out.extend(self.chapters_of(scene));
        }
        out
    }

    pub fn count_kind(&self, kind: CardKind) -> usize {
        self.cards.values().filter(|c| c.kind == kind).count()
    }

    pub fn character_name(&self, id: &str) -> Option<&str> {
        self.characters.get(id).map(|c| c.name.as_str())
    }

    pub fn location_name(&self, id: &str) -> Option<&str> {
        self.locations.get(id).map(|l| l.name.as_str())
    }

    /// Every id in use across cards and registries
    pub fn all_ids(&self) -> impl Iterator<Item = &str> {
        self.cards
            .keys()
            .chain(self.characters.keys())
            .chain(self.locations.keys())
            .chain(self.loops.keys())
            .map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_follows_scene_order_not_map_order() {
        let mut p = Project::new("t");
        let mut s1 = Card::new("s1".into(), CardKind::Scene, "one".into());
        let s2 = Card::new("s2".into(), CardKind::Scene, "two".into());
        let mut c1 = Card::new("c1".into(), CardKind::Chapter, "ch".into());
        c1.parent = Some("s1".into());
        s1.children.push("c1".into());
        p.cards.insert("s2".into(), s2);
        p.cards.insert("c1".into(), c1);
        p.cards.insert("s1".into(), s1);
        p.scene_order = vec!["s1".into(), "s2".into(), "gone".into()];

        let ids: Vec<&str> = p.walk().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "c1", "s2"]);
    }

    #[test]
    fn test_kind_filtered_lookup() {
        let mut p = Project::new("t");
        p.cards.insert(
            "s".into(),
            Card::new("s".into(), CardKind::Scene, "scene".into()),
        );
        assert!(p.scene("s").is_some());
        assert!(p.chapter("s").is_none());
        assert!(p.scene("missing").is_none());
    }
}
