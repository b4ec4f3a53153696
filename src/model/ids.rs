use super::config::{IdConfig, IdStyle};
use super::project::Project;

/// Source of fresh opaque identifiers
pub trait IdGenerator {
    fn new_id(&mut self) -> String;
}

/// Random v4 UUIDs in simple (hyphenless) form
#[derive(Debug, Default)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn new_id(&mut self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// `<prefix>-<n>` identifiers, counting up from a seed
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: usize,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        SequentialIds {
            prefix: prefix.into(),
            next: 1,
        }
    }

    /// Start past the highest `<prefix>-<n>` already used in the project,
    /// so a reopened project never hands out an id twice.
    pub fn seeded(prefix: impl Into<String>, project: &Project) -> Self {
        let prefix = prefix.into();
        let prefix_dash = format!("{}-", prefix);
        let max = project
            .all_ids()
            .filter_map(|id| id.strip_prefix(&prefix_dash))
            .filter_map(|n| n.parse::<usize>().ok())
            .max()
            .unwrap_or(0);
        SequentialIds {
            prefix,
            next: max + 1,
        }
    }
}

impl IdGenerator for SequentialIds {
    fn new_id(&mut self) -> String {
        let id = format!("{}-{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

/// Build the generator a project is configured for.
pub fn generator_for(config: &IdConfig, project: &Project) -> Box<dyn IdGenerator> {
    match config.generator {
        IdStyle::Uuid => Box::new(UuidIds),
        IdStyle::Sequential => Box::new(SequentialIds::seeded(&config.prefix, project)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::card::{Card, CardKind};
    use crate::model::registry::Character;

    #[test]
    fn test_uuid_ids_are_distinct() {
        let mut ids = UuidIds;
        let a = ids.new_id();
        let b = ids.new_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_sequential_seeded_past_existing() {
        let mut p = Project::new("t");
        p.cards.insert(
            "c-7".into(),
            Card::new("c-7".into(), CardKind::Scene, "x".into()),
        );
        p.characters
            .insert("c-12".into(), Character::new("c-12".into(), "Ann".into()));
        p.cards.insert(
            "other-99".into(),
            Card::new("other-99".into(), CardKind::Scene, "y".into()),
        );

        let mut ids = SequentialIds::seeded("c", &p);
        assert_eq!(ids.new_id(), "c-13");
        assert_eq!(ids.new_id(), "c-14");
    }

    #[test]
    fn test_sequential_fresh() {
        let mut ids = SequentialIds::new("n");
        assert_eq!(ids.new_id(), "n-1");
        assert_eq!(ids.new_id(), "n-2");
    }
}
