use serde::{Deserialize, Serialize};

use super::card::{CharacterId, LocationId, LoopId};

/// An entry in the character bible
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    /// Story function, e.g. "protagonist" or "mentor"
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub description: String,
}

impl Character {
    pub fn new(id: CharacterId, name: String) -> Self {
        Character {
            id,
            name,
            role: String::new(),
            description: String::new(),
        }
    }
}

/// An entry in the location atlas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Location {
    pub fn new(id: LocationId, name: String) -> Self {
        Location {
            id,
            name,
            description: String::new(),
        }
    }
}

/// A setup/payoff thread. Its three parts are claimed by cards, not stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupPayoff {
    pub id: LoopId,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl SetupPayoff {
    pub fn new(id: LoopId, title: String) -> Self {
        SetupPayoff {
            id,
            title,
            description: String::new(),
        }
    }
}
