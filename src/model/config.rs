use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration from board/project.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub project: ProjectInfo,
    #[serde(default)]
    pub claims: ClaimConfig,
    #[serde(default)]
    pub ids: IdConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub title: String,
}

/// What happens when a card claims a beat or loop part another card holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimPolicy {
    /// Reject the second claim
    #[default]
    Exclusive,
    /// Revoke the prior holder's claim and grant it to the new card
    Steal,
    /// No cross-card enforcement; the index reports the conflict
    Shared,
}

impl ClaimPolicy {
    pub fn parse_policy(s: &str) -> Option<ClaimPolicy> {
        match s {
            "exclusive" => Some(ClaimPolicy::Exclusive),
            "steal" => Some(ClaimPolicy::Steal),
            "shared" => Some(ClaimPolicy::Shared),
            _ => None,
        }
    }
}

impl fmt::Display for ClaimPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimPolicy::Exclusive => write!(f, "exclusive"),
            ClaimPolicy::Steal => write!(f, "steal"),
            ClaimPolicy::Shared => write!(f, "shared"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimConfig {
    #[serde(default)]
    pub beats: ClaimPolicy,
    #[serde(default)]
    pub loops: ClaimPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStyle {
    #[default]
    Uuid,
    /// `<prefix>-<n>`, friendlier on the command line
    Sequential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdConfig {
    #[serde(default)]
    pub generator: IdStyle,
    /// Default: "c"
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for IdConfig {
    fn default() -> Self {
        IdConfig {
            generator: IdStyle::Uuid,
            prefix: default_prefix(),
        }
    }
}

fn default_prefix() -> String {
    "c".to_string()
}

/// Titles given to freshly created cards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_scene_title")]
    pub scene_title: String,
    #[serde(default = "default_chapter_title")]
    pub chapter_title: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        DefaultsConfig {
            scene_title: default_scene_title(),
            chapter_title: default_chapter_title(),
        }
    }
}

fn default_scene_title() -> String {
    "New Beat".to_string()
}

fn default_chapter_title() -> String {
    "New Chapter".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ProjectConfig = toml::from_str("").unwrap();
        assert_eq!(config.claims.beats, ClaimPolicy::Exclusive);
        assert_eq!(config.ids.generator, IdStyle::Uuid);
        assert_eq!(config.ids.prefix, "c");
        assert_eq!(config.defaults.scene_title, "New Beat");
    }

    #[test]
    fn test_partial_config() {
        let config: ProjectConfig = toml::from_str(
            r#"
[project]
title = "Heist"

[claims]
loops = "steal"

[ids]
generator = "sequential"
"#,
        )
        .unwrap();
        assert_eq!(config.project.title, "Heist");
        assert_eq!(config.claims.beats, ClaimPolicy::Exclusive);
        assert_eq!(config.claims.loops, ClaimPolicy::Steal);
        assert_eq!(config.ids.generator, IdStyle::Sequential);
        assert_eq!(config.ids.prefix, "c");
    }
}
