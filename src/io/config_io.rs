use std::fs;
use std::path::Path;

use crate::io::project_io::ProjectError;
use crate::model::config::{ClaimPolicy, ProjectConfig};

/// Keys `bb config set` accepts, as `table.key`
pub const SETTABLE_KEYS: &[&str] = &[
    "project.title",
    "claims.beats",
    "claims.loops",
    "ids.generator",
    "ids.prefix",
    "defaults.scene_title",
    "defaults.chapter_title",
];

/// Read the project config, returning both the parsed config and the raw
/// toml_edit document for round-trip-safe editing.
pub fn read_config(
    board_dir: &Path,
) -> Result<(ProjectConfig, toml_edit::DocumentMut), ProjectError> {
    let config_path = board_dir.join("project.toml");
    let config_text = fs::read_to_string(&config_path).map_err(|e| ProjectError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    let config: ProjectConfig = toml::from_str(&config_text)?;
    let doc: toml_edit::DocumentMut = config_text.parse()?;
    Ok((config, doc))
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config(board_dir: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ProjectError> {
    let config_path = board_dir.join("project.toml");
    crate::io::recovery::atomic_write(&config_path, doc.to_string().as_bytes()).map_err(|e| {
        ProjectError::WriteError {
            path: config_path,
            source: e,
        }
    })
}

/// Set one of [`SETTABLE_KEYS`] in the document after validating the value.
/// The edited document must still parse as a [`ProjectConfig`].
pub fn set_config_value(
    doc: &mut toml_edit::DocumentMut,
    key: &str,
    value: &str,
) -> Result<(), ProjectError> {
    if !SETTABLE_KEYS.contains(&key) {
        return Err(ProjectError::UnknownKey(key.to_string()));
    }
    let invalid = |expected| ProjectError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    };
    match key {
        "claims.beats" | "claims.loops" if ClaimPolicy::parse_policy(value).is_none() => {
            return Err(invalid("exclusive, steal, or shared"));
        }
        "ids.generator" if !matches!(value, "uuid" | "sequential") => {
            return Err(invalid("uuid or sequential"));
        }
        "ids.prefix"
            if value.is_empty()
                || !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
        {
            return Err(invalid("a non-empty alphanumeric prefix"));
        }
        _ => {}
    }

    let Some((table, field)) = key.split_once('.') else {
        return Err(ProjectError::UnknownKey(key.to_string()));
    };
    if !doc.contains_key(table) {
        doc[table] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc[table][field] = toml_edit::value(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::IdStyle;
    use tempfile::TempDir;

    fn sample_config() -> &'static str {
        r#"# my story
[project]
title = "Heist"

[claims]
beats = "exclusive"   # one card per beat
"#
    }

    #[test]
    fn test_round_trip_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("project.toml"), sample_config()).unwrap();

        let (config, doc) = read_config(tmp.path()).unwrap();
        assert_eq!(config.project.title, "Heist");
        write_config(tmp.path(), &doc).unwrap();

        let written = fs::read_to_string(tmp.path().join("project.toml")).unwrap();
        assert_eq!(written, sample_config());
    }

    #[test]
    fn test_set_keeps_comments_and_adds_tables() {
        let mut doc: toml_edit::DocumentMut = sample_config().parse().unwrap();
        set_config_value(&mut doc, "claims.loops", "steal").unwrap();
        set_config_value(&mut doc, "ids.generator", "sequential").unwrap();
        set_config_value(&mut doc, "defaults.scene_title", "Untitled Beat").unwrap();

        let text = doc.to_string();
        assert!(text.contains("# my story"));
        assert!(text.contains("# one card per beat"));
        let config: ProjectConfig = toml::from_str(&text).unwrap();
        assert_eq!(config.claims.loops, ClaimPolicy::Steal);
        assert_eq!(config.ids.generator, IdStyle::Sequential);
        assert_eq!(config.defaults.scene_title, "Untitled Beat");
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let mut doc: toml_edit::DocumentMut = sample_config().parse().unwrap();
        assert!(matches!(
            set_config_value(&mut doc, "claims.everything", "steal"),
            Err(ProjectError::UnknownKey(_))
        ));
        assert!(matches!(
            set_config_value(&mut doc, "claims.beats", "sometimes"),
            Err(ProjectError::InvalidValue { .. })
        ));
        assert!(matches!(
            set_config_value(&mut doc, "ids.prefix", "a-b"),
            Err(ProjectError::InvalidValue { .. })
        ));
        assert_eq!(doc.to_string(), sample_config());
    }
}
