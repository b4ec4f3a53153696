use std::fs;
use std::path::{Path, PathBuf};

use crate::io::store::{JsonFileStore, Session};
use crate::model::config::ProjectConfig;

/// Directory under the workspace root that holds a board
pub const BOARD_DIR: &str = "board";

/// Error type for workspace discovery and configuration
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("not a beatboard project: no board/project.toml found")]
    NotAProject,
    #[error("a board already exists at {0}")]
    AlreadyInitialized(PathBuf),
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse project.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not edit project.toml: {0}")]
    ConfigEditError(#[from] toml_edit::TomlError),
    #[error("unknown config key \"{0}\"")]
    UnknownKey(String),
    #[error("invalid value \"{value}\" for {key}: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// A discovered board: where it lives and how it is configured.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub board_dir: PathBuf,
    pub config: ProjectConfig,
}

impl Workspace {
    pub fn config_path(&self) -> PathBuf {
        self.board_dir.join("project.toml")
    }

    pub fn store(&self) -> JsonFileStore {
        JsonFileStore::in_board(&self.board_dir)
    }

    /// Open the board's story snapshot.
    pub fn open_session(&self) -> Result<Session<JsonFileStore>, crate::io::store::StoreError> {
        Session::open(self.store())
    }
}

/// Walk up from `start` looking for `board/project.toml`; returns the
/// directory containing `board/`.
pub fn discover_project(start: &Path) -> Result<PathBuf, ProjectError> {
    let mut current = start.to_path_buf();
    loop {
        let board_dir = current.join(BOARD_DIR);
        if board_dir.is_dir() && board_dir.join("project.toml").exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ProjectError::NotAProject);
        }
    }
}

/// Load the workspace rooted at `root` (the parent of `board/`).
pub fn load_workspace(root: &Path) -> Result<Workspace, ProjectError> {
    let board_dir = root.join(BOARD_DIR);
    if !board_dir.is_dir() {
        return Err(ProjectError::NotAProject);
    }
    let (config, _) = crate::io::config_io::read_config(&board_dir)?;
    Ok(Workspace {
        root: root.to_path_buf(),
        board_dir,
        config,
    })
}

/// Create `board/` under `root` with the given `project.toml` text.
/// Fails if a board is already there.
pub fn create_board(root: &Path, project_toml: &str) -> Result<Workspace, ProjectError> {
    let board_dir = root.join(BOARD_DIR);
    let config_path = board_dir.join("project.toml");
    if config_path.exists() {
        return Err(ProjectError::AlreadyInitialized(board_dir));
    }
    fs::create_dir_all(&board_dir).map_err(|source| ProjectError::WriteError {
        path: board_dir.clone(),
        source,
    })?;
    fs::write(&config_path, project_toml).map_err(|source| ProjectError::WriteError {
        path: config_path.clone(),
        source,
    })?;
    fs::write(board_dir.join(".gitignore"), ".lock\n").map_err(|source| {
        ProjectError::WriteError {
            path: board_dir.join(".gitignore"),
            source,
        }
    })?;
    load_workspace(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::IdStyle;
    use tempfile::TempDir;

    const TOML: &str = "[project]\ntitle = \"Heist\"\n\n[ids]\ngenerator = \"sequential\"\n";

    #[test]
    fn test_discover_from_subdirectory() {
        let tmp = TempDir::new().unwrap();
        create_board(tmp.path(), TOML).unwrap();
        let sub = tmp.path().join("notes/drafts");
        fs::create_dir_all(&sub).unwrap();

        assert_eq!(discover_project(tmp.path()).unwrap(), tmp.path());
        assert_eq!(discover_project(&sub).unwrap(), tmp.path());
    }

    #[test]
    fn test_discover_requires_project_toml() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("board")).unwrap();
        assert!(matches!(
            discover_project(tmp.path()),
            Err(ProjectError::NotAProject)
        ));
    }

    #[test]
    fn test_create_and_load() {
        let tmp = TempDir::new().unwrap();
        let ws = create_board(tmp.path(), TOML).unwrap();
        assert_eq!(ws.config.project.title, "Heist");
        assert_eq!(ws.config.ids.generator, IdStyle::Sequential);
        assert!(ws.board_dir.join(".gitignore").exists());

        assert!(matches!(
            create_board(tmp.path(), TOML),
            Err(ProjectError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_bad_config_is_reported() {
        let tmp = TempDir::new().unwrap();
        let err = create_board(tmp.path(), "[claims]\nbeats = \"sometimes\"\n").unwrap_err();
        assert!(matches!(err, ProjectError::ConfigParseError(_)));
    }
}
