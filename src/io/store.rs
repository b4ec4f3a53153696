//! Persistence boundary: whole-project snapshots in, whole-project
//! snapshots out.
//!
//! Saves are last-write-wins. Each snapshot carries a revision counter so
//! the file store can notice when it is about to overwrite a snapshot it
//! never loaded; the overwritten text is copied into the recovery log first.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::io::recovery::{RecoveryCategory, RecoveryEntry, atomic_write, log_recovery};
use crate::model::project::Project;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no saved project at {0}")]
    NotFound(String),
    #[error("could not read {location}: {source}")]
    Read { location: String, source: io::Error },
    #[error("could not write {location}: {source}")]
    Write { location: String, source: io::Error },
    #[error("could not parse {location}: {source}")]
    Parse {
        location: String,
        source: serde_json::Error,
    },
    #[error("could not serialize project: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Loads and saves a complete [`Project`].
pub trait ProjectStore {
    /// Full replacement: the returned project is everything the store holds.
    fn load(&mut self) -> Result<Project, StoreError>;

    /// Full snapshot: whatever the store held is replaced.
    fn save(&mut self, project: &Project) -> Result<(), StoreError>;
}

/// The on-disk envelope around a project snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryDocument {
    pub revision: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    pub project: Project,
}

/// Parse snapshot text. Documents written before the envelope existed are a
/// bare project and load as revision 0; anything carrying envelope keys must
/// parse as an envelope.
fn parse_document(text: &str) -> Result<StoryDocument, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let enveloped = value
        .as_object()
        .is_some_and(|obj| obj.contains_key("project") || obj.contains_key("revision"));
    if enveloped {
        return serde_json::from_value(value);
    }
    Ok(StoryDocument {
        revision: 0,
        saved_at: None,
        project: serde_json::from_value(value)?,
    })
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// `board/story.json`, written atomically.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    /// Revision of the snapshot last loaded or saved by this store
    revision: Option<u64>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore {
            path: path.into(),
            revision: None,
        }
    }

    /// Store for the standard snapshot inside a board directory
    pub fn in_board(board_dir: &Path) -> Self {
        Self::new(board_dir.join("story.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn revision(&self) -> Option<u64> {
        self.revision
    }

    fn board_dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn read_document(&self) -> Result<Option<(String, StoryDocument)>, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Read {
                    location: self.location(),
                    source,
                });
            }
        };
        let doc = parse_document(&text).map_err(|source| StoreError::Parse {
            location: self.location(),
            source,
        })?;
        Ok(Some((text, doc)))
    }

    /// Copy a snapshot we are about to clobber into the recovery log.
    fn preserve_overwritten(&self, text: &str, disk_revision: Option<u64>) {
        let mut entry = RecoveryEntry::new(
            RecoveryCategory::Conflict,
            "overwrote a snapshot this session had not seen",
        )
        .field("Target", self.location());
        if let Some(rev) = disk_revision {
            entry = entry.field("Revision", rev.to_string());
        }
        if let Some(rev) = self.revision {
            entry = entry.field("Loaded", rev.to_string());
        }
        log_recovery(self.board_dir(), entry.body(text));
    }
}

impl ProjectStore for JsonFileStore {
    fn load(&mut self) -> Result<Project, StoreError> {
        let Some((_, doc)) = self.read_document()? else {
            return Err(StoreError::NotFound(self.location()));
        };
        info!(path = %self.path.display(), revision = doc.revision, "loaded project");
        self.revision = Some(doc.revision);
        Ok(doc.project)
    }

    fn save(&mut self, project: &Project) -> Result<(), StoreError> {
        let on_disk = match self.read_document() {
            Ok(found) => found.map(|(text, doc)| (text, Some(doc.revision))),
            // An unreadable snapshot is still overwritten, but kept.
            Err(StoreError::Parse { .. }) => std::fs::read_to_string(&self.path)
                .ok()
                .map(|text| (text, None)),
            Err(e) => {
                warn!(error = %e, "could not inspect existing snapshot before saving");
                None
            }
        };

        let mut next = self.revision.unwrap_or(0) + 1;
        if let Some((text, disk_revision)) = &on_disk {
            let stale = match (disk_revision, self.revision) {
                (Some(disk), Some(ours)) => *disk > ours,
                _ => true,
            };
            if stale {
                warn!(
                    path = %self.path.display(),
                    disk = ?disk_revision,
                    loaded = ?self.revision,
                    "overwriting a newer snapshot; previous copy kept in recovery log"
                );
                self.preserve_overwritten(text, *disk_revision);
            }
            if let Some(disk) = disk_revision {
                next = next.max(disk + 1);
            }
        }

        let doc = StoryDocument {
            revision: next,
            saved_at: Some(Utc::now()),
            project: project.clone(),
        };
        let mut json = serde_json::to_string_pretty(&doc)?;
        json.push('\n');

        if let Err(source) = atomic_write(&self.path, json.as_bytes()) {
            log_recovery(
                self.board_dir(),
                RecoveryEntry::new(RecoveryCategory::Write, "snapshot write failed")
                    .field("Target", self.location())
                    .field("Error", source.to_string())
                    .body(json),
            );
            return Err(StoreError::Write {
                location: self.location(),
                source,
            });
        }
        self.revision = Some(next);
        info!(path = %self.path.display(), revision = next, "saved project");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Keeps the snapshot in process. Reads and writes can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Option<Project>,
    saves: usize,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(project: Project) -> Self {
        MemoryStore {
            snapshot: Some(project),
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> Option<&Project> {
        self.snapshot.as_ref()
    }

    /// Number of successful saves
    pub fn saves(&self) -> usize {
        self.saves
    }

    pub fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl ProjectStore for MemoryStore {
    fn load(&mut self) -> Result<Project, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Read {
                location: "memory".into(),
                source: io::Error::other("reads disabled"),
            });
        }
        self.snapshot
            .clone()
            .ok_or_else(|| StoreError::NotFound("memory".into()))
    }

    fn save(&mut self, project: &Project) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Write {
                location: "memory".into(),
                source: io::Error::other("writes disabled"),
            });
        }
        self.snapshot = Some(project.clone());
        self.saves += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One open project bound to the store it came from.
///
/// A failed save keeps the local edits so the caller can retry; a failed
/// reload keeps the current project.
#[derive(Debug)]
pub struct Session<S: ProjectStore> {
    store: S,
    project: Project,
    dirty: bool,
}

impl<S: ProjectStore> Session<S> {
    pub fn open(mut store: S) -> Result<Self, StoreError> {
        let project = store.load()?;
        Ok(Session {
            store,
            project,
            dirty: false,
        })
    }

    /// Start a session around a project the store has never seen.
    pub fn create(store: S, project: Project) -> Self {
        Session {
            store,
            project,
            dirty: true,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Mutable access; marks the session as having unsaved edits.
    pub fn project_mut(&mut self) -> &mut Project {
        self.dirty = true;
        &mut self.project
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn save(&mut self) -> Result<(), StoreError> {
        self.store.save(&self.project)?;
        self.dirty = false;
        Ok(())
    }

    /// Replace the project with the store's copy, discarding local edits.
    pub fn reload(&mut self) -> Result<(), StoreError> {
        match self.store.load() {
            Ok(project) => {
                self.project = project;
                self.dirty = false;
                debug!("reloaded project");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "reload failed; keeping current project");
                Err(e)
            }
        }
    }
}
