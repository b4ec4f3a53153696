//! Append-only recovery log at `board/.recovery.log`.
//!
//! Anything beatboard could not save normally, or is about to destroy,
//! lands here as a markdown entry so it can be recovered by hand: failed
//! snapshot writes, snapshots overwritten by a stale session, and deleted
//! card subtrees.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::io::lock::try_flock;
use crate::model::card::Card;

/// Size past which appending first trims the log (1 MB).
const MAX_LOG_SIZE: u64 = 1_048_576;

/// Default number of days before entries are prunable.
pub const PRUNE_AGE_DAYS: i64 = 30;

const FILE_HEADER: &str = "\
<!-- beatboard recovery log: data that could not be saved normally,
     or was removed. View with: bb recovery
     Prune old entries: bb recovery prune -->

---
";

/// Separates the timestamp from the category in an entry header
const HEADER_SEP: &str = " | ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCategory {
    /// A snapshot write failed; the body holds the unsaved snapshot
    Write,
    /// A save overwrote a newer snapshot; the body holds the overwritten one
    Conflict,
    /// Cards were deleted; the body holds them as JSON
    Delete,
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryCategory::Write => write!(f, "write"),
            RecoveryCategory::Conflict => write!(f, "conflict"),
            RecoveryCategory::Delete => write!(f, "delete"),
        }
    }
}

impl RecoveryCategory {
    pub fn parse_category(s: &str) -> Option<Self> {
        match s {
            "write" => Some(RecoveryCategory::Write),
            "conflict" => Some(RecoveryCategory::Conflict),
            "delete" => Some(RecoveryCategory::Delete),
            _ => None,
        }
    }
}

/// A single entry in the recovery log.
#[derive(Debug, Clone)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub body: String,
}

pub fn recovery_log_path(board_dir: &Path) -> PathBuf {
    board_dir.join(".recovery.log")
}

// ---------------------------------------------------------------------------
// Atomic file write
// ---------------------------------------------------------------------------

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

impl RecoveryEntry {
    pub fn new(category: RecoveryCategory, description: impl Into<String>) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: Vec::new(),
            body: String::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Markdown block as written to the log
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {}{}{}: {}\n\n",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            HEADER_SEP,
            self.category,
            self.description,
        );
        for (key, value) in &self.fields {
            out.push_str(&format!("{}: {}\n", key, value));
        }
        if !self.body.is_empty() {
            out.push_str("\n```text\n");
            out.push_str(&self.body);
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }
        out.push_str("\n---\n");
        out
    }

    pub fn to_json(&self) -> serde_json::Value {
        let fields: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "category": self.category.to_string(),
            "description": self.description,
            "fields": fields,
            "body": self.body,
        })
    }
}

/// Append an entry. Failures are logged and otherwise swallowed: losing a
/// recovery entry must never fail the operation that produced it.
pub fn log_recovery(board_dir: &Path, entry: RecoveryEntry) {
    if let Err(e) = append_entry(board_dir, &entry) {
        warn!(error = %e, category = %entry.category, "could not write to recovery log");
    }
}

/// Record a deleted subtree (root first) so it can be pasted back by hand.
pub fn log_deleted_cards(board_dir: &Path, removed: &[Card]) {
    let Some(root) = removed.first() else {
        return;
    };
    let body = match serde_json::to_string_pretty(removed) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "could not serialize deleted cards");
            return;
        }
    };
    log_recovery(
        board_dir,
        RecoveryEntry::new(
            RecoveryCategory::Delete,
            format!("deleted \"{}\"", root.title),
        )
        .field("Card", root.id.clone())
        .field("Removed", removed.len().to_string())
        .body(body),
    );
}

fn append_entry(board_dir: &Path, entry: &RecoveryEntry) -> io::Result<()> {
    let path = recovery_log_path(board_dir);
    if let Ok(meta) = std::fs::metadata(&path)
        && meta.len() > MAX_LOG_SIZE
    {
        trim_log(&path, MAX_LOG_SIZE);
    }
    let needs_header = std::fs::metadata(&path).map_or(true, |m| m.len() == 0);
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if needs_header {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    file.write_all(entry.to_markdown().as_bytes())
}

/// Drop expired entries, then the oldest remaining ones, until the log fits
/// in `max_size`. Skipped when another process holds the log.
fn trim_log(path: &Path, max_size: u64) {
    let Ok(file) = OpenOptions::new().read(true).write(true).open(path) else {
        return;
    };
    if try_flock(&file).is_err() {
        return;
    }
    let Ok(content) = std::fs::read_to_string(path) else {
        return;
    };

    let cutoff = Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS);
    let fresh: Vec<String> = parse_entries(&content)
        .iter()
        .filter(|e| e.timestamp >= cutoff)
        .map(RecoveryEntry::to_markdown)
        .collect();

    let mut total = FILE_HEADER.len() + fresh.iter().map(String::len).sum::<usize>();
    let mut start = 0;
    while total as u64 > max_size && start < fresh.len() {
        total -= fresh[start].len();
        start += 1;
    }

    let mut kept = String::from(FILE_HEADER);
    for md in &fresh[start..] {
        kept.push_str(md);
    }
    if kept.len() >= content.len() {
        return;
    }
    match atomic_write(path, kept.as_bytes()) {
        Ok(()) => debug!(before = content.len(), after = kept.len(), "trimmed recovery log"),
        Err(e) => warn!(error = %e, "could not trim recovery log"),
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read entries, most recent first. `limit` keeps only the newest `n`.
pub fn read_recovery_entries(board_dir: &Path, limit: Option<usize>) -> Vec<RecoveryEntry> {
    let Ok(content) = std::fs::read_to_string(recovery_log_path(board_dir)) else {
        return Vec::new();
    };
    let mut entries = parse_entries(&content);
    entries.reverse();
    if let Some(n) = limit {
        entries.truncate(n);
    }
    entries
}

fn parse_entries(content: &str) -> Vec<RecoveryEntry> {
    let mut entries = Vec::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let Some((timestamp, category, description)) =
            line.strip_prefix("## ").and_then(parse_entry_header)
        else {
            continue;
        };

        let mut fields = Vec::new();
        let mut body_lines: Vec<&str> = Vec::new();
        let mut in_body = false;
        for line in lines.by_ref() {
            if in_body {
                if line == "```" {
                    in_body = false;
                } else {
                    body_lines.push(line);
                }
                continue;
            }
            if line == "---" {
                break;
            }
            if line.starts_with("```") {
                in_body = true;
            } else if let Some((key, value)) = line.split_once(": ") {
                fields.push((key.to_string(), value.to_string()));
            }
        }

        entries.push(RecoveryEntry {
            timestamp,
            category,
            description,
            fields,
            body: body_lines.join("\n"),
        });
    }
    entries
}

fn parse_entry_header(header: &str) -> Option<(DateTime<Utc>, RecoveryCategory, String)> {
    let (timestamp, rest) = header.split_once(HEADER_SEP)?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .ok()?
        .with_timezone(&Utc);
    let (category, description) = rest.split_once(": ")?;
    let category = RecoveryCategory::parse_category(category)?;
    Some((timestamp, category, description.to_string()))
}

// ---------------------------------------------------------------------------
// Pruning
// ---------------------------------------------------------------------------

/// Drop entries older than `before` (default: [`PRUNE_AGE_DAYS`] ago), or
/// every entry when `all` is set. Returns how many were removed.
pub fn prune_recovery(
    board_dir: &Path,
    before: Option<DateTime<Utc>>,
    all: bool,
) -> io::Result<usize> {
    let path = recovery_log_path(board_dir);
    if !path.exists() {
        return Ok(0);
    }
    let file = OpenOptions::new().read(true).write(true).open(&path)?;
    if try_flock(&file).is_err() {
        return Err(io::Error::new(
            io::ErrorKind::WouldBlock,
            "recovery log is in use, try again later",
        ));
    }

    let content = std::fs::read_to_string(&path)?;
    let entries = parse_entries(&content);
    let cutoff = before.unwrap_or_else(|| Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS));

    let mut kept = String::from(FILE_HEADER);
    let mut removed = 0;
    for entry in &entries {
        if all || entry.timestamp < cutoff {
            removed += 1;
        } else {
            kept.push_str(&entry.to_markdown());
        }
    }
    atomic_write(&path, kept.as_bytes())?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entry_markdown_shape() {
        let md = RecoveryEntry::new(RecoveryCategory::Delete, "card c-1 deleted")
            .field("Card", "c-1")
            .body("{\"id\":\"c-1\"}")
            .to_markdown();
        assert!(md.contains(" | delete: card c-1 deleted"));
        assert!(md.contains("Card: c-1\n"));
        assert!(md.contains("```text\n{\"id\":\"c-1\"}\n```\n"));
        assert!(md.ends_with("---\n"));
    }

    #[test]
    fn test_log_and_read_back() {
        let tmp = TempDir::new().unwrap();
        log_recovery(
            tmp.path(),
            RecoveryEntry::new(RecoveryCategory::Write, "snapshot write failed")
                .field("Target", "story.json")
                .body("{\n  \"title\": \"x\"\n}"),
        );
        log_recovery(
            tmp.path(),
            RecoveryEntry::new(RecoveryCategory::Conflict, "overwrote revision 4"),
        );

        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].category, RecoveryCategory::Conflict);
        assert_eq!(entries[1].category, RecoveryCategory::Write);
        assert_eq!(
            entries[1].fields,
            vec![("Target".to_string(), "story.json".to_string())]
        );
        assert_eq!(entries[1].body, "{\n  \"title\": \"x\"\n}");

        let limited = read_recovery_entries(tmp.path(), Some(1));
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].description, "overwrote revision 4");
    }

    #[test]
    fn test_log_deleted_cards_keeps_subtree() {
        use crate::model::card::CardKind;
        let tmp = TempDir::new().unwrap();
        let mut scene = Card::new("c-1".into(), CardKind::Scene, "Heist".into());
        scene.children.push("c-2".into());
        let mut chapter = Card::new("c-2".into(), CardKind::Chapter, "Casing".into());
        chapter.parent = Some("c-1".into());
        log_deleted_cards(tmp.path(), &[scene.clone(), chapter.clone()]);

        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "deleted \"Heist\"");
        assert!(entries[0].fields.contains(&("Removed".to_string(), "2".to_string())));
        let restored: Vec<Card> = serde_json::from_str(&entries[0].body).unwrap();
        assert_eq!(restored, vec![scene, chapter]);
    }

    #[test]
    fn test_read_missing_log() {
        let tmp = TempDir::new().unwrap();
        assert!(read_recovery_entries(tmp.path(), None).is_empty());
    }

    #[test]
    fn test_trim_drops_oldest_until_under_cap() {
        let tmp = TempDir::new().unwrap();
        for i in 0..5 {
            let mut entry = RecoveryEntry::new(RecoveryCategory::Delete, format!("entry {}", i))
                .body("x".repeat(200));
            entry.timestamp = Utc::now() - chrono::Duration::minutes(10 - i);
            log_recovery(tmp.path(), entry);
        }
        let path = recovery_log_path(tmp.path());
        let one_entry = std::fs::metadata(&path).unwrap().len() as usize / 5;

        let cap = (FILE_HEADER.len() + 2 * one_entry) as u64;
        trim_log(&path, cap);
        assert!(std::fs::metadata(&path).unwrap().len() <= cap);
        let left: Vec<String> = read_recovery_entries(tmp.path(), None)
            .into_iter()
            .map(|e| e.description)
            .collect();
        assert_eq!(left, vec!["entry 4".to_string(), "entry 3".to_string()]);
    }

    #[test]
    fn test_oversized_log_is_trimmed_on_append() {
        let tmp = TempDir::new().unwrap();
        let huge = "y".repeat(MAX_LOG_SIZE as usize + 1);
        log_recovery(tmp.path(), RecoveryEntry::new(RecoveryCategory::Write, "huge").body(huge));
        log_recovery(tmp.path(), RecoveryEntry::new(RecoveryCategory::Delete, "small"));

        let path = recovery_log_path(tmp.path());
        assert!(std::fs::metadata(&path).unwrap().len() < MAX_LOG_SIZE);
        let left = read_recovery_entries(tmp.path(), None);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].description, "small");
    }

    #[test]
    fn test_prune_by_age_and_all() {
        let tmp = TempDir::new().unwrap();
        let mut old = RecoveryEntry::new(RecoveryCategory::Delete, "old");
        old.timestamp = Utc::now() - chrono::Duration::days(90);
        log_recovery(tmp.path(), old);
        log_recovery(tmp.path(), RecoveryEntry::new(RecoveryCategory::Delete, "new"));

        assert_eq!(prune_recovery(tmp.path(), None, false).unwrap(), 1);
        let left = read_recovery_entries(tmp.path(), None);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].description, "new");

        assert_eq!(prune_recovery(tmp.path(), None, true).unwrap(), 1);
        assert!(read_recovery_entries(tmp.path(), None).is_empty());
    }
}
