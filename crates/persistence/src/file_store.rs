//! Directory-backed storage for open sessions and finalized reports.
//!
//! ```text
//! <root>/
//! ├── open-sessions/<session_id>/
//! │   ├── report                  # encoded header
//! │   ├── start-time              # decimal millis
//! │   ├── aqs                     # latest correlation id
//! │   ├── user                    # explicit user id
//! │   ├── priority                # marker: a high-priority event was persisted
//! │   └── event0000000001[_]      # events; "_" suffix marks high priority
//! ├── reports/<session_id>            # finalized, normal tier
//! ├── priority-reports/<session_id>   # finalized, high-priority tier
//! └── native-reports/<session_id>     # finalized through the native-crash path
//! ```
//!
//! Every listing is a fresh directory scan. Entries that vanish mid-scan are
//! treated as absent, and names starting with `.` (in-flight temp files) are
//! never reported.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::{Error, Result, SessionId};

pub const REPORT_FILE: &str = "report";
pub const START_TIME_FILE: &str = "start-time";
pub const CORRELATION_FILE: &str = "aqs";
pub const USER_FILE: &str = "user";
pub const PRIORITY_MARKER_FILE: &str = "priority";

const OPEN_SESSIONS_DIR: &str = "open-sessions";
const EVENT_FILE_PREFIX: &str = "event";
const PRIORITY_EVENT_SUFFIX: char = '_';
const EVENT_SEQUENCE_WIDTH: usize = 10;

/// Which finalized-report namespace a report lives in.
///
/// Ordered by retention strength: `Native > Priority > Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReportTier {
    Normal,
    Priority,
    Native,
}

impl ReportTier {
    pub const ALL: [ReportTier; 3] = [ReportTier::Native, ReportTier::Priority, ReportTier::Normal];

    /// Native and priority reports share the high retention tier.
    pub fn is_high_priority(self) -> bool {
        !matches!(self, ReportTier::Normal)
    }

    fn dir_name(self) -> &'static str {
        match self {
            ReportTier::Normal => "reports",
            ReportTier::Priority => "priority-reports",
            ReportTier::Native => "native-reports",
        }
    }
}

/// One event file within an open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSlot {
    pub sequence: u64,
    pub high_priority: bool,
    pub file_name: String,
}

impl EventSlot {
    pub fn new(sequence: u64, high_priority: bool) -> Self {
        let suffix = if high_priority {
            PRIORITY_EVENT_SUFFIX.to_string()
        } else {
            String::new()
        };
        Self {
            sequence,
            high_priority,
            file_name: format!(
                "{EVENT_FILE_PREFIX}{sequence:0width$}{suffix}",
                width = EVENT_SEQUENCE_WIDTH
            ),
        }
    }

    /// Parse an event file name; anything else in the session directory is `None`.
    pub fn parse(file_name: &str) -> Option<Self> {
        let rest = file_name.strip_prefix(EVENT_FILE_PREFIX)?;
        let (digits, high_priority) = match rest.strip_suffix(PRIORITY_EVENT_SUFFIX) {
            Some(digits) => (digits, true),
            None => (rest, false),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let sequence = digits.parse().ok()?;
        Some(Self {
            sequence,
            high_priority,
            file_name: file_name.to_string(),
        })
    }
}

/// File-group storage consumed by the persistence engine.
///
/// Implementations must make single-file writes atomic and must tolerate
/// concurrent deletion during enumeration.
pub trait SessionDirectoryStore: Send + Sync {
    /// Atomically write `name` inside the session's directory, creating it if needed.
    fn write_session_file(&self, session_id: &SessionId, name: &str, bytes: &[u8]) -> Result<()>;

    /// Read `name` from the session's directory; `None` when absent.
    fn read_session_file(&self, session_id: &SessionId, name: &str) -> Result<Option<Vec<u8>>>;

    /// Delete `name` from the session's directory; absent files are not an error.
    fn delete_session_file(&self, session_id: &SessionId, name: &str) -> Result<()>;

    /// Event slots of a session, ascending by sequence.
    fn list_event_slots(&self, session_id: &SessionId) -> Result<Vec<EventSlot>>;

    /// Ids of all open sessions, ascending.
    fn open_session_ids(&self) -> Result<Vec<SessionId>>;

    /// Delete a session's entire file group.
    fn delete_session(&self, session_id: &SessionId) -> Result<()>;

    /// Ids of all finalized reports with their tier, descending by id.
    fn finalized_report_ids(&self) -> Result<Vec<(SessionId, ReportTier)>>;

    /// Read a finalized report from whichever tier holds it.
    fn read_finalized_report(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<(ReportTier, Vec<u8>)>>;

    /// Atomically write a finalized report into `tier`, removing it from the others.
    fn write_finalized_report(
        &self,
        session_id: &SessionId,
        tier: ReportTier,
        bytes: &[u8],
    ) -> Result<()>;

    /// Delete a finalized report from every tier.
    fn delete_finalized_report(&self, session_id: &SessionId) -> Result<()>;

    /// Delete every open session and finalized report.
    fn delete_all(&self) -> Result<()>;
}

/// [`SessionDirectoryStore`] over a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn open_sessions_dir(&self) -> PathBuf {
        self.root.join(OPEN_SESSIONS_DIR)
    }

    fn tier_dir(&self, tier: ReportTier) -> PathBuf {
        self.root.join(tier.dir_name())
    }

    fn session_dir(&self, session_id: &SessionId) -> Result<PathBuf> {
        Ok(self.open_sessions_dir().join(checked_name(session_id)?))
    }

    fn report_path(&self, session_id: &SessionId, tier: ReportTier) -> Result<PathBuf> {
        Ok(self.tier_dir(tier).join(checked_name(session_id)?))
    }
}

impl SessionDirectoryStore for DirectoryStore {
    fn write_session_file(&self, session_id: &SessionId, name: &str, bytes: &[u8]) -> Result<()> {
        let dir = self.session_dir(session_id)?;
        atomic_write(&dir, name, bytes)
    }

    fn read_session_file(&self, session_id: &SessionId, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.session_dir(session_id)?.join(name);
        read_optional(&path)
    }

    fn delete_session_file(&self, session_id: &SessionId, name: &str) -> Result<()> {
        let path = self.session_dir(session_id)?.join(name);
        remove_file_if_exists(&path)
    }

    fn list_event_slots(&self, session_id: &SessionId) -> Result<Vec<EventSlot>> {
        let dir = self.session_dir(session_id)?;
        let mut slots: Vec<EventSlot> = list_names(&dir, EntryKind::File)?
            .iter()
            .filter_map(|name| EventSlot::parse(name))
            .collect();
        slots.sort_by_key(|slot| slot.sequence);
        Ok(slots)
    }

    fn open_session_ids(&self) -> Result<Vec<SessionId>> {
        let mut ids: Vec<SessionId> = list_names(&self.open_sessions_dir(), EntryKind::Dir)?
            .into_iter()
            .map(SessionId)
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        let dir = self.session_dir(session_id)?;
        remove_dir_if_exists(&dir)
    }

    fn finalized_report_ids(&self) -> Result<Vec<(SessionId, ReportTier)>> {
        let mut reports: BTreeMap<SessionId, ReportTier> = BTreeMap::new();
        for tier in ReportTier::ALL {
            for name in list_names(&self.tier_dir(tier), EntryKind::File)? {
                let entry = reports.entry(SessionId(name)).or_insert(tier);
                *entry = (*entry).max(tier);
            }
        }
        Ok(reports.into_iter().rev().collect())
    }

    fn read_finalized_report(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<(ReportTier, Vec<u8>)>> {
        for tier in ReportTier::ALL {
            if let Some(bytes) = read_optional(&self.report_path(session_id, tier)?)? {
                return Ok(Some((tier, bytes)));
            }
        }
        Ok(None)
    }

    fn write_finalized_report(
        &self,
        session_id: &SessionId,
        tier: ReportTier,
        bytes: &[u8],
    ) -> Result<()> {
        atomic_write(&self.tier_dir(tier), checked_name(session_id)?, bytes)?;
        for other in ReportTier::ALL.into_iter().filter(|t| *t != tier) {
            remove_file_if_exists(&self.report_path(session_id, other)?)?;
        }
        Ok(())
    }

    fn delete_finalized_report(&self, session_id: &SessionId) -> Result<()> {
        for tier in ReportTier::ALL {
            remove_file_if_exists(&self.report_path(session_id, tier)?)?;
        }
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        remove_dir_if_exists(&self.open_sessions_dir())?;
        for tier in ReportTier::ALL {
            remove_dir_if_exists(&self.tier_dir(tier))?;
        }
        Ok(())
    }
}

/// Session ids become path components; reject anything that could escape.
fn checked_name(session_id: &SessionId) -> Result<&str> {
    let name = session_id.as_str();
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(name)
    } else {
        Err(Error::InvalidSessionId(name.to_string()))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
}

/// Names of the visible entries of `dir` with the requested kind.
///
/// A missing directory is empty; entries that disappear while scanning are skipped.
fn list_names(dir: &Path, kind: EntryKind) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io("listing directory", dir, e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let matches_kind = match kind {
            EntryKind::File => file_type.is_file(),
            EntryKind::Dir => file_type.is_dir(),
        };
        if !matches_kind {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) if !name.starts_with('.') => names.push(name),
            Ok(_) => {}
            Err(raw) => debug!(name = ?raw, dir = %dir.display(), "skipping non UTF-8 entry"),
        }
    }
    Ok(names)
}

/// Write to a unique temp file in `dir`, then rename it over `name`.
fn atomic_write(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::io("creating directory", dir, e))?;

    let tmp = dir.join(format!(".tmp-{}", Uuid::new_v4().simple()));
    let target = dir.join(name);
    fs::write(&tmp, bytes).map_err(|e| Error::io("writing temp file", &tmp, e))?;
    if let Err(e) = fs::rename(&tmp, &target) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::io("renaming temp file", &target, e));
    }
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io("reading file", path, e)),
    }
}

fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io("removing file", path, e)),
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io("removing directory", path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, DirectoryStore) {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_event_slot_names() {
        assert_eq!(EventSlot::new(1, false).file_name, "event0000000001");
        assert_eq!(EventSlot::new(42, true).file_name, "event0000000042_");

        let slot = EventSlot::parse("event0000000042_").unwrap();
        assert_eq!(slot.sequence, 42);
        assert!(slot.high_priority);

        assert!(EventSlot::parse("event").is_none());
        assert!(EventSlot::parse("event_").is_none());
        assert!(EventSlot::parse("eventabc").is_none());
        assert!(EventSlot::parse(REPORT_FILE).is_none());
    }

    #[test]
    fn test_open_session_ids_sorted_ascending() {
        let (_dir, store) = store();
        for id in ["b", "c", "a"] {
            store
                .write_session_file(&SessionId::from(id), REPORT_FILE, b"{}")
                .unwrap();
        }
        let ids = store.open_session_ids().unwrap();
        assert_eq!(ids, vec![SessionId::from("a"), "b".into(), "c".into()]);
    }

    #[test]
    fn test_missing_root_lists_nothing() {
        let (dir, _) = store();
        let store = DirectoryStore::new(dir.path().join("never-created"));
        assert!(store.open_session_ids().unwrap().is_empty());
        assert!(store.finalized_report_ids().unwrap().is_empty());
        assert!(store.list_event_slots(&"x".into()).unwrap().is_empty());
    }

    #[test]
    fn test_event_slots_ignore_other_files() {
        let (_dir, store) = store();
        let id = SessionId::from("s");
        store.write_session_file(&id, REPORT_FILE, b"{}").unwrap();
        store.write_session_file(&id, "event0000000002_", b"{}").unwrap();
        store.write_session_file(&id, "event0000000001", b"{}").unwrap();
        store.write_session_file(&id, CORRELATION_FILE, b"9").unwrap();

        let slots = store.list_event_slots(&id).unwrap();
        let sequences: Vec<u64> = slots.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
        assert!(slots[1].high_priority);
    }

    #[test]
    fn test_temp_files_are_invisible() {
        let (dir, store) = store();
        let id = SessionId::from("s");
        store.write_session_file(&id, REPORT_FILE, b"{}").unwrap();
        let session_dir = dir.path().join(OPEN_SESSIONS_DIR).join("s");
        fs::write(session_dir.join(".tmp-leftover"), b"partial").unwrap();
        fs::create_dir_all(dir.path().join("reports")).unwrap();
        fs::write(dir.path().join("reports").join(".tmp-x"), b"partial").unwrap();

        assert!(store.list_event_slots(&id).unwrap().is_empty());
        assert!(store.finalized_report_ids().unwrap().is_empty());
    }

    #[test]
    fn test_finalized_report_moves_between_tiers() {
        let (_dir, store) = store();
        let id = SessionId::from("s1");
        store
            .write_finalized_report(&id, ReportTier::Normal, b"normal")
            .unwrap();
        store
            .write_finalized_report(&id, ReportTier::Native, b"native")
            .unwrap();

        assert_eq!(
            store.finalized_report_ids().unwrap(),
            vec![(id.clone(), ReportTier::Native)]
        );
        let (tier, bytes) = store.read_finalized_report(&id).unwrap().unwrap();
        assert_eq!(tier, ReportTier::Native);
        assert_eq!(bytes, b"native");
    }

    #[test]
    fn test_finalized_ids_sorted_descending_across_tiers() {
        let (_dir, store) = store();
        store
            .write_finalized_report(&"a".into(), ReportTier::Priority, b"{}")
            .unwrap();
        store
            .write_finalized_report(&"c".into(), ReportTier::Normal, b"{}")
            .unwrap();
        store
            .write_finalized_report(&"b".into(), ReportTier::Native, b"{}")
            .unwrap();

        let ids: Vec<String> = store
            .finalized_report_ids()
            .unwrap()
            .into_iter()
            .map(|(id, _)| id.0)
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_dir, store) = store();
        let id = SessionId::from("gone");
        store.delete_session(&id).unwrap();
        store.delete_session_file(&id, REPORT_FILE).unwrap();
        store.delete_finalized_report(&id).unwrap();
        store.delete_all().unwrap();
    }

    #[test]
    fn test_delete_all_clears_everything() {
        let (_dir, store) = store();
        store
            .write_session_file(&"open".into(), REPORT_FILE, b"{}")
            .unwrap();
        store
            .write_finalized_report(&"done".into(), ReportTier::Priority, b"{}")
            .unwrap();

        store.delete_all().unwrap();

        assert!(store.open_session_ids().unwrap().is_empty());
        assert!(store.finalized_report_ids().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_like_session_ids() {
        let (_dir, store) = store();
        for bad in ["", "../escape", "a/b", ".hidden"] {
            let err = store
                .write_session_file(&SessionId::from(bad), REPORT_FILE, b"{}")
                .unwrap_err();
            assert!(matches!(err, Error::InvalidSessionId(_)), "{bad}");
        }
    }
}
