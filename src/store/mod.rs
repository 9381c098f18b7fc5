//! Crash-safe, single-file note store.
//!
//! The in-memory map is the source of truth while the process runs. Every
//! mutation rewrites the whole map to the backing file through a temp file
//! and an atomic rename (see [`persist`]), so the file always holds either
//! the old or the new snapshot.
//!
//! # Concurrency
//!
//! Writers serialise on a mutex held across the whole mutate-then-persist
//! sequence. Readers only take the map's read lock, so they never wait on
//! file I/O and always see a whole map, either before or after a mutation.
//! If persisting fails the mutation is undone before the writer lock is
//! released.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──initialize()──▶ Ready ──shutdown()──▶ Closed
//! ```
//!
//! Only one store instance may own a given backing file.

mod error;
mod note;
pub mod persist;

pub use error::{StoreError, StoreErrorKind, StoreResult};
pub use note::{Limits, ListFilter, Note, NoteDraft, NoteId, NotePatch};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock, RwLockWriteGuard};

use persist::Loaded;

type NoteMap = IndexMap<NoteId, Note>;

/// Lifecycle state of a [`NoteStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Constructed; `initialize` has not run.
    Uninitialized,
    /// `initialize` is loading the backing file.
    Initializing,
    /// Operations are accepted.
    Ready,
    /// Shut down; no further operations are accepted.
    Closed,
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Closed => "closed",
        })
    }
}

/// What [`NoteStore::initialize`] found on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Notes now held by the store.
    pub loaded: usize,
    /// Records dropped because they failed validation.
    pub skipped: usize,
    /// The backing file was unparsable and the store started empty.
    pub recovered_from_corruption: bool,
    /// Where the corrupt file was moved, if the move succeeded.
    pub quarantined: Option<PathBuf>,
}

/// How to undo a mutation whose snapshot could not be persisted.
enum Undo {
    Remove(NoteId),
    Restore(Note),
    Reinsert(usize, Note),
}

impl Undo {
    fn apply(self, notes: &mut NoteMap) {
        match self {
            Self::Remove(id) => {
                notes.shift_remove(&id);
            }
            Self::Restore(note) => {
                notes.insert(note.id, note);
            }
            Self::Reinsert(index, note) => {
                notes.shift_insert(index, note.id, note);
            }
        }
    }
}

fn select(notes: &NoteMap, filter: &ListFilter) -> Vec<Note> {
    notes
        .values()
        .filter(|n| filter.matches(n))
        .skip(filter.offset)
        .take(filter.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

/// A file-backed note store.
pub struct NoteStore {
    path: PathBuf,
    limits: Limits,
    state: RwLock<StoreState>,
    notes: RwLock<NoteMap>,
    writer: Mutex<()>,
}

impl fmt::Debug for NoteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoteStore")
            .field("path", &self.path)
            .field("state", &*self.state.read())
            .field("notes", &self.notes.read().len())
            .finish_non_exhaustive()
    }
}

impl NoteStore {
    /// Creates an uninitialised store backed by `path`. Does no I/O.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, limits: Limits) -> Self {
        Self {
            path: path.into(),
            limits,
            state: RwLock::new(StoreState::Uninitialized),
            notes: RwLock::new(IndexMap::new()),
            writer: Mutex::new(()),
        }
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The field limits enforced by this store.
    #[must_use]
    pub const fn limits(&self) -> &Limits {
        &self.limits
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StoreState {
        *self.state.read()
    }

    /// Number of notes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notes.read().len()
    }

    /// Returns `true` if the store holds no notes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.read().is_empty()
    }

    /// Loads the backing file and makes the store ready.
    ///
    /// Idempotent: on a ready store this reports the current contents
    /// without touching the file. A corrupt file is moved aside and the
    /// store starts empty; that is reported, not returned as an error.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the parent directory cannot be created or
    /// the file cannot be read, and a lifecycle error if the store is closed.
    pub fn initialize(&self) -> StoreResult<LoadReport> {
        let _writer = self.writer.lock();

        match self.state() {
            StoreState::Ready => {
                return Ok(LoadReport {
                    loaded: self.len(),
                    ..LoadReport::default()
                })
            }
            StoreState::Closed | StoreState::Initializing => {
                return Err(self.lifecycle_error("initialize"));
            }
            StoreState::Uninitialized => {}
        }

        *self.state.write() = StoreState::Initializing;
        match self.load() {
            Ok(report) => {
                *self.state.write() = StoreState::Ready;
                Ok(report)
            }
            Err(e) => {
                *self.state.write() = StoreState::Uninitialized;
                Err(e)
            }
        }
    }

    fn load(&self) -> StoreResult<LoadReport> {
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| StoreError::storage("create store directory", dir, e))?;
        }

        let mut report = LoadReport::default();
        let mut map = NoteMap::new();

        match persist::read_snapshot(&self.path, &self.limits)? {
            Loaded::Missing => {
                tracing::info!(path = %self.path.display(), "No snapshot yet, starting empty");
            }
            Loaded::Corrupt { reason } => {
                report.recovered_from_corruption = true;
                match persist::quarantine(&self.path) {
                    Ok(moved) => {
                        tracing::warn!(
                            path = %self.path.display(),
                            moved_to = %moved.display(),
                            reason = %reason,
                            "Snapshot is corrupt, starting empty"
                        );
                        report.quarantined = Some(moved);
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %self.path.display(),
                            reason = %reason,
                            error = %e,
                            "Snapshot is corrupt and could not be moved aside, starting empty"
                        );
                    }
                }
            }
            Loaded::Snapshot { notes, skipped } => {
                report.skipped = skipped;
                map.extend(notes.into_iter().map(|n| (n.id, n)));
            }
        }

        report.loaded = map.len();
        tracing::info!(
            path = %self.path.display(),
            loaded = report.loaded,
            skipped = report.skipped,
            "Note store ready"
        );
        *self.notes.write() = map;
        Ok(report)
    }

    /// Creates a note and persists it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, a storage error if the
    /// snapshot cannot be written (the note is then not kept), or a
    /// lifecycle error if the store is not ready.
    pub fn create(
        &self,
        title: &str,
        content: &str,
        tags: Option<Vec<String>>,
    ) -> StoreResult<Note> {
        let draft = NoteDraft::new(title, content, tags, &self.limits)?;

        self.mutate("create note", |notes| {
            let mut id = NoteId::generate();
            while notes.contains_key(&id) {
                id = NoteId::generate();
            }
            let note = Note::from_draft(id, draft, Utc::now());
            notes.insert(id, note.clone());
            tracing::debug!(%id, "Created note");
            Ok((note, Some(Undo::Remove(id))))
        })
    }

    /// Returns a copy of the note with `id`, if present.
    ///
    /// # Errors
    ///
    /// Returns a lifecycle error if the store is not ready.
    pub fn get(&self, id: &NoteId) -> StoreResult<Option<Note>> {
        self.ensure_ready("get note")?;
        Ok(self.notes.read().get(id).cloned())
    }

    /// Returns copies of the notes passing `filter`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns a lifecycle error if the store is not ready.
    pub fn list(&self, filter: &ListFilter) -> StoreResult<Vec<Note>> {
        self.ensure_ready("list notes")?;
        Ok(select(&self.notes.read(), filter))
    }

    /// Returns the match count and the requested page from one view of the
    /// map, so the two always agree.
    ///
    /// # Errors
    ///
    /// Returns a lifecycle error if the store is not ready.
    pub fn page(&self, filter: &ListFilter) -> StoreResult<(usize, Vec<Note>)> {
        self.ensure_ready("list notes")?;
        let notes = self.notes.read();
        let total = notes.values().filter(|n| filter.matches(n)).count();
        Ok((total, select(&notes, filter)))
    }

    /// Counts the notes passing the tag part of `filter`, ignoring pagination.
    ///
    /// # Errors
    ///
    /// Returns a lifecycle error if the store is not ready.
    pub fn count(&self, filter: &ListFilter) -> StoreResult<usize> {
        self.ensure_ready("count notes")?;
        Ok(self
            .notes
            .read()
            .values()
            .filter(|n| filter.matches(n))
            .count())
    }

    /// Applies `patch` to the note with `id` and persists it.
    ///
    /// # Errors
    ///
    /// Returns not-found for an unknown id, a validation error for a bad
    /// patch, a storage error if the snapshot cannot be written (the
    /// previous note is then restored), or a lifecycle error.
    pub fn update(&self, id: &NoteId, patch: NotePatch) -> StoreResult<Note> {
        self.mutate("update note", |notes| {
            let Some(note) = notes.get_mut(id) else {
                return Err(StoreError::NotFound { id: *id });
            };
            let previous = note.clone();
            patch.apply(note, &self.limits, Utc::now())?;
            tracing::debug!(%id, "Updated note");
            Ok((note.clone(), Some(Undo::Restore(previous))))
        })
    }

    /// Deletes the note with `id`, returning whether it existed.
    ///
    /// Deleting an unknown id is not an error and does not touch the file.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the snapshot cannot be written (the note
    /// is then put back in place), or a lifecycle error.
    pub fn delete(&self, id: &NoteId) -> StoreResult<bool> {
        self.mutate("delete note", |notes| {
            Ok(match notes.shift_remove_full(id) {
                Some((index, _, note)) => {
                    tracing::debug!(%id, "Deleted note");
                    (true, Some(Undo::Reinsert(index, note)))
                }
                None => (false, None),
            })
        })
    }

    /// Flushes the map to disk and closes the store.
    ///
    /// Idempotent. An uninitialised store is closed without writing.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the final flush fails; the store then
    /// stays ready so the flush can be retried.
    pub fn shutdown(&self) -> StoreResult<()> {
        let _writer = self.writer.lock();

        match self.state() {
            StoreState::Closed => return Ok(()),
            StoreState::Ready => {
                let bytes = persist::encode(self.notes.read().values())?;
                persist::write_atomic(&self.path, &bytes)?;
            }
            StoreState::Uninitialized | StoreState::Initializing => {}
        }

        *self.state.write() = StoreState::Closed;
        tracing::info!(path = %self.path.display(), "Note store closed");
        Ok(())
    }

    /// Runs `apply` against the map under the writer lock, then persists.
    ///
    /// `apply` returns `None` for its undo when it changed nothing, in which
    /// case the file is left alone.
    fn mutate<T>(
        &self,
        operation: &'static str,
        apply: impl FnOnce(&mut NoteMap) -> StoreResult<(T, Option<Undo>)>,
    ) -> StoreResult<T> {
        let _writer = self.writer.lock();
        self.ensure_ready(operation)?;

        let mut notes = self.notes.write();
        let (value, undo) = apply(&mut *notes)?;
        let Some(undo) = undo else {
            return Ok(value);
        };

        let notes = RwLockWriteGuard::downgrade(notes);
        let persisted =
            persist::encode(notes.values()).and_then(|b| persist::write_atomic(&self.path, &b));
        drop(notes);

        if let Err(e) = persisted {
            tracing::error!(operation, error = %e, "Failed to persist snapshot, rolling back");
            undo.apply(&mut *self.notes.write());
            return Err(e);
        }
        Ok(value)
    }

    fn ensure_ready(&self, operation: &'static str) -> StoreResult<()> {
        match self.state() {
            StoreState::Ready => Ok(()),
            _ => Err(self.lifecycle_error(operation)),
        }
    }

    fn lifecycle_error(&self, operation: &'static str) -> StoreError {
        StoreError::Lifecycle {
            operation,
            state: self.state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_store(dir: &tempfile::TempDir) -> NoteStore {
        let store = NoteStore::new(dir.path().join("notes.json"), Limits::default());
        store.initialize().unwrap();
        store
    }

    #[test]
    fn new_store_is_uninitialized() {
        let store = NoteStore::new("notes.json", Limits::default());
        assert_eq!(store.state(), StoreState::Uninitialized);
        assert!(store.is_empty());
    }

    #[test]
    fn operations_require_initialize() {
        let store = NoteStore::new("unused/notes.json", Limits::default());
        let err = store.create("t", "c", None).unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Lifecycle);
        assert!(store.list(&ListFilter::default()).is_err());
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir);
        store.create("one", "", None).unwrap();

        let report = store.initialize().unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(store.state(), StoreState::Ready);
    }

    #[test]
    fn initialize_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("notes.json");
        let store = NoteStore::new(&path, Limits::default());
        store.initialize().unwrap();
        assert!(path.parent().unwrap().is_dir());
        assert!(!path.exists());
    }

    #[test]
    fn create_fills_generated_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir);
        let note = store
            .create("Meeting Notes", "Discussed Q3", Some(vec!["work".into()]))
            .unwrap();
        assert!(!note.id.to_string().is_empty());
        assert_eq!(note.tags, ["work"]);
        assert_eq!(note.created, note.updated);
    }

    #[test]
    fn update_refreshes_updated_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir);
        let note = store.create("Title", "Body", None).unwrap();

        let patch = NotePatch {
            content: Some("New body".into()),
            ..NotePatch::default()
        };
        let updated = store.update(&note.id, patch).unwrap();
        assert_eq!(updated.created, note.created);
        assert!(updated.updated >= note.updated);
        assert_eq!(updated.title, "Title");
        assert_eq!(updated.content, "New body");
        assert_eq!(store.get(&note.id).unwrap(), Some(updated));
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir);
        let patch = NotePatch {
            title: Some("x".into()),
            ..NotePatch::default()
        };
        let err = store.update(&NoteId::generate(), patch).unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::NotFound);
    }

    #[test]
    fn delete_absent_id_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir);
        assert!(!store.delete(&NoteId::generate()).unwrap());
        assert!(!store.path().exists());
    }

    #[test]
    fn list_paginates_after_filtering() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir);
        for i in 0..5 {
            let tags = if i % 2 == 0 { vec!["even".into()] } else { vec![] };
            store.create(&format!("note {i}"), "", Some(tags)).unwrap();
        }

        let filter = ListFilter::default().with_tag("even").with_offset(1).with_limit(1);
        let page = store.list(&filter).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "note 2");
        assert_eq!(store.count(&filter).unwrap(), 3);
    }

    #[test]
    fn page_matches_count_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir);
        for i in 0..5 {
            let tags = if i % 2 == 0 { vec!["even".into()] } else { vec![] };
            store.create(&format!("note {i}"), "", Some(tags)).unwrap();
        }

        let filter = ListFilter::default().with_tag("even").with_offset(1).with_limit(1);
        let (total, page) = store.page(&filter).unwrap();
        assert_eq!(total, store.count(&filter).unwrap());
        assert_eq!(page, store.list(&filter).unwrap());

        let (total, page) = store.page(&ListFilter::default().with_offset(9)).unwrap();
        assert_eq!(total, 5);
        assert!(page.is_empty());

        store.shutdown().unwrap();
        let err = store.page(&ListFilter::default()).unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Lifecycle);
    }

    #[test]
    fn failed_persist_rolls_back_create() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir);
        store.create("kept", "", None).unwrap();
        let before = fs::read(store.path()).unwrap();

        fs::create_dir(persist::temp_path(store.path())).unwrap();
        let err = store.create("lost", "", None).unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Storage);

        assert_eq!(store.len(), 1);
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn failed_persist_restores_deleted_note_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir);
        let first = store.create("first", "", None).unwrap();
        let second = store.create("second", "", None).unwrap();
        let third = store.create("third", "", None).unwrap();

        fs::create_dir(persist::temp_path(store.path())).unwrap();
        assert!(store.delete(&second.id).is_err());

        let ids: Vec<NoteId> = store
            .list(&ListFilter::default())
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
    }

    #[test]
    fn failed_persist_restores_previous_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir);
        let note = store.create("original", "", None).unwrap();

        fs::create_dir(persist::temp_path(store.path())).unwrap();
        let patch = NotePatch {
            title: Some("changed".into()),
            ..NotePatch::default()
        };
        assert!(store.update(&note.id, patch).is_err());
        assert_eq!(store.get(&note.id).unwrap(), Some(note));
    }

    #[test]
    fn shutdown_closes_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir);
        store.shutdown().unwrap();
        assert_eq!(store.state(), StoreState::Closed);
        assert!(store.path().exists());

        let err = store.get(&NoteId::generate()).unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Lifecycle);
        assert!(store.initialize().is_err());
        assert!(store.shutdown().is_ok());
    }
}
