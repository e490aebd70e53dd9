use crate::error::{Result, TodoError};
use crate::task::{Priority, Task};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Current on-disk schema version.
pub const SCHEMA_VERSION: u32 = 1;

fn default_version() -> u32 {
    SCHEMA_VERSION
}

fn default_next_id() -> u32 {
    1
}

#[derive(Deserialize)]
struct StoreFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default = "default_next_id")]
    next_id: u32,
    #[serde(default)]
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    version: u32,
    next_id: u32,
    tasks: &'a [Task],
}

/// Predicates for [`TaskStore::list`]. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
}

impl TaskFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn pending() -> Self {
        Self { completed: Some(false), ..Self::default() }
    }

    pub fn completed() -> Self {
        Self { completed: Some(true), ..Self::default() }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.completed.map_or(true, |c| task.is_completed() == c)
            && self.priority.map_or(true, |p| task.priority() == p)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl TaskStats {
    /// Percentage of completed tasks, or `None` for an empty list.
    pub fn completion_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.completed as f64 / self.total as f64 * 100.0)
        }
    }

    pub fn count(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

/// What happened when the store read its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No file yet; the store starts empty.
    Missing,
    Loaded { tasks: usize },
    /// The file could not be used and the store started empty. `backup` holds
    /// a copy of the unreadable file when one could be made.
    Recovered { backup: Option<PathBuf>, reason: String },
}

pub struct TaskStore {
    path: PathBuf,
    tasks: Vec<Task>,
    next_id: u32,
    outcome: LoadOutcome,
}

impl TaskStore {
    /// Opens the store backed by `path`, loading it if it exists. Never fails:
    /// unusable files leave the store empty and are reported through
    /// [`TaskStore::load_outcome`].
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self {
            path: path.into(),
            tasks: Vec::new(),
            next_id: 1,
            outcome: LoadOutcome::Missing,
        };
        store.load();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.outcome
    }

    pub fn add(&mut self, title: &str, description: &str, priority: Priority) -> Result<&Task> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TodoError::InvalidInput("task title cannot be empty".to_string()));
        }
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or(TodoError::IdsExhausted)?;
        self.tasks.push(Task::new(id, title.to_string(), description.trim().to_string(), priority));
        log::debug!("added task {} ({:?})", id, priority);
        self.tasks.last().ok_or(TodoError::NotFound(id))
    }

    pub fn remove(&mut self, id: u32) -> Result<Task> {
        let index = self.position(id)?;
        let task = self.tasks.remove(index);
        log::debug!("removed task {}", id);
        Ok(task)
    }

    pub fn get(&self, id: u32) -> Result<&Task> {
        self.tasks.iter().find(|t| t.id() == id).ok_or(TodoError::NotFound(id))
    }

    pub fn mark_complete(&mut self, id: u32) -> Result<&Task> {
        let index = self.position(id)?;
        self.tasks[index].mark_complete();
        log::debug!("task {} marked complete", id);
        Ok(&self.tasks[index])
    }

    pub fn mark_incomplete(&mut self, id: u32) -> Result<&Task> {
        let index = self.position(id)?;
        self.tasks[index].mark_incomplete();
        log::debug!("task {} marked incomplete", id);
        Ok(&self.tasks[index])
    }

    pub fn list(&self, filter: &TaskFilter) -> Vec<&Task> {
        self.tasks.iter().filter(|t| filter.matches(t)).collect()
    }

    pub fn stats(&self) -> TaskStats {
        let mut stats = TaskStats { total: self.tasks.len(), ..TaskStats::default() };
        for task in &self.tasks {
            if task.is_completed() {
                stats.completed += 1;
            } else {
                stats.pending += 1;
            }
            match task.priority() {
                Priority::High => stats.high += 1,
                Priority::Medium => stats.medium += 1,
                Priority::Low => stats.low += 1,
            }
        }
        stats
    }

    /// Writes every task and the id counter, replacing the file's contents.
    pub fn save(&self) -> Result<()> {
        let persistence = |source: io::Error| TodoError::Persistence { path: self.path.clone(), source };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(persistence)?;
        }
        let doc = StoreFileRef { version: SCHEMA_VERSION, next_id: self.next_id, tasks: &self.tasks };
        let content = serde_json::to_string_pretty(&doc).map_err(|e| persistence(e.into()))?;
        fs::write(&self.path, content).map_err(persistence)?;
        log::debug!("saved {} tasks to {}", self.tasks.len(), self.path.display());
        Ok(())
    }

    /// Replaces the in-memory state with the file's contents. A missing file
    /// yields an empty store; an unusable one yields an empty store plus a
    /// warning and, when readable, a `.corrupt` copy of the file.
    pub fn load(&mut self) -> LoadOutcome {
        self.tasks.clear();
        self.next_id = 1;

        let outcome = match self.read_file() {
            Ok(None) => LoadOutcome::Missing,
            Ok(Some(file)) => {
                self.tasks = file.tasks;
                self.next_id = file.next_id;
                self.repair_next_id();
                log::debug!("loaded {} tasks from {}", self.tasks.len(), self.path.display());
                LoadOutcome::Loaded { tasks: self.tasks.len() }
            }
            Err(err) => {
                let backup = match err {
                    TodoError::Corrupt { .. } => self.backup_corrupt_file(),
                    _ => None,
                };
                log::warn!("{}; starting with an empty task list", err);
                if let Some(backup) = &backup {
                    log::warn!("previous contents kept in {}", backup.display());
                }
                LoadOutcome::Recovered { backup, reason: err.to_string() }
            }
        };
        self.outcome = outcome.clone();
        outcome
    }

    fn position(&self, id: u32) -> Result<usize> {
        self.tasks.iter().position(|t| t.id() == id).ok_or(TodoError::NotFound(id))
    }

    fn read_file(&self) -> Result<Option<StoreFile>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(TodoError::Persistence { path: self.path.clone(), source }),
        };
        let corrupt = |reason: String| TodoError::Corrupt { path: self.path.clone(), reason };

        let file: StoreFile = serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
        if file.version > SCHEMA_VERSION {
            return Err(corrupt(format!(
                "schema version {} is newer than supported version {}",
                file.version, SCHEMA_VERSION
            )));
        }
        let mut seen = HashSet::new();
        for task in &file.tasks {
            task.validate().map_err(&corrupt)?;
            // u32::MAX is never issued, so next_id always stays above every id.
            if task.id() == u32::MAX {
                return Err(corrupt(format!("task id {} is out of range", task.id())));
            }
            if !seen.insert(task.id()) {
                return Err(corrupt(format!("duplicate task id {}", task.id())));
            }
        }
        Ok(Some(file))
    }

    /// Keeps ids from ever being reissued when the stored counter lags behind.
    fn repair_next_id(&mut self) {
        let floor = self.tasks.iter().map(|t| t.id().saturating_add(1)).max().unwrap_or(1);
        if self.next_id < floor {
            log::warn!(
                "next_id {} in {} is not above every stored id; using {}",
                self.next_id,
                self.path.display(),
                floor
            );
            self.next_id = floor;
        }
    }

    /// Copies the file to `<file>.corrupt`, or `<file>.corrupt.N` when earlier
    /// backups already exist, so no backup is ever overwritten.
    fn backup_corrupt_file(&self) -> Option<PathBuf> {
        let backup = (0u32..)
            .map(|n| {
                let mut name = self.path.as_os_str().to_owned();
                name.push(".corrupt");
                if n > 0 {
                    name.push(format!(".{}", n));
                }
                PathBuf::from(name)
            })
            .find(|candidate| !candidate.exists())?;
        match fs::copy(&self.path, &backup) {
            Ok(_) => Some(backup),
            Err(e) => {
                log::warn!("could not back up {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, TaskStore) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = TaskStore::open(dir.path().join("todos.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let (_dir, store) = temp_store();
        assert!(store.is_empty());
        assert_eq!(store.next_id(), 1);
        assert_eq!(store.load_outcome(), &LoadOutcome::Missing);
    }

    #[test]
    fn test_ids_increase_and_are_never_reused() {
        let (_dir, mut store) = temp_store();
        let a = store.add("a", "", Priority::Low).unwrap().id();
        let b = store.add("b", "", Priority::Low).unwrap().id();
        store.remove(b).unwrap();
        let c = store.add("c", "", Priority::Low).unwrap().id();
        store.remove(a).unwrap();
        store.remove(c).unwrap();
        let d = store.add("d", "", Priority::Low).unwrap().id();
        assert_eq!((a, b, c, d), (1, 2, 3, 4));
    }

    #[test]
    fn test_add_rejects_empty_title() {
        let (_dir, mut store) = temp_store();
        let err = store.add("   ", "desc", Priority::High).unwrap_err();
        assert!(matches!(err, TodoError::InvalidInput(_)));
        assert!(store.is_empty());
        assert_eq!(store.next_id(), 1);
    }

    #[test]
    fn test_remove_preserves_order_and_reports_missing_ids() {
        let (_dir, mut store) = temp_store();
        for title in ["one", "two", "three"] {
            store.add(title, "", Priority::Medium).unwrap();
        }
        let removed = store.remove(2).unwrap();
        assert_eq!(removed.title(), "two");

        let titles: Vec<_> = store.list(&TaskFilter::all()).into_iter().map(|t| t.title()).collect();
        assert_eq!(titles, vec!["one", "three"]);

        assert!(matches!(store.remove(2), Err(TodoError::NotFound(2))));
        assert!(matches!(store.remove(42), Err(TodoError::NotFound(42))));
        assert_eq!(store.len(), 2);
        assert_eq!(store.next_id(), 4);
    }

    #[test]
    fn test_mark_unknown_id_is_not_found() {
        let (_dir, mut store) = temp_store();
        assert!(matches!(store.mark_complete(7), Err(TodoError::NotFound(7))));
        assert!(matches!(store.mark_incomplete(7), Err(TodoError::NotFound(7))));
        assert!(matches!(store.get(7), Err(TodoError::NotFound(7))));
    }

    #[test]
    fn test_filters_partition_the_list() {
        let (_dir, mut store) = temp_store();
        store.add("a", "", Priority::High).unwrap();
        store.add("b", "", Priority::Low).unwrap();
        store.add("c", "", Priority::High).unwrap();
        store.mark_complete(1).unwrap();
        store.mark_complete(2).unwrap();

        let done: Vec<u32> = store.list(&TaskFilter::completed()).iter().map(|t| t.id()).collect();
        let open: Vec<u32> = store.list(&TaskFilter::pending()).iter().map(|t| t.id()).collect();
        assert_eq!(done, vec![1, 2]);
        assert_eq!(open, vec![3]);

        let mut union: Vec<u32> = done.iter().chain(open.iter()).copied().collect();
        union.sort_unstable();
        union.dedup();
        assert_eq!(union.len(), store.len());

        let high_done = store.list(&TaskFilter::completed().with_priority(Priority::High));
        assert_eq!(high_done.len(), 1);
        assert_eq!(high_done[0].id(), 1);
    }

    #[test]
    fn test_stats_counts_and_rate() {
        let (_dir, mut store) = temp_store();
        assert_eq!(store.stats().completion_rate(), None);

        store.add("a", "", Priority::High).unwrap();
        store.add("b", "", Priority::Medium).unwrap();
        store.add("c", "", Priority::Medium).unwrap();
        store.add("d", "", Priority::Low).unwrap();
        store.mark_complete(2).unwrap();

        let stats = store.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 3);
        assert_eq!(stats.count(Priority::Medium), 2);
        assert_eq!(stats.completion_rate(), Some(25.0));
    }

    #[test]
    fn test_save_and_reopen_round_trips() {
        let (dir, mut store) = temp_store();
        store.add("Buy milk", "two litres", Priority::Medium).unwrap();
        store.add("Walk dog", "", Priority::High).unwrap();
        store.add("Gone", "", Priority::Low).unwrap();
        store.mark_complete(1).unwrap();
        store.remove(3).unwrap();
        store.save().unwrap();

        let reopened = TaskStore::open(dir.path().join("todos.json"));
        assert_eq!(reopened.load_outcome(), &LoadOutcome::Loaded { tasks: 2 });
        assert_eq!(reopened.next_id(), 4);
        assert_eq!(reopened.list(&TaskFilter::all()), store.list(&TaskFilter::all()));
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("todos.json");
        let mut store = TaskStore::open(&path);
        store.add("a", "", Priority::Low).unwrap();
        store.save().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_save_to_unwritable_path_reports_persistence_error() {
        let dir = tempfile::TempDir::new().unwrap();
        // A directory sits where the file should be.
        let path = dir.path().join("todos.json");
        fs::create_dir(&path).unwrap();
        let store = TaskStore::open(&path);
        assert!(matches!(store.load_outcome(), LoadOutcome::Recovered { backup: None, .. }));
        assert!(matches!(store.save(), Err(TodoError::Persistence { .. })));
    }

    #[test]
    fn test_corrupt_file_recovers_empty_and_keeps_backup() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("todos.json");
        fs::write(&path, "{ not json").unwrap();

        let store = TaskStore::open(&path);
        assert!(store.is_empty());
        assert_eq!(store.next_id(), 1);
        let backup = match store.load_outcome() {
            LoadOutcome::Recovered { backup: Some(backup), .. } => backup.clone(),
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(fs::read_to_string(backup).unwrap(), "{ not json");
    }

    #[test]
    fn test_newer_schema_version_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("todos.json");
        fs::write(&path, r#"{"version": 99, "next_id": 1, "tasks": []}"#).unwrap();
        let store = TaskStore::open(&path);
        assert!(matches!(store.load_outcome(), LoadOutcome::Recovered { .. }));
    }

    #[test]
    fn test_duplicate_ids_are_corrupt() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("todos.json");
        let task = r#"{"id": 1, "title": "x", "description": "", "priority": 2,
            "completed": false, "created_at": "2024-01-01T00:00:00+00:00", "completed_at": null}"#;
        fs::write(&path, format!(r#"{{"next_id": 2, "tasks": [{}, {}]}}"#, task, task)).unwrap();
        let store = TaskStore::open(&path);
        assert!(store.is_empty());
        assert!(matches!(store.load_outcome(), LoadOutcome::Recovered { .. }));
    }

    #[test]
    fn test_stale_next_id_is_repaired() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("todos.json");
        fs::write(
            &path,
            r#"{"next_id": 1, "tasks": [{"id": 5, "title": "x", "description": "", "priority": 1,
                "completed": false, "created_at": "2024-01-01T00:00:00+00:00", "completed_at": null}]}"#,
        )
        .unwrap();
        let mut store = TaskStore::open(&path);
        assert_eq!(store.next_id(), 6);
        assert_eq!(store.add("y", "", Priority::Low).unwrap().id(), 6);
    }

    fn task_json(id: u32, priority: u8, completed: bool, completed_at: &str) -> String {
        format!(
            r#"{{"id": {}, "title": "x", "description": "", "priority": {}, "completed": {},
                "created_at": "2024-01-01T00:00:00+00:00", "completed_at": {}}}"#,
            id, priority, completed, completed_at
        )
    }

    fn open_with(contents: &str) -> (tempfile::TempDir, TaskStore) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("todos.json");
        fs::write(&path, contents).unwrap();
        let store = TaskStore::open(&path);
        (dir, store)
    }

    fn assert_recovered_with_backup(store: &TaskStore) {
        assert!(store.is_empty());
        assert_eq!(store.next_id(), 1);
        assert!(
            matches!(store.load_outcome(), LoadOutcome::Recovered { backup: Some(_), .. }),
            "unexpected outcome: {:?}",
            store.load_outcome()
        );
    }

    #[test]
    fn test_priority_out_of_range_is_corrupt() {
        let file = format!(r#"{{"next_id": 2, "tasks": [{}]}}"#, task_json(1, 4, false, "null"));
        let (_dir, store) = open_with(&file);
        assert_recovered_with_backup(&store);
    }

    #[test]
    fn test_completion_mismatch_is_corrupt() {
        let file = format!(r#"{{"next_id": 2, "tasks": [{}]}}"#, task_json(1, 2, true, "null"));
        let (_dir, store) = open_with(&file);
        assert_recovered_with_backup(&store);

        let file = format!(
            r#"{{"next_id": 2, "tasks": [{}]}}"#,
            task_json(1, 2, false, r#""2024-01-02T00:00:00+00:00""#)
        );
        let (_dir, store) = open_with(&file);
        assert_recovered_with_backup(&store);
    }

    #[test]
    fn test_task_id_zero_is_corrupt() {
        let file = format!(r#"{{"next_id": 2, "tasks": [{}]}}"#, task_json(0, 2, false, "null"));
        let (_dir, store) = open_with(&file);
        assert_recovered_with_backup(&store);
    }

    #[test]
    fn test_max_task_id_is_corrupt_not_a_panic() {
        let file = format!(r#"{{"next_id": 1, "tasks": [{}]}}"#, task_json(u32::MAX, 2, false, "null"));
        let (_dir, store) = open_with(&file);
        assert_recovered_with_backup(&store);
    }

    #[test]
    fn test_add_fails_cleanly_when_ids_run_out() {
        let file = format!(r#"{{"next_id": {}, "tasks": []}}"#, u32::MAX);
        let (_dir, mut store) = open_with(&file);
        assert_eq!(store.load_outcome(), &LoadOutcome::Loaded { tasks: 0 });

        assert!(matches!(store.add("one too many", "", Priority::Low), Err(TodoError::IdsExhausted)));
        assert!(store.is_empty());
        assert_eq!(store.next_id(), u32::MAX);
    }

    #[test]
    fn test_last_assignable_id_is_issued_once() {
        let file = format!(r#"{{"next_id": {}, "tasks": []}}"#, u32::MAX - 1);
        let (_dir, mut store) = open_with(&file);
        assert_eq!(store.add("last", "", Priority::Low).unwrap().id(), u32::MAX - 1);
        assert!(matches!(store.add("again", "", Priority::Low), Err(TodoError::IdsExhausted)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_backups_are_never_overwritten() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("todos.json");

        fs::write(&path, "first").unwrap();
        let first = TaskStore::open(&path);
        fs::write(&path, "second").unwrap();
        let second = TaskStore::open(&path);

        let backup_of = |store: &TaskStore| match store.load_outcome() {
            LoadOutcome::Recovered { backup: Some(backup), .. } => backup.clone(),
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(backup_of(&first), dir.path().join("todos.json.corrupt"));
        assert_eq!(backup_of(&second), dir.path().join("todos.json.corrupt.1"));
        assert_eq!(fs::read_to_string(backup_of(&first)).unwrap(), "first");
        assert_eq!(fs::read_to_string(backup_of(&second)).unwrap(), "second");
    }
}
