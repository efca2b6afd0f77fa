//! In-memory store for users, projects and tasks
//!
//! Holds the three collections in insertion order, keeps cross-entity
//! references consistent on delete, and writes the full snapshot to its
//! storage after every mutation. Observers subscribe for change events.

use crate::id::generate_unique_id;
use crate::model::{
    NewTask, Project, ProjectStatus, ProjectUpdate, Task, TaskUpdate, User, UserUpdate, require,
};
use crate::storage::SnapshotStorage;
use crate::{Error, Result, Snapshot};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info, warn};

/// Notification sent to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// State after a mutation
    Changed(Snapshot),
    /// Saving the snapshot failed; the in-memory change was kept
    StorageFailed(String),
    /// The stored snapshot was unreadable and seed data was used instead
    LoadFallback(String),
}

/// What a delete removed, cascades included
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Removed {
    pub users: usize,
    pub projects: usize,
    pub tasks: usize,
}

impl Removed {
    /// Nothing matched the id
    pub fn is_empty(&self) -> bool {
        self.users == 0 && self.projects == 0 && self.tasks == 0
    }
}

/// Store engine over a snapshot storage backend
pub struct Store<S: SnapshotStorage> {
    state: Snapshot,
    storage: S,
    subscribers: Vec<Sender<StoreEvent>>,
    warnings: Vec<StoreEvent>,
    last_storage_error: Option<String>,
}

impl<S: SnapshotStorage> Store<S> {
    /// Load the stored snapshot, or start from seed data.
    ///
    /// Never fails: an unreadable snapshot is reported through
    /// [`Store::take_warnings`] and a `LoadFallback` event, and the seed
    /// dataset is used. The unreadable slot is left as is until the next
    /// mutation overwrites it. A failed first save of the seed is kept as
    /// a `StorageFailed` warning.
    pub fn open(storage: S) -> Self {
        let loaded = storage.load();
        let mut store = Self::with_snapshot(storage, Snapshot::default());

        match loaded {
            Ok(Some(snapshot)) => {
                debug!(
                    users = snapshot.users.len(),
                    projects = snapshot.projects.len(),
                    tasks = snapshot.tasks.len(),
                    "loaded snapshot"
                );
                store.state = snapshot;
            }
            Ok(None) => {
                info!("no snapshot found, seeding example data");
                store.state = Snapshot::seed(Utc::now());
                store.persist();
                if let Some(ref e) = store.last_storage_error {
                    let message = format!("Could not save example data ({e})");
                    store.warnings.push(StoreEvent::StorageFailed(message));
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to load snapshot, using seed data");
                store.state = Snapshot::seed(Utc::now());
                let message = format!("Could not load saved data ({e}); using example data");
                store.warnings.push(StoreEvent::LoadFallback(message));
            }
        }

        store
    }

    /// Wrap an explicit state without reading or writing storage
    pub fn with_snapshot(storage: S, state: Snapshot) -> Self {
        Self {
            state,
            storage,
            subscribers: Vec::new(),
            warnings: Vec::new(),
            last_storage_error: None,
        }
    }

    /// Receive events for every subsequent mutation.
    ///
    /// Pending open-time warnings are replayed to the new subscriber first.
    pub fn subscribe(&mut self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        for warning in &self.warnings {
            let _ = tx.send(warning.clone());
        }
        self.subscribers.push(tx);
        rx
    }

    /// Drain warnings raised while opening
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
            .into_iter()
            .filter_map(|event| match event {
                StoreEvent::LoadFallback(message) | StoreEvent::StorageFailed(message) => {
                    Some(message)
                }
                StoreEvent::Changed(_) => None,
            })
            .collect()
    }

    /// Message of the most recent failed save, cleared by the next good one
    pub fn last_storage_error(&self) -> Option<&str> {
        self.last_storage_error.as_deref()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.state
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn users(&self) -> &[User] {
        &self.state.users
    }

    pub fn projects(&self) -> &[Project] {
        &self.state.projects
    }

    pub fn tasks(&self) -> &[Task] {
        &self.state.tasks
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.state.users.iter().find(|u| u.id == id)
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.state.projects.iter().find(|p| p.id == id)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.state.tasks.iter().find(|t| t.id == id)
    }

    pub fn require_user(&self, id: &str) -> Result<&User> {
        self.user(id)
            .ok_or_else(|| Error::NotFound(format!("user {id}")))
    }

    pub fn require_project(&self, id: &str) -> Result<&Project> {
        self.project(id)
            .ok_or_else(|| Error::NotFound(format!("project {id}")))
    }

    pub fn require_task(&self, id: &str) -> Result<&Task> {
        self.task(id)
            .ok_or_else(|| Error::NotFound(format!("task {id}")))
    }

    /// Tasks of a project, in store order
    pub fn tasks_by_project(&self, project_id: &str) -> Vec<&Task> {
        self.state
            .tasks
            .iter()
            .filter(|t| t.project_id == project_id)
            .collect()
    }

    /// Projects owned by a user, in store order
    pub fn projects_by_user(&self, user_id: &str) -> Vec<&Project> {
        self.state
            .projects
            .iter()
            .filter(|p| p.owner_id == user_id)
            .collect()
    }

    /// Direct subtasks of a task, in store order
    pub fn subtasks(&self, task_id: &str) -> Vec<&Task> {
        self.state
            .tasks
            .iter()
            .filter(|t| t.parent_task_id.as_deref() == Some(task_id))
            .collect()
    }

    /// Create a user. Email uniqueness is the caller's concern.
    pub fn add_user(&mut self, name: &str, email: &str) -> Result<User> {
        require("name", name)?;
        require("email", email)?;

        let state = &self.state;
        let user = User {
            id: generate_unique_id(|id| state.id_in_use(id)),
            name: name.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };

        debug!(id = %user.id, "added user");
        self.state.users.push(user.clone());
        self.commit();
        Ok(user)
    }

    /// Merge fields into a user. Returns false when no user has this id.
    pub fn update_user(&mut self, id: &str, update: UserUpdate) -> Result<bool> {
        update.validate()?;

        let Some(user) = self.state.users.iter_mut().find(|u| u.id == id) else {
            debug!(id, "update_user: no such user, skipping");
            return Ok(false);
        };
        update.apply(user);
        self.commit();
        Ok(true)
    }

    /// Remove a user, the projects it owns and the tasks assigned to it.
    ///
    /// Tasks inside the removed projects that are assigned to someone else
    /// are kept.
    pub fn delete_user(&mut self, id: &str) -> Removed {
        if self.user(id).is_none() {
            debug!(id, "delete_user: no such user, skipping");
            return Removed::default();
        }

        let retired = &mut self.state.retired_ids;
        let removed = Removed {
            users: remove_where(&mut self.state.users, retired, |u| &u.id, |u| u.id == id),
            projects: remove_where(&mut self.state.projects, retired, |p| &p.id, |p| {
                p.owner_id == id
            }),
            tasks: remove_where(&mut self.state.tasks, retired, |t| &t.id, |t| {
                t.assigned_to.as_deref() == Some(id)
            }),
        };

        debug!(id, projects = removed.projects, tasks = removed.tasks, "deleted user");
        self.commit();
        removed
    }

    /// Create a project. The owner is not checked against the user list.
    pub fn add_project(
        &mut self,
        name: &str,
        description: &str,
        owner_id: &str,
        status: ProjectStatus,
    ) -> Result<Project> {
        require("name", name)?;

        let state = &self.state;
        let project = Project {
            id: generate_unique_id(|id| state.id_in_use(id)),
            name: name.to_string(),
            description: description.to_string(),
            owner_id: owner_id.to_string(),
            status,
            created_at: Utc::now(),
        };

        debug!(id = %project.id, owner = owner_id, "added project");
        self.state.projects.push(project.clone());
        self.commit();
        Ok(project)
    }

    /// Merge fields into a project. Returns false when no project has this id.
    pub fn update_project(&mut self, id: &str, update: ProjectUpdate) -> Result<bool> {
        update.validate()?;

        let Some(project) = self.state.projects.iter_mut().find(|p| p.id == id) else {
            debug!(id, "update_project: no such project, skipping");
            return Ok(false);
        };
        update.apply(project);
        self.commit();
        Ok(true)
    }

    /// Remove a project and all of its tasks
    pub fn delete_project(&mut self, id: &str) -> Removed {
        if self.project(id).is_none() {
            debug!(id, "delete_project: no such project, skipping");
            return Removed::default();
        }

        let retired = &mut self.state.retired_ids;
        let removed = Removed {
            users: 0,
            projects: remove_where(&mut self.state.projects, retired, |p| &p.id, |p| p.id == id),
            tasks: remove_where(&mut self.state.tasks, retired, |t| &t.id, |t| {
                t.project_id == id
            }),
        };

        debug!(id, tasks = removed.tasks, "deleted project");
        self.commit();
        removed
    }

    /// Create a task. Project, assignee and parent are not checked.
    pub fn add_task(&mut self, new: NewTask) -> Result<Task> {
        require("name", &new.name)?;
        require("projectId", &new.project_id)?;

        let state = &self.state;
        let task = Task {
            id: generate_unique_id(|id| state.id_in_use(id)),
            project_id: new.project_id,
            name: new.name,
            description: new.description,
            status: new.status,
            priority: new.priority,
            due_date: new.due_date,
            assigned_to: new.assigned_to,
            created_at: Utc::now(),
            parent_task_id: new.parent_task_id,
            tags: new.tags,
        };

        debug!(id = %task.id, project = %task.project_id, "added task");
        self.state.tasks.push(task.clone());
        self.commit();
        Ok(task)
    }

    /// Merge fields into a task. Returns false when no task has this id.
    pub fn update_task(&mut self, id: &str, update: TaskUpdate) -> Result<bool> {
        update.validate()?;

        let Some(task) = self.state.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(id, "update_task: no such task, skipping");
            return Ok(false);
        };
        update.apply(task);
        self.commit();
        Ok(true)
    }

    /// Remove a task and its direct subtasks. Grandchildren are kept.
    pub fn delete_task(&mut self, id: &str) -> Removed {
        if self.task(id).is_none() {
            debug!(id, "delete_task: no such task, skipping");
            return Removed::default();
        }

        let retired = &mut self.state.retired_ids;
        let removed = Removed {
            tasks: remove_where(&mut self.state.tasks, retired, |t| &t.id, |t| {
                t.id == id || t.parent_task_id.as_deref() == Some(id)
            }),
            ..Removed::default()
        };

        debug!(id, tasks = removed.tasks, "deleted task");
        self.commit();
        removed
    }

    /// Replace everything with the seed dataset. Ids in use before the
    /// reset stay retired.
    pub fn reset(&mut self) {
        info!("resetting store to example data");
        let mut seed = Snapshot::seed(Utc::now());
        let mut retired = std::mem::take(&mut self.state.retired_ids);
        retired.extend(self.state.live_ids().map(String::from));
        for id in seed.live_ids() {
            retired.remove(id);
        }
        seed.retired_ids = retired;
        self.state = seed;
        self.commit();
    }

    /// Persist, then tell subscribers about the new state
    fn commit(&mut self) {
        self.persist();
        self.notify(StoreEvent::Changed(self.state.clone()));
    }

    fn persist(&mut self) {
        match self.storage.save(&self.state) {
            Ok(()) => self.last_storage_error = None,
            Err(e) => {
                warn!(error = %e, "failed to save snapshot, keeping in-memory change");
                let message = e.to_string();
                self.last_storage_error = Some(message.clone());
                self.notify(StoreEvent::StorageFailed(message));
            }
        }
    }

    fn notify(&mut self, event: StoreEvent) {
        // Dropped receivers are pruned here
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Drop matching items, retire their ids and report how many went
fn remove_where<T>(
    items: &mut Vec<T>,
    retired: &mut BTreeSet<String>,
    id_of: impl Fn(&T) -> &String,
    mut doomed: impl FnMut(&T) -> bool,
) -> usize {
    let before = items.len();
    items.retain(|item| {
        if doomed(item) {
            retired.insert(id_of(item).clone());
            false
        } else {
            true
        }
    });
    before - items.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, TaskStatus};
    use crate::storage::MemoryStorage;
    use std::collections::HashSet;

    fn seeded() -> Store<MemoryStorage> {
        Store::open(MemoryStorage::new())
    }

    fn task_ids(store: &Store<MemoryStorage>) -> Vec<&str> {
        store.tasks().iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_open_empty_storage_seeds_and_saves() {
        let store = seeded();
        assert_eq!(store.users().len(), 2);
        assert_eq!(store.projects().len(), 2);
        assert_eq!(task_ids(&store), vec!["1", "2", "3"]);
        assert_eq!(store.storage().save_count(), 1);
    }

    #[test]
    fn test_add_user_assigns_fresh_ids() {
        let mut store = seeded();
        let mut seen: HashSet<String> = store.users().iter().map(|u| u.id.clone()).collect();

        for i in 0..50 {
            let user = store.add_user(&format!("User {i}"), &format!("u{i}@example.com")).unwrap();
            assert!(seen.insert(user.id.clone()), "duplicate id {}", user.id);
        }
        assert_eq!(store.users().len(), 52);
        assert_eq!(store.users().last().unwrap().name, "User 49");
    }

    #[test]
    fn test_add_rejects_blank_fields() {
        let mut store = seeded();
        let saves = store.storage().save_count();

        assert!(matches!(store.add_user("", "a@b.c"), Err(Error::Validation(_))));
        assert!(matches!(store.add_user("Ann", "  "), Err(Error::Validation(_))));
        assert!(matches!(
            store.add_project(" ", "", "1", ProjectStatus::Active),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            store.add_task(NewTask::new("", "Orphan")),
            Err(Error::Validation(_))
        ));

        assert_eq!(store.users().len(), 2);
        assert_eq!(store.projects().len(), 2);
        assert_eq!(store.tasks().len(), 3);
        assert_eq!(store.storage().save_count(), saves);
    }

    #[test]
    fn test_update_keeps_id_and_created_at() {
        let mut store = seeded();
        let before = store.user("1").unwrap().clone();

        let applied = store
            .update_user(
                "1",
                UserUpdate {
                    name: Some("Johnny".into()),
                    ..UserUpdate::default()
                },
            )
            .unwrap();
        assert!(applied);

        let after = store.user("1").unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.email, before.email);
        assert_eq!(after.name, "Johnny");
    }

    #[test]
    fn test_update_task_partial_merge() {
        let mut store = seeded();
        let before = store.task("2").unwrap().clone();

        store.update_task("2", TaskUpdate::status(TaskStatus::Completed)).unwrap();

        let after = store.task("2").unwrap();
        assert_eq!(after.status, TaskStatus::Completed);
        assert_eq!(after.due_date, before.due_date);
        assert_eq!(after.tags, before.tags);
        assert_eq!(after.priority, Priority::Medium);
        assert_eq!(after.created_at, before.created_at);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut store = seeded();
        let rx = store.subscribe();
        let saves = store.storage().save_count();

        let applied = store
            .update_project(
                "missing",
                ProjectUpdate {
                    status: Some(ProjectStatus::Archived),
                    ..ProjectUpdate::default()
                },
            )
            .unwrap();

        assert!(!applied);
        assert_eq!(store.storage().save_count(), saves);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_delete_user_cascades() {
        let mut store = seeded();
        let removed = store.delete_user("1");

        assert_eq!(
            removed,
            Removed {
                users: 1,
                projects: 1,
                tasks: 2
            }
        );
        assert!(store.user("1").is_none());
        assert_eq!(store.projects().len(), 1);
        assert_eq!(store.projects()[0].id, "2");
        assert_eq!(task_ids(&store), vec!["3"]);
    }

    #[test]
    fn test_delete_user_keeps_foreign_tasks_in_owned_projects() {
        let mut store = seeded();
        // Project 1 belongs to user 1; give one of its tasks to user 2
        store
            .update_task(
                "2",
                TaskUpdate {
                    assigned_to: Some(Some("2".into())),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();

        store.delete_user("1");

        assert!(store.project("1").is_none());
        assert_eq!(task_ids(&store), vec!["2", "3"]);
        assert_eq!(store.task("2").unwrap().project_id, "1");
    }

    #[test]
    fn test_delete_project_cascades() {
        let mut store = seeded();
        let extra = store.add_task(NewTask::new("2", "X")).unwrap();

        let removed = store.delete_project("2");

        assert_eq!(removed.projects, 1);
        assert_eq!(removed.tasks, 2);
        assert!(store.task(&extra.id).is_none());
        assert_eq!(task_ids(&store), vec!["1", "2"]);
        assert_eq!(store.users().len(), 2);
    }

    #[test]
    fn test_delete_task_removes_direct_children_only() {
        let mut store = seeded();
        let child = store
            .add_task(NewTask {
                parent_task_id: Some("1".into()),
                ..NewTask::new("1", "Child")
            })
            .unwrap();
        let grandchild = store
            .add_task(NewTask {
                parent_task_id: Some(child.id.clone()),
                ..NewTask::new("1", "Grandchild")
            })
            .unwrap();

        let removed = store.delete_task("1");

        assert_eq!(removed.tasks, 2);
        assert!(store.task("1").is_none());
        assert!(store.task(&child.id).is_none());
        assert!(store.task(&grandchild.id).is_some());
    }

    #[test]
    fn test_delete_unknown_is_noop() {
        let mut store = seeded();
        let saves = store.storage().save_count();
        assert!(store.delete_user("nobody").is_empty());
        assert!(store.delete_project("nothing").is_empty());
        assert!(store.delete_task("none").is_empty());
        assert_eq!(store.storage().save_count(), saves);
        assert_eq!(store.tasks().len(), 3);
    }

    #[test]
    fn test_queries_follow_store_order() {
        let mut store = seeded();
        let late = store.add_task(NewTask::new("1", "Late addition")).unwrap();

        let ids: Vec<_> = store.tasks_by_project("1").iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, vec!["1".to_string(), "2".to_string(), late.id]);
        assert!(store.tasks_by_project("nope").is_empty());

        let owned: Vec<_> = store.projects_by_user("2").iter().map(|p| p.id.as_str()).collect();
        assert_eq!(owned, vec!["2"]);
    }

    #[test]
    fn test_subscribers_see_changes() {
        let mut store = seeded();
        let rx = store.subscribe();

        let user = store.add_user("Ann", "ann@example.com").unwrap();

        match rx.try_recv().unwrap() {
            StoreEvent::Changed(snapshot) => {
                assert!(snapshot.users.iter().any(|u| u.id == user.id));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let mut store = seeded();
        drop(store.subscribe());
        store.add_user("Ann", "ann@example.com").unwrap();
        assert!(store.subscribers.is_empty());
    }

    #[test]
    fn test_storage_failure_keeps_change() {
        let mut store = seeded();
        let rx = store.subscribe();
        store.storage_mut().set_fail_saves(true);

        let user = store.add_user("Ann", "ann@example.com").unwrap();

        assert!(store.user(&user.id).is_some());
        assert!(store.last_storage_error().is_some());
        assert!(matches!(rx.try_recv().unwrap(), StoreEvent::StorageFailed(_)));
        assert!(matches!(rx.try_recv().unwrap(), StoreEvent::Changed(_)));

        store.storage_mut().set_fail_saves(false);
        store.delete_user(&user.id);
        assert!(store.last_storage_error().is_none());
    }

    #[test]
    fn test_corrupt_snapshot_falls_back_to_seed() {
        let mut store = Store::open(MemoryStorage::with_raw("{\"state\": 42"));

        assert_eq!(store.users().len(), 2);
        assert_eq!(store.storage().save_count(), 0);
        assert_eq!(store.storage().raw(), Some("{\"state\": 42"));

        let rx = store.subscribe();
        assert!(matches!(rx.try_recv().unwrap(), StoreEvent::LoadFallback(_)));

        let warnings = store.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(store.take_warnings().is_empty());
    }

    #[test]
    fn test_deleted_ids_are_retired() {
        let mut store = seeded();
        let user = store.add_user("Ann", "ann@example.com").unwrap();
        let project = store
            .add_project("Docs", "", &user.id, ProjectStatus::Active)
            .unwrap();
        let task = store.add_task(NewTask::new(project.id.clone(), "Outline")).unwrap();

        let removed = store.delete_user(&user.id);
        assert_eq!(removed.projects, 1);

        let state = store.snapshot();
        for id in [&user.id, &project.id] {
            assert!(state.retired_ids.contains(id));
            assert!(state.id_in_use(id));
        }
        // Task survives: it was never assigned to Ann
        assert!(!state.retired_ids.contains(&task.id));

        store.delete_task("3");
        assert!(store.snapshot().retired_ids.contains("3"));
    }

    #[test]
    fn test_reset_keeps_retired_ids() {
        let mut store = seeded();
        let user = store.add_user("Ann", "ann@example.com").unwrap();
        store.delete_user("2");

        store.reset();

        let retired = &store.snapshot().retired_ids;
        assert!(retired.contains(&user.id));
        // Seed ids are live again
        assert!(!retired.contains("2"));
    }

    #[test]
    fn test_failed_seed_save_is_a_warning() {
        let mut storage = MemoryStorage::new();
        storage.set_fail_saves(true);
        let mut store = Store::open(storage);

        assert_eq!(store.users().len(), 2);
        let rx = store.subscribe();
        assert!(matches!(rx.try_recv().unwrap(), StoreEvent::StorageFailed(_)));

        let warnings = store.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Could not save example data"));
    }

    #[test]
    fn test_reset_restores_seed() {
        let mut store = seeded();
        store.delete_user("1");
        store.delete_user("2");
        assert!(store.snapshot().is_empty());

        store.reset();
        assert_eq!(store.users().len(), 2);
        assert_eq!(task_ids(&store), vec!["1", "2", "3"]);
    }
}
