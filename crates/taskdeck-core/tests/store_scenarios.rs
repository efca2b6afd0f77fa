use taskdeck_core::{
    FileStorage, MemoryStorage, NewTask, Priority, ProjectStatus, ProjectUpdate, SnapshotStorage,
    Store, StoreEvent, TaskStatus, TaskUpdate, UserUpdate,
};

fn ids<T>(items: &[T], id: impl Fn(&T) -> &str) -> Vec<String> {
    items.iter().map(|i| id(i).to_string()).collect()
}

#[test]
fn deleting_seed_user_one_leaves_project_two_and_task_three() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(FileStorage::in_dir(dir.path()));

    store.delete_user("1");

    assert_eq!(ids(store.users(), |u| u.id.as_str()), vec!["2"]);
    assert_eq!(ids(store.projects(), |p| p.id.as_str()), vec!["2"]);
    assert_eq!(ids(store.tasks(), |t| t.id.as_str()), vec!["3"]);

    // The durable copy matches
    let saved = store.storage().load().unwrap().unwrap();
    assert_eq!(&saved, store.snapshot());
}

#[test]
fn deleting_project_removes_new_and_existing_tasks() {
    let mut store = Store::open(MemoryStorage::new());

    let added = store
        .add_task(NewTask {
            status: TaskStatus::Todo,
            priority: Priority::Low,
            ..NewTask::new("2", "X")
        })
        .unwrap();
    assert!(added.tags.is_empty());

    store.delete_project("2");

    assert!(store.task(&added.id).is_none());
    assert!(store.tasks_by_project("2").is_empty());
    assert_eq!(ids(store.tasks(), |t| t.id.as_str()), vec!["1", "2"]);
    assert!(store.tasks().iter().all(|t| t.project_id == "1"));
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let expected = {
        let mut store = Store::open(FileStorage::in_dir(dir.path()));
        let user = store.add_user("Ann Lee", "ann@example.com").unwrap();
        let project = store
            .add_project("Docs", "Write the manual", &user.id, ProjectStatus::Active)
            .unwrap();
        let task = store
            .add_task(NewTask {
                assigned_to: Some(user.id.clone()),
                tags: vec!["writing".into(), "docs".into()],
                due_date: Some(chrono::Utc::now()),
                ..NewTask::new(project.id.clone(), "Outline")
            })
            .unwrap();
        store
            .update_project(
                &project.id,
                ProjectUpdate {
                    status: Some(ProjectStatus::Completed),
                    ..ProjectUpdate::default()
                },
            )
            .unwrap();
        store
            .update_task(
                &task.id,
                TaskUpdate {
                    parent_task_id: Some(Some("1".into())),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();
        store.snapshot().clone()
    };

    let reopened = Store::open(FileStorage::in_dir(dir.path()));
    assert_eq!(reopened.snapshot(), &expected);
    assert_eq!(reopened.tasks().last().unwrap().tags, vec!["writing", "docs"]);
}

#[test]
fn seed_is_written_once_and_kept() {
    let dir = tempfile::tempdir().unwrap();

    let first = Store::open(FileStorage::in_dir(dir.path())).snapshot().clone();
    let second = Store::open(FileStorage::in_dir(dir.path())).snapshot().clone();

    assert_eq!(first, second);
}

#[test]
fn corrupt_file_opens_with_seed_and_warning() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::in_dir(dir.path());
    std::fs::write(storage.path(), "{\"state\": {\"users\": 7}}").unwrap();

    let mut store = Store::open(storage);

    assert_eq!(store.users().len(), 2);
    let warnings = store.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("corrupt snapshot"));

    // The first mutation replaces the unreadable file
    store.add_user("Ann", "ann@example.com").unwrap();
    assert_eq!(store.storage().load().unwrap().unwrap().users.len(), 3);
}

#[test]
fn unwritable_storage_keeps_edits_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the data directory should be
    let blocked = dir.path().join("blocked");
    std::fs::write(&blocked, "").unwrap();

    let mut store = Store::open(FileStorage::in_dir(&blocked));
    assert_eq!(store.users().len(), 2);
    let warnings = store.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("failed to check"));

    let rx = store.subscribe();
    store
        .update_user(
            "2",
            UserUpdate {
                email: Some("jane@work.example".into()),
                ..UserUpdate::default()
            },
        )
        .unwrap();

    assert_eq!(store.user("2").unwrap().email, "jane@work.example");
    assert!(store.last_storage_error().is_some());
    let events: Vec<_> = rx.try_iter().collect();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], StoreEvent::StorageFailed(_)));
    assert!(matches!(events[1], StoreEvent::Changed(_)));
}

#[test]
fn deleted_ids_stay_retired_across_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let project_id = {
        let mut store = Store::open(FileStorage::in_dir(dir.path()));
        let project = store
            .add_project("Scratch", "", "1", ProjectStatus::Active)
            .unwrap();
        store.delete_project(&project.id);
        project.id
    };

    let reopened = Store::open(FileStorage::in_dir(dir.path()));
    assert!(reopened.project(&project_id).is_none());
    assert!(reopened.snapshot().id_in_use(&project_id));
}

#[test]
fn updates_never_touch_identity() {
    let mut store = Store::open(MemoryStorage::new());
    let before = store.task("3").unwrap().clone();

    store
        .update_task(
            "3",
            TaskUpdate {
                name: Some("Bootstrap app".into()),
                priority: Some(Priority::Low),
                ..TaskUpdate::default()
            },
        )
        .unwrap();

    let after = store.task("3").unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.description, before.description);
    assert_eq!(after.assigned_to, before.assigned_to);
    assert_eq!(after.name, "Bootstrap app");
    assert_eq!(after.priority, Priority::Low);
}
