//! Serialized store state and the seed dataset

use crate::model::{Priority, Project, ProjectStatus, Task, TaskStatus, User};
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Format version written alongside the state
pub const SNAPSHOT_VERSION: u32 = 0;

/// Complete state of all three collections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub users: Vec<User>,
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
    /// Ids of deleted entities; never handed out again
    #[serde(
        rename = "retiredIds",
        default,
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub retired_ids: BTreeSet<String>,
}

/// On-disk envelope: `{"state": {...}, "version": 0}`
#[derive(Serialize)]
struct EnvelopeRef<'a> {
    state: &'a Snapshot,
    version: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Stored {
    Envelope { state: Snapshot, version: u32 },
    Bare(Snapshot),
}

impl Snapshot {
    /// Serialize into the persisted envelope
    pub fn to_json(&self) -> Result<String> {
        let envelope = EnvelopeRef {
            state: self,
            version: SNAPSHOT_VERSION,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Parse a persisted snapshot. Accepts the envelope or a bare record.
    pub fn from_json(text: &str) -> Result<Self> {
        match serde_json::from_str::<Stored>(text)? {
            Stored::Envelope { state, version } => {
                if version > SNAPSHOT_VERSION {
                    tracing::warn!(version, "snapshot written by a newer format version");
                }
                Ok(state)
            }
            Stored::Bare(state) => Ok(state),
        }
    }

    /// True when `id` belongs to a live or deleted entity of any kind
    pub fn id_in_use(&self, id: &str) -> bool {
        self.retired_ids.contains(id)
            || self.users.iter().any(|u| u.id == id)
            || self.projects.iter().any(|p| p.id == id)
            || self.tasks.iter().any(|t| t.id == id)
    }

    /// Every live id, all kinds together
    pub(crate) fn live_ids(&self) -> impl Iterator<Item = &str> {
        self.users
            .iter()
            .map(|u| u.id.as_str())
            .chain(self.projects.iter().map(|p| p.id.as_str()))
            .chain(self.tasks.iter().map(|t| t.id.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.projects.is_empty() && self.tasks.is_empty()
    }

    /// The example dataset used when no snapshot exists.
    ///
    /// Two users, one project each, three tasks: `1` and `2` in project `1`
    /// assigned to user `1`, `3` in project `2` assigned to user `2`.
    pub fn seed(now: DateTime<Utc>) -> Self {
        let user = |id: &str, name: &str, email: &str| User {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            created_at: now,
        };

        let project = |id: &str, name: &str, description: &str, owner: &str| Project {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            owner_id: owner.into(),
            status: ProjectStatus::Active,
            created_at: now,
        };

        let tags = |list: &[&str]| list.iter().map(|t| t.to_string()).collect::<Vec<_>>();

        Self {
            users: vec![
                user("1", "John Doe", "john@example.com"),
                user("2", "Jane Smith", "jane@example.com"),
            ],
            projects: vec![
                project(
                    "1",
                    "Website Redesign",
                    "Complete redesign of the company website",
                    "1",
                ),
                project(
                    "2",
                    "Mobile App Development",
                    "Develop a new mobile application",
                    "2",
                ),
            ],
            tasks: vec![
                Task {
                    id: "1".into(),
                    project_id: "1".into(),
                    name: "Create wireframes".into(),
                    description: "Design wireframes for all main pages".into(),
                    status: TaskStatus::Completed,
                    priority: Priority::High,
                    due_date: None,
                    assigned_to: Some("1".into()),
                    created_at: now,
                    parent_task_id: None,
                    tags: tags(&["design", "wireframes"]),
                },
                Task {
                    id: "2".into(),
                    project_id: "1".into(),
                    name: "Develop homepage".into(),
                    description: "Code the new homepage design".into(),
                    status: TaskStatus::InProgress,
                    priority: Priority::Medium,
                    due_date: Some(now + Duration::days(7)),
                    assigned_to: Some("1".into()),
                    created_at: now,
                    parent_task_id: None,
                    tags: tags(&["development", "frontend"]),
                },
                Task {
                    id: "3".into(),
                    project_id: "2".into(),
                    name: "Set up project structure".into(),
                    description: "Initialize the mobile app project".into(),
                    status: TaskStatus::Todo,
                    priority: Priority::High,
                    due_date: None,
                    assigned_to: Some("2".into()),
                    created_at: now,
                    parent_task_id: None,
                    tags: tags(&["setup", "mobile"]),
                },
            ],
            retired_ids: BTreeSet::new(),
        }
    }
}
