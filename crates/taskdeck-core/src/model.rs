//! Entity model for taskdeck
//!
//! Three collections: users, projects owned by users, and tasks that belong
//! to projects and may be assigned to users. `id` and `created_at` are only
//! ever assigned by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Completed,
    Archived,
}

impl std::str::FromStr for ProjectStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ProjectStatus::Active),
            "completed" | "done" => Ok(ProjectStatus::Completed),
            "archived" => Ok(ProjectStatus::Archived),
            _ => Err(crate::Error::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::Active => write!(f, "active"),
            ProjectStatus::Completed => write!(f, "completed"),
            ProjectStatus::Archived => write!(f, "archived"),
        }
    }
}

/// Task workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Board column order
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Completed];

    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "todo" | "to-do" => Ok(TaskStatus::Todo),
            "in-progress" | "in_progress" | "inprogress" => Ok(TaskStatus::InProgress),
            "completed" | "done" => Ok(TaskStatus::Completed),
            _ => Err(crate::Error::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Todo => write!(f, "todo"),
            TaskStatus::InProgress => write!(f, "in-progress"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl std::str::FromStr for Priority {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "med" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(crate::Error::InvalidPriority(s.to_string())),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

/// A person who can own projects and be assigned tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    /// Expected to be unique; checked by callers, not by the store
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A project owned by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Owning user. Checked at creation by callers only
    pub owner_id: String,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
}

/// A unit of work inside a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub project_id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    pub status: TaskStatus,

    pub priority: Priority,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,

    /// Assigned user id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Parent task for subtasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl Task {
    /// Past its due date and not yet completed
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_done() && self.due_date.is_some_and(|due| due < now)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} <{}>", self.id, self.name, self.email)
    }
}

impl std::fmt::Display for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.id, self.status, self.name)
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] [{}] {}",
            self.id, self.priority, self.status, self.name
        )
    }
}

/// Fields a caller supplies when creating a task
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub project_id: String,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assigned_to: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub parent_task_id: Option<String>,
    pub tags: Vec<String>,
}

impl NewTask {
    /// A todo/medium task with no assignee, due date or tags
    pub fn new(project_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Partial update for a user. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }

    pub(crate) fn validate(&self) -> crate::Result<()> {
        require_if_present("name", self.name.as_deref())?;
        require_if_present("email", self.email.as_deref())
    }

    pub(crate) fn apply(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
    }
}

/// Partial update for a project. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<String>,
    pub status: Option<ProjectStatus>,
}

impl ProjectUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.owner_id.is_none()
            && self.status.is_none()
    }

    pub(crate) fn validate(&self) -> crate::Result<()> {
        require_if_present("name", self.name.as_deref())
    }

    pub(crate) fn apply(self, project: &mut Project) {
        if let Some(name) = self.name {
            project.name = name;
        }
        if let Some(description) = self.description {
            project.description = description;
        }
        if let Some(owner_id) = self.owner_id {
            project.owner_id = owner_id;
        }
        if let Some(status) = self.status {
            project.status = status;
        }
    }
}

/// Partial update for a task.
///
/// Outer `None` leaves a field untouched. For the optional task fields,
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub project_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub assigned_to: Option<Option<String>>,
    pub parent_task_id: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

impl TaskUpdate {
    /// Update that only moves the task to another status
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn validate(&self) -> crate::Result<()> {
        require_if_present("name", self.name.as_deref())?;
        require_if_present("projectId", self.project_id.as_deref())
    }

    pub(crate) fn apply(self, task: &mut Task) {
        if let Some(project_id) = self.project_id {
            task.project_id = project_id;
        }
        if let Some(name) = self.name {
            task.name = name;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(assigned_to) = self.assigned_to {
            task.assigned_to = assigned_to;
        }
        if let Some(parent_task_id) = self.parent_task_id {
            task.parent_task_id = parent_task_id;
        }
        if let Some(tags) = self.tags {
            task.tags = tags;
        }
    }
}

/// Reject a blank required field
pub(crate) fn require(field: &str, value: &str) -> crate::Result<()> {
    if value.trim().is_empty() {
        return Err(crate::Error::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_if_present(field: &str, value: Option<&str>) -> crate::Result<()> {
    match value {
        Some(v) => require(field, v),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_task() -> Task {
        Task {
            id: "t1".into(),
            project_id: "p1".into(),
            name: "Write docs".into(),
            description: "Cover the store".into(),
            status: TaskStatus::Todo,
            priority: Priority::High,
            due_date: None,
            assigned_to: Some("u1".into()),
            created_at: Utc::now(),
            parent_task_id: None,
            tags: vec!["docs".into()],
        }
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("in-progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("In_Progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("archived".parse::<ProjectStatus>().unwrap(), ProjectStatus::Archived);
        assert!("blocked".parse::<TaskStatus>().is_err());
        assert!(matches!(
            "urgent".parse::<Priority>(),
            Err(crate::Error::InvalidPriority(_))
        ));
    }

    #[test]
    fn test_wire_names() {
        let task = sample_task();
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["projectId"], "p1");
        assert_eq!(json["assignedTo"], "u1");
        assert_eq!(json["status"], "todo");
        assert_eq!(json["priority"], "high");
        assert!(json.get("dueDate").is_none());
        assert!(json.get("parentTaskId").is_none());

        let json = serde_json::to_value(TaskStatus::InProgress).unwrap();
        assert_eq!(json, "in-progress");
    }

    #[test]
    fn test_task_update_clears_optional_fields() {
        let mut task = sample_task();
        TaskUpdate {
            assigned_to: Some(None),
            ..TaskUpdate::default()
        }
        .apply(&mut task);
        assert_eq!(task.assigned_to, None);
        assert_eq!(task.name, "Write docs");
        assert_eq!(task.tags, vec!["docs".to_string()]);
    }

    #[test]
    fn test_blank_update_fields_rejected() {
        let update = UserUpdate {
            name: Some("   ".into()),
            ..UserUpdate::default()
        };
        assert!(matches!(update.validate(), Err(crate::Error::Validation(_))));
        assert!(UserUpdate::default().validate().is_ok());
        assert!(UserUpdate::default().is_empty());
    }

    #[test]
    fn test_overdue() {
        let now = Utc::now();
        let mut task = sample_task();
        assert!(!task.is_overdue(now));

        task.due_date = Some(now - Duration::days(1));
        assert!(task.is_overdue(now));

        task.status = TaskStatus::Completed;
        assert!(!task.is_overdue(now));
    }
}
