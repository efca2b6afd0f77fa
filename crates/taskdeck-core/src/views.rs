//! Read-only views derived from a snapshot
//!
//! Search and filtering, the status board, per-user and per-project
//! statistics and the dashboard summary. Nothing here mutates state.

use crate::model::{Priority, Project, Task, TaskStatus, User};
use crate::Snapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of tasks shown in the dashboard's recent list
pub const RECENT_TASKS: usize = 5;

/// Case-insensitive substring match; an empty term matches everything
fn contains_term(haystack: &str, term: &str) -> bool {
    term.is_empty() || haystack.to_lowercase().contains(&term.to_lowercase())
}

/// Task filter. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Matched against name and description
    pub search: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub project_id: Option<String>,
    pub assigned_to: Option<String>,
    pub tag: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        let search_miss = self.search.as_deref().is_some_and(|term| {
            !(contains_term(&task.name, term) || contains_term(&task.description, term))
        });
        if search_miss {
            return false;
        }
        if self.status.is_some_and(|s| s != task.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != task.priority) {
            return false;
        }
        if self
            .project_id
            .as_deref()
            .is_some_and(|project_id| task.project_id != project_id)
        {
            return false;
        }
        if self
            .assigned_to
            .as_deref()
            .is_some_and(|user_id| task.assigned_to.as_deref() != Some(user_id))
        {
            return false;
        }
        if self.tag.as_deref().is_some_and(|tag| !task.has_tag(tag)) {
            return false;
        }
        true
    }

    /// Matching tasks in store order
    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        tasks.iter().filter(|t| self.matches(t)).collect()
    }
}

/// Users whose name or email contains `term`
pub fn search_users<'a>(users: &'a [User], term: &str) -> Vec<&'a User> {
    users
        .iter()
        .filter(|u| contains_term(&u.name, term) || contains_term(&u.email, term))
        .collect()
}

/// Projects whose name or description contains `term`
pub fn search_projects<'a>(projects: &'a [Project], term: &str) -> Vec<&'a Project> {
    projects
        .iter()
        .filter(|p| contains_term(&p.name, term) || contains_term(&p.description, term))
        .collect()
}

/// Whether another user already has this email.
///
/// `except` skips the user being edited.
pub fn email_in_use(users: &[User], email: &str, except: Option<&str>) -> bool {
    users
        .iter()
        .any(|u| u.email == email && Some(u.id.as_str()) != except)
}

/// Tasks split into one column per status, each in input order
#[derive(Debug, Default, Serialize)]
pub struct StatusBoard<'a> {
    pub todo: Vec<&'a Task>,
    pub in_progress: Vec<&'a Task>,
    pub completed: Vec<&'a Task>,
}

impl<'a> StatusBoard<'a> {
    pub fn build(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut board = Self::default();
        for task in tasks {
            match task.status {
                TaskStatus::Todo => board.todo.push(task),
                TaskStatus::InProgress => board.in_progress.push(task),
                TaskStatus::Completed => board.completed.push(task),
            }
        }
        board
    }

    pub fn column(&self, status: TaskStatus) -> &[&'a Task] {
        match status {
            TaskStatus::Todo => &self.todo,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Completed => &self.completed,
        }
    }
}

/// Workload figures for one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    /// Projects owned
    pub projects: usize,
    /// Tasks assigned
    pub tasks: usize,
    /// Assigned tasks that are completed
    pub completed: usize,
}

pub fn user_stats(snapshot: &Snapshot, user_id: &str) -> UserStats {
    let assigned = snapshot
        .tasks
        .iter()
        .filter(|t| t.assigned_to.as_deref() == Some(user_id));

    let (tasks, completed) = assigned.fold((0, 0), |(all, done), t| {
        (all + 1, done + usize::from(t.status.is_done()))
    });

    UserStats {
        projects: snapshot
            .projects
            .iter()
            .filter(|p| p.owner_id == user_id)
            .count(),
        tasks,
        completed,
    }
}

/// Completion of one project's tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectProgress {
    pub total: usize,
    pub completed: usize,
    /// Rounded to the nearest whole percent, 0 when there are no tasks
    pub percent: u8,
}

pub fn project_progress(snapshot: &Snapshot, project_id: &str) -> ProjectProgress {
    let tasks: Vec<_> = snapshot
        .tasks
        .iter()
        .filter(|t| t.project_id == project_id)
        .collect();
    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.status.is_done()).count();

    ProjectProgress {
        total,
        completed,
        percent: percent(completed, total).round() as u8,
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Store-wide summary
#[derive(Debug, Serialize)]
pub struct Dashboard<'a> {
    pub users: usize,
    pub projects: usize,
    pub tasks: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub completed: usize,
    /// Due before `now` and not completed
    pub overdue: usize,
    /// Completed share of all tasks, 0.0 to 100.0
    pub completion_rate: f64,
    /// Newest tasks first
    pub recent: Vec<&'a Task>,
}

pub fn dashboard(snapshot: &Snapshot, now: DateTime<Utc>) -> Dashboard<'_> {
    let count = |status: TaskStatus| snapshot.tasks.iter().filter(|t| t.status == status).count();
    let completed = count(TaskStatus::Completed);

    let mut recent: Vec<&Task> = snapshot.tasks.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(RECENT_TASKS);

    Dashboard {
        users: snapshot.users.len(),
        projects: snapshot.projects.len(),
        tasks: snapshot.tasks.len(),
        todo: count(TaskStatus::Todo),
        in_progress: count(TaskStatus::InProgress),
        completed,
        overdue: snapshot.tasks.iter().filter(|t| t.is_overdue(now)).count(),
        completion_rate: percent(completed, snapshot.tasks.len()),
        recent,
    }
}
