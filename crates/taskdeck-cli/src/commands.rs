//! CLI command implementations

use anyhow::{Context as _, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use colored::{ColoredString, Colorize};
use std::path::PathBuf;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::debug;
use taskdeck_core::views::{self, StatusBoard, TaskFilter};
use taskdeck_core::{
    Config, FileStorage, NewTask, Priority, Project, ProjectStatus, ProjectUpdate, Removed, Store,
    Task, TaskStatus, TaskUpdate, UserUpdate,
};

/// Settings shared by every command
pub struct Context {
    config: Config,
    config_path: PathBuf,
    data_dir: Option<PathBuf>,
    json: bool,
}

impl Context {
    pub fn load(data_dir: Option<PathBuf>, json: bool) -> Result<Self> {
        let config_path = Config::default_path()?;
        let config = Config::load(&config_path)?;
        debug!("config: {}", config_path.display());

        if !config.display.colors {
            colored::control::set_override(false);
        }

        Ok(Self {
            config,
            config_path,
            data_dir,
            json,
        })
    }

    fn storage(&self) -> Result<FileStorage> {
        match self.data_dir {
            Some(ref dir) => Ok(FileStorage::new(dir, self.config.storage_key.clone())),
            None => Ok(self.config.storage()?),
        }
    }

    /// Open the store, printing any load warnings
    fn open(&self) -> Result<Store<FileStorage>> {
        let storage = self.storage()?;
        debug!("snapshot: {}", storage.path().display());
        let mut store = Store::open(storage);
        for warning in store.take_warnings() {
            eprintln!("{} {}", "!".yellow(), warning);
        }
        Ok(store)
    }

    fn date(&self, dt: &DateTime<Utc>) -> String {
        dt.format(&self.config.display.date_format).to_string()
    }

    fn clip(&self, text: &str) -> String {
        let max = self.config.display.max_name_length;
        if text.chars().count() <= max {
            text.to_string()
        } else {
            let cut: String = text.chars().take(max.saturating_sub(1)).collect();
            format!("{cut}…")
        }
    }
}

/// Report a failed save without failing the command
fn warn_on_storage_error(store: &Store<FileStorage>) {
    if let Some(err) = store.last_storage_error() {
        eprintln!(
            "{} Change kept in memory but not saved: {}",
            "!".yellow(),
            err
        );
    }
}

fn print_removed(what: &str, id: &str, removed: Removed) {
    if removed.is_empty() {
        println!("No {} with id {}", what, id);
        return;
    }
    println!(
        "{} Deleted {} {} ({} users, {} projects, {} tasks removed)",
        "✓".green(),
        what,
        id,
        removed.users,
        removed.projects,
        removed.tasks
    );
}

fn task_status_colored(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Todo => "todo".white(),
        TaskStatus::InProgress => "in-progress".yellow(),
        TaskStatus::Completed => "completed".green(),
    }
}

fn priority_colored(priority: Priority) -> ColoredString {
    match priority {
        Priority::High => "high".red(),
        Priority::Medium => "medium".yellow(),
        Priority::Low => "low".green(),
    }
}

fn project_status_colored(status: ProjectStatus) -> ColoredString {
    match status {
        ProjectStatus::Active => "active".green(),
        ProjectStatus::Completed => "completed".blue(),
        ProjectStatus::Archived => "archived".dimmed(),
    }
}

/// Parse `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp
fn parse_due(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    let dt = DateTime::parse_from_rfc3339(input)
        .with_context(|| format!("Invalid due date: {input} (expected YYYY-MM-DD)"))?;
    Ok(dt.with_timezone(&Utc))
}

/// Tags are trimmed and blank ones dropped
fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Projects")]
    projects: usize,
    #[tabled(rename = "Tasks")]
    tasks: String,
    #[tabled(rename = "Joined")]
    joined: String,
}

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Owner")]
    owner: String,
    #[tabled(rename = "Progress")]
    progress: String,
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Assignee")]
    assignee: String,
    #[tabled(rename = "Due")]
    due: String,
}

fn user_name(store: &Store<FileStorage>, id: Option<&str>) -> String {
    match id {
        None => "-".to_string(),
        Some(id) => store
            .user(id)
            .map(|u| u.name.clone())
            .unwrap_or_else(|| format!("{id} (unknown)")),
    }
}

fn task_rows(ctx: &Context, store: &Store<FileStorage>, tasks: &[&Task]) -> Vec<TaskRow> {
    let now = Utc::now();
    tasks
        .iter()
        .map(|t| TaskRow {
            id: t.id.clone(),
            name: ctx.clip(&t.name),
            status: task_status_colored(t.status).to_string(),
            priority: priority_colored(t.priority).to_string(),
            assignee: user_name(store, t.assigned_to.as_deref()),
            due: match t.due_date {
                Some(ref due) if t.is_overdue(now) => ctx.date(due).red().to_string(),
                Some(ref due) => ctx.date(due),
                None => "-".to_string(),
            },
        })
        .collect()
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    println!("{}", Table::new(rows).with(Style::rounded()));
}

// --- users -----------------------------------------------------------------

pub fn user_add(ctx: &Context, name: &str, email: &str) -> Result<()> {
    let mut store = ctx.open()?;
    if views::email_in_use(store.users(), email, None) {
        bail!("A user with email {} already exists", email);
    }

    let user = store.add_user(name, email)?;
    warn_on_storage_error(&store);

    if ctx.json {
        println!("{}", serde_json::to_string(&user)?);
    } else {
        println!("{} Created user: {}", "✓".green(), user.id);
        println!("  Name:  {}", user.name);
        println!("  Email: {}", user.email);
    }
    Ok(())
}

pub fn user_list(ctx: &Context, search: Option<String>) -> Result<()> {
    let store = ctx.open()?;
    let users = views::search_users(store.users(), search.as_deref().unwrap_or(""));

    if ctx.json {
        println!("{}", serde_json::to_string(&users)?);
    } else if users.is_empty() {
        println!("No users found");
    } else {
        let rows = users
            .iter()
            .map(|u| {
                let stats = views::user_stats(store.snapshot(), &u.id);
                UserRow {
                    id: u.id.clone(),
                    name: ctx.clip(&u.name),
                    email: u.email.clone(),
                    projects: stats.projects,
                    tasks: format!("{}/{}", stats.completed, stats.tasks),
                    joined: ctx.date(&u.created_at),
                }
            })
            .collect();
        print_table::<UserRow>(rows);
    }
    Ok(())
}

pub fn user_show(ctx: &Context, id: &str) -> Result<()> {
    let store = ctx.open()?;
    let user = store.require_user(id)?;
    let stats = views::user_stats(store.snapshot(), id);
    let projects = store.projects_by_user(id);
    let filter = TaskFilter {
        assigned_to: Some(id.to_string()),
        ..TaskFilter::default()
    };
    let tasks = filter.apply(store.tasks());

    if ctx.json {
        let value = serde_json::json!({
            "user": user,
            "stats": stats,
            "projects": projects,
            "tasks": tasks,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{} {}", user.id.cyan().bold(), user.name.bold());
    println!();
    println!("Email:    {}", user.email);
    println!("Joined:   {}", ctx.date(&user.created_at));
    println!(
        "Tasks:    {} assigned, {} completed",
        stats.tasks, stats.completed
    );

    if !projects.is_empty() {
        println!();
        println!("{}", "Projects:".bold());
        for project in projects {
            println!(
                "  {} [{}] {}",
                project.id.cyan(),
                project_status_colored(project.status),
                project.name
            );
        }
    }

    if !tasks.is_empty() {
        println!();
        println!("{}", "Assigned tasks:".bold());
        print_table(task_rows(ctx, &store, &tasks));
    }
    Ok(())
}

pub fn user_update(
    ctx: &Context,
    id: &str,
    name: Option<String>,
    email: Option<String>,
) -> Result<()> {
    let mut store = ctx.open()?;
    store.require_user(id)?;

    if let Some(ref email) = email {
        if views::email_in_use(store.users(), email, Some(id)) {
            bail!("A user with email {} already exists", email);
        }
    }

    let update = UserUpdate { name, email };
    if update.is_empty() {
        bail!("Nothing to update");
    }
    store.update_user(id, update)?;
    warn_on_storage_error(&store);

    let user = store.require_user(id)?;
    if ctx.json {
        println!("{}", serde_json::to_string(user)?);
    } else {
        println!("{} Updated user {}", "✓".green(), id);
    }
    Ok(())
}

pub fn user_rm(ctx: &Context, id: &str) -> Result<()> {
    let mut store = ctx.open()?;
    let removed = store.delete_user(id);
    warn_on_storage_error(&store);

    if ctx.json {
        println!("{}", serde_json::to_string(&removed_json(removed))?);
    } else {
        print_removed("user", id, removed);
    }
    Ok(())
}

fn removed_json(removed: Removed) -> serde_json::Value {
    serde_json::json!({
        "users": removed.users,
        "projects": removed.projects,
        "tasks": removed.tasks,
    })
}

// --- projects --------------------------------------------------------------

pub fn project_add(
    ctx: &Context,
    name: &str,
    owner: &str,
    description: &str,
    status: &str,
) -> Result<()> {
    let mut store = ctx.open()?;
    let status: ProjectStatus = status.parse()?;
    store
        .require_user(owner)
        .context("Project owner must be an existing user")?;

    let project = store.add_project(name, description, owner, status)?;
    warn_on_storage_error(&store);

    if ctx.json {
        println!("{}", serde_json::to_string(&project)?);
    } else {
        println!("{} Created project: {}", "✓".green(), project.id);
        println!("  Name:  {}", project.name);
        println!("  Owner: {}", user_name(&store, Some(owner)));
    }
    Ok(())
}

pub fn project_list(ctx: &Context, search: Option<String>, owner: Option<String>) -> Result<()> {
    let store = ctx.open()?;
    let mut projects: Vec<&Project> =
        views::search_projects(store.projects(), search.as_deref().unwrap_or(""));
    if let Some(ref owner) = owner {
        projects.retain(|p| p.owner_id == *owner);
    }

    if ctx.json {
        println!("{}", serde_json::to_string(&projects)?);
    } else if projects.is_empty() {
        println!("No projects found");
    } else {
        let rows = projects
            .iter()
            .map(|p| {
                let progress = views::project_progress(store.snapshot(), &p.id);
                ProjectRow {
                    id: p.id.clone(),
                    name: ctx.clip(&p.name),
                    status: project_status_colored(p.status).to_string(),
                    owner: user_name(&store, Some(&p.owner_id)),
                    progress: format!(
                        "{}/{} ({}%)",
                        progress.completed, progress.total, progress.percent
                    ),
                }
            })
            .collect();
        print_table::<ProjectRow>(rows);
    }
    Ok(())
}

pub fn project_show(ctx: &Context, id: &str) -> Result<()> {
    let store = ctx.open()?;
    let project = store.require_project(id)?;
    let progress = views::project_progress(store.snapshot(), id);
    let tasks = store.tasks_by_project(id);

    if ctx.json {
        let value = serde_json::json!({
            "project": project,
            "progress": progress,
            "tasks": tasks,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{} {}", project.id.cyan().bold(), project.name.bold());
    println!();
    println!("Status:   {}", project_status_colored(project.status));
    println!("Owner:    {}", user_name(&store, Some(&project.owner_id)));
    println!("Created:  {}", ctx.date(&project.created_at));
    println!(
        "Progress: {}/{} tasks ({}%)",
        progress.completed, progress.total, progress.percent
    );

    if !project.description.is_empty() {
        println!();
        println!("{}", "Description:".bold());
        println!("{}", project.description);
    }

    if !tasks.is_empty() {
        println!();
        println!("{}", "Tasks:".bold());
        print_table(task_rows(ctx, &store, &tasks));
    }
    Ok(())
}

pub fn project_update(
    ctx: &Context,
    id: &str,
    name: Option<String>,
    description: Option<String>,
    owner: Option<String>,
    status: Option<String>,
) -> Result<()> {
    let mut store = ctx.open()?;
    store.require_project(id)?;
    if let Some(ref owner) = owner {
        store
            .require_user(owner)
            .context("Project owner must be an existing user")?;
    }

    let update = ProjectUpdate {
        name,
        description,
        owner_id: owner,
        status: status.map(|s| s.parse::<ProjectStatus>()).transpose()?,
    };
    if update.is_empty() {
        bail!("Nothing to update");
    }
    store.update_project(id, update)?;
    warn_on_storage_error(&store);

    let project = store.require_project(id)?;
    if ctx.json {
        println!("{}", serde_json::to_string(project)?);
    } else {
        println!("{} Updated project {}", "✓".green(), id);
    }
    Ok(())
}

pub fn project_rm(ctx: &Context, id: &str) -> Result<()> {
    let mut store = ctx.open()?;
    let removed = store.delete_project(id);
    warn_on_storage_error(&store);

    if ctx.json {
        println!("{}", serde_json::to_string(&removed_json(removed))?);
    } else {
        print_removed("project", id, removed);
    }
    Ok(())
}

// --- tasks -----------------------------------------------------------------

/// Raw `task add` arguments
pub struct TaskInput {
    pub name: String,
    pub project: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub assign: Option<String>,
    pub due: Option<String>,
    pub tags: Vec<String>,
    pub parent: Option<String>,
}

/// Raw `task update` arguments. `Some(None)` clears a field.
pub struct TaskChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub project: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assign: Option<Option<String>>,
    pub due: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

pub fn task_add(ctx: &Context, input: TaskInput) -> Result<()> {
    let mut store = ctx.open()?;
    store.require_project(&input.project)?;
    if let Some(ref user) = input.assign {
        store.require_user(user)?;
    }
    if let Some(ref parent) = input.parent {
        store.require_task(parent)?;
    }

    let new = NewTask {
        project_id: input.project,
        name: input.name,
        description: input.description,
        status: input.status.parse()?,
        priority: input.priority.parse()?,
        assigned_to: input.assign,
        due_date: input.due.as_deref().map(parse_due).transpose()?,
        parent_task_id: input.parent,
        tags: clean_tags(input.tags),
    };
    let task = store.add_task(new)?;
    warn_on_storage_error(&store);

    if ctx.json {
        println!("{}", serde_json::to_string(&task)?);
    } else {
        println!("{} Created task: {}", "✓".green(), task.id);
        println!("  Name:     {}", task.name);
        println!("  Priority: {}", priority_colored(task.priority));
    }
    Ok(())
}

pub fn task_list(ctx: &Context, filter: TaskFilter) -> Result<()> {
    let store = ctx.open()?;
    let tasks = filter.apply(store.tasks());

    if ctx.json {
        println!("{}", serde_json::to_string(&tasks)?);
    } else if tasks.is_empty() {
        println!("No tasks found");
    } else {
        print_table(task_rows(ctx, &store, &tasks));
    }
    Ok(())
}

pub fn task_board(ctx: &Context, filter: TaskFilter) -> Result<()> {
    let store = ctx.open()?;
    let board = StatusBoard::build(filter.apply(store.tasks()));

    if ctx.json {
        println!("{}", serde_json::to_string(&board)?);
        return Ok(());
    }

    for status in TaskStatus::ALL {
        let column = board.column(status);
        println!(
            "{} ({})",
            task_status_colored(status).bold(),
            column.len()
        );
        if column.is_empty() {
            println!("  {}", "No tasks".dimmed());
        }
        for task in column {
            println!(
                "  {} [{}] {}",
                task.id.cyan(),
                priority_colored(task.priority),
                ctx.clip(&task.name)
            );
        }
        println!();
    }
    Ok(())
}

pub fn task_show(ctx: &Context, id: &str) -> Result<()> {
    let store = ctx.open()?;
    let task = store.require_task(id)?;
    let subtasks = store.subtasks(id);

    if ctx.json {
        let value = serde_json::json!({
            "task": task,
            "subtasks": subtasks,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let project = store
        .project(&task.project_id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| format!("{} (unknown)", task.project_id));

    println!("{} {}", task.id.cyan().bold(), task.name.bold());
    println!();
    println!("Status:   {}", task_status_colored(task.status));
    println!("Priority: {}", priority_colored(task.priority));
    println!("Project:  {}", project);
    println!("Assignee: {}", user_name(&store, task.assigned_to.as_deref()));
    if let Some(ref due) = task.due_date {
        let overdue = if task.is_overdue(Utc::now()) {
            format!(" {}", "(overdue)".red())
        } else {
            String::new()
        };
        println!("Due:      {}{}", ctx.date(due), overdue);
    }
    if let Some(ref parent) = task.parent_task_id {
        println!("Parent:   {}", parent);
    }
    println!("Created:  {}", ctx.date(&task.created_at));
    if !task.tags.is_empty() {
        println!("Tags:     {}", task.tags.join(", "));
    }

    if !task.description.is_empty() {
        println!();
        println!("{}", "Description:".bold());
        println!("{}", task.description);
    }

    if !subtasks.is_empty() {
        println!();
        println!("{}", "Subtasks:".bold());
        for sub in subtasks {
            println!("  {} [{}] {}", sub.id.cyan(), task_status_colored(sub.status), sub.name);
        }
    }
    Ok(())
}

pub fn task_update(ctx: &Context, id: &str, changes: TaskChanges) -> Result<()> {
    let mut store = ctx.open()?;
    store.require_task(id)?;
    if let Some(ref project) = changes.project {
        store.require_project(project)?;
    }
    if let Some(Some(ref user)) = changes.assign {
        store.require_user(user)?;
    }

    let due_date = match changes.due {
        Some(Some(ref due)) => Some(Some(parse_due(due)?)),
        Some(None) => Some(None),
        None => None,
    };

    let update = TaskUpdate {
        project_id: changes.project,
        name: changes.name,
        description: changes.description,
        status: changes.status.map(|s| s.parse::<TaskStatus>()).transpose()?,
        priority: changes.priority.map(|p| p.parse::<Priority>()).transpose()?,
        due_date,
        assigned_to: changes.assign,
        parent_task_id: None,
        tags: changes.tags.map(clean_tags),
    };
    if update.is_empty() {
        bail!("Nothing to update");
    }
    store.update_task(id, update)?;
    warn_on_storage_error(&store);

    let task = store.require_task(id)?;
    if ctx.json {
        println!("{}", serde_json::to_string(task)?);
    } else {
        println!("{} Updated task {}", "✓".green(), id);
    }
    Ok(())
}

pub fn task_status(ctx: &Context, id: &str, status: &str) -> Result<()> {
    let status: TaskStatus = status.parse()?;
    let mut store = ctx.open()?;
    if !store.update_task(id, TaskUpdate::status(status))? {
        bail!("Task not found: {}", id);
    }
    warn_on_storage_error(&store);

    if ctx.json {
        println!("{}", serde_json::to_string(store.require_task(id)?)?);
    } else {
        println!(
            "{} Task {} is now {}",
            "✓".green(),
            id,
            task_status_colored(status)
        );
    }
    Ok(())
}

pub fn task_rm(ctx: &Context, id: &str) -> Result<()> {
    let mut store = ctx.open()?;
    let removed = store.delete_task(id);
    warn_on_storage_error(&store);

    if ctx.json {
        println!("{}", serde_json::to_string(&removed_json(removed))?);
    } else {
        print_removed("task", id, removed);
    }
    Ok(())
}

// --- overview --------------------------------------------------------------

pub fn stats(ctx: &Context) -> Result<()> {
    let store = ctx.open()?;
    let summary = views::dashboard(store.snapshot(), Utc::now());

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}", "Overview".bold());
    println!("  Users:       {}", summary.users);
    println!("  Projects:    {}", summary.projects);
    println!("  Tasks:       {}", summary.tasks);
    println!(
        "  Status:      {} todo, {} in progress, {} completed",
        summary.todo, summary.in_progress, summary.completed
    );
    let overdue = summary.overdue.to_string();
    println!(
        "  Overdue:     {}",
        if summary.overdue > 0 {
            overdue.red()
        } else {
            overdue.normal()
        }
    );
    println!("  Completion:  {:.0}%", summary.completion_rate);

    if !store.projects().is_empty() {
        println!();
        println!("{}", "Projects".bold());
        for project in store.projects() {
            let progress = views::project_progress(store.snapshot(), &project.id);
            println!(
                "  {} {:<32} {:>3}% ({}/{})",
                project.id.cyan(),
                ctx.clip(&project.name),
                progress.percent,
                progress.completed,
                progress.total
            );
        }
    }

    if !summary.recent.is_empty() {
        println!();
        println!("{}", "Recent tasks".bold());
        print_table(task_rows(ctx, &store, &summary.recent));
    }
    Ok(())
}

pub fn reset(ctx: &Context, yes: bool) -> Result<()> {
    if !yes {
        println!(
            "{}",
            "This replaces all users, projects and tasks with the example data.".red()
        );
        print!("Continue? [y/N] ");
        std::io::Write::flush(&mut std::io::stdout())?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted");
            return Ok(());
        }
    }

    let mut store = ctx.open()?;
    store.reset();
    warn_on_storage_error(&store);
    println!("{} Restored example data", "✓".green());
    Ok(())
}

// --- config ----------------------------------------------------------------

/// Show current configuration
pub fn config_show(ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let data_dir = match ctx.data_dir {
        Some(ref dir) => dir.clone(),
        None => config.resolve_data_dir()?,
    };

    if ctx.json {
        let mut value = serde_json::to_value(config)?;
        value["resolved_data_dir"] = serde_json::json!(data_dir);
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", "Current configuration:".bold());
        println!();
        println!("# data directory: {}", data_dir.display());
        println!("storage_key = \"{}\"", config.storage_key);
        println!();
        println!("[display]");
        println!("colors = {}", config.display.colors);
        println!("date_format = \"{}\"", config.display.date_format);
        println!("max_name_length = {}", config.display.max_name_length);
    }
    Ok(())
}

/// Print the config file path
pub fn config_path(ctx: &Context) -> Result<()> {
    println!("{}", ctx.config_path.display());
    Ok(())
}

/// Write the commented default config
pub fn config_init(force: bool) -> Result<()> {
    let path = Config::default_path()?;
    if path.exists() && !force {
        bail!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, Config::default_with_comments())?;
    println!("{} Wrote {}", "✓".green(), path.display());
    Ok(())
}
