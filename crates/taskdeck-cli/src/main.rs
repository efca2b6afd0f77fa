//! taskdeck - local task, project and user tracker
//!
//! All data lives in one JSON snapshot under the data directory.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use taskdeck_core::views::TaskFilter;
use taskdeck_core::{Priority, TaskStatus};

mod commands;

#[derive(Parser)]
#[command(name = "taskdeck")]
#[command(about = "Local task, project and user tracker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding the snapshot
    #[arg(long, global = true, env = "TASKDECK_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Manage tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Show dashboard statistics
    Stats,

    /// Replace all data with the example dataset
    Reset {
        /// Skip confirmation
        #[arg(long, short)]
        yes: bool,
    },

    /// Show or create configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Add a user
    Add {
        name: String,
        email: String,
    },

    /// List users
    List {
        /// Match name or email
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show a user with their projects and tasks
    Show { id: String },

    /// Update a user
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },

    /// Delete a user, their projects and their assigned tasks
    Rm { id: String },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Add a project
    Add {
        name: String,

        /// Owning user id
        #[arg(long)]
        owner: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// active, completed or archived
        #[arg(long, default_value = "active")]
        status: String,
    },

    /// List projects
    List {
        /// Match name or description
        #[arg(short, long)]
        search: Option<String>,

        /// Only projects owned by this user
        #[arg(long)]
        owner: Option<String>,
    },

    /// Show a project with its tasks
    Show { id: String },

    /// Update a project
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },

    /// Delete a project and its tasks
    Rm { id: String },
}

/// Task list filters shared by `list` and `board`
#[derive(Args)]
struct TaskFilterArgs {
    /// Match name or description
    #[arg(short, long)]
    search: Option<String>,

    #[arg(long)]
    status: Option<String>,

    #[arg(short, long)]
    priority: Option<String>,

    #[arg(long)]
    project: Option<String>,

    #[arg(long)]
    assignee: Option<String>,

    #[arg(long)]
    tag: Option<String>,
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Add a task
    Add {
        name: String,

        /// Project id
        #[arg(long)]
        project: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// todo, in-progress or completed
        #[arg(long, default_value = "todo")]
        status: String,

        /// low, medium or high
        #[arg(short, long, default_value = "medium")]
        priority: String,

        /// Assigned user id
        #[arg(long)]
        assign: Option<String>,

        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        due: Option<String>,

        /// Tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Parent task id
        #[arg(long)]
        parent: Option<String>,
    },

    /// List tasks
    List {
        #[command(flatten)]
        filter: TaskFilterArgs,
    },

    /// Show tasks grouped by status
    Board {
        #[command(flatten)]
        filter: TaskFilterArgs,
    },

    /// Show task details
    Show { id: String },

    /// Update a task
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(short, long)]
        priority: Option<String>,
        #[arg(long, conflicts_with = "unassign")]
        assign: Option<String>,
        /// Remove the assignee
        #[arg(long)]
        unassign: bool,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
        /// Replace tags (repeatable)
        #[arg(short, long = "tag")]
        tags: Option<Vec<String>>,
    },

    /// Move a task to another status
    Status { id: String, status: String },

    /// Delete a task and its direct subtasks
    Rm { id: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Print the config file path
    Path,
    /// Write a commented default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let ctx = commands::Context::load(cli.data_dir, cli.json)?;

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Add { name, email } => commands::user_add(&ctx, &name, &email),
            UserCommands::List { search } => commands::user_list(&ctx, search),
            UserCommands::Show { id } => commands::user_show(&ctx, &id),
            UserCommands::Update { id, name, email } => {
                commands::user_update(&ctx, &id, name, email)
            }
            UserCommands::Rm { id } => commands::user_rm(&ctx, &id),
        },
        Commands::Project { command } => match command {
            ProjectCommands::Add {
                name,
                owner,
                description,
                status,
            } => commands::project_add(&ctx, &name, &owner, &description, &status),
            ProjectCommands::List { search, owner } => commands::project_list(&ctx, search, owner),
            ProjectCommands::Show { id } => commands::project_show(&ctx, &id),
            ProjectCommands::Update {
                id,
                name,
                description,
                owner,
                status,
            } => commands::project_update(&ctx, &id, name, description, owner, status),
            ProjectCommands::Rm { id } => commands::project_rm(&ctx, &id),
        },
        Commands::Task { command } => match command {
            TaskCommands::Add {
                name,
                project,
                description,
                status,
                priority,
                assign,
                due,
                tags,
                parent,
            } => commands::task_add(
                &ctx,
                commands::TaskInput {
                    name,
                    project,
                    description,
                    status,
                    priority,
                    assign,
                    due,
                    tags,
                    parent,
                },
            ),
            TaskCommands::List { filter } => commands::task_list(&ctx, filter.into_filter()?),
            TaskCommands::Board { filter } => commands::task_board(&ctx, filter.into_filter()?),
            TaskCommands::Show { id } => commands::task_show(&ctx, &id),
            TaskCommands::Update {
                id,
                name,
                description,
                project,
                status,
                priority,
                assign,
                unassign,
                due,
                clear_due,
                tags,
            } => commands::task_update(
                &ctx,
                &id,
                commands::TaskChanges {
                    name,
                    description,
                    project,
                    status,
                    priority,
                    assign: if unassign { Some(None) } else { assign.map(Some) },
                    due: if clear_due { Some(None) } else { due.map(Some) },
                    tags,
                },
            ),
            TaskCommands::Status { id, status } => commands::task_status(&ctx, &id, &status),
            TaskCommands::Rm { id } => commands::task_rm(&ctx, &id),
        },
        Commands::Stats => commands::stats(&ctx),
        Commands::Reset { yes } => commands::reset(&ctx, yes),
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) | None => commands::config_show(&ctx),
            Some(ConfigCommands::Path) => commands::config_path(&ctx),
            Some(ConfigCommands::Init { force }) => commands::config_init(force),
        },
    }
}

impl TaskFilterArgs {
    fn into_filter(self) -> Result<TaskFilter> {
        Ok(TaskFilter {
            search: self.search,
            status: self.status.map(|s| s.parse::<TaskStatus>()).transpose()?,
            priority: self.priority.map(|p| p.parse::<Priority>()).transpose()?,
            project_id: self.project,
            assigned_to: self.assignee,
            tag: self.tag,
        })
    }
}
