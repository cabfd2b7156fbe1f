//! Agenda CLI - projects, tasks and reminders with optional spreadsheet sync

use std::sync::Arc;

use agenda_core::config::Config;
use agenda_core::model::{NewTask, Project, Task, TaskUpdate};
use agenda_core::notify::{
    ChannelNotifier, LogNotifier, NotificationScheduler, Notifier, SchedulerConfig,
};
use agenda_core::storage::RecordStore;
use agenda_core::sync::{SyncClient, SyncCoordinator};
use agenda_core::validation::{ProjectValidator, TaskValidator};
use agenda_core::{Error, model::RecordId};
use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "agenda")]
#[command(author, version, about = "Projects, tasks and reminders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects
    Projects {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage tasks
    Tasks {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Exchange records with the remote store
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },

    /// Show record counts and pending reminders
    Status,

    /// Run the reminder scheduler until interrupted
    Watch,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// List all projects
    List,
    /// Create a project
    Add {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Red, Blue, Green, Amber, Purple, Pink, Orange or Cyan
        #[arg(short, long, default_value = "Blue")]
        color: String,
    },
    /// Change a project
    Edit {
        id: RecordId,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        color: Option<String>,
    },
    /// Delete a project and all of its tasks
    Remove { id: RecordId },
}

#[derive(Subcommand)]
enum TaskAction {
    /// List tasks
    List {
        /// Only tasks of this project
        #[arg(short, long)]
        project: Option<RecordId>,
    },
    /// Create a task
    Add {
        title: String,
        #[arg(short, long)]
        project: RecordId,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Reminder time, YYYY-MM-DD HH:MM
        #[arg(short, long)]
        at: Option<String>,
        /// High, Medium or Low
        #[arg(long, default_value = "Medium")]
        priority: String,
    },
    /// Change a task
    Edit {
        id: RecordId,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// New reminder time, YYYY-MM-DD HH:MM
        #[arg(short, long, conflicts_with = "clear_schedule")]
        at: Option<String>,
        /// Remove the reminder
        #[arg(long)]
        clear_schedule: bool,
        #[arg(long)]
        priority: Option<String>,
    },
    /// Flip a task between open and done
    Toggle { id: RecordId },
    /// Delete a task
    Remove { id: RecordId },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Merge remote records into the local store
    Pull,
    /// Send local records the remote does not have
    Push,
    /// Check that the remote store answers
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("agenda=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Projects { action } => {
            let store = open_store(&Config::load()?)?;
            cmd_projects(&store, action, cli.format, cli.quiet)
        }

        Commands::Tasks { action } => {
            let store = open_store(&Config::load()?)?;
            cmd_tasks(&store, action, cli.format, cli.quiet)
        }

        Commands::Sync { action } => cmd_sync(action, cli.format, cli.quiet).await,

        Commands::Status => {
            let store = open_store(&Config::load()?)?;
            cmd_status(&store, cli.format)
        }

        Commands::Watch => cmd_watch(cli.quiet).await,

        Commands::Config { action } => cmd_config(action, cli.quiet),
    }
}

fn open_store(config: &Config) -> anyhow::Result<Arc<RecordStore>> {
    let data_dir = config.storage.resolved_data_dir()?;
    let store = RecordStore::open(&data_dir)
        .with_context(|| format!("Failed to open records in {}", data_dir.display()))?;
    Ok(Arc::new(store))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Newest first; ids grow with creation time
fn sort_projects(projects: &mut [Project]) {
    projects.sort_by(|a, b| b.id.cmp(&a.id));
}

/// Open tasks before completed ones, newest first within each group
fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| a.completed.cmp(&b.completed).then(b.id.cmp(&a.id)));
}

/// Completed and total task counts for one project
fn progress(tasks: &[Task], project_id: RecordId) -> (usize, usize) {
    tasks
        .iter()
        .filter(|t| t.project_id == project_id)
        .fold((0, 0), |(done, total), t| (done + usize::from(t.completed), total + 1))
}

fn project_line(p: &Project, (done, total): (usize, usize)) -> String {
    let mut line = format!("  {} - {} ({}) [{}/{} done]", p.id, p.name, p.color, done, total);
    if !p.description.is_empty() {
        line.push_str(&format!(": {}", p.description));
    }
    line
}

fn task_line(t: &Task) -> String {
    let mark = if t.completed { "x" } else { " " };
    let mut line = format!("  [{}] {} - {} ({})", mark, t.id, t.title, t.priority);
    if let Some(at) = &t.scheduled_at {
        line.push_str(&format!(" @ {}", at));
        if t.notified {
            line.push_str(" (reminded)");
        }
    }
    line
}

// ============================================================================
// Command Implementations
// ============================================================================

fn cmd_projects(
    store: &RecordStore,
    action: ProjectAction,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    match action {
        ProjectAction::List => {
            let mut projects = store.list_projects();
            sort_projects(&mut projects);
            if format == OutputFormat::Json {
                return print_json(&projects);
            }
            if projects.is_empty() {
                if !quiet {
                    println!("No projects found.");
                    println!("\nCreate one with: agenda projects add <name>");
                }
            } else {
                if !quiet {
                    println!("Projects:");
                }
                let tasks = store.list_tasks();
                for p in &projects {
                    println!("{}", project_line(p, progress(&tasks, p.id)));
                }
            }
        }
        ProjectAction::Add {
            name,
            description,
            color,
        } => {
            ProjectValidator::validate_name(&name)?;
            ProjectValidator::validate_description(&description)?;
            let color = ProjectValidator::validate_color(&color)?;

            let project = store.create_project(name.trim(), &description, color)?;
            if format == OutputFormat::Json {
                return print_json(&project);
            }
            if !quiet {
                println!("Project created.");
                println!("  ID: {}", project.id);
                println!("  Name: {}", project.name);
                println!("  Color: {}", project.color);
            }
        }
        ProjectAction::Edit {
            id,
            name,
            description,
            color,
        } => {
            let current = store.get_project(id).ok_or(Error::ProjectNotFound(id))?;

            let name = name.unwrap_or(current.name);
            ProjectValidator::validate_name(&name)?;
            let description = description.unwrap_or(current.description);
            ProjectValidator::validate_description(&description)?;
            let color = match color {
                Some(raw) => ProjectValidator::validate_color(&raw)?,
                None => current.color,
            };

            store.update_project(id, name.trim(), &description, color)?;
            if !quiet {
                println!("Project {} updated.", id);
            }
        }
        ProjectAction::Remove { id } => {
            let removed_tasks = store.list_tasks_by_project(id).len();
            if !store.delete_project(id)? {
                return Err(Error::ProjectNotFound(id).into());
            }
            if !quiet {
                println!("Project {} deleted ({} task(s) removed).", id, removed_tasks);
            }
        }
    }
    Ok(())
}

fn cmd_tasks(
    store: &RecordStore,
    action: TaskAction,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    match action {
        TaskAction::List { project } => {
            let mut tasks = match project {
                Some(project_id) => {
                    if store.get_project(project_id).is_none() {
                        return Err(Error::ProjectNotFound(project_id).into());
                    }
                    store.list_tasks_by_project(project_id)
                }
                None => store.list_tasks(),
            };
            sort_tasks(&mut tasks);
            if format == OutputFormat::Json {
                return print_json(&tasks);
            }
            if tasks.is_empty() {
                if !quiet {
                    println!("No tasks found.");
                    println!("\nCreate one with: agenda tasks add <title> --project <id>");
                }
            } else {
                if !quiet {
                    println!("Tasks:");
                }
                for t in &tasks {
                    println!("{}", task_line(t));
                }
            }
        }
        TaskAction::Add {
            title,
            project,
            description,
            at,
            priority,
        } => {
            TaskValidator::validate_title(&title)?;
            TaskValidator::validate_description(&description)?;
            let priority = TaskValidator::validate_priority(&priority)?;
            let scheduled_at = match at {
                Some(raw) => TaskValidator::validate_schedule(&raw)?,
                None => None,
            };

            let task = store.create_task(NewTask {
                scheduled_at,
                ..NewTask::new(title.trim(), project)
                    .with_description(description)
                    .with_priority(priority)
            })?;
            if format == OutputFormat::Json {
                return print_json(&task);
            }
            if !quiet {
                println!("Task created.");
                println!("  ID: {}", task.id);
                println!("  Title: {}", task.title);
                if let Some(at) = &task.scheduled_at {
                    println!("  Reminder: {}", at);
                }
            }
        }
        TaskAction::Edit {
            id,
            title,
            description,
            at,
            clear_schedule,
            priority,
        } => {
            let current = store.get_task(id).ok_or(Error::TaskNotFound(id))?;
            let mut update = TaskUpdate::from(&current);

            if let Some(title) = title {
                TaskValidator::validate_title(&title)?;
                update.title = title.trim().to_string();
            }
            if let Some(description) = description {
                TaskValidator::validate_description(&description)?;
                update.description = description;
            }
            if let Some(raw) = at {
                update.scheduled_at = TaskValidator::validate_schedule(&raw)?;
            }
            if clear_schedule {
                update.scheduled_at = None;
            }
            if let Some(raw) = priority {
                update.priority = TaskValidator::validate_priority(&raw)?;
            }

            store.update_task(id, update)?;
            if !quiet {
                println!("Task {} updated.", id);
            }
        }
        TaskAction::Toggle { id } => {
            let completed = store
                .toggle_task_completed(id)?
                .ok_or(Error::TaskNotFound(id))?;
            if !quiet {
                let state = if completed { "done" } else { "open" };
                println!("Task {} is now {}.", id, state);
            }
        }
        TaskAction::Remove { id } => {
            if !store.delete_task(id)? {
                return Err(Error::TaskNotFound(id).into());
            }
            if !quiet {
                println!("Task {} deleted.", id);
            }
        }
    }
    Ok(())
}

async fn cmd_sync(action: SyncAction, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let client = SyncClient::from_config(&config.sync)?;

    match action {
        SyncAction::Pull => {
            let store = open_store(&config)?;
            let coordinator = Arc::new(SyncCoordinator::new(store, Arc::new(client)));
            let report = coordinator.spawn_pull().await?;

            if format == OutputFormat::Json {
                print_json(&serde_json::json!({
                    "success": report.is_success(),
                    "projectsAdded": report.projects_added,
                    "tasksAdded": report.tasks_added,
                    "tasksSkipped": report.tasks_skipped,
                    "errors": report.failures.iter().map(|f| f.to_string()).collect::<Vec<_>>(),
                }))?;
            } else if !quiet || !report.is_success() {
                println!("{}", report.summary());
            }
            if !report.is_success() {
                anyhow::bail!("pull did not complete");
            }
        }
        SyncAction::Push => {
            let store = open_store(&config)?;
            let coordinator = Arc::new(SyncCoordinator::new(store, Arc::new(client)));
            let report = coordinator.spawn_push().await?;

            for warning in &report.warnings {
                warn!(%warning, "Remote listing unavailable");
            }
            if format == OutputFormat::Json {
                print_json(&serde_json::json!({
                    "success": report.is_success(),
                    "projectsPushed": report.projects_pushed,
                    "tasksPushed": report.tasks_pushed,
                    "warnings": report.warnings.iter().map(|f| f.to_string()).collect::<Vec<_>>(),
                    "errors": report.failures.iter().map(|f| f.to_string()).collect::<Vec<_>>(),
                }))?;
            } else if !quiet || !report.is_success() {
                println!("{}", report.summary());
            }
            if !report.is_success() {
                anyhow::bail!("push did not complete");
            }
        }
        SyncAction::Status => {
            if !quiet {
                println!("Remote: {}", client.base_url());
            }
            match client.health().await {
                Ok(()) => println!("[OK] Remote store reachable"),
                Err(e) => {
                    println!("[!!] Remote store unreachable: {}", e);
                    if let Some(hint) = e.suggestion() {
                        println!("     Try: {}", hint);
                    }
                    return Err(e.into());
                }
            }
        }
    }
    Ok(())
}

fn cmd_status(store: &RecordStore, format: OutputFormat) -> anyhow::Result<()> {
    let stats = store.stats();
    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "dataDir": store.data_dir().display().to_string(),
            "projects": stats.projects,
            "tasks": stats.tasks,
            "completedTasks": stats.completed_tasks,
            "pendingReminders": stats.pending_reminders,
        }));
    }

    println!("Data: {}", store.data_dir().display());
    println!("Projects: {}", stats.projects);
    println!(
        "Tasks: {} ({} done, {} reminder(s) pending)",
        stats.tasks, stats.completed_tasks, stats.pending_reminders
    );
    Ok(())
}

async fn cmd_watch(quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    if !config.notifications.enabled {
        println!("Notifications are disabled.");
        println!("Enable them with: agenda config set notifications.enabled true");
        return Ok(());
    }

    let store = open_store(&config)?;
    let scheduler_config = SchedulerConfig::from(&config.notifications);

    // Quiet mode leaves delivery to the log; otherwise reminders are printed
    let mut reminders = None;
    let notifier: Arc<dyn Notifier> = if quiet {
        Arc::new(LogNotifier)
    } else {
        let (notifier, rx) = ChannelNotifier::new(32);
        reminders = Some(rx);
        Arc::new(notifier)
    };

    let scheduler = NotificationScheduler::new(store, notifier, scheduler_config);
    scheduler.start()?;
    if !quiet {
        println!("Watching for reminders. Press Ctrl-C to stop.");
    }

    loop {
        tokio::select! {
            Some(reminder) = async {
                match reminders.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                println!("{}", reminder.title);
                for line in reminder.body.lines() {
                    println!("  {}", line);
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    info!("Stopping reminder scheduler");
    scheduler.stop().await;
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
