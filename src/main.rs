use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use trackd::config::TrackdConfig;
use trackd::notify::{LogNotifier, Notifier, SmtpNotifier};
use trackd::reminder;
use trackd::storage::Storage;
use trackd::tasks::model::{NewTask, TaskPatch, TaskStatus};
use trackd::tasks::{hours, lifecycle, overdue, rollover};

#[derive(Parser)]
#[command(
    name = "trackd",
    about = "Employee task tracking daemon — lifecycle, rollover, daily reminders",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Data directory for the SQLite database and config.toml
    #[arg(long, env = "TRACKD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TRACKD_LOG")]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "TRACKD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,

    /// Suppress progress and informational output.
    ///
    /// Errors are still printed to stderr. JSON output (--json flags) is
    /// unaffected. Use this flag when piping output to other tools.
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon (default when no subcommand given).
    ///
    /// Boots the rollover processor, overdue classifier, and reminder
    /// scheduler as background loops and runs until SIGTERM / Ctrl-C.
    ///
    /// Examples:
    ///   trackd serve
    ///   trackd
    Serve,
    /// Advance lagging unfinished tasks by one day, once, and exit.
    ///
    /// Same batch the daemon runs daily: tasks still Not Started,
    /// In Progress, or Pending whose working date is on or before today
    /// move forward by exactly one day. Safe to re-run.
    ///
    /// Examples:
    ///   trackd rollover
    Rollover,
    /// Mark incomplete tasks whose end date has passed as Overdue, and exit.
    ///
    /// Idempotent: tasks already marked Overdue are not selected again.
    ///
    /// Examples:
    ///   trackd overdue
    Overdue,
    /// Run one reminder pass now, outside the daily timer.
    ///
    /// Mails every contributor a digest of their tasks using the configured
    /// SMTP settings (or logs the digests when none are configured).
    ///
    /// Examples:
    ///   trackd remind
    Remind,
    /// Manage tasks: create, assign, update, delete, query, log hours.
    ///
    /// Examples:
    ///   trackd tasks list --employee 3 --view active
    ///   trackd tasks create --employee 3 --topic "Quarterly report"
    ///   trackd tasks log-hours 14 --hours 5
    Tasks {
        #[command(subcommand)]
        action: TasksAction,
    },
    /// Manage the employee directory used for reminders and assignment.
    ///
    /// Examples:
    ///   trackd employees add --username dana --email dana@example.com
    ///   trackd employees list
    Employees {
        #[command(subcommand)]
        action: EmployeesAction,
    },
}

#[derive(Subcommand)]
enum TasksAction {
    /// Create a private task. Status defaults to "Not Started".
    Create {
        #[arg(long, short)]
        employee: i64,
        #[arg(long, short)]
        topic: String,
        #[arg(long, default_value = "")]
        subtopic: String,
        #[arg(long, short, default_value = "")]
        description: String,
        /// Working date (YYYY-MM-DD; default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Planned start (default: today)
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// Planned end (optional)
        #[arg(long)]
        end_date: Option<NaiveDate>,
        #[arg(long, default_value = "0")]
        expected_hours: i64,
        #[arg(long, short, default_value = "0")]
        priority: i64,
        /// Initial status (default: "Not Started")
        #[arg(long, short)]
        status: Option<String>,
    },
    /// Assign a task to an employee on behalf of a manager.
    ///
    /// The --manager id must belong to an employee holding the manager
    /// role. Completed hours always start at zero.
    Assign {
        #[arg(long, short)]
        employee: i64,
        /// Employee id of the assigning manager
        #[arg(long, short)]
        manager: i64,
        /// Display label for the assigning manager (optional)
        #[arg(long)]
        manager_label: Option<String>,
        #[arg(long, short)]
        topic: String,
        #[arg(long, default_value = "")]
        subtopic: String,
        #[arg(long, short, default_value = "")]
        description: String,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        start_date: Option<NaiveDate>,
        #[arg(long)]
        end_date: Option<NaiveDate>,
        #[arg(long, default_value = "0")]
        expected_hours: i64,
        #[arg(long, short, default_value = "0")]
        priority: i64,
        #[arg(long, short)]
        status: Option<String>,
    },
    /// Update a task. Omitted flags keep the stored value.
    ///
    /// Status transitions go through the lifecycle rules: moving a task
    /// straight from "Not Started" to "Completed" is rejected, completing a
    /// task stamps its end date, and the working date never moves backward.
    Update {
        id: i64,
        #[arg(long)]
        employee: Option<i64>,
        #[arg(long, short)]
        topic: Option<String>,
        #[arg(long)]
        subtopic: Option<String>,
        #[arg(long, short)]
        description: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        start_date: Option<NaiveDate>,
        #[arg(long)]
        end_date: Option<NaiveDate>,
        #[arg(long)]
        expected_hours: Option<i64>,
        #[arg(long)]
        completed_hours: Option<i64>,
        #[arg(long, short)]
        priority: Option<i64>,
        #[arg(long, short)]
        status: Option<String>,
    },
    /// Delete a task permanently.
    Delete { id: i64 },
    /// Show one task. With --employee, the task must belong to that employee.
    Get {
        id: i64,
        #[arg(long, short)]
        employee: Option<i64>,
    },
    /// List tasks, most urgent first.
    ///
    /// Views: all | private | assigned | active | overdue | incomplete.
    /// private/assigned/incomplete require --employee; --date filters by
    /// working date and combines with --status.
    List {
        #[arg(long, short)]
        employee: Option<i64>,
        #[arg(long, short)]
        status: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, short, default_value = "all")]
        view: String,
        /// Output as JSON array (for piping)
        #[arg(long)]
        json: bool,
    },
    /// Record hours spent on a task today (overwrites today's entry).
    LogHours {
        id: i64,
        #[arg(long)]
        hours: i64,
    },
    /// Show a task's per-day hours ledger, oldest day first.
    Hours {
        id: i64,
        /// Output as JSON array (for piping)
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum EmployeesAction {
    /// Add an employee. Roles: contributor (default) | manager | admin.
    Add {
        #[arg(long, short)]
        username: String,
        #[arg(long, short)]
        email: String,
        #[arg(long, short, default_value = "contributor")]
        role: String,
        /// Employee id of this employee's manager (optional)
        #[arg(long, short)]
        manager: Option<i64>,
    },
    /// List all employees.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        None | Some(Command::Serve) => {
            run_server(args.data_dir, args.log, args.log_file).await?;
        }
        Some(Command::Rollover) => {
            let (_config, storage) = open_storage(args.data_dir, args.log).await?;
            let n = rollover::advance_lagging_tasks(&storage, Local::now().date_naive()).await?;
            if n == 0 {
                println!("No tasks found that need to be rolled over");
            } else {
                println!("Successfully rolled over {n} task(s)");
            }
        }
        Some(Command::Overdue) => {
            let (_config, storage) = open_storage(args.data_dir, args.log).await?;
            let n = overdue::mark_overdue_tasks(&storage, Local::now().date_naive()).await?;
            if n == 0 {
                println!("No overdue tasks found");
            } else {
                println!("Marked {n} task(s) as overdue");
            }
        }
        Some(Command::Remind) => {
            let (config, storage) = open_storage(args.data_dir, args.log).await?;
            let notifier = build_notifier(&config)?;
            let summary = reminder::run_reminder_pass(&storage, notifier.as_ref()).await?;
            println!(
                "Reminder pass complete: {} sent, {} failed",
                summary.sent, summary.failed
            );
        }
        Some(Command::Tasks { action }) => {
            let (_config, storage) = open_storage(args.data_dir, args.log).await?;
            run_tasks(action, &storage, args.quiet).await?;
        }
        Some(Command::Employees { action }) => {
            let (_config, storage) = open_storage(args.data_dir, args.log).await?;
            run_employees(action, &storage, args.quiet).await?;
        }
    }

    Ok(())
}

/// Open config + storage for the one-shot subcommands. Logs default to warn
/// so command output stays readable; raise with --log / TRACKD_LOG.
async fn open_storage(
    data_dir: Option<std::path::PathBuf>,
    log: Option<String>,
) -> Result<(TrackdConfig, Storage)> {
    let config = TrackdConfig::new(data_dir, log.or_else(|| Some("warn".to_string())));
    tracing_subscriber::fmt()
        .with_env_filter(config.log.clone())
        .compact()
        .init();
    let storage = Storage::new(&config.data_dir).await?;
    Ok((config, storage))
}

fn build_notifier(config: &TrackdConfig) -> Result<Arc<dyn Notifier>> {
    if config.email.is_configured() {
        Ok(Arc::new(SmtpNotifier::from_config(&config.email)?))
    } else {
        Ok(Arc::new(LogNotifier))
    }
}

// ─── Serve ───────────────────────────────────────────────────────────────────

async fn run_server(
    data_dir: Option<std::path::PathBuf>,
    log: Option<String>,
    log_file: Option<std::path::PathBuf>,
) -> Result<()> {
    let config = TrackdConfig::new(data_dir, log);
    let _guard = setup_logging(&config.log, log_file.as_deref(), &config.log_format);

    info!(version = env!("CARGO_PKG_VERSION"), "trackd starting");
    let storage = Arc::new(Storage::new(&config.data_dir).await?);
    info!(data_dir = %config.data_dir.display(), "storage ready");

    let notifier = build_notifier(&config)?;
    if !config.email.is_configured() {
        info!("no [email] settings in config.toml — reminders will be logged, not sent");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let rollover_handle = tokio::spawn(rollover::run_rollover_loop(
        storage.clone(),
        shutdown_rx.clone(),
    ));
    let overdue_handle = tokio::spawn(overdue::run_overdue_loop(
        storage.clone(),
        shutdown_rx.clone(),
    ));
    let reminder_handle = tokio::spawn(reminder::run_reminder_loop(
        storage.clone(),
        notifier,
        config.reminder.clone(),
        shutdown_rx,
    ));

    wait_for_shutdown().await;
    info!("shutdown signal received — stopping background loops");
    let _ = shutdown_tx.send(true);

    // Loops exit at their next suspension point; don't wait forever for them.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = tokio::join!(rollover_handle, overdue_handle, reminder_handle);
    })
    .await;

    info!("trackd stopped");
    Ok(())
}

/// Resolves when a shutdown signal is received.
///
/// On Unix we listen for SIGTERM *and* Ctrl-C.
/// On other platforms we listen for Ctrl-C only.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}

/// Initialize the tracing subscriber for the daemon.
/// If `log_file` is set, logs go to both stdout and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format)
/// or `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("trackd.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}

// ─── Tasks subcommands ───────────────────────────────────────────────────────

async fn run_tasks(action: TasksAction, storage: &Storage, quiet: bool) -> Result<()> {
    let today = Local::now().date_naive();

    match action {
        TasksAction::Create {
            employee,
            topic,
            subtopic,
            description,
            date,
            start_date,
            end_date,
            expected_hours,
            priority,
            status,
        } => {
            let new = NewTask {
                employee_id: employee,
                topic,
                subtopic,
                description,
                date: date.unwrap_or(today),
                start_date: start_date.unwrap_or(today),
                end_date,
                expected_hours,
                completed_hours: 0,
                priority,
                status: parse_status(status.as_deref())?,
            };
            let task = lifecycle::create_task(storage, &new).await?;
            if !quiet {
                println!("Created task {} — {} ({})", task.task_id, task.topic, task.status);
            }
        }

        TasksAction::Assign {
            employee,
            manager,
            manager_label,
            topic,
            subtopic,
            description,
            date,
            start_date,
            end_date,
            expected_hours,
            priority,
            status,
        } => {
            let new = NewTask {
                employee_id: employee,
                topic,
                subtopic,
                description,
                date: date.unwrap_or(today),
                start_date: start_date.unwrap_or(today),
                end_date,
                expected_hours,
                completed_hours: 0,
                priority,
                status: parse_status(status.as_deref())?,
            };
            let task = lifecycle::assign_task(storage, &new, manager, manager_label).await?;
            if !quiet {
                println!(
                    "Assigned task {} to employee {} (by manager {})",
                    task.task_id, task.employee_id, manager
                );
            }
        }

        TasksAction::Update {
            id,
            employee,
            topic,
            subtopic,
            description,
            date,
            start_date,
            end_date,
            expected_hours,
            completed_hours,
            priority,
            status,
        } => {
            let current = storage
                .get_task(id)
                .await?
                .ok_or(trackd::Error::TaskNotFound(id))?;
            let patch = TaskPatch {
                employee_id: employee.unwrap_or(current.employee_id),
                topic: topic.unwrap_or_else(|| current.topic.clone()),
                subtopic: subtopic.unwrap_or_else(|| current.subtopic.clone()),
                description: description.unwrap_or_else(|| current.description.clone()),
                date: date.unwrap_or(current.date),
                start_date: start_date.unwrap_or(current.start_date),
                end_date: end_date.or(current.end_date),
                expected_hours: expected_hours.unwrap_or(current.expected_hours),
                completed_hours: completed_hours.unwrap_or(current.completed_hours),
                priority: priority.unwrap_or(current.priority),
                status: match status {
                    Some(s) => TaskStatus::from_str(&s)?,
                    None => current.status,
                },
            };
            let task = lifecycle::update_task(storage, id, &patch).await?;
            if !quiet {
                println!("Task {} updated — status: {}", task.task_id, task.status);
            }
        }

        TasksAction::Delete { id } => {
            lifecycle::delete_task(storage, id).await?;
            if !quiet {
                println!("Task {id} deleted");
            }
        }

        TasksAction::Get { id, employee } => {
            let task = match employee {
                Some(emp) => storage.task_for_employee(id, emp).await?,
                None => storage.get_task(id).await?,
            };
            match task {
                None => {
                    eprintln!("Task not found: {id}");
                    std::process::exit(1);
                }
                Some(t) => println!("{}", serde_json::to_string_pretty(&t)?),
            }
        }

        TasksAction::List {
            employee,
            status,
            date,
            view,
            json,
        } => {
            let status = match status.as_deref() {
                Some(s) => Some(TaskStatus::from_str(s)?),
                None => None,
            };
            let tasks = match (view.as_str(), employee, date, status) {
                ("private", Some(emp), _, _) => storage.private_tasks(emp).await?,
                ("assigned", Some(emp), _, _) => storage.assigned_tasks(emp).await?,
                ("active", emp, _, _) => storage.active_tasks(today, emp).await?,
                ("overdue", emp, _, _) => storage.overdue_tasks(today, emp).await?,
                ("incomplete", Some(emp), _, _) => storage.incomplete_tasks(emp, today).await?,
                ("all", _, Some(d), Some(s)) => storage.tasks_by_date_and_status(d, s).await?,
                ("all", _, None, Some(s)) => storage.tasks_by_status(s).await?,
                ("all", Some(emp), None, None) => storage.tasks_for_employee(emp).await?,
                ("all", None, None, None) => storage.list_tasks().await?,
                (v @ ("private" | "assigned" | "incomplete"), None, _, _) => {
                    anyhow::bail!("view '{v}' requires --employee");
                }
                (v, _, _, _) => anyhow::bail!("unknown view '{v}' or unsupported filter combination"),
            };

            if json {
                println!("{}", serde_json::to_string(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks found.");
            } else {
                println!(
                    "{:<6} {:<9} {:<12} {:<11} {:<4} TOPIC",
                    "ID", "EMPLOYEE", "STATUS", "DATE", "PRI"
                );
                println!("{}", "-".repeat(64));
                for t in &tasks {
                    println!(
                        "{:<6} {:<9} {:<12} {:<11} {:<4} {}",
                        t.task_id,
                        t.employee_id,
                        t.status.to_string(),
                        t.date.to_string(),
                        t.priority,
                        t.topic
                    );
                }
                println!("\n{} task(s)", tasks.len());
            }
        }

        TasksAction::LogHours { id, hours } => {
            hours::log_hours(storage, id, hours).await?;
            if !quiet {
                println!("Logged {hours} hour(s) on task {id} for today");
            }
        }

        TasksAction::Hours { id, json } => {
            let entries = hours::daily_hours(storage, id).await?;
            if json {
                println!("{}", serde_json::to_string(&entries)?);
            } else if entries.is_empty() {
                println!("No hours logged for task {id}.");
            } else {
                println!("{:<12} HOURS", "DATE");
                for e in &entries {
                    println!("{:<12} {}", e.date.to_string(), e.hours_spent);
                }
            }
        }
    }

    Ok(())
}

fn parse_status(s: Option<&str>) -> Result<Option<TaskStatus>> {
    Ok(match s {
        Some(s) => Some(TaskStatus::from_str(s)?),
        None => None,
    })
}

// ─── Employees subcommands ───────────────────────────────────────────────────

async fn run_employees(action: EmployeesAction, storage: &Storage, quiet: bool) -> Result<()> {
    match action {
        EmployeesAction::Add {
            username,
            email,
            role,
            manager,
        } => {
            match role.as_str() {
                trackd::storage::ROLE_CONTRIBUTOR
                | trackd::storage::ROLE_MANAGER
                | trackd::storage::ROLE_ADMIN => {}
                other => anyhow::bail!("unknown role '{other}' (expected contributor, manager, or admin)"),
            }
            let emp = storage.create_employee(&username, &email, &role, manager).await?;
            if !quiet {
                println!("Added employee {} — {} <{}> ({})", emp.employee_id, emp.username, emp.email, emp.role);
            }
        }
        EmployeesAction::List => {
            let employees = storage.list_employees().await?;
            if employees.is_empty() {
                println!("No employees found.");
            } else {
                println!("{:<6} {:<16} {:<28} {:<12} MANAGER", "ID", "USERNAME", "EMAIL", "ROLE");
                for e in &employees {
                    println!(
                        "{:<6} {:<16} {:<28} {:<12} {}",
                        e.employee_id,
                        e.username,
                        e.email,
                        e.role,
                        e.manager_id.map_or_else(|| "-".to_string(), |m| m.to_string())
                    );
                }
            }
        }
    }
    Ok(())
}
