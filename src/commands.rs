//! One-shot command handlers behind the CLI subcommands.

use anyhow::{bail, Context as _, Result};
use std::io::{self, Write};
use std::sync::Arc;

use crate::api::{ApiClient, TaskApi};
use crate::assignee::{self, AssigneeMatch};
use crate::auth::{self, RegisterForm, REGISTERED_NOTICE};
use crate::board::{tasks_in, Board, Column, Direction, Outcome};
use crate::config::Config;
use crate::editor::{self, TaskForm};
use crate::models::{Priority, Task, TaskId, TaskStats};
use crate::session::{SessionHandle, SqliteTokenStore, TokenStore};

// Helper function to ask user for confirmation
fn ask_user_confirmation(question: &str) -> Result<bool> {
    print!("{} (y/n): ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let answer = input.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

/// Build the API client over the durable session for `config`.
pub fn connect(config: &Config) -> Result<ApiClient> {
    let store: Arc<dyn TokenStore> = Arc::new(
        SqliteTokenStore::open(&config.session_db_path())
            .with_context(|| format!("Failed to open session store in {}", config.data_dir.display()))?,
    );
    let session = SessionHandle::restore(store).context("Failed to read stored session")?;
    ApiClient::new(config, session).context("Failed to build HTTP client")
}

fn require_login(client: &ApiClient) -> Result<()> {
    if !client.session().is_authenticated() {
        bail!("Not logged in. Run `taskboard login <USERNAME>` first.");
    }
    Ok(())
}

fn parse_column(raw: &str) -> Result<Column> {
    raw.parse::<Column>().map_err(anyhow::Error::msg)
}

pub fn format_task_line(task: &Task) -> String {
    let mut line = format!("#{} {} [{}]", task.id, task.title, task.priority);
    if let Some(day) = task.due_day() {
        line.push_str(&format!(" due {}", day.format("%Y-%m-%d")));
    }
    if let Some(user) = &task.assignee {
        line.push_str(&format!(" @{}", user.username));
    } else if let Some(id) = task.assigned_to {
        line.push_str(&format!(" @user#{}", id));
    }
    line
}

pub fn format_stats(stats: &TaskStats) -> String {
    format!(
        "To Do: {}  In Progress: {}  Done: {}  Total: {}",
        stats.todo, stats.in_progress, stats.done, stats.total
    )
}

async fn resolve_assignee(client: &ApiClient, input: &str) -> Result<Option<String>> {
    if input.trim().is_empty() {
        return Ok(Some(String::new()));
    }
    let users = client.list_users().await.context("Failed to fetch users")?;
    match assignee::resolve(&users, input) {
        AssigneeMatch::Exact(user) => Ok(Some(user.id.to_string())),
        AssigneeMatch::Suggested(user) => {
            let question = format!("'{}' not found. Did you mean '{}'?", input, user.username);
            if ask_user_confirmation(&question)? {
                Ok(Some(user.id.to_string()))
            } else {
                println!("Operation cancelled.");
                Ok(None)
            }
        }
        AssigneeMatch::NotFound => {
            println!("User '{}' not found.", input);
            Ok(None)
        }
    }
}

pub async fn login(client: &ApiClient, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt("Password")?,
    };
    let user = auth::login(client, username, &password).await?;
    println!("Logged in as {}", user.username);
    Ok(())
}

pub async fn register(
    client: &ApiClient,
    username: String,
    email: String,
    password: Option<String>,
    confirm_password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt("Password")?,
    };
    let confirm_password = match confirm_password {
        Some(confirm) => confirm,
        None => prompt("Confirm password")?,
    };
    let form = RegisterForm {
        username,
        email,
        password,
        confirm_password,
    };
    auth::register(client, &form).await?;
    println!("{}", REGISTERED_NOTICE);
    Ok(())
}

pub fn logout(client: &ApiClient) -> Result<()> {
    auth::logout(client)?;
    println!("Logged out.");
    Ok(())
}

pub async fn whoami(client: &ApiClient) -> Result<()> {
    match auth::restore(client).await? {
        Some(user) => println!("{} <{}> (id {})", user.username, user.email, user.id),
        None => println!("Not logged in."),
    }
    Ok(())
}

pub async fn users(client: &ApiClient) -> Result<()> {
    require_login(client)?;
    let users = client.list_users().await?;
    if users.is_empty() {
        println!("No users found.");
    }
    for user in users {
        println!("{:>4}  {}  <{}>", user.id, user.username, user.email);
    }
    Ok(())
}

pub async fn list(client: &ApiClient, status: Option<String>) -> Result<()> {
    require_login(client)?;

    if let Some(raw) = status {
        let column = parse_column(&raw)?;
        let tasks = client.tasks_by_status(&column.status()).await?;
        println!("{} ({})", column.title(), tasks.len());
        for task in &tasks {
            println!("  {}", format_task_line(task));
        }
        return Ok(());
    }

    let mut board = Board::new();
    let report = board.store_mut().refresh(client).await;
    if let Some(message) = report.message() {
        bail!("Failed to load board: {}", message);
    }

    println!("{}", format_stats(&board.store().stats()));
    for (column, tasks) in board.columns() {
        println!();
        println!("{} ({})", column.title(), tasks.len());
        if tasks.is_empty() {
            println!("  (empty)");
        }
        for task in tasks {
            println!("  {}", format_task_line(task));
        }
    }
    Ok(())
}

pub async fn stats(client: &ApiClient) -> Result<()> {
    require_login(client)?;
    let stats = client.task_stats().await?;
    println!("{}", format_stats(&stats));
    Ok(())
}

pub async fn show(client: &ApiClient, id: i64) -> Result<()> {
    require_login(client)?;
    let task = client.get_task(TaskId(id)).await?;
    println!("Task #{}: {}", task.id, task.title);
    println!("Status: {}", task.status);
    println!("Priority: {}", task.priority);
    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        println!("Description: {}", description);
    }
    if let Some(day) = task.due_day() {
        println!("Due: {}", day.format("%Y-%m-%d"));
    }
    match (&task.assignee, task.assigned_to) {
        (Some(user), _) => println!("Assignee: {}", user.username),
        (None, Some(id)) => println!("Assignee: user #{}", id),
        (None, None) => {}
    }
    Ok(())
}

pub struct TaskArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub due: Option<String>,
    pub assignee: Option<String>,
}

/// Overlay command-line values onto a form. Returns false when the user
/// backed out of an assignee suggestion.
async fn apply_args(client: &ApiClient, form: &mut TaskForm, args: TaskArgs) -> Result<bool> {
    if let Some(title) = args.title {
        form.title = title;
    }
    if let Some(description) = args.description {
        form.description = description;
    }
    if let Some(priority) = args.priority {
        form.priority = Priority::from(priority);
    }
    if let Some(status) = args.status {
        form.status = parse_column(&status)?.status();
    }
    if let Some(due) = args.due {
        form.due_date = due;
    }
    if let Some(input) = args.assignee {
        match resolve_assignee(client, &input).await? {
            Some(id) => form.assigned_to = id,
            None => return Ok(false),
        }
    }
    Ok(true)
}

pub async fn create(client: &ApiClient, args: TaskArgs) -> Result<()> {
    require_login(client)?;
    let mut form = TaskForm::default();
    if !apply_args(client, &mut form, args).await? {
        return Ok(());
    }
    editor::submit(client, &form, None).await?;
    println!("Task '{}' created.", form.title.trim());
    Ok(())
}

pub async fn edit(client: &ApiClient, id: i64, args: TaskArgs) -> Result<()> {
    require_login(client)?;
    let task = client.get_task(TaskId(id)).await?;
    let mut form = TaskForm::from_task(&task);
    if !apply_args(client, &mut form, args).await? {
        return Ok(());
    }
    editor::submit(client, &form, Some(&task)).await?;
    println!("Task #{} updated.", task.id);
    Ok(())
}

async fn load_board(client: &ApiClient) -> Result<Board> {
    let mut board = Board::new();
    let report = board.store_mut().refresh(client).await;
    if !report.tasks_updated {
        bail!(
            "Failed to load tasks: {}",
            report.message().unwrap_or_default()
        );
    }
    Ok(board)
}

pub async fn move_task(client: &ApiClient, id: i64, column: &str) -> Result<()> {
    require_login(client)?;
    let column = parse_column(column)?;
    let mut board = load_board(client).await?;

    let id = TaskId(id);
    if board.store().find(id).is_none() {
        println!("Task #{} not found.", id);
        return Ok(());
    }

    board.drag_start(id);
    match board.move_dragged(column, client).await? {
        Outcome::Skipped => println!("Task #{} is already in {}.", id, column.title()),
        Outcome::Applied(_) => println!("Task #{} moved to {}.", id, column.title()),
    }
    Ok(())
}

pub async fn reorder(client: &ApiClient, id: i64, direction: Direction) -> Result<()> {
    require_login(client)?;
    let mut board = load_board(client).await?;
    let id = TaskId(id);
    match board.reorder(id, direction, client).await? {
        Outcome::Skipped => println!("Task #{} can't move further.", id),
        Outcome::Applied(_) => {
            if let Some(column) = board.store().find(id).and_then(|t| Column::of(&t.status)) {
                let order: Vec<String> = tasks_in(board.store().tasks(), column)
                    .iter()
                    .map(|t| format!("#{}", t.id))
                    .collect();
                println!("{}: {}", column.title(), order.join(" "));
            }
        }
    }
    Ok(())
}

pub async fn delete(client: &ApiClient, id: i64, yes: bool) -> Result<()> {
    require_login(client)?;
    let mut board = load_board(client).await?;

    let id = TaskId(id);
    let Some(task) = board.request_delete(id) else {
        println!("Task #{} not found.", id);
        return Ok(());
    };
    let question = format!("Delete task #{} '{}'?", task.id, task.title);

    if !yes && !ask_user_confirmation(&question)? {
        board.cancel_delete();
        println!("Operation cancelled.");
        return Ok(());
    }

    board.confirm_delete(client).await?;
    println!("Task #{} deleted.", id);
    Ok(())
}
