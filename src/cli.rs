use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(author, version, about = "Kanban task board client for the task API", long_about = None)]
pub struct Cli {
    /// Base URL of the task API
    #[arg(long, global = true, env = "TASKBOARD_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and remember the session token
    Login {
        #[arg(value_name = "USERNAME")]
        username: String,
        /// Password (prompted for when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Create a new account
    Register {
        #[arg(value_name = "USERNAME")]
        username: String,
        #[arg(value_name = "EMAIL")]
        email: String,
        #[arg(short, long)]
        password: Option<String>,
        /// Password confirmation (prompted for when omitted)
        #[arg(long = "confirm")]
        confirm_password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List users that tasks can be assigned to
    Users,
    /// List tasks grouped by column
    List {
        /// Only show one column (server order)
        #[arg(short, long, value_name = "COLUMN")]
        status: Option<String>,
    },
    /// Show task counts per column
    Stats,
    /// Show one task
    Show {
        #[arg(value_name = "ID")]
        id: i64,
    },
    /// Create a task
    Create {
        #[arg(value_name = "TITLE")]
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        /// low, medium or high
        #[arg(short, long)]
        priority: Option<String>,
        /// Starting column
        #[arg(short, long, value_name = "COLUMN")]
        status: Option<String>,
        /// Due date as YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
        /// Username or user id
        #[arg(short, long)]
        assignee: Option<String>,
    },
    /// Edit a task; unspecified fields keep their current values
    Edit {
        #[arg(value_name = "ID")]
        id: i64,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        priority: Option<String>,
        #[arg(short, long, value_name = "COLUMN")]
        status: Option<String>,
        /// Due date as YYYY-MM-DD, empty to clear
        #[arg(long)]
        due: Option<String>,
        /// Username or user id, empty to unassign
        #[arg(short, long)]
        assignee: Option<String>,
    },
    /// Move a task to another column
    Move {
        #[arg(value_name = "ID")]
        id: i64,
        #[arg(value_name = "COLUMN")]
        column: String,
    },
    /// Move a task one slot within its column
    Reorder {
        #[arg(value_name = "ID")]
        id: i64,
        #[arg(value_enum)]
        direction: MoveDirection,
    },
    /// Delete a task
    Delete {
        #[arg(value_name = "ID")]
        id: i64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Launch TUI interface
    Tui,
    /// Generate shell completions
    Completions {
        #[arg(value_name = "SHELL")]
        shell: String,
    },
}
