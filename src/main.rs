use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

use taskboard::board::Direction;
use taskboard::cli::{Cli, Commands, MoveDirection};
use taskboard::commands::{self, TaskArgs};
use taskboard::config::Config;
use taskboard::tui::run_tui;

const LOG_ENV: &str = "TASKBOARD_LOG";

/// The TUI owns the terminal, so its logs go to a file; everything else
/// logs to stderr.
fn configure_logging(config: &Config, tui: bool) {
    let create_filter =
        || EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    if tui {
        let path = config.log_file_path();
        let file = std::fs::create_dir_all(&config.data_dir)
            .and_then(|_| {
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
            });
        match file {
            Ok(file) => {
                registry()
                    .with(create_filter())
                    .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
                    .init();
                return;
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not open log file {}: {}. Logging is disabled.",
                    path.display(),
                    e
                );
                return;
            }
        }
    }

    registry()
        .with(create_filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(url) = cli.api_url.as_deref() {
        config = config.with_api_url(url);
    }

    let tui = matches!(cli.command, None | Some(Commands::Tui));
    configure_logging(&config, tui);

    if let Some(Commands::Completions { shell }) = &cli.command {
        use clap_complete::{generate, Shell};
        let shell = shell.to_lowercase();
        let shell_enum = match shell.as_str() {
            "bash" => Shell::Bash,
            "zsh" => Shell::Zsh,
            "fish" => Shell::Fish,
            "elvish" => Shell::Elvish,
            "powershell" => Shell::PowerShell,
            _ => {
                println!("Unsupported shell: {}", shell);
                return Ok(());
            }
        };
        let mut cmd = Cli::command();
        generate(shell_enum, &mut cmd, "taskboard", &mut std::io::stdout());
        return Ok(());
    }

    let client = commands::connect(&config)?;
    log::debug!("Using task API at {}", client.base_url());

    match cli.command {
        Some(Commands::Login { username, password }) => {
            commands::login(&client, &username, password).await?;
        }
        Some(Commands::Register {
            username,
            email,
            password,
            confirm_password,
        }) => {
            commands::register(&client, username, email, password, confirm_password).await?;
        }
        Some(Commands::Logout) => {
            commands::logout(&client)?;
        }
        Some(Commands::Whoami) => {
            commands::whoami(&client).await?;
        }
        Some(Commands::Users) => {
            commands::users(&client).await?;
        }
        Some(Commands::List { status }) => {
            commands::list(&client, status).await?;
        }
        Some(Commands::Stats) => {
            commands::stats(&client).await?;
        }
        Some(Commands::Show { id }) => {
            commands::show(&client, id).await?;
        }
        Some(Commands::Create {
            title,
            description,
            priority,
            status,
            due,
            assignee,
        }) => {
            let args = TaskArgs {
                title: Some(title),
                description,
                priority,
                status,
                due,
                assignee,
            };
            commands::create(&client, args).await?;
        }
        Some(Commands::Edit {
            id,
            title,
            description,
            priority,
            status,
            due,
            assignee,
        }) => {
            let args = TaskArgs {
                title,
                description,
                priority,
                status,
                due,
                assignee,
            };
            commands::edit(&client, id, args).await?;
        }
        Some(Commands::Move { id, column }) => {
            commands::move_task(&client, id, &column).await?;
        }
        Some(Commands::Reorder { id, direction }) => {
            let direction = match direction {
                MoveDirection::Up => Direction::Up,
                MoveDirection::Down => Direction::Down,
            };
            commands::reorder(&client, id, direction).await?;
        }
        Some(Commands::Delete { id, yes }) => {
            commands::delete(&client, id, yes).await?;
        }
        Some(Commands::Completions { .. }) => {}
        Some(Commands::Tui) | None => {
            // Default behavior: launch TUI
            run_tui(client).await?;
        }
    }

    Ok(())
}
